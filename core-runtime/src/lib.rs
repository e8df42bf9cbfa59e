//! # Core Runtime
//!
//! Foundational infrastructure shared by the providers and the player:
//! - Logging and tracing setup
//! - Configuration with fail-fast validation
//! - Event bus for player and session events
//!
//! Nothing here talks to the network or the voice layer directly; those are
//! injected through `bridge-traits` and carried in [`config::CoreConfig`].

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
