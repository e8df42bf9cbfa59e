//! # Deezer Provider
//!
//! Acquisition path for Deezer-hosted tracks.
//!
//! ## Overview
//!
//! This crate provides:
//! - The `BF_CBC_STRIPE` cipher: per-track key derivation plus whole-buffer
//!   and streaming decryption ([`cipher`])
//! - A lazily negotiated, single-flight gateway session ([`SessionManager`])
//! - The fetch pipeline from track id to PCM frames ([`MediaFetcher`])
//! - ISRC cross-reference for tracks resolved on other platforms

pub mod cipher;
pub mod error;
pub mod fetcher;
pub mod session;
pub mod types;

pub use cipher::{decrypt, derive_key, encrypt, CipherKey, MasterKey, StripeDecoder};
pub use error::{DeezerError, Result};
pub use fetcher::MediaFetcher;
pub use session::{SessionManager, SessionState};
pub use types::{GatewayMethod, MediaFormat};
