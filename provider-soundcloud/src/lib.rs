//! # SoundCloud Provider
//!
//! Segmented-playlist acquisition path.
//!
//! ## Overview
//!
//! This module provides:
//! - Manifest resolution from a track's transcoding URL plus client id
//! - HLS playlist parsing, following a master playlist to its first variant
//! - A lazily chained segment reader: segment `n + 1` is requested only
//!   once segment `n` has been read to the end

pub mod client;
pub mod error;
pub mod hls;

pub use client::SoundCloudClient;
pub use error::{Result, SoundCloudError};
pub use hls::{parse_playlist, Playlist};
