//! # Playback Error Types
//!
//! Errors raised while deploying a track or driving the voice transport.

use bridge_traits::error::BridgeError;
use provider_bandcamp::BandcampError;
use provider_deezer::DeezerError;
use provider_soundcloud::SoundCloudError;
use thiserror::Error;

/// Errors that can occur during playback operations.
#[derive(Error, Debug)]
pub enum PlaybackError {
    // ========================================================================
    // Acquisition Errors
    // ========================================================================
    /// Deezer session, gateway, cipher or download failure.
    #[error("Deezer acquisition failed: {0}")]
    Deezer(#[from] DeezerError),

    /// SoundCloud manifest or segment failure.
    #[error("SoundCloud acquisition failed: {0}")]
    SoundCloud(#[from] SoundCloudError),

    /// Bandcamp page could not be scraped.
    #[error("Bandcamp acquisition failed: {0}")]
    Bandcamp(#[from] BandcampError),

    /// A provider credential needed for this source was not configured.
    #[error("Missing {credential} for {provider} playback")]
    MissingCredential {
        provider: &'static str,
        credential: &'static str,
    },

    /// The track lacks a field its source needs to be deployed.
    #[error("Track {track_id} has no {field}")]
    MissingField {
        track_id: String,
        field: &'static str,
    },

    /// Transcoder could not turn the source into frames.
    #[error("Transcoding failed: {0}")]
    Transcode(BridgeError),

    /// Generic acquisition failure for one track.
    #[error("Acquisition failed: {0}")]
    Acquisition(String),

    // ========================================================================
    // Transport Errors
    // ========================================================================
    /// Voice connector or transport call failed.
    #[error("Voice transport error: {0}")]
    Transport(BridgeError),

    /// The player was destroyed and no longer accepts commands.
    #[error("Player for guild {0} has been destroyed")]
    PlayerDestroyed(String),

    /// Internal error (should not occur in normal operation).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PlaybackError {
    /// Returns `true` if the licensing backend refused the session or media URL.
    ///
    /// The usual cause is an expired elevated-entitlement credential.
    pub fn is_licensing(&self) -> bool {
        matches!(self, PlaybackError::Deezer(e) if e.is_licensing())
    }

    /// Returns `true` if the same request may succeed later without any
    /// configuration change.
    pub fn is_transient(&self) -> bool {
        match self {
            PlaybackError::Deezer(DeezerError::BridgeError(_)) => true,
            PlaybackError::SoundCloud(SoundCloudError::ApiError { status_code, .. }) => {
                *status_code >= 500 || *status_code == 429
            }
            PlaybackError::SoundCloud(SoundCloudError::BridgeError(_)) => true,
            PlaybackError::Bandcamp(BandcampError::PageUnavailable { status_code }) => {
                *status_code >= 500 || *status_code == 429
            }
            PlaybackError::Bandcamp(BandcampError::BridgeError(_)) => true,
            PlaybackError::Transport(_) => true,
            _ => false,
        }
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
