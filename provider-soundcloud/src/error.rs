//! Error types for the SoundCloud provider

use thiserror::Error;

/// SoundCloud provider errors
#[derive(Error, Debug)]
pub enum SoundCloudError {
    /// A transcoding or playlist URL could not be parsed
    #[error("Invalid URL {url}: {message}")]
    InvalidUrl { url: String, message: String },

    /// API request returned an error
    #[error("SoundCloud API error (status {status_code}): {message}")]
    ApiError { status_code: u16, message: String },

    /// Failed to parse API response or playlist
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// The playlist lists no segments
    #[error("Playlist contains no segments")]
    EmptyPlaylist,

    /// The playlist uses a feature the segment reader cannot play
    #[error("Unsupported playlist: {0}")]
    UnsupportedPlaylist(String),

    /// Bridge error
    #[error(transparent)]
    BridgeError(#[from] bridge_traits::error::BridgeError),
}

/// Result type for SoundCloud operations
pub type Result<T> = std::result::Result<T, SoundCloudError>;

impl From<SoundCloudError> for bridge_traits::error::BridgeError {
    fn from(error: SoundCloudError) -> Self {
        match error {
            SoundCloudError::BridgeError(e) => e,
            other => bridge_traits::error::BridgeError::OperationFailed(other.to_string()),
        }
    }
}
