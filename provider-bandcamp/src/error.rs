//! Error types for the Bandcamp provider

use thiserror::Error;

/// Bandcamp provider errors
#[derive(Error, Debug)]
pub enum BandcampError {
    /// Page request returned an error status
    #[error("Bandcamp page request failed (status {status_code})")]
    PageUnavailable { status_code: u16 },

    /// The page carried no player data
    #[error("No embedded player data found on page")]
    PlayerDataMissing,

    /// Player data was present but had no stream URL
    #[error("No stream URL found for {page}")]
    StreamUrlMissing { page: String },

    /// Bridge error
    #[error(transparent)]
    BridgeError(#[from] bridge_traits::error::BridgeError),
}

/// Result type for Bandcamp operations
pub type Result<T> = std::result::Result<T, BandcampError>;

impl From<BandcampError> for bridge_traits::error::BridgeError {
    fn from(error: BandcampError) -> Self {
        match error {
            BandcampError::BridgeError(e) => e,
            other => bridge_traits::error::BridgeError::OperationFailed(other.to_string()),
        }
    }
}
