//! Error types for the Deezer provider

use thiserror::Error;

/// Deezer provider errors
#[derive(Error, Debug)]
pub enum DeezerError {
    /// The master key is not 16 Latin-1 characters
    #[error("Invalid master key: {0}")]
    InvalidMasterKey(String),

    /// `deezer.ping` or `deezer.getUserData` failed
    #[error("Session handshake failed at {step}: {message}")]
    Handshake { step: String, message: String },

    /// A gateway call returned an error payload or an unexpected shape
    #[error("Gateway call {method} failed: {message}")]
    Gateway { method: String, message: String },

    /// The media URL endpoint refused to sign a download URL
    #[error(
        "Media URL request rejected: {message}. The elevated-entitlement credential has most likely been invalidated"
    )]
    MediaUrlRejected { message: String },

    /// Track lookup by ISRC found nothing
    #[error("No Deezer track matches ISRC {isrc}")]
    IsrcNotFound { isrc: String },

    /// The ciphered payload could not be decrypted
    #[error("Cipher error: {0}")]
    Cipher(String),

    /// Failed to parse API response
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Bridge error
    #[error(transparent)]
    BridgeError(#[from] bridge_traits::error::BridgeError),
}

impl DeezerError {
    /// Whether the failure came from the session or licensing side.
    ///
    /// Cached tokens should be dropped after any of these.
    pub fn is_licensing(&self) -> bool {
        matches!(
            self,
            DeezerError::Handshake { .. }
                | DeezerError::Gateway { .. }
                | DeezerError::MediaUrlRejected { .. }
        )
    }
}

/// Result type for Deezer operations
pub type Result<T> = std::result::Result<T, DeezerError>;

impl From<DeezerError> for bridge_traits::error::BridgeError {
    fn from(error: DeezerError) -> Self {
        match error {
            DeezerError::BridgeError(e) => e,
            other => bridge_traits::error::BridgeError::OperationFailed(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_url_rejection_mentions_credential() {
        let error = DeezerError::MediaUrlRejected {
            message: "License token invalid".to_string(),
        };

        let text = error.to_string();
        assert!(text.starts_with("Media URL request rejected: License token invalid"));
        assert!(text.contains("elevated-entitlement credential"));
        assert!(error.is_licensing());
    }

    #[test]
    fn test_licensing_classification() {
        let handshake = DeezerError::Handshake {
            step: "deezer.ping".to_string(),
            message: "timeout".to_string(),
        };
        assert!(handshake.is_licensing());
        assert!(!DeezerError::Cipher("bad block".to_string()).is_licensing());
        assert!(!DeezerError::IsrcNotFound {
            isrc: "USUM71703861".to_string()
        }
        .is_licensing());
    }

    #[test]
    fn test_error_conversion() {
        let error = DeezerError::Cipher("short block".to_string());
        let bridge_error: bridge_traits::error::BridgeError = error.into();

        assert!(matches!(
            bridge_error,
            bridge_traits::error::BridgeError::OperationFailed(_)
        ));
    }
}
