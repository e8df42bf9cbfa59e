use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Core initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Runtime error: {0}")]
    Runtime(#[from] core_runtime::Error),

    #[error("Playback error: {0}")]
    Playback(#[from] core_playback::PlaybackError),
}

impl CoreError {
    /// Returns `true` if the licensing backend rejected the request.
    pub fn is_licensing(&self) -> bool {
        matches!(self, CoreError::Playback(e) if e.is_licensing())
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
