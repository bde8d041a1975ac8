use thiserror::Error;

/// Errors that can occur in the mixdown pipeline.
///
/// Two families with different policies: per-buffer problems
/// (`ConversionFailed`, `BufferAllocationFailed`) mean the offending buffer
/// is dropped and the session continues; structural problems
/// (`AlreadyRunning`, `NoActiveSession`, `Io`) are surfaced to the caller
/// immediately and are terminal for the current operation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MixdownError {
    #[error("a recording session is already running")]
    AlreadyRunning,

    #[error("no active recording session")]
    NoActiveSession,

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("sample conversion failed: {0}")]
    ConversionFailed(String),

    #[error("buffer allocation failed: {0}")]
    BufferAllocationFailed(String),

    #[error("i/o error: {0}")]
    Io(String),

    #[error("operation cancelled")]
    Cancelled,
}

impl MixdownError {
    /// Whether this error follows the dropped-buffer policy: log it, skip
    /// the buffer, keep the session alive.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::ConversionFailed(_) | Self::BufferAllocationFailed(_)
        )
    }
}
