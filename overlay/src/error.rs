//! Error types for overlay operations

use thiserror::Error;

use crate::transparency::Transparency;

/// Errors reported by the overlay handle and its display backend.
///
/// Backend failures are carried as strings so the same error can be handed
/// to every caller that was waiting on the failed batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AosdError {
    #[error("display unavailable: {0}")]
    DisplayUnavailable(String),

    #[error("transparency mode {0:?} is not supported by this display")]
    UnsupportedMode(Transparency),

    #[error("failed to allocate display resource: {0}")]
    AllocationFailure(String),

    #[error("failed to start update thread: {0}")]
    ThreadStartFailure(String),

    #[error("display request failed: {0}")]
    Backend(String),

    #[error("no renderer assigned")]
    NoRenderer,

    #[error("output {0} does not exist")]
    InvalidOutput(usize),

    #[error("overlay has been destroyed")]
    Finished,
}

pub type Result<T, E = AosdError> = std::result::Result<T, E>;
