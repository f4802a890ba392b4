use thiserror::Error;

/// Typed outcomes of the lifecycle operations.
///
/// Unauthorized and InvalidState are caller logic errors and are never
/// retried. SlotUnavailable is recoverable by picking another slot.
/// SideEffect means the whole operation was rolled back before commit, so a
/// retry re-runs it from scratch.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("veterinarian already booked at this instant")]
    SlotUnavailable,

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("side-effect dispatch failed: {0}")]
    SideEffect(String),

    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),
}
