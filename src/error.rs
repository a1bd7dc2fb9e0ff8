use thiserror::Error;

/// Failure taxonomy for roster and bay-map operations.
///
/// Construction-time `Validation` errors are fatal to the caller; the
/// remaining variants are returned to the bridge, which logs them and drops
/// the triggering message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParkError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("car `{0}` is already in the car park")]
    DuplicateCar(String),

    #[error("state conflict: {0}")]
    StateConflict(String),

    #[error("not found: {0}")]
    NotFound(String),
}
