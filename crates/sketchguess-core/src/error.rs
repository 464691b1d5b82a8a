//! Client error taxonomy.

use thiserror::Error;

use crate::surface::SurfaceError;

/// Errors raised by the client core.
///
/// None of these are fatal. Protocol violations heal themselves with an
/// implicit clear, everything else is surfaced to the UI as a notice.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),
    #[error("Username must be at least {min} characters")]
    InvalidUsername { min: usize },
    #[error("Invalid stroke width: {0}")]
    InvalidWidth(f64),
    #[error("Publish failed: {0}")]
    TransientPublish(String),
    #[error("Surface error: {0}")]
    Surface(#[from] SurfaceError),
}

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;
