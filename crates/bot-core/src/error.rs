//! Reply delivery errors.

use thiserror::Error;

/// Errors that can occur while delivering a reply.
#[derive(Debug, Error)]
pub enum SendError {
    /// The transport could not be reached or timed out.
    #[error("transport error: {0}")]
    Transport(String),

    /// The transport refused the reply.
    #[error("reply rejected: {0}")]
    Rejected(String),
}
