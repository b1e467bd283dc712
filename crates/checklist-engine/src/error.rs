//! Error types for checklist engine operations.

use database::DatabaseError;
use thiserror::Error;

/// Errors that can occur in the checklist lifecycle.
///
/// The bot path never forwards these to the transport; each kind maps to a
/// reply and (for `Auth`) to clearing the session.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed input, stale item or forbidden transition.
    #[error("{0}")]
    Input(String),

    /// Unknown or inactive operator, or missing permission.
    #[error("not authorized: {0}")]
    Auth(String),

    /// A referenced record does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Uniqueness violation, usually a creation race.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Store failure; retrying is safe.
    #[error("temporary store error: {0}")]
    TransientStore(String),

    /// The operation cannot proceed at all (e.g. a type without items).
    #[error("{0}")]
    Fatal(String),

    /// QR image generation or write failed.
    #[error("QR error: {0}")]
    Qr(String),
}

impl From<DatabaseError> for EngineError {
    fn from(e: DatabaseError) -> Self {
        match e {
            DatabaseError::NotFound { entity, id } => {
                EngineError::NotFound(format!("{} {}", entity, id))
            }
            DatabaseError::AlreadyExists { entity, id } => {
                EngineError::Conflict(format!("{} {}", entity, id))
            }
            DatabaseError::Invalid(v) => EngineError::Input(v.to_string()),
            DatabaseError::Immutable { entity, id } => {
                EngineError::Input(format!("{} {} is referenced and cannot change", entity, id))
            }
            other => EngineError::TransientStore(other.to_string()),
        }
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_error_mapping() {
        let not_found = DatabaseError::NotFound {
            entity: "Checklist",
            id: "x".into(),
        };
        assert!(matches!(EngineError::from(not_found), EngineError::NotFound(_)));

        let exists = DatabaseError::AlreadyExists {
            entity: "Checklist",
            id: "1/2025-01-01/MORNING".into(),
        };
        assert!(matches!(EngineError::from(exists), EngineError::Conflict(_)));

        let sqlx = DatabaseError::Sqlx(sqlx_pool_timeout());
        assert!(matches!(EngineError::from(sqlx), EngineError::TransientStore(_)));
    }

    fn sqlx_pool_timeout() -> database::sqlx::Error {
        database::sqlx::Error::PoolTimedOut
    }
}
