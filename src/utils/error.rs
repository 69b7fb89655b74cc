use std::fmt;

/// Request-terminating failure classes. Handlers map these onto HTTP
/// statuses; only `Validation`, `NotFound` and `Conflict` messages are
/// allowed to reach the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    Validation(String),
    NotFound(String),
    Conflict(String),
    Provider(String),
    Database(String),
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceError::Validation(msg) => write!(f, "Validation error: {}", msg),
            ServiceError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ServiceError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ServiceError::Provider(msg) => write!(f, "Provider error: {}", msg),
            ServiceError::Database(msg) => write!(f, "Database error: {}", msg),
        }
    }
}

impl std::error::Error for ServiceError {}
