use crate::types::{Collection, Role};
use thiserror::Error;

// ---------------------------------------------------------------------------
// PermissionDenied
// ---------------------------------------------------------------------------

/// Why the authorization gate or the identity service refused an action.
///
/// The `Display` text is meant to be shown to the user as-is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PermissionDenied {
    #[error("a {role} cannot {operation}")]
    Role { role: Role, operation: String },

    #[error("wrong password")]
    WrongCredential,

    #[error("too many failed attempts, try again later")]
    TooManyAttempts,

    #[error("the supplied credential belongs to a different account")]
    AccountMismatch,

    #[error("invalid credential")]
    InvalidCredential,

    #[error("not signed in")]
    Unauthenticated,
}

// ---------------------------------------------------------------------------
// CrewtrackError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum CrewtrackError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("permission denied: {0}")]
    Permission(#[from] PermissionDenied),

    #[error("persistence failure: {0}")]
    Persistence(String),

    #[error("{collection} record not found: {id}")]
    NotFound { collection: Collection, id: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl CrewtrackError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn persistence(msg: impl std::fmt::Display) -> Self {
        Self::Persistence(msg.to_string())
    }

    pub fn not_found(collection: Collection, id: impl Into<String>) -> Self {
        Self::NotFound {
            collection,
            id: id.into(),
        }
    }

    /// The permission sub-reason, if this is a permission failure.
    pub fn permission_reason(&self) -> Option<&PermissionDenied> {
        match self {
            Self::Permission(reason) => Some(reason),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, CrewtrackError>;
