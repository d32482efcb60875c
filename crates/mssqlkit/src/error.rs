//! Error types for SQL Server reconciliation.
//!
//! Errors are categorized so callers can tell an expected outcome of an
//! existence check (`NotFound`) from a refused mutation (`Conflict`,
//! `PreconditionUnmet`) and from failures reported by the server itself.

use std::fmt;
use thiserror::Error;

/// Kind of server object an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    /// A database on the instance
    Database,
    /// A server-level login
    Login,
    /// A database-scoped user
    User,
    /// A server or database role
    Role,
    /// A schema inside a database
    Schema,
    /// A backup file, path or logical file name
    BackupFile,
    /// A login password
    Password,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Database => "database",
            Self::Login => "login",
            Self::User => "user",
            Self::Role => "role",
            Self::Schema => "schema",
            Self::BackupFile => "backup file",
            Self::Password => "password",
        };
        write!(f, "{s}")
    }
}

/// The retried step of a destructive operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DropStep {
    /// `ALTER DATABASE ... SET SINGLE_USER WITH ROLLBACK IMMEDIATE`
    SingleUser,
    /// `DROP DATABASE ...`
    DropDatabase,
    /// `DROP LOGIN ...`
    DropLogin,
}

impl fmt::Display for DropStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::SingleUser => "switch to single-user mode",
            Self::DropDatabase => "drop database",
            Self::DropLogin => "drop login",
        };
        write!(f, "{s}")
    }
}

/// Categories of errors, used for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Lookup found no row
    NotFound,
    /// Create or restore over an existing object
    Conflict,
    /// Retry budget exhausted on a destructive operation
    DropFailed,
    /// A dependent object is missing
    PreconditionUnmet,
    /// Failure reported by the server or the driver
    Server,
    /// Input rejected before any statement was built
    Validation,
}

impl ErrorCategory {
    /// Get a user-friendly description of this error category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::NotFound => "Object not found",
            Self::Conflict => "Object already exists",
            Self::DropFailed => "Drop did not complete",
            Self::PreconditionUnmet => "Required object is missing",
            Self::Server => "Server error",
            Self::Validation => "Invalid name or value",
        }
    }

    /// Get actionable advice for resolving this error category.
    pub fn advice(&self) -> &'static str {
        match self {
            Self::NotFound => "Check the object name and the database it belongs to",
            Self::Conflict => "Remove the existing object or drop the backup from the manifest",
            Self::DropFailed => {
                "Sessions may still be open; re-run to resume the drop or close them manually"
            }
            Self::PreconditionUnmet => "Declare the missing object or apply it first",
            Self::Server => "Check connectivity and the permissions of the connecting login",
            Self::Validation => {
                "Names may only use letters, digits and _ @ # $ -; values may not contain quotes"
            }
        }
    }
}

/// Errors that can occur while inspecting or changing a server.
#[derive(Debug, Error)]
pub enum Error {
    /// A lookup returned no row
    #[error("{kind} not found: {name}")]
    NotFound {
        /// Kind of the missing object
        kind: ObjectKind,
        /// Name that was looked up
        name: String,
    },

    /// Attempted to create or restore over an existing object
    #[error("{kind} already exists: {name}")]
    Conflict {
        /// Kind of the existing object
        kind: ObjectKind,
        /// Name of the existing object
        name: String,
    },

    /// A retried destructive step ran out of attempts
    #[error("failed to {step} for {target} after {attempts} attempts")]
    DropFailed {
        /// Object being dropped
        target: String,
        /// Step that failed
        step: DropStep,
        /// Attempts made
        attempts: u32,
        /// Last underlying failure
        #[source]
        source: Box<Error>,
    },

    /// An object required by the operation is absent
    #[error("cannot {purpose}: {kind} {name} does not exist")]
    PreconditionUnmet {
        /// Kind of the missing object
        kind: ObjectKind,
        /// Name of the missing object
        name: String,
        /// What the caller was trying to do
        purpose: String,
    },

    /// Opaque failure from the query or exec call
    #[error("server error: {message}")]
    Server {
        /// Message reported by the server
        message: String,
    },

    /// The connection could not be established or was lost
    #[error("connection error: {message}")]
    Connection {
        /// Driver message
        message: String,
    },

    /// A name rejected by the identifier channel
    #[error("invalid {kind} name {value:?}: {reason}")]
    InvalidIdentifier {
        /// Kind of object the name was for
        kind: ObjectKind,
        /// Rejected value
        value: String,
        /// Why it was rejected
        reason: &'static str,
    },

    /// A string value rejected by the literal channel
    #[error("invalid {kind} value: {reason}")]
    InvalidLiteral {
        /// Kind of value
        kind: ObjectKind,
        /// Why it was rejected
        reason: &'static str,
    },

    /// A result row did not have the expected shape
    #[error("unexpected result from {query}: {message}")]
    Decode {
        /// Short label of the query
        query: &'static str,
        /// What was wrong
        message: String,
    },
}

impl Error {
    /// Get the error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::NotFound { .. } => ErrorCategory::NotFound,
            Error::Conflict { .. } => ErrorCategory::Conflict,
            Error::DropFailed { .. } => ErrorCategory::DropFailed,
            Error::PreconditionUnmet { .. } => ErrorCategory::PreconditionUnmet,
            Error::Server { .. } | Error::Connection { .. } | Error::Decode { .. } => {
                ErrorCategory::Server
            }
            Error::InvalidIdentifier { .. } | Error::InvalidLiteral { .. } => {
                ErrorCategory::Validation
            }
        }
    }

    /// Whether this error only reports that a lookup found nothing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    /// The step named by a `DropFailed` error.
    pub fn drop_step(&self) -> Option<DropStep> {
        match self {
            Error::DropFailed { step, .. } => Some(*step),
            _ => None,
        }
    }

    pub(crate) fn server(message: impl Into<String>) -> Self {
        Error::Server {
            message: message.into(),
        }
    }

    pub(crate) fn precondition(kind: ObjectKind, name: &str, purpose: impl Into<String>) -> Self {
        Error::PreconditionUnmet {
            kind,
            name: name.to_string(),
            purpose: purpose.into(),
        }
    }
}

#[cfg(feature = "tds")]
impl From<tiberius::error::Error> for Error {
    fn from(err: tiberius::error::Error) -> Self {
        match err {
            tiberius::error::Error::Server(token) => Error::Server {
                message: format!("{} (error {})", token.message(), token.code()),
            },
            other => Error::Connection {
                message: other.to_string(),
            },
        }
    }
}

/// Result type for server operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drop_failed_names_step() {
        let err = Error::DropFailed {
            target: "orders_db".to_string(),
            step: DropStep::SingleUser,
            attempts: 3,
            source: Box::new(Error::server("database is in use")),
        };

        assert_eq!(
            err.to_string(),
            "failed to switch to single-user mode for orders_db after 3 attempts"
        );
        let source = std::error::Error::source(&err).map(ToString::to_string);
        assert_eq!(source.as_deref(), Some("server error: database is in use"));
        assert_eq!(err.drop_step(), Some(DropStep::SingleUser));
        assert_eq!(err.category(), ErrorCategory::DropFailed);
    }

    #[test]
    fn test_precondition_message() {
        let err = Error::precondition(ObjectKind::Login, "svc_login", "bind user svc_user");
        assert_eq!(
            err.to_string(),
            "cannot bind user svc_user: login svc_login does not exist"
        );
    }

    #[test]
    fn test_categories() {
        let not_found = Error::NotFound {
            kind: ObjectKind::User,
            name: "x".to_string(),
        };
        assert!(not_found.is_not_found());
        assert_eq!(not_found.category(), ErrorCategory::NotFound);

        let invalid = Error::InvalidLiteral {
            kind: ObjectKind::Password,
            reason: "contains a quote",
        };
        assert_eq!(invalid.category(), ErrorCategory::Validation);
        assert!(!ErrorCategory::Server.advice().is_empty());
    }
}
