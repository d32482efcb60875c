//! Core types for SQL Server reconciliation.

use crate::identifier::Password;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Directory used for restored files when no target is given.
pub const DEFAULT_FILE_DIR: &str = "/var/opt/mssql";

/// Backup-set position used by `RESTORE ... WITH FILE =` when none is given.
pub const DEFAULT_BACKUP_FILE_NUMBER: u32 = 2;

/// Access mode of a database, from `sys.databases.user_access_desc`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserAccess {
    /// Normal access
    MultiUser,
    /// At most one connection
    SingleUser,
    /// Only privileged principals
    RestrictedUser,
}

impl UserAccess {
    /// Parse the catalog description (`MULTI_USER`, `SINGLE_USER`, `RESTRICTED_USER`).
    pub fn from_catalog(desc: &str) -> Option<Self> {
        match desc.trim() {
            "MULTI_USER" => Some(Self::MultiUser),
            "SINGLE_USER" => Some(Self::SingleUser),
            "RESTRICTED_USER" => Some(Self::RestrictedUser),
            _ => None,
        }
    }

    /// Catalog description of this mode.
    pub fn as_catalog(&self) -> &'static str {
        match self {
            Self::MultiUser => "MULTI_USER",
            Self::SingleUser => "SINGLE_USER",
            Self::RestrictedUser => "RESTRICTED_USER",
        }
    }
}

/// Point-in-time state of an existing database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseState {
    /// Database name
    pub name: String,
    /// Current access mode
    pub user_access: UserAccess,
    /// `state_desc`, e.g. `ONLINE` or `RESTORING`
    pub state: String,
}

impl DatabaseState {
    /// Whether a drop was interrupted after the single-user switch.
    pub fn drop_pending(&self) -> bool {
        self.user_access == UserAccess::SingleUser
    }
}

/// A database-scoped principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseUser {
    /// User name
    pub name: String,
    /// Default schema
    pub default_schema: String,
    /// Login the user authenticates through, if any
    pub login: Option<String>,
}

/// A server-level login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerLogin {
    /// Login name
    pub name: String,
    /// Server-assigned principal id
    pub principal_id: i64,
    /// Base64 text of the raw sid bytes
    pub sid: String,
    /// Default database
    pub default_database: String,
}

/// An active session on the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Session id (spid)
    pub session_id: i64,
    /// Login that owns the session
    pub login_name: String,
    /// Client host, when reported
    pub host_name: Option<String>,
}

/// A backup artifact containing one data file and one log file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupDescriptor {
    /// Server-local path of the `.bak` file
    pub path: String,
    /// Logical name of the data file inside the backup
    pub data_file_name: String,
    /// Logical name of the log file inside the backup
    pub log_file_name: String,
    /// Backup-set position inside the file
    pub file_number: u32,
}

impl BackupDescriptor {
    /// Describe a backup using the default backup-set position.
    pub fn new(path: &str, data_file_name: &str, log_file_name: &str) -> Self {
        Self {
            path: path.to_string(),
            data_file_name: data_file_name.to_string(),
            log_file_name: log_file_name.to_string(),
            file_number: DEFAULT_BACKUP_FILE_NUMBER,
        }
    }

    /// Use a specific backup-set position.
    pub fn with_file_number(mut self, file_number: u32) -> Self {
        self.file_number = file_number;
        self
    }
}

/// Directories the restored physical files are written to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreTarget {
    /// Directory for the `.mdf` file
    pub data_file_dir: String,
    /// Directory for the `.ldf` file
    pub log_file_dir: String,
}

impl Default for RestoreTarget {
    fn default() -> Self {
        Self {
            data_file_dir: DEFAULT_FILE_DIR.to_string(),
            log_file_dir: DEFAULT_FILE_DIR.to_string(),
        }
    }
}

impl RestoreTarget {
    /// Create a target from explicit directories.
    pub fn new(data_file_dir: &str, log_file_dir: &str) -> Self {
        Self {
            data_file_dir: data_file_dir.to_string(),
            log_file_dir: log_file_dir.to_string(),
        }
    }

    /// Physical data file path. Always joined with `/`.
    pub fn data_file_path(&self, database: &str) -> String {
        format!("{}/{}.mdf", self.data_file_dir, database)
    }

    /// Physical log file path. Always joined with `/`.
    pub fn log_file_path(&self, database: &str) -> String {
        format!("{}/{}.ldf", self.log_file_dir, database)
    }
}

/// Arguments for `CREATE LOGIN`.
#[derive(Debug, Clone)]
pub struct LoginCreate {
    /// Login name
    pub name: String,
    /// Password, checked by the literal channel
    pub password: Password,
    /// Default database
    pub default_database: String,
}

/// Arguments for `CREATE USER`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserCreate {
    /// User name
    pub name: String,
    /// Default schema
    pub default_schema: String,
}

/// Bounded retry with a fixed delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first
    pub attempts: u32,
    /// Sleep between attempts
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Create a policy with custom settings.
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            delay,
        }
    }
}

/// What a reconciliation step did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Change {
    /// The object was created
    Created,
    /// The database was restored from a backup
    Restored,
    /// The object existed and was changed (binding, roles)
    Updated,
    /// The object was dropped
    Removed,
    /// Nothing to do
    Unchanged,
    /// Destroy requested but the object is kept (drop flag off)
    Retained,
}

impl Change {
    /// Whether the server was modified.
    pub fn is_change(&self) -> bool {
        matches!(
            self,
            Self::Created | Self::Restored | Self::Updated | Self::Removed
        )
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::Restored => "restored",
            Self::Updated => "updated",
            Self::Removed => "removed",
            Self::Unchanged => "unchanged",
            Self::Retained => "retained",
        };
        write!(f, "{s}")
    }
}
