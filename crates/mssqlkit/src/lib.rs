//! # mssqlkit
//!
//! Pure Rust library for converging SQL Server databases, logins and users.
//!
//! This crate provides functionality for:
//! - Reading the server catalogs (databases, users, logins, sessions, roles)
//! - Creating, restoring and dropping databases
//! - Creating and dropping logins, killing their sessions
//! - Retrying drops that race with locks held by other sessions
//! - Idempotent ensure-exists / ensure-absent reconciliation
//!
//! ## Example
//!
//! ```no_run
//! use mssqlkit::{ConnectSettings, DatabaseSpec, Server};
//!
//! let settings = ConnectSettings::new("localhost", "sa", "Passw0rd!");
//! let server = Server::connect(&settings).expect("connection failed");
//!
//! let result = server
//!     .reconciler()
//!     .ensure_database_exists(&DatabaseSpec::new("orders_db"))
//!     .expect("reconcile failed");
//! println!("orders_db: {}", result.change);
//! ```
//!
//! ## Testing
//!
//! [`backend::memory::MemoryServer`] implements [`backend::Connection`] in
//! memory, with fault injection:
//!
//! ```
//! use mssqlkit::{DatabaseSpec, Server};
//! use mssqlkit::backend::memory::MemoryServer;
//! use std::sync::Arc;
//!
//! let memory = Arc::new(MemoryServer::new());
//! let server = Server::with_connection(memory.clone());
//! server.reconciler().ensure_database_exists(&DatabaseSpec::new("orders_db")).unwrap();
//! assert_eq!(memory.database_names(), vec!["orders_db"]);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod database;
pub mod error;
pub mod identifier;
pub mod inspector;
pub mod login;
pub mod reconcile;
pub mod retry;
#[allow(missing_docs)]
pub mod statement;
pub mod types;

pub use database::DatabaseManager;
pub use error::{DropStep, Error, ErrorCategory, ObjectKind, Result};
pub use identifier::{Identifier, Literal, Password};
pub use inspector::Inspector;
pub use login::{KillReport, LoginManager, login_create};
pub use reconcile::{
    DatabaseSpec, LoginSpec, Reconciled, Reconciler, TargetDirs, UserLoginSpec, UserSpec,
};
pub use types::{
    BackupDescriptor, Change, DatabaseState, DatabaseUser, RestoreTarget, RetryPolicy,
    ServerLogin, Session, UserAccess,
};

#[cfg(feature = "tds")]
pub use backend::tds::ConnectSettings;

use backend::Connection;
use retry::{LogCallback, RetryCallback};
use std::sync::Arc;

/// High-level handle to one SQL Server instance.
///
/// Wraps a shared connection and hands out the inspector, managers and
/// reconciler, all configured with the same retry policy.
#[derive(Clone)]
pub struct Server {
    conn: Arc<dyn Connection>,
    retry: RetryPolicy,
    callback: Arc<dyn RetryCallback + Send + Sync>,
}

impl Server {
    /// Connect to a live server.
    #[cfg(feature = "tds")]
    pub fn connect(settings: &ConnectSettings) -> Result<Self> {
        let conn = backend::tds::TdsConnection::connect(settings)?;
        Ok(Self::with_connection(Arc::new(conn)))
    }

    /// Create a server handle over any connection (useful for testing).
    pub fn with_connection(conn: Arc<dyn Connection>) -> Self {
        Self {
            conn,
            retry: RetryPolicy::default(),
            callback: Arc::new(LogCallback),
        }
    }

    /// Use a custom retry policy for drop steps.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Report retries through `callback` instead of the log.
    pub fn with_retry_callback(mut self, callback: Arc<dyn RetryCallback + Send + Sync>) -> Self {
        self.callback = callback;
        self
    }

    /// Catalog reader.
    pub fn inspector(&self) -> Inspector {
        Inspector::new(self.conn.clone())
    }

    /// Lifecycle manager for the database called `name`.
    pub fn database(&self, name: &str) -> Result<DatabaseManager> {
        DatabaseManager::new(self.conn.clone(), name, self.retry, self.callback.clone())
    }

    /// Login manager.
    pub fn logins(&self) -> LoginManager {
        LoginManager::new(self.conn.clone(), self.retry, self.callback.clone())
    }

    /// Ensure-exists / ensure-absent facade.
    pub fn reconciler(&self) -> Reconciler {
        Reconciler::new(self.conn.clone(), self.retry, self.callback.clone())
    }
}
