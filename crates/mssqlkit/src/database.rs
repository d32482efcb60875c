//! Lifecycle of one database and the users inside it.

use crate::backend::Connection;
use crate::error::{DropStep, Error, ObjectKind, Result};
use crate::identifier::{Identifier, Literal};
use crate::inspector::Inspector;
use crate::retry::{self, RetryCallback};
use crate::statement::{self, RestoreArgs, Statement};
use crate::types::{BackupDescriptor, DatabaseUser, RestoreTarget, RetryPolicy, UserCreate};
use std::sync::Arc;

/// Create, restore and drop a single database, and manage its users.
///
/// Existence is re-checked immediately before every create or restore; the
/// manager holds no state about the server.
pub struct DatabaseManager {
    conn: Arc<dyn Connection>,
    inspector: Inspector,
    name: Identifier,
    retry: RetryPolicy,
    callback: Arc<dyn RetryCallback + Send + Sync>,
}

impl DatabaseManager {
    /// Create a manager for the database called `name`.
    pub fn new(
        conn: Arc<dyn Connection>,
        name: &str,
        retry: RetryPolicy,
        callback: Arc<dyn RetryCallback + Send + Sync>,
    ) -> Result<Self> {
        Ok(Self {
            inspector: Inspector::new(conn.clone()),
            conn,
            name: Identifier::new(ObjectKind::Database, name)?,
            retry,
            callback,
        })
    }

    /// Name of the managed database.
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    fn execute(&self, stmt: &Statement) -> Result<()> {
        log::debug!("{}: {stmt}", self.name);
        self.conn.execute(stmt.sql())
    }

    fn ensure_absent(&self) -> Result<()> {
        if self.exists()? {
            return Err(Error::Conflict {
                kind: ObjectKind::Database,
                name: self.name.to_string(),
            });
        }
        Ok(())
    }

    /// Whether the database exists right now.
    pub fn exists(&self) -> Result<bool> {
        self.inspector.database_exists(self.name.as_str())
    }

    /// Create an empty database. Refuses with `Conflict` if it already exists.
    pub fn create(&self) -> Result<()> {
        self.ensure_absent()?;
        self.execute(&statement::create_database(&self.name))?;
        log::info!("Created database {}", self.name);
        Ok(())
    }

    /// Restore the database from `backup`, relocating its files into `target`.
    ///
    /// The physical files are `<data_file_dir>/<name>.mdf` and
    /// `<log_file_dir>/<name>.ldf`. Refuses with `Conflict` if the database
    /// already exists.
    pub fn restore(&self, backup: &BackupDescriptor, target: &RestoreTarget) -> Result<()> {
        let literal = |value: &str| Literal::new(ObjectKind::BackupFile, value);
        let backup_path = literal(&backup.path)?;
        let data_file_name = literal(&backup.data_file_name)?;
        let log_file_name = literal(&backup.log_file_name)?;
        let data_file_path = literal(&target.data_file_path(self.name.as_str()))?;
        let log_file_path = literal(&target.log_file_path(self.name.as_str()))?;

        self.ensure_absent()?;
        self.execute(&statement::restore_database(&RestoreArgs {
            db: &self.name,
            backup_path: &backup_path,
            file_number: backup.file_number,
            data_file_name: &data_file_name,
            data_file_path: &data_file_path,
            log_file_name: &log_file_name,
            log_file_path: &log_file_path,
        }))?;
        log::info!("Restored database {} from {}", self.name, backup.path);
        Ok(())
    }

    /// Drop the database.
    ///
    /// Forces single-user mode, then drops. Each step is retried under the
    /// manager's policy. There is no existence check: dropping an absent
    /// database fails on the first step.
    pub fn drop(&self) -> Result<()> {
        let target = self.name.as_str();
        let callback = Some(self.callback.as_ref() as &dyn RetryCallback);

        retry::with_retry(&self.retry, target, DropStep::SingleUser, callback, || {
            self.execute(&statement::set_single_user(&self.name))
        })?;
        retry::with_retry(&self.retry, target, DropStep::DropDatabase, callback, || {
            self.execute(&statement::drop_database(&self.name))
        })?;

        log::info!("Dropped database {}", self.name);
        Ok(())
    }

    // =========================================================================
    // Users
    // =========================================================================

    /// Whether `user` exists in this database.
    pub fn user_exists(&self, user: &str) -> Result<bool> {
        self.inspector.user_exists(self.name.as_str(), user)
    }

    /// Read `user` from this database.
    pub fn get_user(&self, user: &str) -> Result<DatabaseUser> {
        self.inspector.get_user(self.name.as_str(), user)
    }

    /// Create a user and return it as read back from the server.
    pub fn create_user(&self, spec: &UserCreate) -> Result<DatabaseUser> {
        let user = Identifier::new(ObjectKind::User, &spec.name)?;
        let schema = Identifier::new(ObjectKind::Schema, &spec.default_schema)?;

        self.execute(&statement::create_user(&self.name, &user, &schema))?;
        log::info!("Created user {} in {}", user, self.name);
        self.get_user(&spec.name)
    }

    /// Bind `user` to `login`. Neither is checked for existence first.
    pub fn attach_user(&self, user: &str, login: &str) -> Result<()> {
        let user = Identifier::new(ObjectKind::User, user)?;
        let login = Identifier::new(ObjectKind::Login, login)?;

        self.execute(&statement::attach_user(&self.name, &user, &login))?;
        log::info!("Bound user {} in {} to login {}", user, self.name, login);
        Ok(())
    }

    /// Drop `user`. Not retried.
    pub fn drop_user(&self, user: &str) -> Result<()> {
        let user = Identifier::new(ObjectKind::User, user)?;

        self.execute(&statement::drop_user(&self.name, &user))?;
        log::info!("Dropped user {} from {}", user, self.name);
        Ok(())
    }

    /// Add `user` to the database role `role`.
    pub fn add_role_member(&self, role: &str, user: &str) -> Result<()> {
        let role = Identifier::new(ObjectKind::Role, role)?;
        let user = Identifier::new(ObjectKind::User, user)?;

        self.execute(&statement::add_role_member(&self.name, &role, &user))?;
        log::info!("Added user {} to role {} in {}", user, role, self.name);
        Ok(())
    }
}
