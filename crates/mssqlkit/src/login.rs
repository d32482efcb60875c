//! Server-level logins and their sessions.

use crate::backend::Connection;
use crate::error::{DropStep, ObjectKind, Result};
use crate::identifier::{Identifier, Password};
use crate::inspector::Inspector;
use crate::retry::{self, RetryCallback};
use crate::statement::{self, Statement};
use crate::types::{LoginCreate, RetryPolicy, ServerLogin};
use serde::Serialize;
use std::sync::Arc;

/// Outcome of [`LoginManager::kill_sessions`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct KillReport {
    /// Sessions that were terminated
    pub killed: Vec<i64>,
    /// Sessions whose `KILL` failed, with the reason
    pub failed: Vec<(i64, String)>,
}

impl KillReport {
    /// Whether every enumerated session was terminated.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Create and drop logins, and terminate their sessions.
pub struct LoginManager {
    conn: Arc<dyn Connection>,
    inspector: Inspector,
    retry: RetryPolicy,
    callback: Arc<dyn RetryCallback + Send + Sync>,
}

impl LoginManager {
    /// Create a manager over `conn`.
    pub fn new(
        conn: Arc<dyn Connection>,
        retry: RetryPolicy,
        callback: Arc<dyn RetryCallback + Send + Sync>,
    ) -> Self {
        Self {
            inspector: Inspector::new(conn.clone()),
            conn,
            retry,
            callback,
        }
    }

    fn execute(&self, stmt: &Statement) -> Result<()> {
        log::debug!("{stmt}");
        self.conn.execute(stmt.sql())
    }

    /// Create a login with password policy and expiration checks off, and
    /// return it as read back from the server.
    pub fn create_login(&self, spec: &LoginCreate) -> Result<ServerLogin> {
        let name = Identifier::new(ObjectKind::Login, &spec.name)?;
        let default_db = Identifier::new(ObjectKind::Database, &spec.default_database)?;

        self.execute(&statement::create_login(&name, &spec.password, &default_db))?;
        log::info!("Created login {name}");
        self.inspector.get_login_by_name(&spec.name)
    }

    /// Drop a login, retrying under the manager's policy.
    ///
    /// Users mapped to the login in any database are left in place.
    pub fn drop_login(&self, name: &str) -> Result<()> {
        let login = Identifier::new(ObjectKind::Login, name)?;
        let callback = Some(self.callback.as_ref() as &dyn RetryCallback);

        retry::with_retry(&self.retry, name, DropStep::DropLogin, callback, || {
            self.execute(&statement::drop_login(&login))
        })?;
        log::info!("Dropped login {login}");
        Ok(())
    }

    /// Terminate every session owned by `login`.
    ///
    /// Enumeration failures propagate. A failing `KILL` is logged and
    /// recorded in the report; the remaining sessions are still attempted.
    pub fn kill_sessions(&self, login: &str) -> Result<KillReport> {
        let sessions = self.inspector.sessions_for_login(login)?;
        let mut report = KillReport::default();

        for session in sessions {
            match self.execute(&statement::kill_session(session.session_id)) {
                Ok(()) => {
                    log::info!("Killed session {} of {login}", session.session_id);
                    report.killed.push(session.session_id);
                }
                Err(e) => {
                    log::warn!("Failed to kill session {} of {login}: {e}", session.session_id);
                    report.failed.push((session.session_id, e.to_string()));
                }
            }
        }

        Ok(report)
    }

    /// Add `login` to the server role `role`.
    pub fn add_server_role_member(&self, role: &str, login: &str) -> Result<()> {
        let role = Identifier::new(ObjectKind::Role, role)?;
        let login = Identifier::new(ObjectKind::Login, login)?;

        self.execute(&statement::add_server_role_member(&role, &login))?;
        log::info!("Added login {login} to server role {role}");
        Ok(())
    }
}

/// Build a [`LoginCreate`], validating the password.
pub fn login_create(name: &str, password: &str, default_database: &str) -> Result<LoginCreate> {
    Ok(LoginCreate {
        name: name.to_string(),
        password: Password::new(password)?,
        default_database: default_database.to_string(),
    })
}
