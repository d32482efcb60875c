//! Read-only catalog queries.
//!
//! Nothing is cached: every call reflects the server at the moment it runs.
//! Lookups fail only when the query itself fails; a missing object is
//! `Ok(false)`, `Ok(None)` or [`Error::NotFound`] depending on the method.

use crate::backend::{Connection, Row};
use crate::error::{Error, ObjectKind, Result};
use crate::identifier::Identifier;
use crate::statement;
use crate::types::{DatabaseState, DatabaseUser, RestoreTarget, ServerLogin, Session, UserAccess};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use std::sync::Arc;

/// Catalog reader over a shared connection.
#[derive(Clone)]
pub struct Inspector {
    conn: Arc<dyn Connection>,
}

impl Inspector {
    /// Create an inspector over `conn`.
    pub fn new(conn: Arc<dyn Connection>) -> Self {
        Self { conn }
    }

    fn query(&self, sql: &str, params: &[&str]) -> Result<Vec<Row>> {
        log::debug!("query: {sql} {params:?}");
        self.conn.query(sql, params)
    }

    /// Whether a database named `name` exists.
    pub fn database_exists(&self, name: &str) -> Result<bool> {
        Ok(!self.query(statement::DATABASE_EXISTS, &[name])?.is_empty())
    }

    /// Access mode and state of `name`, or `None` if it does not exist.
    pub fn database_state(&self, name: &str) -> Result<Option<DatabaseState>> {
        const QUERY: &str = "database state";
        let Some(row) = self.query(statement::DATABASE_STATE, &[name])?.into_iter().next() else {
            return Ok(None);
        };

        let access = row.text(1, QUERY)?;
        let user_access = UserAccess::from_catalog(&access).ok_or_else(|| Error::Decode {
            query: QUERY,
            message: format!("unknown user access {access:?}"),
        })?;

        Ok(Some(DatabaseState {
            name: row.text(0, QUERY)?,
            user_access,
            state: row.text(2, QUERY)?,
        }))
    }

    /// Whether `user` exists in `db`. Only SQL, Windows, group and external
    /// principals count; roles with the same name do not.
    pub fn user_exists(&self, db: &str, user: &str) -> Result<bool> {
        let db = Identifier::new(ObjectKind::Database, db)?;
        Ok(!self.query(&statement::user_exists(&db), &[user])?.is_empty())
    }

    /// Read `user` from `db`, including the login it is bound to.
    pub fn get_user(&self, db: &str, user: &str) -> Result<DatabaseUser> {
        const QUERY: &str = "get user";
        let db = Identifier::new(ObjectKind::Database, db)?;
        let row = self
            .query(&statement::get_user(&db), &[user])?
            .into_iter()
            .next()
            .ok_or_else(|| Error::NotFound {
                kind: ObjectKind::User,
                name: format!("{db}.{user}"),
            })?;

        Ok(DatabaseUser {
            name: row.text(0, QUERY)?,
            default_schema: row.opt_text(1, QUERY)?.unwrap_or_default(),
            login: row.opt_text(2, QUERY)?,
        })
    }

    /// Whether a SQL login named `name` exists.
    pub fn login_exists(&self, name: &str) -> Result<bool> {
        Ok(!self.query(statement::LOGIN_EXISTS, &[name])?.is_empty())
    }

    /// Read a login by name. The sid is returned as base64 text.
    pub fn get_login_by_name(&self, name: &str) -> Result<ServerLogin> {
        const QUERY: &str = "get login";
        let row = self
            .query(statement::GET_LOGIN, &[name])?
            .into_iter()
            .next()
            .ok_or_else(|| Error::NotFound {
                kind: ObjectKind::Login,
                name: name.to_string(),
            })?;

        Ok(ServerLogin {
            name: row.text(0, QUERY)?,
            principal_id: row.int(1, QUERY)?,
            sid: BASE64.encode(row.bytes(2, QUERY)?),
            default_database: row.opt_text(3, QUERY)?.unwrap_or_default(),
        })
    }

    /// Sessions owned by `login`, excluding the caller's own session.
    pub fn sessions_for_login(&self, login: &str) -> Result<Vec<Session>> {
        const QUERY: &str = "sessions for login";
        self.query(statement::SESSIONS_FOR_LOGIN, &[login])?
            .iter()
            .map(|row| {
                Ok(Session {
                    session_id: row.int(0, QUERY)?,
                    login_name: row.text(1, QUERY)?,
                    host_name: row.opt_text(2, QUERY)?,
                })
            })
            .collect()
    }

    /// Instance default data and log directories, without trailing separators.
    pub fn default_file_paths(&self) -> Result<RestoreTarget> {
        const QUERY: &str = "default file paths";
        let row = self
            .query(statement::DEFAULT_FILE_PATHS, &[])?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Decode {
                query: QUERY,
                message: "no row returned".to_string(),
            })?;

        let trim = |path: String| path.trim_end_matches(['/', '\\']).to_string();
        Ok(RestoreTarget {
            data_file_dir: trim(row.text(0, QUERY)?),
            log_file_dir: trim(row.text(1, QUERY)?),
        })
    }

    /// Server roles `login` is a member of, sorted by name.
    pub fn login_server_roles(&self, login: &str) -> Result<Vec<String>> {
        self.names(statement::LOGIN_SERVER_ROLES, login, "login server roles")
    }

    /// Database roles `user` is a member of inside `db`, sorted by name.
    pub fn user_database_roles(&self, db: &str, user: &str) -> Result<Vec<String>> {
        let db = Identifier::new(ObjectKind::Database, db)?;
        self.names(&statement::user_database_roles(&db), user, "user database roles")
    }

    fn names(&self, sql: &str, param: &str, query: &'static str) -> Result<Vec<String>> {
        self.query(sql, &[param])?
            .iter()
            .map(|row| row.text(0, query))
            .collect()
    }
}
