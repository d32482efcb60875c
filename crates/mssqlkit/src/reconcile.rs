//! Ensure-exists / ensure-absent per resource kind.
//!
//! Each call inspects the server, decides, acts through the managers and
//! reports what it did as a [`Change`] together with the record read back
//! from the server.

use crate::backend::Connection;
use crate::database::DatabaseManager;
use crate::error::{Error, ObjectKind, Result};
use crate::identifier::Password;
use crate::inspector::Inspector;
use crate::login::LoginManager;
use crate::retry::RetryCallback;
use crate::types::{
    BackupDescriptor, Change, DatabaseState, DatabaseUser, LoginCreate, RestoreTarget,
    RetryPolicy, ServerLogin, UserCreate,
};
use std::sync::Arc;

/// Where restored files go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetDirs {
    /// Explicit directories
    Fixed(RestoreTarget),
    /// The instance default data and log directories
    ServerDefault,
}

impl Default for TargetDirs {
    fn default() -> Self {
        Self::Fixed(RestoreTarget::default())
    }
}

/// Desired state of a database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseSpec {
    /// Database name
    pub name: String,
    /// Backup to provision from when the database is absent
    pub backup: Option<BackupDescriptor>,
    /// Directories for restored files
    pub target: TargetDirs,
}

impl DatabaseSpec {
    /// An empty database called `name`.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            backup: None,
            target: TargetDirs::default(),
        }
    }

    /// Provision from `backup` into `target`.
    pub fn with_backup(mut self, backup: BackupDescriptor, target: TargetDirs) -> Self {
        self.backup = Some(backup);
        self.target = target;
        self
    }
}

/// Desired state of a login.
#[derive(Debug, Clone)]
pub struct LoginSpec {
    /// Login name
    pub name: String,
    /// Password used when the login is created
    pub password: Password,
    /// Default database used when the login is created
    pub default_database: String,
    /// Server roles the login must belong to
    pub server_roles: Vec<String>,
}

/// Desired state of a database user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSpec {
    /// Database the user lives in
    pub database: String,
    /// User name
    pub name: String,
    /// Default schema used when the user is created
    pub default_schema: String,
    /// Login the user must be bound to
    pub login: Option<String>,
    /// Database roles the user must belong to
    pub roles: Vec<String>,
}

/// Desired binding of an existing user to an existing login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserLoginSpec {
    /// Database the user lives in
    pub database: String,
    /// User name
    pub username: String,
    /// Login to bind to
    pub login: String,
}

/// What a reconciliation did, and the resulting record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled<T> {
    /// What changed
    pub change: Change,
    /// Authoritative state after the change
    pub record: T,
}

/// Orchestrates the inspector and managers to converge one resource at a time.
pub struct Reconciler {
    conn: Arc<dyn Connection>,
    inspector: Inspector,
    logins: LoginManager,
    retry: RetryPolicy,
    callback: Arc<dyn RetryCallback + Send + Sync>,
}

impl Reconciler {
    /// Create a reconciler over `conn`.
    pub fn new(
        conn: Arc<dyn Connection>,
        retry: RetryPolicy,
        callback: Arc<dyn RetryCallback + Send + Sync>,
    ) -> Self {
        Self {
            inspector: Inspector::new(conn.clone()),
            logins: LoginManager::new(conn.clone(), retry, callback.clone()),
            conn,
            retry,
            callback,
        }
    }

    /// The underlying catalog reader.
    pub fn inspector(&self) -> &Inspector {
        &self.inspector
    }

    fn database(&self, name: &str) -> Result<DatabaseManager> {
        DatabaseManager::new(self.conn.clone(), name, self.retry, self.callback.clone())
    }

    fn resolve_target(&self, target: &TargetDirs) -> Result<RestoreTarget> {
        match target {
            TargetDirs::Fixed(dirs) => Ok(dirs.clone()),
            TargetDirs::ServerDefault => self.inspector.default_file_paths(),
        }
    }

    // =========================================================================
    // Databases
    // =========================================================================

    /// Make sure the database exists, restoring it from a backup if one is
    /// declared.
    ///
    /// A database that is already present is left alone, unless a backup is
    /// declared: restoring over it is refused with `Conflict`.
    pub fn ensure_database_exists(&self, spec: &DatabaseSpec) -> Result<Reconciled<DatabaseState>> {
        let db = self.database(&spec.name)?;

        if let Some(state) = self.inspector.database_state(&spec.name)? {
            if spec.backup.is_some() {
                return Err(Error::Conflict {
                    kind: ObjectKind::Database,
                    name: spec.name.clone(),
                });
            }
            if state.drop_pending() {
                log::warn!("Database {} is in single-user mode after an interrupted drop", spec.name);
            }
            return Ok(Reconciled {
                change: Change::Unchanged,
                record: state,
            });
        }

        let change = match &spec.backup {
            Some(backup) => {
                let target = self.resolve_target(&spec.target)?;
                db.restore(backup, &target)?;
                Change::Restored
            }
            None => {
                db.create()?;
                Change::Created
            }
        };

        Ok(Reconciled {
            change,
            record: self.read_database(&spec.name)?,
        })
    }

    /// Make sure the database is gone, if destruction is allowed.
    pub fn ensure_database_absent(&self, name: &str, allow_destroy: bool) -> Result<Change> {
        let db = self.database(name)?;

        if !allow_destroy {
            log::info!("Keeping database {name}: drop on destroy is off");
            return Ok(Change::Retained);
        }

        let Some(state) = self.inspector.database_state(name)? else {
            return Ok(Change::Unchanged);
        };
        if state.drop_pending() {
            log::info!("Resuming interrupted drop of database {name}");
        }

        db.drop()?;
        Ok(Change::Removed)
    }

    /// Current state of a database.
    pub fn read_database(&self, name: &str) -> Result<DatabaseState> {
        self.inspector
            .database_state(name)?
            .ok_or_else(|| Error::NotFound {
                kind: ObjectKind::Database,
                name: name.to_string(),
            })
    }

    // =========================================================================
    // Logins
    // =========================================================================

    /// Make sure the login exists and belongs to the declared server roles.
    ///
    /// The password and default database only apply when the login is
    /// created; an existing login is never altered.
    pub fn ensure_login_exists(&self, spec: &LoginSpec) -> Result<Reconciled<ServerLogin>> {
        let mut change = Change::Unchanged;

        if !self.inspector.login_exists(&spec.name)? {
            self.logins.create_login(&LoginCreate {
                name: spec.name.clone(),
                password: spec.password.clone(),
                default_database: spec.default_database.clone(),
            })?;
            change = Change::Created;
        }

        let current = self.inspector.login_server_roles(&spec.name)?;
        for role in spec.server_roles.iter().filter(|r| !current.contains(r)) {
            self.logins.add_server_role_member(role, &spec.name)?;
            if change == Change::Unchanged {
                change = Change::Updated;
            }
        }

        Ok(Reconciled {
            change,
            record: self.inspector.get_login_by_name(&spec.name)?,
        })
    }

    /// Make sure the login is gone, if destruction is allowed.
    ///
    /// Open sessions are killed first, best effort. Users mapped to the login
    /// are not touched.
    pub fn ensure_login_absent(&self, name: &str, drop_on_destroy: bool) -> Result<Change> {
        if !drop_on_destroy {
            log::info!("Keeping login {name}: drop on destroy is off");
            return Ok(Change::Retained);
        }
        if !self.inspector.login_exists(name)? {
            return Ok(Change::Unchanged);
        }

        match self.logins.kill_sessions(name) {
            Ok(report) if !report.is_clean() => log::warn!(
                "{} of {} sessions of {name} could not be killed",
                report.failed.len(),
                report.failed.len() + report.killed.len()
            ),
            Ok(_) => {}
            Err(e) => log::warn!("Could not list sessions of {name}: {e}"),
        }

        self.logins.drop_login(name)?;
        Ok(Change::Removed)
    }

    /// Current state of a login.
    pub fn read_login(&self, name: &str) -> Result<ServerLogin> {
        self.inspector.get_login_by_name(name)
    }

    // =========================================================================
    // Users
    // =========================================================================

    /// Make sure the user exists, is bound to the declared login and belongs
    /// to the declared roles.
    pub fn ensure_user_exists(&self, spec: &UserSpec) -> Result<Reconciled<DatabaseUser>> {
        let purpose = format!("create user {}", spec.name);
        let db = self.database(&spec.database)?;
        if !db.exists()? {
            return Err(Error::precondition(ObjectKind::Database, &spec.database, purpose));
        }
        if let Some(login) = &spec.login
            && !self.inspector.login_exists(login)?
        {
            let purpose = format!("bind user {} to login {login}", spec.name);
            return Err(Error::precondition(ObjectKind::Login, login, purpose));
        }

        let mut change = Change::Unchanged;
        let mark_updated = |change: &mut Change| {
            if *change == Change::Unchanged {
                *change = Change::Updated;
            }
        };

        if !db.user_exists(&spec.name)? {
            db.create_user(&UserCreate {
                name: spec.name.clone(),
                default_schema: spec.default_schema.clone(),
            })?;
            change = Change::Created;
        }

        if let Some(login) = &spec.login {
            let purpose = format!("bind user {} to login {login}", spec.name);
            if self.bind_user(&db, &spec.name, login, &purpose)? == Change::Updated {
                mark_updated(&mut change);
            }
        }

        let current = self.inspector.user_database_roles(&spec.database, &spec.name)?;
        for role in spec.roles.iter().filter(|r| !current.contains(r)) {
            db.add_role_member(role, &spec.name)?;
            mark_updated(&mut change);
        }

        Ok(Reconciled {
            change,
            record: db.get_user(&spec.name)?,
        })
    }

    /// Bind an existing user to an existing login.
    ///
    /// The database, the login and the user are checked in that order; the
    /// first one missing is reported as `PreconditionUnmet` and nothing is
    /// changed.
    pub fn ensure_user_bound(&self, spec: &UserLoginSpec) -> Result<Reconciled<DatabaseUser>> {
        let purpose = format!("bind user {} to login {}", spec.username, spec.login);
        let db = self.database(&spec.database)?;
        if !db.exists()? {
            return Err(Error::precondition(ObjectKind::Database, &spec.database, purpose));
        }

        let change = self.bind_user(&db, &spec.username, &spec.login, &purpose)?;
        Ok(Reconciled {
            change,
            record: db.get_user(&spec.username)?,
        })
    }

    fn bind_user(
        &self,
        db: &DatabaseManager,
        user: &str,
        login: &str,
        purpose: &str,
    ) -> Result<Change> {
        if !self.inspector.login_exists(login)? {
            return Err(Error::precondition(ObjectKind::Login, login, purpose));
        }
        if !db.user_exists(user)? {
            return Err(Error::precondition(ObjectKind::User, user, purpose));
        }
        if db.get_user(user)?.login.as_deref() == Some(login) {
            return Ok(Change::Unchanged);
        }

        db.attach_user(user, login)?;
        Ok(Change::Updated)
    }

    /// Make sure the user is gone. An absent database counts as absent user.
    pub fn ensure_user_absent(&self, database: &str, user: &str) -> Result<Change> {
        let db = self.database(database)?;
        if !db.exists()? || !db.user_exists(user)? {
            return Ok(Change::Unchanged);
        }

        db.drop_user(user)?;
        Ok(Change::Removed)
    }

    /// Current state of a user.
    pub fn read_user(&self, database: &str, user: &str) -> Result<DatabaseUser> {
        self.inspector.get_user(database, user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::MemoryServer;
    use crate::error::{DropStep, ErrorCategory};
    use crate::retry::NoCallback;
    use std::time::Duration;

    fn setup() -> (Arc<MemoryServer>, Reconciler) {
        let server = Arc::new(MemoryServer::new());
        let reconciler = Reconciler::new(
            server.clone(),
            RetryPolicy::new(3, Duration::ZERO),
            Arc::new(NoCallback),
        );
        (server, reconciler)
    }

    fn login_spec(name: &str) -> LoginSpec {
        LoginSpec {
            name: name.to_string(),
            password: Password::new("S3cret!pass").unwrap(),
            default_database: "master".to_string(),
            server_roles: Vec::new(),
        }
    }

    fn user_spec(database: &str, name: &str) -> UserSpec {
        UserSpec {
            database: database.to_string(),
            name: name.to_string(),
            default_schema: "dbo".to_string(),
            login: None,
            roles: Vec::new(),
        }
    }

    fn binding(database: &str, username: &str, login: &str) -> UserLoginSpec {
        UserLoginSpec {
            database: database.to_string(),
            username: username.to_string(),
            login: login.to_string(),
        }
    }

    fn orders_backup() -> BackupDescriptor {
        BackupDescriptor::new("/var/opt/mssql/backup/orders.bak", "orders", "orders_log")
    }

    #[test]
    fn test_scenario_create_orders_db() {
        let (_server, reconciler) = setup();

        let first = reconciler
            .ensure_database_exists(&DatabaseSpec::new("orders_db"))
            .unwrap();
        assert_eq!(first.change, Change::Created);
        assert_eq!(first.record.name, "orders_db");
        assert!(reconciler.inspector().database_exists("orders_db").unwrap());

        let second = reconciler
            .ensure_database_exists(&DatabaseSpec::new("orders_db"))
            .unwrap();
        assert_eq!(second.change, Change::Unchanged);
    }

    #[test]
    fn test_scenario_backup_over_existing_is_conflict() {
        let (server, reconciler) = setup();
        server.register_backup(&orders_backup());
        reconciler
            .ensure_database_exists(&DatabaseSpec::new("orders_db"))
            .unwrap();
        server.clear_executed();

        let spec = DatabaseSpec::new("orders_db").with_backup(orders_backup(), TargetDirs::default());
        let err = reconciler.ensure_database_exists(&spec).unwrap_err();

        assert_eq!(err.category(), ErrorCategory::Conflict);
        assert!(server.executed().is_empty());
    }

    #[test]
    fn test_scenario_kill_and_drop_svc_login() {
        let (server, reconciler) = setup();
        reconciler.ensure_login_exists(&login_spec("svc_login")).unwrap();
        let first = server.open_session("svc_login", Some("app01"));
        let second = server.open_session("svc_login", Some("app02"));
        server.clear_executed();

        let change = reconciler.ensure_login_absent("svc_login", true).unwrap();

        assert_eq!(change, Change::Removed);
        assert_eq!(
            server.executed(),
            vec![
                format!("KILL {first}"),
                format!("KILL {second}"),
                "DROP LOGIN [svc_login]".to_string(),
            ]
        );
        assert!(!reconciler.inspector().login_exists("svc_login").unwrap());
    }

    #[test]
    fn test_restore_when_absent() {
        let (server, reconciler) = setup();
        server.register_backup(&orders_backup());
        let spec = DatabaseSpec::new("orders_db").with_backup(
            orders_backup(),
            TargetDirs::Fixed(RestoreTarget::new("/data", "/logs")),
        );

        let result = reconciler.ensure_database_exists(&spec).unwrap();
        assert_eq!(result.change, Change::Restored);
        assert_eq!(
            server.database_files("orders_db"),
            Some(("/data/orders_db.mdf".into(), "/logs/orders_db.ldf".into()))
        );
    }

    #[test]
    fn test_restore_into_server_default_dirs() {
        let (server, reconciler) = setup();
        server.register_backup(&orders_backup());
        server.set_default_paths("/srv/data", "/srv/log");
        let spec = DatabaseSpec::new("orders_db").with_backup(orders_backup(), TargetDirs::ServerDefault);

        reconciler.ensure_database_exists(&spec).unwrap();
        assert_eq!(
            server.database_files("orders_db"),
            Some(("/srv/data/orders_db.mdf".into(), "/srv/log/orders_db.ldf".into()))
        );
    }

    #[test]
    fn test_database_absent_honours_flag() {
        let (server, reconciler) = setup();
        reconciler
            .ensure_database_exists(&DatabaseSpec::new("orders_db"))
            .unwrap();

        assert_eq!(
            reconciler.ensure_database_absent("orders_db", false).unwrap(),
            Change::Retained
        );
        assert!(reconciler.inspector().database_exists("orders_db").unwrap());

        assert_eq!(
            reconciler.ensure_database_absent("orders_db", true).unwrap(),
            Change::Removed
        );
        assert_eq!(
            reconciler.ensure_database_absent("orders_db", true).unwrap(),
            Change::Unchanged
        );
        assert!(server.database_names().is_empty());
    }

    #[test]
    fn test_interrupted_drop_resumes() {
        let (server, reconciler) = setup();
        reconciler
            .ensure_database_exists(&DatabaseSpec::new("orders_db"))
            .unwrap();
        server.fail_next("DROP DATABASE", 3);

        let err = reconciler.ensure_database_absent("orders_db", true).unwrap_err();
        assert_eq!(err.drop_step(), Some(DropStep::DropDatabase));
        assert!(reconciler.read_database("orders_db").unwrap().drop_pending());

        assert_eq!(
            reconciler.ensure_database_absent("orders_db", true).unwrap(),
            Change::Removed
        );
    }

    #[test]
    fn test_login_roles_converge() {
        let (_server, reconciler) = setup();
        let mut spec = login_spec("svc_login");
        assert_eq!(reconciler.ensure_login_exists(&spec).unwrap().change, Change::Created);
        assert_eq!(reconciler.ensure_login_exists(&spec).unwrap().change, Change::Unchanged);

        spec.server_roles = vec!["dbcreator".to_string()];
        let result = reconciler.ensure_login_exists(&spec).unwrap();
        assert_eq!(result.change, Change::Updated);
        assert_eq!(result.record.name, "svc_login");
    }

    #[test]
    fn test_login_absent_retained_and_missing() {
        let (_server, reconciler) = setup();
        reconciler.ensure_login_exists(&login_spec("svc_login")).unwrap();

        assert_eq!(
            reconciler.ensure_login_absent("svc_login", false).unwrap(),
            Change::Retained
        );
        assert_eq!(
            reconciler.ensure_login_absent("ghost", true).unwrap(),
            Change::Unchanged
        );
    }

    #[test]
    fn test_login_drop_continues_after_failed_kill() {
        let (server, reconciler) = setup();
        reconciler.ensure_login_exists(&login_spec("svc_login")).unwrap();
        let spid = server.open_session("svc_login", None);
        server.fail_next(&format!("KILL {spid}"), 1);

        // the session survives, so the drop exhausts its retries
        let err = reconciler.ensure_login_absent("svc_login", true).unwrap_err();
        assert_eq!(err.drop_step(), Some(DropStep::DropLogin));
    }

    #[test]
    fn test_user_requires_database() {
        let (_server, reconciler) = setup();
        let err = reconciler
            .ensure_user_exists(&user_spec("orders_db", "svc_user"))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::PreconditionUnmet {
                kind: ObjectKind::Database,
                ..
            }
        ));
    }

    #[test]
    fn test_user_with_login_and_roles() {
        let (_server, reconciler) = setup();
        reconciler
            .ensure_database_exists(&DatabaseSpec::new("orders_db"))
            .unwrap();
        reconciler.ensure_login_exists(&login_spec("svc_login")).unwrap();

        let mut spec = user_spec("orders_db", "svc_user");
        spec.login = Some("svc_login".to_string());
        spec.roles = vec!["db_datareader".to_string()];

        let result = reconciler.ensure_user_exists(&spec).unwrap();
        assert_eq!(result.change, Change::Created);
        assert_eq!(result.record.login.as_deref(), Some("svc_login"));
        assert_eq!(
            reconciler
                .inspector()
                .user_database_roles("orders_db", "svc_user")
                .unwrap(),
            vec!["db_datareader"]
        );

        assert_eq!(
            reconciler.ensure_user_exists(&spec).unwrap().change,
            Change::Unchanged
        );
    }

    #[test]
    fn test_user_with_missing_login_creates_nothing() {
        let (server, reconciler) = setup();
        reconciler
            .ensure_database_exists(&DatabaseSpec::new("orders_db"))
            .unwrap();
        server.clear_executed();

        let mut spec = user_spec("orders_db", "svc_user");
        spec.login = Some("ghost_login".to_string());

        let err = reconciler.ensure_user_exists(&spec).unwrap_err();
        assert!(matches!(
            err,
            Error::PreconditionUnmet {
                kind: ObjectKind::Login,
                ..
            }
        ));
        assert!(server.executed().is_empty());
        assert!(!reconciler.inspector().user_exists("orders_db", "svc_user").unwrap());
    }

    #[test]
    fn test_bind_preconditions_in_order() {
        let (server, reconciler) = setup();
        let spec = binding("orders_db", "svc_user", "svc_login");

        let missing = |err: Error| match err {
            Error::PreconditionUnmet { kind, .. } => kind,
            other => panic!("unexpected error: {other}"),
        };

        let err = reconciler.ensure_user_bound(&spec).unwrap_err();
        assert_eq!(missing(err), ObjectKind::Database);

        reconciler
            .ensure_database_exists(&DatabaseSpec::new("orders_db"))
            .unwrap();
        let err = reconciler.ensure_user_bound(&spec).unwrap_err();
        assert_eq!(missing(err), ObjectKind::Login);

        reconciler.ensure_login_exists(&login_spec("svc_login")).unwrap();
        server.clear_executed();
        let err = reconciler.ensure_user_bound(&spec).unwrap_err();
        assert_eq!(missing(err), ObjectKind::User);
        assert!(server.executed().is_empty());
    }

    #[test]
    fn test_bind_is_idempotent() {
        let (server, reconciler) = setup();
        reconciler
            .ensure_database_exists(&DatabaseSpec::new("orders_db"))
            .unwrap();
        reconciler.ensure_login_exists(&login_spec("svc_login")).unwrap();
        reconciler
            .ensure_user_exists(&user_spec("orders_db", "svc_user"))
            .unwrap();
        let spec = binding("orders_db", "svc_user", "svc_login");

        let first = reconciler.ensure_user_bound(&spec).unwrap();
        assert_eq!(first.change, Change::Updated);
        assert_eq!(first.record.login.as_deref(), Some("svc_login"));

        server.clear_executed();
        let second = reconciler.ensure_user_bound(&spec).unwrap();
        assert_eq!(second.change, Change::Unchanged);
        assert!(server.executed().is_empty());
    }

    #[test]
    fn test_bind_missing_login_keeps_prior_binding() {
        let (_server, reconciler) = setup();
        reconciler
            .ensure_database_exists(&DatabaseSpec::new("orders_db"))
            .unwrap();
        reconciler.ensure_login_exists(&login_spec("old_login")).unwrap();
        let mut spec = user_spec("orders_db", "svc_user");
        spec.login = Some("old_login".to_string());
        reconciler.ensure_user_exists(&spec).unwrap();

        let err = reconciler
            .ensure_user_bound(&binding("orders_db", "svc_user", "new_login"))
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::PreconditionUnmet);
        assert_eq!(
            reconciler
                .read_user("orders_db", "svc_user")
                .unwrap()
                .login
                .as_deref(),
            Some("old_login")
        );
    }

    #[test]
    fn test_user_absent() {
        let (_server, reconciler) = setup();
        assert_eq!(
            reconciler.ensure_user_absent("orders_db", "svc_user").unwrap(),
            Change::Unchanged
        );

        reconciler
            .ensure_database_exists(&DatabaseSpec::new("orders_db"))
            .unwrap();
        reconciler
            .ensure_user_exists(&user_spec("orders_db", "svc_user"))
            .unwrap();
        assert_eq!(
            reconciler.ensure_user_absent("orders_db", "svc_user").unwrap(),
            Change::Removed
        );
        assert!(reconciler.read_user("orders_db", "svc_user").unwrap_err().is_not_found());
    }

    #[test]
    fn test_login_drop_leaves_users_orphaned() {
        let (_server, reconciler) = setup();
        reconciler
            .ensure_database_exists(&DatabaseSpec::new("orders_db"))
            .unwrap();
        reconciler.ensure_login_exists(&login_spec("svc_login")).unwrap();
        let mut spec = user_spec("orders_db", "svc_user");
        spec.login = Some("svc_login".to_string());
        reconciler.ensure_user_exists(&spec).unwrap();

        reconciler.ensure_login_absent("svc_login", true).unwrap();
        let user = reconciler.read_user("orders_db", "svc_user").unwrap();
        assert_eq!(user.login, None);
    }
}
