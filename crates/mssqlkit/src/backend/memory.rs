//! In-process model of the SQL Server catalogs this crate touches.
//!
//! [`MemoryServer`] accepts exactly the statement and query texts produced by
//! [`crate::statement`], keeps databases, logins, users, role memberships and
//! sessions in memory, and answers with the same error numbers a real
//! instance uses. It also supports fault injection so retry and
//! precondition paths can be exercised without a live server.

use crate::backend::{Connection, Row, Value};
use crate::error::{Error, ObjectKind, Result};
use crate::identifier::Identifier;
use crate::statement;
use crate::types::{BackupDescriptor, RestoreTarget, Session, UserAccess};
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{LazyLock, Mutex, MutexGuard, PoisonError};

const FIRST_PRINCIPAL_ID: i64 = 256;
const FIRST_SESSION_ID: i64 = 51;

const SYSTEM_DATABASES: &[&str] = &["master", "model", "msdb", "tempdb"];

const FIXED_SERVER_ROLES: &[&str] = &[
    "bulkadmin",
    "dbcreator",
    "diskadmin",
    "processadmin",
    "securityadmin",
    "serveradmin",
    "setupadmin",
    "sysadmin",
];

const FIXED_DATABASE_ROLES: &[&str] = &[
    "db_accessadmin",
    "db_backupoperator",
    "db_datareader",
    "db_datawriter",
    "db_ddladmin",
    "db_denydatareader",
    "db_denydatawriter",
    "db_owner",
    "db_securityadmin",
];

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).expect("statement pattern")
}

static IN_DATABASE_RE: LazyLock<Regex> =
    LazyLock::new(|| re(r"(?s)^EXEC \[([^\]]+)\]\.sys\.sp_executesql N'(.*)'$"));
static CREATE_DATABASE_RE: LazyLock<Regex> =
    LazyLock::new(|| re(r"^CREATE DATABASE \[([^\]]+)\]$"));
static RESTORE_DATABASE_RE: LazyLock<Regex> = LazyLock::new(|| {
    re(concat!(
        r"^RESTORE DATABASE \[([^\]]+)\] FROM DISK = N'([^']*)' WITH FILE = (\d+), ",
        r"MOVE N'([^']*)' TO N'([^']*)', MOVE N'([^']*)' TO N'([^']*)', NOUNLOAD, STATS = 5$"
    ))
});
static SET_SINGLE_USER_RE: LazyLock<Regex> = LazyLock::new(|| {
    re(r"^ALTER DATABASE \[([^\]]+)\] SET SINGLE_USER WITH ROLLBACK IMMEDIATE$")
});
static DROP_DATABASE_RE: LazyLock<Regex> = LazyLock::new(|| re(r"^DROP DATABASE \[([^\]]+)\]$"));
static CREATE_LOGIN_RE: LazyLock<Regex> = LazyLock::new(|| {
    re(concat!(
        r"^CREATE LOGIN \[([^\]]+)\] WITH PASSWORD = N'([^']*)', DEFAULT_DATABASE = \[([^\]]+)\], ",
        r"CHECK_POLICY = OFF, CHECK_EXPIRATION = OFF$"
    ))
});
static DROP_LOGIN_RE: LazyLock<Regex> = LazyLock::new(|| re(r"^DROP LOGIN \[([^\]]+)\]$"));
static KILL_RE: LazyLock<Regex> = LazyLock::new(|| re(r"^KILL (\d+)$"));
static ADD_SERVER_ROLE_MEMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| re(r"^ALTER SERVER ROLE \[([^\]]+)\] ADD MEMBER \[([^\]]+)\]$"));

static CREATE_USER_RE: LazyLock<Regex> =
    LazyLock::new(|| re(r"^CREATE USER \[([^\]]+)\] WITH DEFAULT_SCHEMA = \[([^\]]+)\]$"));
static ATTACH_USER_RE: LazyLock<Regex> =
    LazyLock::new(|| re(r"^ALTER USER \[([^\]]+)\] WITH LOGIN = \[([^\]]+)\]$"));
static DROP_USER_RE: LazyLock<Regex> = LazyLock::new(|| re(r"^DROP USER \[([^\]]+)\]$"));
static ADD_ROLE_MEMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| re(r"^ALTER ROLE \[([^\]]+)\] ADD MEMBER \[([^\]]+)\]$"));

static DB_SCOPED_QUERY_RE: LazyLock<Regex> = LazyLock::new(|| re(r"FROM \[([^\]]+)\]\.sys\."));

fn server_error(number: u32, message: impl AsRef<str>) -> Error {
    Error::Server {
        message: format!("{} (error {number})", message.as_ref()),
    }
}

fn unsupported(sql: &str) -> Error {
    server_error(102, format!("Incorrect syntax near '{sql}'."))
}

fn missing_database(name: &str) -> Error {
    server_error(
        911,
        format!("Database '{name}' does not exist. Make sure that the name is entered correctly."),
    )
}

#[derive(Debug)]
struct MemDatabase {
    user_access: UserAccess,
    state: &'static str,
    users: BTreeMap<String, MemUser>,
    role_members: BTreeMap<String, BTreeSet<String>>,
    files: Option<(String, String)>,
}

impl MemDatabase {
    fn new() -> Self {
        Self {
            user_access: UserAccess::MultiUser,
            state: "ONLINE",
            users: BTreeMap::new(),
            role_members: FIXED_DATABASE_ROLES
                .iter()
                .map(|r| ((*r).to_string(), BTreeSet::new()))
                .collect(),
            files: None,
        }
    }
}

#[derive(Debug)]
struct MemUser {
    default_schema: String,
    sid: Option<Vec<u8>>,
}

#[derive(Debug)]
struct MemLogin {
    principal_id: i64,
    sid: Vec<u8>,
    default_database: String,
}

#[derive(Debug)]
struct BackupSet {
    file_number: u32,
    data_file_name: String,
    log_file_name: String,
}

#[derive(Debug)]
struct Fault {
    fragment: String,
    remaining: u32,
}

#[derive(Debug)]
struct Catalog {
    databases: BTreeMap<String, MemDatabase>,
    logins: BTreeMap<String, MemLogin>,
    server_roles: BTreeMap<String, BTreeSet<String>>,
    sessions: BTreeMap<i64, Session>,
    backups: BTreeMap<String, Vec<BackupSet>>,
    default_paths: RestoreTarget,
    next_principal_id: i64,
    next_session_id: i64,
    faults: Vec<Fault>,
    offline: bool,
    executed: Vec<String>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self {
            databases: SYSTEM_DATABASES
                .iter()
                .map(|d| ((*d).to_string(), MemDatabase::new()))
                .collect(),
            logins: BTreeMap::new(),
            server_roles: FIXED_SERVER_ROLES
                .iter()
                .map(|r| ((*r).to_string(), BTreeSet::new()))
                .collect(),
            sessions: BTreeMap::new(),
            backups: BTreeMap::new(),
            default_paths: RestoreTarget::new("/var/opt/mssql/data", "/var/opt/mssql/log"),
            next_principal_id: FIRST_PRINCIPAL_ID,
            next_session_id: FIRST_SESSION_ID,
            faults: Vec::new(),
            offline: false,
            executed: Vec::new(),
        }
    }
}

/// In-memory SQL Server used by tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryServer {
    catalog: Mutex<Catalog>,
}

impl MemoryServer {
    /// Create a server holding only the system databases.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Catalog> {
        self.catalog.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make a backup file available for `RESTORE DATABASE`.
    pub fn register_backup(&self, backup: &BackupDescriptor) {
        self.lock()
            .backups
            .entry(backup.path.clone())
            .or_default()
            .push(BackupSet {
                file_number: backup.file_number,
                data_file_name: backup.data_file_name.clone(),
                log_file_name: backup.log_file_name.clone(),
            });
    }

    /// Open a client session for `login`; returns its session id.
    pub fn open_session(&self, login: &str, host: Option<&str>) -> i64 {
        let mut catalog = self.lock();
        let session_id = catalog.next_session_id;
        catalog.next_session_id += 1;
        catalog.sessions.insert(
            session_id,
            Session {
                session_id,
                login_name: login.to_string(),
                host_name: host.map(str::to_string),
            },
        );
        session_id
    }

    /// Currently open sessions.
    pub fn sessions(&self) -> Vec<Session> {
        self.lock().sessions.values().cloned().collect()
    }

    /// Override the instance default data and log directories.
    pub fn set_default_paths(&self, data_dir: &str, log_dir: &str) {
        self.lock().default_paths = RestoreTarget::new(data_dir, log_dir);
    }

    /// Fail the next `times` calls whose text contains `fragment`.
    pub fn fail_next(&self, fragment: &str, times: u32) {
        self.lock().faults.push(Fault {
            fragment: fragment.to_string(),
            remaining: times,
        });
    }

    /// Refuse every call with a connection error while `offline` is set.
    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    /// Every statement passed to `execute`, in order, including failed ones.
    pub fn executed(&self) -> Vec<String> {
        self.lock().executed.clone()
    }

    /// Forget the statement log.
    pub fn clear_executed(&self) {
        self.lock().executed.clear();
    }

    /// Physical `(data, log)` paths of a restored database.
    pub fn database_files(&self, name: &str) -> Option<(String, String)> {
        self.lock().databases.get(name).and_then(|db| db.files.clone())
    }

    /// User databases, excluding the system ones.
    pub fn database_names(&self) -> Vec<String> {
        self.lock()
            .databases
            .keys()
            .filter(|name| !SYSTEM_DATABASES.contains(&name.as_str()))
            .cloned()
            .collect()
    }
}

impl Catalog {
    fn ensure_online(&self) -> Result<()> {
        if self.offline {
            return Err(Error::Connection {
                message: "could not connect to server: connection refused".to_string(),
            });
        }
        Ok(())
    }

    fn take_fault(&mut self, sql: &str) -> Result<()> {
        if let Some(fault) = self
            .faults
            .iter_mut()
            .find(|f| f.remaining > 0 && sql.contains(&f.fragment))
        {
            fault.remaining -= 1;
            return Err(server_error(
                50000,
                format!("injected failure for '{}'", fault.fragment),
            ));
        }
        Ok(())
    }

    fn login_name_for_sid(&self, sid: &[u8]) -> Option<String> {
        self.logins
            .iter()
            .find(|(_, login)| login.sid == sid)
            .map(|(name, _)| name.clone())
    }

    // =========================================================================
    // Queries
    // =========================================================================

    fn query(&self, sql: &str, p1: &str) -> Result<Vec<Row>> {
        let rows = match sql {
            statement::DATABASE_EXISTS => self
                .databases
                .get(p1)
                .map(|_| Row::new(vec![p1.into()]))
                .into_iter()
                .collect(),
            statement::DATABASE_STATE => self
                .databases
                .get(p1)
                .map(|db| {
                    Row::new(vec![
                        p1.into(),
                        db.user_access.as_catalog().into(),
                        db.state.into(),
                    ])
                })
                .into_iter()
                .collect(),
            statement::LOGIN_EXISTS => self
                .logins
                .get(p1)
                .map(|_| Row::new(vec![p1.into()]))
                .into_iter()
                .collect(),
            statement::GET_LOGIN => self
                .logins
                .get(p1)
                .map(|login| {
                    Row::new(vec![
                        p1.into(),
                        Value::Int(login.principal_id),
                        Value::Bytes(login.sid.clone()),
                        login.default_database.as_str().into(),
                    ])
                })
                .into_iter()
                .collect(),
            statement::SESSIONS_FOR_LOGIN => self
                .sessions
                .values()
                .filter(|s| s.login_name == p1)
                .map(|s| {
                    Row::new(vec![
                        Value::Int(s.session_id),
                        s.login_name.as_str().into(),
                        s.host_name.clone().into(),
                    ])
                })
                .collect(),
            statement::DEFAULT_FILE_PATHS => vec![Row::new(vec![
                format!("{}/", self.default_paths.data_file_dir).into(),
                format!("{}/", self.default_paths.log_file_dir).into(),
            ])],
            statement::LOGIN_SERVER_ROLES => self
                .server_roles
                .iter()
                .filter(|(_, members)| members.contains(p1))
                .map(|(role, _)| Row::new(vec![role.as_str().into()]))
                .collect(),
            _ => return self.database_query(sql, p1),
        };
        Ok(rows)
    }

    fn database_query(&self, sql: &str, p1: &str) -> Result<Vec<Row>> {
        let Some(caps) = DB_SCOPED_QUERY_RE.captures(sql) else {
            return Err(unsupported(sql));
        };
        let db_name = &caps[1];
        let db_id = Identifier::new(ObjectKind::Database, db_name)?;
        let db = self
            .databases
            .get(db_name)
            .ok_or_else(|| missing_database(db_name))?;

        if sql == statement::user_exists(&db_id) {
            return Ok(db
                .users
                .get(p1)
                .map(|_| Row::new(vec![p1.into()]))
                .into_iter()
                .collect());
        }
        if sql == statement::get_user(&db_id) {
            return Ok(db
                .users
                .get(p1)
                .map(|user| {
                    let login = user.sid.as_deref().and_then(|sid| self.login_name_for_sid(sid));
                    Row::new(vec![
                        p1.into(),
                        user.default_schema.as_str().into(),
                        login.into(),
                    ])
                })
                .into_iter()
                .collect());
        }
        if sql == statement::user_database_roles(&db_id) {
            return Ok(db
                .role_members
                .iter()
                .filter(|(_, members)| members.contains(p1))
                .map(|(role, _)| Row::new(vec![role.as_str().into()]))
                .collect());
        }
        Err(unsupported(sql))
    }

    // =========================================================================
    // Statements
    // =========================================================================

    fn apply(&mut self, sql: &str) -> Result<()> {
        if let Some(c) = IN_DATABASE_RE.captures(sql) {
            let inner = c[2].replace("''", "'");
            return self.apply_in_database(&c[1], &inner);
        }
        if let Some(c) = CREATE_DATABASE_RE.captures(sql) {
            return self.create_database(&c[1]);
        }
        if let Some(c) = RESTORE_DATABASE_RE.captures(sql) {
            let file_number = c[3].parse().map_err(|_| unsupported(sql))?;
            return self.restore_database(
                &c[1],
                &c[2],
                file_number,
                [(&c[4], &c[5]), (&c[6], &c[7])],
            );
        }
        if let Some(c) = SET_SINGLE_USER_RE.captures(sql) {
            let name = &c[1];
            let db = self.databases.get_mut(name).ok_or_else(|| {
                server_error(
                    5011,
                    format!(
                        "User does not have permission to alter database '{name}', \
                         the database does not exist, or the database is not in a state \
                         that allows access checks."
                    ),
                )
            })?;
            db.user_access = UserAccess::SingleUser;
            return Ok(());
        }
        if let Some(c) = DROP_DATABASE_RE.captures(sql) {
            return self.drop_database(&c[1]);
        }
        if let Some(c) = CREATE_LOGIN_RE.captures(sql) {
            return self.create_login(&c[1], &c[3]);
        }
        if let Some(c) = DROP_LOGIN_RE.captures(sql) {
            return self.drop_login(&c[1]);
        }
        if let Some(c) = KILL_RE.captures(sql) {
            let session_id: i64 = c[1].parse().map_err(|_| unsupported(sql))?;
            return self.sessions.remove(&session_id).map(|_| ()).ok_or_else(|| {
                server_error(6106, format!("Process ID {session_id} is not an active process ID."))
            });
        }
        if let Some(c) = ADD_SERVER_ROLE_MEMBER_RE.captures(sql) {
            let (role, login) = (&c[1], &c[2]);
            if !self.logins.contains_key(login) {
                return Err(server_error(
                    15151,
                    format!("Cannot add the principal '{login}', because it does not exist or you do not have permission."),
                ));
            }
            let members = self.server_roles.get_mut(role).ok_or_else(|| {
                server_error(
                    15151,
                    format!("Cannot alter the server role '{role}', because it does not exist or you do not have permission."),
                )
            })?;
            members.insert(login.to_string());
            return Ok(());
        }
        Err(unsupported(sql))
    }

    fn create_database(&mut self, name: &str) -> Result<()> {
        if self.databases.contains_key(name) {
            return Err(server_error(
                1801,
                format!("Database '{name}' already exists. Choose a different database name."),
            ));
        }
        self.databases.insert(name.to_string(), MemDatabase::new());
        Ok(())
    }

    fn restore_database(
        &mut self,
        name: &str,
        path: &str,
        file_number: u32,
        moves: [(&str, &str); 2],
    ) -> Result<()> {
        if self.databases.contains_key(name) {
            return Err(server_error(
                3154,
                format!("The backup set holds a backup of a database other than the existing '{name}' database."),
            ));
        }
        let set = self
            .backups
            .get(path)
            .ok_or_else(|| {
                server_error(
                    3201,
                    format!("Cannot open backup device '{path}'. Operating system error 2(The system cannot find the file specified.)."),
                )
            })?
            .iter()
            .find(|s| s.file_number == file_number)
            .ok_or_else(|| {
                server_error(
                    3013,
                    format!("The backup set at position {file_number} does not exist in '{path}'."),
                )
            })?;

        let mut data_path = None;
        let mut log_path = None;
        for (logical, physical) in moves {
            if logical == set.data_file_name {
                data_path = Some(physical.to_string());
            } else if logical == set.log_file_name {
                log_path = Some(physical.to_string());
            } else {
                return Err(server_error(
                    3234,
                    format!("Logical file '{logical}' is not part of database '{name}'. Use RESTORE FILELISTONLY to list the logical file names."),
                ));
            }
        }

        let mut db = MemDatabase::new();
        db.files = data_path.zip(log_path);
        self.databases.insert(name.to_string(), db);
        Ok(())
    }

    fn drop_database(&mut self, name: &str) -> Result<()> {
        if SYSTEM_DATABASES.contains(&name) {
            return Err(server_error(
                3708,
                format!("Cannot drop the database '{name}' because it is a system database."),
            ));
        }
        self.databases.remove(name).map(|_| ()).ok_or_else(|| {
            server_error(
                3701,
                format!("Cannot drop the database '{name}', because it does not exist or you do not have permission."),
            )
        })
    }

    fn create_login(&mut self, name: &str, default_database: &str) -> Result<()> {
        if self.logins.contains_key(name) {
            return Err(server_error(
                15025,
                format!("The server principal '{name}' already exists."),
            ));
        }
        if !self.databases.contains_key(default_database) {
            return Err(server_error(
                15010,
                format!("The database '{default_database}' does not exist. Supply a valid database name."),
            ));
        }

        let principal_id = self.next_principal_id;
        self.next_principal_id += 1;
        self.logins.insert(
            name.to_string(),
            MemLogin {
                principal_id,
                sid: format!("sid-{principal_id}").into_bytes(),
                default_database: default_database.to_string(),
            },
        );
        Ok(())
    }

    fn drop_login(&mut self, name: &str) -> Result<()> {
        if !self.logins.contains_key(name) {
            return Err(server_error(
                15151,
                format!("Cannot drop the login '{name}', because it does not exist or you do not have permission."),
            ));
        }
        if self.sessions.values().any(|s| s.login_name == name) {
            return Err(server_error(
                15434,
                format!("Could not drop login '{name}' as the user is currently logged in."),
            ));
        }
        self.logins.remove(name);
        for members in self.server_roles.values_mut() {
            members.remove(name);
        }
        Ok(())
    }

    fn apply_in_database(&mut self, db_name: &str, sql: &str) -> Result<()> {
        let logins = &self.logins;
        let db = self
            .databases
            .get_mut(db_name)
            .ok_or_else(|| missing_database(db_name))?;

        if let Some(c) = CREATE_USER_RE.captures(sql) {
            let (user, schema) = (&c[1], &c[2]);
            if db.users.contains_key(user) {
                return Err(server_error(
                    15023,
                    format!("User, group, or role '{user}' already exists in the current database."),
                ));
            }
            // A same-named login is picked up implicitly, unless already mapped.
            let sid = logins
                .get(user)
                .map(|login| login.sid.clone())
                .filter(|sid| !db.users.values().any(|u| u.sid.as_ref() == Some(sid)));
            db.users.insert(
                user.to_string(),
                MemUser {
                    default_schema: schema.to_string(),
                    sid,
                },
            );
            return Ok(());
        }
        if let Some(c) = ATTACH_USER_RE.captures(sql) {
            let (user, login) = (&c[1], &c[2]);
            let sid = logins.get(login).map(|l| l.sid.clone()).ok_or_else(|| {
                server_error(
                    15007,
                    format!("'{login}' is not a valid login or you do not have permission."),
                )
            })?;
            if db
                .users
                .iter()
                .any(|(name, u)| name != user && u.sid.as_ref() == Some(&sid))
            {
                return Err(server_error(
                    15063,
                    "The login already has an account under a different user name.",
                ));
            }
            let entry = db.users.get_mut(user).ok_or_else(|| {
                server_error(
                    15151,
                    format!("Cannot alter the user '{user}', because it does not exist or you do not have permission."),
                )
            })?;
            entry.sid = Some(sid);
            return Ok(());
        }
        if let Some(c) = DROP_USER_RE.captures(sql) {
            let user = &c[1];
            if db.users.remove(user).is_none() {
                return Err(server_error(
                    15151,
                    format!("Cannot drop the user '{user}', because it does not exist or you do not have permission."),
                ));
            }
            for members in db.role_members.values_mut() {
                members.remove(user);
            }
            return Ok(());
        }
        if let Some(c) = ADD_ROLE_MEMBER_RE.captures(sql) {
            let (role, user) = (&c[1], &c[2]);
            if !db.users.contains_key(user) {
                return Err(server_error(
                    15151,
                    format!("Cannot add the principal '{user}', because it does not exist or you do not have permission."),
                ));
            }
            let members = db.role_members.get_mut(role).ok_or_else(|| {
                server_error(
                    15151,
                    format!("Cannot alter the role '{role}', because it does not exist or you do not have permission."),
                )
            })?;
            members.insert(user.to_string());
            return Ok(());
        }
        Err(unsupported(sql))
    }
}

impl Connection for MemoryServer {
    fn query(&self, sql: &str, params: &[&str]) -> Result<Vec<Row>> {
        let mut catalog = self.lock();
        catalog.ensure_online()?;
        catalog.take_fault(sql)?;
        catalog.query(sql, params.first().copied().unwrap_or_default())
    }

    fn execute(&self, sql: &str) -> Result<()> {
        let mut catalog = self.lock();
        catalog.ensure_online()?;
        catalog.executed.push(sql.to_string());
        catalog.take_fault(sql)?;
        catalog.apply(sql)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db(name: &str) -> Identifier {
        Identifier::new(ObjectKind::Database, name).unwrap()
    }

    #[test]
    fn test_create_and_drop_database() {
        let server = MemoryServer::new();
        let orders = db("orders_db");

        server.execute(statement::create_database(&orders).sql()).unwrap();
        let rows = server.query(statement::DATABASE_EXISTS, &["orders_db"]).unwrap();
        assert_eq!(rows.len(), 1);

        let err = server.execute(statement::create_database(&orders).sql()).unwrap_err();
        assert!(err.to_string().contains("error 1801"));

        server.execute(statement::drop_database(&orders).sql()).unwrap();
        assert!(server.database_names().is_empty());
        assert_eq!(server.executed().len(), 3);
    }

    #[test]
    fn test_fault_injection_is_bounded() {
        let server = MemoryServer::new();
        server.fail_next("CREATE DATABASE", 2);
        let stmt = statement::create_database(&db("a"));

        assert!(server.execute(stmt.sql()).is_err());
        assert!(server.execute(stmt.sql()).is_err());
        assert!(server.execute(stmt.sql()).is_ok());
    }

    #[test]
    fn test_offline_refuses_queries() {
        let server = MemoryServer::new();
        server.set_offline(true);
        let err = server.query(statement::DATABASE_EXISTS, &["master"]).unwrap_err();
        assert!(matches!(err, Error::Connection { .. }));
        assert!(server.executed().is_empty());
    }

    #[test]
    fn test_drop_login_refused_while_logged_in() {
        let server = MemoryServer::new();
        server
            .execute(
                "CREATE LOGIN [svc] WITH PASSWORD = N'pw', DEFAULT_DATABASE = [master], \
                 CHECK_POLICY = OFF, CHECK_EXPIRATION = OFF",
            )
            .unwrap();
        let spid = server.open_session("svc", Some("app01"));

        let err = server.execute("DROP LOGIN [svc]").unwrap_err();
        assert!(err.to_string().contains("currently logged in"));

        server.execute(&format!("KILL {spid}")).unwrap();
        server.execute("DROP LOGIN [svc]").unwrap();
        assert!(server.sessions().is_empty());
    }

    #[test]
    fn test_database_scoped_statement_requires_database() {
        let server = MemoryServer::new();
        let err = server
            .execute("EXEC [nope].sys.sp_executesql N'DROP USER [u]'")
            .unwrap_err();
        assert!(err.to_string().contains("error 911"));
    }

    #[test]
    fn test_unknown_statement_is_rejected() {
        let server = MemoryServer::new();
        assert!(server.execute("TRUNCATE TABLE x").is_err());
    }
}
