//! SQL text issued against the server.
//!
//! Catalog reads bind predicate values as `@P1..@Pn`. DDL cannot take bind
//! parameters, so object names enter only as [`Identifier`] and string
//! values only as [`Literal`]. Database-scoped DDL is wrapped in
//! `EXEC [db].sys.sp_executesql` and never switches the session's database.

use crate::identifier::{Identifier, Literal, Password};
use std::fmt;

/// Principal types that count as database users.
pub const USER_PRINCIPAL_TYPES: &str = "'S', 'U', 'G', 'E', 'X'";

pub const DATABASE_EXISTS: &str = "SELECT name FROM sys.databases WHERE name = @P1";

pub const DATABASE_STATE: &str =
    "SELECT name, user_access_desc, state_desc FROM sys.databases WHERE name = @P1";

// Every login principal type; server roles (`R`) share the catalog view.
pub const LOGIN_EXISTS: &str = concat!(
    "SELECT name FROM master.sys.server_principals WHERE name = @P1 AND type IN ",
    "('S', 'U', 'G', 'C', 'K', 'E', 'X')"
);

pub const GET_LOGIN: &str = concat!(
    "SELECT name, principal_id, sid, default_database_name \
     FROM master.sys.server_principals WHERE name = @P1 AND type IN ",
    "('S', 'U', 'G', 'C', 'K', 'E', 'X')"
);

pub const SESSIONS_FOR_LOGIN: &str = "SELECT session_id, login_name, host_name \
     FROM sys.dm_exec_sessions WHERE login_name = @P1 AND session_id <> @@SPID \
     ORDER BY session_id";

pub const DEFAULT_FILE_PATHS: &str = "SELECT \
     CAST(SERVERPROPERTY('InstanceDefaultDataPath') AS nvarchar(4000)), \
     CAST(SERVERPROPERTY('InstanceDefaultLogPath') AS nvarchar(4000))";

pub const LOGIN_SERVER_ROLES: &str = "SELECT r.name FROM sys.server_role_members m \
     JOIN sys.server_principals r ON r.principal_id = m.role_principal_id \
     JOIN sys.server_principals p ON p.principal_id = m.member_principal_id \
     WHERE p.name = @P1 ORDER BY r.name";

/// Existence check for a user inside `db`.
pub fn user_exists(db: &Identifier) -> String {
    format!(
        "SELECT name FROM {}.sys.database_principals \
         WHERE name = @P1 AND type IN ({USER_PRINCIPAL_TYPES})",
        db.quoted()
    )
}

/// User record inside `db`, with the bound login resolved by sid.
pub fn get_user(db: &Identifier) -> String {
    format!(
        "SELECT dp.name, dp.default_schema_name, sp.name \
         FROM {}.sys.database_principals dp \
         LEFT JOIN sys.server_principals sp ON sp.sid = dp.sid \
         WHERE dp.name = @P1 AND dp.type IN ({USER_PRINCIPAL_TYPES})",
        db.quoted()
    )
}

/// Database roles `@P1` is a member of inside `db`.
pub fn user_database_roles(db: &Identifier) -> String {
    let db = db.quoted();
    format!(
        "SELECT r.name FROM {db}.sys.database_role_members m \
         JOIN {db}.sys.database_principals r ON r.principal_id = m.role_principal_id \
         JOIN {db}.sys.database_principals u ON u.principal_id = m.member_principal_id \
         WHERE u.name = @P1 ORDER BY r.name"
    )
}

/// A DDL statement ready for [`Connection::execute`](crate::backend::Connection::execute).
///
/// `Display` prints the SQL text unless the statement carries a secret, in
/// which case only the label is shown.
#[derive(Clone, PartialEq, Eq)]
pub struct Statement {
    label: &'static str,
    sql: String,
    sensitive: bool,
}

impl Statement {
    fn new(label: &'static str, sql: String) -> Self {
        Self {
            label,
            sql,
            sensitive: false,
        }
    }

    fn sensitive(label: &'static str, sql: String) -> Self {
        Self {
            label,
            sql,
            sensitive: true,
        }
    }

    /// Short name of the statement kind.
    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Full statement text.
    pub fn sql(&self) -> &str {
        &self.sql
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.sensitive {
            write!(f, "{} (redacted)", self.label)
        } else {
            f.write_str(&self.sql)
        }
    }
}

impl fmt::Debug for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Statement({self})")
    }
}

/// Run `inner` in the context of `db` without changing the session's database.
fn in_database(label: &'static str, db: &Identifier, inner: &str) -> Statement {
    Statement::new(
        label,
        format!(
            "EXEC {}.sys.sp_executesql N'{}'",
            db.quoted(),
            inner.replace('\'', "''")
        ),
    )
}

pub fn create_database(db: &Identifier) -> Statement {
    Statement::new("create database", format!("CREATE DATABASE {}", db.quoted()))
}

/// Restore parameters, already validated.
pub struct RestoreArgs<'a> {
    pub db: &'a Identifier,
    pub backup_path: &'a Literal,
    pub file_number: u32,
    pub data_file_name: &'a Literal,
    pub data_file_path: &'a Literal,
    pub log_file_name: &'a Literal,
    pub log_file_path: &'a Literal,
}

/// Single restore statement; the data file pair always precedes the log pair.
pub fn restore_database(args: &RestoreArgs<'_>) -> Statement {
    Statement::new(
        "restore database",
        format!(
            "RESTORE DATABASE {} FROM DISK = {} WITH FILE = {}, \
             MOVE {} TO {}, MOVE {} TO {}, NOUNLOAD, STATS = 5",
            args.db.quoted(),
            args.backup_path.quoted(),
            args.file_number,
            args.data_file_name.quoted(),
            args.data_file_path.quoted(),
            args.log_file_name.quoted(),
            args.log_file_path.quoted(),
        ),
    )
}

pub fn set_single_user(db: &Identifier) -> Statement {
    Statement::new(
        "set single user",
        format!(
            "ALTER DATABASE {} SET SINGLE_USER WITH ROLLBACK IMMEDIATE",
            db.quoted()
        ),
    )
}

pub fn drop_database(db: &Identifier) -> Statement {
    Statement::new("drop database", format!("DROP DATABASE {}", db.quoted()))
}

pub fn create_user(db: &Identifier, user: &Identifier, schema: &Identifier) -> Statement {
    in_database(
        "create user",
        db,
        &format!(
            "CREATE USER {} WITH DEFAULT_SCHEMA = {}",
            user.quoted(),
            schema.quoted()
        ),
    )
}

pub fn attach_user(db: &Identifier, user: &Identifier, login: &Identifier) -> Statement {
    in_database(
        "attach user",
        db,
        &format!("ALTER USER {} WITH LOGIN = {}", user.quoted(), login.quoted()),
    )
}

pub fn drop_user(db: &Identifier, user: &Identifier) -> Statement {
    in_database("drop user", db, &format!("DROP USER {}", user.quoted()))
}

pub fn add_role_member(db: &Identifier, role: &Identifier, user: &Identifier) -> Statement {
    in_database(
        "add role member",
        db,
        &format!("ALTER ROLE {} ADD MEMBER {}", role.quoted(), user.quoted()),
    )
}

pub fn create_login(login: &Identifier, password: &Password, default_db: &Identifier) -> Statement {
    Statement::sensitive(
        "create login",
        format!(
            "CREATE LOGIN {} WITH PASSWORD = {}, DEFAULT_DATABASE = {}, \
             CHECK_POLICY = OFF, CHECK_EXPIRATION = OFF",
            login.quoted(),
            password.literal().quoted(),
            default_db.quoted()
        ),
    )
}

pub fn drop_login(login: &Identifier) -> Statement {
    Statement::new("drop login", format!("DROP LOGIN {}", login.quoted()))
}

pub fn kill_session(session_id: i64) -> Statement {
    Statement::new("kill session", format!("KILL {session_id}"))
}

pub fn add_server_role_member(role: &Identifier, login: &Identifier) -> Statement {
    Statement::new(
        "add server role member",
        format!(
            "ALTER SERVER ROLE {} ADD MEMBER {}",
            role.quoted(),
            login.quoted()
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ObjectKind;

    fn id(kind: ObjectKind, name: &str) -> Identifier {
        Identifier::new(kind, name).unwrap()
    }

    fn lit(value: &str) -> Literal {
        Literal::new(ObjectKind::BackupFile, value).unwrap()
    }

    #[test]
    fn test_restore_statement_shape() {
        let db = id(ObjectKind::Database, "orders_db");
        let stmt = restore_database(&RestoreArgs {
            db: &db,
            backup_path: &lit("/b/orders.bak"),
            file_number: 2,
            data_file_name: &lit("orders"),
            data_file_path: &lit("/var/opt/mssql/orders_db.mdf"),
            log_file_name: &lit("orders_log"),
            log_file_path: &lit("/var/opt/mssql/orders_db.ldf"),
        });

        assert_eq!(
            stmt.sql(),
            "RESTORE DATABASE [orders_db] FROM DISK = N'/b/orders.bak' WITH FILE = 2, \
             MOVE N'orders' TO N'/var/opt/mssql/orders_db.mdf', \
             MOVE N'orders_log' TO N'/var/opt/mssql/orders_db.ldf', NOUNLOAD, STATS = 5"
        );
    }

    #[test]
    fn test_drop_sequence_text() {
        let db = id(ObjectKind::Database, "orders_db");
        assert_eq!(
            set_single_user(&db).sql(),
            "ALTER DATABASE [orders_db] SET SINGLE_USER WITH ROLLBACK IMMEDIATE"
        );
        assert_eq!(drop_database(&db).sql(), "DROP DATABASE [orders_db]");
    }

    #[test]
    fn test_database_scoped_ddl_uses_sp_executesql() {
        let db = id(ObjectKind::Database, "orders_db");
        let user = id(ObjectKind::User, "svc_user");
        let login = id(ObjectKind::Login, "svc_login");

        assert_eq!(
            attach_user(&db, &user, &login).sql(),
            "EXEC [orders_db].sys.sp_executesql N'ALTER USER [svc_user] WITH LOGIN = [svc_login]'"
        );
        assert!(!drop_user(&db, &user).sql().contains("USE "));
    }

    #[test]
    fn test_create_login_is_redacted_in_display() {
        let login = id(ObjectKind::Login, "svc_login");
        let master = id(ObjectKind::Database, "master");
        let stmt = create_login(&login, &Password::new("S3cret").unwrap(), &master);

        assert!(stmt.sql().contains("PASSWORD = N'S3cret'"));
        assert!(stmt.sql().contains("CHECK_POLICY = OFF, CHECK_EXPIRATION = OFF"));
        assert_eq!(stmt.to_string(), "create login (redacted)");
        assert!(!format!("{stmt:?}").contains("S3cret"));
    }

    #[test]
    fn test_catalog_queries_scope_by_database() {
        let db = id(ObjectKind::Database, "orders_db");
        assert!(user_exists(&db).contains("[orders_db].sys.database_principals"));
        assert!(get_user(&db).contains("LEFT JOIN sys.server_principals"));
        assert_eq!(kill_session(57).sql(), "KILL 57");
    }

    #[test]
    fn test_login_lookups_skip_server_roles() {
        for query in [LOGIN_EXISTS, GET_LOGIN] {
            assert!(query.contains("master.sys.server_principals"));
            assert!(query.ends_with("type IN ('S', 'U', 'G', 'C', 'K', 'E', 'X')"));
        }
    }
}
