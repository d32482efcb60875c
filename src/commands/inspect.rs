//! Read-only commands: `show` and `server`

use anyhow::{Context as AnyhowContext, Result};
use mssqlkit::Server;
use serde::Serialize;

use crate::Context;
use crate::ui;

use super::{connect, load_manifest};

/// What `show` prints for one object
#[derive(Debug)]
pub enum ShowTarget<'a> {
    Database(&'a str),
    Login(&'a str),
    User { database: &'a str, name: &'a str },
}

pub fn show(ctx: &Context, target: ShowTarget<'_>, json: bool) -> Result<()> {
    let manifest = load_manifest(ctx)?;
    let server = connect(ctx, &manifest)?;
    println!("{}", render(&server, &target, json)?);
    Ok(())
}

fn render(server: &Server, target: &ShowTarget<'_>, json: bool) -> Result<String> {
    let reconciler = server.reconciler();
    let inspector = reconciler.inspector();

    match *target {
        ShowTarget::Database(name) => {
            let db = reconciler.read_database(name)?;
            if json {
                return to_json(&db);
            }
            Ok(lines(&[
                ("Database", db.name.clone()),
                ("State", db.state.clone()),
                ("Access", db.user_access.as_catalog().to_string()),
                (
                    "Drop pending",
                    if db.drop_pending() { "yes" } else { "no" }.to_string(),
                ),
            ]))
        }
        ShowTarget::Login(name) => {
            let login = reconciler.read_login(name)?;
            let roles = inspector.login_server_roles(name)?;
            if json {
                return to_json(&WithRoles {
                    record: &login,
                    roles: &roles,
                });
            }
            Ok(lines(&[
                ("Login", login.name.clone()),
                ("Principal id", login.principal_id.to_string()),
                ("SID", login.sid.clone()),
                ("Default database", login.default_database.clone()),
                ("Server roles", list(&roles)),
            ]))
        }
        ShowTarget::User { database, name } => {
            let user = reconciler.read_user(database, name)?;
            let roles = inspector.user_database_roles(database, name)?;
            if json {
                return to_json(&WithRoles {
                    record: &user,
                    roles: &roles,
                });
            }
            Ok(lines(&[
                ("User", format!("{database}.{}", user.name)),
                ("Default schema", user.default_schema.clone()),
                (
                    "Login",
                    user.login.clone().unwrap_or_else(|| "<none>".to_string()),
                ),
                ("Database roles", list(&roles)),
            ]))
        }
    }
}

#[derive(Serialize)]
struct WithRoles<'a, T: Serialize> {
    #[serde(flatten)]
    record: &'a T,
    roles: &'a [String],
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).context("Failed to serialize record")
}

fn list(items: &[String]) -> String {
    if items.is_empty() {
        "<none>".to_string()
    } else {
        items.join(", ")
    }
}

fn lines(pairs: &[(&str, String)]) -> String {
    pairs
        .iter()
        .map(|(k, v)| format!("{k}: {v}"))
        .collect::<Vec<_>>()
        .join("\n")
}

// ============================================================================
// Server Command
// ============================================================================

pub fn server(ctx: &Context) -> Result<()> {
    let manifest = load_manifest(ctx)?;
    let server = connect(ctx, &manifest)?;
    let paths = server.inspector().default_file_paths()?;

    ui::header("Server");
    ui::kv("Address", &manifest.server.address());
    ui::kv("User", &manifest.server.username);
    ui::kv("Default data path", &paths.data_file_dir);
    ui::kv("Default log path", &paths.log_file_dir);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mssqlkit::backend::memory::MemoryServer;
    use mssqlkit::{DatabaseSpec, LoginSpec, Password, UserSpec};
    use std::sync::Arc;

    fn server() -> Server {
        let server = Server::with_connection(Arc::new(MemoryServer::new()));
        let reconciler = server.reconciler();
        reconciler
            .ensure_database_exists(&DatabaseSpec::new("orders_db"))
            .unwrap();
        reconciler
            .ensure_login_exists(&LoginSpec {
                name: "svc_login".into(),
                password: Password::new("S3rvice!Pass").unwrap(),
                default_database: "orders_db".into(),
                server_roles: vec!["dbcreator".into()],
            })
            .unwrap();
        reconciler
            .ensure_user_exists(&UserSpec {
                database: "orders_db".into(),
                name: "svc_user".into(),
                default_schema: "dbo".into(),
                login: Some("svc_login".into()),
                roles: vec![],
            })
            .unwrap();
        server
    }

    #[test]
    fn test_show_database_text() {
        let text = render(&server(), &ShowTarget::Database("orders_db"), false).unwrap();
        assert!(text.contains("Database: orders_db"));
        assert!(text.contains("Access: MULTI_USER"));
        assert!(text.contains("Drop pending: no"));
    }

    #[test]
    fn test_show_login_json() {
        let text = render(&server(), &ShowTarget::Login("svc_login"), true).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();

        assert_eq!(value["name"], "svc_login");
        assert_eq!(value["default_database"], "orders_db");
        assert_eq!(value["roles"], serde_json::json!(["dbcreator"]));
    }

    #[test]
    fn test_show_user_text() {
        let target = ShowTarget::User {
            database: "orders_db",
            name: "svc_user",
        };
        let text = render(&server(), &target, false).unwrap();
        assert!(text.contains("Login: svc_login"));
        assert!(text.contains("Database roles: <none>"));
    }

    #[test]
    fn test_show_missing_object() {
        let err = render(&server(), &ShowTarget::Login("nobody"), false).unwrap_err();
        assert!(err.to_string().contains("login not found: nobody"));
    }
}
