//! Execution planner - turns the manifest into an ordered resource list

use anyhow::{Context, Result};
use declarative::ExecutionPlan;
use mssqlkit::{Identifier, ObjectKind, Reconciler};
use std::sync::Arc;

use crate::resource::{DatabaseResource, LoginResource, Mode, UserLoginResource, UserResource};
use crate::schema::Manifest;

/// Build the plan for `mode`.
///
/// Present order: databases, logins, users, bindings, so every object a
/// step depends on is handled before it. Absent plans run users, logins,
/// then databases, and leave bindings out since they go with their user.
pub fn build_plan(
    manifest: &Manifest,
    reconciler: &Arc<Reconciler>,
    mode: Mode,
) -> Result<ExecutionPlan> {
    let mut plan = ExecutionPlan::new();

    for db in &manifest.databases {
        let spec = db
            .to_spec()
            .with_context(|| format!("Invalid database '{}'", db.name))?;
        plan.push(Box::new(DatabaseResource::new(
            reconciler.clone(),
            spec,
            db.drop_on_destroy,
            mode,
        )));
    }

    for login in &manifest.logins {
        let resource = match mode {
            Mode::Present => {
                let spec = login
                    .to_spec()
                    .with_context(|| format!("Invalid login '{}'", login.name))?;
                LoginResource::present(reconciler.clone(), spec)
            }
            Mode::Absent => {
                Identifier::new(ObjectKind::Login, &login.name)
                    .with_context(|| format!("Invalid login '{}'", login.name))?;
                LoginResource::absent(reconciler.clone(), &login.name, login.drop_on_destroy)
            }
        };
        plan.push(Box::new(resource));
    }

    for user in &manifest.users {
        let spec = user
            .to_spec()
            .with_context(|| format!("Invalid user '{}'", user.id()))?;
        plan.push(Box::new(UserResource::new(reconciler.clone(), spec, mode)));
    }

    match mode {
        Mode::Present => {
            for binding in &manifest.user_logins {
                let spec = binding
                    .to_spec()
                    .with_context(|| format!("Invalid user_login '{}'", binding.id()))?;
                plan.push(Box::new(UserLoginResource::new(reconciler.clone(), spec)));
            }
            Ok(plan)
        }
        Mode::Absent => Ok(plan.reversed()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::testing::reconciler;

    const MANIFEST: &str = r#"
[[databases]]
name = "orders_db"

[[logins]]
name = "svc_login"
password = "${SQLCONVERGE_PLANNER_TEST_UNSET}"

[[users]]
database = "orders_db"
name = "svc_user"

[[user_logins]]
database = "orders_db"
username = "svc_user"
login = "svc_login"
"#;

    fn summary(plan: &ExecutionPlan) -> Vec<String> {
        plan.resources()
            .iter()
            .map(|r| format!("{}:{}", r.resource_type(), r.id()))
            .collect()
    }

    #[test]
    fn test_destroy_order_is_reversed_without_bindings() {
        let (_mem, reconciler) = reconciler();
        let manifest = Manifest::parse(MANIFEST).unwrap();

        // no password needed to plan a destroy
        let plan = build_plan(&manifest, &reconciler, Mode::Absent).unwrap();

        assert_eq!(
            summary(&plan),
            vec!["user:orders_db.svc_user", "login:svc_login", "database:orders_db"]
        );
    }

    #[test]
    fn test_apply_order() {
        let (_mem, reconciler) = reconciler();
        let manifest = Manifest::parse(&MANIFEST.replace(
            "${SQLCONVERGE_PLANNER_TEST_UNSET}",
            "S3rvice!Pass",
        ))
        .unwrap();

        let plan = build_plan(&manifest, &reconciler, Mode::Present).unwrap();

        assert_eq!(
            summary(&plan),
            vec![
                "database:orders_db",
                "login:svc_login",
                "user:orders_db.svc_user",
                "user_login:orders_db.svc_user"
            ]
        );
    }

    #[test]
    fn test_unexpandable_password_fails_apply_plan() {
        let (_mem, reconciler) = reconciler();
        let manifest = Manifest::parse(MANIFEST).unwrap();

        let Err(err) = build_plan(&manifest, &reconciler, Mode::Present) else {
            panic!("plan built with an unexpandable password");
        };
        assert!(format!("{err:#}").contains("Invalid login 'svc_login'"));
    }
}
