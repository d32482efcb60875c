//! Binding of an existing database user to an existing login
//!
//! Only converges towards the bound state. A binding has nothing to remove
//! on its own: it disappears with its user, so destroy plans leave it out.

use anyhow::{Context, Result};
use declarative::{ApplyContext, ApplyResult, Resource, ResourceState};
use mssqlkit::{Reconciler, UserLoginSpec};
use std::fmt;
use std::sync::Arc;

use super::{apply_result, dry_run, present};

pub struct UserLoginResource {
    reconciler: Arc<Reconciler>,
    spec: UserLoginSpec,
}

impl UserLoginResource {
    pub fn new(reconciler: Arc<Reconciler>, spec: UserLoginSpec) -> Self {
        Self { reconciler, spec }
    }
}

impl fmt::Debug for UserLoginResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserLoginResource")
            .field("spec", &self.spec)
            .finish_non_exhaustive()
    }
}

impl Resource for UserLoginResource {
    fn id(&self) -> String {
        format!("{}.{}", self.spec.database, self.spec.username)
    }

    fn description(&self) -> String {
        format!(
            "Bind user {} in {} to login {}",
            self.spec.username, self.spec.database, self.spec.login
        )
    }

    fn resource_type(&self) -> &'static str {
        "user_login"
    }

    fn current_state(&self) -> Result<ResourceState> {
        let inspector = self.reconciler.inspector();
        let (db, user) = (&self.spec.database, &self.spec.username);

        let exists = inspector
            .database_exists(db)
            .and_then(|found| if found { inspector.user_exists(db, user) } else { Ok(false) })
            .with_context(|| format!("Failed to look up user {user} in {db}"))?;
        if !exists {
            return Ok(ResourceState::Absent);
        }

        let bound = inspector.get_user(db, user)?.login;
        if bound.as_deref() == Some(self.spec.login.as_str()) {
            return Ok(present());
        }
        Ok(ResourceState::Modified {
            from: format!("login: {}", bound.as_deref().unwrap_or("<none>")),
            to: format!("login: {}", self.spec.login),
        })
    }

    fn desired_state(&self) -> ResourceState {
        present()
    }

    fn apply(&self, ctx: &mut ApplyContext) -> Result<ApplyResult> {
        if ctx.dry_run {
            return Ok(dry_run());
        }
        let reconciled = self.reconciler.ensure_user_bound(&self.spec)?;
        Ok(apply_result(reconciled.change))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::testing::reconciler;
    use mssqlkit::{DatabaseSpec, LoginSpec, Password, UserSpec};

    fn binding() -> UserLoginSpec {
        UserLoginSpec {
            database: "orders_db".into(),
            username: "svc_user".into(),
            login: "svc_login".into(),
        }
    }

    #[test]
    fn test_bind_unbound_user() {
        let (_mem, reconciler) = reconciler();
        reconciler
            .ensure_database_exists(&DatabaseSpec::new("orders_db"))
            .unwrap();
        reconciler
            .ensure_login_exists(&LoginSpec {
                name: "svc_login".into(),
                password: Password::new("S3rvice!Pass").unwrap(),
                default_database: "master".into(),
                server_roles: vec![],
            })
            .unwrap();
        reconciler
            .ensure_user_exists(&UserSpec {
                database: "orders_db".into(),
                name: "svc_user".into(),
                default_schema: "dbo".into(),
                login: None,
                roles: vec![],
            })
            .unwrap();

        let resource = UserLoginResource::new(reconciler, binding());
        assert_eq!(
            resource.current_state().unwrap(),
            ResourceState::Modified {
                from: "login: <none>".into(),
                to: "login: svc_login".into()
            }
        );
        assert_eq!(resource.apply(&mut ApplyContext::default()).unwrap(), ApplyResult::Modified);
        assert!(!resource.needs_apply().unwrap());
    }

    #[test]
    fn test_missing_login_is_a_failed_precondition() {
        let (mem, reconciler) = reconciler();
        reconciler
            .ensure_database_exists(&DatabaseSpec::new("orders_db"))
            .unwrap();
        mem.clear_executed();

        let resource = UserLoginResource::new(reconciler, binding());
        let err = resource.apply(&mut ApplyContext::default()).unwrap_err();

        assert!(err.to_string().contains("login svc_login does not exist"));
        assert!(mem.executed().is_empty());
    }
}
