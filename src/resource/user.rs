//! Database user resource

use anyhow::{Context, Result};
use declarative::{ApplyContext, ApplyResult, Resource, ResourceState};
use mssqlkit::{Reconciler, UserSpec};
use std::fmt;
use std::sync::Arc;

use super::{Mode, apply_result, dry_run, present, role_drift};

/// A user inside one database, optionally bound to a login
pub struct UserResource {
    reconciler: Arc<Reconciler>,
    spec: UserSpec,
    mode: Mode,
}

impl UserResource {
    pub fn new(reconciler: Arc<Reconciler>, spec: UserSpec, mode: Mode) -> Self {
        Self {
            reconciler,
            spec,
            mode,
        }
    }

    /// What differs on an existing user, as `(from, to)`
    fn drift(&self) -> Result<Option<(String, String)>> {
        let inspector = self.reconciler.inspector();
        let mut from = Vec::new();
        let mut to = Vec::new();

        if let Some(login) = &self.spec.login {
            let user = inspector.get_user(&self.spec.database, &self.spec.name)?;
            if user.login.as_deref() != Some(login.as_str()) {
                from.push(format!(
                    "login: {}",
                    user.login.as_deref().unwrap_or("<none>")
                ));
                to.push(format!("login: {login}"));
            }
        }

        let held = inspector.user_database_roles(&self.spec.database, &self.spec.name)?;
        if let Some((held, wanted)) = role_drift(&held, &self.spec.roles) {
            from.push(held);
            to.push(wanted);
        }

        if to.is_empty() {
            return Ok(None);
        }
        Ok(Some((from.join("; "), to.join("; "))))
    }
}

impl fmt::Debug for UserResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserResource")
            .field("spec", &self.spec)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl Resource for UserResource {
    fn id(&self) -> String {
        format!("{}.{}", self.spec.database, self.spec.name)
    }

    fn description(&self) -> String {
        match (&self.spec.login, self.mode) {
            (Some(login), Mode::Present) => format!(
                "User {} in {} (login {login})",
                self.spec.name, self.spec.database
            ),
            _ => format!("User {} in {}", self.spec.name, self.spec.database),
        }
    }

    fn resource_type(&self) -> &'static str {
        "user"
    }

    fn current_state(&self) -> Result<ResourceState> {
        let inspector = self.reconciler.inspector();
        let (db, name) = (&self.spec.database, &self.spec.name);

        let exists = inspector
            .database_exists(db)
            .and_then(|found| if found { inspector.user_exists(db, name) } else { Ok(false) })
            .with_context(|| format!("Failed to look up user {name} in {db}"))?;
        if !exists {
            return Ok(ResourceState::Absent);
        }

        if self.mode == Mode::Present
            && let Some((from, to)) = self.drift()?
        {
            return Ok(ResourceState::Modified { from, to });
        }
        Ok(present())
    }

    fn desired_state(&self) -> ResourceState {
        match self.mode {
            Mode::Present => present(),
            Mode::Absent => ResourceState::Absent,
        }
    }

    fn apply(&self, ctx: &mut ApplyContext) -> Result<ApplyResult> {
        if ctx.dry_run {
            return Ok(dry_run());
        }

        let change = match self.mode {
            Mode::Present => self.reconciler.ensure_user_exists(&self.spec)?.change,
            Mode::Absent => self
                .reconciler
                .ensure_user_absent(&self.spec.database, &self.spec.name)?,
        };
        Ok(apply_result(change))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::testing::reconciler;
    use crate::resource::{DatabaseResource, LoginResource};
    use mssqlkit::{DatabaseSpec, LoginSpec, Password};

    fn spec(login: Option<&str>, roles: &[&str]) -> UserSpec {
        UserSpec {
            database: "orders_db".into(),
            name: "svc_user".into(),
            default_schema: "dbo".into(),
            login: login.map(ToString::to_string),
            roles: roles.iter().map(ToString::to_string).collect(),
        }
    }

    fn with_database_and_login() -> Arc<Reconciler> {
        let (_mem, reconciler) = reconciler();
        let mut ctx = ApplyContext::default();
        DatabaseResource::new(reconciler.clone(), DatabaseSpec::new("orders_db"), true, Mode::Present)
            .apply(&mut ctx)
            .unwrap();
        let login = LoginSpec {
            name: "svc_login".into(),
            password: Password::new("S3rvice!Pass").unwrap(),
            default_database: "orders_db".into(),
            server_roles: vec![],
        };
        LoginResource::present(reconciler.clone(), login)
            .apply(&mut ctx)
            .unwrap();
        reconciler
    }

    #[test]
    fn test_absent_database_means_absent_user() {
        let (_mem, reconciler) = reconciler();
        let user = UserResource::new(reconciler, spec(None, &[]), Mode::Present);

        assert_eq!(user.current_state().unwrap(), ResourceState::Absent);
        let err = user.apply(&mut ApplyContext::default()).unwrap_err();
        assert!(err.to_string().contains("orders_db"));
    }

    #[test]
    fn test_create_bound_user_with_roles() {
        let reconciler = with_database_and_login();
        let user = UserResource::new(
            reconciler.clone(),
            spec(Some("svc_login"), &["db_datareader"]),
            Mode::Present,
        );

        assert_eq!(user.apply(&mut ApplyContext::default()).unwrap(), ApplyResult::Created);
        assert!(!user.needs_apply().unwrap());

        let record = reconciler.read_user("orders_db", "svc_user").unwrap();
        assert_eq!(record.login.as_deref(), Some("svc_login"));
    }

    #[test]
    fn test_drift_reports_binding_and_roles() {
        let reconciler = with_database_and_login();
        UserResource::new(reconciler.clone(), spec(None, &[]), Mode::Present)
            .apply(&mut ApplyContext::default())
            .unwrap();

        let user = UserResource::new(reconciler, spec(Some("svc_login"), &["db_owner"]), Mode::Present);
        let state = user.current_state().unwrap();

        let ResourceState::Modified { from, to } = state else {
            panic!("expected a modification, got {state:?}");
        };
        assert!(to.contains("login: svc_login"));
        assert!(to.contains("db_owner"));
        assert!(from.contains("no roles"));
        assert_eq!(user.apply(&mut ApplyContext::default()).unwrap(), ApplyResult::Modified);
    }

    #[test]
    fn test_destroy_drops_user() {
        let reconciler = with_database_and_login();
        UserResource::new(reconciler.clone(), spec(None, &[]), Mode::Present)
            .apply(&mut ApplyContext::default())
            .unwrap();

        let user = UserResource::new(reconciler, spec(None, &[]), Mode::Absent);
        assert!(user.needs_apply().unwrap());
        assert_eq!(user.apply(&mut ApplyContext::default()).unwrap(), ApplyResult::Removed);
        assert!(!user.needs_apply().unwrap());
    }
}
