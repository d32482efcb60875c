//! Server login resource

use anyhow::{Context, Result};
use declarative::{ApplyContext, ApplyResult, Resource, ResourceState};
use mssqlkit::{LoginSpec, Reconciler};
use std::fmt;
use std::sync::Arc;

use super::{apply_result, dry_run, present, role_drift};

enum Target {
    Present(LoginSpec),
    Absent { name: String, drop_on_destroy: bool },
}

/// A SQL-authenticated server login and its server roles
pub struct LoginResource {
    reconciler: Arc<Reconciler>,
    target: Target,
}

impl LoginResource {
    /// Converge towards `spec`
    pub fn present(reconciler: Arc<Reconciler>, spec: LoginSpec) -> Self {
        Self {
            reconciler,
            target: Target::Present(spec),
        }
    }

    /// Drop the login on destroy, when `drop_on_destroy` allows it.
    ///
    /// No password is needed to remove a login.
    pub fn absent(reconciler: Arc<Reconciler>, name: &str, drop_on_destroy: bool) -> Self {
        Self {
            reconciler,
            target: Target::Absent {
                name: name.to_string(),
                drop_on_destroy,
            },
        }
    }

    fn name(&self) -> &str {
        match &self.target {
            Target::Present(spec) => &spec.name,
            Target::Absent { name, .. } => name,
        }
    }
}

impl fmt::Debug for LoginResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginResource")
            .field("name", &self.name())
            .finish_non_exhaustive()
    }
}

impl Resource for LoginResource {
    fn id(&self) -> String {
        self.name().to_string()
    }

    fn description(&self) -> String {
        format!("Login {}", self.name())
    }

    fn resource_type(&self) -> &'static str {
        "login"
    }

    fn current_state(&self) -> Result<ResourceState> {
        let inspector = self.reconciler.inspector();
        let name = self.name();

        if !inspector
            .login_exists(name)
            .with_context(|| format!("Failed to look up login {name}"))?
        {
            return Ok(ResourceState::Absent);
        }

        if let Target::Present(spec) = &self.target {
            let held = inspector.login_server_roles(name)?;
            if let Some((from, to)) = role_drift(&held, &spec.server_roles) {
                return Ok(ResourceState::Modified { from, to });
            }
        }
        Ok(present())
    }

    fn desired_state(&self) -> ResourceState {
        match &self.target {
            Target::Absent {
                drop_on_destroy: true,
                ..
            } => ResourceState::Absent,
            _ => present(),
        }
    }

    fn apply(&self, ctx: &mut ApplyContext) -> Result<ApplyResult> {
        if ctx.dry_run {
            return Ok(dry_run());
        }

        let change = match &self.target {
            Target::Present(spec) => {
                let reconciled = self.reconciler.ensure_login_exists(spec)?;
                if ctx.verbose {
                    log::info!(
                        "Login {} has principal id {}",
                        reconciled.record.name,
                        reconciled.record.principal_id
                    );
                }
                reconciled.change
            }
            Target::Absent {
                name,
                drop_on_destroy,
            } => self.reconciler.ensure_login_absent(name, *drop_on_destroy)?,
        };
        Ok(apply_result(change))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::testing::reconciler;
    use mssqlkit::Password;

    fn spec(roles: &[&str]) -> LoginSpec {
        LoginSpec {
            name: "svc_login".into(),
            password: Password::new("S3rvice!Pass").unwrap(),
            default_database: "master".into(),
            server_roles: roles.iter().map(ToString::to_string).collect(),
        }
    }

    #[test]
    fn test_create_then_converged() {
        let (_mem, reconciler) = reconciler();
        let login = LoginResource::present(reconciler, spec(&["dbcreator"]));

        assert_eq!(login.current_state().unwrap(), ResourceState::Absent);
        assert_eq!(login.apply(&mut ApplyContext::default()).unwrap(), ApplyResult::Created);
        assert!(!login.needs_apply().unwrap());
    }

    #[test]
    fn test_missing_role_is_a_modification() {
        let (_mem, reconciler) = reconciler();
        LoginResource::present(reconciler.clone(), spec(&[]))
            .apply(&mut ApplyContext::default())
            .unwrap();

        let login = LoginResource::present(reconciler, spec(&["dbcreator"]));
        assert_eq!(
            login.current_state().unwrap(),
            ResourceState::Modified {
                from: "no roles".into(),
                to: "roles: dbcreator".into()
            }
        );
        assert_eq!(login.apply(&mut ApplyContext::default()).unwrap(), ApplyResult::Modified);
    }

    #[test]
    fn test_destroy_kills_sessions_first() {
        let (mem, reconciler) = reconciler();
        LoginResource::present(reconciler.clone(), spec(&[]))
            .apply(&mut ApplyContext::default())
            .unwrap();
        let session = mem.open_session("svc_login", Some("app01"));
        mem.clear_executed();

        let login = LoginResource::absent(reconciler, "svc_login", true);
        assert_eq!(login.apply(&mut ApplyContext::default()).unwrap(), ApplyResult::Removed);
        assert_eq!(
            mem.executed(),
            vec![format!("KILL {session}"), "DROP LOGIN [svc_login]".to_string()]
        );
    }

    #[test]
    fn test_retained_login_has_no_diff() {
        let (_mem, reconciler) = reconciler();
        LoginResource::present(reconciler.clone(), spec(&[]))
            .apply(&mut ApplyContext::default())
            .unwrap();

        let login = LoginResource::absent(reconciler, "svc_login", false);
        assert!(!login.needs_apply().unwrap());
    }
}
