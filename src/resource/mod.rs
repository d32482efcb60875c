//! Resource adapters between manifest entries and the reconciler
//!
//! Every manifest entry becomes a declarative Resource with:
//! - State detection (queried from the server catalogs on every call)
//! - Apply function (one reconciler operation)
//! - A mode: converge towards presence (`apply`) or absence (`destroy`)

use declarative::{ApplyResult, ResourceState};
use mssqlkit::Change;

pub mod database;
pub mod login;
pub mod user;
pub mod user_login;

pub use database::DatabaseResource;
pub use login::LoginResource;
pub use user::UserResource;
pub use user_login::UserLoginResource;

/// Which way a resource converges
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Create what is missing
    Present,
    /// Drop what is declared droppable
    Absent,
}

pub(crate) fn present() -> ResourceState {
    ResourceState::Present { details: None }
}

/// Translate a reconciler outcome into an executor result
pub(crate) fn apply_result(change: Change) -> ApplyResult {
    match change {
        Change::Created | Change::Restored => ApplyResult::Created,
        Change::Updated => ApplyResult::Modified,
        Change::Removed => ApplyResult::Removed,
        Change::Unchanged => ApplyResult::NoChange,
        Change::Retained => ApplyResult::Skipped {
            reason: "drop_on_destroy is off".to_string(),
        },
    }
}

pub(crate) fn dry_run() -> ApplyResult {
    ApplyResult::Skipped {
        reason: "Dry run".to_string(),
    }
}

/// Describe the roles that still have to be granted
pub(crate) fn role_drift(held: &[String], wanted: &[String]) -> Option<(String, String)> {
    let missing: Vec<&String> = wanted.iter().filter(|r| !held.contains(r)).collect();
    if missing.is_empty() {
        return None;
    }
    let from = if held.is_empty() {
        "no roles".to_string()
    } else {
        format!("roles: {}", held.join(", "))
    };
    let mut all: Vec<&String> = held.iter().collect();
    all.extend(missing);
    let to = format!(
        "roles: {}",
        all.iter().map(|r| r.as_str()).collect::<Vec<_>>().join(", ")
    );
    Some((from, to))
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_result_mapping() {
        assert_eq!(apply_result(Change::Restored), ApplyResult::Created);
        assert_eq!(apply_result(Change::Updated), ApplyResult::Modified);
        assert_eq!(apply_result(Change::Unchanged), ApplyResult::NoChange);
        assert!(matches!(
            apply_result(Change::Retained),
            ApplyResult::Skipped { .. }
        ));
    }

    #[test]
    fn test_role_drift() {
        let held = vec!["db_datareader".to_string()];
        assert_eq!(role_drift(&held, &held), None);

        let wanted = vec!["db_datareader".to_string(), "db_datawriter".to_string()];
        assert_eq!(
            role_drift(&held, &wanted),
            Some((
                "roles: db_datareader".to_string(),
                "roles: db_datareader, db_datawriter".to_string()
            ))
        );
        assert_eq!(
            role_drift(&[], &wanted[1..]),
            Some(("no roles".to_string(), "roles: db_datawriter".to_string()))
        );
    }
}
