//! Database resource

use anyhow::{Context, Result};
use declarative::{ApplyContext, ApplyResult, Resource, ResourceState};
use mssqlkit::{DatabaseSpec, Reconciler};
use std::fmt;
use std::sync::Arc;

use super::{Mode, apply_result, dry_run, present};

/// A database, created empty or restored from a backup
pub struct DatabaseResource {
    reconciler: Arc<Reconciler>,
    spec: DatabaseSpec,
    drop_on_destroy: bool,
    mode: Mode,
}

impl DatabaseResource {
    pub fn new(
        reconciler: Arc<Reconciler>,
        spec: DatabaseSpec,
        drop_on_destroy: bool,
        mode: Mode,
    ) -> Self {
        Self {
            reconciler,
            spec,
            drop_on_destroy,
            mode,
        }
    }
}

impl fmt::Debug for DatabaseResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseResource")
            .field("spec", &self.spec)
            .field("drop_on_destroy", &self.drop_on_destroy)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl Resource for DatabaseResource {
    fn id(&self) -> String {
        self.spec.name.clone()
    }

    fn description(&self) -> String {
        match (&self.spec.backup, self.mode) {
            (Some(backup), Mode::Present) => {
                format!("Database {} (restored from {})", self.spec.name, backup.path)
            }
            _ => format!("Database {}", self.spec.name),
        }
    }

    fn resource_type(&self) -> &'static str {
        "database"
    }

    fn current_state(&self) -> Result<ResourceState> {
        let state = self
            .reconciler
            .inspector()
            .database_state(&self.spec.name)
            .with_context(|| format!("Failed to look up database {}", self.spec.name))?;

        Ok(match state {
            None => ResourceState::Absent,
            Some(s) if s.drop_pending() && self.mode == Mode::Absent && self.drop_on_destroy => {
                ResourceState::Modified {
                    from: "single-user (drop interrupted)".to_string(),
                    to: "dropped".to_string(),
                }
            }
            Some(_) => present(),
        })
    }

    fn desired_state(&self) -> ResourceState {
        match self.mode {
            Mode::Absent if self.drop_on_destroy => ResourceState::Absent,
            _ => present(),
        }
    }

    fn apply(&self, ctx: &mut ApplyContext) -> Result<ApplyResult> {
        if ctx.dry_run {
            return Ok(dry_run());
        }

        let change = match self.mode {
            Mode::Present => {
                let reconciled = self.reconciler.ensure_database_exists(&self.spec)?;
                if ctx.verbose {
                    log::info!(
                        "Database {} is {} ({})",
                        reconciled.record.name,
                        reconciled.record.state,
                        reconciled.record.user_access.as_catalog()
                    );
                }
                reconciled.change
            }
            Mode::Absent => self
                .reconciler
                .ensure_database_absent(&self.spec.name, self.drop_on_destroy)?,
        };
        Ok(apply_result(change))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::testing::reconciler;
    use mssqlkit::{BackupDescriptor, RestoreTarget, TargetDirs};

    #[test]
    fn test_create_when_absent() {
        let (mem, reconciler) = reconciler();
        let db = DatabaseResource::new(reconciler, DatabaseSpec::new("orders_db"), false, Mode::Present);

        assert!(db.needs_apply().unwrap());
        let result = db.apply(&mut ApplyContext::default()).unwrap();

        assert_eq!(result, ApplyResult::Created);
        assert!(!db.needs_apply().unwrap());
        assert_eq!(mem.executed(), vec!["CREATE DATABASE [orders_db]"]);
    }

    #[test]
    fn test_restore_from_backup() {
        let (mem, reconciler) = reconciler();
        let backup = BackupDescriptor::new("/backups/orders.bak", "orders", "orders_log");
        mem.register_backup(&backup);
        let spec = DatabaseSpec::new("orders_db").with_backup(
            backup,
            TargetDirs::Fixed(RestoreTarget::new("/data", "/logs")),
        );

        let db = DatabaseResource::new(reconciler, spec, false, Mode::Present);
        assert!(db.description().contains("/backups/orders.bak"));
        assert_eq!(db.apply(&mut ApplyContext::default()).unwrap(), ApplyResult::Created);
        assert_eq!(
            mem.database_files("orders_db"),
            Some(("/data/orders_db.mdf".to_string(), "/logs/orders_db.ldf".to_string()))
        );
    }

    #[test]
    fn test_destroy_respects_flag() {
        let (mem, reconciler) = reconciler();
        let create = DatabaseResource::new(reconciler.clone(), DatabaseSpec::new("orders_db"), false, Mode::Present);
        create.apply(&mut ApplyContext::default()).unwrap();

        let keep = DatabaseResource::new(reconciler.clone(), DatabaseSpec::new("orders_db"), false, Mode::Absent);
        assert!(!keep.needs_apply().unwrap());

        let drop = DatabaseResource::new(reconciler, DatabaseSpec::new("orders_db"), true, Mode::Absent);
        assert!(drop.needs_apply().unwrap());
        assert_eq!(drop.apply(&mut ApplyContext::default()).unwrap(), ApplyResult::Removed);
        assert!(mem.database_names().is_empty());
    }

    #[test]
    fn test_dry_run_changes_nothing() {
        let (mem, reconciler) = reconciler();
        let db = DatabaseResource::new(reconciler, DatabaseSpec::new("orders_db"), false, Mode::Present);

        let result = db.apply(&mut ApplyContext::new(true, false)).unwrap();

        assert!(matches!(result, ApplyResult::Skipped { .. }));
        assert!(mem.executed().is_empty());
    }
}
