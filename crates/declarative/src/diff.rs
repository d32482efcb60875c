//! Diff computation for resources

use crate::resource::Resource;
use crate::types::ResourceState;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A diff between current and desired state of a resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceDiff {
    /// Unique identifier of the resource
    pub resource_id: String,
    /// Type of the resource
    pub resource_type: String,
    /// Human-readable description
    pub description: String,
    /// Current state
    pub current: ResourceState,
    /// Desired state
    pub desired: ResourceState,
}

impl ResourceDiff {
    /// Create a diff from a resource, returning None if no changes needed
    pub fn from_resource(resource: &dyn Resource) -> Result<Option<Self>> {
        let current = resource.current_state()?;
        let desired = resource.desired_state();

        if current == desired {
            return Ok(None);
        }

        Ok(Some(Self {
            resource_id: resource.id(),
            resource_type: resource.resource_type().to_string(),
            description: resource.description(),
            current,
            desired,
        }))
    }

    /// Check if this diff represents an addition
    pub fn is_addition(&self) -> bool {
        matches!(
            (&self.current, &self.desired),
            (ResourceState::Absent, ResourceState::Present { .. })
        )
    }

    /// Check if this diff represents a removal
    pub fn is_removal(&self) -> bool {
        matches!(
            (&self.current, &self.desired),
            (ResourceState::Present { .. } | ResourceState::Modified { .. }, ResourceState::Absent)
        )
    }

    /// Check if this diff represents a modification
    pub fn is_modification(&self) -> bool {
        !self.is_addition() && !self.is_removal()
    }
}

/// Compute diffs for a list of resources
///
/// Returns only resources that have differences between current and desired
/// state. The first state detection failure aborts the computation.
pub fn compute_diffs(resources: &[Box<dyn Resource>]) -> Result<Vec<ResourceDiff>> {
    let mut diffs = Vec::new();
    for resource in resources {
        let diff = ResourceDiff::from_resource(resource.as_ref()).with_context(|| {
            format!(
                "Failed to read state of {} {}",
                resource.resource_type(),
                resource.id()
            )
        })?;
        diffs.extend(diff);
    }
    Ok(diffs)
}

/// Diff summary statistics
#[derive(Debug, Clone, Default)]
pub struct DiffSummary {
    /// Number of resources to add
    pub additions: usize,
    /// Number of resources to remove
    pub removals: usize,
    /// Number of resources to modify
    pub modifications: usize,
}

impl DiffSummary {
    /// Create a summary from a list of diffs
    pub fn from_diffs(diffs: &[ResourceDiff]) -> Self {
        let mut summary = Self::default();
        for diff in diffs {
            if diff.is_addition() {
                summary.additions += 1;
            } else if diff.is_removal() {
                summary.removals += 1;
            } else {
                summary.modifications += 1;
            }
        }
        summary
    }

    /// Total number of changes
    pub fn total(&self) -> usize {
        self.additions + self.removals + self.modifications
    }

    /// Check if there are any changes
    pub fn has_changes(&self) -> bool {
        self.total() > 0
    }
}

/// Group diffs by resource type, in type-name order
pub fn group_by_type(diffs: &[ResourceDiff]) -> BTreeMap<String, Vec<&ResourceDiff>> {
    let mut groups: BTreeMap<String, Vec<&ResourceDiff>> = BTreeMap::new();
    for diff in diffs {
        groups
            .entry(diff.resource_type.clone())
            .or_default()
            .push(diff);
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diff(current: ResourceState, desired: ResourceState) -> ResourceDiff {
        ResourceDiff {
            resource_id: "orders_db".into(),
            resource_type: "database".into(),
            description: "Database orders_db".into(),
            current,
            desired,
        }
    }

    #[test]
    fn test_diff_kinds() {
        let present = ResourceState::Present { details: None };
        let add = diff(ResourceState::Absent, present.clone());
        let remove = diff(present.clone(), ResourceState::Absent);
        let modify = diff(
            ResourceState::Modified {
                from: "login old".into(),
                to: "login new".into(),
            },
            present,
        );

        assert!(add.is_addition());
        assert!(remove.is_removal());
        assert!(modify.is_modification());

        let summary = DiffSummary::from_diffs(&[add, remove, modify]);
        assert_eq!(
            (summary.additions, summary.removals, summary.modifications),
            (1, 1, 1)
        );
        assert!(summary.has_changes());
    }

    #[test]
    fn test_group_by_type_is_ordered() {
        let mut login = diff(ResourceState::Absent, ResourceState::Present { details: None });
        login.resource_type = "login".into();
        let db = diff(ResourceState::Absent, ResourceState::Present { details: None });

        let diffs = [login, db];
        let groups = group_by_type(&diffs);
        let keys: Vec<_> = groups.keys().cloned().collect();
        assert_eq!(keys, vec!["database", "login"]);
    }
}
