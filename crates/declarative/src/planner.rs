//! Execution planner - an ordered list of resources

use crate::resource::{BoxedResource, Resource};

/// Resources in the order they must be applied
#[derive(Debug, Default)]
pub struct ExecutionPlan {
    resources: Vec<BoxedResource>,
}

impl ExecutionPlan {
    /// Create a new empty plan
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a resource; it runs after everything already in the plan
    pub fn push(&mut self, resource: BoxedResource) {
        self.resources.push(resource);
    }

    /// Resources in execution order
    pub fn resources(&self) -> &[BoxedResource] {
        &self.resources
    }

    /// Reverse the execution order (used for teardown)
    pub fn reversed(mut self) -> Self {
        self.resources.reverse();
        self
    }

    /// Filter plan to only include resources matching a predicate
    pub fn filter<F>(self, predicate: F) -> Self
    where
        F: Fn(&dyn Resource) -> bool,
    {
        Self {
            resources: self
                .resources
                .into_iter()
                .filter(|r| predicate(r.as_ref()))
                .collect(),
        }
    }

    /// Filter plan to only include resources matching a target pattern
    ///
    /// Target format: "type" or "type.name". The name matches a whole id or
    /// any dot-separated segment of it.
    pub fn filter_by_target(self, target: Option<&str>) -> Self {
        match target {
            None => self,
            Some(t) => {
                let (resource_type, name) = parse_target(t);
                self.filter(|r| matches_filter(r, &resource_type, name.as_deref()))
            }
        }
    }

    /// Total number of resources in the plan
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Check if plan is empty
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

/// Parse a target string like "type.name" into (type, name)
///
/// Everything after the first dot is the name, so ids that contain dots
/// ("user.orders_db.svc_user") can be targeted directly.
fn parse_target(target: &str) -> (String, Option<String>) {
    match target.split_once('.') {
        Some((kind, name)) => (kind.to_string(), Some(name.to_string())),
        None => (target.to_string(), None),
    }
}

/// Check if a resource matches the filter criteria
fn matches_filter(resource: &dyn Resource, resource_type: &str, name: Option<&str>) -> bool {
    // Allow plural and short aliases
    let wanted = match resource_type {
        "databases" | "db" => "database",
        "logins" => "login",
        "users" => "user",
        "user_logins" | "bindings" | "binding" => "user_login",
        other => other,
    };
    if resource.resource_type() != wanted {
        return false;
    }

    match name {
        None => true,
        Some(n) => {
            let id = resource.id();
            id == n || id.split('.').any(|segment| segment == n)
        }
    }
}
