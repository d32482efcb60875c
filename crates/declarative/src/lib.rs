//! # Declarative
//!
//! A framework for declarative resource management.
//!
//! This crate provides the core abstractions for declaring desired state,
//! detecting current state, and converging systems to match the desired state.
//!
//! ## Core Concepts
//!
//! - **Resource**: Something with state that can be managed (a database, a login)
//! - **ResourceState**: The current or desired state of a resource
//! - **ExecutionPlan**: Resources in the order they must be applied
//! - **Executor**: Applies the resources that differ, one at a time
//!
//! ## Example
//!
//! ```ignore
//! use declarative::{ExecuteOptions, ExecutionPlan, execute_simple};
//!
//! let mut plan = ExecutionPlan::new();
//! plan.push(Box::new(DatabaseResource::new("orders_db")));
//! plan.push(Box::new(LoginResource::new("svc_login")));
//!
//! let summary = execute_simple(plan, ExecuteOptions::default())?;
//! if !summary.is_success() {
//!     for failure in &summary.failures {
//!         eprintln!("{} {}: {}", failure.resource_type, failure.resource_id, failure.error);
//!     }
//! }
//! ```
//!
//! ## Provider Traits
//!
//! The crate uses traits for dependency injection:
//!
//! - [`ProgressCallback`]: Receives progress updates
//! - [`ConfirmCallback`]: Handles user confirmations
//!
//! This allows the crate to be used without hard dependencies on
//! specific UI frameworks.

pub mod context;
pub mod diff;
pub mod executor;
pub mod planner;
pub mod resource;
pub mod types;

// Re-export main types at crate root
pub use context::{
    ApplyContext, AutoConfirm, AutoDecline, ConfirmCallback, NoProgress, ProgressCallback,
};
pub use diff::{DiffSummary, ResourceDiff, compute_diffs, group_by_type};
pub use executor::{execute, execute_simple};
pub use planner::ExecutionPlan;
pub use resource::{BoxedResource, Resource};
pub use types::{ApplyResult, ExecuteOptions, ExecuteSummary, Failure, ResourceState};
