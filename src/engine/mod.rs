//! Execution engine for sqlconverge
//!
//! The engine orchestrates:
//! 1. Planning - Build the resource list from the manifest
//! 2. Diffing - Compute current vs desired state
//! 3. Executing - Converge one resource at a time, in plan order

pub mod differ;
pub mod executor;
pub mod planner;

pub use executor::{ExecuteOptions, PrintRetry, execute};
pub use planner::build_plan;
