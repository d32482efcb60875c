//! Execution engine - applies resources one at a time, in plan order

use crate::context::{ApplyContext, ConfirmCallback, ProgressCallback};
use crate::diff::compute_diffs;
use crate::planner::ExecutionPlan;
use crate::resource::Resource;
use crate::types::{ApplyResult, ExecuteOptions, ExecuteSummary, Failure};
use anyhow::Result;
use std::collections::HashSet;

/// Execute a plan with the given options and callbacks
///
/// Only resources whose current state differs from the desired state are
/// applied. After the first failure the remaining resources are skipped,
/// unless `opts.keep_going` is set.
///
/// # Arguments
/// * `plan` - The execution plan to run
/// * `opts` - Execution options (dry_run, keep_going, verbose)
/// * `progress` - Progress callback
/// * `confirm` - Confirmation callback
///
/// # Returns
/// Summary of execution results
pub fn execute<P, C>(
    plan: ExecutionPlan,
    opts: ExecuteOptions,
    progress: &mut P,
    confirm: &mut C,
) -> Result<ExecuteSummary>
where
    P: ProgressCallback,
    C: ConfirmCallback,
{
    let diffs = compute_diffs(plan.resources())?;
    if diffs.is_empty() {
        return Ok(ExecuteSummary::default());
    }

    if opts.dry_run {
        return Ok(ExecuteSummary::default());
    }

    if !confirm.confirm("Apply changes?")? {
        return Ok(ExecuteSummary {
            skipped: diffs.len(),
            ..Default::default()
        });
    }

    let pending: HashSet<(String, String)> = diffs
        .into_iter()
        .map(|d| (d.resource_type, d.resource_id))
        .collect();

    let mut summary = ExecuteSummary::default();
    let mut halted = false;

    progress.on_plan_start(pending.len());
    for resource in plan.resources() {
        let key = (resource.resource_type().to_string(), resource.id());
        if !pending.contains(&key) {
            continue;
        }

        let id = resource.id();
        progress.on_resource_start(&id, &resource.description());
        let result = if halted {
            ApplyResult::Skipped {
                reason: "an earlier resource failed".to_string(),
            }
        } else {
            apply_resource(resource.as_ref(), opts.verbose)
        };
        progress.on_resource_complete(&id, &result);

        if let ApplyResult::Failed { error } = &result {
            log::error!("{} {id} failed: {error}", resource.resource_type());
            summary.failures.push(Failure {
                resource_type: key.0,
                resource_id: id,
                error: error.clone(),
            });
            halted = !opts.keep_going;
        }
        summary.add_result(&result);
    }
    progress.on_plan_complete();

    Ok(summary)
}

/// Apply a single resource
fn apply_resource(resource: &dyn Resource, verbose: bool) -> ApplyResult {
    let mut ctx = ApplyContext::new(false, verbose);

    match resource.apply(&mut ctx) {
        Ok(result) => result,
        Err(e) => ApplyResult::Failed {
            error: format!("{e:#}"),
        },
    }
}

/// Simple execution without callbacks
///
/// For basic use cases where you don't need progress or confirmation.
pub fn execute_simple(plan: ExecutionPlan, opts: ExecuteOptions) -> Result<ExecuteSummary> {
    use crate::context::{AutoConfirm, NoProgress};

    execute(plan, opts, &mut NoProgress, &mut AutoConfirm)
}
