//! Declarative commands
//!
//! - `status` - Show current state vs desired state
//! - `diff` - Preview what apply would change
//! - `apply` - Make current state match desired state
//! - `destroy` - Drop what the manifest marks droppable

use anyhow::Result;
use colored::Colorize;
use declarative::{ExecuteSummary, ExecutionPlan, compute_diffs};
use mssqlkit::Server;
use std::sync::Arc;

use crate::Context;
use crate::engine::{self, ExecuteOptions, differ};
use crate::resource::Mode;
use crate::schema::Manifest;
use crate::ui;

use super::{connect, load_manifest};

/// Flags shared by `apply` and `destroy`
#[derive(Debug, Clone, Copy, Default)]
pub struct ConvergeFlags {
    pub dry_run: bool,
    pub yes: bool,
    pub keep_going: bool,
}

fn plan(
    manifest: &Manifest,
    server: &Server,
    mode: Mode,
    target: Option<&str>,
) -> Result<ExecutionPlan> {
    let reconciler = Arc::new(server.reconciler());
    let plan = engine::build_plan(manifest, &reconciler, mode)?;
    Ok(plan.filter_by_target(target))
}

// ============================================================================
// Status Command
// ============================================================================

pub fn status(ctx: &Context, target: Option<&str>) -> Result<()> {
    let manifest = load_manifest(ctx)?;
    let server = connect(ctx, &manifest)?;
    ui::header(&format!("sqlconverge status ({})", manifest.server.address()));
    show_status(ctx, &manifest, &server, target)?;
    Ok(())
}

/// Print every resource with its current state; returns how many differ
fn show_status(
    ctx: &Context,
    manifest: &Manifest,
    server: &Server,
    target: Option<&str>,
) -> Result<usize> {
    let plan = plan(manifest, server, Mode::Present, target)?;
    if plan.is_empty() {
        ui::info("Nothing declared");
        return Ok(0);
    }

    let mut pending = 0;
    let mut section = "";
    for resource in plan.resources() {
        if resource.resource_type() != section {
            section = resource.resource_type();
            ui::section(ui::type_label(section));
        }

        let desired = resource.desired_state();
        match resource.current_state() {
            Ok(current) => {
                if current != desired {
                    pending += 1;
                }
                println!(
                    "  {} {} {}",
                    ui::state_icon(&current, &desired),
                    resource.id().bold(),
                    format!("({})", ui::state_text(&current)).dimmed()
                );
            }
            Err(e) => {
                pending += 1;
                println!("  {} {} {}", "✗".red(), resource.id().bold(), format!("{e:#}").red());
            }
        }
        if ctx.verbose > 0 {
            ui::dim(&format!("  {}", resource.description()));
        }
    }

    println!();
    if pending == 0 {
        ui::success("Everything matches the manifest");
    } else {
        ui::warn(&format!("{pending} resource(s) differ; run `sqlconverge apply`"));
    }
    Ok(pending)
}

// ============================================================================
// Diff Command
// ============================================================================

pub fn diff(ctx: &Context, target: Option<&str>) -> Result<()> {
    let manifest = load_manifest(ctx)?;
    let server = connect(ctx, &manifest)?;
    let plan = plan(&manifest, &server, Mode::Present, target)?;
    differ::display_diff(&compute_diffs(plan.resources())?);
    Ok(())
}

// ============================================================================
// Apply / Destroy Commands
// ============================================================================

pub fn apply(ctx: &Context, target: Option<&str>, flags: ConvergeFlags) -> Result<()> {
    ui::header("Applying Manifest");
    converge(ctx, target, flags, Mode::Present)
}

pub fn destroy(ctx: &Context, target: Option<&str>, flags: ConvergeFlags) -> Result<()> {
    ui::header("Destroying Manifest Resources");
    converge(ctx, target, flags, Mode::Absent)
}

fn converge(ctx: &Context, target: Option<&str>, flags: ConvergeFlags, mode: Mode) -> Result<()> {
    if flags.dry_run {
        ui::warn("Dry run - no changes will be made");
    }

    let manifest = load_manifest(ctx)?;
    let server = connect(ctx, &manifest)?;
    let summary = run(ctx, &manifest, &server, target, flags, mode)?;

    if !summary.is_success() {
        anyhow::bail!("{} resource(s) failed", summary.failed);
    }
    Ok(())
}

fn run(
    ctx: &Context,
    manifest: &Manifest,
    server: &Server,
    target: Option<&str>,
    flags: ConvergeFlags,
    mode: Mode,
) -> Result<ExecuteSummary> {
    let plan = plan(manifest, server, mode, target)?;
    let opts = ExecuteOptions {
        dry_run: flags.dry_run,
        yes: flags.yes,
        keep_going: flags.keep_going,
        verbose: ctx.verbose > 0,
        quiet: ctx.quiet,
    };
    engine::execute(plan, &opts)
}
