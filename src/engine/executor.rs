//! Execution engine - declarative executor with terminal UI

use anyhow::{Context as AnyhowContext, Result};
use colored::Colorize;
use declarative::{
    ApplyResult, ConfirmCallback, ExecuteSummary, ExecutionPlan, ProgressCallback, compute_diffs,
};
use indicatif::ProgressBar;
use mssqlkit::DropStep;
use mssqlkit::retry::RetryCallback;

use super::differ::display_diff;
use crate::{progress, ui};

/// Options for execution (CLI-specific, includes `yes` for confirmation skip)
#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    /// Don't make changes, just show what would happen
    pub dry_run: bool,
    /// Skip confirmation prompts
    pub yes: bool,
    /// Keep applying after a resource fails
    pub keep_going: bool,
    /// Verbose output
    pub verbose: bool,
    /// No progress bar
    pub quiet: bool,
}

/// Show the diff, confirm, then converge every resource that differs
pub fn execute(plan: ExecutionPlan, opts: &ExecuteOptions) -> Result<ExecuteSummary> {
    let spinner = (!opts.quiet).then(|| progress::spinner("Reading server state..."));
    let diffs = compute_diffs(plan.resources());
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }
    let diffs = diffs?;

    display_diff(&diffs);

    if diffs.is_empty() {
        return Ok(ExecuteSummary::default());
    }

    if opts.dry_run {
        println!();
        println!("  {} Dry run - no changes made", "ℹ".blue());
        return Ok(ExecuteSummary::default());
    }

    let engine_opts = declarative::ExecuteOptions {
        dry_run: false,
        keep_going: opts.keep_going,
        verbose: opts.verbose,
    };
    let mut progress = BarProgress::new(opts.quiet);
    let mut confirm = PromptConfirm {
        yes: opts.yes,
        declined: false,
    };

    let summary = declarative::execute(plan, engine_opts, &mut progress, &mut confirm)?;

    if confirm.declined {
        println!();
        println!("  {} Aborted", "✗".red());
    } else {
        print_summary(&summary);
    }
    Ok(summary)
}

// ============================================================================
// Callbacks
// ============================================================================

/// Progress bar over the resources being applied
struct BarProgress {
    quiet: bool,
    bar: Option<ProgressBar>,
}

impl BarProgress {
    fn new(quiet: bool) -> Self {
        Self { quiet, bar: None }
    }
}

impl ProgressCallback for BarProgress {
    fn on_plan_start(&mut self, count: usize) {
        if !self.quiet {
            println!();
            self.bar = Some(progress::resource_bar(count as u64, "Applying"));
        }
    }

    fn on_resource_start(&mut self, id: &str, description: &str) {
        log::debug!("Applying {id}: {description}");
        if let Some(bar) = &self.bar {
            bar.set_message(description.to_string());
        }
    }

    fn on_resource_complete(&mut self, id: &str, result: &ApplyResult) {
        let line = match result {
            ApplyResult::Failed { error } => {
                format!("  {} {id} {}", ui::result_symbol(result), error.red())
            }
            ApplyResult::Skipped { reason } => {
                format!("  {} {id} {}", ui::result_symbol(result), reason.dimmed())
            }
            _ => format!("  {} {id}", ui::result_symbol(result)),
        };
        match &self.bar {
            Some(bar) => {
                bar.println(line);
                bar.inc(1);
            }
            None if !self.quiet => println!("{line}"),
            None => {}
        }
    }

    fn on_plan_complete(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}

/// Asks on the terminal unless `--yes` was given
struct PromptConfirm {
    yes: bool,
    /// The prompt was shown and answered no
    declined: bool,
}

impl ConfirmCallback for PromptConfirm {
    fn confirm(&mut self, prompt: &str) -> Result<bool> {
        if self.yes {
            return Ok(true);
        }
        if !console::Term::stdout().is_term() {
            anyhow::bail!("Refusing to prompt without a terminal; pass --yes to apply");
        }

        println!();
        let confirmed = dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()
            .context("Failed to read confirmation")?;
        self.declined = !confirmed;
        Ok(confirmed)
    }
}

/// Prints each retried drop step
pub struct PrintRetry;

impl RetryCallback for PrintRetry {
    fn on_retry(&self, step: DropStep, attempt: u32, max_attempts: u32, error: &mssqlkit::Error) {
        log::debug!("retrying {step}: {error}");
        eprintln!(
            "    {} Could not {step} (attempt {attempt}/{max_attempts}), retrying: {}",
            "⚠".yellow(),
            error.to_string().dimmed()
        );
    }
}

// ============================================================================
// Summary
// ============================================================================

fn print_summary(summary: &ExecuteSummary) {
    println!();
    if summary.is_success() {
        println!("  {} Server converged", "✓".green().bold());
    } else {
        println!("  {} Converged with errors", "⚠".yellow().bold());
    }

    if summary.created > 0 {
        println!("    • {} resources created", summary.created);
    }
    if summary.modified > 0 {
        println!("    • {} resources modified", summary.modified);
    }
    if summary.removed > 0 {
        println!("    • {} resources removed", summary.removed);
    }
    if summary.skipped > 0 {
        println!("    • {} resources skipped", summary.skipped);
    }
    if summary.failed > 0 {
        println!("    • {} {} failed", summary.failed, "resources".red());
        for failure in &summary.failures {
            println!(
                "      {} {} {}: {}",
                "✗".red(),
                failure.resource_type,
                failure.resource_id.bold(),
                failure.error
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::planner::build_plan;
    use crate::resource::Mode;
    use crate::resource::testing::reconciler;
    use crate::schema::Manifest;

    const MANIFEST: &str = r#"
[[databases]]
name = "orders_db"
drop_on_destroy = true

[[logins]]
name = "svc_login"
password = "S3rvice!Pass"
drop_on_destroy = true

[[users]]
database = "orders_db"
name = "svc_user"
login = "svc_login"
roles = ["db_datareader"]
"#;

    fn opts() -> ExecuteOptions {
        ExecuteOptions {
            yes: true,
            quiet: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_apply_then_idempotent() {
        let (mem, reconciler) = reconciler();
        let manifest = Manifest::parse(MANIFEST).unwrap();

        let plan = build_plan(&manifest, &reconciler, Mode::Present).unwrap();
        let summary = execute(plan, &opts()).unwrap();
        assert_eq!(summary.created, 3);
        assert!(summary.is_success());

        mem.clear_executed();
        let plan = build_plan(&manifest, &reconciler, Mode::Present).unwrap();
        let summary = execute(plan, &opts()).unwrap();
        assert_eq!(summary.total(), 0);
        assert!(mem.executed().is_empty());
    }

    #[test]
    fn test_destroy_after_apply() {
        let (mem, reconciler) = reconciler();
        let manifest = Manifest::parse(MANIFEST).unwrap();
        execute(build_plan(&manifest, &reconciler, Mode::Present).unwrap(), &opts()).unwrap();

        let plan = build_plan(&manifest, &reconciler, Mode::Absent).unwrap();
        let summary = execute(plan, &opts()).unwrap();

        assert_eq!(summary.removed, 3);
        assert!(mem.database_names().is_empty());
    }

    #[test]
    fn test_failure_is_reported_and_rest_skipped() {
        let (mem, reconciler) = reconciler();
        let manifest = Manifest::parse(MANIFEST).unwrap();
        mem.fail_next("CREATE DATABASE", 1);

        let plan = build_plan(&manifest, &reconciler, Mode::Present).unwrap();
        let summary = execute(plan, &opts()).unwrap();

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.failures[0].resource_id, "orders_db");
    }

    #[test]
    fn test_dry_run_leaves_server_untouched() {
        let (mem, reconciler) = reconciler();
        let manifest = Manifest::parse(MANIFEST).unwrap();

        let plan = build_plan(&manifest, &reconciler, Mode::Present).unwrap();
        let summary = execute(
            plan,
            &ExecuteOptions {
                dry_run: true,
                ..opts()
            },
        )
        .unwrap();

        assert_eq!(summary.total(), 0);
        assert!(mem.executed().is_empty());
    }

    #[test]
    fn test_offline_server_fails_before_any_change() {
        let (mem, reconciler) = reconciler();
        let manifest = Manifest::parse(MANIFEST).unwrap();
        mem.set_offline(true);

        let plan = build_plan(&manifest, &reconciler, Mode::Present).unwrap();
        let err = execute(plan, &opts()).unwrap_err();

        assert!(format!("{err:#}").contains("Failed to read state of database orders_db"));
    }
}
