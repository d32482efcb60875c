//! Diff display

use colored::Colorize;
use declarative::{DiffSummary, ResourceDiff, ResourceState, group_by_type};

use crate::ui;

/// Display a list of diffs grouped by resource type
pub fn display_diff(diffs: &[ResourceDiff]) {
    if diffs.is_empty() {
        println!();
        println!("  {} No changes needed", "✓".green());
        return;
    }

    println!();
    println!(
        "┌─ {} ─────────────────────────────────────────┐",
        "Server Diff".bold()
    );
    println!("│");

    for (resource_type, type_diffs) in group_by_type(diffs) {
        println!("│ {}", ui::type_label(&resource_type).bold());

        for diff in type_diffs {
            println!(
                "│   {} {:<30} {}",
                change_symbol(diff),
                diff.resource_id,
                change_text(diff).dimmed()
            );
        }
        println!("│");
    }

    let summary = DiffSummary::from_diffs(diffs);
    println!("├─────────────────────────────────────────────────────┤");
    println!(
        "│ Summary: {} changes ({} to create, {} to change, {} to drop)",
        summary.total().to_string().bold(),
        summary.additions.to_string().green(),
        summary.modifications.to_string().yellow(),
        summary.removals.to_string().red()
    );
    println!("└─────────────────────────────────────────────────────┘");
}

fn change_symbol(diff: &ResourceDiff) -> colored::ColoredString {
    if diff.is_addition() {
        "+".green()
    } else if diff.is_removal() {
        "-".red()
    } else {
        "~".yellow()
    }
}

/// What will happen to the resource, in words
pub fn change_text(diff: &ResourceDiff) -> String {
    match (&diff.current, &diff.desired) {
        (ResourceState::Absent, ResourceState::Present { .. }) => "(will create)".to_string(),
        (ResourceState::Modified { .. }, ResourceState::Absent) => {
            "(will resume drop)".to_string()
        }
        (_, ResourceState::Absent) => "(will drop)".to_string(),
        (ResourceState::Modified { from, to }, _) => format!("{from} → {to}"),
        (current, desired) => format!(
            "{} → {}",
            ui::state_text(current),
            ui::state_text(desired)
        ),
    }
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
    fn test_change_text() {
        let present = ResourceState::Present { details: None };
        assert_eq!(
            change_text(&diff(ResourceState::Absent, present.clone())),
            "(will create)"
        );
        assert_eq!(
            change_text(&diff(present.clone(), ResourceState::Absent)),
            "(will drop)"
        );
        assert_eq!(
            change_text(&diff(
                ResourceState::Modified {
                    from: "single-user (drop interrupted)".into(),
                    to: "dropped".into()
                },
                ResourceState::Absent
            )),
            "(will resume drop)"
        );
        assert_eq!(
            change_text(&diff(
                ResourceState::Modified {
                    from: "no roles".into(),
                    to: "roles: dbcreator".into()
                },
                present
            )),
            "no roles → roles: dbcreator"
        );
    }
}
