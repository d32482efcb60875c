use colored::{ColoredString, Colorize};
use declarative::{ApplyResult, ResourceState};

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a section header
pub fn section(title: &str) {
    println!();
    println!("{}", title.cyan().bold());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

// ============================================================================
// Resource Rendering
// ============================================================================

/// Section title for a resource type
pub fn type_label(resource_type: &str) -> &str {
    match resource_type {
        "database" => "Databases",
        "login" => "Logins",
        "user" => "Users",
        "user_login" => "User bindings",
        other => other,
    }
}

/// Short text for a resource state
pub fn state_text(state: &ResourceState) -> String {
    match state {
        ResourceState::Present { details: Some(d) } => d.clone(),
        ResourceState::Present { details: None } => "present".to_string(),
        ResourceState::Absent => "absent".to_string(),
        ResourceState::Modified { from, .. } => from.clone(),
        ResourceState::Unknown => "unknown".to_string(),
    }
}

/// Icon comparing a current state with the desired one
pub fn state_icon(current: &ResourceState, desired: &ResourceState) -> ColoredString {
    match (current, desired) {
        (c, d) if c == d => "✓".green(),
        (ResourceState::Unknown, _) => "?".dimmed(),
        (ResourceState::Absent, _) => "✗".red(),
        _ => "⚠".yellow(),
    }
}

/// Icon for an apply outcome
pub fn result_symbol(result: &ApplyResult) -> ColoredString {
    match result {
        ApplyResult::NoChange => "○".dimmed(),
        ApplyResult::Created | ApplyResult::Modified | ApplyResult::Removed => "✓".green(),
        ApplyResult::Failed { .. } => "✗".red(),
        ApplyResult::Skipped { .. } => "⊘".yellow(),
    }
}

// ============================================================================
// Tests
// ============================================================================
