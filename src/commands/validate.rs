use anyhow::Result;

use crate::Context;
use crate::paths;
use crate::schema::Manifest;
use crate::ui;

/// Check every name and literal in the manifest; never connects
pub fn run(ctx: &Context) -> Result<()> {
    let path = paths::manifest_path(ctx.config.as_deref())?;
    let manifest = Manifest::load(&path)?;

    ui::header("Validating Manifest");
    ui::kv("File", &path.display().to_string());
    ui::kv("Server", &manifest.server.address());
    ui::kv(
        "Declared",
        &format!(
            "{} databases, {} logins, {} users, {} bindings",
            manifest.databases.len(),
            manifest.logins.len(),
            manifest.users.len(),
            manifest.user_logins.len()
        ),
    );

    let problems = manifest.problems();
    println!();
    if problems.is_empty() {
        ui::success("Manifest is valid");
        return Ok(());
    }

    for problem in &problems {
        ui::error(problem);
    }
    anyhow::bail!("{} problem(s) in {}", problems.len(), path.display())
}
