//! Manifest path resolution for sqlconverge
//!
//! # Environment Variables
//!
//! - `SQLCONVERGE_CONFIG` - Path to the manifest file
//! - `SQLCONVERGE_PASSWORD` - Server password, overrides `[server].password`
//!
//! # Resolution Priority
//!
//! For manifest_path():
//! 1. `--config` flag
//! 2. `SQLCONVERGE_CONFIG` environment variable
//! 3. `./sqlconverge.toml` (if it exists)
//! 4. `XDG_CONFIG_HOME/sqlconverge/config.toml` (if set)
//! 5. `~/.config/sqlconverge/config.toml`

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Environment variable for the manifest path
pub const ENV_CONFIG: &str = "SQLCONVERGE_CONFIG";

/// Environment variable overriding the server password
pub const ENV_PASSWORD: &str = "SQLCONVERGE_PASSWORD";

/// Manifest file name looked up in the working directory
pub const LOCAL_MANIFEST: &str = "sqlconverge.toml";

/// Resolve the manifest to load.
///
/// The returned path is not checked for existence except for the
/// working-directory candidate, which is only chosen when present.
pub fn manifest_path(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        let path = expand(&path.to_string_lossy());
        log::debug!("Using manifest from --config: {}", path.display());
        return Ok(path);
    }

    if let Ok(value) = std::env::var(ENV_CONFIG) {
        let path = expand(&value);
        log::debug!("Using manifest from {ENV_CONFIG}: {}", path.display());
        return Ok(path);
    }

    let local = PathBuf::from(LOCAL_MANIFEST);
    if local.is_file() {
        log::debug!("Using manifest in working directory");
        return Ok(local);
    }

    let path = config_dir()?.join("config.toml");
    log::debug!("Using default manifest: {}", path.display());
    Ok(path)
}

/// The sqlconverge config directory
pub fn config_dir() -> Result<PathBuf> {
    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        return Ok(PathBuf::from(xdg_config).join("sqlconverge"));
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".config").join("sqlconverge"))
}

/// Expand `~` and environment variables in a path.
///
/// Unknown variables are left as written.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}
