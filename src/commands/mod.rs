pub mod declarative;
pub mod inspect;
pub mod validate;

use anyhow::{Context as AnyhowContext, Result};
use mssqlkit::Server;
use std::sync::Arc;

use crate::Context;
use crate::engine::PrintRetry;
use crate::paths;
use crate::progress;
use crate::schema::Manifest;

/// Load the manifest selected by `--config` and the environment
pub fn load_manifest(ctx: &Context) -> Result<Manifest> {
    let path = paths::manifest_path(ctx.config.as_deref())?;
    log::info!("Loading manifest {}", path.display());
    Manifest::load(&path)
}

/// Connect to the server declared in the manifest
pub fn connect(ctx: &Context, manifest: &Manifest) -> Result<Server> {
    let settings = manifest.server.connect_settings()?;
    let address = manifest.server.address();

    let spinner = (!ctx.quiet).then(|| progress::spinner(&format!("Connecting to {address}...")));
    let server = Server::connect(&settings);
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }

    let server = server.with_context(|| format!("Could not connect to {address}"))?;
    log::info!("Connected to {address} as {}", settings.username);
    Ok(server
        .with_retry_policy(manifest.retry.policy())
        .with_retry_callback(Arc::new(PrintRetry)))
}
