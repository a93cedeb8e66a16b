//! CLI-facing commands. Each one builds its collaborators, runs the
//! application actions and prints the results for the operator.

mod clean;
mod report;
mod sync;

use anyhow::{Context, Result};
use log::debug;

use crate::config::Config;
use crate::manifest::Manifest;
use crate::runtime::Runtime;

pub use clean::clean;
pub use report::report;
pub use sync::{SyncOptions, sync};

/// Read the local manifest, pointing at `--update-xml` when there is none.
fn load_manifest<R: Runtime>(runtime: &R, config: &Config) -> Result<Manifest> {
    if !runtime.exists(&config.manifest_path) {
        anyhow::bail!(
            "No catalog manifest at {:?}. Fetch one with `sync --update-xml`.",
            config.manifest_path
        );
    }
    debug!("Loading manifest {:?}", config.manifest_path);
    Manifest::load(runtime, &config.manifest_path).context("Cannot load the catalog manifest")
}
