use anyhow::Result;
use std::io::Write;
use std::path::Path;

use crate::application::ReportAction;
use crate::config::Config;
use crate::manifest::Manifest;
use crate::runtime::Runtime;

use super::load_manifest;

/// Analyze the unpacked packages and write `<out_dir>/index.html`.
#[tracing::instrument(skip(runtime, config))]
pub fn report<R: Runtime>(
    runtime: R,
    config: &Config,
    out_dir: &Path,
    include_experimental: bool,
    verbose: bool,
) -> Result<()> {
    let manifest = load_manifest(&runtime, config)?;
    run_report(&runtime, config, &manifest, out_dir, include_experimental, verbose)
}

pub(super) fn run_report<R: Runtime>(
    runtime: &R,
    config: &Config,
    manifest: &Manifest,
    out_dir: &Path,
    include_experimental: bool,
    verbose: bool,
) -> Result<()> {
    let action = ReportAction::new(runtime, config)?;

    println!("Analyzing packages");
    let stats = action.run(manifest, out_dir, !include_experimental, verbose, |_| {
        print!(".");
        let _ = std::io::stdout().flush();
    })?;
    println!(" ok");
    println!("{}", stats);
    Ok(())
}
