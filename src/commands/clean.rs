use anyhow::Result;

use crate::application::CleanAction;
use crate::config::Config;
use crate::manifest::Manifest;
use crate::runtime::Runtime;

use super::load_manifest;

/// Remove cached archives of versions the catalog no longer lists.
#[tracing::instrument(skip(runtime, config))]
pub fn clean<R: Runtime>(runtime: R, config: &Config, yes: bool) -> Result<()> {
    let manifest = load_manifest(&runtime, config)?;
    let action = CleanAction::new(&runtime, config);
    run_clean(&runtime, &action, &manifest, yes)
}

pub(super) fn run_clean<R: Runtime>(
    runtime: &R,
    action: &CleanAction<'_, R>,
    manifest: &Manifest,
    yes: bool,
) -> Result<()> {
    let old = action.old_archives(manifest)?;
    if old.is_empty() {
        println!("There are no old archives.");
        return Ok(());
    }

    println!("There are {} old archives:", old.len());
    for name in &old {
        println!("  {}", name);
    }

    if !yes && !runtime.confirm("Are you sure you want to remove these files?")? {
        println!("Cancelled.");
        return Ok(());
    }

    let removed = action.remove(&old)?;
    println!("{} files removed.", removed);
    Ok(())
}
