//! Refresh action - replaces the local catalog manifest with a fresh copy.

use anyhow::{Context, Result};
use log::info;

use crate::config::Config;
use crate::download::{Fetcher, download_file};
use crate::interrupt::Interrupt;
use crate::runtime::Runtime;

/// Download `<catalog_url>plugins.xml?qgis=<version>` over the local
/// manifest. The old file stays in place until the new one is complete.
///
/// Returns the manifest size in bytes, or `None` if interrupted.
#[tracing::instrument(skip(runtime, fetcher, config, interrupt))]
pub async fn refresh_manifest<R: Runtime, F: Fetcher + ?Sized>(
    runtime: &R,
    fetcher: &F,
    config: &Config,
    interrupt: &Interrupt,
) -> Result<Option<u64>> {
    let url = config.manifest_url();
    info!("Fetching catalog manifest from {}", url);

    match interrupt
        .guard(download_file(runtime, fetcher, &url, &config.manifest_path))
        .await
    {
        Some(result) => result
            .map(Some)
            .with_context(|| format!("Failed to fetch catalog manifest from {}", url)),
        None => Ok(None),
    }
}
