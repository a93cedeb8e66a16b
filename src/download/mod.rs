use crate::http::HttpClient;
use crate::runtime::Runtime;
use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, info};
use std::path::Path;

/// The `Fetch(url) -> bytes` capability used by the download phases.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

#[async_trait]
impl Fetcher for HttpClient {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        self.get_bytes(url).await
    }
}

/// Downloads `url` and stores the body at `path`.
///
/// The body is written to a `.part` sibling first and renamed into place, so
/// `path` only ever exists with complete content.
#[tracing::instrument(skip(runtime, fetcher))]
pub async fn download_file<R: Runtime, F: Fetcher + ?Sized>(
    runtime: &R,
    fetcher: &F,
    url: &str,
    path: &Path,
) -> Result<u64> {
    info!("Downloading {}...", url);

    let data = fetcher.fetch(url).await?;

    if let Some(parent) = path.parent()
        && !runtime.exists(parent)
    {
        runtime.create_dir_all(parent)?;
    }

    let part_path = part_path(path);
    runtime
        .write(&part_path, &data)
        .with_context(|| format!("Failed to write {:?}", part_path))?;
    runtime
        .rename(&part_path, path)
        .with_context(|| format!("Failed to move download into place at {:?}", path))?;

    debug!("Stored {} bytes at {:?}", data.len(), path);
    Ok(data.len() as u64)
}

fn part_path(path: &Path) -> std::path::PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    path.with_file_name(name)
}
