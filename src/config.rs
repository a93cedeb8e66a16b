use anyhow::{Context, Result};
use log::debug;
use std::path::PathBuf;
use std::time::Duration;

use crate::http::USER_AGENT;
use crate::runtime::Runtime;

pub const DEFAULT_CATALOG_URL: &str = "https://plugins.qgis.org/plugins/";
pub const DEFAULT_QGIS_VERSION: &str = "3.34";
pub const DEFAULT_DOWNLOAD_INTERVAL: Duration = Duration::from_secs(5);

const MIRROR_DIR_NAME: &str = "plugin-mirror";
const MANIFEST_FILE: &str = "plugins.xml";
const ARCHIVE_DIR: &str = "archives";
const PACKAGE_DIR: &str = "stable";

/// Settings shared by every phase of a mirror run.
///
/// Directory layout under `root`:
/// - `plugins.xml` - the last fetched catalog manifest
/// - `archives/` - downloaded package archives
/// - `stable/` - unpacked packages, one directory per slug
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub root: PathBuf,
    pub manifest_path: PathBuf,
    pub archive_dir: PathBuf,
    pub package_root: PathBuf,
    /// Base URL of the catalog, ending in `/`.
    pub catalog_url: String,
    /// Application version the catalog is filtered for.
    pub qgis_version: String,
    /// Pause before every archive download.
    pub download_interval: Duration,
    /// Directory holding `frame.html` and `record.html` overrides.
    pub template_dir: Option<PathBuf>,
    pub user_agent: String,
}

impl Config {
    pub fn new(root: PathBuf) -> Self {
        Self {
            manifest_path: root.join(MANIFEST_FILE),
            archive_dir: root.join(ARCHIVE_DIR),
            package_root: root.join(PACKAGE_DIR),
            root,
            catalog_url: DEFAULT_CATALOG_URL.to_string(),
            qgis_version: DEFAULT_QGIS_VERSION.to_string(),
            download_interval: DEFAULT_DOWNLOAD_INTERVAL,
            template_dir: None,
            user_agent: USER_AGENT.to_string(),
        }
    }

    /// Build a config rooted at `root`, or at the default mirror directory.
    #[tracing::instrument(skip(runtime))]
    pub fn resolve<R: Runtime>(runtime: &R, root: Option<PathBuf>) -> Result<Self> {
        let root = match root {
            Some(path) => path,
            None => default_root(runtime)?,
        };
        debug!("Using mirror root: {:?}", root);
        Ok(Self::new(root))
    }

    pub fn with_catalog_url(mut self, url: impl Into<String>) -> Self {
        let mut url = url.into();
        if !url.ends_with('/') {
            url.push('/');
        }
        self.catalog_url = url;
        self
    }

    pub fn with_qgis_version(mut self, version: impl Into<String>) -> Self {
        self.qgis_version = version.into();
        self
    }

    pub fn with_download_interval(mut self, interval: Duration) -> Self {
        self.download_interval = interval;
        self
    }

    pub fn with_template_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.template_dir = dir;
        self
    }

    /// URL of the catalog manifest for the configured application version.
    pub fn manifest_url(&self) -> String {
        format!(
            "{}{}?qgis={}",
            self.catalog_url, MANIFEST_FILE, self.qgis_version
        )
    }
}

/// `<data_dir>/plugin-mirror`, falling back to `~/.plugin-mirror`.
fn default_root<R: Runtime>(runtime: &R) -> Result<PathBuf> {
    if let Some(data_dir) = runtime.data_dir() {
        return Ok(data_dir.join(MIRROR_DIR_NAME));
    }
    let home_dir = runtime
        .home_dir()
        .context("Could not find a data or home directory")?;
    Ok(home_dir.join(format!(".{}", MIRROR_DIR_NAME)))
}
