//! Local mirror layout: the archive cache and the unpacked package tree.

use anyhow::{Context, Result};
use log::debug;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::runtime::Runtime;

use super::{PackageMetadata, Version};

/// What is on disk for one package slug.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalPackageState {
    pub path: PathBuf,
    /// Normalized version from the package metadata; `None` when absent.
    pub installed: Option<Version>,
}

/// Access to the mirror's on-disk state.
///
/// Layout:
/// - `<archive_dir>/<file_name>` for downloaded archives
/// - `<package_root>/<slug>/` for unpacked packages
pub struct PackageStore<'a, R: Runtime> {
    runtime: &'a R,
    archive_dir: PathBuf,
    package_root: PathBuf,
}

impl<'a, R: Runtime> PackageStore<'a, R> {
    pub fn new(runtime: &'a R, archive_dir: PathBuf, package_root: PathBuf) -> Self {
        Self {
            runtime,
            archive_dir,
            package_root,
        }
    }

    pub fn from_config(runtime: &'a R, config: &Config) -> Self {
        Self::new(
            runtime,
            config.archive_dir.clone(),
            config.package_root.clone(),
        )
    }

    pub fn archive_dir(&self) -> &Path {
        &self.archive_dir
    }

    pub fn package_root(&self) -> &Path {
        &self.package_root
    }

    /// Returns: `<archive_dir>/<file_name>`
    pub fn archive_path(&self, file_name: &str) -> PathBuf {
        self.archive_dir.join(file_name)
    }

    pub fn has_archive(&self, file_name: &str) -> bool {
        self.runtime.exists(&self.archive_path(file_name))
    }

    /// Returns: `<package_root>/<slug>`
    pub fn package_dir(&self, slug: &str) -> PathBuf {
        self.package_root.join(slug)
    }

    pub fn is_unpacked(&self, slug: &str) -> bool {
        self.runtime.is_dir(&self.package_dir(slug))
    }

    /// Read the state of `slug` from disk.
    ///
    /// A present directory whose metadata cannot be read is an error: the
    /// package is treated as corrupt rather than silently re-installed.
    #[tracing::instrument(skip(self))]
    pub fn state(&self, slug: &str) -> Result<LocalPackageState> {
        let path = self.package_dir(slug);
        if !self.runtime.exists(&path) {
            return Ok(LocalPackageState {
                path,
                installed: None,
            });
        }

        let metadata = PackageMetadata::load(self.runtime, &path)
            .with_context(|| format!("Cannot determine installed version of {}", slug))?;
        let installed = Version::normalize(metadata.version());
        debug!("{} is installed at version {}", slug, installed);

        Ok(LocalPackageState {
            path,
            installed: Some(installed),
        })
    }

    /// Remove the unpacked directory of `slug` entirely.
    pub fn remove_package(&self, slug: &str) -> Result<()> {
        let path = self.package_dir(slug);
        if self.runtime.exists(&path) {
            debug!("Removing {:?}", path);
            self.runtime
                .remove_dir_all(&path)
                .with_context(|| format!("Failed to remove {:?}", path))?;
        }
        Ok(())
    }

    /// File names of all `.zip` archives in the cache, sorted.
    pub fn archives(&self) -> Result<Vec<String>> {
        if !self.runtime.exists(&self.archive_dir) {
            return Ok(Vec::new());
        }

        let mut names: Vec<String> = self
            .runtime
            .read_dir(&self.archive_dir)?
            .iter()
            .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .filter(|name| name.ends_with(".zip"))
            .collect();
        names.sort();
        Ok(names)
    }

    pub fn remove_archive(&self, file_name: &str) -> Result<()> {
        let path = self.archive_path(file_name);
        if self.runtime.exists(&path) {
            self.runtime.remove_file(&path)?;
        }
        Ok(())
    }
}
