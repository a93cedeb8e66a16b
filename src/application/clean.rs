//! Clean action - finds cached archives the catalog no longer references.

use anyhow::Result;
use log::debug;

use crate::config::Config;
use crate::manifest::Manifest;
use crate::package::PackageStore;
use crate::runtime::Runtime;

/// Clean action
pub struct CleanAction<'a, R: Runtime> {
    store: PackageStore<'a, R>,
}

impl<'a, R: Runtime> CleanAction<'a, R> {
    pub fn new(runtime: &'a R, config: &Config) -> Self {
        Self {
            store: PackageStore::from_config(runtime, config),
        }
    }

    /// Cached `.zip` archives not named by any manifest entry, experimental
    /// entries included. Sorted.
    pub fn old_archives(&self, manifest: &Manifest) -> Result<Vec<String>> {
        let current = manifest.file_names()?;
        let old: Vec<String> = self
            .store
            .archives()?
            .into_iter()
            .filter(|name| !current.contains(name))
            .collect();
        debug!("{} old archives", old.len());
        Ok(old)
    }

    /// Delete the named archives from the cache. Returns how many were removed.
    pub fn remove(&self, names: &[String]) -> Result<usize> {
        for name in names {
            debug!("Removing archive {}", name);
            self.store.remove_archive(name)?;
        }
        Ok(names.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::tests::{manifest_xml, plugin_xml};
    use crate::runtime::{MockRuntime, RealRuntime};
    use mockall::predicate::eq;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::tempdir;

    #[test]
    fn test_old_archives_excludes_current_files() {
        let dir = tempdir().unwrap();
        let config = Config::new(dir.path().to_path_buf());
        fs::create_dir_all(&config.archive_dir).unwrap();
        for name in [
            "foo.2.1.zip",
            "foo.2.0.zip",
            "shiny.0.1.zip",
            "bar.1.0.zip",
            "notes.txt",
        ] {
            fs::write(config.archive_dir.join(name), b"x").unwrap();
        }

        let manifest = Manifest::from_string(manifest_xml(&[
            plugin_xml("foo", "2.1", false),
            plugin_xml("shiny", "0.1", true),
        ]));

        let action = CleanAction::new(&RealRuntime, &config);
        let old = action.old_archives(&manifest).unwrap();
        assert_eq!(old, vec!["bar.1.0.zip", "foo.2.0.zip"]);

        assert_eq!(action.remove(&old).unwrap(), 2);
        assert!(!config.archive_dir.join("foo.2.0.zip").exists());
        assert!(!config.archive_dir.join("bar.1.0.zip").exists());
        assert!(config.archive_dir.join("foo.2.1.zip").exists());
        assert!(config.archive_dir.join("shiny.0.1.zip").exists());
        assert!(config.archive_dir.join("notes.txt").exists());
    }

    #[test]
    fn test_no_archive_dir_means_nothing_to_clean() {
        let mut runtime = MockRuntime::new();
        runtime
            .expect_exists()
            .with(eq(PathBuf::from("/mirror/archives")))
            .returning(|_| false);

        let config = Config::new(PathBuf::from("/mirror"));
        let manifest = Manifest::from_string(manifest_xml(&[plugin_xml("foo", "2.1", false)]));

        let action = CleanAction::new(&runtime, &config);
        assert!(action.old_archives(&manifest).unwrap().is_empty());
    }
}
