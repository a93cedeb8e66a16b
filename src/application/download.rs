//! Download action - fills the archive cache from the catalog manifest.
//!
//! Downloads are strictly sequential, each preceded by a fixed pause so the
//! catalog server is not hammered.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use log::{debug, info, warn};

use crate::config::Config;
use crate::download::{Fetcher, download_file};
use crate::interrupt::Interrupt;
use crate::manifest::Manifest;
use crate::package::PackageStore;
use crate::runtime::Runtime;

/// Wait `interval`, then download `url` to `path`.
///
/// `None` means the interrupt fired during the wait or the transfer; nothing
/// was written in that case.
pub(crate) async fn fetch_archive<R: Runtime, F: Fetcher + ?Sized>(
    runtime: &R,
    fetcher: &F,
    interrupt: &Interrupt,
    url: &str,
    path: &Path,
    interval: Duration,
) -> Result<Option<u64>> {
    if !interval.is_zero() {
        debug!("Waiting {:?} before the next request", interval);
    }
    if interrupt.guard(tokio::time::sleep(interval)).await.is_none() {
        return Ok(None);
    }

    match interrupt.guard(download_file(runtime, fetcher, url, path)).await {
        Some(result) => result.map(Some),
        None => Ok(None),
    }
}

#[derive(Debug, Clone)]
pub struct DownloadOptions {
    /// Maximum number of archives to fetch; `None` fetches all missing ones.
    pub count: Option<usize>,
    pub exclude_experimental: bool,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            count: None,
            exclude_experimental: true,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct DownloadSummary {
    /// Manifest entries considered.
    pub total: usize,
    /// Entries whose archive was already in the cache.
    pub cached: usize,
    /// Archives this run tried to fetch, after the count limit.
    pub attempted: usize,
    pub downloaded: usize,
    pub errors: usize,
    pub cancelled: bool,
}

impl fmt::Display for DownloadSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} files downloaded. {} errors.",
            self.downloaded, self.errors
        )?;
        if self.cancelled {
            write!(
                f,
                " Interrupted after {} of {} downloads.",
                self.downloaded + self.errors,
                self.attempted
            )?;
        }
        Ok(())
    }
}

/// Download action
pub struct DownloadAction<'a, R: Runtime, F: Fetcher + ?Sized> {
    runtime: &'a R,
    fetcher: &'a F,
    store: PackageStore<'a, R>,
    interval: Duration,
    interrupt: Interrupt,
}

impl<'a, R: Runtime, F: Fetcher + ?Sized> DownloadAction<'a, R, F> {
    pub fn new(runtime: &'a R, fetcher: &'a F, config: &Config, interrupt: Interrupt) -> Self {
        Self {
            runtime,
            fetcher,
            store: PackageStore::from_config(runtime, config),
            interval: config.download_interval,
            interrupt,
        }
    }

    /// Fetch every archive the manifest lists that is not cached yet.
    ///
    /// `on_start(i, n, url)` is called before each attempt, 1-based.
    #[tracing::instrument(skip(self, manifest, on_start))]
    pub async fn run(
        &self,
        manifest: &Manifest,
        options: &DownloadOptions,
        mut on_start: impl FnMut(usize, usize, &str),
    ) -> Result<DownloadSummary> {
        let mut summary = DownloadSummary::default();

        let mut missing = Vec::new();
        for record in manifest.packages(options.exclude_experimental)? {
            let record = record?;
            summary.total += 1;
            if self.store.has_archive(&record.file_name) {
                summary.cached += 1;
            } else {
                missing.push(record);
            }
        }
        info!(
            "Total {} packages. {} archives already cached.",
            summary.total, summary.cached
        );

        if let Some(count) = options.count {
            missing.truncate(count);
        }
        summary.attempted = missing.len();

        for (i, record) in missing.iter().enumerate() {
            on_start(i + 1, summary.attempted, &record.download_url);

            let path = self.store.archive_path(&record.file_name);
            match fetch_archive(
                self.runtime,
                self.fetcher,
                &self.interrupt,
                &record.download_url,
                &path,
                self.interval,
            )
            .await
            {
                Ok(Some(_)) => summary.downloaded += 1,
                Ok(None) => {
                    summary.cancelled = true;
                    break;
                }
                Err(e) => {
                    warn!("Failed to download {}: {:#}", record.download_url, e);
                    summary.errors += 1;
                }
            }
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::MockFetcher;
    use crate::manifest::tests::{manifest_xml, plugin_xml};
    use crate::runtime::RealRuntime;
    use std::fs;
    use std::sync::{Arc, Mutex};
    use tempfile::tempdir;

    fn test_config(root: &Path) -> Config {
        Config::new(root.to_path_buf()).with_download_interval(Duration::ZERO)
    }

    fn three_packages() -> Manifest {
        Manifest::from_string(manifest_xml(&[
            plugin_xml("alpha", "1.0", false),
            plugin_xml("beta", "2.0", false),
            plugin_xml("gamma", "3.0", false),
        ]))
    }

    #[tokio::test]
    async fn test_downloads_missing_archives() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());
        fs::create_dir_all(&config.archive_dir).unwrap();
        fs::write(config.archive_dir.join("beta.2.0.zip"), b"cached").unwrap();

        let mut fetcher = MockFetcher::new();
        fetcher
            .expect_fetch()
            .times(2)
            .returning(|url| Ok(url.as_bytes().to_vec()));

        let action = DownloadAction::new(&RealRuntime, &fetcher, &config, Interrupt::new());
        let mut started = Vec::new();
        let summary = action
            .run(&three_packages(), &DownloadOptions::default(), |i, n, _| {
                started.push((i, n))
            })
            .await
            .unwrap();

        assert_eq!(
            summary,
            DownloadSummary {
                total: 3,
                cached: 1,
                attempted: 2,
                downloaded: 2,
                errors: 0,
                cancelled: false,
            }
        );
        assert_eq!(started, vec![(1, 2), (2, 2)]);
        assert!(config.archive_dir.join("alpha.1.0.zip").exists());
        assert!(config.archive_dir.join("gamma.3.0.zip").exists());
        assert_eq!(
            fs::read(config.archive_dir.join("beta.2.0.zip")).unwrap(),
            b"cached"
        );
    }

    #[tokio::test]
    async fn test_count_limits_attempts() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());

        let mut fetcher = MockFetcher::new();
        fetcher
            .expect_fetch()
            .times(1)
            .returning(|_| Ok(b"zip".to_vec()));

        let action = DownloadAction::new(&RealRuntime, &fetcher, &config, Interrupt::new());
        let options = DownloadOptions {
            count: Some(1),
            ..Default::default()
        };
        let summary = action
            .run(&three_packages(), &options, |_, _, _| {})
            .await
            .unwrap();

        assert_eq!(summary.attempted, 1);
        assert_eq!(summary.downloaded, 1);
        assert!(config.archive_dir.join("alpha.1.0.zip").exists());
        assert!(!config.archive_dir.join("beta.2.0.zip").exists());
    }

    #[tokio::test]
    async fn test_failures_are_counted_and_skipped() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());

        let mut fetcher = MockFetcher::new();
        fetcher
            .expect_fetch()
            .withf(|url| url.contains("/beta/"))
            .returning(|_| Err(anyhow::anyhow!("HTTP 404")));
        fetcher
            .expect_fetch()
            .withf(|url| !url.contains("/beta/"))
            .returning(|_| Ok(b"zip".to_vec()));

        let action = DownloadAction::new(&RealRuntime, &fetcher, &config, Interrupt::new());
        let summary = action
            .run(&three_packages(), &DownloadOptions::default(), |_, _, _| {})
            .await
            .unwrap();

        assert_eq!(summary.downloaded, 2);
        assert_eq!(summary.errors, 1);
        assert!(!config.archive_dir.join("beta.2.0.zip").exists());
    }

    #[tokio::test]
    async fn test_interrupt_during_download_stops_before_the_next_one() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());
        let interrupt = Interrupt::new();

        let calls = Arc::new(Mutex::new(0));
        let seen = calls.clone();
        let trigger = interrupt.clone();
        let mut fetcher = MockFetcher::new();
        fetcher.expect_fetch().returning(move |_| {
            *seen.lock().unwrap() += 1;
            trigger.trigger();
            Ok(b"zip".to_vec())
        });

        let action = DownloadAction::new(&RealRuntime, &fetcher, &config, interrupt);
        let summary = action
            .run(&three_packages(), &DownloadOptions::default(), |_, _, _| {})
            .await
            .unwrap();

        // The transfer in flight completes; the next one never starts.
        assert_eq!(*calls.lock().unwrap(), 1);
        assert!(summary.cancelled);
        assert_eq!(summary.attempted, 3);
        assert_eq!(summary.downloaded, 1);
        assert!(config.archive_dir.join("alpha.1.0.zip").exists());
        assert!(!config.archive_dir.join("beta.2.0.zip").exists());
    }

    #[tokio::test]
    async fn test_experimental_entries_can_be_included() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());
        let manifest = Manifest::from_string(manifest_xml(&[
            plugin_xml("stable", "1.0", false),
            plugin_xml("shiny", "0.1", true),
        ]));

        let mut fetcher = MockFetcher::new();
        fetcher
            .expect_fetch()
            .times(2)
            .returning(|_| Ok(b"zip".to_vec()));

        let action = DownloadAction::new(&RealRuntime, &fetcher, &config, Interrupt::new());
        let options = DownloadOptions {
            count: None,
            exclude_experimental: false,
        };
        let summary = action.run(&manifest, &options, |_, _, _| {}).await.unwrap();
        assert_eq!(summary.total, 2);
        assert_eq!(summary.downloaded, 2);
    }

    #[test]
    fn test_summary_display() {
        let summary = DownloadSummary {
            total: 10,
            cached: 7,
            attempted: 3,
            downloaded: 1,
            errors: 1,
            cancelled: true,
        };
        assert_eq!(
            summary.to_string(),
            "1 files downloaded. 1 errors. Interrupted after 2 of 3 downloads."
        );
    }
}
