//! Reconcile action - brings the unpacked package tree in line with the
//! catalog manifest.
//!
//! Per manifest entry:
//! - installed version equals the declared one: skipped, nothing touched
//! - otherwise the archive is made available in the cache (fetching it if
//!   needed), the old directory is removed, and the archive is unpacked
//!
//! In cached-only mode nothing is fetched: a package whose archive is not in
//! the cache is left as it is and reported as not downloaded.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{debug, info, warn};

use crate::archive::ArchiveExtractor;
use crate::config::Config;
use crate::download::Fetcher;
use crate::interrupt::Interrupt;
use crate::manifest::{Manifest, PackageRecord};
use crate::package::PackageStore;
use crate::runtime::Runtime;

use super::download::fetch_archive;

/// What reconciliation did with one package.
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    /// Installed version already matches the catalog.
    Skipped { slug: String },
    /// Package was not installed before.
    New { slug: String, version: String },
    /// Package was replaced; `old` is the normalized installed version.
    Updated {
        slug: String,
        old: String,
        new: String,
    },
    /// Out of date, but its archive is not cached and fetching is off.
    NotDownloaded { slug: String },
}

impl fmt::Display for ReconcileOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Skipped { slug } => write!(f, "{}: skipped", slug),
            Self::New { slug, version } => write!(f, "{}: {}", slug, version),
            Self::Updated { slug, old, new } => write!(f, "{}: {} -> {}", slug, old, new),
            Self::NotDownloaded { slug } => write!(f, "{}: not downloaded", slug),
        }
    }
}

/// Totals of one reconciliation run.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ReconcileSummary {
    pub total: usize,
    pub skipped: usize,
    pub updated: usize,
    /// Archives unpacked, new and updated packages together.
    pub unpacked: usize,
    /// Out-of-date packages left alone because their archive is not cached.
    pub not_downloaded: usize,
    pub errors: usize,
    pub cancelled: bool,
    pub outcomes: Vec<ReconcileOutcome>,
}

impl ReconcileSummary {
    fn record(&mut self, outcome: ReconcileOutcome) {
        match outcome {
            ReconcileOutcome::Skipped { .. } => self.skipped += 1,
            ReconcileOutcome::New { .. } => self.unpacked += 1,
            ReconcileOutcome::Updated { .. } => {
                self.unpacked += 1;
                self.updated += 1;
            }
            ReconcileOutcome::NotDownloaded { .. } => self.not_downloaded += 1,
        }
        self.outcomes.push(outcome);
    }

    pub fn new_packages(&self) -> impl Iterator<Item = &ReconcileOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, ReconcileOutcome::New { .. }))
    }

    pub fn updated_packages(&self) -> impl Iterator<Item = &ReconcileOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, ReconcileOutcome::Updated { .. }))
    }
}

impl fmt::Display for ReconcileSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Unpacked {} archives. {} packages updated. {} packages are already at the latest version. {} errors. Total {} packages.",
            self.unpacked, self.updated, self.skipped, self.errors, self.total
        )?;
        if self.not_downloaded > 0 {
            write!(
                f,
                "\n{} packages are not downloaded yet.",
                self.not_downloaded
            )?;
        }
        if self.cancelled {
            write!(f, "\nInterrupted before all packages were processed.")?;
        }

        let mut new = self.new_packages().peekable();
        if new.peek().is_some() {
            write!(f, "\n*** New packages ***")?;
            for outcome in new {
                write!(f, "\n{}", outcome)?;
            }
        }

        let mut updated = self.updated_packages().peekable();
        if updated.peek().is_some() {
            write!(f, "\n*** Updated packages ***")?;
            for outcome in updated {
                write!(f, "\n{}", outcome)?;
            }
        }
        Ok(())
    }
}

/// Reconcile action
pub struct ReconcileAction<'a, R: Runtime, F: Fetcher + ?Sized, E: ArchiveExtractor> {
    runtime: &'a R,
    fetcher: &'a F,
    extractor: &'a E,
    store: PackageStore<'a, R>,
    interval: Duration,
    interrupt: Interrupt,
    fetch_missing: bool,
}

impl<'a, R: Runtime + 'static, F: Fetcher + ?Sized, E: ArchiveExtractor> ReconcileAction<'a, R, F, E> {
    pub fn new(
        runtime: &'a R,
        fetcher: &'a F,
        extractor: &'a E,
        config: &Config,
        interrupt: Interrupt,
    ) -> Self {
        Self {
            runtime,
            fetcher,
            extractor,
            store: PackageStore::from_config(runtime, config),
            interval: config.download_interval,
            interrupt,
            fetch_missing: true,
        }
    }

    /// Only unpack archives already in the cache; never fetch.
    pub fn cached_only(mut self) -> Self {
        self.fetch_missing = false;
        self
    }

    /// Reconcile every manifest entry in document order.
    ///
    /// A malformed manifest aborts the run. Failures of a single package are
    /// logged and counted; the run moves on to the next one.
    #[tracing::instrument(skip(self, manifest))]
    pub async fn run(
        &self,
        manifest: &Manifest,
        exclude_experimental: bool,
    ) -> Result<ReconcileSummary> {
        let mut summary = ReconcileSummary::default();

        for record in manifest.packages(exclude_experimental)? {
            let record = record?;
            if self.interrupt.is_triggered() {
                summary.cancelled = true;
                break;
            }
            summary.total += 1;

            match self.reconcile(&record).await {
                Ok(Some(outcome)) => {
                    debug!("{}", outcome);
                    summary.record(outcome);
                }
                Ok(None) => {
                    summary.cancelled = true;
                    break;
                }
                Err(e) => {
                    warn!("Failed to reconcile {}: {:#}", record.slug, e);
                    summary.errors += 1;
                }
            }
        }

        info!(
            "Reconciled {} packages ({} unpacked, {} skipped, {} errors)",
            summary.total, summary.unpacked, summary.skipped, summary.errors
        );
        Ok(summary)
    }

    /// Reconcile one package. `None` means the run was interrupted while
    /// fetching; nothing was changed for this package.
    #[tracing::instrument(skip(self, record), fields(slug = %record.slug))]
    pub async fn reconcile(&self, record: &PackageRecord) -> Result<Option<ReconcileOutcome>> {
        let state = self.store.state(&record.slug)?;

        let outcome = match state.installed {
            Some(installed) if installed.matches(&record.version) => {
                return Ok(Some(ReconcileOutcome::Skipped {
                    slug: record.slug.clone(),
                }));
            }
            Some(installed) => ReconcileOutcome::Updated {
                slug: record.slug.clone(),
                old: installed.to_string(),
                new: record.version.clone(),
            },
            None => ReconcileOutcome::New {
                slug: record.slug.clone(),
                version: record.version.clone(),
            },
        };

        if !self.fetch_missing && !self.store.has_archive(&record.file_name) {
            debug!("{} is not cached, leaving {} as it is", record.file_name, record.slug);
            return Ok(Some(ReconcileOutcome::NotDownloaded {
                slug: record.slug.clone(),
            }));
        }

        let Some(archive) = self.ensure_archive(record).await? else {
            return Ok(None);
        };

        if matches!(outcome, ReconcileOutcome::Updated { .. }) {
            self.store.remove_package(&record.slug)?;
        }

        self.extractor
            .extract(self.runtime, &archive, self.store.package_root())
            .with_context(|| format!("Failed to unpack {}", record.file_name))?;

        Ok(Some(outcome))
    }

    /// Path of the cached archive for `record`, fetching it first when it is
    /// not cached yet.
    async fn ensure_archive(&self, record: &PackageRecord) -> Result<Option<PathBuf>> {
        let path = self.store.archive_path(&record.file_name);
        if self.store.has_archive(&record.file_name) {
            debug!("{} is cached", record.file_name);
            return Ok(Some(path));
        }

        let fetched = fetch_archive(
            self.runtime,
            self.fetcher,
            &self.interrupt,
            &record.download_url,
            &path,
            self.interval,
        )
        .await?;
        Ok(fetched.map(|_| path))
    }
}
