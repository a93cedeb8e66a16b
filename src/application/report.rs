//! Report action - analyzes every unpacked package and writes the HTML
//! summary page.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use log::{debug, info};
use serde::Serialize;

use crate::analysis::{AnalysisSummary, PackageAnalyzer};
use crate::config::Config;
use crate::manifest::{Manifest, PackageRecord};
use crate::package::PackageStore;
use crate::report::ReportTemplates;
use crate::report::format::{one_decimal, thousands};
use crate::runtime::Runtime;

pub const REPORT_FILE: &str = "index.html";

/// A progress callback fires once per this many analyzed packages.
pub const PROGRESS_EVERY: usize = 100;

/// Everything the record template can refer to.
#[derive(Debug, Clone, Serialize)]
pub struct ReportRecord {
    pub dirname: String,
    pub name: String,
    pub version: String,
    /// `YYYY-MM-DD`
    pub create_date: String,
    /// `YYYY-MM-DD HH:MM:SS`
    pub update_date: String,
    /// With thousands separators.
    pub downloads: String,
    pub downloads_sort: u64,
    /// One decimal.
    pub average_vote: String,
    pub rating_votes: u64,
    /// `(Trusted)` or empty.
    pub trusted: String,
    pub author_name: String,
    pub description: String,
    pub about: String,
    pub tags: String,
    pub repository: String,
    #[serde(flatten)]
    pub analysis: AnalysisSummary,
}

impl ReportRecord {
    pub fn new(record: &PackageRecord, analysis: AnalysisSummary) -> Self {
        Self {
            dirname: record.slug.clone(),
            name: record.name.clone(),
            version: record.version.clone(),
            create_date: record
                .created
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
            update_date: record
                .updated
                .map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_default(),
            downloads: thousands(record.downloads),
            downloads_sort: record.downloads,
            average_vote: one_decimal(record.average_vote),
            rating_votes: record.rating_votes,
            trusted: if record.trusted {
                "(Trusted)".to_string()
            } else {
                String::new()
            },
            author_name: record.author_name.clone(),
            description: record.description.clone(),
            about: record.about.clone(),
            tags: record.tags.clone(),
            repository: record.repository.clone(),
            analysis,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportStats {
    /// Packages in the report.
    pub total: usize,
    /// Files that failed to parse, across all packages.
    pub syntax_errors: usize,
    /// Time spent analyzing.
    pub elapsed: Duration,
    pub output: PathBuf,
}

impl fmt::Display for ReportStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Analysis completed in {:.1} secs",
            self.elapsed.as_secs_f64()
        )?;
        writeln!(
            f,
            "Total: {}, SyntaxErrors: {}",
            self.total, self.syntax_errors
        )?;
        write!(f, "Summary has been written to {}.", self.output.display())
    }
}

/// Report action
pub struct ReportAction<'a, R: Runtime> {
    runtime: &'a R,
    store: PackageStore<'a, R>,
    templates: ReportTemplates,
}

impl<'a, R: Runtime> ReportAction<'a, R> {
    /// Uses the templates from `config.template_dir`, or the built-in ones.
    pub fn new(runtime: &'a R, config: &Config) -> Result<Self> {
        let templates = ReportTemplates::load(runtime, config.template_dir.as_deref())?;
        Ok(Self::with_templates(runtime, config, templates))
    }

    pub fn with_templates(runtime: &'a R, config: &Config, templates: ReportTemplates) -> Self {
        Self {
            runtime,
            store: PackageStore::from_config(runtime, config),
            templates,
        }
    }

    /// Analyze the unpacked package of every manifest entry and write
    /// `<out_dir>/index.html`, newest update first.
    ///
    /// Entries without an unpacked directory are left out.
    /// `on_progress(i)` fires for the 1st, 101st, ... analyzed package.
    #[tracing::instrument(skip(self, manifest, on_progress))]
    pub fn run(
        &self,
        manifest: &Manifest,
        out_dir: &Path,
        exclude_experimental: bool,
        verbose: bool,
        mut on_progress: impl FnMut(usize),
    ) -> Result<ReportStats> {
        let mut packages = Vec::new();
        for record in manifest.packages(exclude_experimental)? {
            let record = record?;
            if self.store.is_unpacked(&record.slug) {
                packages.push(record);
            } else {
                debug!("{} is not unpacked, leaving it out", record.slug);
            }
        }
        info!("Analyzing {} packages", packages.len());

        let mut analyzer = PackageAnalyzer::new(self.runtime);
        let mut syntax_errors = 0;
        let started = Instant::now();

        let mut rows = Vec::with_capacity(packages.len());
        for (i, record) in packages.iter().enumerate() {
            analyzer.clear();
            analyzer.analyze(&self.store.package_dir(&record.slug), verbose);
            syntax_errors += analyzer.errors().len();
            rows.push(ReportRecord::new(record, analyzer.results()));

            if i % PROGRESS_EVERY == 0 {
                on_progress(i);
            }
        }
        let elapsed = started.elapsed();

        // Stable: equal dates keep manifest order.
        rows.sort_by(|a, b| b.update_date.cmp(&a.update_date));

        let rendered = rows
            .iter()
            .map(|row| {
                self.templates
                    .render_record(row)
                    .with_context(|| format!("Failed to render {}", row.dirname))
            })
            .collect::<Result<Vec<_>>>()?;
        let page = self.templates.render_page(&rendered);

        if !self.runtime.exists(out_dir) {
            self.runtime.create_dir_all(out_dir)?;
        }
        let output = out_dir.join(REPORT_FILE);
        self.runtime
            .write(&output, page.as_bytes())
            .with_context(|| format!("Failed to write report to {:?}", output))?;

        Ok(ReportStats {
            total: rows.len(),
            syntax_errors,
            elapsed,
            output,
        })
    }
}
