use anyhow::Result;
use log::debug;
use std::path::PathBuf;

use crate::application::{
    CleanAction, DownloadAction, DownloadOptions, ReconcileAction, refresh_manifest,
};
use crate::archive::ZipExtractor;
use crate::config::Config;
use crate::download::Fetcher;
use crate::http::HttpClient;
use crate::interrupt::Interrupt;
use crate::runtime::Runtime;

use super::clean::run_clean;
use super::load_manifest;
use super::report::run_report;

#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Fetch a fresh manifest first.
    pub update_manifest: bool,
    /// Skip downloading and unpacking.
    pub skip_fetch: bool,
    /// Cap on archives downloaded this run.
    pub count: Option<usize>,
    /// Write the HTML summary here when set.
    pub out_dir: Option<PathBuf>,
    /// Offer to remove archives of old versions afterwards.
    pub clean: bool,
    /// Answer yes to the clean confirmation.
    pub yes: bool,
    pub include_experimental: bool,
    pub verbose: bool,
}

/// The full mirror run: refresh, download, reconcile, report, clean.
#[tracing::instrument(skip(runtime, config))]
pub async fn sync<R: Runtime + 'static>(
    runtime: R,
    config: &Config,
    options: SyncOptions,
) -> Result<()> {
    let client = HttpClient::with_user_agent(&config.user_agent)?;
    let interrupt = Interrupt::new();
    let ctrl_c = interrupt.listen_for_ctrl_c();

    let result = run(&runtime, &client, config, &options, &interrupt).await;

    ctrl_c.abort();
    result
}

pub(crate) async fn run<R: Runtime + 'static, F: Fetcher + ?Sized>(
    runtime: &R,
    fetcher: &F,
    config: &Config,
    options: &SyncOptions,
    interrupt: &Interrupt,
) -> Result<()> {
    if !runtime.exists(&config.root) {
        println!("Creating mirror directory {}", config.root.display());
        runtime.create_dir_all(&config.root)?;
    }

    if options.update_manifest {
        match refresh_manifest(runtime, fetcher, config, interrupt).await? {
            Some(size) => println!("Catalog manifest updated ({} bytes).", size),
            None => {
                println!("Interrupted.");
                return Ok(());
            }
        }
    }

    let manifest = load_manifest(runtime, config)?;
    let exclude_experimental = !options.include_experimental;

    if options.skip_fetch {
        debug!("Skipping download and unpack");
    } else {
        let download = DownloadAction::new(runtime, fetcher, config, interrupt.clone());
        let download_options = DownloadOptions {
            count: options.count,
            exclude_experimental,
        };
        let summary = download
            .run(&manifest, &download_options, |i, n, url| {
                println!("{}/{} Downloading {}...", i, n, url);
            })
            .await?;
        println!(
            "Total {} packages. {} archives already cached.",
            summary.total, summary.cached
        );
        println!("{}", summary);
        if summary.cancelled {
            return Ok(());
        }

        let extractor = ZipExtractor;
        // The download phase already fetched what this run may fetch.
        let reconcile =
            ReconcileAction::new(runtime, fetcher, &extractor, config, interrupt.clone())
                .cached_only();
        let summary = reconcile.run(&manifest, exclude_experimental).await?;
        if options.verbose {
            for outcome in &summary.outcomes {
                println!("{}", outcome);
            }
        }
        println!("{}", summary);
        if summary.cancelled {
            return Ok(());
        }
    }

    match &options.out_dir {
        Some(out_dir) => run_report(
            runtime,
            config,
            &manifest,
            out_dir,
            options.include_experimental,
            options.verbose,
        )?,
        None => println!("Output directory not specified. Generating summary skipped."),
    }

    if options.clean {
        let action = CleanAction::new(runtime, config);
        run_clean(runtime, &action, &manifest, options.yes)?;
    }

    Ok(())
}
