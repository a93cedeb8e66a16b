use anyhow::Result;
use clap::Parser;
use plugin_mirror::commands::{self, SyncOptions};
use plugin_mirror::config::{Config, DEFAULT_CATALOG_URL, DEFAULT_QGIS_VERSION};
use plugin_mirror::runtime::RealRuntime;
use std::path::PathBuf;
use std::time::Duration;

/// plugin-mirror - QGIS plugin repository mirror
///
/// Fetch the plugin catalog, download and unpack every listed plugin, and
/// write an HTML summary of their dependencies.
///
/// Examples:
///   plugin-mirror sync -u -o /srv/www/plugins     # Full run
///   plugin-mirror sync -s -o /srv/www/plugins     # Report only, no downloads
#[derive(Parser, Debug)]
#[command(author, version = env!("PLUGIN_MIRROR_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Mirror root directory (also via PLUGIN_MIRROR_ROOT)
    #[arg(
        long = "root",
        short = 'r',
        env = "PLUGIN_MIRROR_ROOT",
        value_name = "PATH",
        global = true
    )]
    pub root: Option<PathBuf>,

    /// Catalog base URL
    #[arg(
        long = "catalog-url",
        env = "PLUGIN_MIRROR_CATALOG_URL",
        value_name = "URL",
        default_value = DEFAULT_CATALOG_URL,
        global = true
    )]
    pub catalog_url: String,

    /// QGIS version the catalog is filtered for
    #[arg(
        long = "qgis-version",
        value_name = "VERSION",
        default_value = DEFAULT_QGIS_VERSION,
        global = true
    )]
    pub qgis_version: String,

    /// Directory with frame.html / record.html overriding the built-in templates
    #[arg(long = "templates", value_name = "DIR", global = true)]
    pub templates: Option<PathBuf>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Refresh, download, unpack, and optionally report and clean
    Sync(SyncArgs),

    /// Write the HTML summary of the unpacked plugins
    Report(ReportArgs),

    /// Remove archives of versions no longer in the catalog
    Clean(CleanArgs),
}

#[derive(clap::Args, Debug)]
pub struct SyncArgs {
    /// Fetch plugins.xml from the catalog first
    #[arg(short = 'u', long = "update-xml")]
    pub update_xml: bool,

    /// Skip downloading and unpacking plugins
    #[arg(short = 's', long = "no-fetch")]
    pub no_fetch: bool,

    /// Maximum number of plugins to download
    #[arg(short = 'n', long = "count", value_name = "COUNT")]
    pub count: Option<usize>,

    /// Seconds to wait before each download
    #[arg(short = 'i', long = "interval", value_name = "SECS", default_value_t = 5)]
    pub interval: u64,

    /// Write the HTML summary to this directory
    #[arg(short = 'o', long = "out-dir", value_name = "DIR")]
    pub out_dir: Option<PathBuf>,

    /// Remove archives of old versions afterwards
    #[arg(long = "clean")]
    pub clean: bool,

    /// Do not ask before removing archives
    #[arg(short = 'y', long = "yes")]
    pub yes: bool,

    /// Include experimental plugins
    #[arg(long = "experimental")]
    pub experimental: bool,

    /// Print per-plugin progress and syntax errors
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

#[derive(clap::Args, Debug)]
pub struct ReportArgs {
    /// Output directory for index.html
    #[arg(short = 'o', long = "out-dir", value_name = "DIR")]
    pub out_dir: PathBuf,

    /// Include experimental plugins
    #[arg(long = "experimental")]
    pub experimental: bool,

    /// Print syntax errors as they are found
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

#[derive(clap::Args, Debug)]
pub struct CleanArgs {
    /// Do not ask for confirmation
    #[arg(short = 'y', long = "yes")]
    pub yes: bool,
}

impl Cli {
    fn verbose(&self) -> bool {
        match &self.command {
            Commands::Sync(args) => args.verbose,
            Commands::Report(args) => args.verbose,
            Commands::Clean(_) => false,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let default_filter = if cli.verbose() { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let runtime = RealRuntime;
    let config = Config::resolve(&runtime, cli.root.clone())?
        .with_catalog_url(cli.catalog_url.as_str())
        .with_qgis_version(cli.qgis_version.as_str())
        .with_template_dir(cli.templates.clone());

    match cli.command {
        Commands::Sync(args) => {
            let config = config.with_download_interval(Duration::from_secs(args.interval));
            let options = SyncOptions {
                update_manifest: args.update_xml,
                skip_fetch: args.no_fetch,
                count: args.count,
                out_dir: args.out_dir,
                clean: args.clean,
                yes: args.yes,
                include_experimental: args.experimental,
                verbose: args.verbose,
            };
            commands::sync(runtime, &config, options).await?
        }
        Commands::Report(args) => commands::report(
            runtime,
            &config,
            &args.out_dir,
            args.experimental,
            args.verbose,
        )?,
        Commands::Clean(args) => commands::clean(runtime, &config, args.yes)?,
    }
    Ok(())
}
