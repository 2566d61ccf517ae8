//! CLI entry point: argument parsing, config assembly, exit-code mapping.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use log::error;

use magnet_harvest::deep_storage::HttpDeepStorageClient;
use magnet_harvest::initialization::{build_fetcher, init_logger_with};
use magnet_harvest::proxy::ProxyModule;
use magnet_harvest::report::{dated_report_path, default_report_name};
use magnet_harvest::{
    run_pipeline, run_scrape, run_upload, Config, LogFormat, LogLevel, NoopCommit, PhaseMode,
    PipelineOptions, QbClient, ScrapeError, ScrapeOptions, UploadMode,
};

#[derive(Parser)]
#[command(name = "magnet_harvest", version, about = "Catalog scraper and torrent pipeline")]
struct Cli {
    /// Log level
    #[arg(long, value_enum, default_value = "info", global = true)]
    log_level: LogLevel,

    /// Log output format
    #[arg(long, value_enum, default_value = "plain", global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Crawl the catalog and write a run report
    Scrape(ScrapeArgs),
    /// Push a report's new magnets to the torrent client
    Upload(UploadArgs),
    /// Full run: scrape, upload, deep-storage bridge, status
    Pipeline(ScrapeArgs),
}

#[derive(Args, Clone)]
struct ScrapeArgs {
    /// First index page
    #[arg(long)]
    start_page: Option<u32>,

    /// Last index page
    #[arg(long)]
    end_page: Option<u32>,

    /// Keep paging until an empty page appears
    #[arg(long)]
    all: bool,

    /// Which phase(s) to run
    #[arg(long, value_enum, default_value = "all")]
    phase: PhaseMode,

    /// Custom starting URL (switches to ad-hoc mode)
    #[arg(long)]
    url: Option<String>,

    /// Reprocess entries regardless of history
    #[arg(long)]
    ignore_history: bool,

    /// Drop the released-today/yesterday gate
    #[arg(long)]
    ignore_release_date: bool,

    /// Route requests through the proxy pool
    #[arg(long)]
    use_proxy: bool,

    /// Route requests through the challenge-bypass service
    #[arg(long)]
    use_bypass: bool,

    /// Process everything but write nothing
    #[arg(long)]
    dry_run: bool,

    /// Report file name override
    #[arg(long)]
    output_file: Option<String>,
}

#[derive(Args)]
struct UploadArgs {
    /// Which report folder and client category to use
    #[arg(long, value_enum, default_value = "daily")]
    mode: UploadMode,

    /// Report to upload; defaults to today's report for the mode
    #[arg(long)]
    input_file: Option<PathBuf>,

    /// Route client traffic through the proxy pool (when the qbittorrent
    /// module is enabled for it)
    #[arg(long)]
    use_proxy: bool,

    /// Log what would be added without touching the client
    #[arg(long)]
    dry_run: bool,
}

/// The static proxy URL for a non-spider module, when the configuration
/// routes that module through the pool.
fn module_proxy_url(config: &Config, use_proxy: bool, module: ProxyModule) -> Option<String> {
    if !use_proxy || !module.enabled_in(&config.proxy.modules) {
        return None;
    }
    config
        .proxy
        .pool
        .first()
        .and_then(|p| p.effective_url().map(str::to_string))
}

/// Builds the run config: defaults, environment credentials, CLI overrides.
fn build_config(args: Option<&ScrapeArgs>) -> Config {
    let mut config = Config::with_defaults();

    // Credentials and endpoints come from the environment; everything else
    // is defaults plus flags.
    if let Ok(v) = std::env::var("HARVEST_BASE_URL") {
        config.scraper.base_url = v;
    }
    if let Ok(v) = std::env::var("HARVEST_SESSION_COOKIE") {
        config.session_cookie = Some(v);
    }
    if let Ok(v) = std::env::var("HARVEST_QB_HOST") {
        config.torrent_client.host = v;
    }
    if let Ok(v) = std::env::var("HARVEST_QB_PORT") {
        if let Ok(port) = v.parse() {
            config.torrent_client.port = port;
        }
    }
    if let Ok(v) = std::env::var("HARVEST_QB_USER") {
        config.torrent_client.user = v;
    }
    if let Ok(v) = std::env::var("HARVEST_QB_PASS") {
        config.torrent_client.pass = v;
    }
    if let Ok(v) = std::env::var("HARVEST_DS_EMAIL") {
        config.deep_storage.email = v;
    }
    if let Ok(v) = std::env::var("HARVEST_DS_PASS") {
        config.deep_storage.pass = v;
    }

    if let Some(args) = args {
        if let Some(start) = args.start_page {
            config.scraper.start_page = start;
        }
        if let Some(end) = args.end_page {
            config.scraper.end_page = end;
        }
        if args.all {
            config.scraper.all_mode = true;
        }
        if args.ignore_release_date {
            config.scraper.ignore_release_date = true;
        }
    }
    config
}

fn scrape_options(args: &ScrapeArgs) -> ScrapeOptions {
    ScrapeOptions {
        phase_mode: args.phase,
        custom_url: args.url.clone(),
        ignore_history: args.ignore_history,
        ignore_release_date: args.ignore_release_date,
        dry_run: args.dry_run,
        output_file: args.output_file.clone(),
    }
}

async fn cmd_scrape(args: ScrapeArgs) -> i32 {
    let config = build_config(Some(&args));
    let (fetcher, _pool, _ledger) = match build_fetcher(&config, args.use_proxy, args.use_bypass) {
        Ok(stack) => stack,
        Err(e) => {
            error!("Initialization failed: {e:#}");
            return 1;
        }
    };

    match run_scrape(&fetcher, &config, &scrape_options(&args)).await {
        Ok(report) => {
            if let Some(path) = &report.report_path {
                // Machine-readable line for wrapping orchestrators
                println!("HARVEST_OUTPUT_CSV={}", path.display());
            }
            0
        }
        Err(ScrapeError::ProxyBanOutage) => {
            error!("Proxy pool exhausted by bans");
            2
        }
        Err(e) => {
            error!("Scrape failed: {e}");
            1
        }
    }
}

async fn cmd_upload(args: UploadArgs) -> i32 {
    let config = build_config(None);
    let report_path = args.input_file.clone().unwrap_or_else(|| {
        let base = match args.mode {
            UploadMode::Daily => &config.reports.daily_dir,
            UploadMode::Adhoc => &config.reports.adhoc_dir,
        };
        dated_report_path(base, &default_report_name())
    });

    let qb_proxy = module_proxy_url(&config, args.use_proxy, ProxyModule::Qbittorrent);
    let client = match QbClient::new(&config.torrent_client, qb_proxy.as_deref()) {
        Ok(client) => client,
        Err(e) => {
            error!("Initialization failed: {e}");
            return 1;
        }
    };

    match run_upload(&client, &config, args.mode, &report_path, args.dry_run).await {
        Ok(summary) => {
            if summary.all_failed() {
                error!("All {} attempted adds failed", summary.attempted);
                1
            } else {
                0
            }
        }
        Err(e) => {
            error!("Upload failed: {e}");
            1
        }
    }
}

async fn cmd_pipeline(args: ScrapeArgs) -> i32 {
    let config = build_config(Some(&args));
    let (fetcher, pool, ledger) = match build_fetcher(&config, args.use_proxy, args.use_bypass) {
        Ok(stack) => stack,
        Err(e) => {
            error!("Initialization failed: {e:#}");
            return 1;
        }
    };
    let qb_proxy = module_proxy_url(&config, args.use_proxy, ProxyModule::Qbittorrent);
    let torrent_client = match QbClient::new(&config.torrent_client, qb_proxy.as_deref()) {
        Ok(client) => client,
        Err(e) => {
            error!("Initialization failed: {e}");
            return 1;
        }
    };
    let ds_proxy = module_proxy_url(&config, args.use_proxy, ProxyModule::Pikpak);
    let storage = match HttpDeepStorageClient::new(
        config.deep_storage.base_url.clone(),
        ds_proxy.as_deref(),
    ) {
        Ok(client) => client,
        Err(e) => {
            error!("Initialization failed: {e:#}");
            return 1;
        }
    };

    let upload_mode = if args.url.is_some() {
        UploadMode::Adhoc
    } else {
        UploadMode::Daily
    };
    let options = PipelineOptions {
        scrape: scrape_options(&args),
        upload_mode,
    };

    let status = run_pipeline(
        &fetcher,
        &torrent_client,
        &storage,
        pool.as_deref(),
        &ledger,
        &config,
        &options,
        &NoopCommit,
    )
    .await;

    // The notification transport is external; the formatted message goes to
    // stdout for it to pick up.
    println!("{}", status.subject());
    println!("{}", status.body(&ledger.summary()));
    status.outcome.exit_code()
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = init_logger_with(cli.log_level.into(), cli.log_format) {
        eprintln!("Failed to initialize logger: {e}");
        std::process::exit(1);
    }

    let code = match cli.command {
        Command::Scrape(args) => cmd_scrape(args).await,
        Command::Upload(args) => cmd_upload(args).await,
        Command::Pipeline(args) => cmd_pipeline(args).await,
    };
    std::process::exit(code);
}
