//! 商品一覧スクレイパー CLI
//!
//! 実行方法:
//! ```text
//! listing-scraper -u https://www.ajio.com/men-backpacks/c/830201001 -p ajio_backpacks
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{ArgAction, Parser};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tower::Service;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use listing_scraper::browser::ChromiumLauncher;
use listing_scraper::{ScrapeRequest, ScraperConfig, ScraperError, ScraperService};

const DEFAULT_URL: &str = "https://www.ajio.com/men-backpacks/c/830201001";

#[derive(Debug, Parser)]
#[command(name = "listing-scraper", version, about = "無限スクロールの商品一覧を取得して保存する")]
struct Cli {
    /// 対象URL（複数指定可、URLごとに並行実行）
    #[arg(short, long = "url", default_value = DEFAULT_URL)]
    urls: Vec<String>,

    /// 出力ファイル名のプレフィックス
    #[arg(short, long)]
    prefix: Option<String>,

    /// 最大試行回数
    #[arg(short, long)]
    retries: Option<u32>,

    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// JSON設定ファイル
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// ブラウザを表示する
    #[arg(long)]
    headed: bool,

    #[arg(long)]
    no_screenshot: bool,

    /// -v で debug、-vv で trace
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();
}

fn load_config(cli: &Cli) -> Result<ScraperConfig, ScraperError> {
    let mut config = match &cli.config {
        Some(path) => ScraperConfig::from_json_file(path)?,
        None => ScraperConfig::new(),
    };

    if cli.headed {
        config = config.with_headless(false);
    }
    if cli.no_screenshot {
        config = config.with_screenshots(false);
    }
    if let Some(dir) = &cli.output_dir {
        config = config.with_output_dir(dir);
    }
    if let Some(prefix) = &cli.prefix {
        config = config.with_prefix(prefix);
    }
    if let Some(retries) = cli.retries {
        config = config.with_max_attempts(retries);
    }

    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match load_config(&cli) {
        Ok(config) => Arc::new(config),
        Err(e) => {
            error!("Invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, closing browsers...");
                cancel.cancel();
            }
        });
    }

    let service = ScraperService::new(config.clone(), ChromiumLauncher::new(config.browser.clone()));

    let mut tasks = JoinSet::new();
    for url in cli.urls {
        let mut service = service.clone();
        let request = ScrapeRequest::new(url).with_cancel(cancel.child_token());
        tasks.spawn(async move { service.call(request).await });
    }

    let mut all_succeeded = true;
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(summary)) if summary.succeeded => {
                info!(
                    "{}: {} records after {} attempt(s) -> {:?}",
                    summary.url,
                    summary.records.len(),
                    summary.attempt_count,
                    summary.outputs
                );
            }
            Ok(Ok(summary)) => {
                error!(
                    "{}: scraping failed after {} attempt(s)",
                    summary.url, summary.attempt_count
                );
                all_succeeded = false;
            }
            Ok(Err(e)) => {
                error!("Scraping aborted: {}", e);
                all_succeeded = false;
            }
            Err(e) => {
                error!("Scraping task panicked: {}", e);
                all_succeeded = false;
            }
        }
    }

    if all_succeeded && !cancel.is_cancelled() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
