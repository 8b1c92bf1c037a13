use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use moodcrawl_common::config::parse_languages;
use moodcrawl_common::{BrowserBackend, CrawlConfig};
use moodcrawl_crawler::browser::ChromeEngine;
use moodcrawl_crawler::lang::WhatlangDetector;
use moodcrawl_crawler::traits::JitterPacer;
use moodcrawl_crawler::Scheduler;

#[derive(Parser)]
#[command(name = "moodcrawl", about = "Collect emotion-keyword posts from Threads into CSV shards")]
#[command(version)]
struct Cli {
    /// Stop once this many new posts are collected
    #[arg(long)]
    target: Option<usize>,

    /// Maximum posts accepted per keyword/locale session
    #[arg(long)]
    per_keyword: Option<usize>,

    /// Records per shard file
    #[arg(long)]
    shard_size: Option<usize>,

    /// Output directory for shard files
    #[arg(long)]
    out: Option<PathBuf>,

    /// Seed for a reproducible task order
    #[arg(long)]
    seed: Option<u64>,

    /// Comma-separated keyword languages (ru,kk,en)
    #[arg(long)]
    languages: Option<String>,

    /// Comma-separated locale tags (ru-RU,kk-KZ,en-US)
    #[arg(long)]
    locales: Option<String>,

    /// Connect to a remote Browserless endpoint instead of launching Chromium
    #[arg(long)]
    browserless_url: Option<String>,

    /// Show the browser window
    #[arg(long)]
    headful: bool,
}

impl Cli {
    fn apply(self, mut config: CrawlConfig) -> Result<CrawlConfig> {
        if let Some(v) = self.target {
            config.target_total = v;
        }
        if let Some(v) = self.per_keyword {
            config.per_keyword_limit = v;
        }
        if let Some(v) = self.shard_size {
            config.shard_size = v;
        }
        if let Some(dir) = self.out {
            config.output_dir = dir;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        if let Some(langs) = self.languages {
            config = config.with_languages(&parse_languages(&langs)?);
        }
        if let Some(tags) = self.locales {
            let tags: Vec<String> = tags
                .split(',')
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect();
            config = config.with_locale_tags(&tags)?;
        }
        if let Some(ws_url) = self.browserless_url {
            config.backend = BrowserBackend::Browserless { ws_url };
        } else if self.headful {
            if let BrowserBackend::Chrome { headless, .. } = &mut config.backend {
                *headless = false;
            }
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("moodcrawl=info".parse()?)
                .add_directive("browser_client=info".parse()?),
        )
        .init();

    info!("moodcrawl starting...");

    let cli = Cli::parse();
    let config = cli.apply(CrawlConfig::from_env()?)?;
    config.log_summary();

    let engine = ChromeEngine::start(&config).await?;
    let pacer = JitterPacer::new(
        (config.scroll_pause_min, config.scroll_pause_max),
        (config.scroll_delta_min, config.scroll_delta_max),
        config.seed,
    );
    let detector = WhatlangDetector;

    let result = Scheduler::new(&config, &engine, &pacer, &detector).run().await;

    if let Err(e) = engine.shutdown().await {
        tracing::warn!(error = %e, "Browser shutdown failed");
    }

    let stats = result?;
    info!("{stats}");
    Ok(())
}
