//! Top-level crawl loop.
//!
//! Rotates over the shuffled keyword × locale task list, one isolated browser
//! context per task, until the global target is reached, a full rotation
//! yields nothing new, or the optional rotation cap is hit. Whatever is still
//! buffered is flushed on every exit path.

use anyhow::{Context, Result};
use moodcrawl_common::{CrawlConfig, CrawlTask};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{error, info, warn};

use crate::identity::IdentityCache;
use crate::lang::LanguageDetector;
use crate::shard::ShardWriter;
use crate::stats::RunStats;
use crate::traits::{BrowserEngine, Pacer};
use crate::walker::{FrontierWalker, Harvest};

pub struct Scheduler<'a> {
    config: &'a CrawlConfig,
    engine: &'a dyn BrowserEngine,
    pacer: &'a dyn Pacer,
    detector: &'a dyn LanguageDetector,
}

impl<'a> Scheduler<'a> {
    pub fn new(
        config: &'a CrawlConfig,
        engine: &'a dyn BrowserEngine,
        pacer: &'a dyn Pacer,
        detector: &'a dyn LanguageDetector,
    ) -> Self {
        Self {
            config,
            engine,
            pacer,
            detector,
        }
    }

    pub async fn run(&self) -> Result<RunStats> {
        let cache = IdentityCache::load(&self.config.output_dir, &self.config.identity_prefix)
            .context("Failed to load identity cache")?;
        info!(known = cache.len(), dir = %self.config.output_dir.display(), "Existing posts found");

        let writer = ShardWriter::resume(
            &self.config.output_dir,
            &self.config.shard_prefix,
            self.config.shard_size,
        )
        .context("Failed to open shard writer")?;

        let mut harvest = Harvest::new(cache, writer, self.config.target_total);
        let mut stats = RunStats::default();

        let result = self.run_inner(&mut harvest, &mut stats).await;

        // Always flush, even when the loop failed
        let flushed = harvest.writer.flush();
        stats.shards_written = harvest.writer.shards_written() as u32;

        match (result, flushed) {
            (Err(e), Err(flush_err)) => {
                error!(error = %flush_err, "Final flush failed");
                Err(e)
            }
            (Err(e), Ok(_)) => Err(e),
            (Ok(()), Err(flush_err)) => Err(flush_err).context("Final flush failed"),
            (Ok(()), Ok(_)) => {
                info!(
                    accepted = harvest.accepted_total,
                    shards = stats.shards_written,
                    "Crawl finished"
                );
                Ok(stats)
            }
        }
    }

    async fn run_inner(&self, harvest: &mut Harvest, stats: &mut RunStats) -> Result<()> {
        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let mut tasks = self.config.tasks();

        while !harvest.target_met() {
            if let Some(max) = self.config.max_rotations {
                if stats.rotations >= max {
                    info!(max_rotations = max, "Rotation cap reached");
                    break;
                }
            }
            stats.rotations += 1;
            tasks.shuffle(&mut rng);

            let before = harvest.accepted_total;
            for task in &tasks {
                if harvest.target_met() {
                    break;
                }
                self.run_task(task, harvest, stats).await?;
            }

            let progress = harvest.accepted_total - before;
            info!(
                rotation = stats.rotations,
                progress,
                total = harvest.accepted_total,
                target = harvest.target_total,
                "Rotation finished"
            );

            if progress == 0 {
                warn!("No progress this rotation, stopping");
                stats.halted_without_progress = true;
                break;
            }
        }
        Ok(())
    }

    /// One session in a fresh context. The context is closed whatever the outcome.
    async fn run_task(
        &self,
        task: &CrawlTask,
        harvest: &mut Harvest,
        stats: &mut RunStats,
    ) -> Result<()> {
        let context = match self.engine.open_context(&task.locale).await {
            Ok(context) => context,
            Err(e) => {
                warn!(
                    keyword = %task.keyword.keyword,
                    locale = %task.locale.tag,
                    error = %e,
                    "Could not open browser context, skipping task"
                );
                stats.context_failures += 1;
                return Ok(());
            }
        };

        let walker = FrontierWalker::new(self.config, self.pacer, self.detector);
        let result = walker.run(task, context.as_ref(), harvest).await;

        if let Err(e) = context.close().await {
            warn!(locale = %task.locale.tag, error = %e, "Browser context close failed");
        }

        let report = result?;
        stats.record_session(&report);
        Ok(())
    }
}
