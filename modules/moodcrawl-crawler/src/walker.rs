//! Scroll-and-discover loop for one (keyword, locale) session.
//!
//! ```text
//! Searching ──nav error──▶ NavFailed
//!     │
//!     ▼
//! Discovering ◀──────────── Scrolling ──3 flat rounds──▶ Stagnant
//!     │                          ▲
//!     ▼                          │
//! Visiting ──quota reached──▶ QuotaMet
//! ```
//!
//! Links are visited in discovery order. A failed post visit counts as zero
//! yield for that link and never ends the session.

use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;

use anyhow::Result;
use moodcrawl_common::{CrawlConfig, CrawlTask, MoodcrawlError, PostRecord};
use tracing::{debug, info, warn};

use crate::extractor::extract_page;
use crate::identity::IdentityCache;
use crate::lang::LanguageDetector;
use crate::links::{absolutize, post_code, search_url};
use crate::normalizer::{normalize, PostContext};
use crate::shard::ShardWriter;
use crate::traits::{BrowsingContext, PageDriver, Pacer};

/// Terminal state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionOutcome {
    /// Per-keyword quota or global target reached.
    QuotaMet,
    /// Page height stopped growing.
    #[default]
    Stagnant,
    /// The search page could not be loaded.
    NavFailed,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SessionReport {
    pub outcome: SessionOutcome,
    pub accepted: u32,
    pub links_visited: u32,
    pub visit_failures: u32,
    pub discarded: u32,
    pub duplicates: u32,
    pub keyword_misses: u32,
    pub scroll_rounds: u32,
}

/// Run-wide accepted-record state shared by every session.
pub struct Harvest {
    pub cache: IdentityCache,
    pub writer: ShardWriter,
    pub accepted_total: usize,
    pub target_total: usize,
}

impl Harvest {
    pub fn new(cache: IdentityCache, writer: ShardWriter, target_total: usize) -> Self {
        Self {
            cache,
            writer,
            accepted_total: 0,
            target_total,
        }
    }

    pub fn target_met(&self) -> bool {
        self.accepted_total >= self.target_total
    }

    fn accept(&mut self, record: PostRecord) -> Result<Option<PathBuf>, MoodcrawlError> {
        self.cache.add(&record.id, &record.code);
        self.accepted_total += 1;
        self.writer.append(record)
    }
}

enum WalkState {
    Searching,
    Discovering,
    Visiting,
    Scrolling,
}

/// Page height tracking for stagnation detection.
#[derive(Debug, Default)]
struct ScrollState {
    last_height: i64,
    stagnant_rounds: u32,
}

impl ScrollState {
    /// Record a measurement; returns the current run of unchanged rounds.
    fn observe(&mut self, height: i64) -> u32 {
        if height == self.last_height {
            self.stagnant_rounds += 1;
        } else {
            self.stagnant_rounds = 0;
        }
        self.last_height = height;
        self.stagnant_rounds
    }
}

/// Per-session mutable state, discarded when the session ends.
#[derive(Default)]
struct Session {
    seen_codes: HashSet<String>,
    frontier: VecDeque<String>,
    scroll: ScrollState,
    accepted: usize,
}

pub struct FrontierWalker<'a> {
    config: &'a CrawlConfig,
    pacer: &'a dyn Pacer,
    detector: &'a dyn LanguageDetector,
}

impl<'a> FrontierWalker<'a> {
    pub fn new(
        config: &'a CrawlConfig,
        pacer: &'a dyn Pacer,
        detector: &'a dyn LanguageDetector,
    ) -> Self {
        Self {
            config,
            pacer,
            detector,
        }
    }

    /// Run one session inside `context`. Only persistence failures are errors;
    /// every other failure ends in a terminal [`SessionOutcome`].
    pub async fn run(
        &self,
        task: &CrawlTask,
        context: &dyn BrowsingContext,
        harvest: &mut Harvest,
    ) -> Result<SessionReport> {
        let mut report = SessionReport::default();
        let keyword = task.keyword.keyword.as_str();
        let locale = task.locale.tag.as_str();

        info!(
            emotion = %task.keyword.emotion,
            keyword,
            locale,
            "Session started"
        );

        let search_page = match context.open_page().await {
            Ok(page) => page,
            Err(e) => {
                warn!(keyword, locale, error = %e, "Could not open search page");
                report.outcome = SessionOutcome::NavFailed;
                return Ok(report);
            }
        };

        let walked = self
            .walk(task, context, search_page.as_ref(), harvest, &mut report)
            .await;

        if let Err(e) = search_page.close().await {
            debug!(keyword, error = %e, "Search page close failed");
        }
        report.outcome = walked?;

        info!(
            keyword,
            locale,
            outcome = ?report.outcome,
            accepted = report.accepted,
            links = report.links_visited,
            scrolls = report.scroll_rounds,
            total = harvest.accepted_total,
            "Session finished"
        );
        Ok(report)
    }

    async fn walk(
        &self,
        task: &CrawlTask,
        context: &dyn BrowsingContext,
        page: &dyn PageDriver,
        harvest: &mut Harvest,
        report: &mut SessionReport,
    ) -> Result<SessionOutcome> {
        let keyword = task.keyword.keyword.as_str();
        let mut session = Session::default();
        let mut state = WalkState::Searching;

        loop {
            state = match state {
                WalkState::Searching => {
                    let url = search_url(&self.config.site_base, keyword);
                    if let Err(e) = page.navigate(&url, self.config.search_timeout).await {
                        warn!(url, error = %e, "Search navigation failed");
                        return Ok(SessionOutcome::NavFailed);
                    }
                    WalkState::Discovering
                }

                WalkState::Discovering => {
                    let hrefs = match page.hrefs(&self.config.post_link_selector).await {
                        Ok(hrefs) => hrefs,
                        Err(e) => {
                            debug!(keyword, error = %e, "Link enumeration failed");
                            Vec::new()
                        }
                    };
                    let queued = self.enqueue_links(&hrefs, &mut session, &harvest.cache);
                    debug!(keyword, found = hrefs.len(), queued, "Links discovered");
                    WalkState::Visiting
                }

                WalkState::Visiting => {
                    while let Some(url) = session.frontier.pop_front() {
                        if self.quota_met(&session, harvest) {
                            break;
                        }
                        self.visit(task, context, &url, &mut session, harvest, report)
                            .await?;
                    }
                    if self.quota_met(&session, harvest) {
                        return Ok(SessionOutcome::QuotaMet);
                    }
                    WalkState::Scrolling
                }

                WalkState::Scrolling => {
                    report.scroll_rounds += 1;
                    if let Err(e) = page.scroll_by(self.pacer.scroll_delta()).await {
                        debug!(keyword, error = %e, "Scroll failed");
                    }
                    self.pacer.settle().await;

                    let height = match page.scroll_height().await {
                        Ok(h) => h,
                        Err(e) => {
                            debug!(keyword, error = %e, "Height measurement failed");
                            session.scroll.last_height
                        }
                    };
                    if session.scroll.observe(height) >= self.config.stagnation_rounds {
                        return Ok(SessionOutcome::Stagnant);
                    }
                    WalkState::Discovering
                }
            };
        }
    }

    /// Queue unseen post links in page order. Returns how many were queued.
    fn enqueue_links(&self, hrefs: &[String], session: &mut Session, cache: &IdentityCache) -> usize {
        let mut queued = 0;
        for href in hrefs {
            let Some(url) = absolutize(&self.config.site_base, href) else {
                continue;
            };
            let Some(code) = post_code(&url) else {
                continue;
            };
            if !session.seen_codes.insert(code.clone()) {
                continue;
            }
            if cache.knows_code(&code) {
                continue;
            }
            session.frontier.push_back(url);
            queued += 1;
        }
        queued
    }

    fn quota_met(&self, session: &Session, harvest: &Harvest) -> bool {
        session.accepted >= self.config.per_keyword_limit || harvest.target_met()
    }

    async fn visit(
        &self,
        task: &CrawlTask,
        context: &dyn BrowsingContext,
        url: &str,
        session: &mut Session,
        harvest: &mut Harvest,
        report: &mut SessionReport,
    ) -> Result<()> {
        report.links_visited += 1;

        let html = match self.load_post(context, url).await {
            Ok(html) => html,
            Err(e) => {
                report.visit_failures += 1;
                warn!(url, error = %e, "Post load failed");
                return Ok(());
            }
        };

        let page = extract_page(&html);
        if page.malformed_blocks > 0 {
            debug!(url, malformed = page.malformed_blocks, "Skipped malformed data blocks");
        }

        let keyword = task.keyword.keyword.as_str();
        let ctx = PostContext {
            keyword,
            emotion: task.keyword.emotion,
            locale: &task.locale.tag,
            site_base: &self.config.site_base,
            labels: &page.labels,
            detector: self.detector,
        };

        for raw in page.posts {
            if self.quota_met(session, harvest) {
                break;
            }
            let record = match normalize(raw, &ctx) {
                Ok(record) => record,
                Err(reason) => {
                    report.discarded += 1;
                    debug!(url, %reason, "Discarded candidate");
                    continue;
                }
            };
            if harvest.cache.contains(&record.id) {
                report.duplicates += 1;
                continue;
            }
            if !keyword_in_text(&record.text, keyword) {
                report.keyword_misses += 1;
                continue;
            }

            harvest.accept(record)?;
            session.accepted += 1;
            report.accepted += 1;
        }
        Ok(())
    }

    /// Open the post in its own page and return its markup once the content
    /// marker shows up. The page is always closed.
    async fn load_post(&self, context: &dyn BrowsingContext, url: &str) -> Result<String> {
        let page = context.open_page().await?;
        let loaded: Result<String> = async {
            page.navigate(url, self.config.post_page_timeout).await?;
            page.wait_for(&self.config.content_marker, self.config.marker_timeout)
                .await?;
            page.content().await
        }
        .await;

        if let Err(e) = page.close().await {
            debug!(url, error = %e, "Post page close failed");
        }
        loaded
    }
}

/// Case-insensitive substring match. Empty text or keyword never matches.
pub fn keyword_in_text(text: &str, keyword: &str) -> bool {
    if text.is_empty() || keyword.is_empty() {
        return false;
    }
    text.to_lowercase().contains(&keyword.to_lowercase())
}
