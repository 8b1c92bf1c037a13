// Test mocks for the crawl controller.
//
// - MockBrowser (BrowserEngine): scripted search pages and post pages
// - InstantPacer (Pacer): fixed scroll delta, no sleeping
//
// Plus fixture builders for Threads-like page markup, records and configs.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use moodcrawl_common::{
    CrawlConfig, Emotion, KeywordTask, Language, LocaleProfile, PostRecord,
};
use serde_json::{json, Value};

use crate::links::{post_url, search_url};
use crate::traits::{BrowserEngine, BrowsingContext, PageDriver, Pacer};

/// Site base used by every fixture.
pub const TEST_SITE: &str = "https://www.threads.net";

// ---------------------------------------------------------------------------
// Scripts
// ---------------------------------------------------------------------------

/// Behaviour of one search-results page.
///
/// Link batch `k` becomes visible after `k` scrolls (batch 0 on load).
/// `heights[k - 1]` is the page height after scroll `k`; past the end the
/// last height repeats.
#[derive(Debug, Clone, Default)]
pub struct SearchScript {
    heights: Vec<i64>,
    link_batches: Vec<Vec<String>>,
    fail_navigation: bool,
    broken_height: bool,
}

impl SearchScript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn heights(mut self, heights: impl IntoIterator<Item = i64>) -> Self {
        self.heights = heights.into_iter().collect();
        self
    }

    pub fn links<S: Into<String>>(mut self, batch: impl IntoIterator<Item = S>) -> Self {
        self.link_batches
            .push(batch.into_iter().map(Into::into).collect());
        self
    }

    pub fn failing() -> Self {
        Self {
            fail_navigation: true,
            ..Self::default()
        }
    }

    /// Every height measurement errors.
    pub fn broken_height(mut self) -> Self {
        self.broken_height = true;
        self
    }

    fn visible_links(&self, scrolls: usize) -> Vec<String> {
        self.link_batches
            .iter()
            .take(scrolls + 1)
            .flatten()
            .cloned()
            .collect()
    }

    fn height_after(&self, scrolls: usize) -> i64 {
        self.heights
            .get(scrolls.saturating_sub(1))
            .or(self.heights.last())
            .copied()
            .unwrap_or(0)
    }
}

/// Behaviour of one post page.
#[derive(Debug, Clone)]
pub enum PostScript {
    Html(String),
    NavError,
    NoMarker,
}

#[derive(Debug, Clone, Default)]
struct Routes {
    searches: HashMap<String, SearchScript>,
    posts: HashMap<String, PostScript>,
}

#[derive(Debug, Default)]
struct MockLog {
    contexts_opened: usize,
    contexts_closed: usize,
    pages_opened: usize,
    pages_closed: usize,
    context_locales: Vec<String>,
    post_visits: Vec<String>,
    scrolls: HashMap<String, usize>,
    failing_contexts: usize,
}

// ---------------------------------------------------------------------------
// MockBrowser
// ---------------------------------------------------------------------------

/// Scripted browser. Unscripted search pages render empty; unscripted post
/// URLs fail to navigate.
/// Builder pattern: `.on_search()`, `.on_post()`, `.on_post_page()`.
#[derive(Default)]
pub struct MockBrowser {
    routes: Arc<Routes>,
    log: Arc<Mutex<MockLog>>,
}

impl MockBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_search(mut self, keyword: &str, script: SearchScript) -> Self {
        Arc::make_mut(&mut self.routes)
            .searches
            .insert(search_url(TEST_SITE, keyword), script);
        self
    }

    /// Serve a post page built from `items` at the post's canonical URL.
    pub fn on_post(self, username: &str, code: &str, items: &[Value]) -> Self {
        self.on_post_page(username, code, PostScript::Html(post_page(items)))
    }

    pub fn on_post_page(mut self, username: &str, code: &str, script: PostScript) -> Self {
        Arc::make_mut(&mut self.routes)
            .posts
            .insert(post_url(TEST_SITE, username, code), script);
        self
    }

    /// The next `n` context openings fail.
    pub fn failing_contexts(self, n: usize) -> Self {
        self.log.lock().unwrap().failing_contexts = n;
        self
    }

    pub fn contexts_opened(&self) -> usize {
        self.log.lock().unwrap().contexts_opened
    }

    pub fn contexts_closed(&self) -> usize {
        self.log.lock().unwrap().contexts_closed
    }

    pub fn open_pages(&self) -> usize {
        let log = self.log.lock().unwrap();
        log.pages_opened - log.pages_closed
    }

    pub fn context_locales(&self) -> Vec<String> {
        self.log.lock().unwrap().context_locales.clone()
    }

    /// Post URLs navigated to, in order.
    pub fn post_visits(&self) -> Vec<String> {
        self.log.lock().unwrap().post_visits.clone()
    }

    /// Scrolls performed on a keyword's search page, across all sessions.
    pub fn scrolls(&self, keyword: &str) -> usize {
        self.log
            .lock()
            .unwrap()
            .scrolls
            .get(&search_url(TEST_SITE, keyword))
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl BrowserEngine for MockBrowser {
    async fn open_context(&self, locale: &LocaleProfile) -> Result<Box<dyn BrowsingContext>> {
        let mut log = self.log.lock().unwrap();
        if log.failing_contexts > 0 {
            log.failing_contexts -= 1;
            bail!("browser refused new context");
        }
        log.contexts_opened += 1;
        log.context_locales.push(locale.tag.clone());
        Ok(Box::new(MockContext {
            routes: self.routes.clone(),
            log: self.log.clone(),
        }))
    }
}

struct MockContext {
    routes: Arc<Routes>,
    log: Arc<Mutex<MockLog>>,
}

#[async_trait]
impl BrowsingContext for MockContext {
    async fn open_page(&self) -> Result<Box<dyn PageDriver>> {
        self.log.lock().unwrap().pages_opened += 1;
        Ok(Box::new(MockPage {
            routes: self.routes.clone(),
            log: self.log.clone(),
            current: Mutex::new(None),
        }))
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.log.lock().unwrap().contexts_closed += 1;
        Ok(())
    }
}

enum Loaded {
    Search {
        url: String,
        script: SearchScript,
        scrolls: usize,
    },
    Post(PostScript),
}

struct MockPage {
    routes: Arc<Routes>,
    log: Arc<Mutex<MockLog>>,
    current: Mutex<Option<Loaded>>,
}

#[async_trait]
impl PageDriver for MockPage {
    async fn navigate(&self, url: &str, _timeout: Duration) -> Result<()> {
        let loaded = if let Some(script) = self.routes.posts.get(url) {
            self.log.lock().unwrap().post_visits.push(url.to_string());
            if matches!(script, PostScript::NavError) {
                bail!("navigation timed out: {url}");
            }
            Loaded::Post(script.clone())
        } else if url.contains("/tag/") {
            let script = self.routes.searches.get(url).cloned().unwrap_or_default();
            if script.fail_navigation {
                bail!("navigation timed out: {url}");
            }
            Loaded::Search {
                url: url.to_string(),
                script,
                scrolls: 0,
            }
        } else {
            self.log.lock().unwrap().post_visits.push(url.to_string());
            bail!("no route for {url}");
        };
        *self.current.lock().unwrap() = Some(loaded);
        Ok(())
    }

    async fn content(&self) -> Result<String> {
        match &*self.current.lock().unwrap() {
            Some(Loaded::Post(PostScript::Html(html))) => Ok(html.clone()),
            _ => Ok("<html><body></body></html>".to_string()),
        }
    }

    async fn hrefs(&self, _selector: &str) -> Result<Vec<String>> {
        match &*self.current.lock().unwrap() {
            Some(Loaded::Search {
                script, scrolls, ..
            }) => Ok(script.visible_links(*scrolls)),
            _ => Ok(Vec::new()),
        }
    }

    async fn scroll_by(&self, _delta: i64) -> Result<()> {
        if let Some(Loaded::Search { url, scrolls, .. }) = &mut *self.current.lock().unwrap() {
            *scrolls += 1;
            *self
                .log
                .lock()
                .unwrap()
                .scrolls
                .entry(url.clone())
                .or_default() += 1;
        }
        Ok(())
    }

    async fn scroll_height(&self) -> Result<i64> {
        match &*self.current.lock().unwrap() {
            Some(Loaded::Search {
                script, scrolls, ..
            }) => {
                if script.broken_height {
                    bail!("evaluation failed");
                }
                Ok(script.height_after(*scrolls))
            }
            _ => Ok(0),
        }
    }

    async fn wait_for(&self, selector: &str, _timeout: Duration) -> Result<()> {
        match &*self.current.lock().unwrap() {
            Some(Loaded::Post(PostScript::NoMarker)) => bail!("timed out waiting for {selector}"),
            _ => Ok(()),
        }
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.log.lock().unwrap().pages_closed += 1;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// InstantPacer
// ---------------------------------------------------------------------------

/// Fixed scroll delta, settles immediately.
pub struct InstantPacer;

#[async_trait]
impl Pacer for InstantPacer {
    fn scroll_delta(&self) -> i64 {
        2_500
    }

    async fn settle(&self) {
        tokio::task::yield_now().await;
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// One `thread_items` entry as the site embeds it.
pub fn post_item(id: &str, code: &str, username: &str, text: &str) -> Value {
    json!({
        "post": {
            "id": id,
            "code": code,
            "taken_at": 1_700_000_000,
            "like_count": 1,
            "caption": { "text": text },
            "user": { "username": username },
            "video_versions": []
        },
        "view_replies_cta_string": "2 replies"
    })
}

/// Post page markup carrying `items` in one server payload block.
pub fn post_page(items: &[Value]) -> String {
    let payload = json!({
        "require": [["ScheduledServerJS", "handle", null, [{
            "__bbox": { "result": { "data": { "thread_items": items } } }
        }]]]
    });
    format!(
        r#"<html><body><div data-pressable-container="true"><span>0 reposts</span></div><script type="application/json" data-sjs>{payload}</script></body></html>"#
    )
}

/// Relative link as it appears on a search page.
pub fn post_href(username: &str, code: &str) -> String {
    format!("/@{username}/post/{code}")
}

pub fn record(id: &str) -> PostRecord {
    PostRecord {
        id: id.to_string(),
        text: format!("post {id}"),
        published_on: None,
        code: format!("C{id}"),
        username: "someone".to_string(),
        like_count: 0,
        reply_count: 0,
        image_count: 0,
        video_urls: Vec::new(),
        repost_count: 0,
        url: post_url(TEST_SITE, "someone", &format!("C{id}")),
        keyword: "post".to_string(),
        emotion: Emotion::Neutral,
        locale_context: "en-US".to_string(),
        lang_detect: "en".to_string(),
    }
}

/// Small deterministic config writing into `dir`, one English locale.
pub fn test_config(dir: &Path, keywords: &[(Emotion, &str)]) -> CrawlConfig {
    CrawlConfig {
        output_dir: dir.to_path_buf(),
        keywords: keywords
            .iter()
            .map(|(emotion, word)| KeywordTask::new(*emotion, *word, Language::En))
            .collect(),
        locales: vec![LocaleProfile::new("en-US", "en-US,en;q=0.9")],
        seed: Some(7),
        site_base: TEST_SITE.to_string(),
        ..CrawlConfig::default()
    }
}
