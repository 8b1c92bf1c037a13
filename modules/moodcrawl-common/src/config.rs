use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::info;

use crate::error::MoodcrawlError;
use crate::lexicon;
use crate::types::{CrawlTask, KeywordTask, Language, LocaleProfile};

/// Which browser the crawler drives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowserBackend {
    Chrome {
        headless: bool,
        chrome_bin: Option<PathBuf>,
    },
    Browserless {
        ws_url: String,
    },
}

/// Every crawl constant, passed explicitly into the scheduler.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    // Quotas
    pub target_total: usize,
    pub per_keyword_limit: usize,
    pub shard_size: usize,

    // Pacing
    pub scroll_pause_min: Duration,
    pub scroll_pause_max: Duration,
    pub scroll_delta_min: i64,
    pub scroll_delta_max: i64,
    pub stagnation_rounds: u32,

    // Timeouts
    pub search_timeout: Duration,
    pub post_page_timeout: Duration,
    pub marker_timeout: Duration,

    // Target site
    pub site_base: String,
    pub post_link_selector: String,
    pub content_marker: String,

    // Browser
    pub backend: BrowserBackend,
    pub user_agent: String,
    pub viewport: (u32, u32),

    // Persistence
    pub output_dir: PathBuf,
    pub shard_prefix: String,
    pub identity_prefix: String,

    // Rotation
    pub keywords: Vec<KeywordTask>,
    pub locales: Vec<LocaleProfile>,
    pub seed: Option<u64>,
    pub max_rotations: Option<u32>,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            target_total: 15_000,
            per_keyword_limit: 120,
            shard_size: 1_000,
            scroll_pause_min: Duration::from_millis(1_200),
            scroll_pause_max: Duration::from_millis(2_500),
            scroll_delta_min: 2_200,
            scroll_delta_max: 3_000,
            stagnation_rounds: 3,
            search_timeout: Duration::from_secs(60),
            post_page_timeout: Duration::from_secs(20),
            marker_timeout: Duration::from_secs(8),
            site_base: "https://www.threads.net".to_string(),
            post_link_selector: r#"a[href*="/post/"]"#.to_string(),
            content_marker: "[data-pressable-container=true]".to_string(),
            backend: BrowserBackend::Chrome {
                headless: true,
                chrome_bin: None,
            },
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64)".to_string(),
            viewport: (1920, 1080),
            output_dir: PathBuf::from("data/file"),
            shard_prefix: "threads_autoscrape".to_string(),
            identity_prefix: "threads_".to_string(),
            keywords: lexicon::default_keywords(),
            locales: lexicon::default_locales(),
            seed: None,
            max_rotations: None,
        }
    }
}

impl CrawlConfig {
    /// Defaults overlaid with `MOODCRAWL_*` environment variables.
    pub fn from_env() -> Result<Self, MoodcrawlError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`CrawlConfig::from_env`] but reading from an arbitrary source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, MoodcrawlError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = parsed(&lookup, "MOODCRAWL_TARGET_TOTAL")? {
            config.target_total = v;
        }
        if let Some(v) = parsed(&lookup, "MOODCRAWL_PER_KEYWORD_LIMIT")? {
            config.per_keyword_limit = v;
        }
        if let Some(v) = parsed(&lookup, "MOODCRAWL_SHARD_SIZE")? {
            config.shard_size = v;
        }
        if let Some(ms) = parsed::<u64, _>(&lookup, "MOODCRAWL_SCROLL_PAUSE_MIN_MS")? {
            config.scroll_pause_min = Duration::from_millis(ms);
        }
        if let Some(ms) = parsed::<u64, _>(&lookup, "MOODCRAWL_SCROLL_PAUSE_MAX_MS")? {
            config.scroll_pause_max = Duration::from_millis(ms);
        }
        if let Some(ms) = parsed::<u64, _>(&lookup, "MOODCRAWL_POST_PAGE_TIMEOUT_MS")? {
            config.post_page_timeout = Duration::from_millis(ms);
        }
        if let Some(dir) = lookup("MOODCRAWL_OUTPUT_DIR") {
            config.output_dir = PathBuf::from(dir);
        }
        config.seed = parsed(&lookup, "MOODCRAWL_SEED")?;
        config.max_rotations = parsed(&lookup, "MOODCRAWL_MAX_ROTATIONS")?;

        if let Some(langs) = lookup("MOODCRAWL_LANGUAGES") {
            config = config.with_languages(&parse_languages(&langs)?);
        }
        if let Some(tags) = lookup("MOODCRAWL_LOCALES") {
            let tags: Vec<String> = split_list(&tags).map(String::from).collect();
            config = config.with_locale_tags(&tags)?;
        }

        config.backend = match lookup("BROWSERLESS_WS_URL").filter(|s| !s.is_empty()) {
            Some(ws_url) => BrowserBackend::Browserless { ws_url },
            None => BrowserBackend::Chrome {
                headless: !matches!(
                    lookup("MOODCRAWL_HEADFUL").as_deref(),
                    Some("1") | Some("true")
                ),
                chrome_bin: lookup("CHROME_BIN").map(PathBuf::from),
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Restrict the keyword set to the given languages.
    pub fn with_languages(mut self, languages: &[Language]) -> Self {
        self.keywords = lexicon::keywords_for(languages);
        self
    }

    /// Restrict the locale set to the given tags. Unknown tags are an error.
    pub fn with_locale_tags(mut self, tags: &[String]) -> Result<Self, MoodcrawlError> {
        let mut selected = Vec::new();
        for tag in tags {
            let locale = self
                .locales
                .iter()
                .find(|l| l.tag.eq_ignore_ascii_case(tag))
                .ok_or_else(|| MoodcrawlError::Config(format!("unknown locale: {tag}")))?;
            selected.push(locale.clone());
        }
        self.locales = selected;
        Ok(self)
    }

    /// Cross product of keywords × locales, keyword-major.
    pub fn tasks(&self) -> Vec<CrawlTask> {
        self.keywords
            .iter()
            .flat_map(|keyword| {
                self.locales.iter().map(move |locale| CrawlTask {
                    keyword: keyword.clone(),
                    locale: locale.clone(),
                })
            })
            .collect()
    }

    pub fn validate(&self) -> Result<(), MoodcrawlError> {
        let fail = |msg: &str| Err(MoodcrawlError::Config(msg.to_string()));
        if self.target_total == 0 {
            return fail("target_total must be positive");
        }
        if self.per_keyword_limit == 0 {
            return fail("per_keyword_limit must be positive");
        }
        if self.shard_size == 0 {
            return fail("shard_size must be positive");
        }
        if self.scroll_pause_min > self.scroll_pause_max {
            return fail("scroll pause min exceeds max");
        }
        if self.scroll_delta_min > self.scroll_delta_max {
            return fail("scroll delta min exceeds max");
        }
        if self.stagnation_rounds == 0 {
            return fail("stagnation_rounds must be at least 1");
        }
        if self.keywords.is_empty() {
            return fail("no keywords selected");
        }
        if self.locales.is_empty() {
            return fail("no locales selected");
        }
        Ok(())
    }

    pub fn log_summary(&self) {
        let backend = match &self.backend {
            BrowserBackend::Chrome { headless, .. } => {
                if *headless {
                    "chrome-headless"
                } else {
                    "chrome-headful"
                }
            }
            BrowserBackend::Browserless { .. } => "browserless",
        };
        info!(
            target_total = self.target_total,
            per_keyword_limit = self.per_keyword_limit,
            shard_size = self.shard_size,
            keywords = self.keywords.len(),
            locales = self.locales.len(),
            output_dir = %self.output_dir.display(),
            seed = ?self.seed,
            max_rotations = ?self.max_rotations,
            backend,
            "Crawl config loaded"
        );
    }
}

/// Parse a comma-separated list of language codes.
pub fn parse_languages(raw: &str) -> Result<Vec<Language>, MoodcrawlError> {
    split_list(raw)
        .map(|code| {
            Language::from_code(code)
                .ok_or_else(|| MoodcrawlError::Config(format!("unknown language: {code}")))
        })
        .collect()
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty())
}

fn parsed<T, F>(lookup: &F, key: &str) -> Result<Option<T>, MoodcrawlError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| MoodcrawlError::Config(format!("{key} is not a valid number: {raw}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_gives_defaults() {
        let config = CrawlConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.target_total, 15_000);
        assert_eq!(config.per_keyword_limit, 120);
        assert_eq!(config.shard_size, 1_000);
        assert_eq!(config.stagnation_rounds, 3);
        assert_eq!(config.tasks().len(), config.keywords.len() * 3);
        assert!(matches!(config.backend, BrowserBackend::Chrome { headless: true, .. }));
    }

    #[test]
    fn numeric_overrides_apply() {
        let config = CrawlConfig::from_lookup(lookup(&[
            ("MOODCRAWL_TARGET_TOTAL", "50"),
            ("MOODCRAWL_SHARD_SIZE", "10"),
            ("MOODCRAWL_SEED", "7"),
        ]))
        .unwrap();
        assert_eq!(config.target_total, 50);
        assert_eq!(config.shard_size, 10);
        assert_eq!(config.seed, Some(7));
    }

    #[test]
    fn bad_number_is_a_config_error() {
        let err = CrawlConfig::from_lookup(lookup(&[("MOODCRAWL_TARGET_TOTAL", "lots")]))
            .unwrap_err();
        assert!(matches!(err, MoodcrawlError::Config(_)));
    }

    #[test]
    fn language_and_locale_filters_narrow_the_task_list() {
        let config = CrawlConfig::from_lookup(lookup(&[
            ("MOODCRAWL_LANGUAGES", "en"),
            ("MOODCRAWL_LOCALES", "en-US"),
        ]))
        .unwrap();
        assert_eq!(config.locales.len(), 1);
        assert_eq!(config.tasks().len(), 42);
        assert!(config.tasks().iter().all(|t| t.locale.tag == "en-US"));
    }

    #[test]
    fn unknown_locale_is_rejected() {
        let err = CrawlConfig::from_lookup(lookup(&[("MOODCRAWL_LOCALES", "fr-FR")])).unwrap_err();
        assert!(err.to_string().contains("fr-FR"));
    }

    #[test]
    fn browserless_url_selects_remote_backend() {
        let config =
            CrawlConfig::from_lookup(lookup(&[("BROWSERLESS_WS_URL", "ws://localhost:3000")]))
                .unwrap();
        assert_eq!(
            config.backend,
            BrowserBackend::Browserless {
                ws_url: "ws://localhost:3000".to_string()
            }
        );
    }

    #[test]
    fn inverted_pause_bounds_fail_validation() {
        let err = CrawlConfig::from_lookup(lookup(&[
            ("MOODCRAWL_SCROLL_PAUSE_MIN_MS", "3000"),
            ("MOODCRAWL_SCROLL_PAUSE_MAX_MS", "1000"),
        ]))
        .unwrap_err();
        assert!(matches!(err, MoodcrawlError::Config(_)));
    }
}
