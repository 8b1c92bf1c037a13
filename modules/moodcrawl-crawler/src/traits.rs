// Trait abstractions for the crawl controller's dependencies.
//
// BrowserEngine / BrowsingContext / PageDriver put the headless browser
// behind three small traits; Pacer owns every randomized delay. Together
// they let the walker and scheduler run against MockBrowser and
// InstantPacer with no browser and no real sleeping.

use std::sync::Mutex;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use moodcrawl_common::LocaleProfile;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

// ---------------------------------------------------------------------------
// Browser seams
// ---------------------------------------------------------------------------

#[async_trait]
pub trait BrowserEngine: Send + Sync {
    /// Open an isolated context (own cookies and storage) rendering in `locale`.
    async fn open_context(&self, locale: &LocaleProfile) -> Result<Box<dyn BrowsingContext>>;
}

#[async_trait]
pub trait BrowsingContext: Send + Sync {
    async fn open_page(&self) -> Result<Box<dyn PageDriver>>;

    /// Release the context and every page still open in it.
    async fn close(self: Box<Self>) -> Result<()>;
}

#[async_trait]
pub trait PageDriver: Send + Sync {
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<()>;

    async fn content(&self) -> Result<String>;

    /// Raw `href` attributes of every element matching `selector`, in document order.
    async fn hrefs(&self, selector: &str) -> Result<Vec<String>>;

    async fn scroll_by(&self, delta: i64) -> Result<()>;

    async fn scroll_height(&self) -> Result<i64>;

    async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<()>;

    async fn close(self: Box<Self>) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Pacer
// ---------------------------------------------------------------------------

#[async_trait]
pub trait Pacer: Send + Sync {
    /// Pixel distance for the next scroll.
    fn scroll_delta(&self) -> i64;

    /// Wait for the page to render after a scroll.
    async fn settle(&self);
}

/// Uniformly jittered scroll distances and pauses within fixed bounds.
pub struct JitterPacer {
    pause: (Duration, Duration),
    delta: (i64, i64),
    rng: Mutex<StdRng>,
}

impl JitterPacer {
    pub fn new(pause: (Duration, Duration), delta: (i64, i64), seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            pause,
            delta,
            rng: Mutex::new(rng),
        }
    }

    fn next_pause(&self) -> Duration {
        let (min, max) = self.pause;
        let millis = self
            .rng
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .random_range(min.as_millis() as u64..=max.as_millis() as u64);
        Duration::from_millis(millis)
    }
}

#[async_trait]
impl Pacer for JitterPacer {
    fn scroll_delta(&self) -> i64 {
        let (min, max) = self.delta;
        self.rng
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .random_range(min..=max)
    }

    async fn settle(&self) {
        let pause = self.next_pause();
        tokio::time::sleep(pause).await;
    }
}
