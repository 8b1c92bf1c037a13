pub mod error;

pub use error::{BrowserError, Result};

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::emulation::{
    SetDeviceMetricsOverrideParams, SetLocaleOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams, Headers, SetExtraHttpHeadersParams, SetUserAgentOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams, DisposeBrowserContextParams,
};
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Poll interval while waiting for a selector to appear.
const WAIT_POLL: Duration = Duration::from_millis(250);

/// How to start a local Chromium.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub headless: bool,
    pub chrome_bin: Option<PathBuf>,
    pub window: (u32, u32),
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            headless: true,
            chrome_bin: std::env::var("CHROME_BIN").ok().map(PathBuf::from),
            window: (1920, 1080),
        }
    }
}

/// Rendering profile applied to every page opened in a context.
#[derive(Debug, Clone)]
pub struct ContextProfile {
    pub locale: String,
    pub accept_language: String,
    pub user_agent: String,
    pub viewport: (u32, u32),
}

pub struct BrowserClient {
    browser: Arc<Browser>,
    handler: JoinHandle<()>,
}

impl BrowserClient {
    /// Launch a local Chromium process.
    pub async fn launch(options: &LaunchOptions) -> Result<Self> {
        let mut builder = BrowserConfig::builder()
            .window_size(options.window.0, options.window.1)
            .arg("--no-sandbox")
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage");
        if !options.headless {
            builder = builder.with_head();
        }
        if let Some(ref bin) = options.chrome_bin {
            builder = builder.chrome_executable(bin);
        }
        let config = builder.build().map_err(BrowserError::Launch)?;

        let (browser, handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        info!(headless = options.headless, "Chromium launched");
        Ok(Self::from_parts(browser, handler))
    }

    /// Attach to a remote DevTools endpoint, e.g. a Browserless websocket URL.
    pub async fn connect(ws_url: &str) -> Result<Self> {
        let (browser, handler) = Browser::connect(ws_url)
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        info!(ws_url, "Connected to remote browser");
        Ok(Self::from_parts(browser, handler))
    }

    fn from_parts(browser: Browser, mut handler: chromiumoxide::Handler) -> Self {
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "Browser handler event error");
                }
            }
        });

        Self {
            browser: Arc::new(browser),
            handler,
        }
    }

    /// Create an isolated context (separate cookies and storage) with a rendering profile.
    pub async fn new_context(&self, profile: ContextProfile) -> Result<BrowserContext> {
        let created = self
            .browser
            .execute(CreateBrowserContextParams::default())
            .await?;
        let id = created.result.browser_context_id.clone();

        debug!(locale = %profile.locale, "Browser context created");
        Ok(BrowserContext {
            browser: self.browser.clone(),
            id,
            profile,
        })
    }

    pub async fn close(self) -> Result<()> {
        match Arc::try_unwrap(self.browser) {
            Ok(mut browser) => {
                if let Err(e) = browser.close().await {
                    warn!(error = %e, "Browser close failed");
                }
            }
            Err(_) => warn!("Browser still referenced by open contexts; dropping handle"),
        }
        self.handler.abort();
        Ok(())
    }
}

pub struct BrowserContext {
    browser: Arc<Browser>,
    id: BrowserContextId,
    profile: ContextProfile,
}

impl BrowserContext {
    /// Open a blank page inside this context with the context's locale,
    /// headers, user agent and viewport applied.
    pub async fn new_page(&self) -> Result<BrowserPage> {
        let params = CreateTargetParams::builder()
            .url("about:blank")
            .browser_context_id(self.id.clone())
            .build()
            .map_err(BrowserError::Protocol)?;
        let page = self.browser.new_page(params).await?;

        page.execute(EnableParams::default()).await?;

        let mut user_agent = SetUserAgentOverrideParams::new(self.profile.user_agent.clone());
        user_agent.accept_language = Some(self.profile.accept_language.clone());
        page.execute(user_agent).await?;

        let headers = Headers::new(serde_json::json!({
            "Accept-Language": self.profile.accept_language,
        }));
        page.execute(SetExtraHttpHeadersParams::new(headers))
            .await?;

        let mut locale = SetLocaleOverrideParams::default();
        locale.locale = Some(self.profile.locale.clone());
        page.execute(locale).await?;

        let (width, height) = self.profile.viewport;
        page.execute(SetDeviceMetricsOverrideParams::new(
            i64::from(width),
            i64::from(height),
            1.0,
            false,
        ))
        .await?;

        Ok(BrowserPage { page })
    }

    /// Dispose the context and every page still open in it.
    pub async fn close(self) -> Result<()> {
        self.browser
            .execute(DisposeBrowserContextParams::new(self.id))
            .await?;
        debug!(locale = %self.profile.locale, "Browser context disposed");
        Ok(())
    }
}

pub struct BrowserPage {
    page: Page,
}

impl BrowserPage {
    /// Navigate and wait for the load event, bounded by `timeout`.
    pub async fn goto(&self, url: &str, timeout: Duration) -> Result<()> {
        match tokio::time::timeout(timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(BrowserError::Navigation {
                url: url.to_string(),
                message: e.to_string(),
            }),
            Err(_) => Err(BrowserError::Timeout {
                what: format!("navigation to {url}"),
                millis: timeout.as_millis(),
            }),
        }
    }

    /// Current serialized DOM.
    pub async fn content(&self) -> Result<String> {
        Ok(self.page.content().await?)
    }

    /// `href` attribute of every element matching `selector`, in document order.
    pub async fn hrefs(&self, selector: &str) -> Result<Vec<String>> {
        let selector = serde_json::to_string(selector)?;
        let script = format!(
            "Array.from(document.querySelectorAll({selector}))\
             .map(el => el.getAttribute('href'))\
             .filter(href => !!href)"
        );
        let hrefs = self
            .page
            .evaluate(script)
            .await?
            .into_value::<Vec<String>>()?;
        Ok(hrefs)
    }

    pub async fn scroll_by(&self, delta: i64) -> Result<()> {
        self.page
            .evaluate(format!("window.scrollBy(0, {delta})"))
            .await?;
        Ok(())
    }

    pub async fn scroll_height(&self) -> Result<i64> {
        let height = self
            .page
            .evaluate("document.body.scrollHeight")
            .await?
            .into_value::<i64>()?;
        Ok(height)
    }

    /// Poll until an element matching `selector` exists or `timeout` elapses.
    pub async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<()> {
        let started = Instant::now();
        loop {
            if self.page.find_element(selector).await.is_ok() {
                return Ok(());
            }
            if started.elapsed() >= timeout {
                return Err(BrowserError::Timeout {
                    what: format!("selector {selector}"),
                    millis: timeout.as_millis(),
                });
            }
            tokio::time::sleep(WAIT_POLL).await;
        }
    }

    pub async fn close(self) -> Result<()> {
        self.page.close().await?;
        Ok(())
    }
}
