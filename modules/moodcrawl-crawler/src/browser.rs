// Chromium-backed implementations of the crawl browser traits.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use browser_client::{BrowserClient, BrowserContext, BrowserPage, ContextProfile, LaunchOptions};
use moodcrawl_common::{BrowserBackend, CrawlConfig, LocaleProfile};

use crate::traits::{BrowserEngine, BrowsingContext, PageDriver};

pub struct ChromeEngine {
    client: BrowserClient,
    user_agent: String,
    viewport: (u32, u32),
}

impl ChromeEngine {
    /// Launch or connect according to the configured backend.
    pub async fn start(config: &CrawlConfig) -> Result<Self> {
        let client = match &config.backend {
            BrowserBackend::Chrome {
                headless,
                chrome_bin,
            } => {
                let options = LaunchOptions {
                    headless: *headless,
                    chrome_bin: chrome_bin.clone(),
                    window: config.viewport,
                };
                BrowserClient::launch(&options)
                    .await
                    .context("Failed to launch Chromium")?
            }
            BrowserBackend::Browserless { ws_url } => BrowserClient::connect(ws_url)
                .await
                .with_context(|| format!("Failed to connect to {ws_url}"))?,
        };

        Ok(Self {
            client,
            user_agent: config.user_agent.clone(),
            viewport: config.viewport,
        })
    }

    pub async fn shutdown(self) -> Result<()> {
        self.client.close().await?;
        Ok(())
    }
}

#[async_trait]
impl BrowserEngine for ChromeEngine {
    async fn open_context(&self, locale: &LocaleProfile) -> Result<Box<dyn BrowsingContext>> {
        let profile = ContextProfile {
            locale: locale.tag.clone(),
            accept_language: locale.accept_language.clone(),
            user_agent: self.user_agent.clone(),
            viewport: self.viewport,
        };
        let context = self.client.new_context(profile).await?;
        Ok(Box::new(context))
    }
}

#[async_trait]
impl BrowsingContext for BrowserContext {
    async fn open_page(&self) -> Result<Box<dyn PageDriver>> {
        Ok(Box::new(self.new_page().await?))
    }

    async fn close(self: Box<Self>) -> Result<()> {
        Ok(BrowserContext::close(*self).await?)
    }
}

#[async_trait]
impl PageDriver for BrowserPage {
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<()> {
        Ok(self.goto(url, timeout).await?)
    }

    async fn content(&self) -> Result<String> {
        Ok(BrowserPage::content(self).await?)
    }

    async fn hrefs(&self, selector: &str) -> Result<Vec<String>> {
        Ok(BrowserPage::hrefs(self, selector).await?)
    }

    async fn scroll_by(&self, delta: i64) -> Result<()> {
        Ok(BrowserPage::scroll_by(self, delta).await?)
    }

    async fn scroll_height(&self) -> Result<i64> {
        Ok(BrowserPage::scroll_height(self).await?)
    }

    async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<()> {
        Ok(BrowserPage::wait_for(self, selector, timeout).await?)
    }

    async fn close(self: Box<Self>) -> Result<()> {
        Ok(BrowserPage::close(*self).await?)
    }
}
