// src/carrier/one.rs

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::FutureExt;
use std::panic::{self, AssertUnwindSafe};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::Tracker;
use crate::browser::{self, BrowserSession};
use crate::config::{BrowserSettings, OneLineSettings};

pub const ONE_CARRIER_CODE: &str = "ONE";

/// Ocean Network Express public tracking page, driven through a headless browser.
#[derive(Debug, Clone)]
pub struct OneLineTracker {
    browser: BrowserSettings,
    site: OneLineSettings,
}

impl OneLineTracker {
    pub fn new(browser: BrowserSettings, site: OneLineSettings) -> Self {
        Self { browser, site }
    }

    /// Fill the tracking form, submit it and read the result region.
    async fn search(&self, session: &BrowserSession, master_bl: &str) -> Result<String> {
        let page = session.open(&self.site.tracking_url).await?;

        page.find_element(&self.site.input_selector)
            .await
            .with_context(|| format!("tracking input `{}` not found", self.site.input_selector))?
            .click()
            .await?
            .type_str(master_bl)
            .await
            .context("typing master B/L")?;

        page.find_xpath(&self.site.submit_xpath)
            .await
            .with_context(|| format!("search button `{}` not found", self.site.submit_xpath))?
            .click()
            .await
            .context("clicking search")?;
        debug!("search submitted");

        browser::wait_for_text(&page, &self.site.result_selector, &self.site.settle).await
    }
}

#[async_trait]
impl Tracker for OneLineTracker {
    fn carrier(&self) -> &str {
        ONE_CARRIER_CODE
    }

    async fn fetch_tracking_page(&self, master_bl: &str) -> Result<String> {
        let start = Instant::now();
        let session = BrowserSession::launch(&self.browser).await?;

        let result = AssertUnwindSafe(self.search(&session, master_bl))
            .catch_unwind()
            .await;

        // release the browser on every path before reporting the outcome
        if let Err(e) = session.close().await {
            warn!(error = %format!("{:#}", e), "browser did not close cleanly");
        }
        let result = result.unwrap_or_else(|payload| panic::resume_unwind(payload));

        if result.is_ok() {
            info!(master_bl, elapsed = ?start.elapsed(), "tracking page read");
        }
        result
    }
}
