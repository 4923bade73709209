// src/browser.rs
//
// One headless Chromium per session. Sessions are never shared between
// lookups; `close` tears the process down and joins the CDP handler task.

use anyhow::{anyhow, bail, Context, Result};
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use std::future::Future;
use tokio::{
    task::JoinHandle,
    time::{sleep, timeout, Instant},
};
use tracing::{debug, trace, warn};

use crate::config::{BrowserSettings, SettleSettings};

pub struct BrowserSession {
    browser: Browser,
    handler: HandlerTask,
    settings: BrowserSettings,
}

/// The spawned CDP handler loop. Aborted on drop unless it was joined first.
struct HandlerTask(Option<JoinHandle<()>>);

impl HandlerTask {
    async fn join(&mut self) {
        if let Some(task) = self.0.take() {
            let _ = task.await;
        }
    }

    fn abort(&mut self) {
        if let Some(task) = self.0.take() {
            task.abort();
        }
    }
}

impl Drop for HandlerTask {
    fn drop(&mut self) {
        self.abort();
    }
}

impl BrowserSession {
    /// Launch a fresh browser process.
    pub async fn launch(settings: &BrowserSettings) -> Result<Self> {
        let mut builder = BrowserConfig::builder()
            .launch_timeout(settings.launch_timeout())
            .request_timeout(settings.launch_timeout());
        if !settings.headless {
            builder = builder.with_head();
        }
        let config = builder
            .build()
            .map_err(|e| anyhow!("invalid browser config: {}", e))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("launching chromium")?;

        // the CDP connection only makes progress while its handler is polled
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    trace!(error = %e, "cdp handler event error");
                }
            }
        });

        debug!(headless = settings.headless, "browser launched");
        Ok(Self {
            browser,
            handler: HandlerTask(Some(handler)),
            settings: settings.clone(),
        })
    }

    /// Open `url` in a new tab and wait for the navigation to finish.
    pub async fn open(&self, url: &str) -> Result<Page> {
        let budget = self.settings.launch_timeout();
        let page = timeout(budget, async {
            let page = self.browser.new_page(url).await?;
            page.wait_for_navigation().await?;
            Ok::<_, anyhow::Error>(page)
        })
        .await
        .map_err(|_| anyhow!("timed out after {:?} loading {}", budget, url))?
        .with_context(|| format!("loading {}", url))?;
        Ok(page)
    }

    /// Shut the browser down. Always stops the handler task, even when the
    /// browser refuses to close cleanly.
    pub async fn close(mut self) -> Result<()> {
        let closed = self.shutdown().await;
        match closed {
            Ok(()) => {
                self.handler.join().await;
                debug!("browser closed");
                Ok(())
            }
            Err(e) => {
                self.handler.abort();
                Err(e)
            }
        }
    }

    async fn shutdown(&mut self) -> Result<()> {
        self.browser.close().await.context("closing browser")?;
        self.browser.wait().await.context("waiting for browser exit")?;
        Ok(())
    }
}

/// Wait for the element at `selector` to show non-empty text and return it.
pub async fn wait_for_text(page: &Page, selector: &str, settle: &SettleSettings) -> Result<String> {
    settle_poll(settle, selector, move || async move {
        let element = match page.find_element(selector).await {
            Ok(el) => el,
            Err(e) => {
                trace!(selector, error = %e, "result region not present yet");
                return None;
            }
        };
        match element.inner_text().await {
            Ok(text) => text,
            Err(e) => {
                warn!(selector, error = %e, "reading result region");
                None
            }
        }
    })
    .await
}

/// Sleep `settle.min_wait`, then call `check` every `settle.poll_interval`
/// until it yields non-blank text or `settle.timeout` has passed.
pub async fn settle_poll<F, Fut>(settle: &SettleSettings, what: &str, mut check: F) -> Result<String>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<String>>,
{
    let started = Instant::now();
    sleep(settle.min_wait()).await;

    let mut polls = 0u32;
    loop {
        polls += 1;
        if let Some(text) = check().await {
            if !text.trim().is_empty() {
                debug!(what, polls, elapsed = ?started.elapsed(), "settled");
                return Ok(text);
            }
        }
        if started.elapsed() >= settle.timeout() {
            bail!(
                "timed out after {:?} waiting for `{}` to show results",
                settle.timeout(),
                what
            );
        }
        sleep(settle.poll_interval()).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn quick() -> SettleSettings {
        SettleSettings {
            min_wait_ms: 1,
            poll_interval_ms: 1,
            timeout_ms: 200,
        }
    }

    #[tokio::test]
    async fn test_settle_poll_returns_first_non_blank() {
        let calls = AtomicU32::new(0);
        let text = settle_poll(&quick(), ".result-info", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                match n {
                    0 => None,
                    1 => Some("   ".to_string()),
                    _ => Some("ETA: 2025-05-01".to_string()),
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(text, "ETA: 2025-05-01");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_settle_poll_times_out() {
        let settle = SettleSettings {
            min_wait_ms: 0,
            poll_interval_ms: 5,
            timeout_ms: 20,
        };
        let err = settle_poll(&settle, ".result-info", || async { None })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timed out"), "{}", err);
        assert!(err.to_string().contains(".result-info"));
    }

    #[tokio::test]
    async fn test_dropped_handler_task_is_aborted() {
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let _tx = tx;
            std::future::pending::<()>().await;
        });

        drop(HandlerTask(Some(task)));
        // the aborted task drops its sender without sending
        assert!(rx.await.is_err());
    }

    #[tokio::test]
    async fn test_joined_handler_task_runs_to_completion() {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let task = tokio::spawn(async move {
            let _ = tx.send(7);
        });

        let mut handler = HandlerTask(Some(task));
        handler.join().await;
        assert_eq!(rx.await.ok(), Some(7));
        drop(handler);
    }

    /// Needs a local Chromium. Run with `cargo test -- --ignored`.
    #[tokio::test]
    #[ignore]
    async fn test_launch_and_close() -> Result<()> {
        let session = BrowserSession::launch(&BrowserSettings::default()).await?;
        let page = session.open("about:blank").await?;
        drop(page);
        session.close().await
    }
}
