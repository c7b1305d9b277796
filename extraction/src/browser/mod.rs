//! Headless-browser Fetcher (C2), grounded on chromiumoxide the way the
//! search-scrape pack's browser manager drives it: single long-lived
//! instance per extraction, per-page timeout, kill-and-restart after
//! repeated timeouts, guaranteed teardown.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::handler::viewport::Viewport;
use futures::StreamExt;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::error::BrowserError;

/// The JS-rendering capability `extract` falls back to when a plain HTTP
/// fetch yields no usable text.
#[async_trait]
pub trait Render: Send + Sync {
    async fn render(&self, urls: &[String], options: &RenderOptions) -> HashMap<String, RenderedPage>;
}

/// Result of rendering one URL.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub url: String,
    pub raw_html: String,
    pub success: bool,
}

/// Options for a render pass.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub page_timeout: Duration,
    pub wait_for: Option<String>,
    pub wait_ms: u32,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self { page_timeout: Duration::from_secs(30), wait_for: None, wait_ms: 1500 }
    }
}

/// Find a usable Chromium-family executable: env override, PATH scan, then
/// well-known install locations.
pub fn find_chrome_executable() -> Option<String> {
    if let Ok(p) = std::env::var("CHROME_EXECUTABLE") {
        if Path::new(&p).exists() {
            return Some(p);
        }
    }

    if let Ok(path_var) = std::env::var("PATH") {
        let candidates =
            ["brave-browser", "brave", "google-chrome", "chromium", "chromium-browser", "chrome"];
        for dir in std::env::split_paths(&path_var) {
            for exe in candidates {
                let full = dir.join(exe);
                if full.exists() {
                    return Some(full.to_string_lossy().to_string());
                }
            }
        }
    }

    #[cfg(target_os = "linux")]
    {
        let candidates = [
            "/usr/bin/brave-browser",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
            "/usr/bin/google-chrome",
        ];
        for c in candidates {
            if Path::new(c).exists() {
                return Some(c.to_string());
            }
        }
    }

    None
}

/// A single long-lived headless-browser instance shared across all pages in
/// one extraction job. Restarts itself after `max_consecutive_timeouts`.
pub struct BrowserFetcher {
    inner: Mutex<Option<Browser>>,
    consecutive_timeouts: AtomicU32,
    max_consecutive_timeouts: u32,
    viewport: (u32, u32),
}

impl BrowserFetcher {
    pub fn new(max_consecutive_timeouts: u32) -> Self {
        Self {
            inner: Mutex::new(None),
            consecutive_timeouts: AtomicU32::new(0),
            max_consecutive_timeouts,
            viewport: (1280, 900),
        }
    }

    async fn launch(&self) -> Result<Browser, BrowserError> {
        let exe = find_chrome_executable()
            .ok_or_else(|| BrowserError::Launch("no chromium-family executable found".into()))?;

        let config = BrowserConfig::builder()
            .chrome_executable(&exe)
            .viewport(Viewport {
                width: self.viewport.0,
                height: self.viewport.1,
                device_scale_factor: Some(1.0),
                emulating_mobile: false,
                is_landscape: true,
                has_touch: false,
            })
            .window_size(self.viewport.0, self.viewport.1)
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-setuid-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-background-networking")
            .arg("--mute-audio")
            .build()
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        let (browser, mut handler) =
            Browser::launch(config).await.map_err(|e| BrowserError::Launch(e.to_string()))?;

        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    error!("cdp handler error: {e}");
                }
            }
        });

        Ok(browser)
    }

    async fn ensure_browser(&self) -> Result<(), BrowserError> {
        let mut guard = self.inner.lock().await;
        if guard.is_none() {
            *guard = Some(self.launch().await?);
        }
        Ok(())
    }

    async fn restart(&self) -> Result<(), BrowserError> {
        let mut guard = self.inner.lock().await;
        if let Some(mut browser) = guard.take() {
            let _ = browser.close().await;
        }
        *guard = Some(self.launch().await?);
        self.consecutive_timeouts.store(0, Ordering::SeqCst);
        Ok(())
    }

    /// Render a batch of URLs sequentially against the shared instance,
    /// returning one `RenderedPage` per input URL (never fewer).
    pub async fn render(
        &self,
        urls: &[String],
        options: &RenderOptions,
    ) -> HashMap<String, RenderedPage> {
        let mut out = HashMap::new();
        for url in urls {
            let page = self.render_one(url, options).await;
            out.insert(url.clone(), page);
        }
        out
    }

    async fn render_one(&self, url: &str, options: &RenderOptions) -> RenderedPage {
        if let Err(e) = self.ensure_browser().await {
            warn!(url, error = %e, "browser launch failed");
            return RenderedPage { url: url.to_string(), raw_html: String::new(), success: false };
        }

        let fetch = self.fetch_with_timeout(url, options);
        match tokio::time::timeout(options.page_timeout, fetch).await {
            Ok(Ok(html)) => {
                self.consecutive_timeouts.store(0, Ordering::SeqCst);
                RenderedPage { url: url.to_string(), raw_html: html, success: true }
            }
            Ok(Err(e)) => {
                warn!(url, error = %e, "render failed");
                RenderedPage { url: url.to_string(), raw_html: String::new(), success: false }
            }
            Err(_) => {
                let timeouts = self.consecutive_timeouts.fetch_add(1, Ordering::SeqCst) + 1;
                warn!(url, timeouts, "render timed out");
                if timeouts >= self.max_consecutive_timeouts {
                    info!("restarting browser after {timeouts} consecutive timeouts");
                    let _ = self.restart().await;
                }
                RenderedPage { url: url.to_string(), raw_html: String::new(), success: false }
            }
        }
    }

    async fn fetch_with_timeout(
        &self,
        url: &str,
        options: &RenderOptions,
    ) -> Result<String, BrowserError> {
        let guard = self.inner.lock().await;
        let browser = guard
            .as_ref()
            .ok_or_else(|| BrowserError::Navigation { url: url.to_string(), reason: "no browser".into() })?;

        let page = browser
            .new_page(url)
            .await
            .map_err(|e| BrowserError::Navigation { url: url.to_string(), reason: e.to_string() })?;

        if let Some(selector) = &options.wait_for {
            let _ = page.find_element(selector.as_str()).await;
        } else {
            tokio::time::sleep(Duration::from_millis(options.wait_ms as u64)).await;
        }

        let html = page
            .content()
            .await
            .map_err(|e| BrowserError::Navigation { url: url.to_string(), reason: e.to_string() })?;

        let _ = page.close().await;
        Ok(html)
    }

    /// Close the underlying browser instance. Safe to call even if never
    /// launched or already closed.
    pub async fn shutdown(&self) {
        let mut guard = self.inner.lock().await;
        if let Some(mut browser) = guard.take() {
            if let Err(e) = browser.close().await {
                warn!("browser close error (non-fatal): {e}");
            }
        }
    }
}

#[async_trait]
impl Render for BrowserFetcher {
    async fn render(&self, urls: &[String], options: &RenderOptions) -> HashMap<String, RenderedPage> {
        BrowserFetcher::render(self, urls, options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_render_options_have_expected_values() {
        let options = RenderOptions::default();
        assert_eq!(options.page_timeout, Duration::from_secs(30));
        assert!(options.wait_for.is_none());
    }

    #[test]
    fn fetcher_starts_with_zero_timeouts() {
        let fetcher = BrowserFetcher::new(3);
        assert_eq!(fetcher.consecutive_timeouts.load(Ordering::SeqCst), 0);
    }
}
