//! Content Extractor (C6): semaphore-bounded concurrent page fetch + clean,
//! with per-page failure isolation and input-order result delivery.

pub mod clean;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::warn;

use crate::browser::{Render, RenderOptions};
use crate::config::PageExtractionConfig;
use crate::http::{Fetch, FetchOptions};

/// Outcome of extracting one selected page.
#[derive(Debug, Clone)]
pub struct PageContent {
    pub url: String,
    pub cleaned_text: String,
    pub raw_html: String,
    pub success: bool,
}

/// Per-page completion hook so a caller can surface progress as pages
/// finish, rather than only once the whole phase is done.
#[async_trait]
pub trait PageProgress: Send + Sync {
    async fn on_page(&self, content: &PageContent);
}

/// Extract content for every URL in `urls`, preserving input order in the
/// returned `Vec`. Uses the plain HTTP fetcher first; if `use_browser` is
/// set and the HTTP fetch yields no usable text, falls back to the shared
/// browser instance for JS-rendered pages. `progress`, if given, is
/// notified as each page's extraction completes.
pub async fn extract_pages(
    http: &dyn Fetch,
    browser: Option<&dyn Render>,
    urls: &[String],
    config: &PageExtractionConfig,
    progress: Option<&dyn PageProgress>,
) -> Vec<PageContent> {
    let semaphore = Arc::new(Semaphore::new(config.concurrency.max(1)));
    let timeout = Duration::from_secs(config.page_timeout_s);
    let max_chars = config.max_chars;

    let tasks = urls.iter().map(|url| {
        let semaphore = semaphore.clone();
        let url = url.clone();
        async move {
            let _permit = semaphore.acquire().await.expect("semaphore closed");
            let content = fetch_one(http, browser, &url, timeout, max_chars).await;
            if let Some(progress) = progress {
                progress.on_page(&content).await;
            }
            content
        }
    });

    join_all(tasks).await
}

async fn fetch_one(
    http: &dyn Fetch,
    browser: Option<&dyn Render>,
    url: &str,
    timeout: Duration,
    max_chars: usize,
) -> PageContent {
    let http_attempt = tokio::time::timeout(timeout, http.fetch(url, &FetchOptions::default())).await;

    let raw_html = match http_attempt {
        Ok(Ok(response)) => Some(response.text()),
        Ok(Err(e)) => {
            warn!(url, error = %e, "http fetch failed for page extraction");
            None
        }
        Err(_) => {
            warn!(url, "http fetch timed out during page extraction");
            None
        }
    };

    let mut cleaned = raw_html.as_deref().map(clean::clean_html).unwrap_or_default();
    let mut html_out = raw_html.unwrap_or_default();

    if cleaned.trim().is_empty() {
        if let Some(browser) = browser {
            let options = RenderOptions { page_timeout: timeout, ..RenderOptions::default() };
            let rendered = browser.render(std::slice::from_ref(&url.to_string()), &options).await;
            if let Some(page) = rendered.get(url) {
                if page.success {
                    cleaned = clean::clean_html(&page.raw_html);
                    html_out = page.raw_html.clone();
                }
            }
        }
    }

    let success = !cleaned.trim().is_empty();
    let truncated = clean::truncate_chars(&cleaned, max_chars);

    PageContent { url: url.to_string(), cleaned_text: truncated, raw_html: html_out, success }
}

/// Whether the phase as a whole should be considered failed: true only when
/// every page yielded no usable text.
pub fn phase_failed(pages: &[PageContent]) -> bool {
    pages.iter().all(|p| !p.success)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::config::PageExtractionConfig;
    use crate::testing::MockFetcher;

    struct CountingProgress(AtomicUsize);

    #[async_trait]
    impl PageProgress for CountingProgress {
        async fn on_page(&self, _content: &PageContent) {
            self.0.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[tokio::test]
    async fn progress_hook_fires_once_per_page() {
        let fetcher = MockFetcher::new()
            .with_html("https://a.example", "<html><body><p>a</p></body></html>")
            .with_html("https://b.example", "<html><body><p>b</p></body></html>");
        let urls = vec!["https://a.example".to_string(), "https://b.example".to_string()];
        let progress = CountingProgress(AtomicUsize::new(0));

        extract_pages(&fetcher, None, &urls, &PageExtractionConfig::default(), Some(&progress)).await;

        assert_eq!(progress.0.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn phase_failed_true_when_all_pages_empty() {
        let pages = vec![
            PageContent { url: "a".into(), cleaned_text: "".into(), raw_html: "".into(), success: false },
            PageContent { url: "b".into(), cleaned_text: "".into(), raw_html: "".into(), success: false },
        ];
        assert!(phase_failed(&pages));
    }

    #[test]
    fn phase_failed_false_when_one_page_succeeds() {
        let pages = vec![
            PageContent { url: "a".into(), cleaned_text: "".into(), raw_html: "".into(), success: false },
            PageContent { url: "b".into(), cleaned_text: "hi".into(), raw_html: "<p>hi</p>".into(), success: true },
        ];
        assert!(!phase_failed(&pages));
    }
}
