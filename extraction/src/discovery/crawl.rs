//! BFS same-host crawl over the fetched HTML, adapted from the ingest
//! pipeline's link-following logic: resolves the working base host to the
//! post-redirect origin on the first fetch, then stays within it.

use std::collections::{HashSet, VecDeque};

use regex::Regex;
use tracing::{debug, warn};
use url::Url;

use crate::discovery::DiscoveredUrl;
use crate::http::{FetchOptions, HttpFetcher};
use crate::types::record::ScrapeError;

fn extract_links(base_url: &Url, html: &str) -> Vec<String> {
    let href_re = Regex::new(r#"(?i)href\s*=\s*["']([^"']+)["']"#).unwrap();
    href_re
        .captures_iter(html)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str())
        .filter(|href| {
            !(href.starts_with('#')
                || href.starts_with("javascript:")
                || href.starts_with("mailto:")
                || href.starts_with("tel:"))
        })
        .filter_map(|href| base_url.join(href).ok())
        .map(|u| normalize_url(&u))
        .collect()
}

/// Strip fragment and trailing slash so the same page isn't queued twice.
fn normalize_url(url: &Url) -> String {
    let mut normalized = url.clone();
    normalized.set_fragment(None);
    let mut s = normalized.to_string();
    if s.ends_with('/') && s.matches('/').count() > 3 {
        s.pop();
    }
    s
}

fn same_host(a: &Url, b: &Url) -> bool {
    a.host_str() == b.host_str()
}

/// BFS crawl starting from `seed_url`, bounded by `max_depth` and
/// `max_urls`. Resolves the effective base host from the first response's
/// post-redirect URL.
pub async fn crawl(
    fetcher: &HttpFetcher,
    seed_url: &str,
    max_depth: u32,
    max_urls: usize,
) -> Result<Vec<DiscoveredUrl>, ScrapeError> {
    let mut base_url = Url::parse(seed_url)
        .map_err(|e| ScrapeError::new("discovery_error", e.to_string()))?;

    let mut visited: HashSet<String> = HashSet::new();
    let mut queue: VecDeque<(String, u32)> = VecDeque::new();
    let mut out = Vec::new();
    let mut base_resolved = false;

    queue.push_back((seed_url.to_string(), 0));

    while let Some((url, depth)) = queue.pop_front() {
        if out.len() >= max_urls {
            break;
        }
        if depth > max_depth || visited.contains(&url) {
            continue;
        }
        visited.insert(url.clone());

        let options = FetchOptions::default();
        let response = match fetcher.fetch(&url, &options).await {
            Ok(r) => r,
            Err(e) => {
                warn!(url, error = %e, "crawl fetch failed");
                continue;
            }
        };

        let Ok(final_url) = Url::parse(&response.final_url) else { continue };

        if !base_resolved {
            if final_url.host_str() != base_url.host_str() {
                debug!(original = %base_url, resolved = %final_url, "base host resolved after redirect");
                base_url = final_url.clone();
            }
            base_resolved = true;
        }

        out.push(DiscoveredUrl { url: url.clone(), source: "crawl", depth });

        if depth < max_depth {
            let html = response.text();
            for link in extract_links(&final_url, &html) {
                if let Ok(parsed) = Url::parse(&link) {
                    if same_host(&parsed, &base_url) && !visited.contains(&link) {
                        queue.push_back((link, depth + 1));
                    }
                }
            }
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_fragment() {
        let url = Url::parse("https://example.com/page#section").unwrap();
        assert_eq!(normalize_url(&url), "https://example.com/page");
    }
}
