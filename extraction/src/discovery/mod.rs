//! Link Discoverer (C4): robots.txt + sitemap + same-host BFS crawl,
//! merged and capped per `max_urls`.

pub mod crawl;
pub mod robots;
pub mod sitemap;

use std::collections::HashSet;

use tracing::debug;
use url::Url;

use crate::config::DiscoveryConfig;
use crate::http::HttpFetcher;
use crate::types::record::ScrapeError;

pub use robots::{fetch_robots_txt, RobotsTxt};

/// A URL found during discovery, tagged with where it came from.
#[derive(Debug, Clone)]
pub struct DiscoveredUrl {
    pub url: String,
    pub source: &'static str,
    pub depth: u32,
}

/// Source-tag precedence used for selection tie-breaks:
/// `sitemap > robots > crawl`.
pub fn source_priority(source: &str) -> u8 {
    match source {
        "sitemap" => 0,
        "robots" => 1,
        _ => 2,
    }
}

fn strip_query_and_fragment(url: &str, strip_query: bool) -> Option<String> {
    let mut parsed = Url::parse(url).ok()?;
    parsed.set_fragment(None);
    if strip_query {
        parsed.set_query(None);
    }
    Some(parsed.to_string())
}

/// Run the full discovery algorithm for one site: sitemap entries first
/// (highest-priority source), then robots-listed sitemaps, then a same-host
/// BFS crawl to fill in the rest, deduped and capped at `config.max_urls`.
pub async fn discover(
    fetcher: &HttpFetcher,
    site_url: &str,
    config: &DiscoveryConfig,
) -> Result<Vec<DiscoveredUrl>, ScrapeError> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut out: Vec<DiscoveredUrl> = Vec::new();

    let root = strip_query_and_fragment(site_url, config.strip_query)
        .ok_or_else(|| ScrapeError::new("discovery_error", format!("invalid seed url: {site_url}")))?;
    if seen.insert(root.clone()) {
        out.push(DiscoveredUrl { url: root, source: "crawl", depth: 0 });
    }

    let mut sitemap_candidates = vec![format!("{}/sitemap.xml", site_url.trim_end_matches('/'))];

    let robots_url = format!("{}/robots.txt", site_url.trim_end_matches('/'));
    if let Ok(response) = fetcher.fetch(&robots_url, &crate::http::FetchOptions::default()).await {
        let robots = RobotsTxt::parse(&response.text());
        sitemap_candidates.extend(robots.sitemaps().iter().cloned());
    }

    for sitemap_url in sitemap_candidates {
        if out.len() >= config.max_urls {
            break;
        }
        let urls = sitemap::discover_sitemap_urls(fetcher, &sitemap_url).await;
        debug!(sitemap_url, found = urls.len(), "sitemap discovery");
        for url in urls {
            if out.len() >= config.max_urls {
                break;
            }
            let Some(normalized) = strip_query_and_fragment(&url, config.strip_query) else { continue };
            if let Some(exclude) = &config.exclude_regex {
                if let Ok(re) = regex::Regex::new(exclude) {
                    if re.is_match(&normalized) {
                        continue;
                    }
                }
            }
            if seen.insert(normalized.clone()) {
                out.push(DiscoveredUrl { url: normalized, source: "sitemap", depth: 0 });
            }
        }
    }

    if out.len() < config.max_urls {
        let remaining = config.max_urls - out.len();
        let crawled = crawl::crawl(fetcher, site_url, config.depth, remaining).await?;
        for item in crawled {
            if seen.insert(item.url.clone()) {
                out.push(item);
            }
        }
    }

    out.truncate(config.max_urls);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_orders_sitemap_first() {
        assert!(source_priority("sitemap") < source_priority("robots"));
        assert!(source_priority("robots") < source_priority("crawl"));
    }

    #[test]
    fn strip_query_removes_query_string() {
        let stripped = strip_query_and_fragment("https://a.com/page?utm=1#frag", true).unwrap();
        assert_eq!(stripped, "https://a.com/page");
    }
}
