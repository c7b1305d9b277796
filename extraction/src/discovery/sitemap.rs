//! Sitemap XML discovery: `<loc>` extraction plus nested sitemap-index
//! recursion to depth 2, using the same regex-based parsing style as the
//! rest of the discovery module.

use regex::Regex;
use tracing::debug;

use crate::http::{FetchOptions, HttpFetcher};

const MAX_INDEX_DEPTH: u32 = 2;

fn extract_locs(xml: &str) -> Vec<String> {
    let loc_re = Regex::new(r"(?is)<loc>\s*([^<\s]+)\s*</loc>").unwrap();
    loc_re.captures_iter(xml).filter_map(|c| c.get(1)).map(|m| m.as_str().to_string()).collect()
}

fn is_sitemap_index(xml: &str) -> bool {
    xml.contains("<sitemapindex")
}

/// Fetch a sitemap URL, recursively following sitemap-index entries up to
/// `MAX_INDEX_DEPTH`, returning the flattened list of page URLs found.
pub async fn discover_sitemap_urls(fetcher: &HttpFetcher, sitemap_url: &str) -> Vec<String> {
    let mut collected = Vec::new();
    collect(fetcher, sitemap_url, 0, &mut collected).await;
    collected
}

fn collect<'a>(
    fetcher: &'a HttpFetcher,
    url: &'a str,
    depth: u32,
    out: &'a mut Vec<String>,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + 'a>> {
    Box::pin(async move {
        if depth > MAX_INDEX_DEPTH {
            debug!(url, depth, "sitemap index depth exceeded, stopping");
            return;
        }

        let options = FetchOptions::default();
        let response = match fetcher.fetch(url, &options).await {
            Ok(r) => r,
            Err(e) => {
                debug!(url, error = %e, "sitemap fetch failed");
                return;
            }
        };

        let body = response.text();
        let locs = extract_locs(&body);

        if is_sitemap_index(&body) {
            for nested in locs {
                collect(fetcher, &nested, depth + 1, out).await;
            }
        } else {
            out.extend(locs);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_locs_from_urlset() {
        let xml = r#"<urlset><url><loc>https://a.com/1</loc></url><url><loc>https://a.com/2</loc></url></urlset>"#;
        let locs = extract_locs(xml);
        assert_eq!(locs, vec!["https://a.com/1", "https://a.com/2"]);
    }

    #[test]
    fn detects_sitemap_index() {
        let xml = r#"<sitemapindex><sitemap><loc>https://a.com/sitemap1.xml</loc></sitemap></sitemapindex>"#;
        assert!(is_sitemap_index(xml));
        assert!(!is_sitemap_index("<urlset></urlset>"));
    }
}
