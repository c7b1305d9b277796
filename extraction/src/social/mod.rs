//! Social Link Extractor (C8): finds outbound links to known platforms,
//! filters consent-overlay and share-intent noise, normalizes and dedupes.

use std::collections::HashMap;

use regex::Regex;
use url::Url;

use crate::config::SocialConfig;
use crate::types::SocialPlatform;

/// CSS-selector-shaped patterns describing consent/cookie overlays to skip
/// when scanning a page's link set. These are matched against class/id
/// attribute text in the raw HTML, not run through an actual CSS engine.
pub fn default_consent_selectors() -> Vec<String> {
    [
        "#onetrust-banner-sdk",
        "#onetrust-consent-sdk",
        ".cookie-consent",
        ".cookie-banner",
        ".cookie-notice",
        ".cookie-policy",
        ".cc-banner",
        ".cc-window",
        "#cookie-law-info-bar",
        "#cookieConsent",
        ".gdpr-consent",
        ".gdpr-banner",
        "#CybotCookiebotDialog",
        ".cookiebot",
        "#consent-banner",
        "#consent-modal",
        ".consent-overlay",
        ".consent-popup",
        "#truste-consent-track",
        ".truste-banner",
        "#usercentrics-root",
        "#didomi-host",
        ".qc-cmp2-container",
        "#sp_message_container",
        ".cookie-wall",
        ".cookie-bar",
        "#cookie-bar",
        ".privacy-banner",
        "#privacy-banner",
        ".tracking-consent",
        "#tracking-consent",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// A single discovered social link, tagged with the platform it matched.
#[derive(Debug, Clone)]
pub struct SocialLink {
    pub platform: SocialPlatform,
    pub url: String,
}

/// Strip any HTML subtree whose opening tag's `class`/`id` attribute
/// contains one of the consent-overlay selector fragments, before the link
/// scan runs. Best-effort: operates on raw markup, not a DOM tree, since the
/// goal is to exclude overlay-injected share links, not produce clean HTML.
pub fn strip_consent_overlays(html: &str, selectors: &[String]) -> String {
    let fragments: Vec<String> = selectors
        .iter()
        .map(|s| s.trim_start_matches(['#', '.']).to_string())
        .collect();

    let tag_re = Regex::new(r"(?is)<(div|section|aside)\b[^>]*>").unwrap();
    let mut out = html.to_string();

    for open_match in tag_re.find_iter(html).collect::<Vec<_>>().into_iter().rev() {
        let open_tag = open_match.as_str();
        let matches_overlay = fragments.iter().any(|frag| open_tag.contains(frag.as_str()));
        if !matches_overlay {
            continue;
        }
        if let Some(end) = find_matching_close(html, open_match.start(), open_match.end()) {
            out.replace_range(open_match.start()..end, "");
        }
    }
    out
}

fn find_matching_close(html: &str, tag_start: usize, after_open: usize) -> Option<usize> {
    let tag_name_re = Regex::new(r"(?i)^<(\w+)").unwrap();
    let tag_name = tag_name_re.captures(&html[tag_start..])?.get(1)?.as_str().to_lowercase();
    let open_re = Regex::new(&format!(r"(?is)<{tag_name}\b")).ok()?;
    let close_re = Regex::new(&format!(r"(?is)</{tag_name}\s*>")).ok()?;

    let mut depth = 1usize;
    let mut cursor = after_open;
    loop {
        let next_open = open_re.find_at(html, cursor).map(|m| m.start());
        let next_close = close_re.find_at(html, cursor).map(|m| (m.start(), m.end()));
        match (next_open, next_close) {
            (_, None) => return None,
            (Some(o), Some((c, ce))) if o < c => {
                depth += 1;
                cursor = o + 1;
            }
            (_, Some((_, ce))) => {
                depth -= 1;
                cursor = ce;
                if depth == 0 {
                    return Some(ce);
                }
            }
        }
    }
}

/// Extract `href` values from raw HTML, independent of any particular parser.
fn extract_hrefs(html: &str) -> Vec<String> {
    let href_re = Regex::new(r#"(?i)href\s*=\s*["']([^"']+)["']"#).unwrap();
    href_re.captures_iter(html).filter_map(|c| c.get(1)).map(|m| m.as_str().to_string()).collect()
}

/// Strip tracking query parameters and normalize casing/trailing slash so
/// the same profile linked twice doesn't produce two entries.
fn normalize_link(url: &str, base: Option<&Url>) -> Option<String> {
    let parsed = match Url::parse(url) {
        Ok(u) => u,
        Err(_) => base?.join(url).ok()?,
    };

    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }

    let host = parsed.host_str()?.to_lowercase();
    let mut path = parsed.path().trim_end_matches('/').to_string();
    if path.is_empty() {
        path = "/".to_string();
    }

    Some(format!("https://{host}{path}"))
}

fn is_share_intent(url: &str, exclude_patterns: &[String]) -> bool {
    exclude_patterns.iter().any(|pattern| url.contains(pattern.as_str()))
}

/// Scan a page's HTML for social links, in fetch order, returning only the
/// first occurrence of each platform.
pub fn extract_from_page(html: &str, page_url: &str, config: &SocialConfig) -> Vec<SocialLink> {
    let cleaned = strip_consent_overlays(html, &config.consent_selectors);
    let base = Url::parse(page_url).ok();

    let mut seen_platforms = std::collections::HashSet::new();
    let mut out = Vec::new();

    for href in extract_hrefs(&cleaned) {
        if is_share_intent(&href, &config.exclude_patterns) {
            continue;
        }
        let Some(normalized) = normalize_link(&href, base.as_ref()) else { continue };
        let Ok(parsed) = Url::parse(&normalized) else { continue };
        let Some(host) = parsed.host_str() else { continue };
        let Some(platform) = SocialPlatform::from_host(host) else { continue };

        if !seen_platforms.insert(platform) {
            continue;
        }
        out.push(SocialLink { platform, url: normalized });
    }

    out
}

/// Merge per-page link lists across a crawl, keeping first occurrence per
/// platform in overall page-fetch order.
pub fn merge_links(pages: impl IntoIterator<Item = Vec<SocialLink>>) -> HashMap<SocialPlatform, String> {
    let mut map = HashMap::new();
    for links in pages {
        for link in links {
            map.entry(link.platform).or_insert(link.url);
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SocialConfig {
        SocialConfig::default()
    }

    #[test]
    fn extracts_known_platforms_only() {
        let html = r#"
            <a href="https://www.facebook.com/acme">FB</a>
            <a href="https://example.com/careers">not social</a>
            <a href="https://twitter.com/acme">Tw</a>
        "#;
        let links = extract_from_page(html, "https://acme.com/about", &config());
        assert_eq!(links.len(), 2);
        assert!(links.iter().any(|l| l.platform == SocialPlatform::Facebook));
        assert!(links.iter().any(|l| l.platform == SocialPlatform::Twitter));
    }

    #[test]
    fn filters_share_intent_links() {
        let html = r#"<a href="https://twitter.com/intent/tweet?text=hi">Share</a>"#;
        let links = extract_from_page(html, "https://acme.com", &config());
        assert!(links.is_empty());
    }

    #[test]
    fn first_occurrence_per_platform_wins() {
        let html = r#"
            <a href="https://linkedin.com/company/acme-old">old</a>
            <a href="https://linkedin.com/company/acme-new">new</a>
        "#;
        let links = extract_from_page(html, "https://acme.com", &config());
        assert_eq!(links.len(), 1);
        assert!(links[0].url.contains("acme-old"));
    }

    #[test]
    fn strips_consent_overlay_links() {
        let html = r#"
            <div class="cookie-consent"><a href="https://facebook.com/shadow">nope</a></div>
            <a href="https://facebook.com/acme">real</a>
        "#;
        let links = extract_from_page(html, "https://acme.com", &config());
        assert_eq!(links.len(), 1);
        assert!(links[0].url.contains("acme"));
        assert!(!links[0].url.contains("shadow"));
    }

    #[test]
    fn merge_links_keeps_first_page_order() {
        let page1 = vec![SocialLink { platform: SocialPlatform::GitHub, url: "https://github.com/acme".into() }];
        let page2 = vec![SocialLink { platform: SocialPlatform::GitHub, url: "https://github.com/acme-2".into() }];
        let merged = merge_links([page1, page2]);
        assert_eq!(merged.get(&SocialPlatform::GitHub).unwrap(), "https://github.com/acme");
    }
}
