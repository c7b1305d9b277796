//! HTML-to-text cleaning rules for the content extractor, adapted from the
//! ingestor's markdown conversion: strip non-content tags, keep headings
//! and lists, collapse whitespace.

use regex::Regex;

fn strip_tag_blocks(html: &str, tag: &str) -> String {
    let pattern = Regex::new(&format!(r"(?is)<{tag}[^>]*>.*?</{tag}>")).unwrap();
    pattern.replace_all(html, "").to_string()
}

/// Clean raw HTML down to readable text, preserving heading/list structure
/// and stripping script/style/noscript/nav/footer content.
pub fn clean_html(html: &str) -> String {
    let mut text = html.to_string();

    for tag in ["script", "style", "noscript", "nav", "footer", "header"] {
        text = strip_tag_blocks(&text, tag);
    }

    for level in 1..=6 {
        let h_re = Regex::new(&format!(r"(?is)<h{level}[^>]*>(.*?)</h{level}>")).unwrap();
        text = h_re.replace_all(&text, "\n## $1\n").to_string();
    }

    let p_re = Regex::new(r"(?is)<p[^>]*>(.*?)</p>").unwrap();
    text = p_re.replace_all(&text, "$1\n\n").to_string();

    let br_re = Regex::new(r"(?i)<br\s*/?>").unwrap();
    text = br_re.replace_all(&text, "\n").to_string();

    let li_re = Regex::new(r"(?is)<li[^>]*>(.*?)</li>").unwrap();
    text = li_re.replace_all(&text, "- $1\n").to_string();

    let tag_re = Regex::new(r"(?s)<[^>]+>").unwrap();
    text = tag_re.replace_all(&text, " ").to_string();

    text = text
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'");

    let blank_re = Regex::new(r"\n{3,}").unwrap();
    text = blank_re.replace_all(&text, "\n\n").to_string();
    let space_re = Regex::new(r"[ \t]{2,}").unwrap();
    text = space_re.replace_all(&text, " ").to_string();

    text.trim().to_string()
}

/// Truncate cleaned text to `max_chars`, leaving the raw HTML untouched.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_script_and_nav() {
        let html = "<nav>menu</nav><script>evil()</script><p>Hello world</p>";
        let cleaned = clean_html(html);
        assert!(!cleaned.contains("menu"));
        assert!(!cleaned.contains("evil"));
        assert!(cleaned.contains("Hello world"));
    }

    #[test]
    fn preserves_headings_and_lists() {
        let html = "<h1>Title</h1><ul><li>One</li><li>Two</li></ul>";
        let cleaned = clean_html(html);
        assert!(cleaned.contains("## Title"));
        assert!(cleaned.contains("- One"));
        assert!(cleaned.contains("- Two"));
    }

    #[test]
    fn truncate_respects_max_chars() {
        let text = "a".repeat(100);
        assert_eq!(truncate_chars(&text, 10).len(), 10);
    }
}
