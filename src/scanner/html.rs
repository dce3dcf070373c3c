//! HTML `<link rel="stylesheet">` scanner.
//!
//! Grounded on `dependencies.py`'s `_re_link`/`_re_attrs` and
//! `add_html`: only `<link>` tags whose `rel` attribute is
//! `stylesheet` and which carry an `href` contribute a dependency.
//! Hrefs with a URL scheme (`http://`, `https://`, `//cdn...`) are
//! skipped, since those aren't local files to resolve.

use std::sync::OnceLock;

use regex::Regex;

use super::Scanner;

fn link_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<\s*link\s+([^>]+)>").unwrap())
}

fn attr_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(\w+)\s*=\s*("([^"]*)"|'([^']*)'|(\w+))"#).unwrap()
    })
}

pub struct HtmlScanner;

impl HtmlScanner {
    pub fn new() -> Self {
        Self
    }

    fn parse_attrs(contents: &str) -> Vec<(String, String)> {
        let mut attrs = Vec::new();
        for caps in attr_re().captures_iter(contents) {
            let key = caps.get(1).unwrap().as_str().to_string();
            let value = caps
                .get(3)
                .or_else(|| caps.get(4))
                .or_else(|| caps.get(5))
                .map(|m| m.as_str().to_string())
                .unwrap_or_default();
            attrs.push((key, value));
        }
        attrs
    }
}

impl Default for HtmlScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl Scanner for HtmlScanner {
    fn references(&self, content: &str) -> Vec<String> {
        let mut hrefs = Vec::new();
        for caps in link_re().captures_iter(content) {
            let contents = caps.get(1).unwrap().as_str();
            let attrs = Self::parse_attrs(contents);
            let rel = attrs.iter().find(|(k, _)| k == "rel").map(|(_, v)| v.as_str());
            let href = attrs.iter().find(|(k, _)| k == "href").map(|(_, v)| v.as_str());
            if rel == Some("stylesheet") {
                if let Some(href) = href {
                    if !is_remote(href) {
                        hrefs.push(href.trim().to_string());
                    }
                }
            }
        }
        hrefs
    }
}

fn is_remote(href: &str) -> bool {
    href.starts_with("http://")
        || href.starts_with("https://")
        || href.starts_with("//")
        || href.starts_with("data:")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_stylesheet_href() {
        let html = r#"<link rel="stylesheet" href="css/default.css">"#;
        let refs = HtmlScanner::new().references(html);
        assert_eq!(refs, vec!["css/default.css"]);
    }

    #[test]
    fn ignores_non_stylesheet_rel() {
        let html = r#"<link rel="icon" href="favicon.ico">"#;
        assert!(HtmlScanner::new().references(html).is_empty());
    }

    #[test]
    fn ignores_stylesheet_without_href() {
        let html = r#"<link rel="stylesheet">"#;
        assert!(HtmlScanner::new().references(html).is_empty());
    }

    #[test]
    fn skips_remote_hrefs() {
        let html = r#"<link rel="stylesheet" href="https://cdn.example.com/a.css">"#;
        assert!(HtmlScanner::new().references(html).is_empty());
    }

    #[test]
    fn finds_multiple_links_in_order() {
        let html = r#"
            <link rel="stylesheet" href="a.css">
            <link rel="icon" href="favicon.ico">
            <link rel="stylesheet" href="b.css">
        "#;
        assert_eq!(HtmlScanner::new().references(html), vec!["a.css", "b.css"]);
    }

    #[test]
    fn handles_single_quoted_attrs() {
        let html = "<link rel='stylesheet' href='style.css'>";
        assert_eq!(HtmlScanner::new().references(html), vec!["style.css"]);
    }
}
