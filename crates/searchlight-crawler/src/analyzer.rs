//! HTML analysis.

use crate::scope::{normalize_url, Scope};
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::OnceLock;
use url::Url;

/// Longest visible-text excerpt kept per page.
pub const MAX_EXCERPT_CHARS: usize = 8000;

/// Signals extracted from one HTML page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct PageAnalysis {
    /// `<title>` text
    pub title: Option<String>,
    /// `<meta name="description">`
    pub meta_description: Option<String>,
    /// `<meta name="robots">`
    pub meta_robots: Option<String>,
    /// Robots meta contains `noindex`
    pub noindex: bool,
    /// `<link rel="canonical">`, resolved
    pub canonical: Option<String>,
    /// `<html lang>`
    pub lang: Option<String>,
    /// `<meta name="viewport">` present
    pub has_viewport: bool,
    /// Number of `<h1>` elements
    pub h1_count: usize,
    /// Number of `<h2>` elements
    pub h2_count: usize,
    /// Words of visible body text
    pub word_count: usize,
    /// Number of `<img>` elements
    pub image_count: usize,
    /// Images with no `alt` attribute
    pub images_missing_alt: usize,
    /// At least one JSON-LD block present
    pub has_structured_data: bool,
    /// `@type` values found in JSON-LD
    pub structured_data_types: Vec<String>,
    /// Same-site links, normalized and deduplicated
    pub internal_links: Vec<String>,
    /// Off-site links, normalized and deduplicated
    pub external_links: Vec<String>,
    /// Visible text, whitespace collapsed, capped at [`MAX_EXCERPT_CHARS`]
    pub text_excerpt: String,
}

struct Selectors {
    title: Selector,
    meta: Selector,
    canonical: Selector,
    html: Selector,
    body: Selector,
    h1: Selector,
    h2: Selector,
    img: Selector,
    json_ld: Selector,
    anchor: Selector,
}

fn selectors() -> &'static Selectors {
    static SELECTORS: OnceLock<Selectors> = OnceLock::new();
    SELECTORS.get_or_init(|| {
        let parse = |css: &str| Selector::parse(css).expect("valid selector");
        Selectors {
            title: parse("title"),
            meta: parse("meta[name]"),
            canonical: parse("link[rel=\"canonical\"][href]"),
            html: parse("html"),
            body: parse("body"),
            h1: parse("h1"),
            h2: parse("h2"),
            img: parse("img"),
            json_ld: parse("script[type=\"application/ld+json\"]"),
            anchor: parse("a[href]"),
        }
    })
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<Vec<_>>().join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

fn is_hidden_container(name: &str) -> bool {
    matches!(name, "script" | "style" | "noscript" | "template" | "svg")
}

fn visible_text(document: &Html) -> String {
    let Some(body) = document.select(&selectors().body).next() else {
        return String::new();
    };

    let mut words: Vec<&str> = Vec::new();
    for node in body.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node
            .ancestors()
            .filter_map(|a| a.value().as_element())
            .any(|e| is_hidden_container(e.name()));
        if !hidden {
            words.extend(text.split_whitespace());
        }
    }
    words.join(" ")
}

fn collect_types(value: &serde_json::Value, out: &mut Vec<String>) {
    match value {
        serde_json::Value::Array(items) => items.iter().for_each(|v| collect_types(v, out)),
        serde_json::Value::Object(map) => {
            match map.get("@type") {
                Some(serde_json::Value::String(t)) => out.push(t.clone()),
                Some(serde_json::Value::Array(ts)) => {
                    out.extend(ts.iter().filter_map(|t| t.as_str().map(str::to_string)));
                }
                _ => {}
            }
            if let Some(graph) = map.get("@graph") {
                collect_types(graph, out);
            }
        }
        _ => {}
    }
}

/// Analyze an HTML document fetched from `page_url`.
#[must_use]
pub fn analyze(html: &str, page_url: &Url, scope: &Scope) -> PageAnalysis {
    let document = Html::parse_document(html);
    let sel = selectors();
    let mut analysis = PageAnalysis {
        title: document
            .select(&sel.title)
            .next()
            .map(element_text)
            .and_then(non_empty),
        ..PageAnalysis::default()
    };

    for meta in document.select(&sel.meta) {
        let name = meta.value().attr("name").unwrap_or_default().to_ascii_lowercase();
        let content = meta.value().attr("content").map(|c| c.trim().to_string());
        match name.as_str() {
            "description" => analysis.meta_description = content.and_then(non_empty),
            "robots" => analysis.meta_robots = content.and_then(non_empty),
            "viewport" => analysis.has_viewport = true,
            _ => {}
        }
    }
    analysis.noindex = analysis
        .meta_robots
        .as_deref()
        .is_some_and(|r| r.to_ascii_lowercase().contains("noindex"));

    analysis.canonical = document
        .select(&sel.canonical)
        .next()
        .and_then(|l| l.value().attr("href"))
        .and_then(|href| page_url.join(href.trim()).ok())
        .map(String::from);

    analysis.lang = document
        .select(&sel.html)
        .next()
        .and_then(|h| h.value().attr("lang"))
        .map(|l| l.trim().to_string())
        .and_then(non_empty);

    analysis.h1_count = document.select(&sel.h1).count();
    analysis.h2_count = document.select(&sel.h2).count();

    for img in document.select(&sel.img) {
        analysis.image_count += 1;
        if img.value().attr("alt").is_none() {
            analysis.images_missing_alt += 1;
        }
    }

    for script in document.select(&sel.json_ld) {
        let raw = script.text().collect::<String>();
        if raw.trim().is_empty() {
            continue;
        }
        analysis.has_structured_data = true;
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(&raw) {
            collect_types(&value, &mut analysis.structured_data_types);
        }
    }

    let mut seen = HashSet::new();
    for anchor in document.select(&sel.anchor) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let Some(link) = normalize_url(href, Some(page_url)) else {
            continue;
        };
        if link == *page_url || !seen.insert(link.to_string()) {
            continue;
        }
        if scope.contains(&link) {
            analysis.internal_links.push(link.into());
        } else {
            analysis.external_links.push(link.into());
        }
    }

    let text = visible_text(&document);
    analysis.word_count = text.split_whitespace().count();
    analysis.text_excerpt = text.chars().take(MAX_EXCERPT_CHARS).collect();

    analysis
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<!doctype html>
<html lang="en">
<head>
  <title>  Acme   Widgets </title>
  <meta name="description" content="Widgets for every workshop.">
  <meta name="viewport" content="width=device-width">
  <meta name="robots" content="index, follow">
  <link rel="canonical" href="/widgets">
  <script type="application/ld+json">
    {"@context": "https://schema.org", "@graph": [{"@type": "Organization"}, {"@type": ["Product", "Thing"]}]}
  </script>
  <style>.hidden { display: none }</style>
</head>
<body>
  <h1>Widgets</h1>
  <h2>Why widgets</h2>
  <p>Our widgets are sturdy and cheap.</p>
  <script>var notText = "should not count";</script>
  <img src="a.png" alt="A widget">
  <img src="b.png">
  <img src="c.png" alt="">
  <a href="/about">About</a>
  <a href="https://www.acme.test/about#team">About again</a>
  <a href="https://partner.test/">Partner</a>
  <a href="mailto:sales@acme.test">Mail</a>
  <a href="/catalog.pdf">Catalog</a>
  <a href="/widgets">Self</a>
</body>
</html>"#;

    fn run(html: &str) -> PageAnalysis {
        let scope = Scope::new("https://acme.test/").expect("scope");
        let url = Url::parse("https://acme.test/widgets").expect("url");
        analyze(html, &url, &scope)
    }

    #[test]
    fn test_head_signals() {
        let a = run(PAGE);
        assert_eq!(a.title.as_deref(), Some("Acme Widgets"));
        assert_eq!(a.meta_description.as_deref(), Some("Widgets for every workshop."));
        assert!(!a.noindex);
        assert!(a.has_viewport);
        assert_eq!(a.canonical.as_deref(), Some("https://acme.test/widgets"));
        assert_eq!(a.lang.as_deref(), Some("en"));
    }

    #[test]
    fn test_body_signals() {
        let a = run(PAGE);
        assert_eq!(a.h1_count, 1);
        assert_eq!(a.h2_count, 1);
        assert_eq!(a.image_count, 3);
        assert_eq!(a.images_missing_alt, 1, "empty alt is decorative, not missing");
        assert!(a.has_structured_data);
        assert_eq!(a.structured_data_types, vec!["Organization", "Product", "Thing"]);
        assert!(!a.text_excerpt.contains("notText"));
        assert!(a.text_excerpt.starts_with("Widgets Why widgets Our widgets"));
        assert_eq!(a.word_count, a.text_excerpt.split_whitespace().count());
    }

    #[test]
    fn test_links_classified_and_deduplicated() {
        let a = run(PAGE);
        assert_eq!(
            a.internal_links,
            vec![
                "https://acme.test/about".to_string(),
                "https://www.acme.test/about".to_string()
            ]
        );
        assert_eq!(a.external_links, vec!["https://partner.test/".to_string()]);
    }

    #[test]
    fn test_noindex_and_empty_document() {
        let a = run(r#"<html><head><meta name="ROBOTS" content="NOINDEX"></head><body></body></html>"#);
        assert!(a.noindex);
        assert_eq!(a.title, None);
        assert_eq!(a.word_count, 0);
        assert!(a.internal_links.is_empty());

        let empty = run("");
        assert_eq!(empty.h1_count, 0);
        assert!(!empty.has_structured_data);
    }

    #[test]
    fn test_excerpt_is_capped() {
        let body = "word ".repeat(MAX_EXCERPT_CHARS);
        let a = run(&format!("<html><body><p>{body}</p></body></html>"));
        assert_eq!(a.text_excerpt.chars().count(), MAX_EXCERPT_CHARS);
        assert_eq!(a.word_count, MAX_EXCERPT_CHARS);
    }
}
