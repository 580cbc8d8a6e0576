//! Which URLs belong to an audit's crawl.

use crate::error::{CrawlError, Result};
use url::Url;

/// Extensions that never lead to an HTML page.
const SKIPPED_EXTENSIONS: &[&str] = &[
    "7z", "avi", "css", "csv", "doc", "docx", "eot", "exe", "gif", "gz", "ico", "jpeg", "jpg",
    "js", "json", "mov", "mp3", "mp4", "otf", "pdf", "png", "ppt", "pptx", "rar", "rss", "svg",
    "tar", "ttf", "txt", "wav", "webm", "webp", "woff", "woff2", "xls", "xlsx", "xml", "zip",
];

/// Normalize a link into its canonical crawl form.
///
/// Relative links are resolved against `base`. Returns `None` for non-HTTP
/// schemes and for links to binary resources. The fragment is dropped; `url`
/// already lowercases the host, strips default ports and gives a bare host a
/// `/` path.
#[must_use]
pub fn normalize_url(raw: &str, base: Option<&Url>) -> Option<Url> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let mut url = match base {
        Some(base) => base.join(raw).ok()?,
        None => Url::parse(raw).ok()?,
    };

    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return None;
    }

    url.set_fragment(None);

    let path = url.path().to_ascii_lowercase();
    if let Some((_, ext)) = path.rsplit_once('.') {
        if !ext.contains('/') && SKIPPED_EXTENSIONS.contains(&ext) {
            return None;
        }
    }

    Some(url)
}

fn bare_host(host: &str) -> &str {
    host.strip_prefix("www.").unwrap_or(host)
}

/// Same-site boundary of a crawl, rooted at the audit's target URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    root: Url,
    host: String,
}

impl Scope {
    /// Scope for a target URL.
    ///
    /// # Errors
    /// Returns `CrawlError::InvalidUrl` if the target is not an absolute
    /// HTTP(S) URL.
    pub fn new(target_url: &str) -> Result<Self> {
        let root = normalize_url(target_url, None)
            .ok_or_else(|| CrawlError::InvalidUrl(target_url.to_string()))?;
        let host = bare_host(root.host_str().unwrap_or_default()).to_string();
        Ok(Self { root, host })
    }

    /// Normalized target URL.
    #[must_use]
    pub fn root(&self) -> &Url {
        &self.root
    }

    /// Whether a URL is on the audited site. `www.` is ignored on both sides.
    #[must_use]
    pub fn contains(&self, url: &Url) -> bool {
        url.host_str().is_some_and(|h| bare_host(h) == self.host)
    }
}
