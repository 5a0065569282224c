use std::collections::{BTreeMap, HashSet};
use std::sync::LazyLock;
use std::time::Duration;

use discovery_common::PlatformKey;
use regex::Regex;
use tracing::{info, warn};
use url::Url;

use crate::fetch::{FetchRequest, HttpFetcher};

/// Matches the `href` of an `<a>` tag. The attribute must follow whitespace
/// or a closing quote so `data-href` is skipped. Other elements with URLs (`<link>`,
/// `<img>`, scripts) never point at a business profile.
static ANCHOR_HREF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<a\b[^>]*?[\s"']href\s*=\s*["']([^"']+)["']"#).expect("valid regex")
});

const SKIPPED_SCHEMES: &[&str] = &["mailto:", "tel:", "javascript:", "sms:", "data:"];

/// Resolve a raw href against the page URL, returning an absolute URL with
/// the fragment stripped. `www.`-prefixed scheme-less hrefs are treated as
/// https rather than as relative paths.
fn resolve_href(raw: &str, base: Option<&Url>) -> Option<Url> {
    let raw = raw.trim();
    if raw.is_empty() || raw.starts_with('#') {
        return None;
    }
    let lower = raw.to_lowercase();
    if SKIPPED_SCHEMES.iter().any(|s| lower.starts_with(s)) {
        return None;
    }

    let mut parsed = if lower.starts_with("http://") || lower.starts_with("https://") {
        Url::parse(raw).ok()?
    } else if lower.starts_with("www.") {
        Url::parse(&format!("https://{raw}")).ok()?
    } else if raw.starts_with("//") {
        Url::parse(&format!("https:{raw}")).ok()?
    } else {
        base?.join(raw).ok()?
    };
    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }
    parsed.set_fragment(None);
    Some(parsed)
}

/// All anchor links in document order, resolved and deduplicated.
pub fn extract_anchor_links(html: &str, base_url: &str) -> Vec<Url> {
    let base = Url::parse(base_url).ok();
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for cap in ANCHOR_HREF_RE.captures_iter(html) {
        let raw = decode_entities(&cap[1]);
        if let Some(resolved) = resolve_href(&raw, base.as_ref()) {
            if seen.insert(resolved.to_string()) {
                links.push(resolved);
            }
        }
    }

    links
}

/// Classify the page's anchor links by platform. The first link in document
/// order wins for each platform; share widgets and bare domain roots never
/// match.
pub fn extract_platform_links(html: &str, base_url: &str) -> BTreeMap<PlatformKey, String> {
    let mut found = BTreeMap::new();
    for link in extract_anchor_links(html, base_url) {
        if let Some(platform) = PlatformKey::detect(&link) {
            found
                .entry(platform)
                .or_insert_with(|| platform.normalize_url(&link));
        }
    }
    found
}

/// Give a bare domain a scheme: "acme.example" -> "https://acme.example".
pub fn normalize_website(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let lower = trimmed.to_lowercase();
    let candidate = if lower.starts_with("http://") || lower.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed.trim_start_matches('/'))
    };
    let url = Url::parse(&candidate).ok()?;
    url.host_str()?;
    Some(url.to_string())
}

/// Fetch the business website and pull out platform links. Any failure
/// (unreachable, timeout, non-2xx, bad URL) yields an empty map.
pub async fn fetch_platform_links(
    fetcher: &dyn HttpFetcher,
    website: &str,
    timeout: Duration,
    max_body_bytes: usize,
) -> BTreeMap<PlatformKey, String> {
    let Some(url) = normalize_website(website) else {
        warn!(website, "Website URL is not usable, skipping extraction");
        return BTreeMap::new();
    };

    let request = FetchRequest::get(&url, timeout)
        .header("Accept", "text/html,application/xhtml+xml")
        .max_body_bytes(max_body_bytes);

    let response = match fetcher.fetch(request).await {
        Ok(resp) => resp,
        Err(e) => {
            warn!(url, error = %e, "Website fetch failed");
            return BTreeMap::new();
        }
    };
    if !response.is_success() {
        warn!(url, status = response.status, "Website returned non-success status");
        return BTreeMap::new();
    }

    // Relative links resolve against where redirects actually landed.
    let base = if response.final_url.is_empty() {
        url.as_str()
    } else {
        response.final_url.as_str()
    };
    let found = extract_platform_links(&response.body, base);
    info!(url, count = found.len(), "Extracted platform links from website");
    found
}

fn decode_entities(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }
    raw.replace("&amp;", "&")
        .replace("&#x2F;", "/")
        .replace("&#47;", "/")
        .replace("&quot;", "\"")
}
