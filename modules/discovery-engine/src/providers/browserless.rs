use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use browserless_client::{BrowserlessClient, BrowserlessError, ContentRequest};
use discovery_common::SearchResult;
use regex::Regex;
use tracing::info;
use url::Url;

use super::{suspension_key_for, PlatformQuery, SearchProvider};
use crate::error::ProviderError;

const RESULTS_PAGE: &str = "https://html.duckduckgo.com/html/";

static ANCHOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?is)<a\b([^>]*)>(.*?)</a>"#).expect("valid regex"));
static HREF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)\bhref\s*=\s*["']([^"']+)["']"#).expect("valid regex"));
static CLASS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)\bclass\s*=\s*["']([^"']+)["']"#).expect("valid regex"));
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").expect("valid regex"));

/// Renders a DuckDuckGo HTML results page in a managed browser and reads
/// the organic results off it.
pub struct BrowserlessSearch {
    client: BrowserlessClient,
    suspension_key: String,
    timeout: Duration,
}

impl BrowserlessSearch {
    pub fn new(base_url: &str, token: Option<&str>, timeout: Duration) -> Result<Self, BrowserlessError> {
        let client = BrowserlessClient::with_timeout(base_url, token, timeout)?;
        let credential = token.unwrap_or(base_url);
        Ok(Self {
            client,
            suspension_key: suspension_key_for("browserless", credential),
            timeout,
        })
    }
}

fn results_page_url(text: &str) -> String {
    let q: String = url::form_urlencoded::byte_serialize(text.as_bytes()).collect();
    format!("{RESULTS_PAGE}?q={q}")
}

/// Result links point at a DuckDuckGo redirect carrying the target in `uddg`.
fn decode_result_href(raw: &str) -> Option<String> {
    let raw = raw.replace("&amp;", "&");
    let base = Url::parse("https://duckduckgo.com/").ok()?;
    let url = base.join(&raw).ok()?;

    let is_ddg = url
        .host_str()
        .map(|h| h == "duckduckgo.com" || h.ends_with(".duckduckgo.com"))
        .unwrap_or(false);
    if !is_ddg {
        return matches!(url.scheme(), "http" | "https").then(|| url.to_string());
    }

    url.query_pairs()
        .find(|(k, _)| k == "uddg")
        .map(|(_, v)| v.into_owned())
        .filter(|target| target.starts_with("http://") || target.starts_with("https://"))
}

fn text_content(html: &str) -> String {
    let stripped = TAG_RE.replace_all(html, "");
    stripped
        .replace("&amp;", "&")
        .replace("&#x27;", "'")
        .replace("&#39;", "'")
        .replace("&quot;", "\"")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse organic results from DuckDuckGo's HTML endpoint. Snippet anchors
/// follow their result anchor; ads (links without a `uddg` target) are skipped.
pub(crate) fn parse_results_page(html: &str) -> Vec<SearchResult> {
    let mut results: Vec<SearchResult> = Vec::new();
    let mut last_was_result = false;

    for cap in ANCHOR_RE.captures_iter(html) {
        let attrs = &cap[1];
        let Some(class) = CLASS_RE.captures(attrs).map(|c| c[1].to_string()) else {
            continue;
        };
        let classes: Vec<&str> = class.split_whitespace().collect();

        if classes.contains(&"result__a") {
            last_was_result = false;
            let Some(href) = HREF_RE.captures(attrs).map(|c| c[1].to_string()) else {
                continue;
            };
            if let Some(url) = decode_result_href(&href) {
                results.push(SearchResult {
                    url,
                    title: text_content(&cap[2]),
                    snippet: String::new(),
                });
                last_was_result = true;
            }
        } else if classes.contains(&"result__snippet") && last_was_result {
            if let Some(last) = results.last_mut() {
                last.snippet = text_content(&cap[2]);
            }
            last_was_result = false;
        }
    }

    results
}

#[async_trait]
impl SearchProvider for BrowserlessSearch {
    fn name(&self) -> &str {
        "browserless"
    }

    fn suspension_key(&self) -> String {
        self.suspension_key.clone()
    }

    async fn search(&self, query: &PlatformQuery) -> Result<Vec<SearchResult>, ProviderError> {
        let request = ContentRequest::new(results_page_url(&query.text))
            .markup_only()
            .navigation_timeout(self.timeout);
        let html = self.client.render(&request).await?;

        let results = parse_results_page(&html);
        info!(query = %query.text, count = results.len(), "Browserless search complete");
        Ok(results)
    }
}
