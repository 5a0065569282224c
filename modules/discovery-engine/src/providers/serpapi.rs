use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use discovery_common::SearchResult;
use serde::Deserialize;
use tracing::info;

use super::{error_excerpt, suspension_key_for, PlatformQuery, SearchProvider};
use crate::error::ProviderError;
use crate::fetch::{FetchRequest, HttpFetcher};

const SERPAPI_URL: &str = "https://serpapi.com/search.json";

/// Google results through SerpAPI.
pub struct SerpApiSearch {
    fetcher: Arc<dyn HttpFetcher>,
    api_key: String,
    timeout: Duration,
}

impl SerpApiSearch {
    pub fn new(fetcher: Arc<dyn HttpFetcher>, api_key: &str, timeout: Duration) -> Self {
        Self {
            fetcher,
            api_key: api_key.to_string(),
            timeout,
        }
    }

    fn request_url(&self, text: &str) -> String {
        let params: String = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("engine", "google")
            .append_pair("q", text)
            .append_pair("num", "10")
            .append_pair("api_key", &self.api_key)
            .finish();
        format!("{SERPAPI_URL}?{params}")
    }
}

#[derive(Deserialize)]
struct SerpApiResponse {
    #[serde(default)]
    organic_results: Vec<SerpApiResult>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct SerpApiResult {
    link: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    snippet: String,
}

/// SerpAPI reports some failures in-band with HTTP 200.
fn classify_error(message: &str) -> Option<ProviderError> {
    let lower = message.to_lowercase();
    if lower.contains("hasn't returned any results") || lower.contains("no results") {
        return None;
    }
    if lower.contains("run out of searches")
        || lower.contains("invalid api key")
        || lower.contains("account")
        || lower.contains("limit")
    {
        return Some(ProviderError::QuotaExhausted(message.to_string()));
    }
    Some(ProviderError::Api {
        status: 200,
        message: message.to_string(),
    })
}

#[async_trait]
impl SearchProvider for SerpApiSearch {
    fn name(&self) -> &str {
        "serpapi"
    }

    fn suspension_key(&self) -> String {
        suspension_key_for("serpapi", &self.api_key)
    }

    async fn search(&self, query: &PlatformQuery) -> Result<Vec<SearchResult>, ProviderError> {
        let request = FetchRequest::get(self.request_url(&query.text), self.timeout);
        let resp = self.fetcher.fetch(request).await?;

        // Error bodies are JSON too; prefer the in-band message when present.
        if !resp.is_success() {
            let message = resp
                .json::<SerpApiResponse>()
                .ok()
                .and_then(|r| r.error)
                .unwrap_or_else(|| error_excerpt(&resp.body));
            return Err(ProviderError::from_status(resp.status, message));
        }

        let parsed: SerpApiResponse = resp.json()?;
        if let Some(ref message) = parsed.error {
            match classify_error(message) {
                Some(err) => return Err(err),
                None => return Ok(Vec::new()),
            }
        }

        let results: Vec<SearchResult> = parsed
            .organic_results
            .into_iter()
            .map(|r| SearchResult {
                url: r.link,
                title: r.title,
                snippet: r.snippet,
            })
            .collect();

        info!(query = %query.text, count = results.len(), "SerpAPI search complete");
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockFetcher;
    use discovery_common::{BusinessQuery, PlatformKey};

    fn query() -> PlatformQuery {
        PlatformQuery::new(
            PlatformKey::Trustpilot,
            &BusinessQuery::new("Acme Cafe").with_address("London"),
        )
    }

    fn provider(fetcher: MockFetcher) -> SerpApiSearch {
        SerpApiSearch::new(Arc::new(fetcher), "key", Duration::from_secs(10))
    }

    #[test]
    fn request_url_encodes_query() {
        let p = provider(MockFetcher::new());
        assert_eq!(
            p.request_url("Acme Cafe Trustpilot London"),
            "https://serpapi.com/search.json?engine=google&q=Acme+Cafe+Trustpilot+London&num=10&api_key=key"
        );
    }

    #[tokio::test]
    async fn parses_organic_results() {
        let p = provider(MockFetcher::new());
        let url = p.request_url(&query().text);
        let p = provider(MockFetcher::new().on_get(
            &url,
            200,
            r#"{"organic_results":[{"link":"https://www.trustpilot.com/review/acme.example","title":"Acme Cafe Reviews","snippet":"London"}]}"#,
        ));
        let results = p.search(&query()).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].url, "https://www.trustpilot.com/review/acme.example");
    }

    #[tokio::test]
    async fn out_of_searches_is_quota_exhaustion() {
        let url = provider(MockFetcher::new()).request_url(&query().text);
        let p = provider(MockFetcher::new().on_get(
            &url,
            200,
            r#"{"error":"Your account has run out of searches."}"#,
        ));
        assert!(p.search(&query()).await.unwrap_err().suspends_provider());

        let p = provider(MockFetcher::new().on_get(&url, 401, r#"{"error":"Invalid API key."}"#));
        assert!(p.search(&query()).await.unwrap_err().suspends_provider());
    }

    #[tokio::test]
    async fn empty_results_message_is_not_an_error() {
        let url = provider(MockFetcher::new()).request_url(&query().text);
        let p = provider(MockFetcher::new().on_get(
            &url,
            200,
            r#"{"error":"Google hasn't returned any results for this query."}"#,
        ));
        assert!(p.search(&query()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn server_error_is_retryable() {
        let url = provider(MockFetcher::new()).request_url(&query().text);
        let p = provider(MockFetcher::new().on_get(&url, 503, "unavailable"));
        assert!(p.search(&query()).await.unwrap_err().is_retryable());
    }
}
