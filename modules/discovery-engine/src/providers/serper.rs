use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use discovery_common::SearchResult;
use serde::Deserialize;
use tracing::info;

use super::{error_excerpt, suspension_key_for, PlatformQuery, SearchProvider};
use crate::error::ProviderError;
use crate::fetch::{FetchRequest, HttpFetcher};

const SERPER_URL: &str = "https://google.serper.dev/search";
const RESULTS_PER_QUERY: u32 = 10;

/// Google web search via serper.dev.
pub struct SerperSearch {
    fetcher: Arc<dyn HttpFetcher>,
    api_key: String,
    timeout: Duration,
}

impl SerperSearch {
    pub fn new(fetcher: Arc<dyn HttpFetcher>, api_key: &str, timeout: Duration) -> Self {
        Self {
            fetcher,
            api_key: api_key.to_string(),
            timeout,
        }
    }
}

#[derive(Deserialize)]
struct SerperResponse {
    #[serde(default)]
    organic: Vec<SerperResult>,
}

#[derive(Deserialize)]
struct SerperResult {
    link: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    snippet: String,
}

#[async_trait]
impl SearchProvider for SerperSearch {
    fn name(&self) -> &str {
        "serper"
    }

    fn suspension_key(&self) -> String {
        suspension_key_for("serper", &self.api_key)
    }

    async fn search(&self, query: &PlatformQuery) -> Result<Vec<SearchResult>, ProviderError> {
        let request = FetchRequest::post_json(
            SERPER_URL,
            serde_json::json!({ "q": query.text, "num": RESULTS_PER_QUERY }),
            self.timeout,
        )
        .header("X-API-KEY", &self.api_key);

        let resp = self.fetcher.fetch(request).await?;
        if !resp.is_success() {
            return Err(ProviderError::from_status(resp.status, error_excerpt(&resp.body)));
        }

        let parsed: SerperResponse = resp.json()?;
        let results: Vec<SearchResult> = parsed
            .organic
            .into_iter()
            .map(|r| SearchResult {
                url: r.link,
                title: r.title,
                snippet: r.snippet,
            })
            .collect();

        info!(query = %query.text, count = results.len(), "Serper search complete");
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockFetcher;
    use discovery_common::{BusinessQuery, PlatformKey};

    fn query() -> PlatformQuery {
        PlatformQuery::new(PlatformKey::Instagram, &BusinessQuery::new("Acme Cafe"))
    }

    #[tokio::test]
    async fn parses_organic_results_and_sends_key() {
        let fetcher = Arc::new(MockFetcher::new().on_post(
            SERPER_URL,
            200,
            r#"{"organic":[{"link":"https://www.instagram.com/acmecafe/","title":"Acme Cafe","snippet":"Coffee"},{"link":"https://acme.example"}]}"#,
        ));
        let provider = SerperSearch::new(fetcher.clone(), "secret", Duration::from_secs(10));

        let results = provider.search(&query()).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].url, "https://www.instagram.com/acmecafe/");
        assert_eq!(results[1].title, "");

        let sent = fetcher.requests();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].headers.contains(&("X-API-KEY".to_string(), "secret".to_string())));
        assert_eq!(sent[0].json.as_ref().unwrap()["q"], "Acme Cafe Instagram");
    }

    #[tokio::test]
    async fn rate_limit_is_quota_exhaustion() {
        let fetcher = Arc::new(MockFetcher::new().on_post(SERPER_URL, 429, "Too many requests"));
        let provider = SerperSearch::new(fetcher, "k", Duration::from_secs(10));
        let err = provider.search(&query()).await.unwrap_err();
        assert!(err.suspends_provider());
    }

    #[tokio::test]
    async fn malformed_body_is_parse_error() {
        let fetcher = Arc::new(MockFetcher::new().on_post(SERPER_URL, 200, "<html>oops</html>"));
        let provider = SerperSearch::new(fetcher, "k", Duration::from_secs(10));
        assert!(matches!(provider.search(&query()).await, Err(ProviderError::Parse(_))));
    }

    #[tokio::test]
    async fn missing_organic_is_empty() {
        let fetcher = Arc::new(MockFetcher::new().on_post(SERPER_URL, 200, r#"{"searchParameters":{}}"#));
        let provider = SerperSearch::new(fetcher, "k", Duration::from_secs(10));
        assert!(provider.search(&query()).await.unwrap().is_empty());
    }
}
