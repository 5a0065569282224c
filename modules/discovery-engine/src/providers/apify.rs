use std::time::Duration;

use apify_client::{ApifyClient, OrganicResult};
use async_trait::async_trait;
use discovery_common::SearchResult;

use super::{suspension_key_for, PlatformQuery, SearchProvider};
use crate::error::ProviderError;

const RESULTS_PER_PAGE: u32 = 10;

/// Google results scraped by Apify's Google Search Scraper actor.
pub struct ApifySearch {
    client: ApifyClient,
    suspension_key: String,
    timeout: Duration,
}

impl ApifySearch {
    pub fn new(token: &str, timeout: Duration) -> Self {
        Self {
            client: ApifyClient::new(token.to_string()),
            suspension_key: suspension_key_for("apify", token),
            timeout,
        }
    }
}

fn to_search_result(r: OrganicResult) -> SearchResult {
    SearchResult {
        url: r.url,
        title: r.title.unwrap_or_default(),
        snippet: r.description.unwrap_or_default(),
    }
}

#[async_trait]
impl SearchProvider for ApifySearch {
    fn name(&self) -> &str {
        "apify"
    }

    fn suspension_key(&self) -> String {
        self.suspension_key.clone()
    }

    async fn search(&self, query: &PlatformQuery) -> Result<Vec<SearchResult>, ProviderError> {
        let results = self
            .client
            .google_search(&query.text, RESULTS_PER_PAGE, self.timeout)
            .await?;
        Ok(results.into_iter().map(to_search_result).collect())
    }
}
