pub mod error;
pub mod types;

pub use error::{ApifyError, Result};
pub use types::{GoogleSearchInput, GoogleSearchPage, OrganicResult, SearchQueryInfo};

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

const BASE_URL: &str = "https://api.apify.com/v2";

/// Actor ID for apify/google-search-scraper.
const GOOGLE_SEARCH_SCRAPER: &str = "apify~google-search-scraper";

pub struct ApifyClient {
    client: reqwest::Client,
    token: String,
    base_url: String,
}

impl ApifyClient {
    pub fn new(token: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            token,
            base_url: BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    fn run_sync_url(&self, actor: &str, timeout: Duration) -> String {
        format!(
            "{}/acts/{}/run-sync-get-dataset-items?timeout={}",
            self.base_url,
            actor,
            timeout.as_secs().max(1)
        )
    }

    /// Run an actor synchronously and return its dataset items. Apify keeps
    /// the HTTP request open until the run finishes or `timeout` lapses.
    pub async fn run_sync<I, T>(&self, actor: &str, input: &I, timeout: Duration) -> Result<Vec<T>>
    where
        I: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.run_sync_url(actor, timeout);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(input)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ApifyError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let text = resp.text().await?;
        let items: Vec<T> = serde_json::from_str(&text)?;
        Ok(items)
    }

    /// Run one Google query through the search scraper actor and return the
    /// organic results of its first page.
    pub async fn google_search(
        &self,
        query: &str,
        results_per_page: u32,
        timeout: Duration,
    ) -> Result<Vec<OrganicResult>> {
        tracing::info!(query, "Starting Apify Google search");

        let input = GoogleSearchInput::single(query, results_per_page);
        let pages: Vec<GoogleSearchPage> = self
            .run_sync(GOOGLE_SEARCH_SCRAPER, &input, timeout)
            .await?;

        let results: Vec<OrganicResult> = pages
            .into_iter()
            .flat_map(|p| p.organic_results)
            .collect();
        tracing::info!(count = results.len(), "Fetched Apify Google results");

        Ok(results)
    }
}
