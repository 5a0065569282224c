use serde::{Deserialize, Serialize};

// --- Google search scraper types ---

/// Input for the apify/google-search-scraper actor.
#[derive(Debug, Clone, Serialize)]
pub struct GoogleSearchInput {
    /// Newline-separated queries; the engine always sends exactly one.
    pub queries: String,
    #[serde(rename = "maxPagesPerQuery")]
    pub max_pages_per_query: u32,
    #[serde(rename = "resultsPerPage")]
    pub results_per_page: u32,
    #[serde(rename = "countryCode", skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
    #[serde(rename = "saveHtml")]
    pub save_html: bool,
}

impl GoogleSearchInput {
    pub fn single(query: impl Into<String>, results_per_page: u32) -> Self {
        Self {
            queries: query.into(),
            max_pages_per_query: 1,
            results_per_page,
            country_code: None,
            save_html: false,
        }
    }
}

/// One dataset item: a results page for a single query.
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleSearchPage {
    #[serde(rename = "searchQuery", default)]
    pub search_query: Option<SearchQueryInfo>,
    #[serde(rename = "organicResults", default)]
    pub organic_results: Vec<OrganicResult>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchQueryInfo {
    #[serde(default)]
    pub term: Option<String>,
}

/// A single organic hit on a Google results page.
#[derive(Debug, Clone, Deserialize)]
pub struct OrganicResult {
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}
