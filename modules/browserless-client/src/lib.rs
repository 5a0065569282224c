pub mod error;

pub use error::{BrowserlessError, Result};

use serde::Serialize;
use std::time::Duration;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub struct BrowserlessClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

/// Body of a `/content` call. Only the fields the engine needs are modelled.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentRequest {
    pub url: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub reject_resource_types: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goto_options: Option<GotoOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wait_for_selector: Option<WaitForSelector>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GotoOptions {
    pub wait_until: String,
    pub timeout: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct WaitForSelector {
    pub selector: String,
    pub timeout: u64,
}

impl ContentRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            reject_resource_types: Vec::new(),
            goto_options: None,
            wait_for_selector: None,
        }
    }

    /// Skip images, stylesheets, fonts and media. Result pages only need markup.
    pub fn markup_only(mut self) -> Self {
        self.reject_resource_types = ["image", "stylesheet", "font", "media"]
            .into_iter()
            .map(String::from)
            .collect();
        self
    }

    pub fn navigation_timeout(mut self, timeout: Duration) -> Self {
        self.goto_options = Some(GotoOptions {
            wait_until: "domcontentloaded".to_string(),
            timeout: timeout.as_millis() as u64,
        });
        self
    }

    pub fn wait_for(mut self, selector: impl Into<String>, timeout: Duration) -> Self {
        self.wait_for_selector = Some(WaitForSelector {
            selector: selector.into(),
            timeout: timeout.as_millis() as u64,
        });
        self
    }
}

impl BrowserlessClient {
    pub fn new(base_url: &str, token: Option<&str>) -> Result<Self> {
        Self::with_timeout(base_url, token, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, token: Option<&str>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.map(String::from),
        })
    }

    fn content_endpoint(&self) -> String {
        let mut endpoint = format!("{}/content", self.base_url);
        if let Some(ref token) = self.token {
            let encoded: String = url::form_urlencoded::byte_serialize(token.as_bytes()).collect();
            endpoint.push_str(&format!("?token={encoded}"));
        }
        endpoint
    }

    /// Fetch fully-rendered HTML content for a URL via Browserless /content endpoint.
    pub async fn content(&self, url: &str) -> Result<String> {
        self.render(&ContentRequest::new(url)).await
    }

    /// Render a page with explicit navigation options and return its HTML.
    pub async fn render(&self, request: &ContentRequest) -> Result<String> {
        tracing::debug!(url = %request.url, "Browserless content request");

        let resp = self
            .client
            .post(self.content_endpoint())
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(BrowserlessError::from_send)?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(BrowserlessError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(resp.text().await?)
    }
}
