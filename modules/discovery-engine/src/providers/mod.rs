//! Search provider adapters.
//!
//! Each adapter turns a [`PlatformQuery`] into a list of [`SearchResult`]s.
//! Wire shapes stay inside the adapter; the orchestrator only sees the
//! uniform trait and [`ProviderError`].

pub mod apify;
pub mod browserless;
pub mod llm;
pub mod serpapi;
pub mod serper;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use discovery_common::{
    BusinessQuery, DiscoveryConfig, PlatformKey, ProviderCredentials, SearchResult, CONFIDENCE_SEARCH,
};
use sha2::{Digest, Sha256};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{FetchError, ProviderError};
use crate::fetch::HttpFetcher;

pub use apify::ApifySearch;
pub use browserless::BrowserlessSearch;
pub use llm::LlmLookup;
pub use serpapi::SerpApiSearch;
pub use serper::SerperSearch;

// ---------------------------------------------------------------------------
// Query
// ---------------------------------------------------------------------------

/// One platform lookup for one business.
#[derive(Debug, Clone)]
pub struct PlatformQuery {
    pub platform: PlatformKey,
    /// "<name> <platform label> <address>"
    pub text: String,
    pub business: BusinessQuery,
}

impl PlatformQuery {
    pub fn new(platform: PlatformKey, business: &BusinessQuery) -> Self {
        let mut text = format!("{} {}", business.name.trim(), platform.label());
        if let Some(address) = business.address_str() {
            text.push(' ');
            text.push_str(address);
        }
        Self {
            platform,
            text,
            business: business.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Stable adapter name, recorded as the result source.
    fn name(&self) -> &str;

    /// Key under which quota exhaustion is tracked: adapter name plus a
    /// fingerprint of the credential in use.
    fn suspension_key(&self) -> String;

    fn confidence(&self) -> f32 {
        CONFIDENCE_SEARCH
    }

    /// Hits must answer a HEAD request before they are accepted. Such
    /// providers bypass the relevance bar.
    fn requires_liveness_check(&self) -> bool {
        false
    }

    async fn search(&self, query: &PlatformQuery) -> Result<Vec<SearchResult>, ProviderError>;
}

/// Short, non-reversible fingerprint of a secret.
pub fn credential_fingerprint(secret: &str) -> String {
    let digest = Sha256::digest(secret.as_bytes());
    hex::encode(&digest[..6])
}

pub(crate) fn suspension_key_for(name: &str, secret: &str) -> String {
    format!("{name}:{}", credential_fingerprint(secret))
}

impl From<FetchError> for ProviderError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Timeout => ProviderError::Timeout,
            FetchError::Network(m) => ProviderError::Network(m),
            FetchError::InvalidUrl(m) => ProviderError::Api { status: 0, message: m },
        }
    }
}

/// Truncated response body for error messages.
pub(crate) fn error_excerpt(body: &str) -> String {
    ai_client::truncate_to_char_boundary(body.trim(), 300).to_string()
}

// ---------------------------------------------------------------------------
// Suspensions
// ---------------------------------------------------------------------------

/// Process-wide registry of providers that reported an exhausted quota.
/// Suspended providers are skipped for every platform and every later run
/// until the cooldown lapses.
pub struct ProviderSuspensions {
    until: DashMap<String, Instant>,
    cooldown: Duration,
}

impl ProviderSuspensions {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            until: DashMap::new(),
            cooldown,
        }
    }

    pub fn is_suspended(&self, key: &str) -> bool {
        let now = Instant::now();
        match self.until.get(key) {
            None => return false,
            Some(until) if *until > now => return true,
            Some(_) => {}
        }
        self.until.remove_if(key, |_, until| *until <= now);
        false
    }

    pub fn suspend(&self, key: &str, reason: &ProviderError) {
        let until = Instant::now() + self.cooldown;
        self.until.insert(key.to_string(), until);
        warn!(
            provider = key,
            cooldown_secs = self.cooldown.as_secs(),
            error = %reason,
            "Provider suspended"
        );
    }

    pub fn active_count(&self) -> usize {
        let now = Instant::now();
        self.until.iter().filter(|e| *e.value() > now).count()
    }

    pub fn clear(&self) {
        self.until.clear();
    }
}

// ---------------------------------------------------------------------------
// Factory
// ---------------------------------------------------------------------------

/// Builds the provider chain for one call from that call's credentials.
pub trait ProviderFactory: Send + Sync {
    /// Providers in priority order. A missing credential omits its provider.
    fn providers(&self, credentials: &ProviderCredentials) -> Vec<Arc<dyn SearchProvider>>;
}

/// Production chain: serper, serpapi, apify, browserless, then the LLM.
pub struct HttpProviderFactory {
    fetcher: Arc<dyn HttpFetcher>,
    config: Arc<DiscoveryConfig>,
}

impl HttpProviderFactory {
    pub fn new(fetcher: Arc<dyn HttpFetcher>, config: Arc<DiscoveryConfig>) -> Self {
        Self { fetcher, config }
    }
}

impl ProviderFactory for HttpProviderFactory {
    fn providers(&self, credentials: &ProviderCredentials) -> Vec<Arc<dyn SearchProvider>> {
        let timeout = self.config.provider_timeout;
        let mut chain: Vec<Arc<dyn SearchProvider>> = Vec::new();

        if let Some(ref key) = credentials.serper_api_key {
            chain.push(Arc::new(SerperSearch::new(self.fetcher.clone(), key, timeout)));
        }
        if let Some(ref key) = credentials.serpapi_key {
            chain.push(Arc::new(SerpApiSearch::new(self.fetcher.clone(), key, timeout)));
        }
        if let Some(ref token) = credentials.apify_token {
            chain.push(Arc::new(ApifySearch::new(token, timeout)));
        }
        if let Some(ref url) = credentials.browserless_url {
            match BrowserlessSearch::new(url, credentials.browserless_token.as_deref(), timeout) {
                Ok(provider) => chain.push(Arc::new(provider)),
                Err(e) => warn!(error = %e, "Browserless provider unavailable"),
            }
        }
        if let Some(ref key) = credentials.openai_api_key {
            chain.push(Arc::new(LlmLookup::new(key, &self.config.llm_model, timeout)));
        }

        if chain.is_empty() {
            debug!("No search provider credentials supplied");
        } else {
            info!(
                providers = %chain.iter().map(|p| p.name()).collect::<Vec<_>>().join(","),
                "Search provider chain"
            );
        }
        chain
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockFetcher;

    #[test]
    fn query_text_includes_label_and_address() {
        let business = BusinessQuery::new(" Acme Cafe ").with_address("London");
        let q = PlatformQuery::new(PlatformKey::Tiktok, &business);
        assert_eq!(q.text, "Acme Cafe TikTok London");

        let q = PlatformQuery::new(PlatformKey::Google, &BusinessQuery::new("Acme Cafe"));
        assert_eq!(q.text, "Acme Cafe Google Reviews");
    }

    #[test]
    fn fingerprints_differ_per_credential_and_hide_secret() {
        let a = suspension_key_for("serper", "key-one");
        let b = suspension_key_for("serper", "key-two");
        assert_ne!(a, b);
        assert!(a.starts_with("serper:"));
        assert!(!a.contains("key-one"));
        assert_eq!(credential_fingerprint("key-one").len(), 12);
    }

    #[tokio::test(start_paused = true)]
    async fn suspension_lapses_after_cooldown() {
        let suspensions = ProviderSuspensions::new(Duration::from_secs(3600));
        suspensions.suspend("serper:abc", &ProviderError::QuotaExhausted("429".into()));
        assert!(suspensions.is_suspended("serper:abc"));
        assert!(!suspensions.is_suspended("serper:def"));
        assert_eq!(suspensions.active_count(), 1);

        tokio::time::advance(Duration::from_secs(3601)).await;
        assert!(!suspensions.is_suspended("serper:abc"));
        assert_eq!(suspensions.active_count(), 0);
    }

    #[test]
    fn factory_skips_missing_credentials() {
        let factory = HttpProviderFactory::new(
            Arc::new(MockFetcher::new()),
            Arc::new(DiscoveryConfig::default()),
        );
        assert!(factory.providers(&ProviderCredentials::default()).is_empty());

        let creds = ProviderCredentials {
            serpapi_key: Some("s".into()),
            openai_api_key: Some("o".into()),
            ..Default::default()
        };
        let names: Vec<String> = factory
            .providers(&creds)
            .iter()
            .map(|p| p.name().to_string())
            .collect();
        assert_eq!(names, vec!["serpapi", "openai"]);
    }

    #[test]
    fn factory_keeps_priority_order() {
        let factory = HttpProviderFactory::new(
            Arc::new(MockFetcher::new()),
            Arc::new(DiscoveryConfig::default()),
        );
        let creds = ProviderCredentials {
            serper_api_key: Some("a".into()),
            serpapi_key: Some("b".into()),
            apify_token: Some("c".into()),
            browserless_url: Some("http://localhost:3000".into()),
            browserless_token: None,
            openai_api_key: Some("d".into()),
        };
        let names: Vec<String> = factory
            .providers(&creds)
            .iter()
            .map(|p| p.name().to_string())
            .collect();
        assert_eq!(names, vec!["serper", "serpapi", "apify", "browserless", "openai"]);
    }
}
