use std::env;
use std::str::FromStr;
use std::time::Duration;

use tracing::{info, warn};

/// A desktop Chrome user agent. Several platforms serve bot-walls or 403s to
/// obviously scripted clients.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Smallest gap the batch runner will leave between businesses.
pub const MIN_BATCH_DELAY: Duration = Duration::from_millis(500);

/// Tunables for the discovery engine. `Default` holds production values;
/// `from_env` layers optional `DISCOVERY_*` overrides on top.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    // Timeouts
    pub website_timeout: Duration,
    pub verify_timeout: Duration,
    pub provider_timeout: Duration,
    pub cache_timeout: Duration,

    // Limits
    pub max_body_bytes: usize,
    pub max_concurrency: usize,
    pub network_retries: u32,
    pub retry_base_delay: Duration,

    // Cache TTLs
    pub verification_ttl: Duration,
    pub discovery_ttl: Duration,

    /// How long a provider stays suspended after reporting an exhausted quota.
    pub provider_cooldown: Duration,

    // Batch pacing
    pub batch_delay: Duration,
    pub batch_item_timeout: Duration,

    /// Minimum relevance score for a search hit to be accepted.
    pub min_relevance: f32,

    pub user_agent: String,
    pub llm_model: String,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            website_timeout: Duration::from_secs(8),
            verify_timeout: Duration::from_secs(3),
            provider_timeout: Duration::from_secs(10),
            cache_timeout: Duration::from_millis(500),
            max_body_bytes: 512 * 1024,
            max_concurrency: 4,
            network_retries: 2,
            retry_base_delay: Duration::from_millis(250),
            verification_ttl: Duration::from_secs(60 * 60),
            discovery_ttl: Duration::from_secs(30 * 24 * 60 * 60),
            provider_cooldown: Duration::from_secs(60 * 60),
            batch_delay: Duration::from_secs(1),
            batch_item_timeout: Duration::from_secs(120),
            min_relevance: 0.5,
            user_agent: BROWSER_USER_AGENT.to_string(),
            llm_model: "gpt-4o-mini".to_string(),
        }
    }
}

impl DiscoveryConfig {
    /// Load configuration from environment variables, keeping defaults for
    /// anything unset or unparseable.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            website_timeout: env_millis("DISCOVERY_WEBSITE_TIMEOUT_MS", d.website_timeout),
            verify_timeout: env_millis("DISCOVERY_VERIFY_TIMEOUT_MS", d.verify_timeout),
            provider_timeout: env_millis("DISCOVERY_PROVIDER_TIMEOUT_MS", d.provider_timeout),
            cache_timeout: env_millis("DISCOVERY_CACHE_TIMEOUT_MS", d.cache_timeout),
            max_body_bytes: env_parse("DISCOVERY_MAX_BODY_BYTES", d.max_body_bytes),
            max_concurrency: env_parse("DISCOVERY_MAX_CONCURRENCY", d.max_concurrency).max(1),
            network_retries: env_parse("DISCOVERY_NETWORK_RETRIES", d.network_retries),
            retry_base_delay: env_millis("DISCOVERY_RETRY_BASE_DELAY_MS", d.retry_base_delay),
            verification_ttl: env_secs("DISCOVERY_VERIFICATION_TTL_SECS", d.verification_ttl),
            discovery_ttl: env_secs("DISCOVERY_CACHE_TTL_SECS", d.discovery_ttl),
            provider_cooldown: env_secs("DISCOVERY_PROVIDER_COOLDOWN_SECS", d.provider_cooldown),
            batch_delay: env_millis("DISCOVERY_BATCH_DELAY_MS", d.batch_delay),
            batch_item_timeout: env_secs("DISCOVERY_BATCH_ITEM_TIMEOUT_SECS", d.batch_item_timeout),
            min_relevance: env_parse("DISCOVERY_MIN_RELEVANCE", d.min_relevance).clamp(0.0, 1.0),
            user_agent: env::var("DISCOVERY_USER_AGENT").unwrap_or(d.user_agent),
            llm_model: env::var("DISCOVERY_LLM_MODEL").unwrap_or(d.llm_model),
        }
    }

    /// Batch delay with the floor applied.
    pub fn effective_batch_delay(&self) -> Duration {
        self.batch_delay.max(MIN_BATCH_DELAY)
    }
}

/// Per-call credentials for the search providers. A missing credential
/// disables the corresponding adapter for that call.
#[derive(Clone, Default)]
pub struct ProviderCredentials {
    pub serper_api_key: Option<String>,
    pub serpapi_key: Option<String>,
    pub apify_token: Option<String>,
    pub browserless_url: Option<String>,
    pub browserless_token: Option<String>,
    pub openai_api_key: Option<String>,
}

impl ProviderCredentials {
    pub fn from_env() -> Self {
        Self {
            serper_api_key: optional_env("SERPER_API_KEY"),
            serpapi_key: optional_env("SERPAPI_KEY"),
            apify_token: optional_env("APIFY_API_TOKEN"),
            browserless_url: optional_env("BROWSERLESS_URL"),
            browserless_token: optional_env("BROWSERLESS_TOKEN"),
            openai_api_key: optional_env("OPENAI_API_KEY"),
        }
    }

    /// No adapter can run.
    pub fn is_empty(&self) -> bool {
        self.serper_api_key.is_none()
            && self.serpapi_key.is_none()
            && self.apify_token.is_none()
            && self.browserless_url.is_none()
            && self.openai_api_key.is_none()
    }

    /// Log which providers are configured without revealing any secret.
    pub fn log_redacted(&self) {
        info!(
            serper = self.serper_api_key.is_some(),
            serpapi = self.serpapi_key.is_some(),
            apify = self.apify_token.is_some(),
            browserless = self.browserless_url.is_some(),
            openai = self.openai_api_key.is_some(),
            "Search provider credentials"
        );
    }
}

impl std::fmt::Debug for ProviderCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn redact(v: &Option<String>) -> &'static str {
            if v.is_some() {
                "<redacted>"
            } else {
                "<unset>"
            }
        }
        f.debug_struct("ProviderCredentials")
            .field("serper_api_key", &redact(&self.serper_api_key))
            .field("serpapi_key", &redact(&self.serpapi_key))
            .field("apify_token", &redact(&self.apify_token))
            .field("browserless_url", &self.browserless_url)
            .field("browserless_token", &redact(&self.browserless_token))
            .field("openai_api_key", &redact(&self.openai_api_key))
            .finish()
    }
}

fn optional_env(key: &str) -> Option<String> {
    env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => match raw.trim().parse() {
            Ok(v) => v,
            Err(_) => {
                warn!(key, value = %raw, "Invalid value, using default");
                default
            }
        },
        Err(_) => default,
    }
}

fn env_millis(key: &str, default: Duration) -> Duration {
    Duration::from_millis(env_parse(key, default.as_millis() as u64))
}

fn env_secs(key: &str, default: Duration) -> Duration {
    Duration::from_secs(env_parse(key, default.as_secs()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_delay_has_a_floor() {
        let config = DiscoveryConfig {
            batch_delay: Duration::from_millis(10),
            ..Default::default()
        };
        assert_eq!(config.effective_batch_delay(), MIN_BATCH_DELAY);

        let config = DiscoveryConfig::default();
        assert_eq!(config.effective_batch_delay(), Duration::from_secs(1));
    }

    #[test]
    fn debug_output_hides_secrets() {
        let creds = ProviderCredentials {
            serper_api_key: Some("sk-very-secret".into()),
            ..Default::default()
        };
        let rendered = format!("{creds:?}");
        assert!(!rendered.contains("sk-very-secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn empty_credentials() {
        assert!(ProviderCredentials::default().is_empty());
        let creds = ProviderCredentials {
            openai_api_key: Some("k".into()),
            ..Default::default()
        };
        assert!(!creds.is_empty());
    }
}
