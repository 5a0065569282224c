use std::sync::Arc;

use discovery_common::{BusinessQuery, DiscoveryConfig, DiscoveryError, DiscoveryResult, ProviderCredentials};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::batch::{self, BatchOptions, BatchReport};
use crate::cache::{
    CacheSettings, CacheStats, CacheToggle, DiscoveryCache, KeyValueStore, MemoryStore, VerificationCache,
};
use crate::error::FetchError;
use crate::fetch::{HttpFetcher, ReqwestFetcher};
use crate::guesser::Guesser;
use crate::orchestrator::Orchestrator;
use crate::providers::{HttpProviderFactory, ProviderFactory, ProviderSuspensions};

/// Per-call switches.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscoveryOptions {
    /// Place id and website links only. No guesses, no provider calls.
    pub website_only: bool,
    /// Skip the discovery cache read. The fresh result is still written.
    pub bypass_cache: bool,
}

/// Public entry point: owns the caches, the provider suspension registry and
/// the HTTP client, and runs lookups through the [`Orchestrator`].
pub struct DiscoveryEngine {
    config: Arc<DiscoveryConfig>,
    verification_cache: Arc<VerificationCache>,
    discovery_cache: DiscoveryCache,
    suspensions: Arc<ProviderSuspensions>,
    provider_factory: Arc<dyn ProviderFactory>,
    orchestrator: Orchestrator,
}

impl DiscoveryEngine {
    /// Engine with in-memory caches, a real HTTP client and the default
    /// provider chain.
    pub fn new(config: DiscoveryConfig) -> Result<Self, FetchError> {
        Self::builder().config(config).build()
    }

    pub fn builder() -> DiscoveryEngineBuilder {
        DiscoveryEngineBuilder::default()
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    pub fn suspensions(&self) -> &ProviderSuspensions {
        &self.suspensions
    }

    pub async fn discover(
        &self,
        query: &BusinessQuery,
        credentials: &ProviderCredentials,
    ) -> Result<DiscoveryResult, DiscoveryError> {
        self.discover_with_options(query, credentials, DiscoveryOptions::default())
            .await
    }

    pub async fn discover_with_options(
        &self,
        query: &BusinessQuery,
        credentials: &ProviderCredentials,
        options: DiscoveryOptions,
    ) -> Result<DiscoveryResult, DiscoveryError> {
        if query.name.trim().is_empty() {
            return Err(DiscoveryError::InvalidInput("business name is empty".into()));
        }

        if options.bypass_cache {
            debug!(business = %query.name, "Bypassing discovery cache read");
        } else if let Some(cached) = self.discovery_cache.get(query, options.website_only).await {
            info!(business = %query.name, found = cached.found_count, "Serving cached discovery result");
            return Ok(cached);
        }

        let providers = if options.website_only {
            Vec::new()
        } else {
            self.provider_factory.providers(credentials)
        };

        let result = self
            .orchestrator
            .run(query, &providers, options.website_only)
            .await;

        self.discovery_cache
            .put(query, options.website_only, &result)
            .await;
        Ok(result)
    }

    /// Race the lookup against `cancel`. On cancellation the lookup future is
    /// dropped along with every request it had in flight.
    pub async fn discover_with_cancel(
        &self,
        query: &BusinessQuery,
        credentials: &ProviderCredentials,
        options: DiscoveryOptions,
        cancel: &CancellationToken,
    ) -> Result<DiscoveryResult, DiscoveryError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!(business = %query.name, "Discovery cancelled");
                Err(DiscoveryError::Cancelled)
            }
            result = self.discover_with_options(query, credentials, options) => result,
        }
    }

    pub async fn discover_batch(
        &self,
        queries: Vec<BusinessQuery>,
        credentials: &ProviderCredentials,
        options: BatchOptions,
    ) -> BatchReport {
        batch::run(self, queries, credentials, options).await
    }

    /// Drop every verification and discovery cache entry.
    pub async fn clear_caches(&self) {
        self.verification_cache.clear().await;
        self.discovery_cache.clear().await;
        info!("Discovery caches cleared");
    }

    pub async fn cache_stats(&self) -> CacheStats {
        CacheStats {
            verification_entries: self.verification_cache.len().await,
            discovery_entries: self.discovery_cache.len().await,
            discovery_enabled: self.discovery_cache.is_enabled().await,
        }
    }
}

/// Swap out any collaborator; everything left unset gets the in-process default.
#[derive(Default)]
pub struct DiscoveryEngineBuilder {
    config: Option<DiscoveryConfig>,
    fetcher: Option<Arc<dyn HttpFetcher>>,
    verification_store: Option<Arc<dyn KeyValueStore>>,
    discovery_store: Option<Arc<dyn KeyValueStore>>,
    cache_settings: Option<Arc<dyn CacheSettings>>,
    provider_factory: Option<Arc<dyn ProviderFactory>>,
}

impl DiscoveryEngineBuilder {
    pub fn config(mut self, config: DiscoveryConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn fetcher(mut self, fetcher: Arc<dyn HttpFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn verification_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.verification_store = Some(store);
        self
    }

    pub fn discovery_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.discovery_store = Some(store);
        self
    }

    pub fn cache_settings(mut self, settings: Arc<dyn CacheSettings>) -> Self {
        self.cache_settings = Some(settings);
        self
    }

    pub fn provider_factory(mut self, factory: Arc<dyn ProviderFactory>) -> Self {
        self.provider_factory = Some(factory);
        self
    }

    pub fn build(self) -> Result<DiscoveryEngine, FetchError> {
        let config = Arc::new(self.config.unwrap_or_default());

        let fetcher: Arc<dyn HttpFetcher> = match self.fetcher {
            Some(fetcher) => fetcher,
            None => Arc::new(ReqwestFetcher::new(&config.user_agent)?),
        };

        let verification_cache = Arc::new(VerificationCache::new(
            self.verification_store
                .unwrap_or_else(|| Arc::new(MemoryStore::new())),
            config.verification_ttl,
            config.cache_timeout,
        ));
        let discovery_cache = DiscoveryCache::new(
            self.discovery_store
                .unwrap_or_else(|| Arc::new(MemoryStore::new())),
            self.cache_settings
                .unwrap_or_else(|| Arc::new(CacheToggle::default())),
            config.discovery_ttl,
            config.cache_timeout,
        );

        let provider_factory = self
            .provider_factory
            .unwrap_or_else(|| Arc::new(HttpProviderFactory::new(fetcher.clone(), config.clone())));
        let suspensions = Arc::new(ProviderSuspensions::new(config.provider_cooldown));

        let guesser = Guesser::new(fetcher.clone(), verification_cache.clone(), config.verify_timeout);
        let orchestrator = Orchestrator::new(fetcher, guesser, suspensions.clone(), config.clone());

        Ok(DiscoveryEngine {
            config,
            verification_cache,
            discovery_cache,
            suspensions,
            provider_factory,
            orchestrator,
        })
    }
}
