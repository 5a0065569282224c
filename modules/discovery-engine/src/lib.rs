pub mod batch;
pub mod cache;
pub mod engine;
pub mod error;
pub mod fetch;
pub mod guesser;
pub mod links;
pub mod orchestrator;
pub mod providers;
pub mod relevance;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use batch::{BatchItemOutcome, BatchOptions, BatchReport};
pub use cache::{
    CacheSettings, CacheStats, CacheToggle, DiscoveryCache, KeyValueStore, MemoryStore, VerificationCache,
};
pub use engine::{DiscoveryEngine, DiscoveryEngineBuilder, DiscoveryOptions};
pub use error::{DiscoveryError, FetchError, ProviderError};
pub use fetch::{FetchRequest, FetchResponse, HttpFetcher, Method, ReqwestFetcher};
pub use providers::{HttpProviderFactory, PlatformQuery, ProviderFactory, ProviderSuspensions, SearchProvider};
pub use relevance::RelevancePolicy;

pub use discovery_common::{
    BusinessQuery, DiscoveryConfig, DiscoveryResult, DiscoverySource, PlatformKey, PlatformResult,
    ProviderCredentials, SearchResult,
};
