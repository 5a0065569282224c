// Test mocks for the discovery engine.
//
// Mocks matching the trait boundaries:
// - MockFetcher (HttpFetcher): (method, URL) -> canned response
// - MockProvider (SearchProvider): per-platform scripted results
// - StaticProviderFactory (ProviderFactory): fixed provider chain
// - FailingStore / StalledStore (KeyValueStore): broken persistence

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use discovery_common::{PlatformKey, ProviderCredentials, SearchResult, CONFIDENCE_SEARCH};

use crate::cache::KeyValueStore;
use crate::error::{FetchError, ProviderError};
use crate::fetch::{FetchRequest, FetchResponse, HttpFetcher, Method};
use crate::providers::{PlatformQuery, ProviderFactory, SearchProvider};

// ---------------------------------------------------------------------------
// MockFetcher
// ---------------------------------------------------------------------------

#[derive(Clone)]
enum Route {
    Respond { status: u16, body: String },
    Fail(FetchError),
    /// Never answers; resolves to a timeout once the request timeout lapses.
    Stall,
}

/// (method, URL)-keyed fetcher. Unregistered routes fail with a network error.
/// Builder pattern: `.on_get()`, `.on_head()`, `.on_post()`, `.fail()`, `.stall()`.
#[derive(Default)]
pub struct MockFetcher {
    routes: HashMap<(Method, String), Route>,
    requests: Mutex<Vec<FetchRequest>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    fn route(mut self, method: Method, url: &str, route: Route) -> Self {
        self.routes.insert((method, url.to_string()), route);
        self
    }

    pub fn on_get(self, url: &str, status: u16, body: &str) -> Self {
        self.route(
            Method::Get,
            url,
            Route::Respond {
                status,
                body: body.to_string(),
            },
        )
    }

    pub fn on_head(self, url: &str, status: u16) -> Self {
        self.route(
            Method::Head,
            url,
            Route::Respond {
                status,
                body: String::new(),
            },
        )
    }

    pub fn on_post(self, url: &str, status: u16, body: &str) -> Self {
        self.route(
            Method::Post,
            url,
            Route::Respond {
                status,
                body: body.to_string(),
            },
        )
    }

    pub fn fail(self, method: Method, url: &str, error: FetchError) -> Self {
        self.route(method, url, Route::Fail(error))
    }

    pub fn stall(self, method: Method, url: &str) -> Self {
        self.route(method, url, Route::Stall)
    }

    /// Every request received, in order.
    pub fn requests(&self) -> Vec<FetchRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn count(&self, method: Method) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method == method)
            .count()
    }

    pub fn was_requested(&self, url: &str) -> bool {
        self.requests.lock().unwrap().iter().any(|r| r.url == url)
    }
}

#[async_trait]
impl HttpFetcher for MockFetcher {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse, FetchError> {
        self.requests.lock().unwrap().push(request.clone());

        let route = self
            .routes
            .get(&(request.method, request.url.clone()))
            .cloned();
        match route {
            Some(Route::Respond { status, body }) => Ok(FetchResponse {
                status,
                final_url: request.url.clone(),
                headers: Vec::new(),
                body,
            }),
            Some(Route::Fail(e)) => Err(e),
            Some(Route::Stall) => {
                tokio::time::sleep(request.timeout).await;
                Err(FetchError::Timeout)
            }
            None => Err(FetchError::Network(format!(
                "MockFetcher: no route registered for {:?} {}",
                request.method, request.url
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// MockProvider
// ---------------------------------------------------------------------------

type Scripted = Result<Vec<SearchResult>, ProviderError>;

/// Search provider with scripted answers per platform. A platform's script is
/// consumed in order and its last entry repeats. Unscripted platforms return
/// the fallback (empty results unless set with `.fail_all()`).
pub struct MockProvider {
    name: String,
    confidence: f32,
    liveness: bool,
    latency: Option<Duration>,
    panics: bool,
    panic_for: Option<String>,
    scripts: Mutex<HashMap<PlatformKey, VecDeque<Scripted>>>,
    fallback: Scripted,
    calls: Mutex<Vec<PlatformKey>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockProvider {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            confidence: CONFIDENCE_SEARCH,
            liveness: false,
            latency: None,
            panics: false,
            panic_for: None,
            scripts: Mutex::new(HashMap::new()),
            fallback: Ok(Vec::new()),
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn requiring_liveness(mut self) -> Self {
        self.liveness = true;
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn panicking(mut self) -> Self {
        self.panics = true;
        self
    }

    /// Panic only when asked about this business.
    pub fn panicking_for(mut self, business_name: &str) -> Self {
        self.panic_for = Some(business_name.to_string());
        self
    }

    fn push(self, platform: PlatformKey, answer: Scripted) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .entry(platform)
            .or_default()
            .push_back(answer);
        self
    }

    pub fn on_platform(self, platform: PlatformKey, results: Vec<SearchResult>) -> Self {
        self.push(platform, Ok(results))
    }

    pub fn fail_platform(self, platform: PlatformKey, error: ProviderError) -> Self {
        self.push(platform, Err(error))
    }

    pub fn fail_all(mut self, error: ProviderError) -> Self {
        self.fallback = Err(error);
        self
    }

    pub fn calls(&self) -> Vec<PlatformKey> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls_for(&self, platform: PlatformKey) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|p| **p == platform)
            .count()
    }

    /// Highest number of concurrent `search` calls observed.
    pub fn max_concurrent_calls(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn next_answer(&self, platform: PlatformKey) -> Scripted {
        let mut scripts = self.scripts.lock().unwrap();
        match scripts.get_mut(&platform) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or(Ok(Vec::new())),
            Some(queue) => queue.front().cloned().unwrap_or(Ok(Vec::new())),
            None => self.fallback.clone(),
        }
    }
}

#[async_trait]
impl SearchProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn suspension_key(&self) -> String {
        format!("{}:mock", self.name)
    }

    fn confidence(&self) -> f32 {
        self.confidence
    }

    fn requires_liveness_check(&self) -> bool {
        self.liveness
    }

    async fn search(&self, query: &PlatformQuery) -> Result<Vec<SearchResult>, ProviderError> {
        self.calls.lock().unwrap().push(query.platform);
        if self.panics || self.panic_for.as_deref() == Some(query.business.name.as_str()) {
            panic!("MockProvider {} panicked", self.name);
        }

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        self.next_answer(query.platform)
    }
}

/// Convenience constructor for a search hit.
pub fn hit(url: &str, title: &str, snippet: &str) -> SearchResult {
    SearchResult {
        url: url.to_string(),
        title: title.to_string(),
        snippet: snippet.to_string(),
    }
}

// ---------------------------------------------------------------------------
// StaticProviderFactory
// ---------------------------------------------------------------------------

/// Returns the same provider chain for every call, ignoring credentials.
pub struct StaticProviderFactory {
    providers: Vec<Arc<dyn SearchProvider>>,
}

impl StaticProviderFactory {
    pub fn new(providers: Vec<Arc<dyn SearchProvider>>) -> Self {
        Self { providers }
    }
}

impl ProviderFactory for StaticProviderFactory {
    fn providers(&self, _credentials: &ProviderCredentials) -> Vec<Arc<dyn SearchProvider>> {
        self.providers.clone()
    }
}

// ---------------------------------------------------------------------------
// Broken stores
// ---------------------------------------------------------------------------

/// Every operation errors.
pub struct FailingStore;

#[async_trait]
impl KeyValueStore for FailingStore {
    async fn get(&self, _key: &str) -> Result<Option<String>> {
        anyhow::bail!("FailingStore: connection refused")
    }
    async fn set(&self, _key: &str, _value: String, _ttl: Duration) -> Result<()> {
        anyhow::bail!("FailingStore: connection refused")
    }
    async fn delete(&self, _key: &str) -> Result<()> {
        anyhow::bail!("FailingStore: connection refused")
    }
    async fn clear(&self) -> Result<()> {
        anyhow::bail!("FailingStore: connection refused")
    }
    async fn count(&self) -> Result<usize> {
        anyhow::bail!("FailingStore: connection refused")
    }
}

/// Every operation hangs forever.
pub struct StalledStore;

#[async_trait]
impl KeyValueStore for StalledStore {
    async fn get(&self, _key: &str) -> Result<Option<String>> {
        std::future::pending().await
    }
    async fn set(&self, _key: &str, _value: String, _ttl: Duration) -> Result<()> {
        std::future::pending().await
    }
    async fn delete(&self, _key: &str) -> Result<()> {
        std::future::pending().await
    }
    async fn clear(&self) -> Result<()> {
        std::future::pending().await
    }
    async fn count(&self) -> Result<usize> {
        std::future::pending().await
    }
}
