//! Staged resolution of one business across every platform.
//!
//! Stages run cheapest first: place id, the business's own website, guessed
//! profile URLs, then the search provider chain. A later stage only sees the
//! platforms the earlier ones left unresolved.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use discovery_common::{
    BusinessQuery, DiscoveryConfig, DiscoveryResult, DiscoverySource, PlatformKey, PlatformResult,
    SearchResult, CONFIDENCE_GUESS_VERIFIED, CONFIDENCE_PLACE_ID, CONFIDENCE_WEBSITE,
};
use futures::stream::{self, StreamExt};
use rand::Rng;
use tracing::{debug, info, warn};

use crate::error::ProviderError;
use crate::fetch::{url_exists, HttpFetcher};
use crate::guesser::{GuessOutcome, Guesser};
use crate::links::fetch_platform_links;
use crate::providers::{PlatformQuery, ProviderSuspensions, SearchProvider};
use crate::relevance::{profile_url, select_candidate, RelevancePolicy};

const GOOGLE_REVIEW_URL: &str = "https://search.google.com/local/writereview";

// ---------------------------------------------------------------------------
// Per-platform state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Unresolved,
    Resolved {
        confidence: f32,
        source: DiscoverySource,
        verified: bool,
        url: String,
    },
}

impl Resolution {
    pub fn confidence(&self) -> f32 {
        match self {
            Resolution::Unresolved => 0.0,
            Resolution::Resolved { confidence, .. } => *confidence,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Resolution::Resolved { .. })
    }
}

/// One slot per platform. A slot is overwritten only by an equal or higher
/// confidence and never once it holds 1.0.
#[derive(Debug, Clone)]
pub struct PlatformSlots {
    slots: BTreeMap<PlatformKey, Resolution>,
}

impl Default for PlatformSlots {
    fn default() -> Self {
        Self::new()
    }
}

impl PlatformSlots {
    pub fn new() -> Self {
        Self {
            slots: PlatformKey::ALL
                .into_iter()
                .map(|p| (p, Resolution::Unresolved))
                .collect(),
        }
    }

    /// Returns whether the offer was taken.
    pub fn offer(
        &mut self,
        platform: PlatformKey,
        url: String,
        confidence: f32,
        source: DiscoverySource,
        verified: bool,
    ) -> bool {
        let slot = self.slots.entry(platform).or_insert(Resolution::Unresolved);
        let current = slot.confidence();
        if slot.is_resolved() && (current >= 1.0 || confidence < current) {
            return false;
        }
        *slot = Resolution::Resolved {
            confidence,
            source,
            verified,
            url,
        };
        true
    }

    pub fn get(&self, platform: PlatformKey) -> &Resolution {
        self.slots.get(&platform).unwrap_or(&Resolution::Unresolved)
    }

    pub fn unresolved(&self) -> Vec<PlatformKey> {
        self.slots
            .iter()
            .filter(|(_, r)| !r.is_resolved())
            .map(|(p, _)| *p)
            .collect()
    }

    /// Unresolved platforms get the platform's own search page as a fallback link.
    pub fn into_result(self, query: &BusinessQuery) -> DiscoveryResult {
        let now = Utc::now();
        let platforms = self
            .slots
            .into_iter()
            .map(|(platform, resolution)| {
                let result = match resolution {
                    Resolution::Resolved {
                        confidence,
                        source,
                        verified,
                        url,
                    } => PlatformResult {
                        platform,
                        url: Some(url),
                        verified,
                        source: Some(source),
                        confidence,
                        search_url: None,
                        timestamp: now,
                    },
                    Resolution::Unresolved => PlatformResult {
                        search_url: platform.search_url(query.name.trim(), query.address_str()),
                        timestamp: now,
                        ..PlatformResult::unresolved(platform)
                    },
                };
                (platform, result)
            })
            .collect();
        DiscoveryResult::new(query.name.trim(), platforms)
    }
}

/// Accepted provider answer for one platform.
struct ProviderHit {
    url: String,
    provider: String,
    confidence: f32,
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

pub struct Orchestrator {
    fetcher: Arc<dyn HttpFetcher>,
    guesser: Guesser,
    suspensions: Arc<ProviderSuspensions>,
    config: Arc<DiscoveryConfig>,
    policy: RelevancePolicy,
}

impl Orchestrator {
    pub fn new(
        fetcher: Arc<dyn HttpFetcher>,
        guesser: Guesser,
        suspensions: Arc<ProviderSuspensions>,
        config: Arc<DiscoveryConfig>,
    ) -> Self {
        let policy = RelevancePolicy {
            min_relevance: config.min_relevance,
        };
        Self {
            fetcher,
            guesser,
            suspensions,
            config,
            policy,
        }
    }

    /// Run every stage for one business. Never fails: stage errors leave
    /// platforms unresolved.
    pub async fn run(
        &self,
        query: &BusinessQuery,
        providers: &[Arc<dyn SearchProvider>],
        website_only: bool,
    ) -> DiscoveryResult {
        let mut slots = PlatformSlots::new();

        if let Some(place_id) = query.place_id_str() {
            let encoded: String = url::form_urlencoded::byte_serialize(place_id.as_bytes()).collect();
            slots.offer(
                PlatformKey::Google,
                format!("{GOOGLE_REVIEW_URL}?placeid={encoded}"),
                CONFIDENCE_PLACE_ID,
                DiscoverySource::PlaceId,
                true,
            );
        }

        if let Some(website) = query.website_str() {
            let links = fetch_platform_links(
                self.fetcher.as_ref(),
                website,
                self.config.website_timeout,
                self.config.max_body_bytes,
            )
            .await;
            for (platform, url) in links {
                slots.offer(platform, url, CONFIDENCE_WEBSITE, DiscoverySource::Website, true);
            }
        }

        if website_only {
            info!(business = %query.name, "Website-only lookup complete");
            return slots.into_result(query);
        }

        self.guess_stage(query, &mut slots).await;
        self.provider_stage(query, providers, &mut slots).await;

        let result = slots.into_result(query);
        info!(
            business = %result.business_name,
            found = result.found_count,
            verified = result.verified_count,
            "Discovery complete"
        );
        result
    }

    async fn guess_stage(&self, query: &BusinessQuery, slots: &mut PlatformSlots) {
        let candidates: Vec<PlatformKey> = slots
            .unresolved()
            .into_iter()
            .filter(|p| p.is_guessable())
            .collect();
        if candidates.is_empty() {
            return;
        }

        let outcomes: Vec<_> = stream::iter(candidates.into_iter().map(|platform| async move {
            (platform, self.guesser.guess_and_verify(platform, query).await)
        }))
        .buffer_unordered(self.config.max_concurrency.max(1))
        .collect()
        .await;

        for (platform, outcome) in outcomes {
            if let GuessOutcome::Verified { url } = outcome {
                slots.offer(
                    platform,
                    url,
                    CONFIDENCE_GUESS_VERIFIED,
                    DiscoverySource::GuessVerify,
                    true,
                );
            }
        }
    }

    async fn provider_stage(
        &self,
        query: &BusinessQuery,
        providers: &[Arc<dyn SearchProvider>],
        slots: &mut PlatformSlots,
    ) {
        let pending = slots.unresolved();
        if pending.is_empty() || providers.is_empty() {
            return;
        }

        let answers: Vec<_> = stream::iter(pending.into_iter().map(|platform| async move {
            (platform, self.resolve_platform(platform, query, providers).await)
        }))
        .buffer_unordered(self.config.max_concurrency.max(1))
        .collect()
        .await;

        for (platform, answer) in answers {
            if let Some(hit) = answer {
                slots.offer(
                    platform,
                    hit.url,
                    hit.confidence,
                    DiscoverySource::SearchProvider {
                        provider: hit.provider,
                    },
                    false,
                );
            }
        }
    }

    /// Walk the chain in priority order and stop at the first provider whose
    /// hits yield an acceptable profile.
    async fn resolve_platform(
        &self,
        platform: PlatformKey,
        query: &BusinessQuery,
        providers: &[Arc<dyn SearchProvider>],
    ) -> Option<ProviderHit> {
        let platform_query = PlatformQuery::new(platform, query);

        for provider in providers {
            let key = provider.suspension_key();
            if self.suspensions.is_suspended(&key) {
                debug!(provider = provider.name(), %platform, "Provider suspended, skipping");
                continue;
            }

            match self.search_with_retry(provider.as_ref(), &platform_query).await {
                Ok(hits) => {
                    if let Some(url) = self.accept(provider.as_ref(), platform, query, &hits).await {
                        info!(provider = provider.name(), %platform, url, "Provider resolved platform");
                        return Some(ProviderHit {
                            url,
                            provider: provider.name().to_string(),
                            confidence: provider.confidence(),
                        });
                    }
                    debug!(provider = provider.name(), %platform, hits = hits.len(), "No acceptable hit");
                }
                Err(e) if e.suspends_provider() => self.suspensions.suspend(&key, &e),
                Err(e) => {
                    warn!(provider = provider.name(), %platform, error = %e, "Provider search failed");
                }
            }
        }
        None
    }

    async fn search_with_retry(
        &self,
        provider: &dyn SearchProvider,
        query: &PlatformQuery,
    ) -> Result<Vec<SearchResult>, ProviderError> {
        let mut attempt: u32 = 0;
        loop {
            let outcome = match tokio::time::timeout(self.config.provider_timeout, provider.search(query)).await
            {
                Ok(outcome) => outcome,
                Err(_) => Err(ProviderError::Timeout),
            };

            match outcome {
                Err(e) if e.is_retryable() && attempt < self.config.network_retries => {
                    let delay = self.backoff(attempt);
                    warn!(
                        provider = provider.name(),
                        platform = %query.platform,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Provider network error, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    /// base * 2^attempt plus up to half the base in jitter.
    fn backoff(&self, attempt: u32) -> Duration {
        let base = self.config.retry_base_delay;
        let exp = base.saturating_mul(2u32.saturating_pow(attempt));
        let jitter_cap = (base.as_millis() / 2) as u64;
        let jitter = if jitter_cap == 0 {
            0
        } else {
            rand::rng().random_range(0..=jitter_cap)
        };
        exp + Duration::from_millis(jitter)
    }

    async fn accept(
        &self,
        provider: &dyn SearchProvider,
        platform: PlatformKey,
        query: &BusinessQuery,
        hits: &[SearchResult],
    ) -> Option<String> {
        if !provider.requires_liveness_check() {
            return select_candidate(platform, query, hits, self.policy);
        }

        for hit in hits {
            let Some(url) = profile_url(platform, &hit.url) else {
                debug!(%platform, url = hit.url, "Suggested URL is not a profile on this platform");
                continue;
            };
            match url_exists(self.fetcher.as_ref(), &url, self.config.verify_timeout).await {
                Ok(true) => return Some(url),
                Ok(false) => debug!(%platform, url, "Suggested URL is dead"),
                Err(e) => warn!(%platform, url, error = %e, "Liveness check failed"),
            }
        }
        None
    }
}
