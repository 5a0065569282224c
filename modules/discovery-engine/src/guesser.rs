use std::sync::Arc;
use std::time::Duration;

use discovery_common::{BusinessQuery, PlatformKey};
use tracing::{debug, warn};

use crate::cache::VerificationCache;
use crate::fetch::{url_exists, HttpFetcher};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuessOutcome {
    /// The platform has no predictable profile URL. No request was made.
    NotGuessable,
    Verified { url: String },
    NotFound,
    /// The check itself failed (timeout, network). Not cached.
    Unreachable,
}

/// Builds the canonical profile URL for social platforms from the business
/// name and confirms it with a HEAD request, caching the answer.
pub struct Guesser {
    fetcher: Arc<dyn HttpFetcher>,
    cache: Arc<VerificationCache>,
    timeout: Duration,
}

impl Guesser {
    pub fn new(fetcher: Arc<dyn HttpFetcher>, cache: Arc<VerificationCache>, timeout: Duration) -> Self {
        Self {
            fetcher,
            cache,
            timeout,
        }
    }

    pub async fn guess_and_verify(&self, platform: PlatformKey, query: &BusinessQuery) -> GuessOutcome {
        if !platform.is_guessable() {
            return GuessOutcome::NotGuessable;
        }
        let Some(url) = platform.guess_url(&query.slug(), &query.hyphen_slug()) else {
            return GuessOutcome::NotFound;
        };

        if let Some(entry) = self.cache.get(platform, query).await {
            return match (entry.verified, entry.url) {
                (true, Some(cached)) => GuessOutcome::Verified { url: cached },
                (true, None) => GuessOutcome::Verified { url },
                (false, _) => GuessOutcome::NotFound,
            };
        }

        match url_exists(self.fetcher.as_ref(), &url, self.timeout).await {
            Ok(true) => {
                debug!(%platform, url, "Guessed profile exists");
                self.cache.put(platform, query, true, Some(url.clone())).await;
                GuessOutcome::Verified { url }
            }
            Ok(false) => {
                debug!(%platform, url, "Guessed profile does not exist");
                self.cache.put(platform, query, false, None).await;
                GuessOutcome::NotFound
            }
            Err(e) => {
                warn!(%platform, url, error = %e, "Profile verification failed");
                GuessOutcome::Unreachable
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStore;
    use crate::error::FetchError;
    use crate::fetch::Method;
    use crate::testing::MockFetcher;

    fn guesser(fetcher: Arc<MockFetcher>) -> (Guesser, Arc<VerificationCache>) {
        let cache = Arc::new(VerificationCache::new(
            Arc::new(MemoryStore::new()),
            Duration::from_secs(3600),
            Duration::from_millis(500),
        ));
        (Guesser::new(fetcher, cache.clone(), Duration::from_secs(3)), cache)
    }

    fn acme() -> BusinessQuery {
        BusinessQuery::new("Acme Cafe").with_address("London")
    }

    #[tokio::test]
    async fn directory_platforms_are_never_guessed() {
        let fetcher = Arc::new(MockFetcher::new());
        let (g, cache) = guesser(fetcher.clone());
        for platform in [PlatformKey::Google, PlatformKey::Trustpilot, PlatformKey::Yell] {
            assert_eq!(g.guess_and_verify(platform, &acme()).await, GuessOutcome::NotGuessable);
        }
        assert!(fetcher.requests().is_empty());
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn live_guess_is_verified_and_cached() {
        let fetcher = Arc::new(MockFetcher::new().on_head("https://www.instagram.com/acmecafe", 200));
        let (g, _) = guesser(fetcher.clone());

        let expected = GuessOutcome::Verified {
            url: "https://www.instagram.com/acmecafe".into(),
        };
        assert_eq!(g.guess_and_verify(PlatformKey::Instagram, &acme()).await, expected);
        assert_eq!(g.guess_and_verify(PlatformKey::Instagram, &acme()).await, expected);
        assert_eq!(fetcher.count(Method::Head), 1);
    }

    #[tokio::test]
    async fn missing_profile_is_cached_negative() {
        let fetcher = Arc::new(MockFetcher::new().on_head("https://www.linkedin.com/company/acme-cafe", 404));
        let (g, _) = guesser(fetcher.clone());
        assert_eq!(g.guess_and_verify(PlatformKey::Linkedin, &acme()).await, GuessOutcome::NotFound);
        assert_eq!(g.guess_and_verify(PlatformKey::Linkedin, &acme()).await, GuessOutcome::NotFound);
        assert_eq!(fetcher.count(Method::Head), 1);
    }

    #[tokio::test]
    async fn transport_failures_are_not_cached() {
        let fetcher = Arc::new(
            MockFetcher::new().fail(Method::Head, "https://www.tiktok.com/@acmecafe", FetchError::Timeout),
        );
        let (g, cache) = guesser(fetcher.clone());
        assert_eq!(g.guess_and_verify(PlatformKey::Tiktok, &acme()).await, GuessOutcome::Unreachable);
        assert_eq!(g.guess_and_verify(PlatformKey::Tiktok, &acme()).await, GuessOutcome::Unreachable);
        assert_eq!(fetcher.count(Method::Head), 2);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn redirect_counts_as_live() {
        let fetcher = Arc::new(MockFetcher::new().on_head("https://twitter.com/acmecafe", 302));
        let (g, _) = guesser(fetcher);
        assert!(matches!(
            g.guess_and_verify(PlatformKey::Twitter, &acme()).await,
            GuessOutcome::Verified { .. }
        ));
    }

    #[tokio::test]
    async fn head_not_allowed_falls_back_to_get() {
        let fetcher = Arc::new(
            MockFetcher::new()
                .on_head("https://www.facebook.com/acmecafe", 405)
                .on_get("https://www.facebook.com/acmecafe", 200, "<html></html>"),
        );
        let (g, _) = guesser(fetcher.clone());
        assert!(matches!(
            g.guess_and_verify(PlatformKey::Facebook, &acme()).await,
            GuessOutcome::Verified { .. }
        ));
        assert_eq!(fetcher.count(Method::Get), 1);
    }
}
