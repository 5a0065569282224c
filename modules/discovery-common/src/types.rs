use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::platform::PlatformKey;

// --- Confidence levels ---

/// Link found on the business's own website, or derived from a place id.
pub const CONFIDENCE_WEBSITE: f32 = 1.0;
pub const CONFIDENCE_PLACE_ID: f32 = 1.0;
/// Canonical URL guessed from the name and confirmed live.
pub const CONFIDENCE_GUESS_VERIFIED: f32 = 0.8;
pub const CONFIDENCE_SEARCH: f32 = 0.6;
pub const CONFIDENCE_LLM: f32 = 0.5;

// --- Query ---

/// A business to look up. Identity for caching is derived from the
/// normalized name and address only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessQuery {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    /// Google place id. When present the primary review link is derived from it.
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "placeId")]
    pub place_id: Option<String>,
}

impl BusinessQuery {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: None,
            website: None,
            place_id: None,
        }
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn with_website(mut self, website: impl Into<String>) -> Self {
        self.website = Some(website.into());
        self
    }

    pub fn with_place_id(mut self, place_id: impl Into<String>) -> Self {
        self.place_id = Some(place_id.into());
        self
    }

    pub fn normalized_name(&self) -> String {
        normalize_text(&self.name)
    }

    pub fn normalized_address(&self) -> String {
        self.address.as_deref().map(normalize_text).unwrap_or_default()
    }

    /// Non-empty address, trimmed.
    pub fn address_str(&self) -> Option<&str> {
        self.address.as_deref().map(str::trim).filter(|a| !a.is_empty())
    }

    /// Non-empty website, trimmed.
    pub fn website_str(&self) -> Option<&str> {
        self.website.as_deref().map(str::trim).filter(|w| !w.is_empty())
    }

    /// Non-empty place id, trimmed.
    pub fn place_id_str(&self) -> Option<&str> {
        self.place_id.as_deref().map(str::trim).filter(|p| !p.is_empty())
    }

    /// SHA-256 (hex) of `normalized name | normalized address`.
    pub fn identity_key(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.normalized_name().as_bytes());
        hasher.update(b"|");
        hasher.update(self.normalized_address().as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Lowercase name with everything but ASCII letters and digits removed.
    /// "Acme Cafe" -> "acmecafe".
    pub fn slug(&self) -> String {
        self.name
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect()
    }

    /// Lowercase words joined by hyphens. "Acme Cafe & Co" -> "acme-cafe-co".
    pub fn hyphen_slug(&self) -> String {
        self.name
            .split_whitespace()
            .map(|word| {
                word.chars()
                    .filter(|c| c.is_ascii_alphanumeric())
                    .map(|c| c.to_ascii_lowercase())
                    .collect::<String>()
            })
            .filter(|w| !w.is_empty())
            .collect::<Vec<_>>()
            .join("-")
    }
}

/// Trim, lowercase and collapse internal whitespace.
pub fn normalize_text(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

// --- Results ---

/// Where a platform URL came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiscoverySource {
    Website,
    PlaceId,
    GuessVerify,
    SearchProvider { provider: String },
}

impl std::fmt::Display for DiscoverySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiscoverySource::Website => write!(f, "website"),
            DiscoverySource::PlaceId => write!(f, "place_id"),
            DiscoverySource::GuessVerify => write!(f, "guess_verify"),
            DiscoverySource::SearchProvider { provider } => write!(f, "search:{provider}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformResult {
    pub platform: PlatformKey,
    pub url: Option<String>,
    pub verified: bool,
    pub source: Option<DiscoverySource>,
    pub confidence: f32,
    /// Search page on the platform itself, offered when no profile was found.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_url: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl PlatformResult {
    pub fn unresolved(platform: PlatformKey) -> Self {
        Self {
            platform,
            url: None,
            verified: false,
            source: None,
            confidence: 0.0,
            search_url: None,
            timestamp: Utc::now(),
        }
    }

    pub fn is_found(&self) -> bool {
        self.url.is_some()
    }
}

/// Outcome of one lookup. Every known platform is present in `platforms`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryResult {
    pub business_name: String,
    pub platforms: BTreeMap<PlatformKey, PlatformResult>,
    pub found_count: usize,
    pub verified_count: usize,
    pub timestamp: DateTime<Utc>,
}

impl DiscoveryResult {
    /// Build a result, filling any missing platform with an unresolved entry
    /// and deriving the counts.
    pub fn new(business_name: impl Into<String>, mut platforms: BTreeMap<PlatformKey, PlatformResult>) -> Self {
        for platform in PlatformKey::ALL {
            platforms
                .entry(platform)
                .or_insert_with(|| PlatformResult::unresolved(platform));
        }
        let found_count = platforms.values().filter(|r| r.is_found()).count();
        let verified_count = platforms.values().filter(|r| r.is_found() && r.verified).count();
        Self {
            business_name: business_name.into(),
            platforms,
            found_count,
            verified_count,
            timestamp: Utc::now(),
        }
    }

    pub fn get(&self, platform: PlatformKey) -> Option<&PlatformResult> {
        self.platforms.get(&platform)
    }

    pub fn url(&self, platform: PlatformKey) -> Option<&str> {
        self.get(platform).and_then(|r| r.url.as_deref())
    }
}

/// A single hit returned by a search provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub snippet: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugs() {
        let q = BusinessQuery::new("Acme Cafe");
        assert_eq!(q.slug(), "acmecafe");
        assert_eq!(q.hyphen_slug(), "acme-cafe");

        let q = BusinessQuery::new("  Joe's  Plumbing & Heating ");
        assert_eq!(q.slug(), "joesplumbingheating");
        assert_eq!(q.hyphen_slug(), "joes-plumbing-heating");
    }

    #[test]
    fn identity_key_ignores_case_and_spacing() {
        let a = BusinessQuery::new("Acme  Cafe").with_address("1 High St, London");
        let b = BusinessQuery::new(" acme cafe ").with_address("1 high st,  london");
        assert_eq!(a.identity_key(), b.identity_key());
        assert_eq!(a.identity_key().len(), 64);
        assert!(a.identity_key().chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn identity_key_depends_on_address() {
        let a = BusinessQuery::new("Acme Cafe").with_address("London");
        let b = BusinessQuery::new("Acme Cafe").with_address("Leeds");
        let c = BusinessQuery::new("Acme Cafe");
        assert_ne!(a.identity_key(), b.identity_key());
        assert_ne!(a.identity_key(), c.identity_key());
    }

    #[test]
    fn identity_key_ignores_website() {
        let a = BusinessQuery::new("Acme Cafe").with_website("https://acme.example");
        let b = BusinessQuery::new("Acme Cafe");
        assert_eq!(a.identity_key(), b.identity_key());
    }

    #[test]
    fn discovery_result_fills_every_platform() {
        let mut platforms = BTreeMap::new();
        platforms.insert(
            PlatformKey::Instagram,
            PlatformResult {
                platform: PlatformKey::Instagram,
                url: Some("https://www.instagram.com/acmecafe".into()),
                verified: true,
                source: Some(DiscoverySource::Website),
                confidence: CONFIDENCE_WEBSITE,
                search_url: None,
                timestamp: Utc::now(),
            },
        );
        let result = DiscoveryResult::new("Acme Cafe", platforms);
        assert_eq!(result.platforms.len(), PlatformKey::ALL.len());
        assert_eq!(result.found_count, 1);
        assert_eq!(result.verified_count, 1);
        assert_eq!(result.url(PlatformKey::Instagram), Some("https://www.instagram.com/acmecafe"));
        assert!(result.url(PlatformKey::Facebook).is_none());
    }

    #[test]
    fn query_accepts_camel_case_place_id() {
        let q: BusinessQuery =
            serde_json::from_str(r#"{"name":"Acme","placeId":"ChIJ123"}"#).unwrap();
        assert_eq!(q.place_id_str(), Some("ChIJ123"));
        assert!(q.address_str().is_none());
    }
}
