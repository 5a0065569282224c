//! Deciding whether a search hit is the business's profile.

use discovery_common::{BusinessQuery, PlatformKey, SearchResult};
use url::Url;

const NAME_WEIGHT: f32 = 0.6;
const LOCATION_WEIGHT: f32 = 0.4;

/// Words that say nothing about which business a page belongs to.
const STOPWORDS: &[&str] = &["the", "and", "ltd", "limited", "llc", "inc", "plc", "co", "of"];

#[derive(Debug, Clone, Copy)]
pub struct RelevancePolicy {
    pub min_relevance: f32,
}

impl Default for RelevancePolicy {
    fn default() -> Self {
        Self { min_relevance: 0.5 }
    }
}

fn tokens(s: &str, min_len: usize) -> Vec<String> {
    s.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= min_len)
        .map(String::from)
        .collect()
}

fn name_tokens(name: &str) -> Vec<String> {
    let all = tokens(name, 2);
    let meaningful: Vec<String> = all
        .iter()
        .filter(|t| !STOPWORDS.contains(&t.as_str()))
        .cloned()
        .collect();
    if !meaningful.is_empty() {
        return meaningful;
    }
    if !all.is_empty() {
        return all;
    }
    // "A & B" has no token of two or more characters; match it as "ab".
    let slug: String = name
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect();
    if slug.is_empty() {
        Vec::new()
    } else {
        vec![slug]
    }
}

/// 0.6 x share of name tokens found in the hit + 0.4 if any address token
/// (longer than 2 chars) appears. A query without an address gets the
/// location share for free.
pub fn score(query: &BusinessQuery, hit: &SearchResult) -> f32 {
    let haystack = format!("{} {} {}", hit.url, hit.title, hit.snippet).to_lowercase();
    // "acmecafe" in a handle should still count for "acme" and "cafe".
    let compact: String = haystack.chars().filter(|c| c.is_alphanumeric()).collect();

    let names = name_tokens(&query.name);
    let name_share = if names.is_empty() {
        0.0
    } else {
        let matched = names
            .iter()
            .filter(|t| haystack.contains(t.as_str()) || compact.contains(t.as_str()))
            .count();
        matched as f32 / names.len() as f32
    };

    let location_share = match query.address_str() {
        None => 1.0,
        Some(address) => {
            let addr = tokens(address, 3);
            if addr.is_empty() || addr.iter().any(|t| haystack.contains(t.as_str())) {
                1.0
            } else {
                0.0
            }
        }
    };

    NAME_WEIGHT * name_share + LOCATION_WEIGHT * location_share
}

/// The canonical profile URL for `raw` on `platform`, or `None` if it is not
/// a profile page there (wrong host, search page, share widget, bare root).
pub fn profile_url(platform: PlatformKey, raw: &str) -> Option<String> {
    let url = Url::parse(raw.trim()).ok()?;
    if !platform.matches_url(&url) {
        return None;
    }
    Some(platform.normalize_url(&url))
}

/// First hit, in provider order, that is a profile on `platform` and clears
/// the relevance bar.
pub fn select_candidate(
    platform: PlatformKey,
    query: &BusinessQuery,
    hits: &[SearchResult],
    policy: RelevancePolicy,
) -> Option<String> {
    hits.iter().find_map(|hit| {
        let url = profile_url(platform, &hit.url)?;
        (score(query, hit) >= policy.min_relevance).then_some(url)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(url: &str, title: &str, snippet: &str) -> SearchResult {
        SearchResult {
            url: url.into(),
            title: title.into(),
            snippet: snippet.into(),
        }
    }

    #[test]
    fn full_match_scores_one() {
        let q = BusinessQuery::new("Acme Cafe").with_address("12 High Street, London");
        let h = hit("https://www.instagram.com/acmecafe/", "Acme Cafe (@acmecafe)", "Coffee in London");
        assert!((score(&q, &h) - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn compact_handle_counts_for_name_tokens() {
        let q = BusinessQuery::new("Acme Cafe");
        let h = hit("https://www.tiktok.com/@acmecafe", "", "");
        assert!((score(&q, &h) - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn single_letter_names_match_as_one_slug() {
        let q = BusinessQuery::new("A & B").with_address("London");
        let h = hit("https://www.yell.com/biz/ab-plumbing-london/", "A B Plumbing", "London");
        assert!((score(&q, &h) - 1.0).abs() < f32::EPSILON);

        let other = hit("https://www.yell.com/biz/xyz-london/", "XYZ", "London");
        assert!(score(&q, &other) < RelevancePolicy::default().min_relevance);
    }

    #[test]
    fn wrong_location_is_penalised() {
        let q = BusinessQuery::new("Acme Cafe").with_address("Leeds");
        let h = hit("https://www.facebook.com/acmecafe", "Acme Cafe", "Best coffee in Bristol");
        assert!((score(&q, &h) - 0.6).abs() < 1e-6);
    }

    #[test]
    fn unrelated_hit_scores_low() {
        let q = BusinessQuery::new("Acme Cafe").with_address("Leeds");
        let h = hit("https://www.facebook.com/zenithbakery", "Zenith Bakery", "Bristol");
        assert_eq!(score(&q, &h), 0.0);
    }

    #[test]
    fn stopwords_do_not_count() {
        let q = BusinessQuery::new("The Acme Co");
        let h = hit("https://www.yell.com/biz/acme-london/", "Acme", "");
        assert!((score(&q, &h) - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn select_skips_other_platforms_and_search_pages() {
        let q = BusinessQuery::new("Acme Cafe").with_address("London");
        let hits = vec![
            hit("https://www.facebook.com/search/top?q=acme+cafe", "Acme Cafe", "London"),
            hit("https://www.instagram.com/acmecafe/", "Acme Cafe", "London"),
            hit("https://www.facebook.com/acmecafelondon/?ref=page", "Acme Cafe London", ""),
        ];
        assert_eq!(
            select_candidate(PlatformKey::Facebook, &q, &hits, RelevancePolicy::default()).as_deref(),
            Some("https://www.facebook.com/acmecafelondon")
        );
    }

    #[test]
    fn select_respects_bar() {
        let q = BusinessQuery::new("Acme Cafe").with_address("Leeds");
        let hits = vec![hit("https://www.facebook.com/zenith", "Zenith Bakery", "Bristol")];
        assert!(select_candidate(PlatformKey::Facebook, &q, &hits, RelevancePolicy::default()).is_none());

        let lenient = RelevancePolicy { min_relevance: 0.0 };
        assert!(select_candidate(PlatformKey::Facebook, &q, &hits, lenient).is_some());
    }
}
