use serde::{Deserialize, Serialize};
use url::Url;

// --- Platform keys ---

/// Every platform the engine knows how to locate a business on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformKey {
    Google,
    Facebook,
    Instagram,
    Twitter,
    Tiktok,
    Linkedin,
    Tripadvisor,
    Trustpilot,
    Yell,
    Checkatrade,
    Ratedpeople,
    Trustatrader,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlatformCategory {
    /// The primary review platform (Google).
    Review,
    Social,
    Directory,
}

/// Host suffix plus path prefix. A host matches when it equals the suffix or
/// ends with `.` + suffix, so `fb.com` never matches `notfb.com`.
#[derive(Debug, Clone, Copy)]
pub struct HostPattern {
    pub host: &'static str,
    pub path_prefix: &'static str,
}

const fn hp(host: &'static str, path_prefix: &'static str) -> HostPattern {
    HostPattern { host, path_prefix }
}

const GOOGLE_PATTERNS: &[HostPattern] = &[
    hp("search.google.com", "/local/writereview"),
    hp("maps.google.com", ""),
    hp("google.com", "/maps"),
    hp("business.google.com", ""),
    hp("g.page", ""),
    hp("maps.app.goo.gl", ""),
];
const FACEBOOK_PATTERNS: &[HostPattern] = &[
    hp("facebook.com", ""),
    hp("fb.com", ""),
    hp("fb.me", ""),
];
const INSTAGRAM_PATTERNS: &[HostPattern] = &[hp("instagram.com", "")];
const TWITTER_PATTERNS: &[HostPattern] = &[
    hp("twitter.com", ""),
    hp("x.com", ""),
];
const TIKTOK_PATTERNS: &[HostPattern] = &[hp("tiktok.com", "/@")];
const LINKEDIN_PATTERNS: &[HostPattern] = &[
    hp("linkedin.com", "/company/"),
    hp("linkedin.com", "/in/"),
];
const TRIPADVISOR_PATTERNS: &[HostPattern] = &[
    hp("tripadvisor.com", "/Restaurant_Review"),
    hp("tripadvisor.com", "/Hotel_Review"),
    hp("tripadvisor.com", "/Attraction_Review"),
    hp("tripadvisor.co.uk", "/Restaurant_Review"),
    hp("tripadvisor.co.uk", "/Hotel_Review"),
    hp("tripadvisor.co.uk", "/Attraction_Review"),
];
const TRUSTPILOT_PATTERNS: &[HostPattern] = &[hp("trustpilot.com", "/review/")];
const YELL_PATTERNS: &[HostPattern] = &[hp("yell.com", "/biz/")];
const CHECKATRADE_PATTERNS: &[HostPattern] = &[hp("checkatrade.com", "/trades/")];
const RATEDPEOPLE_PATTERNS: &[HostPattern] = &[
    hp("ratedpeople.com", "/tradesman/"),
    hp("ratedpeople.com", "/profile/"),
];
const TRUSTATRADER_PATTERNS: &[HostPattern] = &[
    hp("trustatrader.com", "/trader/"),
    hp("trustatrader.com", "/traders/"),
];

/// Paths that belong to share widgets, search pages or platform chrome rather
/// than a business profile.
const NON_PROFILE_PREFIXES: &[&str] = &[
    "/sharer",
    "/share",
    "/intent",
    "/dialog",
    "/plugins",
    "/search",
    "/hashtag",
    "/explore",
    "/login",
    "/home",
];

impl PlatformKey {
    pub const ALL: [PlatformKey; 12] = [
        PlatformKey::Google,
        PlatformKey::Facebook,
        PlatformKey::Instagram,
        PlatformKey::Twitter,
        PlatformKey::Tiktok,
        PlatformKey::Linkedin,
        PlatformKey::Tripadvisor,
        PlatformKey::Trustpilot,
        PlatformKey::Yell,
        PlatformKey::Checkatrade,
        PlatformKey::Ratedpeople,
        PlatformKey::Trustatrader,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Facebook => "facebook",
            Self::Instagram => "instagram",
            Self::Twitter => "twitter",
            Self::Tiktok => "tiktok",
            Self::Linkedin => "linkedin",
            Self::Tripadvisor => "tripadvisor",
            Self::Trustpilot => "trustpilot",
            Self::Yell => "yell",
            Self::Checkatrade => "checkatrade",
            Self::Ratedpeople => "ratedpeople",
            Self::Trustatrader => "trustatrader",
        }
    }

    pub fn from_str_loose(s: &str) -> Option<Self> {
        let lower = s.trim().to_lowercase();
        match lower.as_str() {
            "x" => Some(Self::Twitter),
            "google_reviews" | "google-reviews" => Some(Self::Google),
            other => Self::ALL.into_iter().find(|p| p.as_str() == other),
        }
    }

    /// Human-readable label, also used as the platform term in search queries.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Google => "Google Reviews",
            Self::Facebook => "Facebook",
            Self::Instagram => "Instagram",
            Self::Twitter => "Twitter",
            Self::Tiktok => "TikTok",
            Self::Linkedin => "LinkedIn",
            Self::Tripadvisor => "TripAdvisor",
            Self::Trustpilot => "Trustpilot",
            Self::Yell => "Yell",
            Self::Checkatrade => "Checkatrade",
            Self::Ratedpeople => "Rated People",
            Self::Trustatrader => "TrustATrader",
        }
    }

    pub fn category(&self) -> PlatformCategory {
        match self {
            Self::Google => PlatformCategory::Review,
            Self::Facebook | Self::Instagram | Self::Twitter | Self::Tiktok | Self::Linkedin => {
                PlatformCategory::Social
            }
            _ => PlatformCategory::Directory,
        }
    }

    /// Only social platforms have predictable profile URLs worth guessing.
    pub fn is_guessable(&self) -> bool {
        self.category() == PlatformCategory::Social
    }

    /// Host/path patterns that identify a profile or review page on this platform.
    pub fn patterns(&self) -> &'static [HostPattern] {
        match self {
            Self::Google => GOOGLE_PATTERNS,
            Self::Facebook => FACEBOOK_PATTERNS,
            Self::Instagram => INSTAGRAM_PATTERNS,
            Self::Twitter => TWITTER_PATTERNS,
            Self::Tiktok => TIKTOK_PATTERNS,
            Self::Linkedin => LINKEDIN_PATTERNS,
            Self::Tripadvisor => TRIPADVISOR_PATTERNS,
            Self::Trustpilot => TRUSTPILOT_PATTERNS,
            Self::Yell => YELL_PATTERNS,
            Self::Checkatrade => CHECKATRADE_PATTERNS,
            Self::Ratedpeople => RATEDPEOPLE_PATTERNS,
            Self::Trustatrader => TRUSTATRADER_PATTERNS,
        }
    }

    /// True if `url` points at a profile on this platform: host and path match
    /// one of the patterns, the path is not a bare domain root and not a
    /// share widget or search page.
    pub fn matches_url(&self, url: &Url) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };
        let host = host.to_lowercase();
        let path = url.path();

        if is_non_profile_path(path) {
            return false;
        }
        // Google maps links routinely carry their identity in the query string.
        let has_identity = !path.trim_matches('/').is_empty()
            || (*self == Self::Google && url.query().is_some());
        if !has_identity {
            return false;
        }

        self.patterns()
            .iter()
            .any(|p| host_matches(&host, p.host) && path.starts_with(p.path_prefix))
    }

    /// Classify a URL into the platform it belongs to, if any.
    pub fn detect(url: &Url) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.matches_url(url))
    }

    /// Canonical guess for this platform's profile URL, or `None` for platforms
    /// whose URLs are not predictable from the name.
    pub fn guess_url(&self, slug: &str, hyphen_slug: &str) -> Option<String> {
        if slug.is_empty() {
            return None;
        }
        match self {
            Self::Facebook => Some(format!("https://www.facebook.com/{slug}")),
            Self::Instagram => Some(format!("https://www.instagram.com/{slug}")),
            Self::Twitter => Some(format!("https://twitter.com/{slug}")),
            Self::Tiktok => Some(format!("https://www.tiktok.com/@{slug}")),
            Self::Linkedin if !hyphen_slug.is_empty() => {
                Some(format!("https://www.linkedin.com/company/{hyphen_slug}"))
            }
            _ => None,
        }
    }

    /// A search page on the platform itself, offered when no profile was found.
    pub fn search_url(&self, name: &str, address: Option<&str>) -> Option<String> {
        let q = encode(name);
        let with_address = match address.filter(|a| !a.trim().is_empty()) {
            Some(a) => format!("{q}+{}", encode(a)),
            None => q.clone(),
        };
        match self {
            Self::Google => Some(format!("https://www.google.com/maps/search/{with_address}")),
            Self::Tripadvisor => Some(format!("https://www.tripadvisor.com/Search?q={with_address}")),
            Self::Trustpilot => Some(format!("https://www.trustpilot.com/search?query={q}")),
            Self::Yell => Some(format!("https://www.yell.com/search/uk?query={with_address}")),
            Self::Checkatrade => Some(format!("https://www.checkatrade.com/search?query={q}")),
            Self::Ratedpeople => {
                let dashed = name.split_whitespace().collect::<Vec<_>>().join("-");
                Some(format!("https://www.ratedpeople.com/search/{}", encode(&dashed)))
            }
            Self::Trustatrader => Some(format!("https://www.trustatrader.com/search?query={q}")),
            _ => None,
        }
    }

    /// Reduce a matched profile URL to its canonical form: fragment and
    /// tracking query dropped, trailing slash trimmed, LinkedIn country
    /// subdomains mapped to `www`.
    pub fn normalize_url(&self, url: &Url) -> String {
        let mut url = url.clone();
        url.set_fragment(None);

        let keep_query = match self {
            Self::Google => true,
            Self::Facebook => url.path().starts_with("/profile.php"),
            _ => false,
        };
        if !keep_query {
            url.set_query(None);
        }

        if *self == Self::Linkedin {
            let is_country_host = url
                .host_str()
                .map(|h| h.ends_with(".linkedin.com") && h != "www.linkedin.com")
                .unwrap_or(false);
            if is_country_host {
                let _ = url.set_host(Some("www.linkedin.com"));
            }
        }

        let s = url.to_string();
        if url.query().is_none() {
            s.trim_end_matches('/').to_string()
        } else {
            s
        }
    }
}

impl std::fmt::Display for PlatformKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

fn host_matches(host: &str, suffix: &str) -> bool {
    host == suffix
        || host
            .strip_suffix(suffix)
            .is_some_and(|rest| rest.ends_with('.'))
}

fn is_non_profile_path(path: &str) -> bool {
    let lower = path.to_lowercase();
    NON_PROFILE_PREFIXES.iter().any(|p| {
        lower.strip_prefix(p)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with(['/', '.']))
    })
}

fn encode(s: &str) -> String {
    url::form_urlencoded::byte_serialize(s.trim().as_bytes()).collect()
}
