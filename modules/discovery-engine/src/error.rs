use thiserror::Error;

pub use discovery_common::DiscoveryError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Request timed out")]
    Timeout,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

// reqwest renders the request URL into its message. Query strings can carry
// API keys, so errors are stringified without it.
impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        let err = err.without_url();
        if err.is_timeout() {
            FetchError::Timeout
        } else if err.is_builder() {
            FetchError::InvalidUrl(err.to_string())
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

/// Failure of a single search provider call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// Quota, billing or credential failure. The provider is suspended.
    #[error("Quota exhausted: {0}")]
    QuotaExhausted(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Provider call timed out")]
    Timeout,

    /// Malformed or unexpected response. Treated as "no result".
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },
}

impl ProviderError {
    /// Map a non-success HTTP status to a provider error.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 | 402 | 403 | 429 => ProviderError::QuotaExhausted(format!("HTTP {status}: {message}")),
            500..=599 => ProviderError::Network(format!("HTTP {status}: {message}")),
            _ => ProviderError::Api { status, message },
        }
    }

    /// Only transport-level failures are worth retrying in the same stage.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProviderError::Network(_))
    }

    pub fn suspends_provider(&self) -> bool {
        matches!(self, ProviderError::QuotaExhausted(_))
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        let err = err.without_url();
        if err.is_timeout() {
            ProviderError::Timeout
        } else if err.is_decode() {
            ProviderError::Parse(err.to_string())
        } else if let Some(status) = err.status() {
            ProviderError::from_status(status.as_u16(), err.to_string())
        } else {
            ProviderError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        ProviderError::Parse(err.to_string())
    }
}

impl From<apify_client::ApifyError> for ProviderError {
    fn from(err: apify_client::ApifyError) -> Self {
        use apify_client::ApifyError;
        match err {
            ApifyError::Network(m) => ProviderError::Network(m),
            ApifyError::Timeout => ProviderError::Timeout,
            ApifyError::Api { status, message } => ProviderError::from_status(status, message),
            ApifyError::Parse(m) => ProviderError::Parse(m),
        }
    }
}

impl From<browserless_client::BrowserlessError> for ProviderError {
    fn from(err: browserless_client::BrowserlessError) -> Self {
        use browserless_client::BrowserlessError;
        match err {
            BrowserlessError::Network(m) => ProviderError::Network(m),
            BrowserlessError::Timeout => ProviderError::Timeout,
            BrowserlessError::Api { status, message } => ProviderError::from_status(status, message),
        }
    }
}

impl From<ai_client::AiError> for ProviderError {
    fn from(err: ai_client::AiError) -> Self {
        use ai_client::AiError;
        match err {
            AiError::Network(m) => ProviderError::Network(m),
            AiError::Timeout => ProviderError::Timeout,
            AiError::Api { status, message } => ProviderError::from_status(status, message),
            AiError::Config(m) => ProviderError::QuotaExhausted(m),
            AiError::Parse(m) => ProviderError::Parse(m),
            AiError::EmptyResponse => ProviderError::Parse("empty completion".into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert!(ProviderError::from_status(429, "slow down").suspends_provider());
        assert!(ProviderError::from_status(401, "bad key").suspends_provider());
        assert!(ProviderError::from_status(402, "pay up").suspends_provider());
        assert!(ProviderError::from_status(403, "forbidden").suspends_provider());
        assert!(ProviderError::from_status(503, "down").is_retryable());
        assert_eq!(
            ProviderError::from_status(404, "nope"),
            ProviderError::Api {
                status: 404,
                message: "nope".into()
            }
        );
    }

    #[test]
    fn only_network_errors_retry() {
        assert!(ProviderError::Network("reset".into()).is_retryable());
        assert!(!ProviderError::Timeout.is_retryable());
        assert!(!ProviderError::Parse("bad json".into()).is_retryable());
        assert!(!ProviderError::QuotaExhausted("429".into()).is_retryable());
    }

    #[test]
    fn client_errors_convert() {
        let e: ProviderError = apify_client::ApifyError::Api {
            status: 402,
            message: "monthly usage exceeded".into(),
        }
        .into();
        assert!(e.suspends_provider());

        let e: ProviderError = browserless_client::BrowserlessError::Timeout.into();
        assert_eq!(e, ProviderError::Timeout);

        let e: ProviderError = ai_client::AiError::EmptyResponse.into();
        assert!(matches!(e, ProviderError::Parse(_)));
    }
}
