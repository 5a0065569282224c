use thiserror::Error;

/// Errors a lookup can surface to its caller. Everything else (unreachable
/// websites, provider outages, exhausted quotas) degrades the result instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Lookup cancelled")]
    Cancelled,
}
