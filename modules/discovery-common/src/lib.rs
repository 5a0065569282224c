pub mod config;
pub mod error;
pub mod platform;
pub mod types;

pub use config::{DiscoveryConfig, ProviderCredentials, BROWSER_USER_AGENT, MIN_BATCH_DELAY};
pub use error::DiscoveryError;
pub use platform::{HostPattern, PlatformCategory, PlatformKey};
pub use types::*;
