//! Configuration management for everseed.
//!
//! Defines the structure for host-configurable settings.

/// Main configuration structure for the everseed library.
///
/// This struct should be populated by the host application and handed to the
/// respective modules (`SeederDirectory::new`, `WebSeedSource::from_config`).
#[derive(Debug, Clone)]
pub struct EverseedConfig {
    /// Background reseeding settings.
    pub seeder: SeederConfig,

    /// HTTP seed-service settings (used by the `web-seed` feature).
    pub web: WebSeedConfig,
}

impl Default for EverseedConfig {
    fn default() -> Self {
        Self {
            seeder: SeederConfig::default(),
            web: WebSeedConfig::default(),
        }
    }
}

/// Configuration for the background reseeding task.
#[derive(Debug, Clone)]
pub struct SeederConfig {
    /// Sleep between polling passes when no generator consumed seed material,
    /// in milliseconds. Keeps the task from spinning while every registered
    /// generator still has entropy left.
    pub poll_interval_ms: u64,
}

impl Default for SeederConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 10,
        }
    }
}

/// Configuration for the HTTP seed-service client.
#[derive(Debug, Clone)]
pub struct WebSeedConfig {
    /// Endpoint base URLs, tried in order. There is no meaningful default
    /// service; the host must supply its own endpoints.
    pub urls: Vec<String>,

    /// Transport timeout per request, in seconds.
    pub timeout_secs: u64,

    /// After a transport failure, further attempts auto-fail for this long
    /// (milliseconds) and `is_worth_trying` reports false.
    pub retry_delay_ms: u64,

    /// Largest number of bytes requested from the service in one call.
    /// Larger seeds are assembled from multiple requests.
    pub max_request_bytes: usize,
}

impl Default for WebSeedConfig {
    fn default() -> Self {
        Self {
            urls: Vec::new(),
            timeout_secs: 10,
            retry_delay_ms: 10_000,
            max_request_bytes: 256,
        }
    }
}
