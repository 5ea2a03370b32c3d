//! HTTP seed-service client.
//!
//! Pulls seed bytes from one or more HTTP endpoints serving hex-encoded
//! entropy (`GET {url}/seed/{bytes}` returning `{"seed": "<hex>"}`).
//! Endpoints are tried in order per batch; large requests are split into
//! batches capped by the configured request size.
//!
//! After a transport failure the source refuses further attempts for a
//! retry-delay window, surfaced through `is_worth_trying` so the seeder can
//! skip it cheaply instead of stacking doomed requests.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use reqwest::blocking::Client;
use serde::Deserialize;

use crate::config::WebSeedConfig;

use super::{SeedError, SeedSource, SourceKey};

#[derive(Deserialize)]
struct SeedResponse {
    seed: String,
}

/// Seed source backed by an HTTP entropy service.
pub struct WebSeedSource {
    urls: Vec<String>,
    max_request_bytes: usize,
    retry_delay: Duration,
    client: Client,
    /// Earliest next attempt after a transport failure; None when healthy.
    backoff_until: Mutex<Option<Instant>>,
}

impl WebSeedSource {
    pub fn from_config(config: &WebSeedConfig) -> Self {
        Self {
            urls: config.urls.clone(),
            max_request_bytes: config.max_request_bytes.max(1),
            retry_delay: Duration::from_millis(config.retry_delay_ms),
            client: Client::builder()
                .timeout(Duration::from_secs(config.timeout_secs))
                .build()
                .unwrap_or_default(),
            backoff_until: Mutex::new(None),
        }
    }

    fn fetch_batch(&self, length: usize) -> Result<Vec<u8>, SeedError> {
        for url in &self.urls {
            let endpoint = format!("{}/seed/{}", url.trim_end_matches('/'), length);
            match self.fetch_from(&endpoint, length) {
                Ok(bytes) => return Ok(bytes),
                Err(e) => log::debug!("seed endpoint {} failed: {}", endpoint, e),
            }
        }
        Err(SeedError::Transport)
    }

    fn fetch_from(&self, endpoint: &str, length: usize) -> Result<Vec<u8>, SeedError> {
        let response = self
            .client
            .get(endpoint)
            .send()
            .map_err(|_| SeedError::Transport)?;
        if !response.status().is_success() {
            return Err(SeedError::Transport);
        }
        let body: SeedResponse = response.json().map_err(|_| SeedError::Transport)?;
        let bytes = hex::decode(&body.seed).map_err(|_| SeedError::Transport)?;
        if bytes.len() != length {
            return Err(SeedError::ShortRead {
                requested: length,
                got: bytes.len(),
            });
        }
        Ok(bytes)
    }

    fn note_failure(&self) {
        *self.lock_backoff() = Some(Instant::now() + self.retry_delay);
    }

    fn lock_backoff(&self) -> MutexGuard<'_, Option<Instant>> {
        self.backoff_until
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl SeedSource for WebSeedSource {
    fn generate_seed(&self, length: usize) -> Result<Vec<u8>, SeedError> {
        if length == 0 {
            return Ok(Vec::new());
        }
        if !self.is_worth_trying() {
            return Err(SeedError::Backoff);
        }
        let mut seed = Vec::with_capacity(length);
        while seed.len() < length {
            let batch = (length - seed.len()).min(self.max_request_bytes);
            match self.fetch_batch(batch) {
                Ok(bytes) => seed.extend_from_slice(&bytes),
                Err(e) => {
                    self.note_failure();
                    return Err(e);
                }
            }
        }
        Ok(seed)
    }

    fn is_worth_trying(&self) -> bool {
        match *self.lock_backoff() {
            Some(until) => Instant::now() >= until,
            None => true,
        }
    }

    fn key(&self) -> SourceKey {
        SourceKey::new(format!("web:{}", self.urls.join(",")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(retry_delay_ms: u64) -> WebSeedSource {
        WebSeedSource::from_config(&WebSeedConfig {
            urls: vec![
                "https://entropy.example/a/".to_owned(),
                "https://entropy.example/b".to_owned(),
            ],
            timeout_secs: 1,
            retry_delay_ms,
            max_request_bytes: 64,
        })
    }

    #[test]
    fn test_identity_follows_endpoint_list() {
        assert_eq!(source(10).key(), source(99).key());
        let other = WebSeedSource::from_config(&WebSeedConfig {
            urls: vec!["https://entropy.example/c".to_owned()],
            ..WebSeedConfig::default()
        });
        assert_ne!(source(10).key(), other.key());
    }

    #[test]
    fn test_backoff_window_gates_attempts() {
        let source = source(60_000);
        assert!(source.is_worth_trying());
        source.note_failure();
        assert!(!source.is_worth_trying());
        assert_eq!(source.generate_seed(16), Err(SeedError::Backoff));
    }

    #[test]
    fn test_backoff_window_expires() {
        let source = source(1);
        source.note_failure();
        std::thread::sleep(Duration::from_millis(5));
        assert!(source.is_worth_trying());
    }

    #[test]
    fn test_zero_length_needs_no_network() {
        let source = source(10);
        assert_eq!(source.generate_seed(0), Ok(Vec::new()));
    }
}
