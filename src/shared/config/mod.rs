//! Engine configuration module
//!
//! Provides the tunables of the reconciliation engine.

use std::time::Duration;
use thiserror::Error;

/// Default window for matching a realtime echo against an open provisional
const DEFAULT_MATCH_WINDOW: Duration = Duration::from_secs(10);

/// Default bound on send/edit/delete confirmation waits
const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(15);

/// Default page size for history fetches
const DEFAULT_PAGE_SIZE: u32 = 50;

/// Default capacity of the cache update broadcast channel
const DEFAULT_BROADCAST_CAPACITY: usize = 256;

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum distance between a provisional's client timestamp and an
    /// incoming record's timestamp for a heuristic echo match
    pub provisional_match_window: Duration,
    /// Bound on send/edit/delete confirmation waits before Pending -> Failed
    pub send_timeout: Duration,
    /// Records requested per history page
    pub history_page_size: u32,
    /// Capacity of the cache update broadcast channel
    pub broadcast_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            provisional_match_window: DEFAULT_MATCH_WINDOW,
            send_timeout: DEFAULT_SEND_TIMEOUT,
            history_page_size: DEFAULT_PAGE_SIZE,
            broadcast_capacity: DEFAULT_BROADCAST_CAPACITY,
        }
    }
}

impl EngineConfig {
    /// Create a new EngineConfigBuilder
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }
}

/// Builder for EngineConfig
#[derive(Debug, Default)]
pub struct EngineConfigBuilder {
    provisional_match_window: Option<Duration>,
    send_timeout: Option<Duration>,
    history_page_size: Option<u32>,
    broadcast_capacity: Option<usize>,
}

impl EngineConfigBuilder {
    /// Set the provisional echo match window
    pub fn provisional_match_window(mut self, window: Duration) -> Self {
        self.provisional_match_window = Some(window);
        self
    }

    /// Set the send/edit/delete confirmation timeout
    pub fn send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = Some(timeout);
        self
    }

    /// Set the history page size
    pub fn history_page_size(mut self, size: u32) -> Self {
        self.history_page_size = Some(size);
        self
    }

    /// Set the broadcast channel capacity
    pub fn broadcast_capacity(mut self, capacity: usize) -> Self {
        self.broadcast_capacity = Some(capacity);
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<EngineConfig, ConfigError> {
        let config = EngineConfig {
            provisional_match_window: self
                .provisional_match_window
                .unwrap_or(DEFAULT_MATCH_WINDOW),
            send_timeout: self.send_timeout.unwrap_or(DEFAULT_SEND_TIMEOUT),
            history_page_size: self.history_page_size.unwrap_or(DEFAULT_PAGE_SIZE),
            broadcast_capacity: self.broadcast_capacity.unwrap_or(DEFAULT_BROADCAST_CAPACITY),
        };
        if config.history_page_size == 0 {
            return Err(ConfigError::InvalidValue("history_page_size must be > 0"));
        }
        if config.broadcast_capacity == 0 {
            return Err(ConfigError::InvalidValue("broadcast_capacity must be > 0"));
        }
        if config.send_timeout.is_zero() {
            return Err(ConfigError::InvalidValue("send_timeout must be > 0"));
        }
        Ok(config)
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value: {0}")]
    InvalidValue(&'static str),
}
