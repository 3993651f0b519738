//! Feed configuration with environment overrides.

use std::time::Duration;

pub const P2P_WS_URL: &str = "wss://api.p2pquake.net/v2/ws";
pub const P2P_API_BASE: &str = "https://api.p2pquake.net/v2";

/// Configuration for the ingestion engine.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// WebSocket URL for the live push feed
    pub ws_url: String,
    /// Base URL for the REST history endpoint
    pub api_base: String,
    /// Number of historical records fetched at startup
    pub history_limit: u32,
    /// Flat delay between reconnect attempts. No backoff, no jitter; the
    /// upstream feed is public and a fixed 5s interval is deliberate.
    pub reconnect_delay: Duration,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            ws_url: P2P_WS_URL.to_string(),
            api_base: P2P_API_BASE.to_string(),
            history_limit: 20,
            reconnect_delay: Duration::from_secs(5),
        }
    }
}

impl FeedConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(v) = std::env::var("QUAKE_WS_URL") {
            if !v.is_empty() {
                cfg.ws_url = v;
            }
        }
        if let Ok(v) = std::env::var("QUAKE_API_BASE") {
            if !v.is_empty() {
                cfg.api_base = v;
            }
        }
        if let Ok(v) = std::env::var("QUAKE_HISTORY_LIMIT") {
            if let Ok(n) = v.parse() {
                cfg.history_limit = n;
            }
        }
        if let Ok(v) = std::env::var("QUAKE_RECONNECT_DELAY_MS") {
            if let Ok(ms) = v.parse() {
                cfg.reconnect_delay = Duration::from_millis(ms);
            }
        }

        cfg
    }

    /// Full history URL with the fixed notification-type filter.
    pub fn history_url(&self) -> String {
        format!(
            "{}/history?codes=551&limit={}",
            self.api_base, self.history_limit
        )
    }
}
