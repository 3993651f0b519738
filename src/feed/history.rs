//! One-shot historical snapshot fetch.
//!
//! Issues a single bounded GET against the history endpoint at startup.
//! Fails soft: a missing snapshot must never prevent the live stream from
//! starting, so every transport or decode error degrades to an empty list.

use anyhow::{Context, Result};
use reqwest::Client;
use tracing::{debug, error};

use crate::config::FeedConfig;
use crate::models::QuakeEvent;

/// Fetch the most recent historical records (fixed code filter, fixed page
/// size, single attempt, no retry).
pub async fn fetch_history(client: &Client, config: &FeedConfig) -> Vec<QuakeEvent> {
    match try_fetch_history(client, config).await {
        Ok(events) => {
            debug!(count = events.len(), "fetched quake history");
            events
        }
        Err(e) => {
            error!(error = %e, "failed to fetch quake history, starting with empty feed");
            Vec::new()
        }
    }
}

async fn try_fetch_history(client: &Client, config: &FeedConfig) -> Result<Vec<QuakeEvent>> {
    let url = config.history_url();

    let resp = client
        .get(&url)
        .send()
        .await
        .context("GET /history failed")?;

    if !resp.status().is_success() {
        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        return Err(anyhow::anyhow!("GET /history {}: {}", status, text));
    }

    resp.json::<Vec<QuakeEvent>>()
        .await
        .context("Failed to parse history response")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unreachable_endpoint_degrades_to_empty() {
        // Bind-then-drop gives us a local port with nothing listening.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let config = FeedConfig {
            api_base: format!("http://127.0.0.1:{port}/v2"),
            ..FeedConfig::default()
        };
        let client = Client::new();
        let events = fetch_history(&client, &config).await;
        assert!(events.is_empty());
    }
}
