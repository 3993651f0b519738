//! Quakewatch - real-time Japanese earthquake feed monitor
//!
//! Wires the ingestion engine together: fetches the history snapshot, runs
//! the reconnecting WebSocket client, merges everything through the feed
//! reconciler, and logs accepted records (optionally with AI commentary).

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use dotenv::dotenv;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use quakewatch::config::FeedConfig;
use quakewatch::feed::{fetch_history, ConnectionStatus, QuakeFeed, QuakeWsClient};
use quakewatch::models::shindo_label;
use quakewatch::summary::{spawn_summary, GeminiClient};

#[derive(Debug, Parser)]
#[command(name = "quakewatch", about = "P2PQuake feed ingestion engine")]
struct Args {
    /// WebSocket URL of the live push feed
    #[arg(long, env = "QUAKE_WS_URL")]
    ws_url: Option<String>,

    /// Base URL of the REST API (history endpoint)
    #[arg(long, env = "QUAKE_API_BASE")]
    api_base: Option<String>,

    /// Number of historical records to fetch at startup
    #[arg(long, env = "QUAKE_HISTORY_LIMIT")]
    limit: Option<u32>,

    /// Generate AI commentary for each new event (needs GEMINI_API_KEY)
    #[arg(long)]
    summaries: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let mut config = FeedConfig::from_env();
    if let Some(ws_url) = args.ws_url {
        config.ws_url = ws_url;
    }
    if let Some(api_base) = args.api_base {
        config.api_base = api_base;
    }
    if let Some(limit) = args.limit {
        config.history_limit = limit;
    }

    info!(ws_url = %config.ws_url, api_base = %config.api_base, "starting quakewatch");

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()?;

    let feed = Arc::new(QuakeFeed::new());
    let status = Arc::new(ConnectionStatus::new());

    let gemini = if args.summaries {
        let client = GeminiClient::from_env(http.clone());
        if !client.has_key() {
            warn!("--summaries set but GEMINI_API_KEY is missing, commentary will be a fixed notice");
        }
        Some(Arc::new(client))
    } else {
        None
    };

    // Live connection starts immediately, in parallel with the snapshot
    // fetch. Early live records sit in the unbounded event channel until the
    // ingest loop drains it after seeding; the reconciler's merge-based seed
    // keeps first-writer-wins semantics either way.
    let (ws_client, mut event_rx) = QuakeWsClient::new(config.clone(), Arc::clone(&status));
    let stop = ws_client.stop_handle();
    let ws_task = tokio::spawn(async move { ws_client.run().await });

    // Log connectivity transitions as a consumer of the status notifier.
    let mut status_rx = status.subscribe();
    tokio::spawn(async move {
        while status_rx.changed().await.is_ok() {
            let connected = *status_rx.borrow();
            if connected {
                info!("リアルタイム接続中 (connected)");
            } else {
                warn!("切断されました (disconnected)");
            }
        }
    });

    let history = fetch_history(&http, &config).await;
    let seeded = feed.seed(history);
    info!(seeded, "history snapshot applied");

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("shutdown requested");
                break;
            }
            event = event_rx.recv() => {
                let Some(event) = event else {
                    warn!("event channel closed");
                    break;
                };
                if feed.merge(event.clone()) {
                    info!(
                        id = %event.id,
                        time = %event.earthquake.time,
                        hypocenter = %event.earthquake.hypocenter.name,
                        magnitude = event.earthquake.hypocenter.magnitude,
                        max_scale = %shindo_label(event.earthquake.max_scale),
                        tsunami = %event.earthquake.domestic_tsunami.label_ja(),
                        feed_len = feed.len(),
                        "new earthquake event"
                    );
                    if let Some(gemini) = &gemini {
                        spawn_summary(Arc::clone(gemini), event);
                    }
                }
            }
        }
    }

    stop.stop();
    let _ = ws_task.await;

    Ok(())
}
