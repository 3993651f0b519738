pub mod history; // One-shot startup snapshot (fail-soft)
pub mod reconciler; // Ordered, deduplicated single source of truth
pub mod status; // Boolean connectivity notifier
pub mod ws; // Reconnecting streaming client

pub use history::fetch_history;
pub use reconciler::QuakeFeed;
pub use status::ConnectionStatus;
pub use ws::{QuakeWsClient, WsMetrics, WsStopHandle};
