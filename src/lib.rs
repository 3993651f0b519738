//! Quakewatch - P2PQuake feed ingestion engine
//!
//! Merges the historical snapshot endpoint and the live WebSocket push feed
//! into one deduplicated, time-ordered event feed, and keeps the live
//! connection alive across network interruptions. Rendering is somebody
//! else's problem: consumers get an ordered event list and a boolean
//! connectivity signal, nothing more.

pub mod config;
pub mod feed;
pub mod models;
pub mod summary;

pub use config::FeedConfig;
pub use feed::{ConnectionStatus, QuakeFeed, QuakeWsClient, WsStopHandle};
pub use models::QuakeEvent;
