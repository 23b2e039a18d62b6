//! Client-side data layer for a trading-intelligence dashboard backend:
//! HTTP transport with envelope unwrapping, a realtime push channel with
//! reconnect and payload normalization, and a keyed query cache with
//! deduplication and background polling.

pub mod api;
pub mod cache;
pub mod channel;
pub mod config;
pub mod error;
pub mod service;
pub mod transport;
pub mod types;

#[cfg(test)]
pub(crate) mod testutil;

pub use config::ClientConfig;
pub use error::ClientError;
pub use service::{DashboardClient, PollHandle};
