//! Refresh policies and cache keys for every server resource the dashboard
//! reads. Poll intervals mirror how quickly each resource goes stale on the
//! server side; resources without an interval are fetched on demand and kept
//! until invalidated.

use std::time::Duration;

use super::{QueryPolicy, ResourceKey};
use crate::types::ScanType;

pub const MARKET_SCAN: QueryPolicy = QueryPolicy::polled(Duration::from_secs(30));
pub const MARKET_DATA: QueryPolicy = QueryPolicy::polled(Duration::from_secs(5));
pub const CANDLES: QueryPolicy = QueryPolicy::polled(Duration::from_secs(60));
pub const SCANNER_STATUS: QueryPolicy = QueryPolicy::polled(Duration::from_secs(10));
pub const ACTIVE_ALERTS: QueryPolicy = QueryPolicy::polled(Duration::from_secs(15));
pub const POSITIONS: QueryPolicy = QueryPolicy::polled(Duration::from_secs(30));
pub const ON_DEMAND: QueryPolicy = QueryPolicy::on_demand();

pub fn market_scan(scan_type: ScanType) -> ResourceKey {
    ResourceKey::new("/api/market-scan", vec![scan_type.as_str().to_string()])
}

pub fn market_data(symbol: &str) -> ResourceKey {
    ResourceKey::new("/api/market", vec![symbol.to_string()])
}

pub fn candles(symbol: &str, period: &str, interval: &str) -> ResourceKey {
    ResourceKey::new(
        "/api/candles",
        vec![symbol.to_string(), period.to_string(), interval.to_string()],
    )
}

pub fn scanner_status() -> ResourceKey {
    ResourceKey::bare("/api/scan/status")
}

pub fn scanner_config() -> ResourceKey {
    ResourceKey::bare("/api/scan/config")
}

pub fn active_alerts() -> ResourceKey {
    ResourceKey::bare("/api/get_active_alerts")
}

pub fn positions() -> ResourceKey {
    ResourceKey::bare("/api/paper-trades")
}

pub fn pattern_stats() -> ResourceKey {
    ResourceKey::bare("/api/pattern-stats")
}

pub fn patterns_list() -> ResourceKey {
    ResourceKey::bare("/api/patterns/list")
}

pub fn strategies() -> ResourceKey {
    ResourceKey::bare("/api/strategies")
}

pub fn analytics_summary() -> ResourceKey {
    ResourceKey::bare("/api/analytics/summary")
}

pub fn trading_stats() -> ResourceKey {
    ResourceKey::bare("/api/trading-stats")
}

pub fn detection_stats() -> ResourceKey {
    ResourceKey::bare("/api/detection_stats")
}

pub fn sentiment(symbol: &str) -> ResourceKey {
    ResourceKey::new("/api/sentiment", vec![symbol.to_string()])
}

pub fn entry_exit_signals(symbol: &str, timeframe: &str, signal_type: &str) -> ResourceKey {
    ResourceKey::new(
        "/api/signals/entry-exit",
        vec![
            symbol.to_string(),
            timeframe.to_string(),
            signal_type.to_string(),
        ],
    )
}

pub fn risk_settings() -> ResourceKey {
    ResourceKey::bare("/api/risk-settings")
}

pub fn recommendation(symbol: &str) -> ResourceKey {
    ResourceKey::new("/api/recommend/complete", vec![symbol.to_string()])
}

pub fn assets_list() -> ResourceKey {
    ResourceKey::bare("/api/assets/list")
}

pub fn features() -> ResourceKey {
    ResourceKey::bare("/api/features")
}

pub fn coverage() -> ResourceKey {
    ResourceKey::bare("/api/coverage")
}
