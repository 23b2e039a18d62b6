use serde_json::Value;

use crate::cache::policy;
use crate::error::ClientError;
use crate::service::{DashboardClient, PollHandle};
use crate::types::{MarketData, ScanType};

impl DashboardClient {
    /// Trending or volume movers, cached for 30s.
    pub async fn market_scan(&self, scan_type: ScanType) -> Result<Vec<MarketData>, ClientError> {
        self.query(
            policy::market_scan(scan_type),
            policy::MARKET_SCAN,
            "/api/market-scan".to_string(),
            vec![("type".to_string(), scan_type.as_str().to_string())],
        )
        .await
    }

    /// Live quote for one symbol, cached for 5s.
    pub async fn market_data(&self, symbol: &str) -> Result<MarketData, ClientError> {
        self.query(
            policy::market_data(symbol),
            policy::MARKET_DATA,
            format!("/api/market/{symbol}"),
            Vec::new(),
        )
        .await
    }

    /// Candle series for charting, cached for 60s. The payload shape varies
    /// by interval so it stays untyped.
    pub async fn candles(
        &self,
        symbol: &str,
        period: &str,
        interval: &str,
    ) -> Result<Value, ClientError> {
        self.query(
            policy::candles(symbol, period, interval),
            policy::CANDLES,
            "/api/candles".to_string(),
            vec![
                ("symbol".to_string(), symbol.to_string()),
                ("period".to_string(), period.to_string()),
                ("interval".to_string(), interval.to_string()),
            ],
        )
        .await
    }

    pub fn watch_market_scan(&self, scan_type: ScanType) -> PollHandle {
        self.watch(
            policy::market_scan(scan_type),
            policy::MARKET_SCAN,
            "/api/market-scan".to_string(),
            vec![("type".to_string(), scan_type.as_str().to_string())],
        )
    }

    pub fn watch_market_data(&self, symbol: &str) -> PollHandle {
        self.watch(
            policy::market_data(symbol),
            policy::MARKET_DATA,
            format!("/api/market/{symbol}"),
            Vec::new(),
        )
    }

    pub fn watch_candles(&self, symbol: &str, period: &str, interval: &str) -> PollHandle {
        self.watch(
            policy::candles(symbol, period, interval),
            policy::CANDLES,
            "/api/candles".to_string(),
            vec![
                ("symbol".to_string(), symbol.to_string()),
                ("period".to_string(), period.to_string()),
                ("interval".to_string(), interval.to_string()),
            ],
        )
    }
}
