use serde::Serialize;
use serde_json::Value;

use crate::cache::policy;
use crate::error::ClientError;
use crate::service::DashboardClient;
use crate::types::SentimentData;

/// Request for batch entry/exit signal generation.
#[derive(Debug, Clone, Serialize)]
pub struct SignalRequest {
    pub symbols: Vec<String>,
    pub timeframe: String,
    pub min_confidence: f64,
}

impl DashboardClient {
    /// Runs enhanced pattern detection for one symbol. Detection changes the
    /// aggregate statistics, so those are invalidated on success.
    pub async fn detect_patterns(&self, symbol: &str) -> Result<Value, ClientError> {
        let data = self
            .transport()
            .post(
                "/api/detect-enhanced",
                serde_json::json!({ "symbol": symbol }),
            )
            .await?;
        self.cache().invalidate(&policy::pattern_stats());
        Ok(data)
    }

    /// Aggregate detection statistics; refreshed only through invalidation.
    pub async fn pattern_stats(&self) -> Result<Value, ClientError> {
        self.query(
            policy::pattern_stats(),
            policy::ON_DEMAND,
            "/api/pattern-stats".to_string(),
            Vec::new(),
        )
        .await
    }

    pub async fn patterns_list(&self) -> Result<Value, ClientError> {
        self.query(
            policy::patterns_list(),
            policy::ON_DEMAND,
            "/api/patterns/list".to_string(),
            Vec::new(),
        )
        .await
    }

    pub async fn explain_pattern(&self, pattern_name: &str) -> Result<Value, ClientError> {
        self.transport()
            .get(&format!("/api/explain/pattern/{pattern_name}"), &[])
            .await
    }

    pub async fn explain_alert(&self, alert: Value) -> Result<Value, ClientError> {
        self.transport().post("/api/explain/alert", alert).await
    }

    pub async fn sentiment(&self, symbol: &str) -> Result<SentimentData, ClientError> {
        self.query(
            policy::sentiment(symbol),
            policy::ON_DEMAND,
            format!("/api/sentiment/{symbol}"),
            Vec::new(),
        )
        .await
    }

    pub async fn enhance_confidence(&self, request: Value) -> Result<Value, ClientError> {
        self.transport()
            .post("/api/sentiment/enhance-confidence", request)
            .await
    }

    pub async fn sentiment_alert_condition(&self, request: Value) -> Result<Value, ClientError> {
        self.transport()
            .post("/api/sentiment/alert-condition", request)
            .await
    }

    pub async fn twitter_health(&self) -> Result<Value, ClientError> {
        self.transport().get("/api/sentiment/twitter-health", &[]).await
    }

    pub async fn entry_exit_signals(
        &self,
        symbol: &str,
        timeframe: &str,
        signal_type: &str,
    ) -> Result<Value, ClientError> {
        self.query(
            policy::entry_exit_signals(symbol, timeframe, signal_type),
            policy::ON_DEMAND,
            "/api/signals/entry-exit".to_string(),
            vec![
                ("symbol".to_string(), symbol.to_string()),
                ("timeframe".to_string(), timeframe.to_string()),
                ("type".to_string(), signal_type.to_string()),
            ],
        )
        .await
    }

    pub async fn create_signals(&self, request: &SignalRequest) -> Result<Value, ClientError> {
        self.transport()
            .post("/api/signals/entry-exit", serde_json::to_value(request)?)
            .await
    }
}
