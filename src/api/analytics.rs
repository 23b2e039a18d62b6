use serde::Serialize;
use serde_json::Value;

use crate::cache::policy;
use crate::error::ClientError;
use crate::service::DashboardClient;
use crate::types::BacktestResult;

/// Filter for the detection log listing and export endpoints.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DetectionLogQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days: Option<u64>,
}

impl DetectionLogQuery {
    fn to_params(&self) -> Vec<(String, String)> {
        let mut params = Vec::new();
        if let Some(limit) = self.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }
        if let Some(offset) = self.offset {
            params.push(("offset".to_string(), offset.to_string()));
        }
        if let Some(symbol) = &self.symbol {
            params.push(("symbol".to_string(), symbol.clone()));
        }
        if let Some(pattern) = &self.pattern {
            params.push(("pattern".to_string(), pattern.clone()));
        }
        if let Some(days) = self.days {
            params.push(("days".to_string(), days.to_string()));
        }
        params
    }
}

impl DashboardClient {
    pub async fn strategies(&self) -> Result<Value, ClientError> {
        self.query(
            policy::strategies(),
            policy::ON_DEMAND,
            "/api/strategies".to_string(),
            Vec::new(),
        )
        .await
    }

    /// Backtests are heavy, always run server-side on request and never
    /// cached.
    pub async fn run_backtest(&self, request: Value) -> Result<BacktestResult, ClientError> {
        let data = self.transport().post("/api/backtest", request).await?;
        Ok(serde_json::from_value(data)?)
    }

    pub async fn run_pattern_backtest(&self, request: Value) -> Result<BacktestResult, ClientError> {
        let data = self.transport().post("/api/backtest/pattern", request).await?;
        Ok(serde_json::from_value(data)?)
    }

    pub async fn run_strategy_backtest(
        &self,
        request: Value,
    ) -> Result<BacktestResult, ClientError> {
        let data = self
            .transport()
            .post("/api/backtest/strategy", request)
            .await?;
        Ok(serde_json::from_value(data)?)
    }

    pub async fn analytics_summary(&self) -> Result<Value, ClientError> {
        self.query(
            policy::analytics_summary(),
            policy::ON_DEMAND,
            "/api/analytics/summary".to_string(),
            Vec::new(),
        )
        .await
    }

    pub async fn trading_stats(&self) -> Result<Value, ClientError> {
        self.query(
            policy::trading_stats(),
            policy::ON_DEMAND,
            "/api/trading-stats".to_string(),
            Vec::new(),
        )
        .await
    }

    pub async fn detection_stats(&self) -> Result<Value, ClientError> {
        self.query(
            policy::detection_stats(),
            policy::ON_DEMAND,
            "/api/detection_stats".to_string(),
            Vec::new(),
        )
        .await
    }

    pub async fn detection_logs(&self, query: &DetectionLogQuery) -> Result<Value, ClientError> {
        self.transport()
            .get("/api/detection_logs", &query.to_params())
            .await
    }

    pub async fn export_detection_logs(
        &self,
        query: &DetectionLogQuery,
    ) -> Result<Value, ClientError> {
        self.transport()
            .get("/api/export_detection_logs", &query.to_params())
            .await
    }

    pub async fn assets_list(&self) -> Result<Value, ClientError> {
        self.query(
            policy::assets_list(),
            policy::ON_DEMAND,
            "/api/assets/list".to_string(),
            Vec::new(),
        )
        .await
    }

    pub async fn features(&self) -> Result<Value, ClientError> {
        self.query(
            policy::features(),
            policy::ON_DEMAND,
            "/api/features".to_string(),
            Vec::new(),
        )
        .await
    }

    pub async fn coverage(&self) -> Result<Value, ClientError> {
        self.query(
            policy::coverage(),
            policy::ON_DEMAND,
            "/api/coverage".to_string(),
            Vec::new(),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detection_log_query_emits_only_set_filters() {
        let query = DetectionLogQuery {
            limit: Some(50),
            symbol: Some("AAPL".to_string()),
            ..DetectionLogQuery::default()
        };
        assert_eq!(
            query.to_params(),
            vec![
                ("limit".to_string(), "50".to_string()),
                ("symbol".to_string(), "AAPL".to_string()),
            ]
        );
    }
}
