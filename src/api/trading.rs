use serde::Serialize;
use serde_json::Value;

use crate::cache::policy;
use crate::error::ClientError;
use crate::service::{DashboardClient, PollHandle};
use crate::types::{Position, Side};

/// Paper-trade order. Omitting `price` asks the server to fill at market.
#[derive(Debug, Clone, Serialize)]
pub struct TradeRequest {
    pub symbol: String,
    pub side: Side,
    pub quantity: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

/// Close by symbol, by trade id, or both.
#[derive(Debug, Clone, Serialize)]
pub struct CloseRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trade_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PreTradeCheck {
    pub symbol: String,
    pub position_size: f64,
    pub entry_price: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_loss: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub take_profit: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfileData {
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferences: Option<Value>,
}

impl DashboardClient {
    /// Open paper-trade positions, cached for 30s. Pnl figures are computed
    /// server-side and shown as received.
    pub async fn positions(&self) -> Result<Vec<Position>, ClientError> {
        self.query(
            policy::positions(),
            policy::POSITIONS,
            "/api/paper-trades".to_string(),
            Vec::new(),
        )
        .await
    }

    /// Places a paper trade. The positions list is only invalidated once the
    /// server confirmed the fill; a rejected order changes nothing locally.
    pub async fn place_trade(&self, request: &TradeRequest) -> Result<Value, ClientError> {
        let data = self
            .transport()
            .post("/api/paper-trades", serde_json::to_value(request)?)
            .await?;
        self.cache().invalidate(&policy::positions());
        Ok(data)
    }

    pub async fn close_position(&self, request: &CloseRequest) -> Result<Value, ClientError> {
        let data = self
            .transport()
            .post("/api/close-position", serde_json::to_value(request)?)
            .await?;
        self.cache().invalidate(&policy::positions());
        Ok(data)
    }

    pub async fn risk_settings(&self) -> Result<Value, ClientError> {
        self.query(
            policy::risk_settings(),
            policy::ON_DEMAND,
            "/api/risk-settings".to_string(),
            Vec::new(),
        )
        .await
    }

    pub async fn update_risk_settings(&self, settings: Value) -> Result<Value, ClientError> {
        let data = self.transport().post("/api/risk-settings", settings).await?;
        self.cache().invalidate(&policy::risk_settings());
        Ok(data)
    }

    pub async fn pre_trade_check(&self, request: &PreTradeCheck) -> Result<Value, ClientError> {
        self.transport()
            .post("/api/risk/pre-trade-check", serde_json::to_value(request)?)
            .await
    }

    pub async fn recommendation(&self, symbol: &str) -> Result<Value, ClientError> {
        self.query(
            policy::recommendation(symbol),
            policy::ON_DEMAND,
            "/api/recommend/complete".to_string(),
            vec![("symbol".to_string(), symbol.to_string())],
        )
        .await
    }

    pub async fn save_profile(&self, profile: &ProfileData) -> Result<Value, ClientError> {
        self.transport()
            .post("/api/save-profile", serde_json::to_value(profile)?)
            .await
    }

    pub fn watch_positions(&self) -> PollHandle {
        self.watch(
            policy::positions(),
            policy::POSITIONS,
            "/api/paper-trades".to_string(),
            Vec::new(),
        )
    }
}
