use serde::Serialize;
use serde_json::Value;

use crate::cache::policy;
use crate::error::ClientError;
use crate::service::{DashboardClient, PollHandle};

/// User reaction to an actionable alert.
#[derive(Debug, Clone, Serialize)]
pub struct AlertResponse {
    pub alert_id: String,
    pub response: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
}

impl DashboardClient {
    /// Currently active alerts, cached for 15s. The REST payload keeps the
    /// server's own shape; only push-channel alerts go through the normalizer.
    pub async fn active_alerts(&self) -> Result<Value, ClientError> {
        self.query(
            policy::active_alerts(),
            policy::ACTIVE_ALERTS,
            "/api/get_active_alerts".to_string(),
            Vec::new(),
        )
        .await
    }

    pub async fn dismiss_alert(&self, alert_id: u64) -> Result<Value, ClientError> {
        let data = self
            .transport()
            .post(&format!("/api/alerts/dismiss/{alert_id}"), Value::Null)
            .await?;
        self.cache().invalidate(&policy::active_alerts());
        Ok(data)
    }

    pub async fn handle_alert_response(
        &self,
        response: &AlertResponse,
    ) -> Result<Value, ClientError> {
        let data = self
            .transport()
            .post("/api/handle_alert_response", serde_json::to_value(response)?)
            .await?;
        self.cache().invalidate(&policy::active_alerts());
        Ok(data)
    }

    pub fn watch_active_alerts(&self) -> PollHandle {
        self.watch(
            policy::active_alerts(),
            policy::ACTIVE_ALERTS,
            "/api/get_active_alerts".to_string(),
            Vec::new(),
        )
    }
}
