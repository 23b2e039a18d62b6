use serde::Serialize;
use serde_json::Value;

use crate::cache::policy;
use crate::error::ClientError;
use crate::service::{DashboardClient, PollHandle};
use crate::types::ScannerStatus;

/// Parameters for starting a background scan run.
#[derive(Debug, Clone, Serialize)]
pub struct ScanSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbols: Option<Vec<String>>,
    pub interval: u64,
    pub auto_alerts: bool,
}

impl DashboardClient {
    /// Scanner run state, cached for 10s.
    pub async fn scanner_status(&self) -> Result<ScannerStatus, ClientError> {
        self.query(
            policy::scanner_status(),
            policy::SCANNER_STATUS,
            "/api/scan/status".to_string(),
            Vec::new(),
        )
        .await
    }

    pub async fn scanner_config(&self) -> Result<Value, ClientError> {
        self.query(
            policy::scanner_config(),
            policy::ON_DEMAND,
            "/api/scan/config".to_string(),
            Vec::new(),
        )
        .await
    }

    pub async fn start_scanner(&self, settings: &ScanSettings) -> Result<Value, ClientError> {
        let data = self
            .transport()
            .post("/api/scan/start", serde_json::to_value(settings)?)
            .await?;
        self.cache().invalidate(&policy::scanner_status());
        Ok(data)
    }

    pub async fn stop_scanner(&self) -> Result<Value, ClientError> {
        let data = self.transport().post("/api/scan/stop", Value::Null).await?;
        self.cache().invalidate(&policy::scanner_status());
        Ok(data)
    }

    pub async fn set_scanner_config(&self, config: Value) -> Result<Value, ClientError> {
        let data = self.transport().post("/api/scan/config", config).await?;
        self.cache().invalidate(&policy::scanner_config());
        Ok(data)
    }

    pub fn watch_scanner_status(&self) -> PollHandle {
        self.watch(
            policy::scanner_status(),
            policy::SCANNER_STATUS,
            "/api/scan/status".to_string(),
            Vec::new(),
        )
    }
}
