use reqwest::{Client, Method, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::ClientError;

/// Server response envelope. Every endpoint wraps its payload as
/// `{success, data}` on success or `{success: false, error}` on failure.
#[derive(Debug, Deserialize)]
struct Envelope {
    success: bool,
    #[serde(default)]
    data: Value,
    #[serde(default)]
    error: Option<String>,
}

/// Single point of HTTP egress. Unwraps the envelope and returns `data`
/// directly; a 2xx body with `success: false` is rejected as a logical
/// failure rather than passed through. No retry happens here — retry is
/// the cache layer's next poll tick or an explicit user action.
#[derive(Debug, Clone)]
pub struct Transport {
    base_url: String,
    client: Client,
}

impl Transport {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn get(&self, path: &str, params: &[(String, String)]) -> Result<Value, ClientError> {
        self.request(Method::GET, path, params, None).await
    }

    /// POST with a JSON body; pass `Value::Null` for body-less mutations.
    pub async fn post(&self, path: &str, body: Value) -> Result<Value, ClientError> {
        self.request(Method::POST, path, &[], Some(body)).await
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        params: &[(String, String)],
        body: Option<Value>,
    ) -> Result<Value, ClientError> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.client.request(method, &url);
        if !params.is_empty() {
            request = request.query(params);
        }
        if let Some(body) = body {
            if !body.is_null() {
                request = request.json(&body);
            }
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(error) if error.is_connect() || error.is_timeout() => {
                debug!(%url, %error, "transport unreachable");
                return Err(ClientError::Network);
            }
            Err(error) => return Err(ClientError::Http(error)),
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.json::<Value>().await.unwrap_or(Value::Null);
            if let Some(message) = body.get("error").and_then(Value::as_str) {
                return Err(ClientError::Api(message.to_string()));
            }
            if status == StatusCode::NOT_FOUND {
                return Err(ClientError::EndpointNotFound);
            }
            if status.is_server_error() {
                return Err(ClientError::ServerError);
            }
            return Err(ClientError::UnexpectedStatus(status.as_u16()));
        }

        let envelope = response.json::<Envelope>().await?;
        if !envelope.success {
            return Err(ClientError::Logical(
                envelope
                    .error
                    .unwrap_or_else(|| "server reported failure".to_string()),
            ));
        }
        Ok(envelope.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::spawn_one_shot_server;
    use tokio::net::TcpListener;

    fn transport_for(base: String) -> Transport {
        Transport::new(&ClientConfig {
            api_base_url: base,
            ..ClientConfig::default()
        })
    }

    #[tokio::test]
    async fn unwraps_success_envelope() {
        let base =
            spawn_one_shot_server("200 OK", r#"{"success":true,"data":{"symbol":"AAPL"}}"#).await;
        let data = transport_for(base).get("/api/market/AAPL", &[]).await.unwrap();
        assert_eq!(data["symbol"], "AAPL");
    }

    #[tokio::test]
    async fn rejects_success_false_at_http_200() {
        let base = spawn_one_shot_server(
            "200 OK",
            r#"{"success":false,"error":"scanner already running"}"#,
        )
        .await;
        let error = transport_for(base)
            .post("/api/scan/start", Value::Null)
            .await
            .unwrap_err();
        assert!(matches!(error, ClientError::Logical(ref m) if m == "scanner already running"));
    }

    #[tokio::test]
    async fn maps_404_to_endpoint_not_found() {
        let base = spawn_one_shot_server("404 Not Found", "{}").await;
        let error = transport_for(base)
            .get("/api/market/ZZZZ", &[])
            .await
            .unwrap_err();
        assert_eq!(error.to_string(), "API endpoint not found");
    }

    #[tokio::test]
    async fn prefers_server_error_message_over_status_category() {
        let base =
            spawn_one_shot_server("404 Not Found", r#"{"error":"unknown symbol ZZZZ"}"#).await;
        let error = transport_for(base)
            .get("/api/market/ZZZZ", &[])
            .await
            .unwrap_err();
        assert!(matches!(error, ClientError::Api(ref m) if m == "unknown symbol ZZZZ"));
    }

    #[tokio::test]
    async fn maps_5xx_to_fixed_server_error() {
        let base = spawn_one_shot_server("503 Service Unavailable", "{}").await;
        let error = transport_for(base).get("/api/features", &[]).await.unwrap_err();
        assert_eq!(error.to_string(), "Server error. Please try again later.");
    }

    #[tokio::test]
    async fn maps_unreachable_host_to_network_error() {
        // Bind then drop so the port is very likely closed.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let error = transport_for(format!("http://{addr}"))
            .get("/api/features", &[])
            .await
            .unwrap_err();
        assert_eq!(
            error.to_string(),
            "Network error. Please check your connection."
        );
    }
}
