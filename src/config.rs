use std::time::Duration;

use crate::error::ClientError;

pub const DEFAULT_API_BASE: &str = "http://localhost:5000";
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const MAX_RECONNECT_ATTEMPTS: u32 = 5;
pub const RECONNECT_BASE_DELAY: Duration = Duration::from_millis(1_000);

/// Resolved once at startup; holds everything the transport and the push
/// channel need. The push base falls back to the API base when unset.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub push_base_url: String,
    /// Forces the long-polling fallback transport on the push channel. This
    /// is environment-driven configuration, never negotiated at runtime.
    pub force_polling: bool,
    pub connect_timeout: Duration,
    pub max_reconnect_attempts: u32,
    pub reconnect_base_delay: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE.to_string(),
            push_base_url: DEFAULT_API_BASE.to_string(),
            force_polling: false,
            connect_timeout: CONNECT_TIMEOUT,
            max_reconnect_attempts: MAX_RECONNECT_ATTEMPTS,
            reconnect_base_delay: RECONNECT_BASE_DELAY,
        }
    }
}

impl ClientConfig {
    /// Loads `.env` if present, then reads `API_BASE`, `PUSH_BASE` and
    /// `PUSH_TRANSPORT` from the environment.
    pub fn from_env() -> Result<Self, ClientError> {
        dotenvy::dotenv().ok();
        Self::build_from_env()
    }

    pub fn from_env_file(path: &str) -> Result<Self, ClientError> {
        dotenvy::from_filename(path).ok();
        Self::build_from_env()
    }

    fn build_from_env() -> Result<Self, ClientError> {
        let api_base_url = env("API_BASE", DEFAULT_API_BASE);
        let push_base_url = std::env::var("PUSH_BASE").unwrap_or_else(|_| api_base_url.clone());
        let force_polling = env("PUSH_TRANSPORT", "").eq_ignore_ascii_case("polling");

        let config = Self {
            api_base_url,
            push_base_url,
            force_polling,
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ClientError> {
        for (name, value) in [
            ("API_BASE", &self.api_base_url),
            ("PUSH_BASE", &self.push_base_url),
        ] {
            if !value.starts_with("http://") && !value.starts_with("https://") {
                return Err(ClientError::InvalidArgument(format!(
                    "{name} must be an http(s) URL, got '{value}'"
                )));
            }
        }
        Ok(())
    }

    /// WebSocket endpoint derived from the push base URL. The forced-polling
    /// flag travels as a query parameter for the server to honor.
    pub fn push_endpoint(&self) -> String {
        let base = self
            .push_base_url
            .trim_end_matches('/')
            .replacen("http", "ws", 1);
        if self.force_polling {
            format!("{base}/ws?transport=polling")
        } else {
            format!("{base}/ws")
        }
    }
}

fn env(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
