/// Client configuration
use crate::error::{ChatError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_API_URL: &str = "http://localhost:3000";
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Chat client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Backend base URL, e.g. "http://localhost:3000"
    pub api_base_url: String,

    /// Per-request timeout enforced by the HTTP gateway
    pub request_timeout: Duration,

    /// Fixed period between channel/direct snapshot fetches
    pub poll_interval: Duration,

    /// Data directory for the persisted session (defaults to `.chatlink`)
    pub data_dir: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            data_dir: None,
        }
    }
}

impl ClientConfig {
    /// Config from defaults plus environment overrides (nice for scripts):
    /// CHATLINK_API_URL, CHATLINK_DATA_DIR, CHATLINK_POLL_MS.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("CHATLINK_API_URL") {
            if url.trim().is_empty() {
                return Err(ChatError::Config(
                    "CHATLINK_API_URL must not be empty".to_string(),
                ));
            }
            config.api_base_url = url.trim_end_matches('/').to_string();
        }

        if let Ok(dir) = std::env::var("CHATLINK_DATA_DIR") {
            config.data_dir = Some(PathBuf::from(dir));
        }

        if let Ok(ms) = std::env::var("CHATLINK_POLL_MS") {
            let ms = ms.parse::<u64>().map_err(|_| {
                ChatError::Config("CHATLINK_POLL_MS must be a number of milliseconds".to_string())
            })?;
            if ms == 0 {
                return Err(ChatError::Config(
                    "CHATLINK_POLL_MS must be greater than zero".to_string(),
                ));
            }
            config.poll_interval = Duration::from_millis(ms);
        }

        Ok(config)
    }

    /// Effective data directory.
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(".chatlink"))
    }
}
