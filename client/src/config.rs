use std::path::PathBuf;
use std::time::Duration;

use crate::error::{ClientError, Result};

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:4000/api";
pub const DEFAULT_POLL_SECS: u64 = 15;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_SWEEP_CONCURRENCY: usize = 4;

/// Runtime configuration for the sync engine.
///
/// Every knob has an environment override so deployments can point the
/// engine at a different marketplace without a rebuild.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the REST API, including the `/api` prefix.
    pub api_url: String,
    /// WebSocket endpoint for push notifications.
    pub ws_url: String,
    /// Cadence of the periodic reconciliation and wallet refresh.
    pub poll_interval: Duration,
    /// Per-request timeout applied to the HTTP client.
    pub http_timeout: Duration,
    /// Upper bound on concurrent escrow-sweep status updates.
    pub sweep_concurrency: usize,
    /// Directory holding the persisted session file. `None` falls back
    /// to the platform cache directory.
    pub session_dir: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            ws_url: derive_ws_url(DEFAULT_API_URL),
            poll_interval: Duration::from_secs(DEFAULT_POLL_SECS),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            sweep_concurrency: DEFAULT_SWEEP_CONCURRENCY,
            session_dir: None,
        }
    }
}

impl ClientConfig {
    /// Builds a configuration from `COURIER_*` environment variables,
    /// falling back to defaults for anything unset.
    pub fn from_env() -> Result<Self> {
        let api_url = std::env::var("COURIER_API_URL")
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let ws_url = std::env::var("COURIER_WS_URL")
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| derive_ws_url(&api_url));
        let poll_secs = parse_var("COURIER_POLL_SECS", DEFAULT_POLL_SECS)?;
        if poll_secs == 0 {
            return Err(ClientError::Config(
                "COURIER_POLL_SECS must be at least 1".to_string(),
            ));
        }
        let timeout_secs = parse_var("COURIER_HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS)?;
        let sweep_concurrency =
            parse_var("COURIER_SWEEP_CONCURRENCY", DEFAULT_SWEEP_CONCURRENCY)?.max(1);
        let session_dir = std::env::var("COURIER_SESSION_DIR")
            .ok()
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);

        Ok(Self {
            api_url,
            ws_url,
            poll_interval: Duration::from_secs(poll_secs),
            http_timeout: Duration::from_secs(timeout_secs),
            sweep_concurrency,
            session_dir,
        })
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match std::env::var(name) {
        Ok(raw) if !raw.is_empty() => raw
            .parse()
            .map_err(|_| ClientError::Config(format!("{name} has invalid value {raw:?}"))),
        _ => Ok(default),
    }
}

/// Derives the push endpoint from the REST base URL: swap the scheme
/// to its WebSocket counterpart, keep the authority, replace the path
/// with `/ws`.
pub fn derive_ws_url(api_url: &str) -> String {
    let (scheme, rest) = if let Some(rest) = api_url.strip_prefix("https://") {
        ("wss", rest)
    } else if let Some(rest) = api_url.strip_prefix("http://") {
        ("ws", rest)
    } else {
        ("ws", api_url)
    };
    let authority = rest.split('/').next().unwrap_or(rest);
    format!("{scheme}://{authority}/ws")
}
