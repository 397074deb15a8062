//! Shared helpers for tests that run against a live marketplace
//! service. The service base URL comes from `COURIER_API_URL` (same
//! variable the engine reads), defaulting to a local instance.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use courier_client::config::ClientConfig;
use courier_client::engine::Engine;

/// Unique suffix for test identities so repeated runs against the same
/// service don't collide.
pub fn unique(prefix: &str) -> String {
    format!("{prefix}-{}", chrono::Utc::now().timestamp_millis())
}

/// Starts an engine with its session stored under `dir`, pointed at the
/// service named by the environment.
pub async fn start_engine(dir: &std::path::Path) -> Arc<Engine> {
    let config = ClientConfig {
        session_dir: Some(dir.to_path_buf()),
        ..ClientConfig::from_env().expect("engine configuration")
    };
    Engine::start(config).await.expect("engine start")
}

/// Polls `probe` until it yields a value or the deadline passes. Each
/// attempt runs a fresh reconciliation pass first so the test observes
/// server state promptly instead of waiting out the poll interval.
pub async fn wait_for<T, F, Fut>(engine: &Engine, deadline: Duration, mut probe: F) -> T
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let stop = Instant::now() + deadline;
    loop {
        if let Err(e) = engine.refresh().await {
            tracing::warn!("refresh during wait failed: {e}");
        }
        if let Some(value) = probe().await {
            return value;
        }
        if Instant::now() >= stop {
            panic!("condition not reached within {deadline:?}");
        }
        tokio::time::sleep(Duration::from_millis(250)).await;
    }
}
