use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, RwLock};

use courier_common::wire;

use crate::api::Api;
use crate::error::Result;
use crate::session::{self, Session};

/// Fetches the signed-in user's wallet and folds it into the session.
/// A signed-out engine is a no-op. The persisted session is rewritten
/// only when the balances actually moved.
pub async fn refresh_wallet(
    api: &Api,
    session: &RwLock<Option<Session>>,
    session_dir: Option<&Path>,
) -> Result<()> {
    let user_id = match session.read().await.as_ref() {
        Some(live) => live.user.id.clone(),
        None => return Ok(()),
    };

    let record = api.get_wallet(&user_id).await?;
    let fresh = wire::map_wallet(&record);

    let mut guard = session.write().await;
    // Logout or re-login can race the fetch; the result only applies to
    // the user it was fetched for.
    let live = match guard.as_mut() {
        Some(live) if live.user.id == user_id => live,
        _ => return Ok(()),
    };
    if live.user.wallet == fresh {
        return Ok(());
    }
    tracing::debug!(
        "wallet sync: user {user_id} balance {} escrow {}",
        fresh.balance,
        fresh.escrow_held
    );
    live.user.wallet = fresh;
    if let Err(e) = session::save(session_dir, live) {
        tracing::warn!("wallet sync: persisting refreshed session failed: {e}");
    }
    Ok(())
}

/// Wallet refresh driver, on its own cadence independent of order
/// reconciliation. Failures are logged and retried next tick.
pub async fn run_wallet_sync(
    api: Arc<Api>,
    session: Arc<RwLock<Option<Session>>>,
    session_dir: Option<PathBuf>,
    poll_interval: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(poll_interval);
    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                tracing::debug!("wallet sync: shutting down");
                return;
            }
            _ = ticker.tick() => {}
        }
        if let Err(e) = refresh_wallet(&api, &session, session_dir.as_deref()).await {
            tracing::warn!("wallet sync: refresh failed: {e}");
        }
    }
}
