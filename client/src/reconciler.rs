use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::{broadcast, mpsc};

use courier_common::order::OrderStatus;
use courier_common::reconcile;

use crate::api::Api;
use crate::error::Result;
use crate::state::SharedState;

/// Runs one reconciliation pass: fetch the four collections
/// concurrently, assemble the denormalized snapshot, install it under
/// the generation guard, then promote fully-funded orders.
///
/// Any fetch or decode failure aborts the pass and leaves the previous
/// snapshot in place. Returns whether the built snapshot was installed
/// (false means a younger pass won the race).
pub async fn reconcile_once(
    api: &Api,
    state: &SharedState,
    sweep_concurrency: usize,
) -> Result<bool> {
    let generation = state.begin_pass();

    let (orders, bids, messages, reviews) = tokio::join!(
        api.list_orders(),
        api.list_bids(None),
        api.list_messages(),
        api.list_reviews(),
    );
    let snapshot = reconcile::assemble(&orders?, &bids?, &messages?, &reviews?)?;
    let candidates = reconcile::sweep_candidates(&snapshot);
    let order_count = snapshot.orders.len();

    let installed = state.install(generation, snapshot).await;
    if !installed {
        tracing::debug!("reconcile: pass {generation} finished stale, discarded");
        return Ok(false);
    }
    tracing::debug!("reconcile: pass {generation} installed {order_count} order(s)");

    sweep_escrow_complete(api, candidates, sweep_concurrency).await;
    Ok(true)
}

/// Lazy half of the escrow completion rule: re-issue the promotion for
/// every order sitting in `AWAITING_ESCROW` with both deposits in.
/// Effects land in the next pass; failures are logged and retried then.
async fn sweep_escrow_complete(api: &Api, candidates: Vec<String>, limit: usize) {
    if candidates.is_empty() {
        return;
    }
    tracing::info!("escrow sweep: promoting {} order(s)", candidates.len());

    let results: Vec<(String, Result<()>)> = futures::stream::iter(candidates)
        .map(|id| async move {
            let outcome = api
                .set_order_status(&id, OrderStatus::ReadyForPickup)
                .await;
            (id, outcome)
        })
        .buffer_unordered(limit.max(1))
        .collect()
        .await;

    for (id, outcome) in results {
        if let Err(e) = outcome {
            tracing::warn!("escrow sweep: promoting order {id} failed: {e}");
        }
    }
}

/// Reconciliation driver: one pass immediately on startup, then one per
/// poll tick and one per trigger nudge, until shutdown.
pub async fn run_reconciler(
    api: Arc<Api>,
    state: SharedState,
    poll_interval: Duration,
    sweep_concurrency: usize,
    mut trigger: mpsc::Receiver<()>,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(poll_interval);
    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                tracing::debug!("reconcile: shutting down");
                return;
            }
            _ = ticker.tick() => {}
            nudge = trigger.recv() => {
                if nudge.is_none() {
                    return;
                }
            }
        }
        if let Err(e) = reconcile_once(&api, &state, sweep_concurrency).await {
            tracing::warn!("reconcile: pass failed, keeping previous snapshot: {e}");
        }
    }
}
