use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;

use courier_common::order::Order;
use courier_common::reconcile::Snapshot;

#[derive(Default)]
struct Guarded {
    snapshot: Snapshot,
    generation: u64,
}

/// Handle to the latest reconciled marketplace view. Cheap to clone;
/// all clones observe the same snapshot.
///
/// Reconciliation passes can overlap, so installation is guarded by a
/// generation ticket: a pass takes its ticket before fetching and a
/// finished snapshot only lands if no younger pass beat it there.
#[derive(Clone, Default)]
pub struct SharedState {
    guarded: Arc<RwLock<Guarded>>,
    ticket: Arc<AtomicU64>,
}

impl SharedState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the generation ticket for a reconciliation pass about to
    /// start.
    pub fn begin_pass(&self) -> u64 {
        self.ticket.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Installs a snapshot built by pass `generation` unless a newer
    /// pass already installed one. Returns whether it took effect.
    pub async fn install(&self, generation: u64, snapshot: Snapshot) -> bool {
        let mut guarded = self.guarded.write().await;
        if generation <= guarded.generation {
            return false;
        }
        guarded.snapshot = snapshot;
        guarded.generation = generation;
        true
    }

    pub async fn snapshot(&self) -> Snapshot {
        self.guarded.read().await.snapshot.clone()
    }

    pub async fn order(&self, id: &str) -> Option<Order> {
        self.guarded.read().await.snapshot.orders.get(id).cloned()
    }

    pub async fn generation(&self) -> u64 {
        self.guarded.read().await.generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_common::order::OrderStatus;

    fn snapshot_with_order(id: &str) -> Snapshot {
        let mut snapshot = Snapshot::default();
        snapshot.orders.insert(
            id.to_string(),
            Order {
                id: id.to_string(),
                store_id: "s1".to_string(),
                rider_id: None,
                product_name: "Bread".to_string(),
                product_price: 10.0,
                delivery_fee_offer: 2.0,
                delivery_address: "12 Main St".to_string(),
                client_name: String::new(),
                client_phone: String::new(),
                status: OrderStatus::Bidding,
                bids: Vec::new(),
                messages: Vec::new(),
                selected_bid_id: None,
                store_escrow_paid: false,
                delivery_escrow_paid: false,
                store_reviewed: false,
                rider_reviewed: false,
                created_at: chrono::DateTime::UNIX_EPOCH,
            },
        );
        snapshot
    }

    #[tokio::test]
    async fn install_in_order() {
        let state = SharedState::new();
        let g1 = state.begin_pass();
        assert!(state.install(g1, snapshot_with_order("a")).await);
        assert!(state.order("a").await.is_some());
        assert_eq!(state.generation().await, g1);
    }

    #[tokio::test]
    async fn stale_pass_is_discarded() {
        let state = SharedState::new();
        let old = state.begin_pass();
        let new = state.begin_pass();
        assert!(state.install(new, snapshot_with_order("fresh")).await);
        // the older pass finishes late; its view must not clobber the newer one
        assert!(!state.install(old, snapshot_with_order("stale")).await);
        let snapshot = state.snapshot().await;
        assert!(snapshot.orders.contains_key("fresh"));
        assert!(!snapshot.orders.contains_key("stale"));
    }

    #[tokio::test]
    async fn tickets_are_unique_across_clones() {
        let state = SharedState::new();
        let other = state.clone();
        let a = state.begin_pass();
        let b = other.begin_pass();
        assert_ne!(a, b);
    }
}
