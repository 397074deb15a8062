//! Pure reconciliation: rebuilds the denormalized order snapshot from the
//! four independently-fetched remote collections. No I/O here; the engine
//! fetches, this module assembles.

use std::collections::BTreeMap;

use crate::order::Order;
use crate::user::User;
use crate::wire::{self, BidRecord, MessageRecord, OrderRecord, ReviewRecord, WireError};

/// One fully-assembled view of the marketplace, replaced wholesale on
/// every reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    /// Denormalized orders keyed by order id.
    pub orders: BTreeMap<String, Order>,
    /// Users reconstructed from review targets, keyed by user id.
    pub users: BTreeMap<String, User>,
}

/// Build a snapshot from freshly-fetched raw collections.
///
/// Per order: base mapping, bid backfill from the standalone collection
/// when the embedded list is empty, rider-id derivation from the selected
/// bid, message attach sorted by timestamp, and review existence flags.
/// Any mapping failure rejects the whole batch; the caller keeps its
/// previous snapshot.
pub fn assemble(
    orders: &[OrderRecord],
    bids: &[BidRecord],
    messages: &[MessageRecord],
    reviews: &[ReviewRecord],
) -> Result<Snapshot, WireError> {
    let mut assembled: BTreeMap<String, Order> = BTreeMap::new();
    for raw in orders {
        let mut order = wire::map_order(raw)?;

        // Some API shapes embed bids in the order document, others only
        // serve the standalone collection. Backfill when embedded is empty.
        if order.bids.is_empty() {
            order.bids = bids
                .iter()
                .filter(|b| b.order_id.as_deref() == Some(order.id.as_str()))
                .map(wire::map_standalone_bid)
                .collect::<Result<Vec<_>, _>>()?;
        }

        if order.rider_id.is_none() {
            order.rider_id = order.selected_bid().map(|b| b.rider_id.clone());
        }

        order.messages = messages
            .iter()
            .filter(|m| m.order_id == order.id)
            .map(wire::map_message)
            .collect();
        order.messages.sort_by_key(|m| m.timestamp);

        order.store_reviewed = reviews
            .iter()
            .any(|r| r.order_id == order.id && r.reviewer_id == order.store_id);
        order.rider_reviewed = match order.rider_id.as_deref() {
            Some(rider_id) => reviews
                .iter()
                .any(|r| r.order_id == order.id && r.reviewer_id == rider_id),
            None => false,
        };

        // Duplicate ids in one listing keep the most-advanced status.
        match assembled.get(&order.id) {
            Some(existing) if existing.status.ordinal() >= order.status.ordinal() => {}
            _ => {
                assembled.insert(order.id.clone(), order);
            }
        }
    }

    Ok(Snapshot {
        orders: assembled,
        users: build_user_reviews(reviews),
    })
}

/// Rebuild the per-user received-reviews projection from the review
/// collection. Users appear when first referenced as a review target.
pub fn build_user_reviews(reviews: &[ReviewRecord]) -> BTreeMap<String, User> {
    let mut users: BTreeMap<String, User> = BTreeMap::new();
    for raw in reviews {
        let user = users
            .entry(raw.target_user_id.clone())
            .or_insert_with(|| User::placeholder(raw.target_user_id.clone()));
        user.reviews.push(wire::map_review(raw));
    }
    // Reviews carry their author's display name; backfill it for users the
    // projection otherwise only knows as targets.
    for raw in reviews {
        if let Some(user) = users.get_mut(&raw.reviewer_id) {
            if user.name.is_empty() {
                user.name = raw.reviewer_name.clone();
            }
        }
    }
    users
}

/// Ids of orders the escrow-completion sweep should promote: sitting in
/// `AwaitingEscrow` with both deposits confirmed.
pub fn sweep_candidates(snapshot: &Snapshot) -> Vec<String> {
    snapshot
        .orders
        .values()
        .filter(|o| o.escrow_complete())
        .map(|o| o.id.clone())
        .collect()
}
