use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::message::Message;

/// Lifecycle of a delivery order. Wire spelling is SCREAMING_SNAKE_CASE
/// (`"AWAITING_ESCROW"` etc.), matching what the marketplace service stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Posted by the store, open for rider bids.
    Bidding,
    /// A bid was accepted; waiting on both escrow deposits.
    AwaitingEscrow,
    /// Both deposits confirmed; the rider may collect the goods.
    ReadyForPickup,
    /// Rider has the goods.
    PickedUp,
    /// Rider is underway to the delivery address.
    InTransit,
    /// Goods handed over. Terminal.
    Delivered,
    /// Abandoned before delivery. Terminal.
    Cancelled,
}

impl OrderStatus {
    /// Ordinal for determining merge winner. Higher always wins.
    pub fn ordinal(self) -> u8 {
        match self {
            OrderStatus::Bidding => 0,
            OrderStatus::AwaitingEscrow => 1,
            OrderStatus::ReadyForPickup => 2,
            OrderStatus::PickedUp => 3,
            OrderStatus::InTransit => 4,
            OrderStatus::Cancelled => 5,
            OrderStatus::Delivered => 6,
        }
    }

    /// Returns true if transitioning from self to `next` is valid.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::Bidding, OrderStatus::AwaitingEscrow)
                | (OrderStatus::Bidding, OrderStatus::Cancelled)
                | (OrderStatus::AwaitingEscrow, OrderStatus::ReadyForPickup)
                | (OrderStatus::AwaitingEscrow, OrderStatus::Cancelled)
                | (OrderStatus::ReadyForPickup, OrderStatus::PickedUp)
                | (OrderStatus::ReadyForPickup, OrderStatus::Cancelled)
                | (OrderStatus::PickedUp, OrderStatus::InTransit)
                | (OrderStatus::PickedUp, OrderStatus::Cancelled)
                | (OrderStatus::InTransit, OrderStatus::Delivered)
                | (OrderStatus::InTransit, OrderStatus::Cancelled)
        )
    }

    /// Wire spelling, as stored by the service.
    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Bidding => "BIDDING",
            OrderStatus::AwaitingEscrow => "AWAITING_ESCROW",
            OrderStatus::ReadyForPickup => "READY_FOR_PICKUP",
            OrderStatus::PickedUp => "PICKED_UP",
            OrderStatus::InTransit => "IN_TRANSIT",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rider's offer to fulfill an order at a quoted fee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bid {
    pub id: String,
    pub rider_id: String,
    pub rider_name: String,
    /// Quoted delivery fee in currency units.
    pub amount: f64,
    pub timestamp: DateTime<Utc>,
}

/// Denormalized order view, rebuilt from the remote collections on every
/// reconciliation pass. Never authoritative; the service owns all of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub store_id: String,
    /// Rider responsible for delivery; unset until a bid is accepted.
    pub rider_id: Option<String>,
    pub product_name: String,
    pub product_price: f64,
    /// Store's initial fee suggestion, superseded by the selected bid.
    pub delivery_fee_offer: f64,
    pub delivery_address: String,
    pub client_name: String,
    pub client_phone: String,
    pub status: OrderStatus,
    /// Bids in arrival order, unique by bid id.
    pub bids: Vec<Bid>,
    /// Chat thread for this order, ordered by timestamp.
    pub messages: Vec<Message>,
    pub selected_bid_id: Option<String>,
    pub store_escrow_paid: bool,
    pub delivery_escrow_paid: bool,
    /// True iff a review by the respective party exists for this order.
    pub store_reviewed: bool,
    pub rider_reviewed: bool,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// The bid the store picked, if selection happened and the bid is
    /// still present in the list.
    pub fn selected_bid(&self) -> Option<&Bid> {
        let wanted = self.selected_bid_id.as_deref()?;
        self.bids.iter().find(|b| b.id == wanted)
    }

    /// Bid placed by a given rider, if any. Drives bid upsert.
    pub fn bid_by(&self, rider_id: &str) -> Option<&Bid> {
        self.bids.iter().find(|b| b.rider_id == rider_id)
    }

    /// Amount the store owes into escrow: the selected bid's fee, or the
    /// initial offer when no bid is selected.
    pub fn store_escrow_due(&self) -> f64 {
        match self.selected_bid() {
            Some(bid) => bid.amount,
            None => self.delivery_fee_offer,
        }
    }

    /// Amount the rider owes into escrow: the product price.
    pub fn rider_escrow_due(&self) -> f64 {
        self.product_price
    }

    /// True when the order sits in `AwaitingEscrow` with both deposits
    /// confirmed, i.e. the lazy sweep should promote it.
    pub fn escrow_complete(&self) -> bool {
        self.status == OrderStatus::AwaitingEscrow
            && self.store_escrow_paid
            && self.delivery_escrow_paid
    }

    /// Checks a requested status change against the legality table.
    /// Re-issuing the current status is accepted so the lazy sweep can
    /// race the eager funding path without tripping the check.
    pub fn validate_status_update(&self, next: OrderStatus) -> Result<(), OrderError> {
        if self.status == next || self.status.can_transition_to(next) {
            Ok(())
        } else {
            Err(OrderError::IllegalTransition {
                from: self.status,
                to: next,
            })
        }
    }

    /// Checks that a bid id belongs to this order before selection.
    pub fn validate_bid_selection(&self, bid_id: &str) -> Result<(), OrderError> {
        if self.bids.iter().any(|b| b.id == bid_id) {
            Ok(())
        } else {
            Err(OrderError::UnknownBid {
                order_id: self.id.clone(),
                bid_id: bid_id.to_string(),
            })
        }
    }
}

/// The two parties that fund escrow on an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscrowParty {
    Store,
    Rider,
}

impl EscrowParty {
    /// Whether this party's escrow flag is already set on the order.
    pub fn already_funded(self, order: &Order) -> bool {
        match self {
            EscrowParty::Store => order.store_escrow_paid,
            EscrowParty::Rider => order.delivery_escrow_paid,
        }
    }

    /// Whether the counterpart's escrow flag is set on the order.
    pub fn counterpart_funded(self, order: &Order) -> bool {
        match self {
            EscrowParty::Store => order.delivery_escrow_paid,
            EscrowParty::Rider => order.store_escrow_paid,
        }
    }

    /// Amount this party owes into escrow.
    pub fn amount_due(self, order: &Order) -> f64 {
        match self {
            EscrowParty::Store => order.store_escrow_due(),
            EscrowParty::Rider => order.rider_escrow_due(),
        }
    }
}

/// Rejections from order-side validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OrderError {
    /// Requested status change is not in the legality table.
    IllegalTransition { from: OrderStatus, to: OrderStatus },
    /// Referenced bid does not belong to the order.
    UnknownBid { order_id: String, bid_id: String },
}

impl std::fmt::Display for OrderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IllegalTransition { from, to } => {
                write!(f, "illegal status transition: {from} -> {to}")
            }
            Self::UnknownBid { order_id, bid_id } => {
                write!(f, "bid {bid_id} does not belong to order {order_id}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy_bid(id: &str, rider_id: &str, amount: f64) -> Bid {
        Bid {
            id: id.into(),
            rider_id: rider_id.into(),
            rider_name: "Rider".into(),
            amount,
            timestamp: Utc::now(),
        }
    }

    fn dummy_order(id: &str, status: OrderStatus) -> Order {
        Order {
            id: id.into(),
            store_id: "store-1".into(),
            rider_id: None,
            product_name: "Flowers".into(),
            product_price: 100.0,
            delivery_fee_offer: 10.0,
            delivery_address: "12 Main St".into(),
            client_name: "".into(),
            client_phone: "".into(),
            status,
            bids: Vec::new(),
            messages: Vec::new(),
            selected_bid_id: None,
            store_escrow_paid: false,
            delivery_escrow_paid: false,
            store_reviewed: false,
            rider_reviewed: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_status_transitions() {
        assert!(OrderStatus::Bidding.can_transition_to(OrderStatus::AwaitingEscrow));
        assert!(OrderStatus::Bidding.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Bidding.can_transition_to(OrderStatus::ReadyForPickup));

        assert!(OrderStatus::AwaitingEscrow.can_transition_to(OrderStatus::ReadyForPickup));
        assert!(!OrderStatus::AwaitingEscrow.can_transition_to(OrderStatus::Bidding));

        assert!(OrderStatus::ReadyForPickup.can_transition_to(OrderStatus::PickedUp));
        assert!(OrderStatus::PickedUp.can_transition_to(OrderStatus::InTransit));
        assert!(OrderStatus::InTransit.can_transition_to(OrderStatus::Delivered));

        assert!(!OrderStatus::Delivered.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Cancelled.can_transition_to(OrderStatus::Bidding));
    }

    #[test]
    fn test_status_ordinals_monotonic() {
        assert!(OrderStatus::Bidding.ordinal() < OrderStatus::AwaitingEscrow.ordinal());
        assert!(OrderStatus::AwaitingEscrow.ordinal() < OrderStatus::ReadyForPickup.ordinal());
        assert!(OrderStatus::ReadyForPickup.ordinal() < OrderStatus::PickedUp.ordinal());
        assert!(OrderStatus::PickedUp.ordinal() < OrderStatus::InTransit.ordinal());
        assert!(OrderStatus::InTransit.ordinal() < OrderStatus::Cancelled.ordinal());
        assert!(OrderStatus::Cancelled.ordinal() < OrderStatus::Delivered.ordinal());
    }

    #[test]
    fn status_uses_wire_spelling() {
        let json = serde_json::to_string(&OrderStatus::AwaitingEscrow).unwrap();
        assert_eq!(json, "\"AWAITING_ESCROW\"");
        let back: OrderStatus = serde_json::from_str("\"READY_FOR_PICKUP\"").unwrap();
        assert_eq!(back, OrderStatus::ReadyForPickup);
        assert!(serde_json::from_str::<OrderStatus>("\"TELEPORTING\"").is_err());
    }

    #[test]
    fn store_escrow_due_prefers_selected_bid() {
        let mut order = dummy_order("o-1", OrderStatus::AwaitingEscrow);
        order.bids.push(dummy_bid("b-1", "rider-1", 8.0));
        order.selected_bid_id = Some("b-1".into());
        assert_eq!(order.store_escrow_due(), 8.0);
    }

    #[test]
    fn store_escrow_due_falls_back_to_offer() {
        let mut order = dummy_order("o-1", OrderStatus::AwaitingEscrow);
        order.bids.push(dummy_bid("b-1", "rider-1", 8.0));
        // No selection, and a selection pointing at a missing bid, both
        // fall back to the store's initial offer.
        assert_eq!(order.store_escrow_due(), 10.0);
        order.selected_bid_id = Some("b-gone".into());
        assert_eq!(order.store_escrow_due(), 10.0);
    }

    #[test]
    fn escrow_complete_only_in_awaiting_escrow() {
        let mut order = dummy_order("o-1", OrderStatus::AwaitingEscrow);
        order.store_escrow_paid = true;
        order.delivery_escrow_paid = true;
        assert!(order.escrow_complete());

        order.status = OrderStatus::ReadyForPickup;
        assert!(!order.escrow_complete(), "promoted orders must leave the sweep");

        order.status = OrderStatus::AwaitingEscrow;
        order.delivery_escrow_paid = false;
        assert!(!order.escrow_complete());
    }

    #[test]
    fn validate_status_update_allows_reissue() {
        let order = dummy_order("o-1", OrderStatus::AwaitingEscrow);
        assert!(order.validate_status_update(OrderStatus::AwaitingEscrow).is_ok());
        assert!(order.validate_status_update(OrderStatus::ReadyForPickup).is_ok());
    }

    #[test]
    fn validate_status_update_rejects_backwards() {
        let order = dummy_order("o-1", OrderStatus::ReadyForPickup);
        let err = order.validate_status_update(OrderStatus::Bidding).unwrap_err();
        assert_eq!(
            err,
            OrderError::IllegalTransition {
                from: OrderStatus::ReadyForPickup,
                to: OrderStatus::Bidding,
            }
        );
    }

    #[test]
    fn validate_bid_selection_rejects_foreign_bid() {
        let mut order = dummy_order("o-1", OrderStatus::Bidding);
        order.bids.push(dummy_bid("b-1", "rider-1", 8.0));
        assert!(order.validate_bid_selection("b-1").is_ok());
        assert!(order.validate_bid_selection("b-2").is_err());
    }

    #[test]
    fn bid_by_finds_riders_existing_bid() {
        let mut order = dummy_order("o-1", OrderStatus::Bidding);
        order.bids.push(dummy_bid("b-1", "rider-1", 8.0));
        order.bids.push(dummy_bid("b-2", "rider-2", 9.0));
        assert_eq!(order.bid_by("rider-2").map(|b| b.id.as_str()), Some("b-2"));
        assert!(order.bid_by("rider-3").is_none());
    }

    #[test]
    fn escrow_party_amounts() {
        let mut order = dummy_order("o-1", OrderStatus::AwaitingEscrow);
        order.bids.push(dummy_bid("b-1", "rider-1", 8.0));
        order.selected_bid_id = Some("b-1".into());
        assert_eq!(EscrowParty::Store.amount_due(&order), 8.0);
        assert_eq!(EscrowParty::Rider.amount_due(&order), 100.0);

        order.store_escrow_paid = true;
        assert!(EscrowParty::Store.already_funded(&order));
        assert!(!EscrowParty::Rider.already_funded(&order));
        assert!(EscrowParty::Rider.counterpart_funded(&order));
    }
}
