//! Raw records as the marketplace service sends them, plus the pure
//! mapping step that turns them into UI-ready aggregates.
//!
//! Decoding is the validation boundary: required fields must be present
//! with a usable type or the whole payload is rejected, while fields the
//! service is known to omit or null out get explicit defaults. Numeric fields arrive
//! as JSON numbers or numeric strings depending on the backing store, so
//! they share a coercing deserializer. Timestamps are RFC 3339 strings or
//! epoch milliseconds; a missing or null timestamp decodes to the epoch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::message::Message;
use crate::order::{Bid, Order, OrderStatus};
use crate::review::Review;
use crate::user::{Role, User};
use crate::wallet::WalletSnapshot;

/// A record decoded structurally but could not be mapped to an aggregate.
#[derive(Debug, Clone, PartialEq)]
pub enum WireError {
    /// Bid carries neither `userId` nor `deliveryGuyId`.
    BidMissingRider { bid_id: String },
    /// Bid carries neither `amount` nor `proposedFee`.
    BidMissingAmount { bid_id: String },
}

impl std::fmt::Display for WireError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BidMissingRider { bid_id } => {
                write!(f, "bid {bid_id} has no rider id in either spelling")
            }
            Self::BidMissingAmount { bid_id } => {
                write!(f, "bid {bid_id} has no amount in either spelling")
            }
        }
    }
}

fn number_from_value(value: serde_json::Value) -> Result<f64, String> {
    match value {
        serde_json::Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| "number out of f64 range".to_string()),
        serde_json::Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| format!("non-numeric string {s:?}")),
        other => Err(format!("expected number or numeric string, got {other}")),
    }
}

fn de_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    number_from_value(value).map_err(serde::de::Error::custom)
}

fn de_opt_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Null => Ok(None),
        value => number_from_value(value)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

/// The store backing the service writes `null` where a field was never
/// set, so an explicit `null` means the same as an absent key.
fn de_null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn de_timestamp<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Null => Ok(unix_epoch()),
        serde_json::Value::String(s) => DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| serde::de::Error::custom(format!("bad timestamp {s:?}: {e}"))),
        serde_json::Value::Number(n) => {
            let millis = n
                .as_i64()
                .ok_or_else(|| serde::de::Error::custom("timestamp out of i64 range"))?;
            DateTime::from_timestamp_millis(millis)
                .ok_or_else(|| serde::de::Error::custom("timestamp out of range"))
        }
        other => Err(serde::de::Error::custom(format!(
            "expected timestamp string or epoch millis, got {other}"
        ))),
    }
}

fn unix_epoch() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH
}

/// Order as stored by the service.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRecord {
    pub id: String,
    pub store_id: String,
    pub product_name: String,
    #[serde(deserialize_with = "de_number")]
    pub product_price: f64,
    #[serde(deserialize_with = "de_number")]
    pub suggested_delivery_fee: f64,
    pub destination: String,
    #[serde(default, deserialize_with = "de_null_default")]
    pub client_name: String,
    #[serde(default, deserialize_with = "de_null_default")]
    pub client_phone: String,
    pub status: OrderStatus,
    #[serde(default, deserialize_with = "de_null_default")]
    pub bids: Vec<BidRecord>,
    #[serde(default)]
    pub chosen_bid_id: Option<String>,
    #[serde(default)]
    pub delivery_guy_id: Option<String>,
    #[serde(default)]
    pub store_deposited: bool,
    #[serde(default)]
    pub rider_deposited: bool,
    // The one snake_case holdout in the order documents.
    #[serde(
        rename = "created_at",
        default = "unix_epoch",
        deserialize_with = "de_timestamp"
    )]
    pub created_at: DateTime<Utc>,
}

/// Bid as stored by the service. Two shapes exist in the wild: bids
/// embedded in an order document (`deliveryGuyId`/`proposedFee`) and the
/// standalone collection (`userId`/`amount`). The record carries both
/// spellings and the mapping step resolves them.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BidRecord {
    pub id: String,
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub delivery_guy_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub delivery_guy_name: Option<String>,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default, deserialize_with = "de_opt_number")]
    pub proposed_fee: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_number")]
    pub amount: Option<f64>,
    #[serde(default = "unix_epoch", deserialize_with = "de_timestamp")]
    pub timestamp: DateTime<Utc>,
}

/// Chat message as returned by `GET /messages`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    pub id: String,
    pub order_id: String,
    pub sender_id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default = "unix_epoch", deserialize_with = "de_timestamp")]
    pub timestamp: DateTime<Utc>,
}

/// Review as returned by `GET /reviews`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRecord {
    pub id: String,
    pub order_id: String,
    pub reviewer_id: String,
    #[serde(default)]
    pub reviewer_name: String,
    pub target_user_id: String,
    #[serde(deserialize_with = "de_number")]
    pub rating: f64,
    #[serde(default)]
    pub comment: String,
    #[serde(default = "unix_epoch", deserialize_with = "de_timestamp")]
    pub timestamp: DateTime<Utc>,
}

/// Wallet as returned by `GET /wallets/{userId}`.
#[derive(Debug, Clone, Deserialize)]
pub struct WalletRecord {
    #[serde(deserialize_with = "de_number")]
    pub balance: f64,
    #[serde(deserialize_with = "de_number")]
    pub escrow: f64,
}

/// User identity as returned inside the auth response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: String,
    pub role: Role,
}

/// Response from `POST /auth/login` and `POST /auth/register`.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub user: UserRecord,
    pub token: String,
}

/// Payload for `POST /orders`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDraft {
    pub store_id: String,
    pub store_name: String,
    pub product_name: String,
    pub product_price: f64,
    pub suggested_delivery_fee: f64,
    pub destination: String,
    pub client_name: String,
    pub client_phone: String,
    pub status: OrderStatus,
}

/// Payload for `POST /reviews`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewDraft {
    pub order_id: String,
    pub reviewer_id: String,
    pub reviewer_name: String,
    pub target_user_id: String,
    pub rating: f64,
    pub comment: String,
}

/// Embedded-shape bid: prefers `proposedFee` and the `deliveryGuy*`
/// spellings, matching how order documents store their bid list.
pub fn map_embedded_bid(raw: &BidRecord) -> Result<Bid, WireError> {
    let amount = raw
        .proposed_fee
        .or(raw.amount)
        .ok_or_else(|| WireError::BidMissingAmount {
            bid_id: raw.id.clone(),
        })?;
    let rider_id = raw
        .delivery_guy_id
        .clone()
        .or_else(|| raw.user_id.clone())
        .ok_or_else(|| WireError::BidMissingRider {
            bid_id: raw.id.clone(),
        })?;
    Ok(Bid {
        id: raw.id.clone(),
        rider_id,
        rider_name: raw.delivery_guy_name.clone().unwrap_or_default(),
        amount,
        timestamp: raw.timestamp,
    })
}

/// Standalone-collection bid: prefers `amount` and the `user*` spellings,
/// falling back to the embedded ones. Rider name defaults to "Rider".
pub fn map_standalone_bid(raw: &BidRecord) -> Result<Bid, WireError> {
    let amount = raw
        .amount
        .or(raw.proposed_fee)
        .ok_or_else(|| WireError::BidMissingAmount {
            bid_id: raw.id.clone(),
        })?;
    let rider_id = raw
        .user_id
        .clone()
        .or_else(|| raw.delivery_guy_id.clone())
        .ok_or_else(|| WireError::BidMissingRider {
            bid_id: raw.id.clone(),
        })?;
    let rider_name = raw
        .user_name
        .clone()
        .or_else(|| raw.delivery_guy_name.clone())
        .unwrap_or_else(|| "Rider".to_string());
    Ok(Bid {
        id: raw.id.clone(),
        rider_id,
        rider_name,
        amount,
        timestamp: raw.timestamp,
    })
}

/// Build the base aggregate from a raw order. Bids come from the embedded
/// list; messages, review flags and the rider-id derivation are attached
/// by the reconciliation pass.
pub fn map_order(raw: &OrderRecord) -> Result<Order, WireError> {
    let bids = raw
        .bids
        .iter()
        .map(map_embedded_bid)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Order {
        id: raw.id.clone(),
        store_id: raw.store_id.clone(),
        rider_id: raw.delivery_guy_id.clone(),
        product_name: raw.product_name.clone(),
        product_price: raw.product_price,
        delivery_fee_offer: raw.suggested_delivery_fee,
        delivery_address: raw.destination.clone(),
        client_name: raw.client_name.clone(),
        client_phone: raw.client_phone.clone(),
        status: raw.status,
        bids,
        messages: Vec::new(),
        selected_bid_id: raw.chosen_bid_id.clone(),
        store_escrow_paid: raw.store_deposited,
        delivery_escrow_paid: raw.rider_deposited,
        store_reviewed: false,
        rider_reviewed: false,
        created_at: raw.created_at,
    })
}

pub fn map_message(raw: &MessageRecord) -> Message {
    Message {
        id: raw.id.clone(),
        sender_id: raw.sender_id.clone(),
        text: raw.text.clone(),
        timestamp: raw.timestamp,
    }
}

pub fn map_review(raw: &ReviewRecord) -> Review {
    Review {
        id: raw.id.clone(),
        order_id: raw.order_id.clone(),
        reviewer_id: raw.reviewer_id.clone(),
        reviewer_name: raw.reviewer_name.clone(),
        target_user_id: raw.target_user_id.clone(),
        rating: raw.rating,
        comment: raw.comment.clone(),
        timestamp: raw.timestamp,
    }
}

pub fn map_wallet(raw: &WalletRecord) -> WalletSnapshot {
    WalletSnapshot {
        balance: raw.balance,
        escrow_held: raw.escrow,
        transactions: Vec::new(),
    }
}

pub fn map_user(raw: &UserRecord) -> User {
    User {
        id: raw.id.clone(),
        email: raw.email.clone(),
        name: raw.name.clone(),
        role: raw.role,
        reviews: Vec::new(),
        wallet: WalletSnapshot::default(),
    }
}
