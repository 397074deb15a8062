use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One chat message between store and rider, scoped to a single order.
///
/// Threads are append-only; ordering within an order is by timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub sender_id: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}
