use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A rating left by one party about the other after an order.
///
/// Append-only; at most one per (order, reviewer) pair by convention. The
/// service does not enforce the convention, so existence checks treat any
/// matching review as "reviewed".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: String,
    pub order_id: String,
    pub reviewer_id: String,
    pub reviewer_name: String,
    pub target_user_id: String,
    /// Star rating, typically 1 to 5.
    pub rating: f64,
    pub comment: String,
    pub timestamp: DateTime<Utc>,
}
