use serde::{Deserialize, Serialize};

use crate::review::Review;
use crate::wallet::WalletSnapshot;

/// Marketplace role. Wire spelling is SCREAMING_SNAKE_CASE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Store,
    Delivery,
}

/// Client-side projection of a user: identity plus what the pages need to
/// render them (received reviews, wallet snapshot).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    /// Reviews where this user is the target, aggregated across orders.
    #[serde(default)]
    pub reviews: Vec<Review>,
    #[serde(default)]
    pub wallet: WalletSnapshot,
}

impl User {
    /// Skeleton projection for a user only known as a review target.
    /// Identity fields stay empty until a richer source fills them.
    pub fn placeholder(id: String) -> Self {
        Self {
            id,
            email: String::new(),
            name: String::new(),
            role: Role::Delivery,
            reviews: Vec::new(),
            wallet: WalletSnapshot::default(),
        }
    }

    /// Average received rating, if any reviews exist.
    pub fn average_rating(&self) -> Option<f64> {
        if self.reviews.is_empty() {
            return None;
        }
        let sum: f64 = self.reviews.iter().map(|r| r.rating).sum();
        Some(sum / self.reviews.len() as f64)
    }
}
