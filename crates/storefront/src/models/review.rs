//! Review domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use senmarket_core::{ProductId, ReviewId, UserId};

/// A product review with its author's display name.
#[derive(Debug, Clone, Serialize)]
pub struct Review {
    pub id: ReviewId,
    pub user_id: UserId,
    pub author_name: String,
    pub product_id: ProductId,
    pub product_name: String,
    pub rating: i16,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
