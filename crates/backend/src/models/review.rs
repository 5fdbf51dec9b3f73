//! Review domain type.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use butter_crumb_core::{ProductId, ReviewId, UserId};

/// Valid rating range, inclusive.
pub const RATING_RANGE: std::ops::RangeInclusive<i16> = 1..=5;

/// A customer review of a product.
#[derive(Debug, Clone)]
pub struct Review {
    pub id: ReviewId,
    pub product_id: ProductId,
    pub user_id: UserId,
    /// 1 to 5 stars.
    pub rating: i16,
    pub title: Option<String>,
    pub comment: Option<String>,
    /// Reviews are hidden until a moderator approves them.
    pub is_approved: bool,
    /// Set when the reviewer has a completed order containing the product.
    pub is_verified_purchase: bool,
    pub is_featured: bool,
    pub helpful_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a review.
#[derive(Debug, Clone, Deserialize)]
pub struct NewReview {
    pub product_id: ProductId,
    pub user_id: UserId,
    pub rating: i16,
    pub title: Option<String>,
    pub comment: Option<String>,
}

/// Field mask for updating a review.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReviewUpdate {
    pub rating: Option<i16>,
    pub title: Option<String>,
    pub comment: Option<String>,
}
