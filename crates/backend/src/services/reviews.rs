//! Review creation, moderation, and product rating aggregates.

use sqlx::PgPool;

use butter_crumb_core::{ProductId, ReviewId, UserId};

use crate::db::{OrderRepository, RepositoryError, ReviewRepository};
use crate::models::review::{NewReview, RATING_RANGE, Review, ReviewUpdate};

/// Errors from review operations.
#[derive(Debug, thiserror::Error)]
pub enum ReviewError {
    /// Rating outside the 1..=5 range.
    #[error("rating must be between 1 and 5, got {0}")]
    InvalidRating(i16),

    /// The user already reviewed this product.
    #[error("product already reviewed by this user")]
    AlreadyReviewed,

    /// The referenced review does not exist.
    #[error("review {0} not found")]
    ReviewNotFound(ReviewId),

    /// Underlying storage failure.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

fn validate_rating(rating: i16) -> Result<(), ReviewError> {
    if RATING_RANGE.contains(&rating) {
        Ok(())
    } else {
        Err(ReviewError::InvalidRating(rating))
    }
}

/// Service for customer reviews.
pub struct ReviewService<'a> {
    pool: &'a PgPool,
}

impl<'a> ReviewService<'a> {
    /// Create a review service over a connection pool.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Create a review, one per user per product.
    ///
    /// The verified-purchase flag is set when the user has a completed
    /// order containing the product. New reviews await moderation.
    ///
    /// # Errors
    ///
    /// `InvalidRating`, `AlreadyReviewed`, or storage errors.
    pub async fn create(&self, new: NewReview) -> Result<Review, ReviewError> {
        validate_rating(new.rating)?;

        let repo = ReviewRepository::new(self.pool);
        if repo
            .get_by_user_and_product(new.user_id, new.product_id)
            .await?
            .is_some()
        {
            return Err(ReviewError::AlreadyReviewed);
        }

        let verified = OrderRepository::new(self.pool)
            .user_completed_product(new.user_id, new.product_id)
            .await?;

        let review = repo.insert(&new, verified).await?;
        tracing::info!(product = %new.product_id, verified, "review created");
        Ok(review)
    }

    /// Update a user's own review; re-enters moderation.
    ///
    /// # Errors
    ///
    /// `InvalidRating`, `ReviewNotFound`, or storage errors.
    pub async fn update(
        &self,
        review_id: ReviewId,
        user_id: UserId,
        update: ReviewUpdate,
    ) -> Result<Review, ReviewError> {
        if let Some(rating) = update.rating {
            validate_rating(rating)?;
        }

        let repo = ReviewRepository::new(self.pool);
        let review = repo
            .update_own(review_id, user_id, &update)
            .await?
            .ok_or(ReviewError::ReviewNotFound(review_id))?;
        repo.refresh_product_aggregates(review.product_id).await?;
        Ok(review)
    }

    /// Approve or reject a review (moderation), refreshing the product's
    /// cached rating aggregate.
    ///
    /// # Errors
    ///
    /// `ReviewNotFound` or storage errors.
    pub async fn moderate(
        &self,
        review_id: ReviewId,
        approved: bool,
    ) -> Result<Review, ReviewError> {
        let repo = ReviewRepository::new(self.pool);
        let review = repo
            .set_approved(review_id, approved)
            .await?
            .ok_or(ReviewError::ReviewNotFound(review_id))?;
        repo.refresh_product_aggregates(review.product_id).await?;
        Ok(review)
    }

    /// Record a "helpful" vote.
    ///
    /// # Errors
    ///
    /// `ReviewNotFound` or storage errors.
    pub async fn mark_helpful(&self, review_id: ReviewId) -> Result<(), ReviewError> {
        let bumped = ReviewRepository::new(self.pool)
            .increment_helpful(review_id)
            .await?;
        if !bumped {
            return Err(ReviewError::ReviewNotFound(review_id));
        }
        Ok(())
    }

    /// Delete a review and refresh the product's aggregate.
    ///
    /// # Errors
    ///
    /// `ReviewNotFound` or storage errors.
    pub async fn delete(&self, review_id: ReviewId) -> Result<(), ReviewError> {
        let repo = ReviewRepository::new(self.pool);
        let review = repo
            .get_by_id(review_id)
            .await?
            .ok_or(ReviewError::ReviewNotFound(review_id))?;
        repo.delete(review_id).await?;
        repo.refresh_product_aggregates(review.product_id).await?;
        Ok(())
    }

    /// Paginated reviews for a product, approved-only unless moderating.
    ///
    /// Returns the page and the total count.
    ///
    /// # Errors
    ///
    /// Storage errors.
    pub async fn list_for_product(
        &self,
        product_id: ProductId,
        only_approved: bool,
        page: i64,
        page_size: i64,
    ) -> Result<(Vec<Review>, i64), ReviewError> {
        Ok(ReviewRepository::new(self.pool)
            .list_for_product(product_id, only_approved, page, page_size)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rating_bounds() {
        assert!(validate_rating(1).is_ok());
        assert!(validate_rating(5).is_ok());
        assert!(matches!(validate_rating(0), Err(ReviewError::InvalidRating(0))));
        assert!(matches!(validate_rating(6), Err(ReviewError::InvalidRating(6))));
        assert!(matches!(validate_rating(-1), Err(ReviewError::InvalidRating(-1))));
    }
}
