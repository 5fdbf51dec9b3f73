//! Database operations for reviews and product rating aggregates.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use butter_crumb_core::{ProductId, ReviewId, UserId};

use super::RepositoryError;
use crate::models::review::{NewReview, Review, ReviewUpdate};

const REVIEW_COLUMNS: &str = "id, product_id, user_id, rating, title, comment, is_approved, \
     is_verified_purchase, is_featured, helpful_count, created_at, updated_at";

/// Internal row type for review queries.
#[derive(Debug, sqlx::FromRow)]
struct ReviewRow {
    id: ReviewId,
    product_id: ProductId,
    user_id: UserId,
    rating: i16,
    title: Option<String>,
    comment: Option<String>,
    is_approved: bool,
    is_verified_purchase: bool,
    is_featured: bool,
    helpful_count: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ReviewRow> for Review {
    fn from(row: ReviewRow) -> Self {
        Self {
            id: row.id,
            product_id: row.product_id,
            user_id: row.user_id,
            rating: row.rating,
            title: row.title,
            comment: row.comment,
            is_approved: row.is_approved,
            is_verified_purchase: row.is_verified_purchase,
            is_featured: row.is_featured,
            helpful_count: row.helpful_count,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Repository for review database operations.
pub struct ReviewRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ReviewRepository<'a> {
    /// Create a new review repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a review by its ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: ReviewId) -> Result<Option<Review>, RepositoryError> {
        let row = sqlx::query_as::<_, ReviewRow>(&format!(
            "SELECT {REVIEW_COLUMNS} FROM reviews WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Review::from))
    }

    /// A user's review of a product, if any (one per user per product).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_user_and_product(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<Option<Review>, RepositoryError> {
        let row = sqlx::query_as::<_, ReviewRow>(&format!(
            "SELECT {REVIEW_COLUMNS} FROM reviews WHERE user_id = $1 AND product_id = $2"
        ))
        .bind(user_id)
        .bind(product_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Review::from))
    }

    /// Insert a review, unapproved, with the given verified-purchase flag.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the user already reviewed the
    /// product, `RepositoryError::Database` for other failures.
    pub async fn insert(
        &self,
        new: &NewReview,
        is_verified_purchase: bool,
    ) -> Result<Review, RepositoryError> {
        let row = sqlx::query_as::<_, ReviewRow>(&format!(
            r"
            INSERT INTO reviews (product_id, user_id, rating, title, comment, is_verified_purchase)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {REVIEW_COLUMNS}
            "
        ))
        .bind(new.product_id)
        .bind(new.user_id)
        .bind(new.rating)
        .bind(&new.title)
        .bind(&new.comment)
        .bind(is_verified_purchase)
        .fetch_one(self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return RepositoryError::Conflict("product already reviewed".to_owned());
            }
            RepositoryError::Database(e)
        })?;

        Ok(row.into())
    }

    /// Apply a user's edit to their own review and send it back to
    /// moderation.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn update_own(
        &self,
        id: ReviewId,
        user_id: UserId,
        update: &ReviewUpdate,
    ) -> Result<Option<Review>, RepositoryError> {
        let row = sqlx::query_as::<_, ReviewRow>(&format!(
            r"
            UPDATE reviews
            SET rating = COALESCE($3, rating),
                title = COALESCE($4, title),
                comment = COALESCE($5, comment),
                is_approved = FALSE,
                updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING {REVIEW_COLUMNS}
            "
        ))
        .bind(id)
        .bind(user_id)
        .bind(update.rating)
        .bind(&update.title)
        .bind(&update.comment)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Review::from))
    }

    /// Approve or reject a review.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn set_approved(
        &self,
        id: ReviewId,
        approved: bool,
    ) -> Result<Option<Review>, RepositoryError> {
        let row = sqlx::query_as::<_, ReviewRow>(&format!(
            r"
            UPDATE reviews
            SET is_approved = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {REVIEW_COLUMNS}
            "
        ))
        .bind(id)
        .bind(approved)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Review::from))
    }

    /// Increment a review's helpful count.
    ///
    /// # Returns
    ///
    /// Returns `true` if the review exists.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn increment_helpful(&self, id: ReviewId) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE reviews SET helpful_count = helpful_count + 1, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete a review.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete(&self, id: ReviewId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM reviews WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Paginated reviews for a product, featured and most-helpful first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_product(
        &self,
        product_id: ProductId,
        only_approved: bool,
        page: i64,
        page_size: i64,
    ) -> Result<(Vec<Review>, i64), RepositoryError> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM reviews WHERE product_id = $1 AND (NOT $2 OR is_approved)",
        )
        .bind(product_id)
        .bind(only_approved)
        .fetch_one(self.pool)
        .await?;

        let rows = sqlx::query_as::<_, ReviewRow>(&format!(
            r"
            SELECT {REVIEW_COLUMNS} FROM reviews
            WHERE product_id = $1 AND (NOT $2 OR is_approved)
            ORDER BY is_featured DESC, helpful_count DESC, created_at DESC
            LIMIT $3 OFFSET $4
            "
        ))
        .bind(product_id)
        .bind(only_approved)
        .bind(page_size)
        .bind((page - 1) * page_size)
        .fetch_all(self.pool)
        .await?;

        Ok((rows.into_iter().map(Review::from).collect(), total))
    }

    /// Recompute a product's cached rating aggregate from its approved
    /// reviews.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn refresh_product_aggregates(
        &self,
        product_id: ProductId,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            UPDATE products p
            SET average_rating = agg.avg_rating,
                review_count = agg.total,
                updated_at = NOW()
            FROM (
                SELECT ROUND(AVG(rating)::NUMERIC, 1) AS avg_rating, COUNT(*)::INT AS total
                FROM reviews
                WHERE product_id = $1 AND is_approved
            ) agg
            WHERE p.id = $1
            ",
        )
        .bind(product_id)
        .execute(self.pool)
        .await?;

        Ok(())
    }
}
