//! Database operations for promo codes.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use butter_crumb_core::{DiscountType, Money, PromoCodeId};

use super::RepositoryError;
use crate::models::promo::{NewPromoCode, PromoCode, PromoCodeUpdate};

const PROMO_COLUMNS: &str = "id, code, description, discount_type, discount_value, \
     minimum_order_value, maximum_discount, usage_limit, usage_count, valid_from, valid_until, \
     is_active, created_at, updated_at";

/// Internal row type for promo code queries.
#[derive(Debug, sqlx::FromRow)]
struct PromoCodeRow {
    id: PromoCodeId,
    code: String,
    description: Option<String>,
    discount_type: String,
    discount_value: Decimal,
    minimum_order_value: Option<Money>,
    maximum_discount: Option<Money>,
    usage_limit: Option<i32>,
    usage_count: i32,
    valid_from: Option<DateTime<Utc>>,
    valid_until: Option<DateTime<Utc>>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
}

impl TryFrom<PromoCodeRow> for PromoCode {
    type Error = RepositoryError;

    fn try_from(row: PromoCodeRow) -> Result<Self, Self::Error> {
        let discount_type = DiscountType::from_str(&row.discount_type)
            .map_err(RepositoryError::DataCorruption)?;

        Ok(Self {
            id: row.id,
            code: row.code,
            description: row.description,
            discount_type,
            discount_value: row.discount_value,
            minimum_order_value: row.minimum_order_value,
            maximum_discount: row.maximum_discount,
            usage_limit: row.usage_limit,
            usage_count: row.usage_count,
            valid_from: row.valid_from,
            valid_until: row.valid_until,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Repository for promo code database operations.
pub struct PromoCodeRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> PromoCodeRepository<'a> {
    /// Create a new promo code repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Look up a code by its (case-insensitive) code string.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_code(&self, code: &str) -> Result<Option<PromoCode>, RepositoryError> {
        let row = sqlx::query_as::<_, PromoCodeRow>(&format!(
            "SELECT {PROMO_COLUMNS} FROM promo_codes WHERE UPPER(code) = UPPER($1)"
        ))
        .bind(code)
        .fetch_optional(self.pool)
        .await?;

        row.map(PromoCode::try_from).transpose()
    }

    /// All promo codes, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<PromoCode>, RepositoryError> {
        let rows = sqlx::query_as::<_, PromoCodeRow>(&format!(
            "SELECT {PROMO_COLUMNS} FROM promo_codes ORDER BY created_at DESC"
        ))
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(PromoCode::try_from).collect()
    }

    /// Create a promo code.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the code already exists,
    /// `RepositoryError::Database` for other failures.
    pub async fn create(&self, new: &NewPromoCode) -> Result<PromoCode, RepositoryError> {
        let row = sqlx::query_as::<_, PromoCodeRow>(&format!(
            r"
            INSERT INTO promo_codes (
                code, description, discount_type, discount_value, minimum_order_value,
                maximum_discount, usage_limit, valid_from, valid_until, is_active
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {PROMO_COLUMNS}
            "
        ))
        .bind(&new.code)
        .bind(&new.description)
        .bind(new.discount_type.as_str())
        .bind(new.discount_value)
        .bind(new.minimum_order_value)
        .bind(new.maximum_discount)
        .bind(new.usage_limit)
        .bind(new.valid_from)
        .bind(new.valid_until)
        .bind(new.is_active)
        .fetch_one(self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return RepositoryError::Conflict("promo code already exists".to_owned());
            }
            RepositoryError::Database(e)
        })?;

        PromoCode::try_from(row)
    }

    /// Apply a field-mask update to a promo code.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the code doesn't exist.
    pub async fn update(
        &self,
        id: PromoCodeId,
        update: &PromoCodeUpdate,
    ) -> Result<PromoCode, RepositoryError> {
        let row = sqlx::query_as::<_, PromoCodeRow>(&format!(
            r"
            UPDATE promo_codes SET
                description = COALESCE($2, description),
                discount_value = COALESCE($3, discount_value),
                minimum_order_value = COALESCE($4, minimum_order_value),
                maximum_discount = COALESCE($5, maximum_discount),
                usage_limit = COALESCE($6, usage_limit),
                valid_from = COALESCE($7, valid_from),
                valid_until = COALESCE($8, valid_until),
                is_active = COALESCE($9, is_active),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {PROMO_COLUMNS}
            "
        ))
        .bind(id)
        .bind(&update.description)
        .bind(update.discount_value)
        .bind(update.minimum_order_value)
        .bind(update.maximum_discount)
        .bind(update.usage_limit)
        .bind(update.valid_from)
        .bind(update.valid_until)
        .bind(update.is_active)
        .fetch_optional(self.pool)
        .await?;

        row.map(PromoCode::try_from)
            .transpose()?
            .ok_or(RepositoryError::NotFound)
    }

    /// Record a redemption: increment the usage count, conditionally on the
    /// usage limit so the last slot cannot be double-spent.
    ///
    /// # Returns
    ///
    /// Returns `true` if the redemption was recorded.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn increment_usage(&self, id: PromoCodeId) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE promo_codes
            SET usage_count = usage_count + 1, updated_at = NOW()
            WHERE id = $1 AND (usage_limit IS NULL OR usage_count < usage_limit)
            ",
        )
        .bind(id)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete a promo code.
    ///
    /// # Returns
    ///
    /// Returns `true` if the code was deleted, `false` if it didn't exist.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete(&self, id: PromoCodeId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM promo_codes WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
