//! Database operations for stored user addresses.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use butter_crumb_core::{AddressId, UserId};

use super::RepositoryError;
use crate::models::address::{Address, AddressType, NewAddress};

const ADDRESS_COLUMNS: &str = "id, user_id, address_type, is_default, first_name, last_name, \
     phone, address_line1, address_line2, city, state, postal_code, country, label, \
     delivery_instructions, created_at, updated_at";

/// Internal row type for address queries.
#[derive(Debug, sqlx::FromRow)]
struct AddressRow {
    id: AddressId,
    user_id: UserId,
    address_type: String,
    is_default: bool,
    first_name: String,
    last_name: String,
    phone: Option<String>,
    address_line1: String,
    address_line2: Option<String>,
    city: String,
    state: String,
    postal_code: String,
    country: String,
    label: Option<String>,
    delivery_instructions: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<AddressRow> for Address {
    type Error = RepositoryError;

    fn try_from(row: AddressRow) -> Result<Self, Self::Error> {
        let address_type = AddressType::from_str(&row.address_type)
            .map_err(RepositoryError::DataCorruption)?;

        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            address_type,
            is_default: row.is_default,
            first_name: row.first_name,
            last_name: row.last_name,
            phone: row.phone,
            address_line1: row.address_line1,
            address_line2: row.address_line2,
            city: row.city,
            state: row.state,
            postal_code: row.postal_code,
            country: row.country,
            label: row.label,
            delivery_instructions: row.delivery_instructions,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Repository for address database operations.
pub struct AddressRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AddressRepository<'a> {
    /// Create a new address repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get an address by its ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: AddressId) -> Result<Option<Address>, RepositoryError> {
        let row = sqlx::query_as::<_, AddressRow>(&format!(
            "SELECT {ADDRESS_COLUMNS} FROM addresses WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(Address::try_from).transpose()
    }

    /// A user's addresses, default first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Address>, RepositoryError> {
        let rows = sqlx::query_as::<_, AddressRow>(&format!(
            r"
            SELECT {ADDRESS_COLUMNS} FROM addresses
            WHERE user_id = $1
            ORDER BY is_default DESC, created_at
            "
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(Address::try_from).collect()
    }

    /// Create a stored address. When marked default, any previous default
    /// of the same type is demoted in the same transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn create(&self, new: &NewAddress) -> Result<Address, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        if new.is_default {
            sqlx::query(
                r"
                UPDATE addresses SET is_default = FALSE, updated_at = NOW()
                WHERE user_id = $1 AND address_type = $2 AND is_default
                ",
            )
            .bind(new.user_id)
            .bind(new.address_type.as_str())
            .execute(&mut *tx)
            .await?;
        }

        let row = sqlx::query_as::<_, AddressRow>(&format!(
            r"
            INSERT INTO addresses (
                user_id, address_type, is_default, first_name, last_name, phone,
                address_line1, address_line2, city, state, postal_code, country,
                label, delivery_instructions
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING {ADDRESS_COLUMNS}
            "
        ))
        .bind(new.user_id)
        .bind(new.address_type.as_str())
        .bind(new.is_default)
        .bind(&new.first_name)
        .bind(&new.last_name)
        .bind(&new.phone)
        .bind(&new.address_line1)
        .bind(&new.address_line2)
        .bind(&new.city)
        .bind(&new.state)
        .bind(&new.postal_code)
        .bind(&new.country)
        .bind(&new.label)
        .bind(&new.delivery_instructions)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Address::try_from(row)
    }

    /// Delete a user's address.
    ///
    /// # Returns
    ///
    /// Returns `true` if the address was deleted, `false` if it didn't exist.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete(&self, id: AddressId, user_id: UserId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM addresses WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
