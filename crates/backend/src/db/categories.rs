//! Database operations for product categories.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use butter_crumb_core::CategoryId;

use super::RepositoryError;
use crate::models::product::{Category, CategoryUpdate, NewCategory};

const CATEGORY_COLUMNS: &str =
    "id, name, slug, description, image_url, display_order, is_active, created_at, updated_at";

/// Internal row type for category queries.
#[derive(Debug, sqlx::FromRow)]
struct CategoryRow {
    id: CategoryId,
    name: String,
    slug: String,
    description: Option<String>,
    image_url: Option<String>,
    display_order: i32,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            slug: row.slug,
            description: row.description,
            image_url: row.image_url,
            display_order: row.display_order,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Repository for category database operations.
pub struct CategoryRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CategoryRepository<'a> {
    /// Create a new category repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// All categories ordered for display.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, include_inactive: bool) -> Result<Vec<Category>, RepositoryError> {
        let rows = sqlx::query_as::<_, CategoryRow>(&format!(
            r"
            SELECT {CATEGORY_COLUMNS} FROM categories
            WHERE ($1 OR is_active)
            ORDER BY display_order, name
            "
        ))
        .bind(include_inactive)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Category::from).collect())
    }

    /// Get a category by its ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: CategoryId) -> Result<Option<Category>, RepositoryError> {
        let row = sqlx::query_as::<_, CategoryRow>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Category::from))
    }

    /// Get a category by its URL slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<Category>, RepositoryError> {
        let row = sqlx::query_as::<_, CategoryRow>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories WHERE slug = $1"
        ))
        .bind(slug)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Category::from))
    }

    /// Create a new category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the name or slug already
    /// exists, `RepositoryError::Database` for other failures.
    pub async fn create(&self, new: &NewCategory) -> Result<Category, RepositoryError> {
        let row = sqlx::query_as::<_, CategoryRow>(&format!(
            r"
            INSERT INTO categories (name, slug, description, image_url, display_order, is_active)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {CATEGORY_COLUMNS}
            "
        ))
        .bind(&new.name)
        .bind(&new.slug)
        .bind(&new.description)
        .bind(&new.image_url)
        .bind(new.display_order)
        .bind(new.is_active)
        .fetch_one(self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return RepositoryError::Conflict("category name or slug already exists".to_owned());
            }
            RepositoryError::Database(e)
        })?;

        Ok(row.into())
    }

    /// Apply a field-mask update to a category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the category doesn't exist.
    pub async fn update(
        &self,
        id: CategoryId,
        update: &CategoryUpdate,
    ) -> Result<Category, RepositoryError> {
        let row = sqlx::query_as::<_, CategoryRow>(&format!(
            r"
            UPDATE categories SET
                name = COALESCE($2, name),
                slug = COALESCE($3, slug),
                description = COALESCE($4, description),
                image_url = COALESCE($5, image_url),
                display_order = COALESCE($6, display_order),
                is_active = COALESCE($7, is_active),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {CATEGORY_COLUMNS}
            "
        ))
        .bind(id)
        .bind(&update.name)
        .bind(&update.slug)
        .bind(&update.description)
        .bind(&update.image_url)
        .bind(update.display_order)
        .bind(update.is_active)
        .fetch_optional(self.pool)
        .await?;

        row.map(Category::from).ok_or(RepositoryError::NotFound)
    }

    /// Delete a category. Products keep existing with a null category.
    ///
    /// # Returns
    ///
    /// Returns `true` if the category was deleted, `false` if it didn't exist.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete(&self, id: CategoryId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
