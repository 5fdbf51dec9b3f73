//! Database operations for products and their images.
//!
//! Stock mutations here are the only writers of `stock_quantity`, and every
//! one of them is an atomic conditional update rather than a read-then-write
//! of a loaded row.

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value as JsonValue;
use sqlx::{PgPool, Postgres, QueryBuilder};

use butter_crumb_core::{CategoryId, Money, ProductId, ProductImageId};

use super::RepositoryError;
use crate::models::product::{
    NewProduct, Product, ProductFilters, ProductImage, ProductUpdate,
};

const PRODUCT_COLUMNS: &str = "id, sku, name, slug, description, short_description, price, \
     compare_at_price, stock_quantity, low_stock_threshold, track_inventory, allow_backorder, \
     lead_time_hours, minimum_quantity, quantity_increment, is_gluten_free, is_dairy_free, \
     is_vegan, is_keto_friendly, allergens, is_seasonal, available_from, available_until, \
     average_rating, review_count, is_active, is_featured, is_bestseller, display_order, \
     category_id, created_at, updated_at";

// =============================================================================
// Internal Row Types
// =============================================================================

/// Internal row type for product queries.
#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: ProductId,
    sku: String,
    name: String,
    slug: String,
    description: String,
    short_description: Option<String>,
    price: Money,
    compare_at_price: Option<Money>,
    stock_quantity: i32,
    low_stock_threshold: i32,
    track_inventory: bool,
    allow_backorder: bool,
    lead_time_hours: i32,
    minimum_quantity: i32,
    quantity_increment: i32,
    is_gluten_free: bool,
    is_dairy_free: bool,
    is_vegan: bool,
    is_keto_friendly: bool,
    allergens: JsonValue,
    is_seasonal: bool,
    available_from: Option<NaiveDate>,
    available_until: Option<NaiveDate>,
    average_rating: Option<rust_decimal::Decimal>,
    review_count: i32,
    is_active: bool,
    is_featured: bool,
    is_bestseller: bool,
    display_order: i32,
    category_id: Option<CategoryId>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = RepositoryError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        let allergens: Vec<String> = serde_json::from_value(row.allergens).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid allergens json: {e}"))
        })?;

        Ok(Self {
            id: row.id,
            sku: row.sku,
            name: row.name,
            slug: row.slug,
            description: row.description,
            short_description: row.short_description,
            price: row.price,
            compare_at_price: row.compare_at_price,
            stock_quantity: row.stock_quantity,
            low_stock_threshold: row.low_stock_threshold,
            track_inventory: row.track_inventory,
            allow_backorder: row.allow_backorder,
            lead_time_hours: row.lead_time_hours,
            minimum_quantity: row.minimum_quantity,
            quantity_increment: row.quantity_increment,
            is_gluten_free: row.is_gluten_free,
            is_dairy_free: row.is_dairy_free,
            is_vegan: row.is_vegan,
            is_keto_friendly: row.is_keto_friendly,
            allergens,
            is_seasonal: row.is_seasonal,
            available_from: row.available_from,
            available_until: row.available_until,
            average_rating: row.average_rating,
            review_count: row.review_count,
            is_active: row.is_active,
            is_featured: row.is_featured,
            is_bestseller: row.is_bestseller,
            display_order: row.display_order,
            category_id: row.category_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Internal row type for product images.
#[derive(Debug, sqlx::FromRow)]
struct ProductImageRow {
    id: ProductImageId,
    product_id: ProductId,
    url: String,
    alt_text: Option<String>,
    display_order: i32,
    is_primary: bool,
}

impl From<ProductImageRow> for ProductImage {
    fn from(row: ProductImageRow) -> Self {
        Self {
            id: row.id,
            product_id: row.product_id,
            url: row.url,
            alt_text: row.alt_text,
            display_order: row.display_order,
            is_primary: row.is_primary,
        }
    }
}

/// Repository for product database operations.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a product by its ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(Product::try_from).transpose()
    }

    /// Get a product by its URL slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE slug = $1"
        ))
        .bind(slug)
        .fetch_optional(self.pool)
        .await?;

        row.map(Product::try_from).transpose()
    }

    /// List products with filters and pagination, ordered by display order
    /// then name. Returns the page and the total match count.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        filters: &ProductFilters,
        include_inactive: bool,
        page: i64,
        page_size: i64,
    ) -> Result<(Vec<Product>, i64), RepositoryError> {
        let mut query = QueryBuilder::<Postgres>::new(format!(
            "SELECT {} FROM products p",
            PRODUCT_COLUMNS
                .split(", ")
                .map(|c| format!("p.{c}"))
                .collect::<Vec<_>>()
                .join(", ")
        ));
        push_product_filters(&mut query, filters, include_inactive);
        query.push(" ORDER BY p.display_order, p.name");
        query.push(" LIMIT ").push_bind(page_size);
        query.push(" OFFSET ").push_bind((page - 1) * page_size);

        let rows = query
            .build_query_as::<ProductRow>()
            .fetch_all(self.pool)
            .await?;

        let mut count_query = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM products p");
        push_product_filters(&mut count_query, filters, include_inactive);
        let total: i64 = count_query
            .build_query_scalar()
            .fetch_one(self.pool)
            .await?;

        let products = rows
            .into_iter()
            .map(Product::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((products, total))
    }

    /// Create a new product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the sku or slug already
    /// exists, `RepositoryError::Database` for other failures.
    pub async fn create(&self, new: &NewProduct) -> Result<Product, RepositoryError> {
        let allergens = serde_json::to_value(&new.allergens).map_err(|e| {
            RepositoryError::DataCorruption(format!("failed to serialize allergens: {e}"))
        })?;

        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            INSERT INTO products (
                sku, name, slug, description, short_description, price, compare_at_price,
                stock_quantity, low_stock_threshold, track_inventory, allow_backorder,
                lead_time_hours, minimum_quantity, quantity_increment,
                is_gluten_free, is_dairy_free, is_vegan, is_keto_friendly, allergens,
                is_seasonal, available_from, available_until,
                is_active, is_featured, is_bestseller, display_order, category_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                    $15, $16, $17, $18, $19, $20, $21, $22, $23, $24, $25, $26, $27)
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(&new.sku)
        .bind(&new.name)
        .bind(&new.slug)
        .bind(&new.description)
        .bind(&new.short_description)
        .bind(new.price)
        .bind(new.compare_at_price)
        .bind(new.stock_quantity)
        .bind(new.low_stock_threshold)
        .bind(new.track_inventory)
        .bind(new.allow_backorder)
        .bind(new.lead_time_hours)
        .bind(new.minimum_quantity)
        .bind(new.quantity_increment)
        .bind(new.is_gluten_free)
        .bind(new.is_dairy_free)
        .bind(new.is_vegan)
        .bind(new.is_keto_friendly)
        .bind(allergens)
        .bind(new.is_seasonal)
        .bind(new.available_from)
        .bind(new.available_until)
        .bind(new.is_active)
        .bind(new.is_featured)
        .bind(new.is_bestseller)
        .bind(new.display_order)
        .bind(new.category_id)
        .fetch_one(self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return RepositoryError::Conflict("sku or slug already exists".to_owned());
            }
            RepositoryError::Database(e)
        })?;

        Product::try_from(row)
    }

    /// Apply a field-mask update to a product.
    ///
    /// Unset mask fields leave their columns untouched. Stock is not
    /// updatable here; use the inventory operations below.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product doesn't exist.
    pub async fn update(
        &self,
        id: ProductId,
        update: &ProductUpdate,
    ) -> Result<Product, RepositoryError> {
        let allergens = update
            .allergens
            .as_ref()
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| {
                RepositoryError::DataCorruption(format!("failed to serialize allergens: {e}"))
            })?;

        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            UPDATE products SET
                name = COALESCE($2, name),
                slug = COALESCE($3, slug),
                description = COALESCE($4, description),
                short_description = COALESCE($5, short_description),
                price = COALESCE($6, price),
                compare_at_price = COALESCE($7, compare_at_price),
                low_stock_threshold = COALESCE($8, low_stock_threshold),
                track_inventory = COALESCE($9, track_inventory),
                allow_backorder = COALESCE($10, allow_backorder),
                lead_time_hours = COALESCE($11, lead_time_hours),
                minimum_quantity = COALESCE($12, minimum_quantity),
                quantity_increment = COALESCE($13, quantity_increment),
                is_gluten_free = COALESCE($14, is_gluten_free),
                is_dairy_free = COALESCE($15, is_dairy_free),
                is_vegan = COALESCE($16, is_vegan),
                is_keto_friendly = COALESCE($17, is_keto_friendly),
                allergens = COALESCE($18, allergens),
                is_seasonal = COALESCE($19, is_seasonal),
                available_from = COALESCE($20, available_from),
                available_until = COALESCE($21, available_until),
                is_active = COALESCE($22, is_active),
                is_featured = COALESCE($23, is_featured),
                is_bestseller = COALESCE($24, is_bestseller),
                display_order = COALESCE($25, display_order),
                category_id = COALESCE($26, category_id),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(id)
        .bind(&update.name)
        .bind(&update.slug)
        .bind(&update.description)
        .bind(&update.short_description)
        .bind(update.price)
        .bind(update.compare_at_price)
        .bind(update.low_stock_threshold)
        .bind(update.track_inventory)
        .bind(update.allow_backorder)
        .bind(update.lead_time_hours)
        .bind(update.minimum_quantity)
        .bind(update.quantity_increment)
        .bind(update.is_gluten_free)
        .bind(update.is_dairy_free)
        .bind(update.is_vegan)
        .bind(update.is_keto_friendly)
        .bind(allergens)
        .bind(update.is_seasonal)
        .bind(update.available_from)
        .bind(update.available_until)
        .bind(update.is_active)
        .bind(update.is_featured)
        .bind(update.is_bestseller)
        .bind(update.display_order)
        .bind(update.category_id)
        .fetch_optional(self.pool)
        .await?;

        row.map(Product::try_from)
            .transpose()?
            .ok_or(RepositoryError::NotFound)
    }

    /// Delete a product.
    ///
    /// # Returns
    ///
    /// Returns `true` if the product was deleted, `false` if it didn't exist.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete(&self, id: ProductId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // =========================================================================
    // Inventory ledger
    // =========================================================================

    /// Atomically reserve stock: decrement the counter only when enough
    /// remains or the product allows backorders.
    ///
    /// Returns whether the reservation was applied.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn reserve_stock(
        &self,
        id: ProductId,
        quantity: i32,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE products
            SET stock_quantity = stock_quantity - $2, updated_at = NOW()
            WHERE id = $1 AND (stock_quantity >= $2 OR allow_backorder)
            ",
        )
        .bind(id)
        .bind(quantity)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Release previously reserved stock. Unconditional increment.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn release_stock(
        &self,
        id: ProductId,
        quantity: i32,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            UPDATE products
            SET stock_quantity = stock_quantity + $2, updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(quantity)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Set stock to an absolute level, clamped at zero.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product doesn't exist.
    pub async fn set_stock(
        &self,
        id: ProductId,
        quantity: i32,
    ) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            UPDATE products
            SET stock_quantity = GREATEST($2, 0), updated_at = NOW()
            WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(id)
        .bind(quantity)
        .fetch_optional(self.pool)
        .await?;

        row.map(Product::try_from)
            .transpose()?
            .ok_or(RepositoryError::NotFound)
    }

    /// Bulk stock update inside one transaction. Unknown ids are skipped;
    /// returns how many rows changed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any statement fails; the
    /// transaction rolls back entirely.
    pub async fn bulk_set_stock(
        &self,
        updates: &[(ProductId, i32)],
    ) -> Result<u64, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let mut changed = 0;

        for (id, quantity) in updates {
            let result = sqlx::query(
                r"
                UPDATE products
                SET stock_quantity = GREATEST($2, 0), updated_at = NOW()
                WHERE id = $1
                ",
            )
            .bind(id)
            .bind(quantity)
            .execute(&mut *tx)
            .await?;
            changed += result.rows_affected();
        }

        tx.commit().await?;
        Ok(changed)
    }

    /// Active, tracked products at or below their low-stock threshold (or
    /// an override threshold).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn low_stock(
        &self,
        threshold: Option<i32>,
    ) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            SELECT {PRODUCT_COLUMNS} FROM products
            WHERE is_active AND track_inventory
              AND stock_quantity <= COALESCE($1, low_stock_threshold)
            ORDER BY stock_quantity, name
            "
        ))
        .bind(threshold)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(Product::try_from).collect()
    }

    // =========================================================================
    // Images
    // =========================================================================

    /// Images for a product, primary first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn images(&self, product_id: ProductId) -> Result<Vec<ProductImage>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductImageRow>(
            r"
            SELECT id, product_id, url, alt_text, display_order, is_primary
            FROM product_images
            WHERE product_id = $1
            ORDER BY is_primary DESC, display_order
            ",
        )
        .bind(product_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(ProductImage::from).collect())
    }

    /// Attach an image to a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn add_image(
        &self,
        product_id: ProductId,
        url: &str,
        alt_text: Option<&str>,
        display_order: i32,
        is_primary: bool,
    ) -> Result<ProductImage, RepositoryError> {
        let row = sqlx::query_as::<_, ProductImageRow>(
            r"
            INSERT INTO product_images (product_id, url, alt_text, display_order, is_primary)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, product_id, url, alt_text, display_order, is_primary
            ",
        )
        .bind(product_id)
        .bind(url)
        .bind(alt_text)
        .bind(display_order)
        .bind(is_primary)
        .fetch_one(self.pool)
        .await?;

        Ok(row.into())
    }

    /// Remove an image.
    ///
    /// # Returns
    ///
    /// Returns `true` if the image was deleted, `false` if it didn't exist.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete_image(&self, id: ProductImageId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM product_images WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

/// Append the shared WHERE clauses for product listing queries.
fn push_product_filters(
    query: &mut QueryBuilder<'_, Postgres>,
    filters: &ProductFilters,
    include_inactive: bool,
) {
    if filters.category_slug.is_some() {
        query.push(" JOIN categories c ON c.id = p.category_id");
    }
    query.push(" WHERE TRUE");

    if !include_inactive {
        query.push(" AND p.is_active");
    }
    if let Some(slug) = &filters.category_slug {
        query.push(" AND c.slug = ").push_bind(slug.clone());
    }
    if let Some(is_featured) = filters.is_featured {
        query.push(" AND p.is_featured = ").push_bind(is_featured);
    }
    if let Some(is_bestseller) = filters.is_bestseller {
        query.push(" AND p.is_bestseller = ").push_bind(is_bestseller);
    }
    if let Some(is_gluten_free) = filters.is_gluten_free {
        query.push(" AND p.is_gluten_free = ").push_bind(is_gluten_free);
    }
    if let Some(is_dairy_free) = filters.is_dairy_free {
        query.push(" AND p.is_dairy_free = ").push_bind(is_dairy_free);
    }
    if let Some(is_vegan) = filters.is_vegan {
        query.push(" AND p.is_vegan = ").push_bind(is_vegan);
    }
    if let Some(is_keto_friendly) = filters.is_keto_friendly {
        query.push(" AND p.is_keto_friendly = ").push_bind(is_keto_friendly);
    }
    if let Some(min_price) = filters.min_price {
        query.push(" AND p.price >= ").push_bind(min_price);
    }
    if let Some(max_price) = filters.max_price {
        query.push(" AND p.price <= ").push_bind(max_price);
    }
    if let Some(search) = &filters.search {
        let pattern = format!("%{search}%");
        query.push(" AND (p.name ILIKE ");
        query.push_bind(pattern.clone());
        query.push(" OR p.description ILIKE ");
        query.push_bind(pattern.clone());
        query.push(" OR p.short_description ILIKE ");
        query.push_bind(pattern);
        query.push(")");
    }
}
