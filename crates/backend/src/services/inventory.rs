//! Inventory ledger operations.
//!
//! Stock is a plain counter on each product row. All mutations go through
//! atomic conditional updates in the repository layer, so concurrent
//! checkouts cannot both pass a read-then-write check and drive a tracked
//! product negative. Releases are unconditional.

use sqlx::PgPool;

use butter_crumb_core::ProductId;

use crate::db::{ProductRepository, RepositoryError};
use crate::models::product::Product;

/// Outcome of an availability check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Availability {
    Available,
    ProductNotFound,
    Inactive,
    OutOfStock,
    /// In stock, but not enough for the requested quantity.
    InsufficientStock { available: i32 },
}

impl Availability {
    /// Evaluate a product's availability for a requested quantity.
    #[must_use]
    pub fn evaluate(product: Option<&Product>, quantity: i32) -> Self {
        let Some(product) = product else {
            return Self::ProductNotFound;
        };
        if !product.is_active {
            return Self::Inactive;
        }
        if product.track_inventory
            && product.stock_quantity < quantity
            && !product.allow_backorder
        {
            if product.stock_quantity == 0 {
                return Self::OutOfStock;
            }
            return Self::InsufficientStock {
                available: product.stock_quantity,
            };
        }
        Self::Available
    }

    /// Whether the requested quantity can be purchased.
    #[must_use]
    pub fn is_available(&self) -> bool {
        *self == Self::Available
    }

    /// Customer-facing denial reason, `None` when available.
    #[must_use]
    pub fn denial_reason(&self) -> Option<String> {
        match self {
            Self::Available => None,
            Self::ProductNotFound => Some("Product not found".to_owned()),
            Self::Inactive => Some("Product is not available".to_owned()),
            Self::OutOfStock => Some("Product is out of stock".to_owned()),
            Self::InsufficientStock { available } => Some(format!("Only {available} available")),
        }
    }
}

/// Service for managing product stock levels.
pub struct InventoryService<'a> {
    pool: &'a PgPool,
}

impl<'a> InventoryService<'a> {
    /// Create an inventory service over a connection pool.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Check whether `quantity` units of a product can be purchased.
    ///
    /// # Errors
    ///
    /// Storage errors only; a missing product is an [`Availability`]
    /// outcome, not an error.
    pub async fn check_availability(
        &self,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<Availability, RepositoryError> {
        let product = ProductRepository::new(self.pool).get_by_id(product_id).await?;
        Ok(Availability::evaluate(product.as_ref(), quantity))
    }

    /// Reserve stock by decrementing the counter.
    ///
    /// Atomic conditional update: the decrement only applies when enough
    /// stock remains or the product allows backorders. Returns whether the
    /// reservation was applied.
    ///
    /// # Errors
    ///
    /// Storage errors.
    pub async fn reserve(
        &self,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<bool, RepositoryError> {
        ProductRepository::new(self.pool)
            .reserve_stock(product_id, quantity)
            .await
    }

    /// Release previously reserved stock (e.g. for a cancelled order).
    ///
    /// Unconditional increment.
    ///
    /// # Errors
    ///
    /// Storage errors.
    pub async fn release(
        &self,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<(), RepositoryError> {
        ProductRepository::new(self.pool)
            .release_stock(product_id, quantity)
            .await
    }

    /// Set a product's stock to an absolute quantity, clamped at zero.
    ///
    /// # Errors
    ///
    /// `RepositoryError::NotFound` when the product does not exist.
    pub async fn set_stock(
        &self,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<Product, RepositoryError> {
        let updated = ProductRepository::new(self.pool)
            .set_stock(product_id, quantity.max(0))
            .await?;
        tracing::info!(product = %product_id, stock = quantity.max(0), "stock level set");
        Ok(updated)
    }

    /// Bulk stock update for the admin dashboard.
    ///
    /// Each entry is applied as its own conditional set inside one
    /// transaction; unknown product ids are skipped. Returns how many rows
    /// changed.
    ///
    /// # Errors
    ///
    /// Storage errors; the transaction rolls back entirely.
    pub async fn bulk_set_stock(
        &self,
        updates: &[(ProductId, i32)],
    ) -> Result<u64, RepositoryError> {
        ProductRepository::new(self.pool).bulk_set_stock(updates).await
    }

    /// Products at or below their low-stock threshold.
    ///
    /// With `threshold`, compares against the override instead of each
    /// product's own threshold. Only active, tracked products qualify.
    ///
    /// # Errors
    ///
    /// Storage errors.
    pub async fn low_stock(
        &self,
        threshold: Option<i32>,
    ) -> Result<Vec<Product>, RepositoryError> {
        ProductRepository::new(self.pool).low_stock(threshold).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::product::tests::sample_product;

    #[test]
    fn test_available_when_stock_suffices() {
        let product = sample_product();
        assert!(Availability::evaluate(Some(&product), 10).is_available());
        assert!(Availability::evaluate(Some(&product), 1).is_available());
    }

    #[test]
    fn test_missing_product() {
        let availability = Availability::evaluate(None, 1);
        assert_eq!(availability, Availability::ProductNotFound);
        assert!(availability.denial_reason().is_some());
    }

    #[test]
    fn test_inactive_product() {
        let mut product = sample_product();
        product.is_active = false;
        assert_eq!(
            Availability::evaluate(Some(&product), 1),
            Availability::Inactive
        );
    }

    #[test]
    fn test_out_of_stock_vs_partial_stock() {
        let mut product = sample_product();
        product.stock_quantity = 0;
        assert_eq!(
            Availability::evaluate(Some(&product), 1),
            Availability::OutOfStock
        );

        product.stock_quantity = 3;
        assert_eq!(
            Availability::evaluate(Some(&product), 5),
            Availability::InsufficientStock { available: 3 }
        );
        assert_eq!(
            Availability::evaluate(Some(&product), 5).denial_reason().as_deref(),
            Some("Only 3 available")
        );
    }

    #[test]
    fn test_backorder_and_untracked_always_available() {
        let mut product = sample_product();
        product.stock_quantity = 0;
        product.allow_backorder = true;
        assert!(Availability::evaluate(Some(&product), 100).is_available());

        product.allow_backorder = false;
        product.track_inventory = false;
        assert!(Availability::evaluate(Some(&product), 100).is_available());
    }
}
