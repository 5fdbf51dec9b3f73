//! Product and category domain types.
//!
//! Catalog data is read-mostly reference data. Stock bookkeeping lives on the
//! product row itself (`stock_quantity`), mutated only by the inventory
//! service and the order lifecycle engine.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;

use butter_crumb_core::{CategoryId, Money, ProductId, ProductImageId};

/// A product category (e.g. "Sourdough", "Celebration Cakes").
#[derive(Debug, Clone)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub display_order: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a category.
#[derive(Debug, Clone, Deserialize)]
pub struct NewCategory {
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub display_order: i32,
    pub is_active: bool,
}

/// Field mask for partially updating a category.
///
/// `None` means "leave unchanged"; there is no way to clear a nullable
/// field through a partial update.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CategoryUpdate {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub display_order: Option<i32>,
    pub is_active: Option<bool>,
}

/// A bakery product.
#[derive(Debug, Clone)]
pub struct Product {
    pub id: ProductId,
    pub sku: String,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub short_description: Option<String>,

    // Pricing
    pub price: Money,
    pub compare_at_price: Option<Money>,

    // Inventory
    pub stock_quantity: i32,
    pub low_stock_threshold: i32,
    pub track_inventory: bool,
    pub allow_backorder: bool,

    // Ordering constraints
    pub lead_time_hours: i32,
    pub minimum_quantity: i32,
    pub quantity_increment: i32,

    // Dietary flags
    pub is_gluten_free: bool,
    pub is_dairy_free: bool,
    pub is_vegan: bool,
    pub is_keto_friendly: bool,

    /// Allergen names, e.g. `["milk", "eggs", "wheat"]`.
    pub allergens: Vec<String>,

    // Seasonal availability window
    pub is_seasonal: bool,
    pub available_from: Option<NaiveDate>,
    pub available_until: Option<NaiveDate>,

    // Review aggregates, recomputed when approved reviews change
    pub average_rating: Option<rust_decimal::Decimal>,
    pub review_count: i32,

    // Display
    pub is_active: bool,
    pub is_featured: bool,
    pub is_bestseller: bool,
    pub display_order: i32,

    pub category_id: Option<CategoryId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Whether the product can currently be purchased, stock-wise.
    ///
    /// When inventory is not tracked the product is always purchasable;
    /// otherwise it needs positive stock or the backorder flag.
    #[must_use]
    pub fn is_in_stock(&self) -> bool {
        if !self.track_inventory {
            return true;
        }
        self.stock_quantity > 0 || self.allow_backorder
    }

    /// Whether the product has fallen to or below its low-stock threshold.
    #[must_use]
    pub fn is_low_stock(&self) -> bool {
        self.track_inventory && self.stock_quantity <= self.low_stock_threshold
    }

    /// Whether a compare-at price marks the product as discounted.
    #[must_use]
    pub fn is_on_sale(&self) -> bool {
        self.compare_at_price.is_some_and(|compare| compare > self.price)
    }

    /// Whether the seasonal availability window includes `today`.
    #[must_use]
    pub fn is_available_on(&self, today: NaiveDate) -> bool {
        if !self.is_seasonal {
            return true;
        }
        if self.available_from.is_some_and(|from| today < from) {
            return false;
        }
        if self.available_until.is_some_and(|until| today > until) {
            return false;
        }
        true
    }
}

/// Input for creating a product.
#[derive(Debug, Clone, Deserialize)]
pub struct NewProduct {
    pub sku: String,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub short_description: Option<String>,
    pub price: Money,
    pub compare_at_price: Option<Money>,
    pub stock_quantity: i32,
    pub low_stock_threshold: i32,
    pub track_inventory: bool,
    pub allow_backorder: bool,
    pub lead_time_hours: i32,
    pub minimum_quantity: i32,
    pub quantity_increment: i32,
    pub is_gluten_free: bool,
    pub is_dairy_free: bool,
    pub is_vegan: bool,
    pub is_keto_friendly: bool,
    pub allergens: Vec<String>,
    pub is_seasonal: bool,
    pub available_from: Option<NaiveDate>,
    pub available_until: Option<NaiveDate>,
    pub is_active: bool,
    pub is_featured: bool,
    pub is_bestseller: bool,
    pub display_order: i32,
    pub category_id: Option<CategoryId>,
}

/// Field mask for partially updating a product.
///
/// Replaces attribute-by-attribute patching with an explicit schema: every
/// updatable column appears here once, and `None` means "leave unchanged".
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub short_description: Option<String>,
    pub price: Option<Money>,
    pub compare_at_price: Option<Money>,
    pub low_stock_threshold: Option<i32>,
    pub track_inventory: Option<bool>,
    pub allow_backorder: Option<bool>,
    pub lead_time_hours: Option<i32>,
    pub minimum_quantity: Option<i32>,
    pub quantity_increment: Option<i32>,
    pub is_gluten_free: Option<bool>,
    pub is_dairy_free: Option<bool>,
    pub is_vegan: Option<bool>,
    pub is_keto_friendly: Option<bool>,
    pub allergens: Option<Vec<String>>,
    pub is_seasonal: Option<bool>,
    pub available_from: Option<NaiveDate>,
    pub available_until: Option<NaiveDate>,
    pub is_active: Option<bool>,
    pub is_featured: Option<bool>,
    pub is_bestseller: Option<bool>,
    pub display_order: Option<i32>,
    pub category_id: Option<CategoryId>,
}

impl ProductUpdate {
    /// Whether the mask changes anything at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.slug.is_none()
            && self.description.is_none()
            && self.short_description.is_none()
            && self.price.is_none()
            && self.compare_at_price.is_none()
            && self.low_stock_threshold.is_none()
            && self.track_inventory.is_none()
            && self.allow_backorder.is_none()
            && self.lead_time_hours.is_none()
            && self.minimum_quantity.is_none()
            && self.quantity_increment.is_none()
            && self.is_gluten_free.is_none()
            && self.is_dairy_free.is_none()
            && self.is_vegan.is_none()
            && self.is_keto_friendly.is_none()
            && self.allergens.is_none()
            && self.is_seasonal.is_none()
            && self.available_from.is_none()
            && self.available_until.is_none()
            && self.is_active.is_none()
            && self.is_featured.is_none()
            && self.is_bestseller.is_none()
            && self.display_order.is_none()
            && self.category_id.is_none()
    }

    /// Apply the mask to a product, returning the updated copy.
    #[must_use]
    pub fn apply(&self, product: &Product) -> Product {
        let mut updated = product.clone();
        if let Some(name) = &self.name {
            updated.name = name.clone();
        }
        if let Some(slug) = &self.slug {
            updated.slug = slug.clone();
        }
        if let Some(description) = &self.description {
            updated.description = description.clone();
        }
        if let Some(short_description) = &self.short_description {
            updated.short_description = Some(short_description.clone());
        }
        if let Some(price) = self.price {
            updated.price = price;
        }
        if let Some(compare_at_price) = self.compare_at_price {
            updated.compare_at_price = Some(compare_at_price);
        }
        if let Some(low_stock_threshold) = self.low_stock_threshold {
            updated.low_stock_threshold = low_stock_threshold;
        }
        if let Some(track_inventory) = self.track_inventory {
            updated.track_inventory = track_inventory;
        }
        if let Some(allow_backorder) = self.allow_backorder {
            updated.allow_backorder = allow_backorder;
        }
        if let Some(lead_time_hours) = self.lead_time_hours {
            updated.lead_time_hours = lead_time_hours;
        }
        if let Some(minimum_quantity) = self.minimum_quantity {
            updated.minimum_quantity = minimum_quantity;
        }
        if let Some(quantity_increment) = self.quantity_increment {
            updated.quantity_increment = quantity_increment;
        }
        if let Some(is_gluten_free) = self.is_gluten_free {
            updated.is_gluten_free = is_gluten_free;
        }
        if let Some(is_dairy_free) = self.is_dairy_free {
            updated.is_dairy_free = is_dairy_free;
        }
        if let Some(is_vegan) = self.is_vegan {
            updated.is_vegan = is_vegan;
        }
        if let Some(is_keto_friendly) = self.is_keto_friendly {
            updated.is_keto_friendly = is_keto_friendly;
        }
        if let Some(allergens) = &self.allergens {
            updated.allergens = allergens.clone();
        }
        if let Some(is_seasonal) = self.is_seasonal {
            updated.is_seasonal = is_seasonal;
        }
        if let Some(available_from) = self.available_from {
            updated.available_from = Some(available_from);
        }
        if let Some(available_until) = self.available_until {
            updated.available_until = Some(available_until);
        }
        if let Some(is_active) = self.is_active {
            updated.is_active = is_active;
        }
        if let Some(is_featured) = self.is_featured {
            updated.is_featured = is_featured;
        }
        if let Some(is_bestseller) = self.is_bestseller {
            updated.is_bestseller = is_bestseller;
        }
        if let Some(display_order) = self.display_order {
            updated.display_order = display_order;
        }
        if let Some(category_id) = self.category_id {
            updated.category_id = Some(category_id);
        }
        updated
    }
}

/// A product image.
#[derive(Debug, Clone)]
pub struct ProductImage {
    pub id: ProductImageId,
    pub product_id: ProductId,
    pub url: String,
    pub alt_text: Option<String>,
    pub display_order: i32,
    pub is_primary: bool,
}

/// Filter criteria for listing products.
#[derive(Debug, Clone, Default)]
pub struct ProductFilters {
    pub category_slug: Option<String>,
    pub is_featured: Option<bool>,
    pub is_bestseller: Option<bool>,
    pub is_gluten_free: Option<bool>,
    pub is_dairy_free: Option<bool>,
    pub is_vegan: Option<bool>,
    pub is_keto_friendly: Option<bool>,
    pub min_price: Option<Money>,
    pub max_price: Option<Money>,
    /// Matches name, description, or short description, case-insensitively.
    pub search: Option<String>,
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_product() -> Product {
        let now = Utc::now();
        Product {
            id: ProductId::new(1),
            sku: "SRD-001".to_owned(),
            name: "Country Sourdough".to_owned(),
            slug: "country-sourdough".to_owned(),
            description: "A 24-hour fermented loaf.".to_owned(),
            short_description: None,
            price: Money::from_cents(850),
            compare_at_price: None,
            stock_quantity: 10,
            low_stock_threshold: 5,
            track_inventory: true,
            allow_backorder: false,
            lead_time_hours: 24,
            minimum_quantity: 1,
            quantity_increment: 1,
            is_gluten_free: false,
            is_dairy_free: true,
            is_vegan: true,
            is_keto_friendly: false,
            allergens: vec!["wheat".to_owned()],
            is_seasonal: false,
            available_from: None,
            available_until: None,
            average_rating: None,
            review_count: 0,
            is_active: true,
            is_featured: false,
            is_bestseller: false,
            display_order: 0,
            category_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_stock_availability() {
        let mut product = sample_product();
        assert!(product.is_in_stock());

        product.stock_quantity = 0;
        assert!(!product.is_in_stock());

        product.allow_backorder = true;
        assert!(product.is_in_stock());

        product.allow_backorder = false;
        product.track_inventory = false;
        assert!(product.is_in_stock());
    }

    #[test]
    fn test_low_stock_threshold() {
        let mut product = sample_product();
        assert!(!product.is_low_stock());

        product.stock_quantity = 5;
        assert!(product.is_low_stock());

        product.track_inventory = false;
        assert!(!product.is_low_stock());
    }

    #[test]
    fn test_seasonal_window() {
        let mut product = sample_product();
        let date = |y, m, d| NaiveDate::from_ymd_opt(y, m, d).expect("valid date");

        assert!(product.is_available_on(date(2026, 1, 1)));

        product.is_seasonal = true;
        product.available_from = Some(date(2026, 11, 1));
        product.available_until = Some(date(2026, 12, 24));
        assert!(!product.is_available_on(date(2026, 10, 31)));
        assert!(product.is_available_on(date(2026, 11, 1)));
        assert!(product.is_available_on(date(2026, 12, 24)));
        assert!(!product.is_available_on(date(2026, 12, 25)));
    }

    #[test]
    fn test_update_mask_applies_only_set_fields() {
        let product = sample_product();
        let update = ProductUpdate {
            price: Some(Money::from_cents(950)),
            is_featured: Some(true),
            ..ProductUpdate::default()
        };

        let updated = update.apply(&product);
        assert_eq!(updated.price, Money::from_cents(950));
        assert!(updated.is_featured);
        // Everything else untouched
        assert_eq!(updated.name, product.name);
        assert_eq!(updated.stock_quantity, product.stock_quantity);
        assert_eq!(updated.minimum_quantity, product.minimum_quantity);
    }

    #[test]
    fn test_empty_mask_is_identity() {
        let product = sample_product();
        let update = ProductUpdate::default();
        assert!(update.is_empty());

        let updated = update.apply(&product);
        assert_eq!(updated.name, product.name);
        assert_eq!(updated.price, product.price);
        assert_eq!(updated.is_active, product.is_active);
    }
}
