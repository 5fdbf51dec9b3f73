//! Seed the database with sample catalog data and default settings.
//!
//! # Usage
//!
//! ```bash
//! bc-cli seed            # add sample rows, skipping existing skus
//! bc-cli seed --fresh    # wipe catalog tables first
//! ```

use rust_decimal::Decimal;

use butter_crumb_backend::config::{BackendConfig, ConfigError};
use butter_crumb_backend::db::{self, CategoryRepository, ProductRepository, RepositoryError};
use butter_crumb_backend::models::{NewCategory, NewProduct};
use butter_crumb_backend::settings::{self, BusinessSettings, SettingsError};
use butter_crumb_core::{CategoryId, Money};

/// Errors that can occur while seeding.
#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

struct SeedCategory {
    name: &'static str,
    slug: &'static str,
    description: &'static str,
    display_order: i32,
}

const CATEGORIES: &[SeedCategory] = &[
    SeedCategory {
        name: "Breads",
        slug: "breads",
        description: "Naturally leavened loaves, baked fresh daily.",
        display_order: 1,
    },
    SeedCategory {
        name: "Pastries",
        slug: "pastries",
        description: "Laminated doughs and morning bakes.",
        display_order: 2,
    },
    SeedCategory {
        name: "Celebration Cakes",
        slug: "celebration-cakes",
        description: "Made-to-order cakes for birthdays and gatherings.",
        display_order: 3,
    },
    SeedCategory {
        name: "Cookies",
        slug: "cookies",
        description: "Soft-baked cookies by the half dozen.",
        display_order: 4,
    },
];

struct SeedProduct {
    sku: &'static str,
    name: &'static str,
    slug: &'static str,
    description: &'static str,
    short_description: &'static str,
    price_cents: i64,
    stock_quantity: i32,
    allow_backorder: bool,
    category_slug: &'static str,
    lead_time_hours: i32,
    minimum_quantity: i32,
    quantity_increment: i32,
    is_vegan: bool,
    is_gluten_free: bool,
    allergens: &'static [&'static str],
    is_featured: bool,
}

const PRODUCTS: &[SeedProduct] = &[
    SeedProduct {
        sku: "BRD-SRD-001",
        name: "Country Sourdough",
        slug: "country-sourdough",
        description: "A 24-hour fermented loaf with a deep caramelized crust and an open, \
                      tangy crumb. Baked every morning from our decade-old starter.",
        short_description: "Naturally leavened, 24-hour ferment",
        price_cents: 850,
        stock_quantity: 20,
        allow_backorder: false,
        category_slug: "breads",
        lead_time_hours: 0,
        minimum_quantity: 1,
        quantity_increment: 1,
        is_vegan: true,
        is_gluten_free: false,
        allergens: &["wheat"],
        is_featured: true,
    },
    SeedProduct {
        sku: "BRD-RYE-002",
        name: "Seeded Rye",
        slug: "seeded-rye",
        description: "Dense Scandinavian-style rye packed with sunflower, flax, and pumpkin \
                      seeds. Keeps for a week and toasts beautifully.",
        short_description: "Dense rye with three seeds",
        price_cents: 950,
        stock_quantity: 12,
        allow_backorder: false,
        category_slug: "breads",
        lead_time_hours: 0,
        minimum_quantity: 1,
        quantity_increment: 1,
        is_vegan: true,
        is_gluten_free: false,
        allergens: &["wheat", "rye"],
        is_featured: false,
    },
    SeedProduct {
        sku: "PST-CRS-001",
        name: "Butter Croissant",
        slug: "butter-croissant",
        description: "Twenty-seven layers of cultured butter and slow-proofed dough, baked to \
                      a shattering crisp. Sold in boxes of three.",
        short_description: "Classic laminated croissant",
        price_cents: 425,
        stock_quantity: 36,
        allow_backorder: false,
        category_slug: "pastries",
        lead_time_hours: 0,
        minimum_quantity: 3,
        quantity_increment: 3,
        is_vegan: false,
        is_gluten_free: false,
        allergens: &["wheat", "milk", "eggs"],
        is_featured: true,
    },
    SeedProduct {
        sku: "CAK-CHO-001",
        name: "Dark Chocolate Layer Cake",
        slug: "dark-chocolate-layer-cake",
        description: "Three layers of 70% chocolate sponge with whipped ganache. Made to \
                      order; please allow two days.",
        short_description: "70% chocolate, whipped ganache",
        price_cents: 4800,
        stock_quantity: 0,
        allow_backorder: true,
        category_slug: "celebration-cakes",
        lead_time_hours: 48,
        minimum_quantity: 1,
        quantity_increment: 1,
        is_vegan: false,
        is_gluten_free: false,
        allergens: &["wheat", "milk", "eggs", "soy"],
        is_featured: true,
    },
    SeedProduct {
        sku: "CKE-CHC-001",
        name: "Chocolate Chunk Cookies",
        slug: "chocolate-chunk-cookies",
        description: "Brown-butter dough with hand-chopped chocolate and flaky salt, baked \
                      soft in the middle. Sold by the half dozen.",
        short_description: "Brown butter and flaky salt",
        price_cents: 300,
        stock_quantity: 60,
        allow_backorder: false,
        category_slug: "cookies",
        lead_time_hours: 0,
        minimum_quantity: 6,
        quantity_increment: 6,
        is_vegan: false,
        is_gluten_free: false,
        allergens: &["wheat", "milk", "eggs"],
        is_featured: false,
    },
];

/// Seed sample categories, products, and default business settings.
///
/// With `fresh`, catalog tables are wiped first; otherwise rows whose slug
/// already exists are skipped.
///
/// # Errors
///
/// Returns an error if configuration is missing or any database operation
/// fails.
pub async fn run(fresh: bool) -> Result<(), SeedError> {
    let config = BackendConfig::from_env()?;

    tracing::info!("Connecting to database...");
    let pool = db::create_pool(&config.database_url).await?;

    if fresh {
        tracing::warn!("--fresh: deleting existing catalog rows");
        sqlx::query("DELETE FROM products").execute(&pool).await?;
        sqlx::query("DELETE FROM categories").execute(&pool).await?;
    }

    let categories = CategoryRepository::new(&pool);
    let products = ProductRepository::new(&pool);

    let mut seeded_categories = 0;
    for category in CATEGORIES {
        if categories.get_by_slug(category.slug).await?.is_some() {
            continue;
        }
        categories
            .create(&NewCategory {
                name: category.name.to_owned(),
                slug: category.slug.to_owned(),
                description: Some(category.description.to_owned()),
                image_url: None,
                display_order: category.display_order,
                is_active: true,
            })
            .await?;
        seeded_categories += 1;
    }

    let mut seeded_products = 0;
    for product in PRODUCTS {
        if products.get_by_slug(product.slug).await?.is_some() {
            continue;
        }
        let category_id = category_id_for(&categories, product.category_slug).await?;
        products.create(&new_product(product, category_id)).await?;
        seeded_products += 1;
    }

    // Write default business settings only when none exist
    if settings::get_setting(&pool, "business").await?.is_none() {
        let defaults = serde_json::to_value(BusinessSettings::default())?;
        settings::set_setting(&pool, "business", &defaults).await?;
        tracing::info!("Default business settings written");
    }

    tracing::info!(
        categories = seeded_categories,
        products = seeded_products,
        "Seeding complete!"
    );
    Ok(())
}

async fn category_id_for(
    categories: &CategoryRepository<'_>,
    slug: &str,
) -> Result<Option<CategoryId>, SeedError> {
    Ok(categories.get_by_slug(slug).await?.map(|category| category.id))
}

fn new_product(seed: &SeedProduct, category_id: Option<CategoryId>) -> NewProduct {
    NewProduct {
        sku: seed.sku.to_owned(),
        name: seed.name.to_owned(),
        slug: seed.slug.to_owned(),
        description: seed.description.to_owned(),
        short_description: Some(seed.short_description.to_owned()),
        price: Money::new(Decimal::new(seed.price_cents, 2)),
        compare_at_price: None,
        stock_quantity: seed.stock_quantity,
        low_stock_threshold: 5,
        track_inventory: true,
        allow_backorder: seed.allow_backorder,
        lead_time_hours: seed.lead_time_hours,
        minimum_quantity: seed.minimum_quantity,
        quantity_increment: seed.quantity_increment,
        is_gluten_free: seed.is_gluten_free,
        is_dairy_free: seed.is_vegan,
        is_vegan: seed.is_vegan,
        is_keto_friendly: false,
        allergens: seed.allergens.iter().map(|&a| a.to_owned()).collect(),
        is_seasonal: false,
        available_from: None,
        available_until: None,
        is_active: true,
        is_featured: seed.is_featured,
        is_bestseller: false,
        display_order: 0,
        category_id,
    }
}
