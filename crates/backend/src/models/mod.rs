//! Domain types for the bakery backend.
//!
//! These types represent validated domain objects separate from database row
//! types; the repositories in [`crate::db`] convert rows into them.

pub mod address;
pub mod cart;
pub mod order;
pub mod product;
pub mod promo;
pub mod review;

pub use address::{Address, AddressSnapshot, AddressType, NewAddress};
pub use cart::{Cart, CartItem, NewCartItem};
pub use order::{
    NewOrder, NewOrderItem, Order, OrderFilters, OrderItem, OrderTotals, ProductSnapshot,
    StockReservation, TransitionError,
};
pub use product::{
    Category, CategoryUpdate, NewCategory, NewProduct, Product, ProductFilters, ProductImage,
    ProductUpdate,
};
pub use promo::{NewPromoCode, PromoCode, PromoCodeUpdate};
pub use review::{NewReview, Review, ReviewUpdate};
