//! Business logic services.
//!
//! Services orchestrate the pure domain types in [`crate::models`] against
//! the repositories in [`crate::db`]. The order lifecycle engine in
//! [`orders`] is the heart of the crate; the rest are thin coordinators.

pub mod cart;
pub mod inventory;
pub mod orders;
pub mod promo;
pub mod reviews;

pub use cart::{CartError, CartService};
pub use inventory::{Availability, InventoryService};
pub use orders::{InsertOrderError, OrderEngine, OrderError, OrderRequest, OrderStore, PgOrderStore};
pub use promo::{PromoError, PromoService};
pub use reviews::{ReviewError, ReviewService};
