//! Butter & Crumb backend library.
//!
//! Catalog, cart, order lifecycle, inventory, reviews, promo codes, and
//! business settings for the bakery storefront. The HTTP layer,
//! authentication, payments, and email live in separate services; this crate
//! exposes the domain engine and its `PostgreSQL` persistence so those
//! collaborators stay thin.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod settings;
