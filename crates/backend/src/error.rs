//! Unified error handling.
//!
//! Each module owns a focused `thiserror` enum; this module folds them into
//! one [`AppError`] and classifies every error into an [`ErrorKind`] so the
//! (external) request layer can map failures onto response codes without
//! inspecting individual variants. No error here is fatal: everything is
//! recoverable at the request boundary, and nothing is retried
//! automatically.

use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::cart::CartError;
use crate::services::orders::OrderError;
use crate::services::promo::PromoError;
use crate::services::reviews::ReviewError;
use crate::settings::SettingsError;

/// Application-level error type for the backend.
#[derive(Debug, Error)]
pub enum AppError {
    /// Order lifecycle operation failed.
    #[error(transparent)]
    Order(#[from] OrderError),

    /// Cart operation failed.
    #[error(transparent)]
    Cart(#[from] CartError),

    /// Promo code operation failed.
    #[error(transparent)]
    Promo(#[from] PromoError),

    /// Review operation failed.
    #[error(transparent)]
    Review(#[from] ReviewError),

    /// Settings operation failed.
    #[error(transparent)]
    Settings(#[from] SettingsError),

    /// Database operation failed.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Coarse classification of an error, mirroring how the request layer
/// reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Rejected request; no partial mutation happened.
    Validation,
    /// Illegal status change; the order is unmodified.
    InvalidTransition,
    /// Missing product, address, order, or other entity (404-equivalent).
    NotFound,
    /// Uniqueness or state conflict (duplicate sku, exhausted promo code).
    Conflict,
    /// Storage or serialization failure.
    Internal,
}

impl AppError {
    /// Classify this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Order(err) => match err {
                OrderError::EmptyCart
                | OrderError::ShippingAddressRequired
                | OrderError::ShippingAddressConflict
                | OrderError::InsufficientStock { .. }
                | OrderError::NotCancellable(_) => ErrorKind::Validation,
                OrderError::Transition(_) => ErrorKind::InvalidTransition,
                OrderError::AddressNotFound(_) | OrderError::ProductNotFound(_) => {
                    ErrorKind::NotFound
                }
                OrderError::OrderNumberCollision => ErrorKind::Conflict,
                OrderError::Repository(err) => repository_kind(err),
            },
            Self::Cart(err) => match err {
                CartError::ProductInactive
                | CartError::OutOfStock
                | CartError::BelowMinimumQuantity { .. }
                | CartError::QuantityNotInIncrements { .. } => ErrorKind::Validation,
                CartError::ProductNotFound(_) | CartError::ItemNotFound(_) => ErrorKind::NotFound,
                CartError::Repository(err) => repository_kind(err),
            },
            Self::Promo(err) => match err {
                PromoError::NotValid | PromoError::BelowMinimumOrder { .. } => {
                    ErrorKind::Validation
                }
                PromoError::UnknownCode(_) => ErrorKind::NotFound,
                PromoError::Repository(err) => repository_kind(err),
            },
            Self::Review(err) => match err {
                ReviewError::InvalidRating(_) => ErrorKind::Validation,
                ReviewError::AlreadyReviewed => ErrorKind::Conflict,
                ReviewError::ReviewNotFound(_) => ErrorKind::NotFound,
                ReviewError::Repository(err) => repository_kind(err),
            },
            Self::Settings(_) => ErrorKind::Internal,
            Self::Repository(err) => repository_kind(err),
        }
    }
}

fn repository_kind(err: &RepositoryError) -> ErrorKind {
    match err {
        RepositoryError::NotFound => ErrorKind::NotFound,
        RepositoryError::Conflict(_) => ErrorKind::Conflict,
        RepositoryError::Database(_) | RepositoryError::DataCorruption(_) => ErrorKind::Internal,
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use butter_crumb_core::{OrderStatus, ProductId};

    use super::*;
    use crate::models::order::TransitionError;

    #[test]
    fn test_validation_kinds() {
        assert_eq!(
            AppError::from(OrderError::EmptyCart).kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            AppError::from(CartError::QuantityNotInIncrements { increment: 3 }).kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            AppError::from(OrderError::InsufficientStock {
                product_id: ProductId::new(1)
            })
            .kind(),
            ErrorKind::Validation
        );
    }

    #[test]
    fn test_invalid_transition_kind() {
        let err = AppError::from(OrderError::Transition(TransitionError {
            from: OrderStatus::Delivered,
            to: OrderStatus::Cancelled,
        }));
        assert_eq!(err.kind(), ErrorKind::InvalidTransition);
    }

    #[test]
    fn test_not_found_kinds() {
        assert_eq!(
            AppError::from(OrderError::ProductNotFound(ProductId::new(7))).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            AppError::from(RepositoryError::NotFound).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            AppError::from(PromoError::UnknownCode("NOPE".to_owned())).kind(),
            ErrorKind::NotFound
        );
    }

    #[test]
    fn test_conflict_and_internal_kinds() {
        assert_eq!(
            AppError::from(ReviewError::AlreadyReviewed).kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            AppError::from(RepositoryError::DataCorruption("bad json".to_owned())).kind(),
            ErrorKind::Internal
        );
    }
}
