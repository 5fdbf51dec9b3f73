//! Human-readable order numbers.
//!
//! An order number is not the primary key; it is the identifier customers
//! see on receipts and quote in support requests. Format:
//! `BC-YYMMDD-XXXX`, where the suffix is four random uppercase
//! alphanumerics. Uniqueness is backed by a database constraint, with the
//! caller retrying on a collision.

use chrono::NaiveDate;
use rand::Rng;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};

const PREFIX: &str = "BC";
const SUFFIX_LEN: usize = 4;
const SUFFIX_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Errors that can occur when parsing an [`OrderNumber`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum OrderNumberError {
    /// The value does not match the `BC-YYMMDD-XXXX` shape.
    #[error("malformed order number: {0}")]
    Malformed(String),
}

/// A human-readable, unique order identifier (`BC-YYMMDD-XXXX`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderNumber(String);

impl OrderNumber {
    /// Generate a fresh order number for `date` using the supplied RNG.
    ///
    /// Deterministic given the RNG, which keeps tests reproducible; callers
    /// outside tests use [`OrderNumber::generate`].
    #[must_use]
    pub fn generate_on<R: Rng + ?Sized>(date: NaiveDate, rng: &mut R) -> Self {
        let suffix: String = (0..SUFFIX_LEN)
            .map(|_| {
                SUFFIX_ALPHABET
                    .choose(rng)
                    .copied()
                    .map_or('0', char::from)
            })
            .collect();
        Self(format!("{PREFIX}-{}-{suffix}", date.format("%y%m%d")))
    }

    /// Generate a fresh order number for today's date.
    #[must_use]
    pub fn generate() -> Self {
        Self::generate_on(chrono::Utc::now().date_naive(), &mut rand::rng())
    }

    /// Parse a stored order number, validating its shape.
    ///
    /// # Errors
    ///
    /// Returns [`OrderNumberError::Malformed`] if the value does not look
    /// like a generated order number.
    pub fn parse(value: &str) -> Result<Self, OrderNumberError> {
        let malformed = || OrderNumberError::Malformed(value.to_owned());

        let rest = value.strip_prefix("BC-").ok_or_else(malformed)?;
        let (date, suffix) = rest.split_once('-').ok_or_else(malformed)?;

        if date.len() != 6 || !date.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed());
        }
        if suffix.len() != SUFFIX_LEN
            || !suffix
                .bytes()
                .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
        {
            return Err(malformed());
        }

        Ok(Self(value.to_owned()))
    }

    /// The order number as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<OrderNumber> for String {
    fn from(number: OrderNumber) -> Self {
        number.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn march_first() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 1).expect("valid date")
    }

    #[test]
    fn test_generate_shape() {
        let number = OrderNumber::generate_on(march_first(), &mut rand::rng());
        let text = number.as_str();

        assert!(text.starts_with("BC-260301-"), "got {text}");
        assert_eq!(text.len(), "BC-YYMMDD-XXXX".len());
        assert!(OrderNumber::parse(text).is_ok());
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in [
            "",
            "BC-260301",
            "XX-260301-AB12",
            "BC-2603O1-AB12",
            "BC-260301-ab12",
            "BC-260301-AB123",
        ] {
            assert!(OrderNumber::parse(bad).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn test_generated_numbers_vary() {
        let mut rng = rand::rng();
        let a = OrderNumber::generate_on(march_first(), &mut rng);
        let b = OrderNumber::generate_on(march_first(), &mut rng);
        // Not a uniqueness guarantee, but 36^4 suffixes make a same-call
        // collision overwhelmingly unlikely; the database constraint is the
        // real backstop.
        assert_ne!(a, b);
    }
}
