//! Address domain types.
//!
//! Stored addresses belong to a user and may change at any time; orders
//! therefore embed an [`AddressSnapshot`] copied at checkout instead of a
//! live reference.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use butter_crumb_core::{AddressId, UserId};

/// A stored user address for shipping or billing.
#[derive(Debug, Clone)]
pub struct Address {
    pub id: AddressId,
    pub user_id: UserId,
    pub address_type: AddressType,
    pub is_default: bool,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub address_line1: String,
    pub address_line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    /// Optional label like "Home" or "Work".
    pub label: Option<String>,
    pub delivery_instructions: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// What a stored address is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AddressType {
    #[default]
    Shipping,
    Billing,
}

impl AddressType {
    /// Canonical snake_case name, matching the database representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Shipping => "shipping",
            Self::Billing => "billing",
        }
    }
}

impl std::str::FromStr for AddressType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "shipping" => Ok(Self::Shipping),
            "billing" => Ok(Self::Billing),
            _ => Err(format!("invalid address type: {s}")),
        }
    }
}

impl Address {
    /// Full name for display on labels.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Copy the address into an immutable snapshot for embedding in an order.
    #[must_use]
    pub fn snapshot(&self) -> AddressSnapshot {
        AddressSnapshot {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            phone: self.phone.clone(),
            address_line1: self.address_line1.clone(),
            address_line2: self.address_line2.clone(),
            city: self.city.clone(),
            state: self.state.clone(),
            postal_code: self.postal_code.clone(),
            country: self.country.clone(),
            delivery_instructions: self.delivery_instructions.clone(),
        }
    }
}

/// Input for creating a stored address.
#[derive(Debug, Clone, Deserialize)]
pub struct NewAddress {
    pub user_id: UserId,
    pub address_type: AddressType,
    pub is_default: bool,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub address_line1: String,
    pub address_line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    pub label: Option<String>,
    pub delivery_instructions: Option<String>,
}

/// Immutable address data embedded in an order at creation time.
///
/// Also accepted inline for guest checkout, where no stored address exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressSnapshot {
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub address_line1: String,
    pub address_line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    #[serde(default)]
    pub delivery_instructions: Option<String>,
}

impl AddressSnapshot {
    /// Single-line rendering for logs and receipts.
    #[must_use]
    pub fn formatted(&self) -> String {
        let mut parts = vec![self.address_line1.clone()];
        if let Some(line2) = &self.address_line2 {
            parts.push(line2.clone());
        }
        parts.push(format!("{}, {} {}", self.city, self.state, self.postal_code));
        parts.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_snapshot() -> AddressSnapshot {
        AddressSnapshot {
            first_name: "June".to_owned(),
            last_name: "Park".to_owned(),
            phone: None,
            address_line1: "12 Rye Lane".to_owned(),
            address_line2: Some("Unit 3".to_owned()),
            city: "Portland".to_owned(),
            state: "OR".to_owned(),
            postal_code: "97201".to_owned(),
            country: "US".to_owned(),
            delivery_instructions: None,
        }
    }

    #[test]
    fn test_formatted_includes_line2() {
        assert_eq!(
            sample_snapshot().formatted(),
            "12 Rye Lane, Unit 3, Portland, OR 97201"
        );
    }

    #[test]
    fn test_snapshot_json_roundtrip() {
        let snapshot = sample_snapshot();
        let json = serde_json::to_value(&snapshot).expect("serialize");
        let back: AddressSnapshot = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, snapshot);
    }
}
