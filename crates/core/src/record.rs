use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ids::ProductId;
use crate::state::{FinancialState, FulfillmentState, RefundState, SourceKind};

/// Identity of a raw record inside its origin system.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceRef {
    pub kind: SourceKind,
    pub id: String,
}

impl SourceRef {
    pub fn new(kind: SourceKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }
}

/// Buyer contact fields, each independently nullable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub email: Option<String>,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub shipping_address: Option<String>,
}

impl Contact {
    pub fn is_empty(&self) -> bool {
        self.email.is_none()
            && self.name.is_none()
            && self.phone.is_none()
            && self.shipping_address.is_none()
    }

    /// Fill any field that is still null with the other contact's value.
    /// Calling this over sources in descending priority order implements the
    /// first-non-null-wins waterfall.
    pub fn fill_missing_from(&mut self, other: &Contact) {
        if self.email.is_none() {
            self.email = other.email.clone();
        }
        if self.name.is_none() {
            self.name = other.name.clone();
        }
        if self.phone.is_none() {
            self.phone = other.phone.clone();
        }
        if self.shipping_address.is_none() {
            self.shipping_address = other.shipping_address.clone();
        }
    }
}

/// One purchased unit as reported by an origin feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawLineRecord {
    /// Line identifier inside the origin system; dedupes repeated ingest.
    pub source_line_id: String,
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub refund_state: RefundState,
    pub restocked: bool,
}

/// One order as reported by an origin feed, before identity resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawOrderRecord {
    pub source: SourceRef,
    /// Human-facing order number, e.g. "#1234". Matching and display only.
    pub display_number: String,
    pub financial_state: FinancialState,
    pub fulfillment_state: FulfillmentState,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub purchase_time: DateTime<Utc>,
    pub contact: Contact,
    pub line_items: Vec<RawLineRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn waterfall_fills_only_missing_fields() {
        let mut primary = Contact {
            email: None,
            name: Some("Ada".into()),
            phone: None,
            shipping_address: None,
        };
        let secondary = Contact {
            email: Some("a@b.com".into()),
            name: Some("wrong".into()),
            phone: Some("555".into()),
            shipping_address: None,
        };

        primary.fill_missing_from(&secondary);

        assert_eq!(primary.email.as_deref(), Some("a@b.com"));
        assert_eq!(primary.name.as_deref(), Some("Ada"));
        assert_eq!(primary.phone.as_deref(), Some("555"));
        assert!(primary.shipping_address.is_none());
    }
}
