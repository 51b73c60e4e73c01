use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Origin system that submitted a raw order record.
///
/// Priority decides which record is authoritative when several origins
/// describe the same real-world purchase: commerce > warehouse > manual.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Commerce,
    Warehouse,
    Manual,
}

impl SourceKind {
    pub fn priority(&self) -> u8 {
        match self {
            Self::Commerce => 2,
            Self::Warehouse => 1,
            Self::Manual => 0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Commerce => "commerce",
            Self::Warehouse => "warehouse",
            Self::Manual => "manual",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "commerce" => Ok(Self::Commerce),
            "warehouse" => Ok(Self::Warehouse),
            "manual" => Ok(Self::Manual),
            _ => Err(CoreError::InvalidState(format!("unknown source kind: {s}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinancialState {
    Pending,
    Paid,
    PartiallyPaid,
    Refunded,
    Voided,
    Authorized,
}

impl FinancialState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::PartiallyPaid => "partially_paid",
            Self::Refunded => "refunded",
            Self::Voided => "voided",
            Self::Authorized => "authorized",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "partially_paid" => Ok(Self::PartiallyPaid),
            "refunded" => Ok(Self::Refunded),
            "voided" => Ok(Self::Voided),
            "authorized" => Ok(Self::Authorized),
            _ => Err(CoreError::InvalidState(format!(
                "unknown financial state: {s}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FulfillmentState {
    Unfulfilled,
    Fulfilled,
    Restocked,
    Canceled,
}

impl FulfillmentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unfulfilled => "unfulfilled",
            Self::Fulfilled => "fulfilled",
            Self::Restocked => "restocked",
            Self::Canceled => "canceled",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "unfulfilled" => Ok(Self::Unfulfilled),
            "fulfilled" => Ok(Self::Fulfilled),
            "restocked" => Ok(Self::Restocked),
            "canceled" => Ok(Self::Canceled),
            _ => Err(CoreError::InvalidState(format!(
                "unknown fulfillment state: {s}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundState {
    None,
    Partial,
    Full,
}

impl RefundState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Partial => "partial",
            Self::Full => "full",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "none" => Ok(Self::None),
            "partial" => Ok(Self::Partial),
            "full" => Ok(Self::Full),
            _ => Err(CoreError::InvalidState(format!("unknown refund state: {s}"))),
        }
    }
}

/// Derived eligibility of a line item. Only the classifier writes this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Active,
    Inactive,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            _ => Err(CoreError::InvalidState(format!("unknown item status: {s}"))),
        }
    }
}
