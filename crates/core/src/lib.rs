pub mod classify;
pub mod error;
pub mod ids;
pub mod match_key;
pub mod record;
pub mod state;

pub use classify::classify;
pub use error::CoreError;
pub use ids::*;
pub use match_key::normalize_display_number;
pub use record::{Contact, RawLineRecord, RawOrderRecord, SourceRef};
pub use state::{FinancialState, FulfillmentState, ItemStatus, RefundState, SourceKind};
