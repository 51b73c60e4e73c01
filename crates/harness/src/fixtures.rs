use std::sync::Once;

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;

use atelier_core::{
    Contact, FinancialState, FulfillmentState, ProductId, RawLineRecord, RawOrderRecord,
    RefundState, SourceKind, SourceRef,
};
use atelier_engine::{Engine, EngineError};
use atelier_storage::Product;

static TRACING: Once = Once::new();

/// Install a tracing subscriber once per test binary. Controlled by
/// RUST_LOG; silent by default.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Noon UTC on the n-th of March 2024; tests spread purchases across days.
pub fn day(n: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, n, 12, 0, 0)
        .single()
        .expect("valid fixture date")
}

/// Engine over an in-memory store, with catalog helpers.
pub struct TestEngine {
    pub engine: Engine,
}

impl TestEngine {
    pub fn new() -> Result<Self, EngineError> {
        init_tracing();
        Ok(Self {
            engine: Engine::open_in_memory()?,
        })
    }

    pub fn add_product(
        &mut self,
        title: &str,
        edition_total: Option<u32>,
    ) -> Result<ProductId, EngineError> {
        let product = Product {
            id: ProductId::new(),
            title: title.to_string(),
            edition_total,
        };
        self.engine.upsert_product(&product)?;
        Ok(product.id)
    }
}

/// Builder for raw feed records; defaults to a paid, unfulfilled order
/// purchased on day 1 with no contact and no lines.
pub struct RecordBuilder {
    record: RawOrderRecord,
}

impl RecordBuilder {
    fn with_source(kind: SourceKind, source_id: &str, display_number: &str) -> Self {
        Self {
            record: RawOrderRecord {
                source: SourceRef::new(kind, source_id),
                display_number: display_number.to_string(),
                financial_state: FinancialState::Paid,
                fulfillment_state: FulfillmentState::Unfulfilled,
                cancelled_at: None,
                purchase_time: day(1),
                contact: Contact::default(),
                line_items: Vec::new(),
            },
        }
    }

    pub fn commerce(source_id: &str, display_number: &str) -> Self {
        Self::with_source(SourceKind::Commerce, source_id, display_number)
    }

    pub fn warehouse(source_id: &str, display_number: &str) -> Self {
        Self::with_source(SourceKind::Warehouse, source_id, display_number)
    }

    pub fn manual(source_id: &str, display_number: &str) -> Self {
        Self::with_source(SourceKind::Manual, source_id, display_number)
    }

    pub fn financial(mut self, state: FinancialState) -> Self {
        self.record.financial_state = state;
        self
    }

    pub fn fulfillment(mut self, state: FulfillmentState) -> Self {
        self.record.fulfillment_state = state;
        self
    }

    pub fn cancelled(mut self, at: DateTime<Utc>) -> Self {
        self.record.cancelled_at = Some(at);
        self
    }

    pub fn purchased(mut self, at: DateTime<Utc>) -> Self {
        self.record.purchase_time = at;
        self
    }

    pub fn email(mut self, email: &str) -> Self {
        self.record.contact.email = Some(email.to_string());
        self
    }

    pub fn name(mut self, name: &str) -> Self {
        self.record.contact.name = Some(name.to_string());
        self
    }

    pub fn phone(mut self, phone: &str) -> Self {
        self.record.contact.phone = Some(phone.to_string());
        self
    }

    pub fn line(self, source_line_id: &str, product_id: ProductId) -> Self {
        self.line_with(source_line_id, product_id, RefundState::None, false)
    }

    pub fn line_qty(
        mut self,
        source_line_id: &str,
        product_id: ProductId,
        quantity: u32,
    ) -> Self {
        self.record.line_items.push(RawLineRecord {
            source_line_id: source_line_id.to_string(),
            product_id,
            quantity,
            unit_price: Decimal::new(15000, 2),
            refund_state: RefundState::None,
            restocked: false,
        });
        self
    }

    pub fn line_with(
        mut self,
        source_line_id: &str,
        product_id: ProductId,
        refund_state: RefundState,
        restocked: bool,
    ) -> Self {
        self.record.line_items.push(RawLineRecord {
            source_line_id: source_line_id.to_string(),
            product_id,
            quantity: 1,
            unit_price: Decimal::new(15000, 2),
            refund_state,
            restocked,
        });
        self
    }

    pub fn build(self) -> RawOrderRecord {
        self.record
    }
}
