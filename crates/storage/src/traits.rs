use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use atelier_core::{
    Contact, FinancialState, FulfillmentState, ItemStatus, LineItemId, OrderId, ProductId,
    RefundState, SourceRef,
};

use crate::error::StoreError;

/// Canonical merged representation of one real-world purchase.
#[derive(Debug, Clone)]
pub struct Order {
    pub id: OrderId,
    /// `(kind, id)` of the authoritative origin record, or a synthetic ref
    /// while no commerce-platform record exists.
    pub canonical_ref: SourceRef,
    pub display_number: String,
    pub match_key: Option<String>,
    pub financial_state: FinancialState,
    pub fulfillment_state: FulfillmentState,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub purchase_time: DateTime<Utc>,
    pub contact: Contact,
}

/// One raw record merged into an order, with the contact fields that origin
/// supplied at ingest time.
#[derive(Debug, Clone)]
pub struct OrderSource {
    pub order_id: OrderId,
    pub source: SourceRef,
    pub contact: Contact,
}

#[derive(Debug, Clone)]
pub struct LineItem {
    pub id: LineItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub source: SourceRef,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub refund_state: RefundState,
    pub restocked: bool,
    pub status: ItemStatus,
    pub edition_number: Option<u32>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Product {
    pub id: ProductId,
    pub title: String,
    pub edition_total: Option<u32>,
}

pub trait Store {
    // -- products --

    fn upsert_product(&mut self, product: &Product) -> Result<(), StoreError>;

    fn get_product(&self, product_id: ProductId) -> Result<Option<Product>, StoreError>;

    fn all_products(&self) -> Result<Vec<Product>, StoreError>;

    // -- orders --

    fn insert_order(&mut self, order: &Order) -> Result<(), StoreError>;

    /// Rewrite status fields, canonical ref, display number, match key and
    /// purchase time. Contact is written separately by the waterfall.
    fn update_order_header(&mut self, order: &Order) -> Result<(), StoreError>;

    fn update_order_contact(
        &mut self,
        order_id: OrderId,
        contact: &Contact,
    ) -> Result<(), StoreError>;

    fn get_order(&self, order_id: OrderId) -> Result<Option<Order>, StoreError>;

    fn all_orders(&self) -> Result<Vec<Order>, StoreError>;

    fn find_order_by_source(&self, source: &SourceRef) -> Result<Option<OrderId>, StoreError>;

    fn find_orders_by_match_key(&self, match_key: &str) -> Result<Vec<OrderId>, StoreError>;

    fn find_orders_by_email_window(
        &self,
        email: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<OrderId>, StoreError>;

    // -- origin sources --

    fn upsert_order_source(&mut self, source: &OrderSource) -> Result<(), StoreError>;

    fn get_sources(&self, order_id: OrderId) -> Result<Vec<OrderSource>, StoreError>;

    /// Re-parent all line items and source rows of `loser` onto `winner`,
    /// then delete the loser order row. One transaction.
    fn absorb_order(&mut self, winner: OrderId, loser: OrderId) -> Result<(), StoreError>;

    // -- line items --

    fn insert_line_item(&mut self, item: &LineItem) -> Result<(), StoreError>;

    fn find_item_by_source_line(
        &self,
        source_kind: &str,
        source_line_id: &str,
    ) -> Result<Option<LineItemId>, StoreError>;

    /// Refresh the origin-reported refund/restock flags on an existing item.
    fn update_item_flags(
        &mut self,
        item_id: LineItemId,
        refund_state: RefundState,
        restocked: bool,
    ) -> Result<(), StoreError>;

    fn set_item_status(&mut self, item_id: LineItemId, status: ItemStatus)
    -> Result<(), StoreError>;

    fn get_items_for_order(&self, order_id: OrderId) -> Result<Vec<LineItem>, StoreError>;

    fn get_items_for_product(&self, product_id: ProductId) -> Result<Vec<LineItem>, StoreError>;

    /// Active items of a product in numbering order:
    /// `(order.purchase_time, item.created_at, item.id)` ascending. This
    /// ordering is the tie-break behind issued certificates and must not
    /// change while items hold numbers.
    fn active_items_in_sequence(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<LineItem>, StoreError>;

    /// Apply a batch of edition-number changes in one transaction.
    /// `Some(n)` assigns, `None` clears. Rows not listed are untouched.
    fn write_edition_numbers(
        &mut self,
        product_id: ProductId,
        changes: &[(LineItemId, Option<u32>)],
    ) -> Result<(), StoreError>;
}
