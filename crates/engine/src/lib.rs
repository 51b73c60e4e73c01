pub mod auditor;
pub mod error;
pub mod lock;
pub mod resolver;
pub mod sequencer;

pub use auditor::Violation;
pub use error::EngineError;
pub use lock::KeyedLock;
pub use resolver::{AmbiguousMatch, MergeOutcome};
pub use sequencer::{AssignmentResult, CapRejection};

use std::collections::HashMap;

use tracing::warn;

use atelier_core::{ItemStatus, OrderId, ProductId, RawOrderRecord, classify};
use atelier_storage::{LineItem, Product, SqliteStore, Store, StoreError};

/// Result of one full sync cycle: merge, reclassify, resequence.
#[derive(Debug)]
pub struct ReconcileReport {
    pub outcome: MergeOutcome,
    /// Reactivations refused because they would exceed an edition total.
    pub rejections: Vec<CapRejection>,
}

/// Result of re-deriving validity for one order.
#[derive(Debug)]
pub struct ClassifyReport {
    /// The order's items in their final state.
    pub items: Vec<LineItem>,
    /// Reactivations refused because they would exceed an edition total.
    pub rejections: Vec<CapRejection>,
}

/// Reconciliation engine over one store: merges raw feed records into
/// canonical orders, derives line-item validity, and keeps edition numbers
/// dense per product.
pub struct Engine {
    store: SqliteStore,
    locks: KeyedLock,
}

impl Engine {
    pub fn new(store: SqliteStore) -> Self {
        Self {
            store,
            locks: KeyedLock::new(),
        }
    }

    pub fn open(path: &str) -> Result<Self, StoreError> {
        Ok(Self::new(SqliteStore::open(path)?))
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Ok(Self::new(SqliteStore::open_in_memory()?))
    }

    pub fn store(&self) -> &SqliteStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut SqliteStore {
        &mut self.store
    }

    /// Register or update a product. Feeds reference products by id, so the
    /// catalog must be loaded before ingest.
    pub fn upsert_product(&mut self, product: &Product) -> Result<(), EngineError> {
        self.store.upsert_product(product)?;
        Ok(())
    }

    /// Merge raw records from any origin into canonical orders. Idempotent:
    /// replaying a feed converges to the same canonical set.
    pub fn resolve_and_merge(
        &mut self,
        records: &[RawOrderRecord],
    ) -> Result<MergeOutcome, EngineError> {
        resolver::resolve_and_merge(&mut self.store, &self.locks, records)
    }

    /// Re-derive validity for every item of one order, resequencing any
    /// product whose active set changed. Refused reactivations are reported
    /// alongside the final items, not just logged.
    pub fn classify_all(&mut self, order_id: OrderId) -> Result<ClassifyReport, EngineError> {
        let (rejections, touched) = self.classify_order(order_id)?;
        for product_id in touched {
            sequencer::assign(&mut self.store, &self.locks, product_id)?;
        }
        let items = self.store.get_items_for_order(order_id)?;
        Ok(ClassifyReport { items, rejections })
    }

    /// Recompute edition numbers for one product.
    pub fn assign(&mut self, product_id: ProductId) -> Result<AssignmentResult, EngineError> {
        sequencer::assign(&mut self.store, &self.locks, product_id)
    }

    /// Read-only invariant sweep across the whole dataset.
    pub fn audit(&self) -> Result<Vec<Violation>, EngineError> {
        auditor::audit(&self.store)
    }

    /// One full sync cycle: merge the records, reclassify every touched
    /// order, then resequence each touched product once. Sequencing runs
    /// only after the whole batch is classified so the first numbering pass
    /// sees the complete active set in chronological order, whatever order
    /// the feed arrived in.
    pub fn reconcile(
        &mut self,
        records: &[RawOrderRecord],
    ) -> Result<ReconcileReport, EngineError> {
        let outcome = resolver::resolve_and_merge(&mut self.store, &self.locks, records)?;
        let mut rejections = Vec::new();
        let mut touched_products: Vec<ProductId> = Vec::new();
        for order in &outcome.orders {
            let (mut rejected, touched) = self.classify_order(order.id)?;
            rejections.append(&mut rejected);
            for product_id in touched {
                if !touched_products.contains(&product_id) {
                    touched_products.push(product_id);
                }
            }
        }
        for product_id in touched_products {
            sequencer::assign(&mut self.store, &self.locks, product_id)?;
        }
        Ok(ReconcileReport {
            outcome,
            rejections,
        })
    }

    /// Flip stale item statuses for one order. Returns the refused
    /// reactivations and the products whose active set changed; the caller
    /// decides when to resequence them.
    fn classify_order(
        &mut self,
        order_id: OrderId,
    ) -> Result<(Vec<CapRejection>, Vec<ProductId>), EngineError> {
        let order = self
            .store
            .get_order(order_id)?
            .ok_or_else(|| EngineError::OrderNotFound(order_id.to_string()))?;
        let items = self.store.get_items_for_order(order_id)?;
        let cancelled = order.cancelled_at.is_some();

        let mut touched_products: Vec<ProductId> = Vec::new();
        // Active count per product as it will be after the flips applied so
        // far, loaded lazily. Keeps a multi-item pass from overshooting the
        // cap when several reactivations land on one product.
        let mut planned: HashMap<ProductId, u32> = HashMap::new();
        let mut rejections = Vec::new();

        for item in &items {
            let expected = classify(
                order.financial_state,
                order.fulfillment_state,
                cancelled,
                item.refund_state,
                item.restocked,
            );
            if expected == item.status {
                continue;
            }

            let count = match planned.get(&item.product_id) {
                Some(count) => *count,
                None => self.store.active_items_in_sequence(item.product_id)?.len() as u32,
            };

            if expected == ItemStatus::Active {
                let product = self
                    .store
                    .get_product(item.product_id)?
                    .ok_or_else(|| EngineError::ProductNotFound(item.product_id.to_string()))?;
                if let Some(cap) = product.edition_total
                    && count + 1 > cap
                {
                    warn!(
                        item = %item.id,
                        product = %item.product_id,
                        cap,
                        "reactivation would exceed edition total, item stays inactive"
                    );
                    rejections.push(CapRejection {
                        item_id: item.id,
                        product_id: item.product_id,
                        reason: format!("edition total {cap} reached"),
                    });
                    continue;
                }
                planned.insert(item.product_id, count + 1);
            } else {
                planned.insert(item.product_id, count.saturating_sub(1));
            }

            self.store.set_item_status(item.id, expected)?;
            if !touched_products.contains(&item.product_id) {
                touched_products.push(item.product_id);
            }
        }

        Ok((rejections, touched_products))
    }
}
