use tracing::{debug, warn};

use atelier_core::{ItemStatus, LineItemId, ProductId};
use atelier_storage::{SqliteStore, Store};

use crate::error::EngineError;
use crate::lock::KeyedLock;

/// Outcome of one `assign` pass for a product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentResult {
    /// Rows actually rewritten (assignments plus clears). Zero on a stable
    /// active set.
    pub numbers_changed: usize,
    pub rejected: bool,
    pub reason: Option<String>,
}

impl AssignmentResult {
    fn unchanged() -> Self {
        Self {
            numbers_changed: 0,
            rejected: false,
            reason: None,
        }
    }
}

/// A reactivation refused because it would exceed the product's edition
/// total. The item stays inactive until an operator intervenes.
#[derive(Debug, Clone)]
pub struct CapRejection {
    pub item_id: LineItemId,
    pub product_id: ProductId,
    pub reason: String,
}

/// Recompute edition numbers for all active items of one product.
///
/// There is no stored counter: numbers are a deterministic function of the
/// current active set. Items already holding a number keep their relative
/// order and compact downward, so a certificate's neighbors stay its
/// neighbors; items without a number (new sales, reactivations) join at the
/// end of the run in `(order.purchase_time, item.created_at, item.id)`
/// order. Idempotent; unchanged rows are not rewritten.
pub(crate) fn assign(
    store: &mut SqliteStore,
    locks: &KeyedLock,
    product_id: ProductId,
) -> Result<AssignmentResult, EngineError> {
    let _guard = locks.acquire(format!("product:{product_id}"));

    let product = store
        .get_product(product_id)?
        .ok_or_else(|| EngineError::ProductNotFound(product_id.to_string()))?;
    let active = store.active_items_in_sequence(product_id)?;

    if let Some(cap) = product.edition_total
        && active.len() as u32 > cap
    {
        warn!(
            product = %product_id,
            active = active.len(),
            cap,
            "active set exceeds edition total, refusing to number"
        );
        return Ok(AssignmentResult {
            numbers_changed: 0,
            rejected: true,
            reason: Some(format!(
                "{} active items exceed edition total {cap}",
                active.len()
            )),
        });
    }

    let mut holders: Vec<_> = active
        .iter()
        .filter(|i| i.edition_number.is_some())
        .collect();
    holders.sort_by_key(|i| i.edition_number);
    let newcomers = active.iter().filter(|i| i.edition_number.is_none());

    let mut changes: Vec<(LineItemId, Option<u32>)> = Vec::new();
    for (idx, item) in holders.into_iter().chain(newcomers).enumerate() {
        let want = idx as u32 + 1;
        if item.edition_number != Some(want) {
            changes.push((item.id, Some(want)));
        }
    }
    // Numbers released by deactivation are cleared in the same batch so the
    // number-iff-active invariant holds after every pass.
    for item in store.get_items_for_product(product_id)? {
        if item.status == ItemStatus::Inactive && item.edition_number.is_some() {
            changes.push((item.id, None));
        }
    }

    if changes.is_empty() {
        return Ok(AssignmentResult::unchanged());
    }

    store.write_edition_numbers(product_id, &changes)?;
    debug!(product = %product_id, changed = changes.len(), "resequenced");
    Ok(AssignmentResult {
        numbers_changed: changes.len(),
        rejected: false,
        reason: None,
    })
}
