use std::collections::{BTreeMap, BTreeSet};

use atelier_core::{ItemStatus, LineItemId, OrderId, ProductId, SourceKind, classify};
use atelier_storage::{SqliteStore, Store};

use crate::error::EngineError;

/// One invariant breach found by the audit sweep, with the offending rows.
///
/// The auditor only reads; a report taken mid-merge may show transient
/// violations, so a single failing sweep is advisory and worth re-running
/// before alerting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// More active items than the product's edition total allows.
    CapExceeded {
        product_id: ProductId,
        edition_total: u32,
        active_count: u32,
    },
    /// Two or more active items of one product share a number.
    DuplicateEdition {
        product_id: ProductId,
        edition_number: u32,
        item_ids: Vec<LineItemId>,
    },
    /// The active set's numbers are not exactly 1..=N.
    EditionGap {
        product_id: ProductId,
        missing: Vec<u32>,
    },
    /// Active item holding no number at all.
    MissingEdition { item_id: LineItemId },
    /// Inactive item still holding a number.
    InactiveWithNumber { item_id: LineItemId },
    /// Stored status disagrees with what the classifier would derive now.
    /// Auto-correctable by re-running classification; the auditor never
    /// writes.
    StaleClassification {
        item_id: LineItemId,
        stored: ItemStatus,
        expected: ItemStatus,
    },
    /// An order absorbed two records of the same origin kind; a merge went
    /// wrong somewhere.
    DuplicateSourceKind {
        order_id: OrderId,
        kind: SourceKind,
    },
    /// An origin supplied an email but the canonical order lost it.
    MissingContactEmail { order_id: OrderId },
}

/// Full read-only sweep. All violations are accumulated and returned; one
/// bad row never hides the rest of the report.
pub(crate) fn audit(store: &SqliteStore) -> Result<Vec<Violation>, EngineError> {
    let mut violations = Vec::new();
    // Products whose edition is fully allocated. Items held inactive on
    // these are deliberate cap refusals, not stale classifications.
    let mut saturated: BTreeSet<ProductId> = BTreeSet::new();

    for product in store.all_products()? {
        let items = store.get_items_for_product(product.id)?;
        let active: Vec<_> = items
            .iter()
            .filter(|i| i.status == ItemStatus::Active)
            .collect();

        if let Some(cap) = product.edition_total {
            if active.len() as u32 >= cap {
                saturated.insert(product.id);
            }
            if active.len() as u32 > cap {
                violations.push(Violation::CapExceeded {
                    product_id: product.id,
                    edition_total: cap,
                    active_count: active.len() as u32,
                });
            }
        }

        let mut by_number: BTreeMap<u32, Vec<LineItemId>> = BTreeMap::new();
        for item in &active {
            match item.edition_number {
                Some(number) => by_number.entry(number).or_default().push(item.id),
                None => violations.push(Violation::MissingEdition { item_id: item.id }),
            }
        }
        for (number, ids) in &by_number {
            if ids.len() > 1 {
                violations.push(Violation::DuplicateEdition {
                    product_id: product.id,
                    edition_number: *number,
                    item_ids: ids.clone(),
                });
            }
        }
        let expected_run = 1..=active.len() as u32;
        let missing: Vec<u32> = expected_run
            .filter(|n| !by_number.contains_key(n))
            .collect();
        if !missing.is_empty() {
            violations.push(Violation::EditionGap {
                product_id: product.id,
                missing,
            });
        }

        for item in &items {
            if item.status == ItemStatus::Inactive && item.edition_number.is_some() {
                violations.push(Violation::InactiveWithNumber { item_id: item.id });
            }
        }
    }

    for order in store.all_orders()? {
        let cancelled = order.cancelled_at.is_some();
        for item in store.get_items_for_order(order.id)? {
            let expected = classify(
                order.financial_state,
                order.fulfillment_state,
                cancelled,
                item.refund_state,
                item.restocked,
            );
            let cap_hold = expected == ItemStatus::Active
                && item.status == ItemStatus::Inactive
                && saturated.contains(&item.product_id);
            if expected != item.status && !cap_hold {
                violations.push(Violation::StaleClassification {
                    item_id: item.id,
                    stored: item.status,
                    expected,
                });
            }
        }

        let sources = store.get_sources(order.id)?;
        let mut kind_counts: BTreeMap<&'static str, (SourceKind, u32)> = BTreeMap::new();
        for source in &sources {
            kind_counts
                .entry(source.source.kind.as_str())
                .or_insert((source.source.kind, 0))
                .1 += 1;
        }
        for (kind, count) in kind_counts.into_values() {
            if count > 1 {
                violations.push(Violation::DuplicateSourceKind {
                    order_id: order.id,
                    kind,
                });
            }
        }

        if order.contact.email.is_none()
            && sources.iter().any(|s| s.contact.email.is_some())
        {
            violations.push(Violation::MissingContactEmail { order_id: order.id });
        }
    }

    Ok(violations)
}
