use std::collections::BTreeSet;

use chrono::Duration;
use tracing::{debug, warn};

use atelier_core::{
    Contact, ItemStatus, LineItemId, OrderId, RawOrderRecord, SourceRef,
    normalize_display_number,
};
use atelier_storage::{LineItem, Order, OrderSource, SqliteStore, Store};

use crate::error::EngineError;
use crate::lock::KeyedLock;

/// Window for the contact-email + purchase-date fallback match.
pub const EMAIL_DATE_TOLERANCE_HOURS: i64 = 24;

/// A raw record that matched more than one plausible canonical order.
/// Left unmerged for manual review, never guessed.
#[derive(Debug, Clone)]
pub struct AmbiguousMatch {
    pub source: SourceRef,
    pub display_number: String,
    pub candidates: Vec<OrderId>,
}

#[derive(Debug)]
pub struct MergeOutcome {
    /// Canonical orders created or updated by this pass.
    pub orders: Vec<Order>,
    pub ambiguous: Vec<AmbiguousMatch>,
}

pub(crate) fn resolve_and_merge(
    store: &mut SqliteStore,
    locks: &KeyedLock,
    records: &[RawOrderRecord],
) -> Result<MergeOutcome, EngineError> {
    let mut touched: Vec<OrderId> = Vec::new();
    let mut ambiguous: Vec<AmbiguousMatch> = Vec::new();

    for record in records {
        let match_key = normalize_display_number(&record.display_number);
        let lock_key = match &match_key {
            Some(key) => format!("match:{key}"),
            None => format!(
                "source:{}:{}",
                record.source.kind.as_str(),
                record.source.id
            ),
        };
        let _guard = locks.acquire(lock_key);

        let home = store.find_order_by_source(&record.source)?;
        let mut candidates: BTreeSet<OrderId> = BTreeSet::new();
        if let Some(id) = home {
            candidates.insert(id);
        }
        if let Some(key) = &match_key {
            for id in store.find_orders_by_match_key(key)? {
                candidates.insert(id);
            }
        }
        if candidates.is_empty()
            && let Some(email) = &record.contact.email
        {
            let window = Duration::hours(EMAIL_DATE_TOLERANCE_HOURS);
            for id in store.find_orders_by_email_window(
                email,
                record.purchase_time - window,
                record.purchase_time + window,
            )? {
                let order = store
                    .get_order(id)?
                    .ok_or_else(|| EngineError::OrderNotFound(id.to_string()))?;
                // The fallback never forces a match across differing
                // normalized keys; same customer, different purchase.
                match (&order.match_key, &match_key) {
                    (Some(a), Some(b)) if a != b => {}
                    _ => {
                        candidates.insert(id);
                    }
                }
            }
        }

        let target = if candidates.is_empty() {
            let id = create_order(store, record, match_key.clone())?;
            debug!(order = %id, source = record.source.kind.as_str(), "created canonical order");
            id
        } else if candidates.len() == 1 {
            let id = *candidates.iter().next().ok_or_else(|| {
                EngineError::OrderNotFound("candidate set empty".to_string())
            })?;
            merge_into(store, id, record, &match_key)?;
            id
        } else if candidates.len() == 2
            && let Some(home_id) = home
            && candidates.contains(&home_id)
        {
            // The record's own prior order plus a distinct match-key
            // counterpart: one real purchase split across two rows. Absorb
            // the lower-priority row, then merge the record into the winner.
            let other = *candidates
                .iter()
                .find(|id| **id != home_id)
                .ok_or_else(|| EngineError::OrderNotFound("candidate set empty".to_string()))?;
            let winner = absorb_duplicate(store, home_id, other)?;
            merge_into(store, winner, record, &match_key)?;
            winner
        } else {
            let candidates: Vec<OrderId> = candidates.into_iter().collect();
            warn!(
                source = record.source.kind.as_str(),
                source_id = %record.source.id,
                display_number = %record.display_number,
                ?candidates,
                "ambiguous match, leaving unmerged"
            );
            ambiguous.push(AmbiguousMatch {
                source: record.source.clone(),
                display_number: record.display_number.clone(),
                candidates,
            });
            continue;
        };

        if !touched.contains(&target) {
            touched.push(target);
        }
    }

    let mut orders = Vec::new();
    for id in touched {
        // Absorbed duplicates may have vanished since they were touched.
        if let Some(order) = store.get_order(id)? {
            orders.push(order);
        }
    }
    Ok(MergeOutcome { orders, ambiguous })
}

/// Pick the surviving row of a duplicate pair and absorb the other.
/// Higher-priority canonical source wins; ties go to the older row.
fn absorb_duplicate(
    store: &mut SqliteStore,
    a: OrderId,
    b: OrderId,
) -> Result<OrderId, EngineError> {
    let order_a = store
        .get_order(a)?
        .ok_or_else(|| EngineError::OrderNotFound(a.to_string()))?;
    let order_b = store
        .get_order(b)?
        .ok_or_else(|| EngineError::OrderNotFound(b.to_string()))?;

    let a_priority = order_a.canonical_ref.kind.priority();
    let b_priority = order_b.canonical_ref.kind.priority();
    let (winner, loser) = if a_priority > b_priority {
        (a, b)
    } else if b_priority > a_priority {
        (b, a)
    } else if a <= b {
        (a, b)
    } else {
        (b, a)
    };

    debug!(winner = %winner, loser = %loser, "absorbing duplicate order");
    store.absorb_order(winner, loser)?;
    refresh_contact(store, winner)?;
    Ok(winner)
}

fn create_order(
    store: &mut SqliteStore,
    record: &RawOrderRecord,
    match_key: Option<String>,
) -> Result<OrderId, EngineError> {
    let order = Order {
        id: OrderId::new(),
        canonical_ref: record.source.clone(),
        display_number: record.display_number.clone(),
        match_key,
        financial_state: record.financial_state,
        fulfillment_state: record.fulfillment_state,
        cancelled_at: record.cancelled_at,
        purchase_time: record.purchase_time,
        contact: record.contact.clone(),
    };
    store.insert_order(&order)?;
    store.upsert_order_source(&OrderSource {
        order_id: order.id,
        source: record.source.clone(),
        contact: record.contact.clone(),
    })?;
    upsert_lines(store, order.id, record)?;
    Ok(order.id)
}

fn merge_into(
    store: &mut SqliteStore,
    order_id: OrderId,
    record: &RawOrderRecord,
    match_key: &Option<String>,
) -> Result<(), EngineError> {
    let mut order = store
        .get_order(order_id)?
        .ok_or_else(|| EngineError::OrderNotFound(order_id.to_string()))?;

    store.upsert_order_source(&OrderSource {
        order_id,
        source: record.source.clone(),
        contact: record.contact.clone(),
    })?;

    // The highest-priority origin is authoritative for status fields and the
    // canonical ref; a re-sync from the current authority refreshes them.
    let incoming = record.source.kind.priority();
    let current = order.canonical_ref.kind.priority();
    if incoming > current || record.source == order.canonical_ref {
        if incoming > current {
            debug!(
                order = %order.id,
                from = order.canonical_ref.kind.as_str(),
                to = record.source.kind.as_str(),
                "promoting authoritative source"
            );
        }
        order.canonical_ref = record.source.clone();
        order.display_number = record.display_number.clone();
        order.match_key = match_key.clone();
        order.financial_state = record.financial_state;
        order.fulfillment_state = record.fulfillment_state;
        order.cancelled_at = record.cancelled_at;
        order.purchase_time = record.purchase_time;
        store.update_order_header(&order)?;
    }

    refresh_contact(store, order_id)?;
    upsert_lines(store, order_id, record)?;
    Ok(())
}

/// Recompute the order's contact from all source snapshots: first non-null
/// wins, walking origins in descending priority (commerce, warehouse,
/// manual).
fn refresh_contact(store: &mut SqliteStore, order_id: OrderId) -> Result<(), EngineError> {
    let mut sources = store.get_sources(order_id)?;
    sources.sort_by(|a, b| b.source.kind.priority().cmp(&a.source.kind.priority()));

    let mut contact = Contact::default();
    for source in &sources {
        contact.fill_missing_from(&source.contact);
    }
    store.update_order_contact(order_id, &contact)?;
    Ok(())
}

fn upsert_lines(
    store: &mut SqliteStore,
    order_id: OrderId,
    record: &RawOrderRecord,
) -> Result<(), EngineError> {
    for line in &record.line_items {
        match store.find_item_by_source_line(record.source.kind.as_str(), &line.source_line_id)? {
            Some(item_id) => {
                store.update_item_flags(item_id, line.refund_state, line.restocked)?;
            }
            None => {
                store.insert_line_item(&LineItem {
                    id: LineItemId::new(),
                    order_id,
                    product_id: line.product_id,
                    source: SourceRef::new(record.source.kind, line.source_line_id.clone()),
                    quantity: line.quantity,
                    unit_price: line.unit_price,
                    refund_state: line.refund_state,
                    restocked: line.restocked,
                    status: ItemStatus::Inactive,
                    edition_number: None,
                    created_at: record.purchase_time,
                })?;
            }
        }
    }
    Ok(())
}
