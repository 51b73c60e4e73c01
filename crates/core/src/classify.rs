use crate::state::{FinancialState, FulfillmentState, ItemStatus, RefundState};

/// Decide whether a line item counts toward edition numbering.
///
/// Idempotent and side-effect free; the engine persists the result. Every
/// condition must hold for `Active`, any violation forces `Inactive`.
pub fn classify(
    financial: FinancialState,
    fulfillment: FulfillmentState,
    cancelled: bool,
    refund: RefundState,
    restocked: bool,
) -> ItemStatus {
    let order_ok = !matches!(
        fulfillment,
        FulfillmentState::Restocked | FulfillmentState::Canceled
    ) && !matches!(financial, FinancialState::Refunded | FinancialState::Voided)
        && !cancelled;

    let item_ok = refund == RefundState::None && !restocked;

    if order_ok && item_ok {
        ItemStatus::Active
    } else {
        ItemStatus::Inactive
    }
}
