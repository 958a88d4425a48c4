//! Handlers every role runs the same way.

use crate::application::error::{ApplicationError, ApplicationResult};
use crate::domain::entities::{ArbitrateRequest, FactKind, Trade};
use crate::domain::errors::DomainError;
use crate::domain::value_objects::{ArbitrationReason, Role, TradeStatus};
use tracing::info;

/// Clones `local` and adopts `kinds` from `remote`; `None` if nothing was new.
pub(crate) fn adopt(
    local: &Trade,
    remote: &Trade,
    kinds: &[FactKind],
) -> ApplicationResult<Option<Trade>> {
    let mut trade = local.clone();
    if trade.adopt_from(remote, kinds)? {
        Ok(Some(trade))
    } else {
        Ok(None)
    }
}

pub(crate) fn handle_accepted(local: &Trade, remote: &Trade) -> ApplicationResult<Option<Trade>> {
    adopt(
        local,
        remote,
        &[FactKind::PaymentRequest, FactKind::CancelCompleted],
    )
}

/// Returns the trade once the funding transaction has a confirmation.
pub(crate) fn handle_funding(local: &Trade) -> Option<Trade> {
    local
        .funding_transaction()
        .is_some_and(|tx| tx.is_confirmed())
        .then(|| local.clone())
}

pub(crate) fn handle_paid(local: &Trade, remote: &Trade) -> ApplicationResult<Option<Trade>> {
    adopt(
        local,
        remote,
        &[FactKind::ArbitrateRequest, FactKind::PayoutCompleted],
    )
}

/// Returns the trade once the payout or refund transaction has a confirmation.
pub(crate) fn handle_completing(local: &Trade) -> Option<Trade> {
    local
        .payout_transaction()
        .is_some_and(|tx| tx.is_confirmed())
        .then(|| local.clone())
}

pub(crate) fn handle_arbitrating(local: &Trade, remote: &Trade) -> ApplicationResult<Option<Trade>> {
    adopt(local, remote, &[FactKind::PayoutCompleted])
}

pub(crate) const fn handle_canceled() -> Option<Trade> {
    None
}

pub(crate) fn request_arbitrate(role: Role, trade: &Trade) -> ApplicationResult<Trade> {
    let reason = ArbitrationReason::for_role(role).ok_or_else(|| {
        ApplicationError::invalid_role(format!("{role} cannot request arbitration"))
    })?;
    let status = current_status(trade)?;
    if !status.allows_arbitration() {
        return Err(DomainError::invalid_transition(status, "request arbitration").into());
    }
    let mut updated = trade.clone();
    updated.attach_arbitrate_request(ArbitrateRequest { reason })?;
    info!(trade_id = %trade.id(), %role, %reason, "arbitration requested");
    Ok(updated)
}

pub(crate) fn current_status(trade: &Trade) -> ApplicationResult<TradeStatus> {
    trade.status().ok_or_else(|| {
        ApplicationError::InvalidTradeState(format!("trade {} has no derived status", trade.id()))
    })
}
