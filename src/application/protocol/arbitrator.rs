//! # Arbitrator Protocol
//!
//! Third key holder. Observes every trade naming it and, once arbitration is
//! requested, releases the escrow to one side.

use crate::application::error::ApplicationResult;
use crate::application::protocol::ProtocolContext;
use crate::application::protocol::shared::adopt;
use crate::domain::entities::{FactKind, PayoutCompleted, Trade};
use crate::domain::value_objects::{PayoutReason, TradeStatus};
use tracing::info;

/// Arbitrator handlers and actions.
#[derive(Debug, Clone)]
pub struct ArbitratorProtocol {
    context: ProtocolContext,
}

impl ArbitratorProtocol {
    /// Creates an arbitrator protocol.
    #[must_use]
    pub fn new(context: ProtocolContext) -> Self {
        Self { context }
    }

    /// Returns the shared collaborators.
    #[inline]
    #[must_use]
    pub fn context(&self) -> &ProtocolContext {
        &self.context
    }

    pub(crate) fn handle_created(
        &self,
        local: &Trade,
        remote: &Trade,
    ) -> ApplicationResult<Option<Trade>> {
        adopt(local, remote, &FactKind::ALL)
    }

    pub(crate) fn handle_funded(
        &self,
        local: &Trade,
        remote: &Trade,
    ) -> ApplicationResult<Option<Trade>> {
        adopt(local, remote, &FactKind::ALL)
    }

    /// Rules for the seller and returns the BTC.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` unless ARBITRATING.
    pub async fn refund_seller(&self, trade: &Trade) -> ApplicationResult<Trade> {
        self.resolve(trade, PayoutReason::ArbitratorSellerRefund).await
    }

    /// Rules for the buyer and releases the BTC.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` unless ARBITRATING.
    pub async fn payout_buyer(&self, trade: &Trade) -> ApplicationResult<Trade> {
        self.resolve(trade, PayoutReason::ArbitratorBuyerPayout).await
    }

    async fn resolve(&self, trade: &Trade, reason: PayoutReason) -> ApplicationResult<Trade> {
        trade.require_status(&[TradeStatus::Arbitrating], "resolve arbitration")?;
        let wallet = self.context.wallet();
        let payout_tx_hash = if reason.is_refund() {
            wallet.refund_escrow_to_seller(trade).await?
        } else {
            wallet.payout_escrow_to_buyer(trade).await?
        };
        let mut updated = trade.clone();
        updated.attach_payout_completed(PayoutCompleted {
            payout_tx_hash,
            reason,
        })?;
        info!(trade_id = %trade.id(), %reason, "arbitration resolved");
        Ok(updated)
    }
}
