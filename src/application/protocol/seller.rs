//! # Seller Protocol
//!
//! The side funding the escrow and receiving fiat.
//!
//! The seller funds as soon as the trade is accepted and neither copy
//! carries a payment request yet. A failed funding attempt leaves the trade
//! untouched so the next pass, or an explicit [`SellerProtocol::fund_escrow`],
//! can try again.

use crate::application::error::{ApplicationError, ApplicationResult};
use crate::application::protocol::ProtocolContext;
use crate::application::protocol::shared::adopt;
use crate::domain::entities::{
    CancelCompleted, FactKind, Offer, PaymentRequest, PayoutCompleted, Trade,
};
use crate::domain::errors::DomainError;
use crate::domain::value_objects::{BtcAmount, CancelReason, OfferType, PayoutReason, TradeStatus};
use tracing::{info, warn};

/// Seller-side handlers and actions.
#[derive(Debug, Clone)]
pub struct SellerProtocol {
    context: ProtocolContext,
}

impl SellerProtocol {
    /// Creates a seller protocol.
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

    /// Takes a BUY offer for `btc_amount`.
    ///
    /// # Errors
    ///
    /// `Validation` for a SELL offer or a zero amount, `MissingOfferData`
    /// if the offer lacks a key.
    pub async fn create_trade(&self, offer: &Offer, btc_amount: BtcAmount) -> ApplicationResult<Trade> {
        self.context
            .take_offer(offer, OfferType::Buy, btc_amount, false)
            .await
    }

    pub(crate) async fn handle_created(
        &self,
        local: &Trade,
        remote: &Trade,
    ) -> ApplicationResult<Option<Trade>> {
        let mut trade = local.clone();
        let mut changed = trade.adopt_from(
            remote,
            &[
                FactKind::Acceptance,
                FactKind::PaymentRequest,
                FactKind::CancelCompleted,
            ],
        )?;
        if trade.offer().offer_type() == OfferType::Sell
            && trade.trade_acceptance().is_none()
            && trade.cancel_completed().is_none()
        {
            changed |= self.context.accept_as_maker(&mut trade).await?;
        }

        let ready_to_fund = trade.trade_acceptance().is_some()
            && trade.cancel_completed().is_none()
            && trade.payment_request().is_none()
            && remote.payment_request().is_none();
        if ready_to_fund {
            self.fund(&mut trade).await.inspect_err(|err| {
                warn!(trade_id = %local.id(), error_code = err.code(), error = %err, "escrow funding failed");
            })?;
            changed = true;
        }
        Ok(changed.then_some(trade))
    }

    /// Adopts the buyer's payout request and any later records.
    pub(crate) fn handle_funded(
        &self,
        local: &Trade,
        remote: &Trade,
    ) -> ApplicationResult<Option<Trade>> {
        adopt(
            local,
            remote,
            &[
                FactKind::PayoutRequest,
                FactKind::ArbitrateRequest,
                FactKind::PayoutCompleted,
                FactKind::CancelCompleted,
            ],
        )
    }

    /// Funds the escrow of an accepted trade.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` outside CREATED and ACCEPTED or once a payment
    /// request exists, `InsufficientFunds` from the wallet, `Validation`
    /// without payment details for the offer.
    pub async fn fund_escrow(&self, trade: &Trade) -> ApplicationResult<Trade> {
        let status = trade.require_status(
            &[TradeStatus::Created, TradeStatus::Accepted],
            "fund escrow",
        )?;
        if trade.trade_acceptance().is_none()
            || trade.payment_request().is_some()
            || trade.cancel_completed().is_some()
        {
            return Err(DomainError::invalid_transition(status, "fund escrow").into());
        }
        let mut updated = trade.clone();
        self.fund(&mut updated).await?;
        Ok(updated)
    }

    async fn fund(&self, trade: &mut Trade) -> ApplicationResult<()> {
        let offer = trade.offer();
        let payment_details = self
            .context
            .profile()
            .payment_details(offer.currency_code(), offer.payment_method())
            .ok_or_else(|| ApplicationError::validation("missing payment details"))?;

        self.context.ensure_escrow(trade).await?;
        let escrow_address = trade
            .escrow_address()
            .ok_or_else(|| {
                ApplicationError::InvalidTradeState(format!("trade {} has no escrow address", trade.id()))
            })?
            .to_string();

        let wallet = self.context.wallet();
        let funding = wallet.fund_escrow(&escrow_address, trade.btc_amount()).await?;
        let refund_address = wallet.deposit_address().await?;
        let refund_tx_signature = wallet
            .refund_signature(trade, funding.tx_hash(), &refund_address)
            .await?;

        trade.attach_payment_request(PaymentRequest {
            funding_tx_hash: funding.tx_hash().to_string(),
            payment_details,
            refund_address,
            refund_tx_signature,
            tx_fee_per_kb: wallet.default_tx_fee(),
        })?;
        info!(
            trade_id = %trade.id(),
            funding_tx = funding.tx_hash(),
            btc_amount = %trade.btc_amount(),
            "escrow funded"
        );
        trade.set_funding_transaction(Some(funding));
        Ok(())
    }

    /// Confirms fiat arrived and releases the escrow to the buyer.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` unless PAID.
    pub async fn confirm_payment_received(&self, trade: &Trade) -> ApplicationResult<Trade> {
        trade.require_status(&[TradeStatus::Paid], "confirm payment received")?;
        let payout_tx_hash = self.context.wallet().payout_escrow_to_buyer(trade).await?;
        let mut updated = trade.clone();
        updated.attach_payout_completed(PayoutCompleted {
            payout_tx_hash,
            reason: PayoutReason::SellerBuyerPayout,
        })?;
        info!(trade_id = %trade.id(), "payment confirmed, escrow paid out");
        Ok(updated)
    }

    /// Cancels before funding.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` once a payment request exists.
    pub fn cancel_unfunded(&self, trade: &Trade) -> ApplicationResult<Trade> {
        let status = trade.require_status(
            &[TradeStatus::Created, TradeStatus::Accepted],
            "cancel unfunded trade",
        )?;
        if trade.payment_request().is_some() {
            return Err(DomainError::invalid_transition(status, "cancel unfunded trade").into());
        }
        let mut updated = trade.clone();
        updated.attach_cancel_completed(CancelCompleted {
            payout_tx_hash: None,
            reason: CancelReason::SellerCancelUnfunded,
        })?;
        info!(trade_id = %trade.id(), "unfunded trade canceled");
        Ok(updated)
    }
}
