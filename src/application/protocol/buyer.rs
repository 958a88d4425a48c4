//! # Buyer Protocol
//!
//! The side paying fiat and receiving BTC.

use crate::application::error::{ApplicationError, ApplicationResult};
use crate::application::protocol::ProtocolContext;
use crate::application::protocol::shared::{adopt, current_status};
use crate::domain::entities::{CancelCompleted, FactKind, Offer, PayoutCompleted, PayoutRequest, Trade};
use crate::domain::errors::DomainError;
use crate::domain::value_objects::{BtcAmount, CancelReason, OfferType, PayoutReason, TradeStatus};
use tracing::info;

/// Buyer-side handlers and actions.
#[derive(Debug, Clone)]
pub struct BuyerProtocol {
    context: ProtocolContext,
}

impl BuyerProtocol {
    /// Creates a buyer protocol.
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

    /// Takes a SELL offer for `btc_amount`.
    ///
    /// The escrow address is derived from the offer's arbitrator, the
    /// seller's escrow key and the local escrow key, and watched.
    ///
    /// # Errors
    ///
    /// `Validation` for a BUY offer or a zero amount, `MissingOfferData`
    /// if the offer lacks a key.
    pub async fn create_trade(&self, offer: &Offer, btc_amount: BtcAmount) -> ApplicationResult<Trade> {
        self.context
            .take_offer(offer, OfferType::Sell, btc_amount, true)
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
        if trade.offer().offer_type() == OfferType::Buy
            && trade.trade_acceptance().is_none()
            && trade.cancel_completed().is_none()
        {
            changed |= self.context.accept_as_maker(&mut trade).await?;
        }
        Ok(changed.then_some(trade))
    }

    /// Makes FUNDED visible and adopts arbitration, payout or cancel records.
    pub(crate) fn handle_funded(
        &self,
        local: &Trade,
        remote: &Trade,
    ) -> ApplicationResult<Option<Trade>> {
        let adopted = adopt(
            local,
            remote,
            &[
                FactKind::ArbitrateRequest,
                FactKind::PayoutCompleted,
                FactKind::CancelCompleted,
            ],
        )?;
        Ok(Some(adopted.unwrap_or_else(|| local.clone())))
    }

    /// Declares the fiat payment sent and hands over the payout signature.
    ///
    /// # Errors
    ///
    /// `NotFunded` until the escrow funding has a confirmation,
    /// `InvalidTransition` once past FUNDED.
    pub async fn send_payment(
        &self,
        trade: &Trade,
        payment_reference: impl Into<String>,
    ) -> ApplicationResult<Trade> {
        let status = current_status(trade)?;
        match status {
            TradeStatus::Created | TradeStatus::Accepted | TradeStatus::Funding => {
                return Err(ApplicationError::not_funded(trade.id()));
            }
            TradeStatus::Funded => {}
            other => return Err(DomainError::invalid_transition(other, "send payment").into()),
        }
        let confirmed = trade
            .funding_transaction()
            .is_some_and(|tx| tx.is_confirmed());
        let funding_tx_hash = match trade.funding_tx_hash() {
            Some(hash) if confirmed => hash.to_string(),
            _ => return Err(ApplicationError::not_funded(trade.id())),
        };

        let wallet = self.context.wallet();
        let payout_tx_signature = wallet.payout_signature(trade, &funding_tx_hash).await?;
        let payout_address = match trade.buyer_payout_address() {
            Some(address) => address.to_string(),
            None => wallet.deposit_address().await?,
        };

        let mut updated = trade.clone();
        updated.attach_payout_request(PayoutRequest {
            payment_reference: payment_reference.into(),
            payout_tx_signature,
            payout_address,
        })?;
        info!(trade_id = %trade.id(), "payment sent");
        Ok(updated)
    }

    /// Gives up before paying and releases the escrow back to the seller.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` unless FUNDED with no payout request.
    pub async fn refund_trade(&self, trade: &Trade) -> ApplicationResult<Trade> {
        let status = trade.require_status(&[TradeStatus::Funded], "refund trade")?;
        if trade.payout_request().is_some() {
            return Err(DomainError::invalid_transition(status, "refund a paid trade").into());
        }
        let payout_tx_hash = self.context.wallet().refund_escrow_to_seller(trade).await?;
        let mut updated = trade.clone();
        updated.attach_payout_completed(PayoutCompleted {
            payout_tx_hash,
            reason: PayoutReason::BuyerSellerRefund,
        })?;
        info!(trade_id = %trade.id(), "escrow refunded to seller");
        Ok(updated)
    }

    /// Cancels before the seller has funded.
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
            reason: CancelReason::BuyerCancelUnfunded,
        })?;
        info!(trade_id = %trade.id(), "unfunded trade canceled");
        Ok(updated)
    }

    /// Cancels a funded trade, refunding the seller.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` outside FUNDING and FUNDED, `NotFunded` if the
    /// funding transaction is not yet visible.
    pub async fn cancel_funded(&self, trade: &Trade) -> ApplicationResult<Trade> {
        trade.require_status(
            &[TradeStatus::Funding, TradeStatus::Funded],
            "cancel funded trade",
        )?;
        if trade.funding_transaction().is_none() {
            return Err(ApplicationError::not_funded(trade.id()));
        }
        let refund_tx_hash = self.context.wallet().refund_escrow_to_seller(trade).await?;
        let mut updated = trade.clone();
        updated.attach_cancel_completed(CancelCompleted {
            payout_tx_hash: Some(refund_tx_hash),
            reason: CancelReason::BuyerCancelFunded,
        })?;
        info!(trade_id = %trade.id(), "funded trade canceled");
        Ok(updated)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::application::protocol::test_harness::*;
    use crate::application::protocol::{SellerProtocol, TradeProtocol};
    use crate::domain::entities::test_support::*;
    use crate::domain::value_objects::Role;

    fn buyer(p: &Principals) -> BuyerProtocol {
        BuyerProtocol::new(p.buyer.clone())
    }

    /// Buyer's local copy after the seller accepted and funded with one confirmation.
    async fn funded_for_buyer(p: &Principals) -> Trade {
        let created = created_by_buyer(p).await;
        let seller_local = synthesize(&p.seller, &created, SELLER_PROFILE).await;
        let seller_view = TradeProtocol::for_role(Role::Seller, p.seller.clone())
            .handle(&seller_local, &created)
            .await
            .unwrap()
            .unwrap();
        p.chain.mine_block().await;
        let mut local = settle(&p.buyer, created, BUYER_PROFILE).await;
        local.adopt_from(&seller_view, &FactKind::ALL).unwrap();
        settle(&p.buyer, local, BUYER_PROFILE).await
    }

    mod creation {
        use super::*;

        #[tokio::test]
        async fn creates_watched_trade_as_buyer() {
            let p = principals().await;
            let trade = created_by_buyer(&p).await;
            assert_eq!(trade.status(), Some(TradeStatus::Created));
            assert_eq!(trade.role(), Some(Role::Buyer));
            assert_eq!(trade.version(), 0);
            assert!(trade.escrow_address().is_some());
            assert_eq!(trade.payment_amount(), usd("15000"));
            assert!(trade.trade_request().taker_payout_address.is_some());
        }

        #[tokio::test]
        async fn rejects_buy_offer() {
            let p = principals().await;
            let err = buyer(&p).create_trade(&buy_offer(), btc("0.5")).await.unwrap_err();
            assert!(matches!(err, ApplicationError::Validation(_)));
        }

        #[tokio::test]
        async fn rejects_offer_without_arbitrator() {
            let p = principals().await;
            let offer = Offer::new(
                sell_offer().id(),
                OfferType::Sell,
                sell_offer().currency_code(),
                sell_offer().payment_method(),
                usd("30000"),
            )
            .with_maker(SELLER_PROFILE, SELLER_ESCROW);
            let err = buyer(&p).create_trade(&offer, btc("0.5")).await.unwrap_err();
            assert!(matches!(err, ApplicationError::MissingOfferData(_)));
        }

        #[tokio::test]
        async fn same_terms_same_id() {
            let p = principals().await;
            let a = created_by_buyer(&p).await;
            let b = created_by_buyer(&p).await;
            assert_eq!(a.id(), b.id());
        }
    }

    mod payment {
        use super::*;

        #[tokio::test]
        async fn send_payment_requires_confirmation() {
            let p = principals().await;
            let trade = settle(&p.buyer, created_by_buyer(&p).await, BUYER_PROFILE).await;
            let err = buyer(&p).send_payment(&trade, "ref").await.unwrap_err();
            assert!(matches!(err, ApplicationError::NotFunded(_)));
        }

        #[tokio::test]
        async fn send_payment_attaches_payout_request() {
            let p = principals().await;
            let trade = funded_for_buyer(&p).await;
            assert_eq!(trade.status(), Some(TradeStatus::Funded));

            let paid = buyer(&p).send_payment(&trade, "zelle-123").await.unwrap();
            let request = paid.payout_request().unwrap();
            assert_eq!(request.payment_reference, "zelle-123");
            assert_eq!(
                Some(request.payout_address.as_str()),
                trade.trade_request().taker_payout_address.as_deref()
            );
            assert_eq!(paid.derive_status().unwrap(), TradeStatus::Paid);
        }

        #[tokio::test]
        async fn send_payment_error_leaves_trade_untouched() {
            let p = principals().await;
            let trade = settle(&p.buyer, created_by_buyer(&p).await, BUYER_PROFILE).await;
            let before = trade.clone();
            let _ = buyer(&p).send_payment(&trade, "ref").await;
            assert_eq!(trade, before);
        }
    }

    mod refunds {
        use super::*;

        #[tokio::test]
        async fn refund_before_payment_completes_trade() {
            let p = principals().await;
            let trade = funded_for_buyer(&p).await;
            let refunded = buyer(&p).refund_trade(&trade).await.unwrap();
            assert_eq!(
                refunded.payout_completed().unwrap().reason,
                PayoutReason::BuyerSellerRefund
            );
            assert_eq!(refunded.derive_status().unwrap(), TradeStatus::Completing);
        }

        #[tokio::test]
        async fn refund_rejected_after_payment() {
            let p = principals().await;
            let trade = funded_for_buyer(&p).await;
            let mut paid = buyer(&p).send_payment(&trade, "ref").await.unwrap();
            paid.update_status().unwrap();
            let err = buyer(&p).refund_trade(&paid).await.unwrap_err();
            assert!(matches!(err, ApplicationError::InvalidTransition(_)));
        }

        #[tokio::test]
        async fn cancel_funded_goes_canceling() {
            let p = principals().await;
            let trade = funded_for_buyer(&p).await;
            let canceled = buyer(&p).cancel_funded(&trade).await.unwrap();
            assert!(canceled.cancel_completed().unwrap().payout_tx_hash.is_some());
            assert_eq!(canceled.derive_status().unwrap(), TradeStatus::Canceling);
        }

        #[tokio::test]
        async fn cancel_unfunded_from_created() {
            let p = principals().await;
            let trade = settle(&p.buyer, created_by_buyer(&p).await, BUYER_PROFILE).await;
            let canceled = buyer(&p).cancel_unfunded(&trade).unwrap();
            assert_eq!(canceled.derive_status().unwrap(), TradeStatus::Canceled);
        }

        #[tokio::test]
        async fn cancel_unfunded_rejected_once_funding() {
            let p = principals().await;
            let trade = funded_for_buyer(&p).await;
            let err = buyer(&p).cancel_unfunded(&trade).unwrap_err();
            assert!(matches!(err, ApplicationError::InvalidTransition(_)));
        }
    }

    mod handlers {
        use super::*;

        #[tokio::test]
        async fn created_adopts_acceptance_from_seller() {
            let p = principals().await;
            let created = created_by_buyer(&p).await;
            let mut remote = created.clone();
            remote.attach_acceptance(acceptance()).unwrap();

            let local = settle(&p.buyer, created, BUYER_PROFILE).await;
            let updated = buyer(&p).handle_created(&local, &remote).await.unwrap().unwrap();
            assert!(updated.trade_acceptance().is_some());
        }

        #[tokio::test]
        async fn maker_buyer_accepts_seller_taker() {
            let p = principals().await;
            let created = SellerProtocol::new(p.seller.clone())
                .create_trade(&buy_offer(), btc("0.5"))
                .await
                .unwrap();
            let local = synthesize(&p.buyer, &created, BUYER_PROFILE).await;
            let updated = buyer(&p).handle_created(&local, &created).await.unwrap().unwrap();
            assert_eq!(
                updated.trade_acceptance().unwrap().maker_escrow_pub_key,
                BUYER_ESCROW
            );
        }

        #[tokio::test]
        async fn funded_always_returns_trade() {
            let p = principals().await;
            let trade = funded_for_buyer(&p).await;
            let same = buyer(&p).handle_funded(&trade, &trade).unwrap().unwrap();
            assert!(same.has_same_facts(&trade));
        }
    }
}
