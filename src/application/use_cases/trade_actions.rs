//! # Trade Actions Use Case
//!
//! User intents against the local trade set.
//!
//! Every action runs on the current local copy under the trade's lock and
//! commits through the [`ReconciliationEngine`], so the result is stored,
//! announced on the event channel and published to the trade service the
//! same way poll-driven changes are.
//!
//! | Action | Role | Allowed from |
//! |--------|------|--------------|
//! | [`create_trade`](TradeActions::create_trade) | taker | |
//! | [`fund_escrow`](TradeActions::fund_escrow) | seller | CREATED, ACCEPTED |
//! | [`send_payment`](TradeActions::send_payment) | buyer | FUNDED |
//! | [`confirm_payment_received`](TradeActions::confirm_payment_received) | seller | PAID |
//! | [`refund_trade`](TradeActions::refund_trade) | buyer | FUNDED |
//! | [`request_arbitration`](TradeActions::request_arbitration) | buyer, seller | ACCEPTED to PAID |
//! | [`resolve_for_seller`](TradeActions::resolve_for_seller) | arbitrator | ARBITRATING |
//! | [`resolve_for_buyer`](TradeActions::resolve_for_buyer) | arbitrator | ARBITRATING |
//! | [`cancel`](TradeActions::cancel) | buyer, seller | before payment |

use crate::application::dto::TradeRecord;
use crate::application::error::{ApplicationError, ApplicationResult};
use crate::application::protocol::{
    ArbitratorProtocol, BuyerProtocol, SellerProtocol, TradeProtocol,
};
use crate::application::services::ReconciliationEngine;
use crate::domain::entities::{Offer, Trade};
use crate::domain::value_objects::{BtcAmount, OfferType, Role, TradeId, TradeStatus};
use tracing::info;

/// Entry point for user-initiated trade changes.
#[derive(Debug, Clone)]
pub struct TradeActions {
    engine: ReconciliationEngine,
}

impl TradeActions {
    /// Creates the use case on top of a running or idle engine.
    #[must_use]
    pub fn new(engine: ReconciliationEngine) -> Self {
        Self { engine }
    }

    /// Returns the engine actions commit through.
    #[inline]
    #[must_use]
    pub fn engine(&self) -> &ReconciliationEngine {
        &self.engine
    }

    // ========== Queries ==========

    /// Returns the current local copy of a trade.
    ///
    /// # Errors
    ///
    /// `TradeNotFound` if the trade is not stored locally.
    pub async fn trade(&self, id: &TradeId) -> ApplicationResult<Trade> {
        self.engine.current(id).await
    }

    /// Returns every local trade, oldest first.
    ///
    /// # Errors
    ///
    /// Storage failures.
    pub async fn list(&self) -> ApplicationResult<Vec<Trade>> {
        let mut trades = self.engine.store().all().await?;
        trades.sort_by(|a, b| {
            a.created_timestamp()
                .cmp(&b.created_timestamp())
                .then_with(|| a.id().cmp(b.id()))
        });
        Ok(trades)
    }

    /// Serializes a trade in the wire format, pretty-printed.
    ///
    /// # Errors
    ///
    /// `TradeNotFound`, or `Internal` if encoding fails.
    pub async fn export_json(&self, id: &TradeId) -> ApplicationResult<String> {
        let trade = self.trade(id).await?;
        serde_json::to_string_pretty(&TradeRecord::from(&trade))
            .map_err(|e| ApplicationError::internal(format!("export {id}: {e}")))
    }

    // ========== Actions ==========

    /// Takes `offer` for `btc_amount`.
    ///
    /// A SELL offer is taken as buyer, a BUY offer as seller.
    ///
    /// # Errors
    ///
    /// `Validation` if the amount is zero, the offer is the local
    /// principal's own, or the trade already exists; `MissingOfferData`
    /// if the offer lacks a key.
    pub async fn create_trade(&self, offer: &Offer, btc_amount: BtcAmount) -> ApplicationResult<Trade> {
        let context = self.engine.context().clone();
        let trade = match offer.offer_type() {
            OfferType::Sell => BuyerProtocol::new(context).create_trade(offer, btc_amount).await?,
            OfferType::Buy => SellerProtocol::new(context).create_trade(offer, btc_amount).await?,
        };
        if self.engine.store().read(trade.id()).await?.is_some() {
            return Err(ApplicationError::validation(format!(
                "trade {} already exists",
                trade.id()
            )));
        }
        self.engine.commit(trade).await
    }

    /// Funds the escrow after an earlier automatic attempt failed.
    ///
    /// # Errors
    ///
    /// `InvalidRole` unless seller; see [`SellerProtocol::fund_escrow`].
    pub async fn fund_escrow(&self, id: &TradeId) -> ApplicationResult<Trade> {
        let seller = self.seller();
        self.engine
            .with_trade(id, |trade| async move {
                require_role(&trade, Role::Seller, "fund escrow")?;
                seller.fund_escrow(&trade).await
            })
            .await
    }

    /// Declares the fiat payment sent.
    ///
    /// # Errors
    ///
    /// `InvalidRole` unless buyer; see [`BuyerProtocol::send_payment`].
    pub async fn send_payment(
        &self,
        id: &TradeId,
        payment_reference: impl Into<String>,
    ) -> ApplicationResult<Trade> {
        let buyer = self.buyer();
        let reference = payment_reference.into();
        self.engine
            .with_trade(id, |trade| async move {
                require_role(&trade, Role::Buyer, "send payment")?;
                buyer.send_payment(&trade, reference).await
            })
            .await
    }

    /// Confirms fiat arrived and pays the buyer.
    ///
    /// # Errors
    ///
    /// `InvalidRole` unless seller; `InvalidTransition` unless PAID.
    pub async fn confirm_payment_received(&self, id: &TradeId) -> ApplicationResult<Trade> {
        let seller = self.seller();
        self.engine
            .with_trade(id, |trade| async move {
                require_role(&trade, Role::Seller, "confirm payment")?;
                seller.confirm_payment_received(&trade).await
            })
            .await
    }

    /// Abandons a funded trade before paying, refunding the seller.
    ///
    /// # Errors
    ///
    /// `InvalidRole` unless buyer; `InvalidTransition` unless FUNDED
    /// without a payout request.
    pub async fn refund_trade(&self, id: &TradeId) -> ApplicationResult<Trade> {
        let buyer = self.buyer();
        self.engine
            .with_trade(id, |trade| async move {
                require_role(&trade, Role::Buyer, "refund trade")?;
                buyer.refund_trade(&trade).await
            })
            .await
    }

    /// Raises a dispute for the arbitrator.
    ///
    /// # Errors
    ///
    /// `InvalidRole` for the arbitrator, `InvalidTransition` for CREATED
    /// or terminal trades.
    pub async fn request_arbitration(&self, id: &TradeId) -> ApplicationResult<Trade> {
        let context = self.engine.context().clone();
        self.engine
            .with_trade(id, |trade| async move {
                let role = local_role(&trade)?;
                TradeProtocol::for_role(role, context).request_arbitrate(&trade)
            })
            .await
    }

    /// Rules for the seller, returning the escrow to them.
    ///
    /// # Errors
    ///
    /// `InvalidRole` unless arbitrator; `InvalidTransition` unless ARBITRATING.
    pub async fn resolve_for_seller(&self, id: &TradeId) -> ApplicationResult<Trade> {
        let arbitrator = self.arbitrator();
        self.engine
            .with_trade(id, |trade| async move {
                require_role(&trade, Role::Arbitrator, "resolve arbitration")?;
                arbitrator.refund_seller(&trade).await
            })
            .await
    }

    /// Rules for the buyer, releasing the escrow to them.
    ///
    /// # Errors
    ///
    /// `InvalidRole` unless arbitrator; `InvalidTransition` unless ARBITRATING.
    pub async fn resolve_for_buyer(&self, id: &TradeId) -> ApplicationResult<Trade> {
        let arbitrator = self.arbitrator();
        self.engine
            .with_trade(id, |trade| async move {
                require_role(&trade, Role::Arbitrator, "resolve arbitration")?;
                arbitrator.payout_buyer(&trade).await
            })
            .await
    }

    /// Cancels the trade.
    ///
    /// Either counterparty may cancel before the escrow is funded. Once it
    /// is, only the buyer may, and the seller is refunded.
    ///
    /// # Errors
    ///
    /// `InvalidRole` for the arbitrator or a seller on a funded trade;
    /// `InvalidTransition` once payment was sent.
    pub async fn cancel(&self, id: &TradeId) -> ApplicationResult<Trade> {
        let buyer = self.buyer();
        let seller = self.seller();
        let canceled = self
            .engine
            .with_trade(id, |trade| async move {
                let funded = trade.payment_request().is_some()
                    && matches!(
                        trade.status(),
                        Some(TradeStatus::Funding | TradeStatus::Funded)
                    );
                match local_role(&trade)? {
                    Role::Buyer if funded => buyer.cancel_funded(&trade).await,
                    Role::Buyer => buyer.cancel_unfunded(&trade),
                    Role::Seller if funded => Err(ApplicationError::invalid_role(
                        "only the buyer can cancel a funded trade",
                    )),
                    Role::Seller => seller.cancel_unfunded(&trade),
                    Role::Arbitrator => Err(ApplicationError::invalid_role(
                        "arbitrator cannot cancel a trade",
                    )),
                }
            })
            .await?;
        info!(trade_id = %canceled.id(), status = ?canceled.status(), "trade cancel committed");
        Ok(canceled)
    }

    fn buyer(&self) -> BuyerProtocol {
        BuyerProtocol::new(self.engine.context().clone())
    }

    fn seller(&self) -> SellerProtocol {
        SellerProtocol::new(self.engine.context().clone())
    }

    fn arbitrator(&self) -> ArbitratorProtocol {
        ArbitratorProtocol::new(self.engine.context().clone())
    }
}

fn local_role(trade: &Trade) -> ApplicationResult<Role> {
    trade.role().ok_or_else(|| {
        ApplicationError::invalid_role(format!("no local role in trade {}", trade.id()))
    })
}

fn require_role(trade: &Trade, expected: Role, action: &str) -> ApplicationResult<()> {
    let role = local_role(trade)?;
    if role == expected {
        Ok(())
    } else {
        Err(ApplicationError::invalid_role(format!(
            "{role} cannot {action}, requires {expected}"
        )))
    }
}
