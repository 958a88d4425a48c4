//! # Trade Protocols
//!
//! Role-specific reactions to a trade's status.
//!
//! [`TradeProtocol`] selects the handler for the local copy's stored status
//! and returns the updated trade, or `None` when nothing changed. Handlers
//! only talk to the [`Wallet`] and [`Profile`]; persisting and publishing
//! the result is the reconciliation engine's job.
//!
//! | Status | Handler |
//! |--------|---------|
//! | CREATED | role specific |
//! | ACCEPTED | adopt payment request or cancel |
//! | FUNDING | wait for funding confirmation |
//! | FUNDED | role specific |
//! | PAID | adopt arbitration or payout |
//! | COMPLETING, CANCELING | wait for payout confirmation |
//! | ARBITRATING | adopt payout |
//! | COMPLETED, CANCELED | none |

pub mod arbitrator;
pub mod buyer;
pub mod seller;
mod shared;

pub use arbitrator::ArbitratorProtocol;
pub use buyer::BuyerProtocol;
pub use seller::SellerProtocol;

use crate::application::error::{ApplicationError, ApplicationResult};
use crate::application::ports::{Profile, Wallet};
use crate::domain::entities::{Offer, Trade, TradeAcceptance, TradeRequest};
use crate::domain::value_objects::{BtcAmount, OfferType, Role, TradeStatus};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};

/// Collaborators shared by every protocol.
#[derive(Debug, Clone)]
pub struct ProtocolContext {
    wallet: Arc<dyn Wallet>,
    profile: Arc<dyn Profile>,
}

impl ProtocolContext {
    /// Creates a context.
    #[must_use]
    pub fn new(wallet: Arc<dyn Wallet>, profile: Arc<dyn Profile>) -> Self {
        Self { wallet, profile }
    }

    /// Returns the wallet.
    #[inline]
    #[must_use]
    pub fn wallet(&self) -> &dyn Wallet {
        self.wallet.as_ref()
    }

    /// Returns the profile.
    #[inline]
    #[must_use]
    pub fn profile(&self) -> &dyn Profile {
        self.profile.as_ref()
    }

    /// Re-reads both escrow transactions from the wallet.
    ///
    /// # Errors
    ///
    /// Propagates wallet failures.
    pub async fn refresh_transactions(&self, trade: &mut Trade) -> ApplicationResult<()> {
        let Some(address) = trade.escrow_address().map(str::to_string) else {
            return Ok(());
        };
        let funding_hash = trade.funding_tx_hash().map(str::to_string);
        let payout_hash = trade.payout_tx_hash().map(str::to_string);

        let funding = match funding_hash {
            Some(hash) => self.wallet.escrow_transaction(&address, &hash).await?,
            None => None,
        };
        let payout = match payout_hash {
            Some(hash) => self.wallet.escrow_transaction(&address, &hash).await?,
            None => None,
        };
        trade.set_funding_transaction(funding);
        trade.set_payout_transaction(payout);
        Ok(())
    }

    /// Derives the escrow address from the accepted keys and starts watching it.
    ///
    /// Returns true if the address was newly set.
    ///
    /// # Errors
    ///
    /// `FactConflict` if the trade already carries a different address;
    /// wallet failures otherwise.
    pub async fn ensure_escrow(&self, trade: &mut Trade) -> ApplicationResult<bool> {
        let Some(acceptance) = trade.trade_acceptance() else {
            return Ok(false);
        };
        let arbitrator = acceptance.arbitrator_profile_pub_key.clone();
        let maker_escrow = acceptance.maker_escrow_pub_key.clone();
        let taker_escrow = trade.trade_request().taker_escrow_pub_key.clone();

        let address = self
            .wallet
            .escrow_address(&arbitrator, &maker_escrow, &taker_escrow)
            .await?;
        let changed = trade.set_escrow_address(address.clone())?;
        if changed {
            self.wallet.watch_escrow_address(&address).await?;
            debug!(trade_id = %trade.id(), escrow_address = %address, "escrow address derived");
        }
        Ok(changed)
    }

    /// Attaches the maker's acceptance using the local escrow key.
    ///
    /// # Errors
    ///
    /// `MissingOfferData` if the offer names no arbitrator.
    pub(crate) async fn accept_as_maker(&self, trade: &mut Trade) -> ApplicationResult<bool> {
        let arbitrator = trade
            .offer()
            .arbitrator_profile_pub_key()
            .ok_or_else(|| {
                ApplicationError::MissingOfferData(format!(
                    "offer {} has no arbitrator key",
                    trade.offer().id()
                ))
            })?
            .to_string();
        let escrow = self.wallet.escrow_pub_key().await?;
        let accepted = trade.attach_acceptance(TradeAcceptance {
            maker_escrow_pub_key: escrow,
            arbitrator_profile_pub_key: arbitrator,
        })?;
        if accepted {
            info!(trade_id = %trade.id(), "trade accepted as maker");
        }
        Ok(accepted)
    }

    /// Builds a CREATED trade taking `offer` for `btc_amount`.
    pub(crate) async fn take_offer(
        &self,
        offer: &Offer,
        expected: OfferType,
        btc_amount: BtcAmount,
        with_payout_address: bool,
    ) -> ApplicationResult<Trade> {
        if offer.offer_type() != expected {
            return Err(ApplicationError::validation(format!(
                "expected a {expected} offer, got {}",
                offer.offer_type()
            )));
        }
        if btc_amount.is_zero() {
            return Err(ApplicationError::validation("btc amount must be positive"));
        }
        let keys = offer.require_escrow_keys()?;
        let profile_pub_key = self.profile.pub_key();
        if keys.maker_profile_pub_key == profile_pub_key {
            return Err(ApplicationError::validation("cannot take own offer"));
        }

        let escrow_pub_key = self.wallet.escrow_pub_key().await?;
        let taker_payout_address = if with_payout_address {
            Some(self.wallet.deposit_address().await?)
        } else {
            None
        };
        let payment_amount = offer.price().times_btc(btc_amount, offer.currency_code())?;
        let request = TradeRequest {
            taker_profile_pub_key: profile_pub_key.clone(),
            taker_escrow_pub_key: escrow_pub_key.clone(),
            btc_amount,
            payment_amount,
            taker_payout_address,
        };

        let mut trade = Trade::new(offer.clone(), request, Utc::now());
        let address = self
            .wallet
            .escrow_address(
                keys.arbitrator_profile_pub_key,
                keys.maker_escrow_pub_key,
                &escrow_pub_key,
            )
            .await?;
        trade.set_escrow_address(address.clone())?;
        trade.assign_role(&profile_pub_key)?;
        self.wallet.watch_escrow_address(&address).await?;

        info!(
            trade_id = %trade.id(),
            offer_id = %offer.id(),
            btc_amount = %btc_amount,
            payment_amount = %payment_amount,
            "trade created"
        );
        Ok(trade)
    }
}

/// Protocol for the local principal's role in a trade.
#[derive(Debug, Clone)]
pub enum TradeProtocol {
    /// Buyer side.
    Buyer(BuyerProtocol),
    /// Seller side.
    Seller(SellerProtocol),
    /// Arbitrator.
    Arbitrator(ArbitratorProtocol),
}

impl TradeProtocol {
    /// Selects the protocol for `role`.
    #[must_use]
    pub fn for_role(role: Role, context: ProtocolContext) -> Self {
        match role {
            Role::Buyer => Self::Buyer(BuyerProtocol::new(context)),
            Role::Seller => Self::Seller(SellerProtocol::new(context)),
            Role::Arbitrator => Self::Arbitrator(ArbitratorProtocol::new(context)),
        }
    }

    /// Returns the role this protocol acts for.
    #[must_use]
    pub const fn role(&self) -> Role {
        match self {
            Self::Buyer(_) => Role::Buyer,
            Self::Seller(_) => Role::Seller,
            Self::Arbitrator(_) => Role::Arbitrator,
        }
    }

    /// Returns the shared collaborators.
    #[must_use]
    pub fn context(&self) -> &ProtocolContext {
        match self {
            Self::Buyer(p) => p.context(),
            Self::Seller(p) => p.context(),
            Self::Arbitrator(p) => p.context(),
        }
    }

    /// Reacts to `remote` given the local copy's stored status.
    ///
    /// # Errors
    ///
    /// `InvalidTradeState` if the local copy has no derived status; any
    /// handler, wallet or domain error otherwise. `local` is never modified.
    pub async fn handle(&self, local: &Trade, remote: &Trade) -> ApplicationResult<Option<Trade>> {
        let status = local.status().ok_or_else(|| {
            ApplicationError::InvalidTradeState(format!("trade {} has no derived status", local.id()))
        })?;
        if status.is_terminal() {
            return Ok(None);
        }

        let handled = match status {
            TradeStatus::Created => match self {
                Self::Buyer(p) => p.handle_created(local, remote).await?,
                Self::Seller(p) => p.handle_created(local, remote).await?,
                Self::Arbitrator(p) => p.handle_created(local, remote)?,
            },
            TradeStatus::Accepted => shared::handle_accepted(local, remote)?,
            TradeStatus::Funding => shared::handle_funding(local),
            TradeStatus::Funded => match self {
                Self::Buyer(p) => p.handle_funded(local, remote)?,
                Self::Seller(p) => p.handle_funded(local, remote)?,
                Self::Arbitrator(p) => p.handle_funded(local, remote)?,
            },
            TradeStatus::Paid => shared::handle_paid(local, remote)?,
            TradeStatus::Completing | TradeStatus::Canceling => shared::handle_completing(local),
            TradeStatus::Arbitrating => shared::handle_arbitrating(local, remote)?,
            TradeStatus::Canceled => shared::handle_canceled(),
            TradeStatus::Completed => None,
        };

        let (mut candidate, changed) = match handled {
            Some(trade) => (trade, true),
            None => (local.clone(), false),
        };
        let escrow_changed = self.context().ensure_escrow(&mut candidate).await?;
        Ok((changed || escrow_changed).then_some(candidate))
    }

    /// Raises arbitration with the reason matching the local role.
    ///
    /// # Errors
    ///
    /// `InvalidRole` for the arbitrator, `InvalidTransition` outside the
    /// arbitrable statuses.
    pub fn request_arbitrate(&self, trade: &Trade) -> ApplicationResult<Trade> {
        shared::request_arbitrate(self.role(), trade)
    }
}


#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::test_harness::*;
    use super::*;
    use crate::domain::entities::test_support::*;

    #[tokio::test]
    async fn dispatch_by_role() {
        let p = principals().await;
        assert_eq!(TradeProtocol::for_role(Role::Buyer, p.buyer.clone()).role(), Role::Buyer);
        assert_eq!(
            TradeProtocol::for_role(Role::Arbitrator, p.arbitrator.clone()).role(),
            Role::Arbitrator
        );
    }

    #[tokio::test]
    async fn underived_status_is_invalid_trade_state() {
        let p = principals().await;
        let trade = created_by_buyer(&p).await;
        let underived = crate::application::dto::TradeRecord::from(&trade).into_trade();
        let protocol = TradeProtocol::for_role(Role::Buyer, p.buyer.clone());
        let err = protocol.handle(&underived, &trade).await.unwrap_err();
        assert!(err.is_invalid_trade_state());
    }

    #[tokio::test]
    async fn completed_trade_is_terminal_noop() {
        let p = principals().await;
        let mut trade = sell_trade();
        trade.attach_cancel_completed(unfunded_cancel()).unwrap();
        trade.update_status().unwrap();
        let protocol = TradeProtocol::for_role(Role::Seller, p.seller.clone());
        assert!(protocol.handle(&trade, &trade).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn maker_seller_accepts_and_funds_in_one_pass() {
        let p = principals().await;
        let remote = created_by_buyer(&p).await;
        let local = synthesize(&p.seller, &remote, SELLER_PROFILE).await;

        let protocol = TradeProtocol::for_role(Role::Seller, p.seller.clone());
        let updated = protocol.handle(&local, &remote).await.unwrap().unwrap();

        assert!(updated.trade_acceptance().is_some());
        assert!(updated.payment_request().is_some());
        assert_eq!(updated.escrow_address(), remote.escrow_address());
        assert_eq!(updated.derive_status().unwrap(), TradeStatus::Funding);
    }

    #[tokio::test]
    async fn conflicting_escrow_address_rejected() {
        let p = principals().await;
        let remote = created_by_buyer(&p).await;
        let mut record = crate::application::dto::TradeRecord::from(&remote);
        record.escrow_address = Some("attacker-address".to_string());
        let forged = record.into_trade();
        let local = settle(&p.seller, forged.clone(), SELLER_PROFILE).await;

        let protocol = TradeProtocol::for_role(Role::Seller, p.seller.clone());
        let err = protocol.handle(&local, &forged).await.unwrap_err();
        assert!(matches!(err, ApplicationError::Domain(_)));
    }

    #[tokio::test]
    async fn arbitrator_cannot_request_arbitration() {
        let p = principals().await;
        let mut trade = funded_trade();
        trade.update_status().unwrap();
        trade.assign_role(ARBITRATOR_PROFILE).unwrap();
        let protocol = TradeProtocol::for_role(Role::Arbitrator, p.arbitrator.clone());
        let err = protocol.request_arbitrate(&trade).unwrap_err();
        assert!(matches!(err, ApplicationError::InvalidRole(_)));
    }
}
