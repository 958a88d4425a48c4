//! # Trade Aggregate
//!
//! A single escrow trade between a maker, a taker and an arbitrator.
//!
//! A [`Trade`] is created from an [`Offer`] and a [`TradeRequest`] and then
//! only ever grows: each principal appends the facts it is responsible for,
//! and every principal derives the same status from the same facts.
//!
//! # Status Derivation
//!
//! Rules are applied in a fixed order, each one conditioned on the result of
//! the rules before it:
//!
//! ```text
//!  1. Created       offer + trade request
//!  2. Accepted      Created   + tradeAcceptance
//!  3. Funding       Accepted  + paymentRequest
//!  4. Funded        Funding   + funding tx depth > 0
//!  5. Paid          Funded    + payoutRequest
//!  6. Completing    Funded    + payoutCompleted(BUYER_SELLER_REFUND)
//!  7. Arbitrating   not Created + arbitrateRequest
//!  8. Completing    Paid | Arbitrating | Canceling + payout tx hash
//!  9. Completed     Completing + payout tx depth > 0
//! 10. Canceled      Created | Accepted + cancelCompleted(unfunded)
//! 11. Canceling     Funding | Funded + cancelCompleted(BUYER_CANCEL_FUNDED)
//! 12. Canceled      Canceling + payout tx depth > 0
//! ```
//!
//! # Examples
//!
//! ```
//! use escrow_trade::domain::entities::offer::Offer;
//! use escrow_trade::domain::entities::trade::Trade;
//! use escrow_trade::domain::entities::trade_facts::{TradeAcceptance, TradeRequest};
//! use escrow_trade::domain::value_objects::*;
//! use rust_decimal_macros::dec;
//!
//! let offer = Offer::new(
//!     OfferId::new_v4(),
//!     OfferType::Sell,
//!     CurrencyCode::Usd,
//!     PaymentMethod::Zelle,
//!     FiatAmount::new(dec!(30000), CurrencyCode::Usd).unwrap(),
//! )
//! .with_maker("seller-profile", "seller-escrow")
//! .with_arbitrator("arbitrator-profile");
//!
//! let request = TradeRequest {
//!     taker_profile_pub_key: "buyer-profile".to_string(),
//!     taker_escrow_pub_key: "buyer-escrow".to_string(),
//!     btc_amount: BtcAmount::new(dec!(0.5)).unwrap(),
//!     payment_amount: FiatAmount::new(dec!(15000), CurrencyCode::Usd).unwrap(),
//!     taker_payout_address: None,
//! };
//!
//! let mut trade = Trade::new(offer, request, chrono::Utc::now());
//! assert_eq!(trade.derive_status().unwrap(), TradeStatus::Created);
//! assert_eq!(trade.resolve_role("buyer-profile").unwrap(), Role::Buyer);
//!
//! trade
//!     .attach_acceptance(TradeAcceptance {
//!         maker_escrow_pub_key: "seller-escrow".to_string(),
//!         arbitrator_profile_pub_key: "arbitrator-profile".to_string(),
//!     })
//!     .unwrap();
//! assert_eq!(trade.derive_status().unwrap(), TradeStatus::Accepted);
//! ```

use crate::domain::entities::offer::Offer;
use crate::domain::entities::trade_facts::{
    ArbitrateRequest, CancelCompleted, FactKind, PaymentRequest, PayoutCompleted, PayoutRequest,
    TradeAcceptance, TradeRequest,
};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::value_objects::{
    BtcAmount, FiatAmount, PayoutReason, Role, TradeId, TradeStatus, TransactionWithAmt,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Escrow trade aggregate.
///
/// # Invariants
///
/// - `id` is the content hash of `offer` and `trade_request`
/// - Optional facts are append-only; re-attaching an equal value is a no-op
/// - No fact is attached once the derived status is terminal
/// - `role` and the transaction observations are local to one principal
///   and never serialized
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trade {
    id: TradeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    escrow_address: Option<String>,
    version: u64,
    created_timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    status: Option<TradeStatus>,
    #[serde(skip)]
    role: Option<Role>,
    offer: Offer,
    trade_request: TradeRequest,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    trade_acceptance: Option<TradeAcceptance>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    payment_request: Option<PaymentRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    payout_request: Option<PayoutRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    arbitrate_request: Option<ArbitrateRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    payout_completed: Option<PayoutCompleted>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cancel_completed: Option<CancelCompleted>,
    #[serde(skip)]
    funding_transaction: Option<TransactionWithAmt>,
    #[serde(skip)]
    payout_transaction: Option<TransactionWithAmt>,
}

impl Trade {
    /// Creates a trade in status CREATED with version 0.
    #[must_use]
    pub fn new(offer: Offer, trade_request: TradeRequest, created_timestamp: DateTime<Utc>) -> Self {
        let id = Self::compute_id(&offer, &trade_request);
        Self {
            id,
            escrow_address: None,
            version: 0,
            created_timestamp,
            status: Some(TradeStatus::Created),
            role: None,
            offer,
            trade_request,
            trade_acceptance: None,
            payment_request: None,
            payout_request: None,
            arbitrate_request: None,
            payout_completed: None,
            cancel_completed: None,
            funding_transaction: None,
            payout_transaction: None,
        }
    }

    /// Reconstructs a trade from a record received from another principal.
    ///
    /// The status is left unset; call [`update_status`](Self::update_status)
    /// once transaction observations are known.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        id: TradeId,
        escrow_address: Option<String>,
        version: u64,
        created_timestamp: DateTime<Utc>,
        offer: Offer,
        trade_request: TradeRequest,
        trade_acceptance: Option<TradeAcceptance>,
        payment_request: Option<PaymentRequest>,
        payout_request: Option<PayoutRequest>,
        arbitrate_request: Option<ArbitrateRequest>,
        payout_completed: Option<PayoutCompleted>,
        cancel_completed: Option<CancelCompleted>,
    ) -> Self {
        Self {
            id,
            escrow_address,
            version,
            created_timestamp,
            status: None,
            role: None,
            offer,
            trade_request,
            trade_acceptance,
            payment_request,
            payout_request,
            arbitrate_request,
            payout_completed,
            cancel_completed,
            funding_transaction: None,
            payout_transaction: None,
        }
    }

    /// Computes the content hash identifying a trade.
    ///
    /// Hashes the offer id, the taker's keys, the BTC amount at 8 places and
    /// the fiat amount at the currency's scale.
    #[must_use]
    pub fn compute_id(offer: &Offer, trade_request: &TradeRequest) -> TradeId {
        let offer_id = offer.id().to_string();
        let btc_amount = trade_request.btc_amount.to_string();
        let payment_amount = trade_request
            .payment_amount
            .scaled(offer.currency_code())
            .to_string();
        TradeId::from_terms(&[
            &offer_id,
            &trade_request.taker_profile_pub_key,
            &trade_request.taker_escrow_pub_key,
            &btc_amount,
            &payment_amount,
        ])
    }

    /// Checks that the id matches the trade's terms.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::TamperedTrade` on mismatch.
    pub fn verify_id(&self) -> DomainResult<()> {
        let computed = Self::compute_id(&self.offer, &self.trade_request);
        if computed != self.id {
            return Err(DomainError::TamperedTrade {
                claimed: self.id.to_string(),
                computed: computed.to_string(),
            });
        }
        Ok(())
    }

    // ========== Accessors ==========

    /// Returns the trade ID.
    #[inline]
    #[must_use]
    pub fn id(&self) -> &TradeId {
        &self.id
    }

    /// Returns the 2-of-3 escrow address, once known.
    #[inline]
    #[must_use]
    pub fn escrow_address(&self) -> Option<&str> {
        self.escrow_address.as_deref()
    }

    /// Returns the last version observed from the remote store.
    #[inline]
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Returns when the trade was created.
    #[inline]
    #[must_use]
    pub fn created_timestamp(&self) -> DateTime<Utc> {
        self.created_timestamp
    }

    /// Returns the last derived status.
    #[inline]
    #[must_use]
    pub fn status(&self) -> Option<TradeStatus> {
        self.status
    }

    /// Returns the local principal's role, once resolved.
    #[inline]
    #[must_use]
    pub fn role(&self) -> Option<Role> {
        self.role
    }

    /// Returns the offer.
    #[inline]
    #[must_use]
    pub fn offer(&self) -> &Offer {
        &self.offer
    }

    /// Returns the taker's request.
    #[inline]
    #[must_use]
    pub fn trade_request(&self) -> &TradeRequest {
        &self.trade_request
    }

    /// Returns the maker's acceptance.
    #[inline]
    #[must_use]
    pub fn trade_acceptance(&self) -> Option<&TradeAcceptance> {
        self.trade_acceptance.as_ref()
    }

    /// Returns the seller's payment request.
    #[inline]
    #[must_use]
    pub fn payment_request(&self) -> Option<&PaymentRequest> {
        self.payment_request.as_ref()
    }

    /// Returns the buyer's payout request.
    #[inline]
    #[must_use]
    pub fn payout_request(&self) -> Option<&PayoutRequest> {
        self.payout_request.as_ref()
    }

    /// Returns the arbitration request.
    #[inline]
    #[must_use]
    pub fn arbitrate_request(&self) -> Option<&ArbitrateRequest> {
        self.arbitrate_request.as_ref()
    }

    /// Returns the payout record.
    #[inline]
    #[must_use]
    pub fn payout_completed(&self) -> Option<&PayoutCompleted> {
        self.payout_completed.as_ref()
    }

    /// Returns the cancel record.
    #[inline]
    #[must_use]
    pub fn cancel_completed(&self) -> Option<&CancelCompleted> {
        self.cancel_completed.as_ref()
    }

    /// Returns the funding transaction observation.
    #[inline]
    #[must_use]
    pub fn funding_transaction(&self) -> Option<&TransactionWithAmt> {
        self.funding_transaction.as_ref()
    }

    /// Returns the payout transaction observation.
    #[inline]
    #[must_use]
    pub fn payout_transaction(&self) -> Option<&TransactionWithAmt> {
        self.payout_transaction.as_ref()
    }

    // ========== Derived Terms ==========

    /// BTC amount being traded.
    #[inline]
    #[must_use]
    pub fn btc_amount(&self) -> BtcAmount {
        self.trade_request.btc_amount
    }

    /// Fiat amount owed by the buyer.
    #[inline]
    #[must_use]
    pub fn payment_amount(&self) -> FiatAmount {
        self.trade_request.payment_amount
    }

    /// Maker's profile key, from the offer.
    #[inline]
    #[must_use]
    pub fn maker_profile_pub_key(&self) -> Option<&str> {
        self.offer.maker_profile_pub_key()
    }

    /// Taker's profile key.
    #[inline]
    #[must_use]
    pub fn taker_profile_pub_key(&self) -> &str {
        &self.trade_request.taker_profile_pub_key
    }

    /// Maker's escrow key, preferring the acceptance over the offer.
    #[must_use]
    pub fn maker_escrow_pub_key(&self) -> Option<&str> {
        self.trade_acceptance
            .as_ref()
            .map(|a| a.maker_escrow_pub_key.as_str())
            .or_else(|| self.offer.maker_escrow_pub_key())
    }

    /// Arbitrator's profile key, preferring the acceptance over the offer.
    #[must_use]
    pub fn arbitrator_profile_pub_key(&self) -> Option<&str> {
        self.trade_acceptance
            .as_ref()
            .map(|a| a.arbitrator_profile_pub_key.as_str())
            .or_else(|| self.offer.arbitrator_profile_pub_key())
    }

    /// Hash of the escrow funding transaction.
    #[must_use]
    pub fn funding_tx_hash(&self) -> Option<&str> {
        self.payment_request
            .as_ref()
            .map(|p| p.funding_tx_hash.as_str())
    }

    /// Hash of the transaction releasing the escrow, from the payout record
    /// or else the cancel record.
    #[must_use]
    pub fn payout_tx_hash(&self) -> Option<&str> {
        self.payout_completed
            .as_ref()
            .map(|p| p.payout_tx_hash.as_str())
            .or_else(|| {
                self.cancel_completed
                    .as_ref()
                    .and_then(|c| c.payout_tx_hash.as_deref())
            })
    }

    /// Where the buyer's BTC goes: the payout request, else the taker's declared address.
    #[must_use]
    pub fn buyer_payout_address(&self) -> Option<&str> {
        self.payout_request
            .as_ref()
            .map(|p| p.payout_address.as_str())
            .or(self.trade_request.taker_payout_address.as_deref())
    }

    /// Returns true if the fact is present.
    #[must_use]
    pub fn has_fact(&self, kind: FactKind) -> bool {
        match kind {
            FactKind::Acceptance => self.trade_acceptance.is_some(),
            FactKind::PaymentRequest => self.payment_request.is_some(),
            FactKind::PayoutRequest => self.payout_request.is_some(),
            FactKind::ArbitrateRequest => self.arbitrate_request.is_some(),
            FactKind::PayoutCompleted => self.payout_completed.is_some(),
            FactKind::CancelCompleted => self.cancel_completed.is_some(),
        }
    }

    /// Returns true if the last derived status is terminal.
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.status.is_some_and(|s| s.is_terminal())
    }

    // ========== Status ==========

    /// Derives the status from the present facts and transaction observations.
    ///
    /// Pure: never consults or changes the stored status.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidTradeState` if a fact is present without
    /// the fact it depends on.
    pub fn derive_status(&self) -> DomainResult<TradeStatus> {
        use TradeStatus::{
            Accepted, Arbitrating, Canceled, Canceling, Completed, Completing, Created, Funded,
            Funding, Paid,
        };

        self.check_fact_prerequisites()?;

        let funding_confirmed = self
            .funding_transaction
            .as_ref()
            .is_some_and(TransactionWithAmt::is_confirmed);
        let payout_confirmed = self
            .payout_transaction
            .as_ref()
            .is_some_and(TransactionWithAmt::is_confirmed);
        let cancel_reason = self.cancel_completed.as_ref().map(|c| c.reason);

        let mut status = Created;
        if status == Created && self.trade_acceptance.is_some() {
            status = Accepted;
        }
        if status == Accepted && self.payment_request.is_some() {
            status = Funding;
        }
        if status == Funding && funding_confirmed {
            status = Funded;
        }
        if status == Funded && self.payout_request.is_some() {
            status = Paid;
        }
        if status == Funded
            && self
                .payout_completed
                .as_ref()
                .is_some_and(|p| p.reason == PayoutReason::BuyerSellerRefund)
        {
            status = Completing;
        }
        if status != Created && self.arbitrate_request.is_some() {
            status = Arbitrating;
        }
        if matches!(status, Paid | Arbitrating | Canceling) && self.payout_tx_hash().is_some() {
            status = Completing;
        }
        if status == Completing && payout_confirmed {
            status = Completed;
        }
        if matches!(status, Created | Accepted) && cancel_reason.is_some_and(|r| r.is_unfunded()) {
            status = Canceled;
        }
        if matches!(status, Funding | Funded)
            && cancel_reason.is_some_and(|r| !r.is_unfunded())
        {
            status = Canceling;
        }
        if status == Canceling && payout_confirmed {
            status = Canceled;
        }
        Ok(status)
    }

    fn check_fact_prerequisites(&self) -> DomainResult<()> {
        let orphan = |fact: FactKind, needs: FactKind| {
            DomainError::invalid_trade_state(&self.id, format!("{fact} present without {needs}"))
        };
        if self.payment_request.is_some() && self.trade_acceptance.is_none() {
            return Err(orphan(FactKind::PaymentRequest, FactKind::Acceptance));
        }
        if self.payout_request.is_some() && self.payment_request.is_none() {
            return Err(orphan(FactKind::PayoutRequest, FactKind::PaymentRequest));
        }
        if self.arbitrate_request.is_some() && self.trade_acceptance.is_none() {
            return Err(orphan(FactKind::ArbitrateRequest, FactKind::Acceptance));
        }
        if self.payout_completed.is_some() && self.payment_request.is_none() {
            return Err(orphan(FactKind::PayoutCompleted, FactKind::PaymentRequest));
        }
        if let Some(cancel) = &self.cancel_completed
            && !cancel.reason.is_unfunded()
        {
            if self.payment_request.is_none() {
                return Err(orphan(FactKind::CancelCompleted, FactKind::PaymentRequest));
            }
            if cancel.payout_tx_hash.is_none() {
                return Err(DomainError::invalid_trade_state(
                    &self.id,
                    "funded cancel without refund transaction",
                ));
            }
        }
        Ok(())
    }

    /// Re-derives and stores the status.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidTradeState` if derivation fails, or
    /// `DomainError::StatusRegression` if the new status is not reachable
    /// from the stored one. The stored status is unchanged on error.
    pub fn update_status(&mut self) -> DomainResult<TradeStatus> {
        let derived = self.derive_status()?;
        if let Some(current) = self.status
            && !current.can_reach(derived)
        {
            return Err(DomainError::StatusRegression {
                trade_id: self.id.to_string(),
                from: current,
                to: derived,
            });
        }
        self.status = Some(derived);
        Ok(derived)
    }

    /// Returns the stored status if it is one of `allowed`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidTransition` for any other status, or
    /// `DomainError::InvalidTradeState` if no status has been derived.
    pub fn require_status(&self, allowed: &[TradeStatus], action: &str) -> DomainResult<TradeStatus> {
        let status = self.status.ok_or_else(|| {
            DomainError::invalid_trade_state(&self.id, "status has not been derived")
        })?;
        if !allowed.contains(&status) {
            return Err(DomainError::invalid_transition(status, action));
        }
        Ok(status)
    }

    // ========== Role ==========

    /// Resolves which role `profile_pub_key` plays in this trade.
    ///
    /// The maker's role follows the offer type and the taker's is its
    /// opposite. The arbitrator is only recognised once the maker has
    /// accepted.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidRole` if the key matches no participant.
    pub fn resolve_role(&self, profile_pub_key: &str) -> DomainResult<Role> {
        let offer_type = self.offer.offer_type();
        if self.offer.maker_profile_pub_key() == Some(profile_pub_key) {
            return Ok(offer_type.maker_role());
        }
        if self.trade_request.taker_profile_pub_key == profile_pub_key {
            return Ok(offer_type.taker_role());
        }
        if let Some(acceptance) = &self.trade_acceptance
            && acceptance.arbitrator_profile_pub_key == profile_pub_key
        {
            return Ok(Role::Arbitrator);
        }
        Err(DomainError::InvalidRole(format!(
            "{profile_pub_key} is not a participant in trade {}",
            self.id
        )))
    }

    /// Resolves and stores the local principal's role.
    ///
    /// # Errors
    ///
    /// See [`resolve_role`](Self::resolve_role).
    pub fn assign_role(&mut self, profile_pub_key: &str) -> DomainResult<Role> {
        let role = self.resolve_role(profile_pub_key)?;
        self.role = Some(role);
        Ok(role)
    }

    /// Returns a copy without the local role and transaction observations,
    /// as it would read back from storage.
    #[must_use]
    pub fn to_snapshot(&self) -> Self {
        Self {
            role: None,
            funding_transaction: None,
            payout_transaction: None,
            ..self.clone()
        }
    }

    // ========== Local Observations ==========

    /// Replaces the funding transaction observation.
    pub fn set_funding_transaction(&mut self, tx: Option<TransactionWithAmt>) {
        self.funding_transaction = tx;
    }

    /// Replaces the payout transaction observation.
    pub fn set_payout_transaction(&mut self, tx: Option<TransactionWithAmt>) {
        self.payout_transaction = tx;
    }

    /// Records the version last observed from the remote store.
    pub fn set_version(&mut self, version: u64) {
        self.version = version;
    }

    /// Records the escrow address.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::FactConflict` if a different address is already set.
    pub fn set_escrow_address(&mut self, address: impl Into<String>) -> DomainResult<bool> {
        let address = address.into();
        match &self.escrow_address {
            Some(existing) if *existing == address => Ok(false),
            Some(_) => Err(DomainError::FactConflict {
                trade_id: self.id.to_string(),
                fact: "escrowAddress",
            }),
            None => {
                self.escrow_address = Some(address);
                Ok(true)
            }
        }
    }

    // ========== Facts ==========

    fn guard_open(&self, action: &str) -> DomainResult<()> {
        match self.status {
            Some(status) if status.is_terminal() => {
                Err(DomainError::invalid_transition(status, action))
            }
            _ => Ok(()),
        }
    }

    /// Attaches the maker's acceptance. Returns false if already present.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` on a terminal trade, `FactConflict` if a different
    /// acceptance is present.
    pub fn attach_acceptance(&mut self, acceptance: TradeAcceptance) -> DomainResult<bool> {
        self.guard_open("accept trade")?;
        attach_fact(&self.id, &mut self.trade_acceptance, acceptance, FactKind::Acceptance)
    }

    /// Attaches the seller's payment request.
    ///
    /// # Errors
    ///
    /// As for [`attach_acceptance`](Self::attach_acceptance).
    pub fn attach_payment_request(&mut self, request: PaymentRequest) -> DomainResult<bool> {
        self.guard_open("request payment")?;
        attach_fact(&self.id, &mut self.payment_request, request, FactKind::PaymentRequest)
    }

    /// Attaches the buyer's payout request.
    ///
    /// # Errors
    ///
    /// As for [`attach_acceptance`](Self::attach_acceptance).
    pub fn attach_payout_request(&mut self, request: PayoutRequest) -> DomainResult<bool> {
        self.guard_open("request payout")?;
        attach_fact(&self.id, &mut self.payout_request, request, FactKind::PayoutRequest)
    }

    /// Attaches an arbitration request.
    ///
    /// # Errors
    ///
    /// As for [`attach_acceptance`](Self::attach_acceptance).
    pub fn attach_arbitrate_request(&mut self, request: ArbitrateRequest) -> DomainResult<bool> {
        self.guard_open("request arbitration")?;
        attach_fact(&self.id, &mut self.arbitrate_request, request, FactKind::ArbitrateRequest)
    }

    /// Attaches the payout record.
    ///
    /// # Errors
    ///
    /// As for [`attach_acceptance`](Self::attach_acceptance).
    pub fn attach_payout_completed(&mut self, completed: PayoutCompleted) -> DomainResult<bool> {
        self.guard_open("complete payout")?;
        attach_fact(&self.id, &mut self.payout_completed, completed, FactKind::PayoutCompleted)
    }

    /// Attaches the cancel record.
    ///
    /// # Errors
    ///
    /// As for [`attach_acceptance`](Self::attach_acceptance).
    pub fn attach_cancel_completed(&mut self, completed: CancelCompleted) -> DomainResult<bool> {
        self.guard_open("cancel trade")?;
        attach_fact(&self.id, &mut self.cancel_completed, completed, FactKind::CancelCompleted)
    }

    /// Copies the listed facts from `remote` where this trade lacks them.
    ///
    /// Returns true if anything was copied.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` if a new fact would land on a terminal trade,
    /// `FactConflict` if both copies hold different values.
    pub fn adopt_from(&mut self, remote: &Trade, kinds: &[FactKind]) -> DomainResult<bool> {
        let mut adopted = false;
        for kind in kinds {
            if remote.has_fact(*kind) && !self.has_fact(*kind) {
                self.guard_open(&format!("adopt {kind}"))?;
            }
            adopted |= self.merge_fact(remote, *kind)?;
        }
        Ok(adopted)
    }

    /// Re-applies this trade's facts on top of `latest`.
    ///
    /// The result holds the union of both fact sets and takes `latest`'s
    /// version, so it can be re-submitted after a write conflict.
    ///
    /// # Errors
    ///
    /// `FactConflict` if the two copies hold different values for a fact or
    /// for the escrow address.
    pub fn rebase_onto(&mut self, latest: &Trade) -> DomainResult<()> {
        for kind in FactKind::ALL {
            self.merge_fact(latest, kind)?;
        }
        if let Some(address) = latest.escrow_address() {
            self.set_escrow_address(address)?;
        }
        self.version = latest.version;
        Ok(())
    }

    fn merge_fact(&mut self, other: &Trade, kind: FactKind) -> DomainResult<bool> {
        match kind {
            FactKind::Acceptance => {
                merge_slot(&self.id, &mut self.trade_acceptance, other.trade_acceptance.as_ref(), kind)
            }
            FactKind::PaymentRequest => {
                merge_slot(&self.id, &mut self.payment_request, other.payment_request.as_ref(), kind)
            }
            FactKind::PayoutRequest => {
                merge_slot(&self.id, &mut self.payout_request, other.payout_request.as_ref(), kind)
            }
            FactKind::ArbitrateRequest => merge_slot(
                &self.id,
                &mut self.arbitrate_request,
                other.arbitrate_request.as_ref(),
                kind,
            ),
            FactKind::PayoutCompleted => merge_slot(
                &self.id,
                &mut self.payout_completed,
                other.payout_completed.as_ref(),
                kind,
            ),
            FactKind::CancelCompleted => merge_slot(
                &self.id,
                &mut self.cancel_completed,
                other.cancel_completed.as_ref(),
                kind,
            ),
        }
    }

    /// Returns true if this trade holds anything `remote` lacks and so must be published.
    #[must_use]
    pub fn contributes_to(&self, remote: &Trade) -> bool {
        FactKind::ALL
            .iter()
            .any(|kind| self.has_fact(*kind) && !remote.has_fact(*kind))
            || (self.escrow_address.is_some() && remote.escrow_address.is_none())
    }

    /// Returns true if both trades would persist identically.
    ///
    /// Ignores role and transaction observations.
    #[must_use]
    pub fn same_snapshot(&self, other: &Trade) -> bool {
        self.id == other.id
            && self.escrow_address == other.escrow_address
            && self.version == other.version
            && self.status == other.status
            && self.has_same_facts(other)
    }

    /// Returns true if both trades hold the same facts.
    #[must_use]
    pub fn has_same_facts(&self, other: &Trade) -> bool {
        self.offer == other.offer
            && self.trade_request == other.trade_request
            && self.trade_acceptance == other.trade_acceptance
            && self.payment_request == other.payment_request
            && self.payout_request == other.payout_request
            && self.arbitrate_request == other.arbitrate_request
            && self.payout_completed == other.payout_completed
            && self.cancel_completed == other.cancel_completed
    }
}

fn attach_fact<T: PartialEq>(
    trade_id: &TradeId,
    slot: &mut Option<T>,
    value: T,
    kind: FactKind,
) -> DomainResult<bool> {
    match slot {
        Some(existing) if *existing == value => Ok(false),
        Some(_) => Err(DomainError::FactConflict {
            trade_id: trade_id.to_string(),
            fact: kind.name(),
        }),
        None => {
            *slot = Some(value);
            Ok(true)
        }
    }
}

fn merge_slot<T: PartialEq + Clone>(
    trade_id: &TradeId,
    slot: &mut Option<T>,
    incoming: Option<&T>,
    kind: FactKind,
) -> DomainResult<bool> {
    match incoming {
        Some(value) => attach_fact(trade_id, slot, value.clone(), kind),
        None => Ok(false),
    }
}

impl fmt::Display for Trade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = self
            .status
            .map_or_else(|| "UNDERIVED".to_string(), |s| s.to_string());
        write!(
            f,
            "Trade({} {} BTC for {} {} v{} [{}])",
            self.id.short(),
            self.btc_amount(),
            self.payment_amount(),
            self.offer.currency_code(),
            self.version,
            status
        )
    }
}
