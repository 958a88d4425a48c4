//! # Trade Facts
//!
//! The append-only facts a trade accumulates as the protocol advances.
//!
//! Each fact is contributed by exactly one principal and never edited once
//! published. The presence or absence of each fact, together with on-chain
//! confirmation depths, is all a trade's status is derived from.

use crate::domain::value_objects::{ArbitrationReason, BtcAmount, CancelReason, FiatAmount, PayoutReason};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The taker's request against an offer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeRequest {
    /// Taker's profile key.
    pub taker_profile_pub_key: String,
    /// Taker's escrow key.
    pub taker_escrow_pub_key: String,
    /// BTC amount requested.
    pub btc_amount: BtcAmount,
    /// Fiat amount owed for `btc_amount`.
    pub payment_amount: FiatAmount,
    /// Where a buying taker wants the BTC paid.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub taker_payout_address: Option<String>,
}

/// The maker's acceptance, fixing the escrow keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeAcceptance {
    /// Maker's escrow key.
    pub maker_escrow_pub_key: String,
    /// Arbitrator for this trade.
    pub arbitrator_profile_pub_key: String,
}

/// Published by the seller once the escrow funding transaction is broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    /// Hash of the escrow funding transaction.
    pub funding_tx_hash: String,
    /// Where the buyer sends fiat.
    pub payment_details: String,
    /// Seller address for a refund.
    pub refund_address: String,
    /// Seller's signature share pre-authorizing the refund.
    pub refund_tx_signature: String,
    /// Fee rate for the payout or refund transaction.
    pub tx_fee_per_kb: BtcAmount,
}

/// Published by the buyer after sending fiat.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutRequest {
    /// Reference of the fiat payment.
    pub payment_reference: String,
    /// Buyer's signature share for the payout transaction.
    pub payout_tx_signature: String,
    /// Where the BTC should go.
    pub payout_address: String,
}

/// Raised by a counterparty to involve the arbitrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArbitrateRequest {
    /// Why arbitration was requested.
    pub reason: ArbitrationReason,
}

/// Records the broadcast of the transaction releasing the escrow.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutCompleted {
    /// Hash of the payout or refund transaction.
    pub payout_tx_hash: String,
    /// Disposition of the escrow.
    pub reason: PayoutReason,
}

/// Records a cancel, with the refund transaction if the escrow was funded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelCompleted {
    /// Hash of the refund transaction, for funded cancels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payout_tx_hash: Option<String>,
    /// Why the trade was canceled.
    pub reason: CancelReason,
}

/// Names of the optional facts, for adoption and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FactKind {
    /// [`TradeAcceptance`].
    Acceptance,
    /// [`PaymentRequest`].
    PaymentRequest,
    /// [`PayoutRequest`].
    PayoutRequest,
    /// [`ArbitrateRequest`].
    ArbitrateRequest,
    /// [`PayoutCompleted`].
    PayoutCompleted,
    /// [`CancelCompleted`].
    CancelCompleted,
}

impl FactKind {
    /// Every optional fact.
    pub const ALL: [Self; 6] = [
        Self::Acceptance,
        Self::PaymentRequest,
        Self::PayoutRequest,
        Self::ArbitrateRequest,
        Self::PayoutCompleted,
        Self::CancelCompleted,
    ];

    /// camelCase name as it appears on the wire.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Acceptance => "tradeAcceptance",
            Self::PaymentRequest => "paymentRequest",
            Self::PayoutRequest => "payoutRequest",
            Self::ArbitrateRequest => "arbitrateRequest",
            Self::PayoutCompleted => "payoutCompleted",
            Self::CancelCompleted => "cancelCompleted",
        }
    }
}

impl fmt::Display for FactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
