//! # Trade Record
//!
//! The shared trade record as published to the remote trade service.
//!
//! A record carries the offer, the trade request and every optional fact,
//! plus the escrow address and the store's version. It deliberately omits
//! the status, the role and transaction observations: each principal derives
//! those for itself.

use crate::domain::entities::{
    ArbitrateRequest, CancelCompleted, Offer, PaymentRequest, PayoutCompleted, PayoutRequest,
    Trade, TradeAcceptance, TradeRequest,
};
use crate::domain::value_objects::TradeId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Wire representation of a trade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeRecord {
    /// Content-hash id.
    pub id: TradeId,
    /// Escrow address, once derived.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub escrow_address: Option<String>,
    /// Store-assigned version.
    #[serde(default)]
    pub version: u64,
    /// Creation time.
    pub created_timestamp: DateTime<Utc>,
    /// The offer the trade was created from.
    pub offer: Offer,
    /// The taker's request.
    pub trade_request: TradeRequest,
    /// Maker acceptance.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trade_acceptance: Option<TradeAcceptance>,
    /// Seller payment request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_request: Option<PaymentRequest>,
    /// Buyer payout request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payout_request: Option<PayoutRequest>,
    /// Arbitration request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arbitrate_request: Option<ArbitrateRequest>,
    /// Payout record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payout_completed: Option<PayoutCompleted>,
    /// Cancel record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancel_completed: Option<CancelCompleted>,
}

impl TradeRecord {
    /// Returns true if `profile_pub_key` is the maker, the taker or the arbitrator.
    #[must_use]
    pub fn involves(&self, profile_pub_key: &str) -> bool {
        self.offer.maker_profile_pub_key() == Some(profile_pub_key)
            || self.trade_request.taker_profile_pub_key == profile_pub_key
            || self
                .trade_acceptance
                .as_ref()
                .is_some_and(|a| a.arbitrator_profile_pub_key == profile_pub_key)
    }

    /// Converts into a trade with an underived status.
    #[must_use]
    pub fn into_trade(self) -> Trade {
        Trade::from_parts(
            self.id,
            self.escrow_address,
            self.version,
            self.created_timestamp,
            self.offer,
            self.trade_request,
            self.trade_acceptance,
            self.payment_request,
            self.payout_request,
            self.arbitrate_request,
            self.payout_completed,
            self.cancel_completed,
        )
    }
}

impl From<&Trade> for TradeRecord {
    fn from(trade: &Trade) -> Self {
        Self {
            id: trade.id().clone(),
            escrow_address: trade.escrow_address().map(str::to_string),
            version: trade.version(),
            created_timestamp: trade.created_timestamp(),
            offer: trade.offer().clone(),
            trade_request: trade.trade_request().clone(),
            trade_acceptance: trade.trade_acceptance().cloned(),
            payment_request: trade.payment_request().cloned(),
            payout_request: trade.payout_request().cloned(),
            arbitrate_request: trade.arbitrate_request().copied(),
            payout_completed: trade.payout_completed().cloned(),
            cancel_completed: trade.cancel_completed().cloned(),
        }
    }
}
