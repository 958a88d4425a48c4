//! # Transaction Observations
//!
//! What the wallet currently reports about an escrow transaction.

use crate::domain::value_objects::amounts::BtcAmount;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A transaction touching an escrow address, as last observed on chain.
///
/// Observations are never part of the shared trade record; each principal
/// re-queries its own wallet on every reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionWithAmt {
    tx_hash: String,
    btc_amount: BtcAmount,
    depth: u32,
}

impl TransactionWithAmt {
    /// Creates an observation.
    #[must_use]
    pub fn new(tx_hash: impl Into<String>, btc_amount: BtcAmount, depth: u32) -> Self {
        Self {
            tx_hash: tx_hash.into(),
            btc_amount,
            depth,
        }
    }

    /// Transaction hash.
    #[inline]
    #[must_use]
    pub fn tx_hash(&self) -> &str {
        &self.tx_hash
    }

    /// Amount moved into (funding) or out of (payout) the escrow.
    #[inline]
    #[must_use]
    pub fn btc_amount(&self) -> BtcAmount {
        self.btc_amount
    }

    /// Confirmation depth; zero while in the mempool.
    #[inline]
    #[must_use]
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Returns true once the transaction has at least one confirmation.
    #[inline]
    #[must_use]
    pub fn is_confirmed(&self) -> bool {
        self.depth > 0
    }
}

impl fmt::Display for TransactionWithAmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} BTC, depth {})", self.tx_hash, self.btc_amount, self.depth)
    }
}
