//! # Wallet Port
//!
//! Everything the protocols need from a Bitcoin wallet holding an escrow key.

use crate::domain::entities::Trade;
use crate::domain::value_objects::{BtcAmount, TransactionWithAmt};
use async_trait::async_trait;
use std::fmt;
use thiserror::Error;
use tokio::sync::broadcast;

/// Wallet failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WalletError {
    /// Spendable balance is below the requested amount.
    #[error("insufficient funds: need {needed}, have {available}")]
    InsufficientFunds {
        /// Amount required.
        needed: BtcAmount,
        /// Amount spendable.
        available: BtcAmount,
    },

    /// The address is not an escrow this wallet knows.
    #[error("unknown escrow address: {0}")]
    UnknownAddress(String),

    /// A signature needed to release the escrow is missing.
    #[error("missing signature: {0}")]
    MissingSignature(String),

    /// The escrow cannot be spent in its current on-chain state.
    #[error("escrow not spendable: {0}")]
    NotSpendable(String),

    /// Backend failure.
    #[error("wallet backend error: {0}")]
    Backend(String),
}

/// Result type for wallet operations.
pub type WalletResult<T> = Result<T, WalletError>;

/// A change in a watched escrow transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletEvent {
    /// Escrow address the transaction touches.
    pub escrow_address: String,
    /// Latest observation of the transaction.
    pub transaction: TransactionWithAmt,
}

/// Wallet holding the local principal's escrow key.
#[async_trait]
pub trait Wallet: Send + Sync + fmt::Debug {
    /// Derives the 2-of-3 escrow address for the three keys.
    async fn escrow_address(
        &self,
        arbitrator_profile_pub_key: &str,
        maker_escrow_pub_key: &str,
        taker_escrow_pub_key: &str,
    ) -> WalletResult<String>;

    /// Returns the local escrow public key.
    async fn escrow_pub_key(&self) -> WalletResult<String>;

    /// Returns an address for receiving refunds or payouts.
    async fn deposit_address(&self) -> WalletResult<String>;

    /// Starts reporting transactions on `escrow_address`.
    async fn watch_escrow_address(&self, escrow_address: &str) -> WalletResult<()>;

    /// Broadcasts a transaction moving `amount` into the escrow.
    async fn fund_escrow(
        &self,
        escrow_address: &str,
        amount: BtcAmount,
    ) -> WalletResult<TransactionWithAmt>;

    /// Looks up a transaction on the escrow.
    async fn escrow_transaction(
        &self,
        escrow_address: &str,
        tx_hash: &str,
    ) -> WalletResult<Option<TransactionWithAmt>>;

    /// Signs the seller's share of the refund transaction.
    async fn refund_signature(
        &self,
        trade: &Trade,
        funding_tx_hash: &str,
        refund_address: &str,
    ) -> WalletResult<String>;

    /// Signs the buyer's share of the payout transaction.
    async fn payout_signature(&self, trade: &Trade, funding_tx_hash: &str) -> WalletResult<String>;

    /// Completes and broadcasts the payout to the buyer, returning its hash.
    async fn payout_escrow_to_buyer(&self, trade: &Trade) -> WalletResult<String>;

    /// Completes and broadcasts the refund to the seller, returning its hash.
    async fn refund_escrow_to_seller(&self, trade: &Trade) -> WalletResult<String>;

    /// Fee rate used for escrow spends.
    fn default_tx_fee(&self) -> BtcAmount;

    /// Subscribes to changes on watched escrows.
    fn subscribe(&self) -> broadcast::Receiver<WalletEvent>;
}
