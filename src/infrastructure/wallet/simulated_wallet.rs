//! # Simulated Wallet
//!
//! [`Wallet`] implementation over a [`SimulatedChain`].
//!
//! Each wallet holds one escrow key and one deposit address. Signatures are
//! SHA-256 commitments over the signer key, escrow address, funding
//! transaction, purpose and destination, so a co-signer can check them
//! without any shared secret. Releasing an escrow needs the counterparty's
//! commitment plus the local key, and the two keys must differ.

use crate::application::ports::{Wallet, WalletError, WalletEvent, WalletResult};
use crate::domain::entities::Trade;
use crate::domain::value_objects::{BtcAmount, OfferType, TransactionWithAmt};
use crate::infrastructure::wallet::simulated_chain::SimulatedChain;
use async_trait::async_trait;
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use tokio::sync::{RwLock, broadcast};
use tracing::{debug, info};
use uuid::Uuid;

const REFUND: &str = "refund";
const PAYOUT: &str = "payout";

/// Default fee per kilobyte for escrow spends: 10 000 sats.
fn default_fee() -> BtcAmount {
    BtcAmount::new(Decimal::new(1, 4)).unwrap_or(BtcAmount::ZERO)
}

/// A single principal's wallet on the simulated chain.
#[derive(Debug)]
pub struct SimulatedWallet {
    chain: SimulatedChain,
    escrow_pub_key: String,
    address: String,
    tx_fee: BtcAmount,
    watched: RwLock<HashSet<String>>,
}

impl SimulatedWallet {
    /// Creates a wallet with a fresh deposit address.
    #[must_use]
    pub fn new(chain: SimulatedChain, escrow_pub_key: impl Into<String>) -> Self {
        Self {
            chain,
            escrow_pub_key: escrow_pub_key.into(),
            address: format!("sim-deposit-{}", Uuid::new_v4().simple()),
            tx_fee: default_fee(),
            watched: RwLock::new(HashSet::new()),
        }
    }

    /// Overrides the fee used for escrow spends.
    #[must_use]
    pub fn with_tx_fee(mut self, tx_fee: BtcAmount) -> Self {
        self.tx_fee = tx_fee;
        self
    }

    /// The wallet's deposit address.
    #[inline]
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Returns the chain this wallet transacts on.
    #[inline]
    #[must_use]
    pub fn chain(&self) -> &SimulatedChain {
        &self.chain
    }

    /// Returns true if `escrow_address` is being watched.
    pub async fn is_watching(&self, escrow_address: &str) -> bool {
        self.watched.read().await.contains(escrow_address)
    }

    fn commitment(
        signer: &str,
        escrow_address: &str,
        funding_tx_hash: &str,
        purpose: &str,
        destination: &str,
    ) -> String {
        let mut hasher = Sha256::new();
        for part in [signer, escrow_address, funding_tx_hash, purpose, destination] {
            hasher.update((part.len() as u64).to_be_bytes());
            hasher.update(part.as_bytes());
        }
        hex::encode(hasher.finalize())
    }

    fn sign(&self, escrow_address: &str, funding_tx_hash: &str, purpose: &str, destination: &str) -> String {
        Self::commitment(
            &self.escrow_pub_key,
            escrow_address,
            funding_tx_hash,
            purpose,
            destination,
        )
    }

    fn seller_escrow_key(trade: &Trade) -> Option<&str> {
        match trade.offer().offer_type() {
            OfferType::Sell => trade.maker_escrow_pub_key(),
            OfferType::Buy => Some(trade.trade_request().taker_escrow_pub_key.as_str()),
        }
    }

    fn buyer_escrow_key(trade: &Trade) -> Option<&str> {
        match trade.offer().offer_type() {
            OfferType::Sell => Some(trade.trade_request().taker_escrow_pub_key.as_str()),
            OfferType::Buy => trade.maker_escrow_pub_key(),
        }
    }

    fn require_escrow_address(trade: &Trade) -> WalletResult<&str> {
        trade.escrow_address().ok_or_else(|| {
            WalletError::UnknownAddress(format!("trade {} has no escrow address", trade.id()))
        })
    }

    fn require_funding_tx(trade: &Trade) -> WalletResult<&str> {
        trade.funding_tx_hash().ok_or_else(|| {
            WalletError::NotSpendable(format!("trade {} has no funding transaction", trade.id()))
        })
    }

    /// Checks the local key can co-sign alongside `counterparty`.
    async fn require_cosigner(&self, escrow_address: &str, counterparty: &str) -> WalletResult<()> {
        let keys = self
            .chain
            .escrow_keys(escrow_address)
            .await
            .ok_or_else(|| WalletError::UnknownAddress(escrow_address.to_string()))?;
        if !keys.contains(&self.escrow_pub_key) {
            return Err(WalletError::MissingSignature(format!(
                "{} holds no key for {escrow_address}",
                self.escrow_pub_key
            )));
        }
        if self.escrow_pub_key == counterparty {
            return Err(WalletError::MissingSignature(
                "second signature must come from a different key".to_string(),
            ));
        }
        Ok(())
    }

    /// Verifies `signature` and releases the escrow to `destination`.
    async fn release(
        &self,
        trade: &Trade,
        signer: Option<&str>,
        signature: &str,
        purpose: &str,
        destination: &str,
        fee: BtcAmount,
    ) -> WalletResult<String> {
        let escrow_address = Self::require_escrow_address(trade)?;
        let funding_tx_hash = Self::require_funding_tx(trade)?;
        let signer = signer.ok_or_else(|| {
            WalletError::MissingSignature(format!("trade {} has no {purpose} signer", trade.id()))
        })?;
        self.require_cosigner(escrow_address, signer).await?;

        let expected = Self::commitment(signer, escrow_address, funding_tx_hash, purpose, destination);
        if expected != signature {
            return Err(WalletError::MissingSignature(format!(
                "invalid {purpose} signature for trade {}",
                trade.id()
            )));
        }
        let tx = self.chain.release_escrow(escrow_address, destination, fee).await?;
        info!(
            trade_id = %trade.id(),
            escrow_address,
            destination,
            tx_hash = tx.tx_hash(),
            purpose,
            "escrow released"
        );
        Ok(tx.tx_hash().to_string())
    }
}

#[async_trait]
impl Wallet for SimulatedWallet {
    async fn escrow_address(
        &self,
        arbitrator_profile_pub_key: &str,
        maker_escrow_pub_key: &str,
        taker_escrow_pub_key: &str,
    ) -> WalletResult<String> {
        let keys = [
            arbitrator_profile_pub_key.to_string(),
            maker_escrow_pub_key.to_string(),
            taker_escrow_pub_key.to_string(),
        ];
        let address = SimulatedChain::escrow_address_for(&keys);
        self.chain.register_escrow(&address, keys).await;
        Ok(address)
    }

    async fn escrow_pub_key(&self) -> WalletResult<String> {
        Ok(self.escrow_pub_key.clone())
    }

    async fn deposit_address(&self) -> WalletResult<String> {
        Ok(self.address.clone())
    }

    async fn watch_escrow_address(&self, escrow_address: &str) -> WalletResult<()> {
        if self.watched.write().await.insert(escrow_address.to_string()) {
            debug!(escrow_address, "watching escrow");
        }
        Ok(())
    }

    async fn fund_escrow(
        &self,
        escrow_address: &str,
        amount: BtcAmount,
    ) -> WalletResult<TransactionWithAmt> {
        let tx = self.chain.fund_escrow(&self.address, escrow_address, amount).await?;
        self.watch_escrow_address(escrow_address).await?;
        Ok(tx)
    }

    async fn escrow_transaction(
        &self,
        escrow_address: &str,
        tx_hash: &str,
    ) -> WalletResult<Option<TransactionWithAmt>> {
        Ok(self.chain.transaction(escrow_address, tx_hash).await)
    }

    async fn refund_signature(
        &self,
        trade: &Trade,
        funding_tx_hash: &str,
        refund_address: &str,
    ) -> WalletResult<String> {
        let escrow_address = Self::require_escrow_address(trade)?;
        Ok(self.sign(escrow_address, funding_tx_hash, REFUND, refund_address))
    }

    async fn payout_signature(&self, trade: &Trade, funding_tx_hash: &str) -> WalletResult<String> {
        let escrow_address = Self::require_escrow_address(trade)?;
        let payout_address = trade.buyer_payout_address().unwrap_or(&self.address);
        Ok(self.sign(escrow_address, funding_tx_hash, PAYOUT, payout_address))
    }

    async fn payout_escrow_to_buyer(&self, trade: &Trade) -> WalletResult<String> {
        let request = trade.payout_request().ok_or_else(|| {
            WalletError::MissingSignature(format!("trade {} has no payout request", trade.id()))
        })?;
        self.release(
            trade,
            Self::buyer_escrow_key(trade),
            &request.payout_tx_signature,
            PAYOUT,
            &request.payout_address,
            self.tx_fee,
        )
        .await
    }

    async fn refund_escrow_to_seller(&self, trade: &Trade) -> WalletResult<String> {
        let request = trade.payment_request().ok_or_else(|| {
            WalletError::MissingSignature(format!("trade {} has no payment request", trade.id()))
        })?;
        self.release(
            trade,
            Self::seller_escrow_key(trade),
            &request.refund_tx_signature,
            REFUND,
            &request.refund_address,
            request.tx_fee_per_kb,
        )
        .await
    }

    fn default_tx_fee(&self) -> BtcAmount {
        self.tx_fee
    }

    fn subscribe(&self) -> broadcast::Receiver<WalletEvent> {
        self.chain.subscribe()
    }
}
