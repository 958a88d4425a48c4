//! # Simulated Chain
//!
//! An in-process ledger standing in for the Bitcoin network.
//!
//! The chain tracks address balances and 2-of-3 escrows. Transactions enter
//! a mempool at depth 0 and are confirmed by [`SimulatedChain::mine_block`].
//! Every broadcast and every confirmation of an escrow transaction is
//! published as a [`WalletEvent`].
//!
//! # Examples
//!
//! ```
//! use escrow_trade::infrastructure::wallet::SimulatedChain;
//! use escrow_trade::domain::value_objects::BtcAmount;
//! use rust_decimal_macros::dec;
//!
//! # async fn example() {
//! let chain = SimulatedChain::new();
//! chain.credit("addr", BtcAmount::new(dec!(1)).unwrap()).await;
//! assert_eq!(chain.mine_block().await, 1);
//! # }
//! ```

use crate::application::ports::{WalletError, WalletEvent, WalletResult};
use crate::domain::value_objects::{BtcAmount, TransactionWithAmt};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{RwLock, broadcast};
use tracing::debug;
use uuid::Uuid;

const EVENT_CAPACITY: usize = 256;

/// Escrow keys in derivation order: arbitrator, maker escrow, taker escrow.
pub type EscrowKeys = [String; 3];

#[derive(Debug, Clone)]
struct ChainTx {
    amount: BtcAmount,
    confirmed_at: Option<u64>,
}

#[derive(Debug, Default)]
struct Escrow {
    keys: Option<EscrowKeys>,
    balance: BtcAmount,
    spent: bool,
    transactions: HashMap<String, ChainTx>,
}

#[derive(Debug, Default)]
struct ChainState {
    height: u64,
    balances: HashMap<String, BtcAmount>,
    escrows: HashMap<String, Escrow>,
}

impl ChainState {
    fn depth(&self, tx: &ChainTx) -> u32 {
        tx.confirmed_at.map_or(0, |at| {
            u32::try_from(self.height.saturating_sub(at).saturating_add(1)).unwrap_or(u32::MAX)
        })
    }

    fn observation(&self, hash: &str, tx: &ChainTx) -> TransactionWithAmt {
        TransactionWithAmt::new(hash, tx.amount, self.depth(tx))
    }
}

/// Shared simulated ledger. Clones share state.
#[derive(Debug, Clone)]
pub struct SimulatedChain {
    state: Arc<RwLock<ChainState>>,
    events: broadcast::Sender<WalletEvent>,
}

impl Default for SimulatedChain {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedChain {
    /// Creates an empty chain at height 0.
    #[must_use]
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: Arc::new(RwLock::new(ChainState::default())),
            events,
        }
    }

    /// Derives the escrow address for three keys.
    #[must_use]
    pub fn escrow_address_for(keys: &EscrowKeys) -> String {
        let mut hasher = Sha256::new();
        for key in keys {
            hasher.update((key.len() as u64).to_be_bytes());
            hasher.update(key.as_bytes());
        }
        let digest = hex::encode(hasher.finalize());
        format!("2of3-{}", &digest[..40])
    }

    /// Subscribes to escrow transaction events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<WalletEvent> {
        self.events.subscribe()
    }

    /// Adds coins to an address out of thin air.
    pub async fn credit(&self, address: &str, amount: BtcAmount) {
        let mut state = self.state.write().await;
        let balance = state.balances.entry(address.to_string()).or_insert(BtcAmount::ZERO);
        *balance = balance.checked_add(amount).unwrap_or(*balance);
    }

    /// Spendable balance of an address.
    pub async fn balance(&self, address: &str) -> BtcAmount {
        self.state
            .read()
            .await
            .balances
            .get(address)
            .copied()
            .unwrap_or(BtcAmount::ZERO)
    }

    /// Current block height.
    pub async fn height(&self) -> u64 {
        self.state.read().await.height
    }

    /// Confirms every mempool transaction and deepens confirmed ones.
    ///
    /// Returns the new height.
    pub async fn mine_block(&self) -> u64 {
        let mut events = Vec::new();
        let height = {
            let mut state = self.state.write().await;
            state.height = state.height.saturating_add(1);
            let height = state.height;
            for escrow in state.escrows.values_mut() {
                for tx in escrow.transactions.values_mut() {
                    tx.confirmed_at.get_or_insert(height);
                }
            }
            for (address, escrow) in &state.escrows {
                for (hash, tx) in &escrow.transactions {
                    events.push(WalletEvent {
                        escrow_address: address.clone(),
                        transaction: state.observation(hash, tx),
                    });
                }
            }
            height
        };
        debug!(height, events = events.len(), "block mined");
        for event in events {
            // No subscribers is fine.
            let _ = self.events.send(event);
        }
        height
    }

    /// Records the keys behind an escrow address.
    pub(crate) async fn register_escrow(&self, address: &str, keys: EscrowKeys) {
        let mut state = self.state.write().await;
        let escrow = state.escrows.entry(address.to_string()).or_default();
        escrow.keys.get_or_insert(keys);
    }

    /// Keys behind an escrow address, if registered.
    pub(crate) async fn escrow_keys(&self, address: &str) -> Option<EscrowKeys> {
        self.state
            .read()
            .await
            .escrows
            .get(address)
            .and_then(|e| e.keys.clone())
    }

    /// Moves `amount` from `from` into the escrow.
    pub(crate) async fn fund_escrow(
        &self,
        from: &str,
        escrow_address: &str,
        amount: BtcAmount,
    ) -> WalletResult<TransactionWithAmt> {
        let observation = {
            let mut state = self.state.write().await;
            let available = state.balances.get(from).copied().unwrap_or(BtcAmount::ZERO);
            let remaining = available
                .checked_sub(amount)
                .ok_or(WalletError::InsufficientFunds {
                    needed: amount,
                    available,
                })?;
            let escrow = state
                .escrows
                .get_mut(escrow_address)
                .ok_or_else(|| WalletError::UnknownAddress(escrow_address.to_string()))?;
            if escrow.spent {
                return Err(WalletError::NotSpendable(format!(
                    "{escrow_address} already released"
                )));
            }
            let hash = new_tx_hash();
            let tx = ChainTx {
                amount,
                confirmed_at: None,
            };
            escrow.balance = escrow.balance.checked_add(amount).unwrap_or(escrow.balance);
            escrow.transactions.insert(hash.clone(), tx.clone());
            state.balances.insert(from.to_string(), remaining);
            state.observation(&hash, &tx)
        };
        self.publish(escrow_address, &observation);
        Ok(observation)
    }

    /// Releases the whole escrow balance, less `fee`, to `to`.
    pub(crate) async fn release_escrow(
        &self,
        escrow_address: &str,
        to: &str,
        fee: BtcAmount,
    ) -> WalletResult<TransactionWithAmt> {
        let observation = {
            let mut state = self.state.write().await;
            let escrow = state
                .escrows
                .get_mut(escrow_address)
                .ok_or_else(|| WalletError::UnknownAddress(escrow_address.to_string()))?;
            if escrow.spent {
                return Err(WalletError::NotSpendable(format!(
                    "{escrow_address} already released"
                )));
            }
            if escrow.balance.is_zero() {
                return Err(WalletError::NotSpendable(format!("{escrow_address} is empty")));
            }
            let amount = escrow.balance.checked_sub(fee).unwrap_or(BtcAmount::ZERO);
            let hash = new_tx_hash();
            let tx = ChainTx {
                amount,
                confirmed_at: None,
            };
            escrow.balance = BtcAmount::ZERO;
            escrow.spent = true;
            escrow.transactions.insert(hash.clone(), tx.clone());
            let balance = state.balances.entry(to.to_string()).or_insert(BtcAmount::ZERO);
            *balance = balance.checked_add(amount).unwrap_or(*balance);
            state.observation(&hash, &tx)
        };
        self.publish(escrow_address, &observation);
        Ok(observation)
    }

    /// Looks up a transaction on an escrow.
    pub(crate) async fn transaction(
        &self,
        escrow_address: &str,
        tx_hash: &str,
    ) -> Option<TransactionWithAmt> {
        let state = self.state.read().await;
        let tx = state.escrows.get(escrow_address)?.transactions.get(tx_hash)?;
        Some(state.observation(tx_hash, tx))
    }

    fn publish(&self, escrow_address: &str, transaction: &TransactionWithAmt) {
        let _ = self.events.send(WalletEvent {
            escrow_address: escrow_address.to_string(),
            transaction: transaction.clone(),
        });
    }
}

fn new_tx_hash() -> String {
    hex::encode(Sha256::digest(Uuid::new_v4().as_bytes()))
}
