//! # Trade Locks
//!
//! Single-writer locks keyed by trade id.
//!
//! Every path that mutates a trade (poll reconciliation, wallet events and
//! user actions) holds the trade's lock from load to persist, so at most one
//! mutation per trade is in flight. Different trades never contend.

use crate::domain::value_objects::TradeId;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Guard held while mutating one trade.
pub type TradeGuard = OwnedMutexGuard<()>;

/// One async mutex per trade id, created on first use.
#[derive(Debug, Clone, Default)]
pub struct TradeLocks {
    locks: Arc<std::sync::Mutex<HashMap<TradeId, Arc<Mutex<()>>>>>,
}

impl TradeLocks {
    /// Creates an empty lock table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `id`.
    pub async fn acquire(&self, id: &TradeId) -> TradeGuard {
        self.lock_for(id).lock_owned().await
    }

    /// Takes exclusive access to `id` if nobody holds it.
    #[must_use]
    pub fn try_acquire(&self, id: &TradeId) -> Option<TradeGuard> {
        self.lock_for(id).try_lock_owned().ok()
    }

    /// Number of ids with a lock entry.
    #[must_use]
    pub fn len(&self) -> usize {
        self.locks.lock().map(|table| table.len()).unwrap_or(0)
    }

    /// Returns true if no lock has been created yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock_for(&self, id: &TradeId) -> Arc<Mutex<()>> {
        // The table lock is never held across an await.
        let mut table = match self.locks.lock() {
            Ok(table) => table,
            Err(poisoned) => poisoned.into_inner(),
        };
        Arc::clone(table.entry(id.clone()).or_default())
    }
}
