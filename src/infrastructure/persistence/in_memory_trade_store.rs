//! # In-Memory Trade Store
//!
//! [`TradeStore`] backed by a `HashMap`, for tests and ephemeral runs.
//!
//! # Examples
//!
//! ```
//! use escrow_trade::infrastructure::persistence::InMemoryTradeStore;
//!
//! let store = InMemoryTradeStore::new();
//! assert!(store.is_empty());
//! ```

use crate::application::ports::{StoreResult, TradeStore};
use crate::domain::entities::Trade;
use crate::domain::value_objects::TradeId;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory implementation of [`TradeStore`].
///
/// Stores snapshots as they would round-trip through serialization: the
/// local role and transaction observations are not kept.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTradeStore {
    storage: Arc<RwLock<HashMap<TradeId, Trade>>>,
}

impl InMemoryTradeStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored trades.
    #[must_use]
    pub fn len(&self) -> usize {
        self.storage
            .try_read()
            .map(|guard| guard.len())
            .unwrap_or(0)
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl TradeStore for InMemoryTradeStore {
    async fn read(&self, id: &TradeId) -> StoreResult<Option<Trade>> {
        Ok(self.storage.read().await.get(id).cloned())
    }

    async fn write(&self, trade: &Trade) -> StoreResult<Trade> {
        let stored = trade.to_snapshot();
        self.storage
            .write()
            .await
            .insert(stored.id().clone(), stored.clone());
        Ok(stored)
    }

    async fn all(&self) -> StoreResult<Vec<Trade>> {
        Ok(self.storage.read().await.values().cloned().collect())
    }
}
