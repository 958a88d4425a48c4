//! # In-Memory Trade Service
//!
//! [`TradeService`] holding records in process, with the same
//! compare-and-swap semantics as the remote store. Several engines sharing
//! one instance behave like principals sharing a server.

use crate::application::dto::TradeRecord;
use crate::application::ports::{ServiceError, ServiceResult, TradeService};
use crate::domain::value_objects::TradeId;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing::debug;

/// In-memory implementation of [`TradeService`].
#[derive(Debug, Clone, Default)]
pub struct InMemoryTradeService {
    records: Arc<RwLock<HashMap<TradeId, TradeRecord>>>,
    offline: Arc<AtomicBool>,
    puts: Arc<AtomicU64>,
}

impl InMemoryTradeService {
    /// Creates an empty service.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// While offline every call fails with `ServiceError::Network`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of accepted writes.
    #[must_use]
    pub fn accepted_puts(&self) -> u64 {
        self.puts.load(Ordering::SeqCst)
    }

    /// Current record for `id`, bypassing the offline switch.
    pub async fn record(&self, id: &TradeId) -> Option<TradeRecord> {
        self.records.read().await.get(id).cloned()
    }

    fn check_online(&self) -> ServiceResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(ServiceError::Network("trade service unreachable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl TradeService for InMemoryTradeService {
    async fn put(&self, mut record: TradeRecord) -> ServiceResult<TradeRecord> {
        self.check_online()?;
        let mut records = self.records.write().await;
        let current = records.get(&record.id).map_or(0, |r| r.version);
        if record.version != current {
            return Err(ServiceError::Conflict {
                id: record.id.to_string(),
                submitted: record.version,
                current,
            });
        }
        record.version = current.saturating_add(1);
        records.insert(record.id.clone(), record.clone());
        self.puts.fetch_add(1, Ordering::SeqCst);
        debug!(trade_id = %record.id, version = record.version, "record stored");
        Ok(record)
    }

    async fn get(&self, profile_pub_key: &str) -> ServiceResult<Vec<TradeRecord>> {
        self.check_online()?;
        Ok(self
            .records
            .read()
            .await
            .values()
            .filter(|r| r.involves(profile_pub_key))
            .cloned()
            .collect())
    }

    async fn fetch(&self, id: &TradeId) -> ServiceResult<Option<TradeRecord>> {
        self.check_online()?;
        Ok(self.records.read().await.get(id).cloned())
    }
}
