//! # Trade Store Port
//!
//! Local persistence of the principal's own trade snapshots.

use crate::domain::entities::Trade;
use crate::domain::value_objects::TradeId;
use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

/// Local storage failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Filesystem or backend failure.
    #[error("io error: {0}")]
    Io(String),

    /// A stored snapshot could not be decoded.
    #[error("corrupt snapshot {id}: {reason}")]
    Corrupt {
        /// File or key of the snapshot.
        id: String,
        /// Decode failure.
        reason: String,
    },

    /// A snapshot could not be encoded.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result type for trade store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Local trade snapshots, keyed by trade id.
#[async_trait]
pub trait TradeStore: Send + Sync + fmt::Debug {
    /// Reads a snapshot.
    async fn read(&self, id: &TradeId) -> StoreResult<Option<Trade>>;

    /// Atomically replaces the snapshot for `trade.id()`, returning what was stored.
    async fn write(&self, trade: &Trade) -> StoreResult<Trade>;

    /// Reads every snapshot.
    async fn all(&self) -> StoreResult<Vec<Trade>>;
}
