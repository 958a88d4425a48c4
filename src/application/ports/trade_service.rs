//! # Trade Service Port
//!
//! The remote store all three principals publish trade records to.

use crate::application::dto::TradeRecord;
use crate::application::services::retry::Retryable;
use crate::domain::value_objects::TradeId;
use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

/// Remote store failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// The submitted version is not the stored one.
    #[error("version conflict on {id}: submitted {submitted}, current {current}")]
    Conflict {
        /// Trade id.
        id: String,
        /// Version sent with the write.
        submitted: u64,
        /// Version held by the store.
        current: u64,
    },

    /// Transport failure, timeout or server error.
    #[error("network error: {0}")]
    Network(String),

    /// The store refused the request.
    #[error("rejected with status {status}: {message}")]
    Rejected {
        /// HTTP-style status code.
        status: u16,
        /// Response body or reason.
        message: String,
    },

    /// The response could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),
}

impl Retryable for ServiceError {
    fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_))
    }
}

/// Result type for trade service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Versioned remote trade store.
///
/// Writes are compare-and-swap: a record is accepted only if its version
/// equals the stored version (0 when absent). The accepted record is stored
/// with the version incremented and returned.
#[async_trait]
pub trait TradeService: Send + Sync + fmt::Debug {
    /// Writes a record.
    async fn put(&self, record: TradeRecord) -> ServiceResult<TradeRecord>;

    /// Returns every record in which `profile_pub_key` participates.
    async fn get(&self, profile_pub_key: &str) -> ServiceResult<Vec<TradeRecord>>;

    /// Returns the latest record for `id`.
    async fn fetch(&self, id: &TradeId) -> ServiceResult<Option<TradeRecord>>;
}
