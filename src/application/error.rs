//! # Application Errors
//!
//! Error taxonomy surfaced by protocols, the reconciliation engine and user
//! actions.
//!
//! Domain errors are folded into the taxonomy where a matching variant exists
//! so callers can branch on one enum. Port errors (wallet, trade service,
//! trade store) convert through `From` impls.
//!
//! # Error Codes
//!
//! | Range | Category |
//! |-------|----------|
//! | 4000-4099 | Request validation |
//! | 4100-4199 | Escrow funding |
//! | 4200-4299 | Protocol state |
//! | 4300-4399 | Remote store |
//! | 4400-4499 | Local infrastructure |
//!
//! Wrapped domain errors keep their own 1000-3999 codes.

use crate::application::ports::{ServiceError, StoreError, WalletError};
use crate::application::services::retry::Retryable;
use crate::domain::errors::DomainError;
use crate::domain::value_objects::BtcAmount;
use thiserror::Error;

/// Application layer error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApplicationError {
    /// Request validation failed.
    #[error("validation error: {0}")]
    Validation(String),

    /// No local copy of the trade exists.
    #[error("trade not found: {0}")]
    TradeNotFound(String),

    /// The offer lacks a key needed to build the escrow.
    #[error("missing offer data: {0}")]
    MissingOfferData(String),

    /// The wallet cannot cover the escrow amount.
    #[error("insufficient funds: need {needed} BTC, have {available} BTC")]
    InsufficientFunds {
        /// Amount required.
        needed: BtcAmount,
        /// Amount spendable.
        available: BtcAmount,
    },

    /// The escrow has no confirmed funding transaction.
    #[error("escrow not funded for trade {0}")]
    NotFunded(String),

    /// The local principal has no role, or the wrong role, for the action.
    #[error("invalid role: {0}")]
    InvalidRole(String),

    /// Action not permitted in the trade's current status.
    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    /// The trade's facts are corrupt, tampered or regress its status.
    #[error("invalid trade state: {0}")]
    InvalidTradeState(String),

    /// The remote store holds a newer version than the one submitted.
    #[error("remote write conflict on trade {id}: submitted v{submitted}, current v{current}")]
    RemoteWriteConflict {
        /// Trade id.
        id: String,
        /// Version sent with the write.
        submitted: u64,
        /// Version held by the store.
        current: u64,
    },

    /// The remote store could not be reached.
    #[error("network failure: {0}")]
    NetworkFailure(String),

    /// Wallet operation failed.
    #[error("wallet error: {0}")]
    Wallet(String),

    /// Local trade storage failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// Domain error without a more specific mapping.
    #[error("domain error: {0}")]
    Domain(DomainError),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApplicationError {
    /// Creates a validation error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Creates a not funded error.
    #[must_use]
    pub fn not_funded(trade_id: impl ToString) -> Self {
        Self::NotFunded(trade_id.to_string())
    }

    /// Creates an invalid role error.
    #[must_use]
    pub fn invalid_role(message: impl Into<String>) -> Self {
        Self::InvalidRole(message.into())
    }

    /// Creates a network failure error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::NetworkFailure(message.into())
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns the numeric error code.
    #[must_use]
    pub const fn code(&self) -> u16 {
        match self {
            Self::Validation(_) => 4000,
            Self::MissingOfferData(_) => 4001,
            Self::TradeNotFound(_) => 4002,
            Self::InsufficientFunds { .. } => 4101,
            Self::NotFunded(_) => 4102,
            Self::InvalidRole(_) => 4201,
            Self::InvalidTransition(_) => 4202,
            Self::InvalidTradeState(_) => 4203,
            Self::RemoteWriteConflict { .. } => 4301,
            Self::NetworkFailure(_) => 4302,
            Self::Wallet(_) => 4401,
            Self::Storage(_) => 4402,
            Self::Domain(err) => err.code(),
            Self::Internal(_) => 4999,
        }
    }

    /// Returns true if the error marks the trade record itself as unusable.
    #[inline]
    #[must_use]
    pub const fn is_invalid_trade_state(&self) -> bool {
        matches!(self, Self::InvalidTradeState(_))
    }
}

impl From<DomainError> for ApplicationError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::MissingOfferData(msg) => Self::MissingOfferData(msg),
            DomainError::InvalidRole(msg) => Self::InvalidRole(msg),
            DomainError::InvalidTransition { .. } => Self::InvalidTransition(err.to_string()),
            DomainError::InvalidTradeState { .. }
            | DomainError::TamperedTrade { .. }
            | DomainError::StatusRegression { .. } => Self::InvalidTradeState(err.to_string()),
            other => Self::Domain(other),
        }
    }
}

impl From<WalletError> for ApplicationError {
    fn from(err: WalletError) -> Self {
        match err {
            WalletError::InsufficientFunds { needed, available } => {
                Self::InsufficientFunds { needed, available }
            }
            other => Self::Wallet(other.to_string()),
        }
    }
}

impl From<ServiceError> for ApplicationError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Conflict {
                id,
                submitted,
                current,
            } => Self::RemoteWriteConflict {
                id,
                submitted,
                current,
            },
            ServiceError::Network(msg) => Self::NetworkFailure(msg),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<StoreError> for ApplicationError {
    fn from(err: StoreError) -> Self {
        Self::Storage(err.to_string())
    }
}

impl Retryable for ApplicationError {
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NetworkFailure(_) | Self::RemoteWriteConflict { .. }
        )
    }
}

/// Result type for application operations.
pub type ApplicationResult<T> = Result<T, ApplicationError>;
