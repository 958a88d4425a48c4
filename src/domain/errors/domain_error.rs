//! # Domain Errors
//!
//! Typed domain error definitions.
//!
//! This module provides the [`DomainError`] enum for representing
//! domain-level errors with numeric error codes.
//!
//! # Error Code Ranges
//!
//! - **1000-1999**: Validation errors
//! - **2000-2999**: State errors
//! - **3000-3999**: Identity errors
//!
//! # Examples
//!
//! ```
//! use escrow_trade::domain::errors::DomainError;
//!
//! let error = DomainError::InvalidAmount("btc amount cannot be negative".to_string());
//! assert_eq!(error.code(), 1001);
//! ```

use crate::domain::value_objects::trade_status::TradeStatus;
use thiserror::Error;

/// Domain-level error with numeric error codes.
///
/// | Range | Category |
/// |-------|----------|
/// | 1000-1999 | Validation errors |
/// | 2000-2999 | State errors |
/// | 3000-3999 | Identity errors |
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    // ========================================================================
    // Validation Errors (1000-1999)
    // ========================================================================
    /// Invalid BTC or fiat amount.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// Offer lacks a key needed to build the escrow.
    #[error("missing offer data: {0}")]
    MissingOfferData(String),

    /// Invalid identifier.
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// Generic validation error.
    #[error("validation error: {0}")]
    ValidationError(String),

    // ========================================================================
    // State Errors (2000-2999)
    // ========================================================================
    /// The trade's fact set does not derive a well-defined status.
    #[error("invalid trade state for {trade_id}: {reason}")]
    InvalidTradeState {
        /// Trade the facts belong to.
        trade_id: String,
        /// What is inconsistent.
        reason: String,
    },

    /// Action not permitted in the trade's current status.
    #[error("cannot {action} while trade is {from}")]
    InvalidTransition {
        /// Status at the time of the attempt.
        from: TradeStatus,
        /// Attempted action.
        action: String,
    },

    /// A fact is already present with a different value.
    #[error("conflicting {fact} on trade {trade_id}")]
    FactConflict {
        /// Trade the fact belongs to.
        trade_id: String,
        /// Name of the fact.
        fact: &'static str,
    },

    /// Re-derivation moved the status backwards.
    #[error("status regression on trade {trade_id}: {from} -> {to}")]
    StatusRegression {
        /// Trade the status belongs to.
        trade_id: String,
        /// Previously derived status.
        from: TradeStatus,
        /// Newly derived status.
        to: TradeStatus,
    },

    // ========================================================================
    // Identity Errors (3000-3999)
    // ========================================================================
    /// The principal has no role, or the wrong role, for the operation.
    #[error("invalid role: {0}")]
    InvalidRole(String),

    /// The trade id does not match the hash of its terms.
    #[error("trade {claimed} does not match its terms (expected {computed})")]
    TamperedTrade {
        /// Id carried by the record.
        claimed: String,
        /// Id computed from offer and trade request.
        computed: String,
    },
}

impl DomainError {
    /// Returns the numeric error code.
    ///
    /// # Examples
    ///
    /// ```
    /// use escrow_trade::domain::errors::DomainError;
    ///
    /// assert_eq!(DomainError::InvalidAmount("x".to_string()).code(), 1001);
    /// assert_eq!(DomainError::InvalidRole("x".to_string()).code(), 3001);
    /// ```
    #[must_use]
    pub const fn code(&self) -> u16 {
        match self {
            // Validation errors (1000-1999)
            Self::InvalidAmount(_) => 1001,
            Self::MissingOfferData(_) => 1002,
            Self::InvalidId(_) => 1003,
            Self::ValidationError(_) => 1099,

            // State errors (2000-2999)
            Self::InvalidTradeState { .. } => 2001,
            Self::InvalidTransition { .. } => 2002,
            Self::FactConflict { .. } => 2003,
            Self::StatusRegression { .. } => 2004,

            // Identity errors (3000-3999)
            Self::InvalidRole(_) => 3001,
            Self::TamperedTrade { .. } => 3002,
        }
    }

    /// Returns the error category name.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self.code() {
            1000..=1999 => "validation",
            2000..=2999 => "state",
            3000..=3999 => "identity",
            _ => "unknown",
        }
    }

    /// Returns true if this is a validation error.
    #[inline]
    #[must_use]
    pub const fn is_validation_error(&self) -> bool {
        matches!(self.code(), 1000..=1999)
    }

    /// Returns true if this is a state error.
    #[inline]
    #[must_use]
    pub const fn is_state_error(&self) -> bool {
        matches!(self.code(), 2000..=2999)
    }

    /// Returns true if the record should be treated as corrupt or tampered.
    #[inline]
    #[must_use]
    pub const fn is_corrupt_record(&self) -> bool {
        matches!(
            self,
            Self::InvalidTradeState { .. } | Self::TamperedTrade { .. }
        )
    }

    /// Creates an invalid trade state error.
    #[must_use]
    pub fn invalid_trade_state(trade_id: impl ToString, reason: impl Into<String>) -> Self {
        Self::InvalidTradeState {
            trade_id: trade_id.to_string(),
            reason: reason.into(),
        }
    }

    /// Creates an invalid transition error.
    #[must_use]
    pub fn invalid_transition(from: TradeStatus, action: impl Into<String>) -> Self {
        Self::InvalidTransition {
            from,
            action: action.into(),
        }
    }
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_fall_in_category_ranges() {
        let errors = [
            DomainError::InvalidAmount("a".to_string()),
            DomainError::MissingOfferData("b".to_string()),
            DomainError::invalid_trade_state("t", "orphan fact"),
            DomainError::invalid_transition(TradeStatus::Created, "send payment"),
            DomainError::InvalidRole("c".to_string()),
        ];
        let categories: Vec<_> = errors.iter().map(DomainError::category).collect();
        assert_eq!(
            categories,
            ["validation", "validation", "state", "state", "identity"]
        );
    }

    #[test]
    fn invalid_transition_message() {
        let err = DomainError::invalid_transition(TradeStatus::Funding, "confirm payment");
        assert_eq!(err.to_string(), "cannot confirm payment while trade is FUNDING");
    }

    #[test]
    fn corrupt_record_classification() {
        assert!(DomainError::invalid_trade_state("t", "x").is_corrupt_record());
        assert!(
            DomainError::TamperedTrade {
                claimed: "a".to_string(),
                computed: "b".to_string(),
            }
            .is_corrupt_record()
        );
        assert!(!DomainError::InvalidRole("x".to_string()).is_corrupt_record());
    }
}
