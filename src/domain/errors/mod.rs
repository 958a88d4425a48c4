//! # Domain Errors
//!
//! Typed error types for domain operations.
//!
//! Error codes are organized by category:
//! - 1000-1999: Validation errors
//! - 2000-2999: State errors
//! - 3000-3999: Identity errors
//!
//! # Examples
//!
//! ```
//! use escrow_trade::domain::errors::{DomainError, DomainResult};
//!
//! fn require_key(key: Option<&str>) -> DomainResult<&str> {
//!     key.ok_or_else(|| DomainError::MissingOfferData("maker escrow key".to_string()))
//! }
//!
//! assert!(require_key(None).is_err());
//! ```

pub mod domain_error;

pub use domain_error::{DomainError, DomainResult};
