//! # Identity Value Objects
//!
//! Type-safe identity wrappers for domain identifiers.
//!
//! - [`OfferId`]: UUID assigned when a maker publishes a listing
//! - [`TradeId`]: content hash of the offer and trade request terms
//!
//! A trade id is never generated randomly. Two takers (or one taker retrying)
//! on the same terms produce the same id, which collapses duplicate requests
//! and lets any principal detect a record whose terms were altered.

use crate::domain::errors::{DomainError, DomainResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use uuid::Uuid;

/// Offer identifier.
///
/// # Examples
///
/// ```
/// use escrow_trade::domain::value_objects::ids::OfferId;
///
/// let offer_id = OfferId::new_v4();
/// println!("Offer: {}", offer_id);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OfferId(Uuid);

impl OfferId {
    /// Creates an offer ID from an existing UUID.
    #[inline]
    #[must_use]
    pub const fn new(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Generates a new random offer ID using UUID v4.
    #[must_use]
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the inner UUID value.
    #[inline]
    #[must_use]
    pub const fn get(self) -> Uuid {
        self.0
    }
}

impl fmt::Display for OfferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl From<Uuid> for OfferId {
    #[inline]
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Trade identifier: lowercase hex SHA-256 over the trade's terms.
///
/// # Examples
///
/// ```
/// use escrow_trade::domain::value_objects::ids::TradeId;
///
/// let a = TradeId::from_terms(&["offer", "taker-key", "escrow-key", "0.50000000", "15000.00"]);
/// let b = TradeId::from_terms(&["offer", "taker-key", "escrow-key", "0.50000000", "15000.00"]);
/// assert_eq!(a, b);
/// assert_eq!(a.as_str().len(), 64);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TradeId(String);

impl TradeId {
    /// Length of the hex encoding.
    pub const HEX_LEN: usize = 64;

    /// Hashes the given terms in order.
    ///
    /// Each term is prefixed with its byte length so that no two different
    /// term lists produce the same preimage.
    #[must_use]
    pub fn from_terms(terms: &[&str]) -> Self {
        let mut hasher = Sha256::new();
        for term in terms {
            hasher.update((term.len() as u64).to_be_bytes());
            hasher.update(term.as_bytes());
        }
        Self(hex::encode(hasher.finalize()))
    }

    /// Parses a hex-encoded trade id.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidId` unless the input is 64 hex digits.
    pub fn parse(value: impl Into<String>) -> DomainResult<Self> {
        let value = value.into().to_ascii_lowercase();
        if value.len() != Self::HEX_LEN || !value.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(DomainError::InvalidId(format!(
                "trade id must be {} hex digits: {value}",
                Self::HEX_LEN
            )));
        }
        Ok(Self(value))
    }

    /// Returns the hex encoding.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First eight hex digits, for log lines.
    #[must_use]
    pub fn short(&self) -> &str {
        self.0.get(..8).unwrap_or(&self.0)
    }
}

impl fmt::Display for TradeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for TradeId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<TradeId> for String {
    fn from(id: TradeId) -> Self {
        id.0
    }
}
