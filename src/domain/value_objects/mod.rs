//! # Value Objects
//!
//! Immutable types with validation and domain semantics.
//!
//! ## Identity Types
//!
//! - [`OfferId`]: UUID-based listing identifier
//! - [`TradeId`]: content hash of a trade's terms
//!
//! ## Numeric Types
//!
//! - [`BtcAmount`]: BTC scaled to 8 places
//! - [`FiatAmount`]: fiat scaled to its currency
//!
//! ## Domain Enums
//!
//! - [`Role`], [`OfferType`], [`CurrencyCode`], [`PaymentMethod`]
//! - [`ArbitrationReason`], [`PayoutReason`], [`CancelReason`]
//!
//! ## State Types
//!
//! - [`TradeStatus`]: escrow trade lifecycle
//! - [`TransactionWithAmt`]: on-chain observation of an escrow transaction

pub mod amounts;
pub mod enums;
pub mod ids;
pub mod trade_status;
pub mod transaction;

#[cfg(test)]
mod tests;

pub use amounts::{BTC_SCALE, BtcAmount, FiatAmount};
pub use enums::{
    ArbitrationReason, CancelReason, CurrencyCode, OfferType, ParseEnumError, PaymentMethod,
    PayoutReason, Role,
};
pub use ids::{OfferId, TradeId};
pub use trade_status::{InvalidTradeStatusError, TradeStatus};
pub use transaction::TransactionWithAmt;
