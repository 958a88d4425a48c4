//! # Domain Entities
//!
//! ## Aggregates
//!
//! - [`Trade`]: Escrow trade with derived status and role
//!
//! ## Entities
//!
//! - [`Offer`]: Maker's listing embedded in a trade
//! - Trade facts: append-only records contributed by each principal

pub mod offer;
pub mod trade;
pub mod trade_facts;

#[cfg(test)]
pub(crate) mod test_support;
#[cfg(test)]
mod tests;

pub use offer::{Offer, OfferKeys};
pub use trade::Trade;
pub use trade_facts::{
    ArbitrateRequest, CancelCompleted, FactKind, PaymentRequest, PayoutCompleted, PayoutRequest,
    TradeAcceptance, TradeRequest,
};
