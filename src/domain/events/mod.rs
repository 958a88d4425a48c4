//! # Domain Events
//!
//! Events emitted when the local copy of a trade changes.
//!
//! - `Loaded`: Trade read from local storage at startup
//! - `Updated`: Trade persisted after a reconciliation pass or user action

pub mod trade_events;

pub use trade_events::TradeEvent;
