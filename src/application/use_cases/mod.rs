//! # Use Cases
//!
//! User-facing workflows. Each one runs a protocol action on the local
//! copy of a trade and commits the result through the engine.

pub mod trade_actions;

pub use trade_actions::TradeActions;
