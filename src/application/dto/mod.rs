//! # Data Transfer Objects
//!
//! Wire formats exchanged with the remote trade service.

pub mod trade_record;

pub use trade_record::TradeRecord;
