//! # Persistence
//!
//! [`TradeStore`](crate::application::ports::TradeStore) implementations.
//!
//! - [`InMemoryTradeStore`]: tests and ephemeral runs
//! - [`FileTradeStore`]: one JSON snapshot per trade, atomically replaced

pub mod file_trade_store;
pub mod in_memory_trade_store;

pub use file_trade_store::FileTradeStore;
pub use in_memory_trade_store::InMemoryTradeStore;
