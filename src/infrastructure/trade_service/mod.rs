//! # Trade Service Adapters
//!
//! [`TradeService`](crate::application::ports::TradeService) implementations:
//! the HTTP client for the remote store and an in-process store with the
//! same compare-and-swap semantics.

pub mod http;
pub mod in_memory;

pub use http::{HttpTradeService, HttpTradeServiceConfig};
pub use in_memory::InMemoryTradeService;
