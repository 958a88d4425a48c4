//! # Application Services
//!
//! Long-running coordination on top of the protocols.
//!
//! - [`ReconciliationEngine`]: poll, merge, persist and re-publish trades
//! - [`TradeLocks`]: one writer per trade id
//! - [`RetryPolicy`]: backoff for transient trade service failures

pub mod reconciliation;
pub mod retry;
pub mod trade_locks;

pub use reconciliation::{EngineConfig, EngineHandle, Outcome, PassSummary, ReconciliationEngine};
pub use retry::{RetryPolicy, Retryable, execute_with_retry};
pub use trade_locks::{TradeGuard, TradeLocks};
