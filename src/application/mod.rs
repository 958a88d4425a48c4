//! # Application Layer
//!
//! Protocols, the reconciliation engine and the ports they drive.
//!
//! ## Protocols
//!
//! - [`TradeProtocol`]: dispatch to the buyer, seller or arbitrator side
//!
//! ## Services
//!
//! - [`ReconciliationEngine`]: keeps local trades converged with the trade service
//!
//! ## Use Cases
//!
//! - [`TradeActions`]: create, fund, pay, confirm, arbitrate, resolve, cancel

pub mod dto;
pub mod error;
pub mod ports;
pub mod protocol;
pub mod services;
pub mod use_cases;

pub use dto::TradeRecord;
pub use error::{ApplicationError, ApplicationResult};
pub use ports::{Profile, TradeService, TradeStore, Wallet, WalletEvent};
pub use protocol::{ArbitratorProtocol, BuyerProtocol, ProtocolContext, SellerProtocol, TradeProtocol};
pub use services::{
    EngineConfig, EngineHandle, Outcome, PassSummary, ReconciliationEngine, RetryPolicy,
};
pub use use_cases::TradeActions;
