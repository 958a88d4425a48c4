//! # Infrastructure Layer
//!
//! Adapters implementing the application ports.
//!
//! ## Wallet
//!
//! - [`SimulatedChain`](wallet::SimulatedChain) and
//!   [`SimulatedWallet`](wallet::SimulatedWallet): an in-process 2-of-3
//!   escrow ledger
//!
//! ## Trade Service
//!
//! - [`HttpTradeService`](trade_service::HttpTradeService): reqwest client for
//!   the remote store
//! - [`InMemoryTradeService`](trade_service::InMemoryTradeService): shared
//!   in-process store for tests and demos
//!
//! ## Persistence
//!
//! - [`FileTradeStore`](persistence::FileTradeStore): JSON snapshots on disk
//! - [`InMemoryTradeStore`](persistence::InMemoryTradeStore): for testing
//!
//! ## Profile
//!
//! - [`StaticProfile`](profile::StaticProfile): configured identity

pub mod persistence;
pub mod profile;
pub mod trade_service;
pub mod wallet;
