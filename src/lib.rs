//! # Escrow Trade
//!
//! Coordinator for peer-to-peer Bitcoin-for-fiat trades settled through a
//! 2-of-3 multi-signature escrow shared by buyer, seller and arbitrator.
//!
//! Each principal holds its own copy of every trade it takes part in and
//! polls a shared, versioned trade service for the others' copies. The
//! reconciliation engine merges the two views, lets the principal's role
//! react (accept, fund, pay, release) and publishes whatever it added.
//!
//! ## Architecture
//!
//! This crate follows Domain-Driven Design with a layered architecture:
//!
//! - **Domain Layer** (`domain`): the trade aggregate, its facts and status derivation
//! - **Application Layer** (`application`): ports, role protocols, the reconciliation engine and user actions
//! - **Infrastructure Layer** (`infrastructure`): trade service clients, trade stores, the simulated wallet
//! - **Configuration** (`config`): layered TOML and environment configuration
//!
//! ## Example
//!
//! ```rust,ignore
//! use escrow_trade::application::{ProtocolContext, ReconciliationEngine, TradeActions};
//!
//! let engine = ReconciliationEngine::new(context, service, store, EngineConfig::default());
//! engine.load().await?;
//! let handle = engine.start();
//!
//! let actions = TradeActions::new(engine.clone());
//! let trade = actions.create_trade(&offer, btc_amount).await?;
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
