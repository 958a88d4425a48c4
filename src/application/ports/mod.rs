//! # Ports
//!
//! Traits the core consumes its collaborators through.
//!
//! - [`Wallet`]: escrow derivation, signing, broadcasting and confirmation depth
//! - [`TradeService`]: the remote versioned trade store
//! - [`TradeStore`]: local persistence of trade snapshots
//! - [`Profile`]: the local identity and its payment details

pub mod profile;
pub mod trade_service;
pub mod trade_store;
pub mod wallet;

pub use profile::Profile;
pub use trade_service::{ServiceError, ServiceResult, TradeService};
pub use trade_store::{StoreError, StoreResult, TradeStore};
pub use wallet::{Wallet, WalletError, WalletEvent, WalletResult};
