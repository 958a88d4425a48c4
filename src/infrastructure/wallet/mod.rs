//! # Wallet Adapters
//!
//! [`Wallet`](crate::application::ports::Wallet) implementations.
//!
//! The simulated chain and wallet run the full escrow protocol in process:
//! 2-of-3 address derivation, funding, confirmation depth and co-signed
//! release. They back the tests and the default demo wiring.

pub mod simulated_chain;
pub mod simulated_wallet;

pub use simulated_chain::{EscrowKeys, SimulatedChain};
pub use simulated_wallet::SimulatedWallet;
