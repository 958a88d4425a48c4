//! # Domain Layer
//!
//! Core trade model, independent of wallets, transports and storage.
//!
//! This layer contains:
//! - **Entities**: The trade aggregate, its offer and its facts
//! - **Value Objects**: Amounts, identifiers, statuses and roles
//! - **Events**: Notifications published when a local trade changes
//! - **Errors**: Domain-specific error types

pub mod entities;
pub mod errors;
pub mod events;
pub mod value_objects;
