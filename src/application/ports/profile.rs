//! # Profile Port

use crate::domain::value_objects::{CurrencyCode, PaymentMethod};
use std::fmt;

/// The local identity.
pub trait Profile: Send + Sync + fmt::Debug {
    /// Profile public key the principal is known by.
    fn pub_key(&self) -> String;

    /// Fiat payment details for the currency and method, if configured.
    fn payment_details(&self, currency: CurrencyCode, method: PaymentMethod) -> Option<String>;
}
