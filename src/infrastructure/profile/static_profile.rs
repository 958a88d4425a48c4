//! Profile with a fixed key and payment details held in memory.

use crate::application::ports::Profile;
use crate::domain::value_objects::{CurrencyCode, PaymentMethod};
use std::collections::HashMap;

/// In-memory [`Profile`].
#[derive(Debug, Clone, Default)]
pub struct StaticProfile {
    pub_key: String,
    payment_details: HashMap<(CurrencyCode, PaymentMethod), String>,
}

impl StaticProfile {
    /// Creates a profile with no payment details.
    #[must_use]
    pub fn new(pub_key: impl Into<String>) -> Self {
        Self {
            pub_key: pub_key.into(),
            payment_details: HashMap::new(),
        }
    }

    /// Adds payment details for a currency and method.
    #[must_use]
    pub fn with_payment_details(
        mut self,
        currency: CurrencyCode,
        method: PaymentMethod,
        details: impl Into<String>,
    ) -> Self {
        self.payment_details.insert((currency, method), details.into());
        self
    }
}

impl Profile for StaticProfile {
    fn pub_key(&self) -> String {
        self.pub_key.clone()
    }

    fn payment_details(&self, currency: CurrencyCode, method: PaymentMethod) -> Option<String> {
        self.payment_details.get(&(currency, method)).cloned()
    }
}
