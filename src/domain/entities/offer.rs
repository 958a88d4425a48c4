//! # Offer
//!
//! A maker's listing, as embedded in a trade.
//!
//! The offer is immutable once a trade references it: its terms feed the
//! trade's content hash. Maker and arbitrator keys are optional because
//! listings are published incrementally; a taker can only build a trade
//! once all three are known.

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::value_objects::{CurrencyCode, FiatAmount, OfferId, OfferType, PaymentMethod};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A maker's listing.
///
/// # Examples
///
/// ```
/// use escrow_trade::domain::entities::offer::Offer;
/// use escrow_trade::domain::value_objects::{
///     CurrencyCode, FiatAmount, OfferId, OfferType, PaymentMethod,
/// };
/// use rust_decimal_macros::dec;
///
/// let offer = Offer::new(
///     OfferId::new_v4(),
///     OfferType::Sell,
///     CurrencyCode::Usd,
///     PaymentMethod::Zelle,
///     FiatAmount::new(dec!(30000), CurrencyCode::Usd).unwrap(),
/// )
/// .with_maker("maker-profile", "maker-escrow")
/// .with_arbitrator("arbitrator-profile");
///
/// assert!(offer.require_escrow_keys().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Offer {
    id: OfferId,
    offer_type: OfferType,
    currency_code: CurrencyCode,
    payment_method: PaymentMethod,
    price: FiatAmount,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    maker_profile_pub_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    maker_escrow_pub_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    arbitrator_profile_pub_key: Option<String>,
}

/// Keys needed to compute an escrow address from an offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OfferKeys<'a> {
    /// Maker's profile key.
    pub maker_profile_pub_key: &'a str,
    /// Maker's escrow key.
    pub maker_escrow_pub_key: &'a str,
    /// Arbitrator's profile key.
    pub arbitrator_profile_pub_key: &'a str,
}

impl Offer {
    /// Creates an offer without maker or arbitrator keys.
    ///
    /// The price is rescaled to the currency.
    #[must_use]
    pub fn new(
        id: OfferId,
        offer_type: OfferType,
        currency_code: CurrencyCode,
        payment_method: PaymentMethod,
        price: FiatAmount,
    ) -> Self {
        Self {
            id,
            offer_type,
            currency_code,
            payment_method,
            price: price.scaled(currency_code),
            maker_profile_pub_key: None,
            maker_escrow_pub_key: None,
            arbitrator_profile_pub_key: None,
        }
    }

    /// Sets the maker's profile and escrow keys.
    #[must_use]
    pub fn with_maker(
        mut self,
        profile_pub_key: impl Into<String>,
        escrow_pub_key: impl Into<String>,
    ) -> Self {
        self.maker_profile_pub_key = Some(profile_pub_key.into());
        self.maker_escrow_pub_key = Some(escrow_pub_key.into());
        self
    }

    /// Sets the arbitrator's profile key.
    #[must_use]
    pub fn with_arbitrator(mut self, profile_pub_key: impl Into<String>) -> Self {
        self.arbitrator_profile_pub_key = Some(profile_pub_key.into());
        self
    }

    // ========== Accessors ==========

    /// Returns the offer ID.
    #[inline]
    #[must_use]
    pub fn id(&self) -> OfferId {
        self.id
    }

    /// Returns the listing direction.
    #[inline]
    #[must_use]
    pub fn offer_type(&self) -> OfferType {
        self.offer_type
    }

    /// Returns the fiat currency.
    #[inline]
    #[must_use]
    pub fn currency_code(&self) -> CurrencyCode {
        self.currency_code
    }

    /// Returns the fiat payment method.
    #[inline]
    #[must_use]
    pub fn payment_method(&self) -> PaymentMethod {
        self.payment_method
    }

    /// Returns the price per BTC.
    #[inline]
    #[must_use]
    pub fn price(&self) -> FiatAmount {
        self.price
    }

    /// Returns the maker's profile key.
    #[inline]
    #[must_use]
    pub fn maker_profile_pub_key(&self) -> Option<&str> {
        self.maker_profile_pub_key.as_deref()
    }

    /// Returns the maker's escrow key.
    #[inline]
    #[must_use]
    pub fn maker_escrow_pub_key(&self) -> Option<&str> {
        self.maker_escrow_pub_key.as_deref()
    }

    /// Returns the arbitrator's profile key.
    #[inline]
    #[must_use]
    pub fn arbitrator_profile_pub_key(&self) -> Option<&str> {
        self.arbitrator_profile_pub_key.as_deref()
    }

    /// Returns all keys needed to build an escrow.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::MissingOfferData` naming the first absent key.
    pub fn require_escrow_keys(&self) -> DomainResult<OfferKeys<'_>> {
        let missing = |name: &str| DomainError::MissingOfferData(format!("offer {} has no {name}", self.id));
        Ok(OfferKeys {
            maker_profile_pub_key: self
                .maker_profile_pub_key()
                .ok_or_else(|| missing("maker profile key"))?,
            maker_escrow_pub_key: self
                .maker_escrow_pub_key()
                .ok_or_else(|| missing("maker escrow key"))?,
            arbitrator_profile_pub_key: self
                .arbitrator_profile_pub_key()
                .ok_or_else(|| missing("arbitrator key"))?,
        })
    }
}

impl fmt::Display for Offer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Offer({} {} @ {} {} via {})",
            self.id, self.offer_type, self.price, self.currency_code, self.payment_method
        )
    }
}
