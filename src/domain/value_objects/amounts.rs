//! # Amounts
//!
//! Decimal BTC and fiat amounts with fixed scales.
//!
//! BTC amounts always carry 8 decimal places. Fiat amounts carry the native
//! scale of their currency. Both round half away from zero, so that two
//! principals scaling the same input always produce the same digits (the
//! digits feed the trade's content hash).
//!
//! # Examples
//!
//! ```
//! use escrow_trade::domain::value_objects::amounts::{BtcAmount, FiatAmount};
//! use escrow_trade::domain::value_objects::enums::CurrencyCode;
//! use rust_decimal_macros::dec;
//!
//! let btc = BtcAmount::new(dec!(0.5)).unwrap();
//! assert_eq!(btc.to_string(), "0.50000000");
//!
//! let price = FiatAmount::new(dec!(30000), CurrencyCode::Usd).unwrap();
//! let total = price.times_btc(btc, CurrencyCode::Usd).unwrap();
//! assert_eq!(total.to_string(), "15000.00");
//! ```

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::value_objects::enums::CurrencyCode;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Decimal places carried by BTC amounts.
pub const BTC_SCALE: u32 = 8;

fn scale_half_up(value: Decimal, scale: u32) -> Decimal {
    let mut scaled = value.round_dp_with_strategy(scale, RoundingStrategy::MidpointAwayFromZero);
    scaled.rescale(scale);
    scaled
}

/// A non-negative BTC amount scaled to 8 places.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct BtcAmount(Decimal);

impl BtcAmount {
    /// Zero BTC.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Creates an amount, rounding half-up to 8 places.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidAmount` if the value is negative.
    pub fn new(value: Decimal) -> DomainResult<Self> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(DomainError::InvalidAmount(format!(
                "btc amount cannot be negative: {value}"
            )));
        }
        Ok(Self(scale_half_up(value, BTC_SCALE)))
    }

    /// Returns the inner decimal.
    #[inline]
    #[must_use]
    pub const fn get(self) -> Decimal {
        self.0
    }

    /// Returns true if the amount is zero.
    #[inline]
    #[must_use]
    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    /// Adds two amounts, returning `None` on overflow.
    #[must_use]
    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Self)
    }

    /// Subtracts `rhs`, returning `None` if the result would be negative.
    #[must_use]
    pub fn checked_sub(self, rhs: Self) -> Option<Self> {
        self.0
            .checked_sub(rhs.0)
            .filter(|d| !d.is_sign_negative() || d.is_zero())
            .map(Self)
    }
}

impl Default for BtcAmount {
    fn default() -> Self {
        Self::ZERO
    }
}

impl TryFrom<Decimal> for BtcAmount {
    type Error = DomainError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<BtcAmount> for Decimal {
    fn from(amount: BtcAmount) -> Self {
        amount.0
    }
}

impl fmt::Display for BtcAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A non-negative fiat amount.
///
/// The amount does not carry its currency; the owning offer does. Constructors
/// take the currency only to apply its scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct FiatAmount(Decimal);

impl FiatAmount {
    /// Creates an amount scaled half-up to the currency's scale.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidAmount` if the value is negative.
    pub fn new(value: Decimal, currency: CurrencyCode) -> DomainResult<Self> {
        Self::unscaled(value).map(|amount| amount.scaled(currency))
    }

    fn unscaled(value: Decimal) -> DomainResult<Self> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(DomainError::InvalidAmount(format!(
                "fiat amount cannot be negative: {value}"
            )));
        }
        Ok(Self(value))
    }

    /// Returns the amount rescaled to `currency`.
    #[must_use]
    pub fn scaled(self, currency: CurrencyCode) -> Self {
        Self(scale_half_up(self.0, currency.scale()))
    }

    /// Multiplies a per-BTC price by a BTC amount.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidAmount` on overflow.
    pub fn times_btc(self, btc: BtcAmount, currency: CurrencyCode) -> DomainResult<Self> {
        let total = self
            .0
            .checked_mul(btc.get())
            .ok_or_else(|| DomainError::InvalidAmount("fiat amount overflow".to_string()))?;
        Self::new(total, currency)
    }

    /// Returns the inner decimal.
    #[inline]
    #[must_use]
    pub const fn get(self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for FiatAmount {
    type Error = DomainError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::unscaled(value)
    }
}

impl From<FiatAmount> for Decimal {
    fn from(amount: FiatAmount) -> Self {
        amount.0
    }
}

impl fmt::Display for FiatAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
