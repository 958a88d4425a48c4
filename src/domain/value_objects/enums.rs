//! # Domain Enums
//!
//! Closed vocabularies shared by offers and trades.
//!
//! - [`Role`]: Buyer, Seller or Arbitrator, resolved per observer
//! - [`OfferType`]: direction of the maker's listing
//! - [`CurrencyCode`]: fiat currency with its native decimal scale
//! - [`PaymentMethod`]: fiat payment rail
//! - [`ArbitrationReason`], [`PayoutReason`], [`CancelReason`]: reason codes
//!   carried by the corresponding trade facts

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error returned when parsing an enum from a string fails.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {kind}: {value}")]
pub struct ParseEnumError {
    /// The enum being parsed.
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}

impl ParseEnumError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Position of the local principal in a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum Role {
    /// Receives BTC, sends fiat.
    Buyer = 0,
    /// Funds the escrow, receives fiat.
    Seller = 1,
    /// Resolves disputes.
    Arbitrator = 2,
}

impl Role {
    /// Returns true for the two trading counterparties.
    #[inline]
    #[must_use]
    pub const fn is_counterparty(&self) -> bool {
        matches!(self, Self::Buyer | Self::Seller)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Buyer => "BUYER",
            Self::Seller => "SELLER",
            Self::Arbitrator => "ARBITRATOR",
        };
        write!(f, "{}", s)
    }
}

/// Direction of a maker's listing.
///
/// A `Sell` offer is published by a seller and taken by a buyer; a `Buy`
/// offer is published by a buyer and taken by a seller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OfferType {
    /// Maker wants to buy BTC.
    Buy,
    /// Maker wants to sell BTC.
    Sell,
}

impl OfferType {
    /// Role of the offer's maker.
    #[inline]
    #[must_use]
    pub const fn maker_role(&self) -> Role {
        match self {
            Self::Buy => Role::Buyer,
            Self::Sell => Role::Seller,
        }
    }

    /// Role of whoever takes the offer.
    #[inline]
    #[must_use]
    pub const fn taker_role(&self) -> Role {
        match self {
            Self::Buy => Role::Seller,
            Self::Sell => Role::Buyer,
        }
    }
}

impl fmt::Display for OfferType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
        }
    }
}

impl FromStr for OfferType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "BUY" => Ok(Self::Buy),
            "SELL" => Ok(Self::Sell),
            _ => Err(ParseEnumError::new("offer type", s)),
        }
    }
}

/// Fiat currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CurrencyCode {
    /// US dollar.
    Usd,
    /// Euro.
    Eur,
    /// Pound sterling.
    Gbp,
    /// Swedish krona.
    Sek,
    /// Canadian dollar.
    Cad,
    /// Australian dollar.
    Aud,
    /// Swiss franc.
    Chf,
    /// Japanese yen.
    Jpy,
}

impl CurrencyCode {
    /// Number of decimal places fiat amounts in this currency carry.
    #[inline]
    #[must_use]
    pub const fn scale(&self) -> u32 {
        match self {
            Self::Jpy => 0,
            _ => 2,
        }
    }

    /// ISO 4217 code.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Usd => "USD",
            Self::Eur => "EUR",
            Self::Gbp => "GBP",
            Self::Sek => "SEK",
            Self::Cad => "CAD",
            Self::Aud => "AUD",
            Self::Chf => "CHF",
            Self::Jpy => "JPY",
        }
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CurrencyCode {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "USD" => Ok(Self::Usd),
            "EUR" => Ok(Self::Eur),
            "GBP" => Ok(Self::Gbp),
            "SEK" => Ok(Self::Sek),
            "CAD" => Ok(Self::Cad),
            "AUD" => Ok(Self::Aud),
            "CHF" => Ok(Self::Chf),
            "JPY" => Ok(Self::Jpy),
            _ => Err(ParseEnumError::new("currency code", s)),
        }
    }
}

/// Fiat payment rail agreed in the offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    /// SEPA bank transfer.
    Sepa,
    /// Domestic wire transfer.
    Wire,
    /// Zelle.
    Zelle,
    /// Swish.
    Swish,
    /// Interac e-Transfer.
    Interac,
    /// Cash deposit at a bank branch.
    CashDeposit,
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Sepa => "SEPA",
            Self::Wire => "WIRE",
            Self::Zelle => "ZELLE",
            Self::Swish => "SWISH",
            Self::Interac => "INTERAC",
            Self::CashDeposit => "CASH_DEPOSIT",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for PaymentMethod {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().replace('-', "_").as_str() {
            "SEPA" => Ok(Self::Sepa),
            "WIRE" => Ok(Self::Wire),
            "ZELLE" => Ok(Self::Zelle),
            "SWISH" => Ok(Self::Swish),
            "INTERAC" => Ok(Self::Interac),
            "CASH_DEPOSIT" => Ok(Self::CashDeposit),
            _ => Err(ParseEnumError::new("payment method", s)),
        }
    }
}

/// Why a counterparty asked for arbitration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArbitrationReason {
    /// Raised by the seller: fiat payment never arrived.
    NoPayment,
    /// Raised by the buyer: BTC was not released.
    NoBtc,
}

impl ArbitrationReason {
    /// The reason a given counterparty raises, or `None` for the arbitrator.
    #[must_use]
    pub const fn for_role(role: Role) -> Option<Self> {
        match role {
            Role::Buyer => Some(Self::NoBtc),
            Role::Seller => Some(Self::NoPayment),
            Role::Arbitrator => None,
        }
    }
}

impl fmt::Display for ArbitrationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoPayment => write!(f, "NO_PAYMENT"),
            Self::NoBtc => write!(f, "NO_BTC"),
        }
    }
}

/// Disposition recorded when escrowed BTC is released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PayoutReason {
    /// Seller confirmed fiat receipt and released BTC to the buyer.
    SellerBuyerPayout,
    /// Buyer co-signed a refund back to the seller.
    BuyerSellerRefund,
    /// Arbitrator returned BTC to the seller.
    ArbitratorSellerRefund,
    /// Arbitrator released BTC to the buyer.
    ArbitratorBuyerPayout,
}

impl PayoutReason {
    /// Returns true if the escrow went back to the seller.
    #[inline]
    #[must_use]
    pub const fn is_refund(&self) -> bool {
        matches!(self, Self::BuyerSellerRefund | Self::ArbitratorSellerRefund)
    }

    /// Returns true if the arbitrator decided the payout.
    #[inline]
    #[must_use]
    pub const fn is_arbitrated(&self) -> bool {
        matches!(
            self,
            Self::ArbitratorSellerRefund | Self::ArbitratorBuyerPayout
        )
    }
}

impl fmt::Display for PayoutReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::SellerBuyerPayout => "SELLER_BUYER_PAYOUT",
            Self::BuyerSellerRefund => "BUYER_SELLER_REFUND",
            Self::ArbitratorSellerRefund => "ARBITRATOR_SELLER_REFUND",
            Self::ArbitratorBuyerPayout => "ARBITRATOR_BUYER_PAYOUT",
        };
        write!(f, "{}", s)
    }
}

/// Why a trade was canceled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CancelReason {
    /// Seller walked away before funding.
    SellerCancelUnfunded,
    /// Buyer walked away before funding.
    BuyerCancelUnfunded,
    /// Buyer canceled after funding; escrow is refunded to the seller.
    BuyerCancelFunded,
}

impl CancelReason {
    /// Returns true if the cancel happened before any escrow was funded.
    #[inline]
    #[must_use]
    pub const fn is_unfunded(&self) -> bool {
        matches!(self, Self::SellerCancelUnfunded | Self::BuyerCancelUnfunded)
    }
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::SellerCancelUnfunded => "SELLER_CANCEL_UNFUNDED",
            Self::BuyerCancelUnfunded => "BUYER_CANCEL_UNFUNDED",
            Self::BuyerCancelFunded => "BUYER_CANCEL_FUNDED",
        };
        write!(f, "{}", s)
    }
}
