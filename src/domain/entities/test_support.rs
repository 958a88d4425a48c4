//! Trade fixtures shared by unit tests across layers.

#![allow(clippy::unwrap_used)]

use crate::domain::entities::offer::Offer;
use crate::domain::entities::trade::Trade;
use crate::domain::entities::trade_facts::{
    CancelCompleted, PaymentRequest, PayoutCompleted, PayoutRequest, TradeAcceptance, TradeRequest,
};
use crate::domain::value_objects::{
    BtcAmount, CancelReason, CurrencyCode, FiatAmount, OfferId, OfferType, PaymentMethod,
    PayoutReason, TransactionWithAmt,
};
use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use std::str::FromStr;
use uuid::Uuid;

pub const SELLER_PROFILE: &str = "seller-profile";
pub const SELLER_ESCROW: &str = "seller-escrow";
pub const BUYER_PROFILE: &str = "buyer-profile";
pub const BUYER_ESCROW: &str = "buyer-escrow";
pub const ARBITRATOR_PROFILE: &str = "arbitrator-profile";
pub const FUNDING_TX: &str = "funding-tx";
pub const PAYOUT_TX: &str = "payout-tx";
pub const REFUND_TX: &str = "refund-tx";

pub fn btc(value: &str) -> BtcAmount {
    BtcAmount::new(Decimal::from_str(value).unwrap()).unwrap()
}

pub fn usd(value: &str) -> FiatAmount {
    FiatAmount::new(Decimal::from_str(value).unwrap(), CurrencyCode::Usd).unwrap()
}

pub fn tx(hash: &str, depth: u32) -> TransactionWithAmt {
    TransactionWithAmt::new(hash, btc("0.5"), depth)
}

fn offer_id() -> OfferId {
    OfferId::new(Uuid::from_u128(0x5eed_0000_0000_4000_8000_0000_0000_0001))
}

pub fn sell_offer() -> Offer {
    Offer::new(
        offer_id(),
        OfferType::Sell,
        CurrencyCode::Usd,
        PaymentMethod::Zelle,
        usd("30000"),
    )
    .with_maker(SELLER_PROFILE, SELLER_ESCROW)
    .with_arbitrator(ARBITRATOR_PROFILE)
}

pub fn buy_offer() -> Offer {
    Offer::new(
        offer_id(),
        OfferType::Buy,
        CurrencyCode::Usd,
        PaymentMethod::Zelle,
        usd("30000"),
    )
    .with_maker(BUYER_PROFILE, BUYER_ESCROW)
    .with_arbitrator(ARBITRATOR_PROFILE)
}

pub fn buyer_request() -> TradeRequest {
    TradeRequest {
        taker_profile_pub_key: BUYER_PROFILE.to_string(),
        taker_escrow_pub_key: BUYER_ESCROW.to_string(),
        btc_amount: btc("0.5"),
        payment_amount: usd("15000"),
        taker_payout_address: Some("buyer-payout-address".to_string()),
    }
}

pub fn seller_request() -> TradeRequest {
    TradeRequest {
        taker_profile_pub_key: SELLER_PROFILE.to_string(),
        taker_escrow_pub_key: SELLER_ESCROW.to_string(),
        btc_amount: btc("0.5"),
        payment_amount: usd("15000"),
        taker_payout_address: None,
    }
}

pub fn created_at() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

/// Seller is maker, buyer is taker.
pub fn sell_trade() -> Trade {
    Trade::new(sell_offer(), buyer_request(), created_at())
}

/// Buyer is maker, seller is taker.
pub fn buy_trade() -> Trade {
    Trade::new(buy_offer(), seller_request(), created_at())
}

pub fn acceptance() -> TradeAcceptance {
    TradeAcceptance {
        maker_escrow_pub_key: SELLER_ESCROW.to_string(),
        arbitrator_profile_pub_key: ARBITRATOR_PROFILE.to_string(),
    }
}

pub fn payment_request() -> PaymentRequest {
    PaymentRequest {
        funding_tx_hash: FUNDING_TX.to_string(),
        payment_details: "zelle: seller@example.com".to_string(),
        refund_address: "seller-refund-address".to_string(),
        refund_tx_signature: "seller-refund-signature".to_string(),
        tx_fee_per_kb: btc("0.0001"),
    }
}

pub fn payout_request() -> PayoutRequest {
    PayoutRequest {
        payment_reference: "zelle-ref-42".to_string(),
        payout_tx_signature: "buyer-payout-signature".to_string(),
        payout_address: "buyer-payout-address".to_string(),
    }
}

pub fn payout_completed(reason: PayoutReason) -> PayoutCompleted {
    PayoutCompleted {
        payout_tx_hash: PAYOUT_TX.to_string(),
        reason,
    }
}

pub fn unfunded_cancel() -> CancelCompleted {
    CancelCompleted {
        payout_tx_hash: None,
        reason: CancelReason::BuyerCancelUnfunded,
    }
}

pub fn funded_cancel() -> CancelCompleted {
    CancelCompleted {
        payout_tx_hash: Some(REFUND_TX.to_string()),
        reason: CancelReason::BuyerCancelFunded,
    }
}

/// Accepted, payment requested and funding confirmed.
pub fn funded_trade() -> Trade {
    let mut trade = sell_trade();
    trade.attach_acceptance(acceptance()).unwrap();
    trade.attach_payment_request(payment_request()).unwrap();
    trade.set_funding_transaction(Some(tx(FUNDING_TX, 1)));
    trade
}
