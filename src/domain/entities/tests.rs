//! # Property-Based Tests for the Trade Aggregate
//!
//! - **Derivation**: status depends only on the fact set, not on how it was built
//! - **Purity**: deriving never changes the trade
//! - **Terminal**: terminal trades accept no further facts
//! - **Snapshot**: persisted trades derive the same status after reload

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use proptest::prelude::*;

use crate::domain::entities::test_support::*;
use crate::domain::entities::trade::Trade;
use crate::domain::entities::trade_facts::ArbitrateRequest;
use crate::domain::value_objects::{ArbitrationReason, PayoutReason, TradeStatus};

// ============================================================================
// Strategy Definitions
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum Step {
    Accept,
    RequestPayment,
    RequestPayout,
    Arbitrate,
    CompletePayout(PayoutReason),
    CancelUnfunded,
    CancelFunded,
}

fn payout_reason() -> impl Strategy<Value = PayoutReason> {
    prop_oneof![
        Just(PayoutReason::SellerBuyerPayout),
        Just(PayoutReason::BuyerSellerRefund),
        Just(PayoutReason::ArbitratorSellerRefund),
        Just(PayoutReason::ArbitratorBuyerPayout),
    ]
}

/// A set of distinct steps, at most one cancel and one payout record.
fn steps() -> impl Strategy<Value = Vec<Step>> {
    (
        any::<[bool; 4]>(),
        prop::option::of(payout_reason()),
        prop::option::of(any::<bool>()),
    )
        .prop_map(|(flags, payout, cancel)| {
            let mut steps = Vec::new();
            let base = [
                Step::Accept,
                Step::RequestPayment,
                Step::RequestPayout,
                Step::Arbitrate,
            ];
            for (step, present) in base.into_iter().zip(flags) {
                if present {
                    steps.push(step);
                }
            }
            if let Some(reason) = payout {
                steps.push(Step::CompletePayout(reason));
            }
            match cancel {
                Some(true) => steps.push(Step::CancelFunded),
                Some(false) => steps.push(Step::CancelUnfunded),
                None => {}
            }
            steps
        })
}

fn apply(trade: &mut Trade, step: Step) {
    match step {
        Step::Accept => trade.attach_acceptance(acceptance()).map(drop),
        Step::RequestPayment => trade.attach_payment_request(payment_request()).map(drop),
        Step::RequestPayout => trade.attach_payout_request(payout_request()).map(drop),
        Step::Arbitrate => trade
            .attach_arbitrate_request(ArbitrateRequest {
                reason: ArbitrationReason::NoPayment,
            })
            .map(drop),
        Step::CompletePayout(reason) => trade.attach_payout_completed(payout_completed(reason)).map(drop),
        Step::CancelUnfunded => trade.attach_cancel_completed(unfunded_cancel()).map(drop),
        Step::CancelFunded => trade.attach_cancel_completed(funded_cancel()).map(drop),
    }
    .unwrap();
}

fn build(steps: &[Step], funding_depth: u32, payout_depth: u32) -> Trade {
    let mut trade = sell_trade();
    for step in steps {
        apply(&mut trade, *step);
    }
    trade.set_funding_transaction(Some(tx(FUNDING_TX, funding_depth)));
    trade.set_payout_transaction(Some(tx(PAYOUT_TX, payout_depth)));
    trade
}

// ============================================================================
// Derivation Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    /// Attaching the same facts in any order derives the same status.
    #[test]
    fn derivation_ignores_attach_order(
        (ordered, shuffled) in steps().prop_flat_map(|s| (Just(s.clone()), Just(s).prop_shuffle())),
        funding_depth in 0u32..3,
        payout_depth in 0u32..3,
    ) {
        let a = build(&ordered, funding_depth, payout_depth);
        let b = build(&shuffled, funding_depth, payout_depth);
        prop_assert_eq!(a.derive_status(), b.derive_status());
    }

    /// Deriving twice gives the same answer and leaves the trade untouched.
    #[test]
    fn derivation_is_pure(steps in steps(), funding_depth in 0u32..3, payout_depth in 0u32..3) {
        let trade = build(&steps, funding_depth, payout_depth);
        let before = trade.clone();
        let first = trade.derive_status();
        let second = trade.derive_status();
        prop_assert_eq!(first, second);
        prop_assert_eq!(trade, before);
    }

    /// Without a confirmed funding transaction a trade is never funded or paid.
    #[test]
    fn unconfirmed_funding_never_funded(steps in steps(), payout_depth in 0u32..3) {
        let trade = build(&steps, 0, payout_depth);
        if let Ok(status) = trade.derive_status() {
            prop_assert!(!status.is_funded());
        }
    }

    /// Terminal trades reject every further fact.
    #[test]
    fn terminal_rejects_new_facts(steps in steps(), funding_depth in 0u32..3, payout_depth in 0u32..3) {
        let mut trade = build(&steps, funding_depth, payout_depth);
        if let Ok(status) = trade.update_status()
            && status.is_terminal()
        {
            if !trade.has_fact(crate::domain::entities::FactKind::PayoutRequest) {
                prop_assert!(trade.attach_payout_request(payout_request()).is_err());
            }
            if !trade.has_fact(crate::domain::entities::FactKind::ArbitrateRequest) {
                let arbitrate = ArbitrateRequest { reason: ArbitrationReason::NoBtc };
                prop_assert!(trade.attach_arbitrate_request(arbitrate).is_err());
            }
        }
    }

    /// A persisted trade derives the same status once observations are restored.
    #[test]
    fn snapshot_preserves_derivation(steps in steps(), funding_depth in 0u32..3, payout_depth in 0u32..3) {
        let trade = build(&steps, funding_depth, payout_depth);
        let json = serde_json::to_string(&trade).unwrap();
        let mut back: Trade = serde_json::from_str(&json).unwrap();
        back.set_funding_transaction(trade.funding_transaction().cloned());
        back.set_payout_transaction(trade.payout_transaction().cloned());
        prop_assert_eq!(back.derive_status(), trade.derive_status());
    }
}

#[test]
fn created_trade_has_only_forward_paths() {
    let trade = sell_trade();
    let status = trade.derive_status().unwrap();
    assert!(status.can_reach(TradeStatus::Completed));
    assert!(status.can_reach(TradeStatus::Canceled));
}
