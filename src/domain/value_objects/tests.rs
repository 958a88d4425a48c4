//! # Property-Based Tests for Domain Value Objects
//!
//! - **Scaling**: amount scaling is idempotent and insensitive to input scale
//! - **Identity**: trade id hashing is deterministic and injective on terms
//! - **State machine**: reachability agrees with the transition table

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use proptest::prelude::*;

use super::amounts::{BtcAmount, FiatAmount};
use super::enums::CurrencyCode;
use super::ids::TradeId;
use super::trade_status::TradeStatus;
use rust_decimal::Decimal;

// ============================================================================
// Strategy Definitions
// ============================================================================

fn non_negative_decimal() -> impl Strategy<Value = Decimal> {
    (0i64..2_100_000_000_000_000i64, 0u32..12).prop_map(|(v, scale)| Decimal::new(v, scale))
}

fn currency() -> impl Strategy<Value = CurrencyCode> {
    prop_oneof![
        Just(CurrencyCode::Usd),
        Just(CurrencyCode::Eur),
        Just(CurrencyCode::Sek),
        Just(CurrencyCode::Jpy),
    ]
}

fn status() -> impl Strategy<Value = TradeStatus> {
    (0u8..10).prop_map(|v| TradeStatus::try_from(v).unwrap())
}

fn term() -> impl Strategy<Value = String> {
    "[a-z0-9]{0,12}"
}

// ============================================================================
// Amount Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    /// Scaling an already scaled amount changes nothing.
    #[test]
    fn btc_scaling_idempotent(value in non_negative_decimal()) {
        let once = BtcAmount::new(value).unwrap();
        let twice = BtcAmount::new(once.get()).unwrap();
        prop_assert_eq!(once.to_string(), twice.to_string());
    }

    /// BTC amounts always render with exactly eight decimals.
    #[test]
    fn btc_renders_eight_places(value in non_negative_decimal()) {
        let amount = BtcAmount::new(value).unwrap();
        prop_assert_eq!(amount.get().scale(), 8);
    }

    /// Trailing zeros in the input do not change the scaled digits.
    #[test]
    fn btc_digits_ignore_input_scale(v in 0i64..1_000_000_000i64) {
        let a = BtcAmount::new(Decimal::new(v, 8)).unwrap();
        let b = BtcAmount::new(Decimal::new(v * 10, 9)).unwrap();
        prop_assert_eq!(a.to_string(), b.to_string());
    }

    /// Fiat amounts carry the scale of their currency.
    #[test]
    fn fiat_uses_currency_scale(value in non_negative_decimal(), code in currency()) {
        let amount = FiatAmount::new(value, code).unwrap();
        prop_assert_eq!(amount.get().scale(), code.scale());
    }
}

// ============================================================================
// Identity Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Hashing the same terms twice yields the same id.
    #[test]
    fn trade_id_deterministic(terms in prop::collection::vec(term(), 1..6)) {
        let refs: Vec<&str> = terms.iter().map(String::as_str).collect();
        prop_assert_eq!(TradeId::from_terms(&refs), TradeId::from_terms(&refs));
    }

    /// Different term lists yield different ids.
    #[test]
    fn trade_id_distinguishes_terms(
        a in prop::collection::vec(term(), 1..5),
        b in prop::collection::vec(term(), 1..5),
    ) {
        prop_assume!(a != b);
        let ra: Vec<&str> = a.iter().map(String::as_str).collect();
        let rb: Vec<&str> = b.iter().map(String::as_str).collect();
        prop_assert_ne!(TradeId::from_terms(&ra), TradeId::from_terms(&rb));
    }

    /// Hex output always parses back.
    #[test]
    fn trade_id_parse_roundtrip(terms in prop::collection::vec(term(), 1..4)) {
        let refs: Vec<&str> = terms.iter().map(String::as_str).collect();
        let id = TradeId::from_terms(&refs);
        prop_assert_eq!(TradeId::parse(id.as_str()).unwrap(), id);
    }
}

// ============================================================================
// State Machine Property Tests
// ============================================================================

proptest! {
    /// Every direct transition is also reachable.
    #[test]
    fn transitions_are_reachable(from in status(), to in status()) {
        if from.can_transition_to(to) {
            prop_assert!(from.can_reach(to));
        }
    }

    /// Reachability never runs backwards: if both directions hold the statuses are equal.
    #[test]
    fn reachability_is_antisymmetric(a in status(), b in status()) {
        if a.can_reach(b) && b.can_reach(a) {
            prop_assert_eq!(a, b);
        }
    }

    /// Reachability is transitive.
    #[test]
    fn reachability_is_transitive(a in status(), b in status(), c in status()) {
        if a.can_reach(b) && b.can_reach(c) {
            prop_assert!(a.can_reach(c));
        }
    }

    /// Terminal states reach nothing but themselves.
    #[test]
    fn terminal_is_absorbing(a in status(), b in status()) {
        if a.is_terminal() && a != b {
            prop_assert!(!a.can_reach(b));
        }
    }
}
