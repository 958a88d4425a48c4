//! # Trade Status
//!
//! Escrow trade lifecycle state machine.
//!
//! This module provides the [`TradeStatus`] enum. A trade's status is never
//! assigned directly: it is derived from the facts present on the trade (see
//! [`Trade::derive_status`](crate::domain::entities::trade::Trade::derive_status)).
//! The edges here describe which derived statuses may follow each other, so
//! that a re-derivation can be checked for monotonicity.
//!
//! # State Machine
//!
//! ```text
//! Created → Accepted → Funding → Funded → Paid → Completing → Completed
//!
//! Created | Accepted                  → Canceled
//! Funding | Funded                    → Canceling → Canceled
//! Accepted | Funding | Funded | Paid  → Arbitrating → Completing
//! Funded | Canceling                  → Completing
//! ```
//!
//! # Examples
//!
//! ```
//! use escrow_trade::domain::value_objects::trade_status::TradeStatus;
//!
//! let status = TradeStatus::Funded;
//! assert!(status.can_transition_to(TradeStatus::Paid));
//! assert!(status.can_reach(TradeStatus::Completed));
//! assert!(!status.can_reach(TradeStatus::Accepted));
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Escrow trade lifecycle status.
///
/// # Terminal States
///
/// - [`Completed`](TradeStatus::Completed) - escrow paid out and confirmed
/// - [`Canceled`](TradeStatus::Canceled) - trade canceled, escrow (if any) refunded and confirmed
///
/// # Examples
///
/// ```
/// use escrow_trade::domain::value_objects::trade_status::TradeStatus;
///
/// assert!(!TradeStatus::Paid.is_terminal());
/// assert!(TradeStatus::Completed.is_terminal());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum TradeStatus {
    /// Offer and trade request are present.
    #[default]
    Created = 0,

    /// Maker accepted the request and the escrow address is known.
    Accepted = 1,

    /// Seller broadcast the funding transaction and published a payment request.
    Funding = 2,

    /// Funding transaction has at least one confirmation.
    Funded = 3,

    /// Buyer reported the fiat payment and published a payout request.
    Paid = 4,

    /// Payout or refund transaction broadcast, awaiting confirmation.
    Completing = 5,

    /// Buyer canceled a funded trade, refund awaiting confirmation.
    Canceling = 6,

    /// One of the parties asked the arbitrator to resolve the trade.
    Arbitrating = 7,

    /// Payout confirmed (terminal).
    Completed = 8,

    /// Cancel confirmed (terminal).
    Canceled = 9,
}

impl TradeStatus {
    /// All statuses, in declaration order.
    pub const ALL: [Self; 10] = [
        Self::Created,
        Self::Accepted,
        Self::Funding,
        Self::Funded,
        Self::Paid,
        Self::Completing,
        Self::Canceling,
        Self::Arbitrating,
        Self::Completed,
        Self::Canceled,
    ];

    /// Returns true if this is a terminal state.
    ///
    /// # Examples
    ///
    /// ```
    /// use escrow_trade::domain::value_objects::trade_status::TradeStatus;
    ///
    /// assert!(TradeStatus::Completed.is_terminal());
    /// assert!(TradeStatus::Canceled.is_terminal());
    /// assert!(!TradeStatus::Canceling.is_terminal());
    /// ```
    #[inline]
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Canceled)
    }

    /// Returns true if a single derivation step may move from this status to `target`.
    ///
    /// - Created → Accepted, Canceled
    /// - Accepted → Funding, Arbitrating, Canceled
    /// - Funding → Funded, Arbitrating, Canceling
    /// - Funded → Paid, Completing, Arbitrating, Canceling
    /// - Paid → Completing, Arbitrating
    /// - Arbitrating → Completing
    /// - Canceling → Completing, Canceled
    /// - Completing → Completed
    /// - Terminal states → (none)
    #[must_use]
    pub const fn can_transition_to(&self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Created, Self::Accepted)
                | (Self::Created, Self::Canceled)
                | (Self::Accepted, Self::Funding)
                | (Self::Accepted, Self::Arbitrating)
                | (Self::Accepted, Self::Canceled)
                | (Self::Funding, Self::Funded)
                | (Self::Funding, Self::Arbitrating)
                | (Self::Funding, Self::Canceling)
                | (Self::Funded, Self::Paid)
                | (Self::Funded, Self::Completing)
                | (Self::Funded, Self::Arbitrating)
                | (Self::Funded, Self::Canceling)
                | (Self::Paid, Self::Completing)
                | (Self::Paid, Self::Arbitrating)
                | (Self::Arbitrating, Self::Completing)
                | (Self::Canceling, Self::Completing)
                | (Self::Canceling, Self::Canceled)
                | (Self::Completing, Self::Completed)
        )
    }

    /// Returns the valid next statuses from this status.
    #[must_use]
    pub fn valid_transitions(&self) -> Vec<Self> {
        Self::ALL
            .into_iter()
            .filter(|target| self.can_transition_to(*target))
            .collect()
    }

    /// Returns true if `target` equals this status or follows it through any
    /// chain of transitions.
    ///
    /// Several facts can be adopted in a single reconciliation pass, so the
    /// re-derived status may skip intermediate states.
    ///
    /// # Examples
    ///
    /// ```
    /// use escrow_trade::domain::value_objects::trade_status::TradeStatus;
    ///
    /// assert!(TradeStatus::Created.can_reach(TradeStatus::Funding));
    /// assert!(TradeStatus::Paid.can_reach(TradeStatus::Paid));
    /// assert!(!TradeStatus::Completed.can_reach(TradeStatus::Completing));
    /// ```
    #[must_use]
    pub fn can_reach(&self, target: Self) -> bool {
        if *self == target {
            return true;
        }
        let mut visited = [false; Self::ALL.len()];
        let mut frontier = vec![*self];
        while let Some(current) = frontier.pop() {
            for next in current.valid_transitions() {
                if next == target {
                    return true;
                }
                let slot = &mut visited[next.as_u8() as usize];
                if !*slot {
                    *slot = true;
                    frontier.push(next);
                }
            }
        }
        false
    }

    /// Returns true if an arbitration request may be raised in this status.
    ///
    /// Arbitration is open from acceptance until a payout or cancel is
    /// underway.
    #[inline]
    #[must_use]
    pub const fn allows_arbitration(&self) -> bool {
        matches!(
            self,
            Self::Accepted | Self::Funding | Self::Funded | Self::Paid
        )
    }

    /// Returns true if the escrow has been confirmed on chain.
    #[inline]
    #[must_use]
    pub const fn is_funded(&self) -> bool {
        matches!(self, Self::Funded | Self::Paid)
    }

    /// Returns the numeric value of this status.
    #[inline]
    #[must_use]
    pub const fn as_u8(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for TradeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Created => "CREATED",
            Self::Accepted => "ACCEPTED",
            Self::Funding => "FUNDING",
            Self::Funded => "FUNDED",
            Self::Paid => "PAID",
            Self::Completing => "COMPLETING",
            Self::Canceling => "CANCELING",
            Self::Arbitrating => "ARBITRATING",
            Self::Completed => "COMPLETED",
            Self::Canceled => "CANCELED",
        };
        write!(f, "{}", s)
    }
}

impl TryFrom<u8> for TradeStatus {
    type Error = InvalidTradeStatusError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .get(usize::from(value))
            .copied()
            .ok_or(InvalidTradeStatusError(value))
    }
}

/// Error returned when converting an invalid u8 to TradeStatus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidTradeStatusError(pub u8);

impl fmt::Display for InvalidTradeStatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid trade status value: {}", self.0)
    }
}

impl std::error::Error for InvalidTradeStatusError {}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    mod terminal_states {
        use super::*;

        #[test]
        fn completed_and_canceled_are_terminal() {
            assert!(TradeStatus::Completed.is_terminal());
            assert!(TradeStatus::Canceled.is_terminal());
        }

        #[test]
        fn non_terminal_states() {
            for status in TradeStatus::ALL.iter().filter(|s| s.as_u8() < 8) {
                assert!(!status.is_terminal(), "{status} should not be terminal");
            }
        }

        #[test]
        fn terminal_states_have_no_transitions() {
            assert!(TradeStatus::Completed.valid_transitions().is_empty());
            assert!(TradeStatus::Canceled.valid_transitions().is_empty());
        }
    }

    mod transitions {
        use super::*;

        #[test]
        fn happy_path_is_connected() {
            let path = [
                TradeStatus::Created,
                TradeStatus::Accepted,
                TradeStatus::Funding,
                TradeStatus::Funded,
                TradeStatus::Paid,
                TradeStatus::Completing,
                TradeStatus::Completed,
            ];
            for pair in path.windows(2) {
                assert!(
                    pair[0].can_transition_to(pair[1]),
                    "{} should transition to {}",
                    pair[0],
                    pair[1]
                );
            }
        }

        #[test]
        fn funded_can_cancel() {
            assert!(TradeStatus::Funded.can_transition_to(TradeStatus::Canceling));
            assert!(TradeStatus::Funding.can_transition_to(TradeStatus::Canceling));
            assert!(!TradeStatus::Paid.can_transition_to(TradeStatus::Canceling));
        }

        #[test]
        fn unfunded_cancel_goes_straight_to_canceled() {
            assert!(TradeStatus::Created.can_transition_to(TradeStatus::Canceled));
            assert!(TradeStatus::Accepted.can_transition_to(TradeStatus::Canceled));
            assert!(!TradeStatus::Funding.can_transition_to(TradeStatus::Canceled));
        }

        #[test]
        fn arbitration_only_resolves_by_completing() {
            assert_eq!(
                TradeStatus::Arbitrating.valid_transitions(),
                vec![TradeStatus::Completing]
            );
        }

        #[test]
        fn created_cannot_arbitrate() {
            assert!(!TradeStatus::Created.can_transition_to(TradeStatus::Arbitrating));
        }
    }

    mod reachability {
        use super::*;

        #[test]
        fn status_reaches_itself() {
            for status in TradeStatus::ALL {
                assert!(status.can_reach(status));
            }
        }

        #[test]
        fn created_reaches_every_status() {
            for status in TradeStatus::ALL {
                assert!(TradeStatus::Created.can_reach(status), "{status}");
            }
        }

        #[test]
        fn no_backwards_reach() {
            assert!(!TradeStatus::Funded.can_reach(TradeStatus::Funding));
            assert!(!TradeStatus::Arbitrating.can_reach(TradeStatus::Paid));
            assert!(!TradeStatus::Completing.can_reach(TradeStatus::Arbitrating));
        }

        #[test]
        fn terminal_reaches_only_itself() {
            for terminal in [TradeStatus::Completed, TradeStatus::Canceled] {
                for status in TradeStatus::ALL {
                    assert_eq!(terminal.can_reach(status), status == terminal);
                }
            }
        }
    }

    mod helpers {
        use super::*;

        #[test]
        fn allows_arbitration() {
            assert!(!TradeStatus::Created.allows_arbitration());
            assert!(TradeStatus::Accepted.allows_arbitration());
            assert!(TradeStatus::Paid.allows_arbitration());
            assert!(TradeStatus::Funding.allows_arbitration());
            assert!(!TradeStatus::Canceling.allows_arbitration());
            assert!(!TradeStatus::Completing.allows_arbitration());
            assert!(!TradeStatus::Arbitrating.allows_arbitration());
            assert!(!TradeStatus::Completed.allows_arbitration());
        }

        #[test]
        fn is_funded() {
            assert!(TradeStatus::Funded.is_funded());
            assert!(TradeStatus::Paid.is_funded());
            assert!(!TradeStatus::Funding.is_funded());
        }
    }

    mod conversion {
        use super::*;

        #[test]
        fn roundtrip_u8() {
            for status in TradeStatus::ALL {
                assert_eq!(TradeStatus::try_from(status.as_u8()).unwrap(), status);
            }
        }

        #[test]
        fn try_from_u8_invalid() {
            assert_eq!(TradeStatus::try_from(10), Err(InvalidTradeStatusError(10)));
        }

        #[test]
        fn display_matches_serde() {
            for status in TradeStatus::ALL {
                let json = serde_json::to_string(&status).unwrap();
                assert_eq!(json, format!("\"{status}\""));
            }
        }
    }
}
