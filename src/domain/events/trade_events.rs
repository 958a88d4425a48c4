//! # Trade Events
//!
//! Snapshot notifications for observers of the local trade set.

use crate::domain::entities::Trade;
use crate::domain::value_objects::{TradeId, TradeStatus};
use std::fmt;

/// Change to the local trade set.
///
/// Each event carries a full snapshot so observers never need to re-read
/// storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TradeEvent {
    /// Trade read from local storage at startup.
    Loaded(Trade),
    /// Trade persisted after a change.
    Updated(Trade),
}

impl TradeEvent {
    /// Returns the trade snapshot.
    #[inline]
    #[must_use]
    pub fn trade(&self) -> &Trade {
        match self {
            Self::Loaded(trade) | Self::Updated(trade) => trade,
        }
    }

    /// Returns the trade ID.
    #[inline]
    #[must_use]
    pub fn trade_id(&self) -> &TradeId {
        self.trade().id()
    }

    /// Returns the snapshot's status.
    #[inline]
    #[must_use]
    pub fn status(&self) -> Option<TradeStatus> {
        self.trade().status()
    }

    /// Returns the event type name.
    #[must_use]
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::Loaded(_) => "TradeLoaded",
            Self::Updated(_) => "TradeUpdated",
        }
    }
}

impl fmt::Display for TradeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.event_name(), self.trade())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::test_support::sell_trade;

    #[test]
    fn event_exposes_snapshot() {
        let trade = sell_trade();
        let event = TradeEvent::Updated(trade.clone());
        assert_eq!(event.trade_id(), trade.id());
        assert_eq!(event.status(), Some(TradeStatus::Created));
        assert_eq!(event.event_name(), "TradeUpdated");
    }
}
