//! Order lifecycle state machine.

use serde::{Deserialize, Serialize};

/// The status of an order in its lifecycle.
///
/// State transitions:
/// ```text
/// Pending ──► Confirmed ──► Processing ──► Shipped ──► Delivered
///    │            │              │
///    └────────────┴──────────────┴──► Cancelled
///
/// Returned (administrative only, never assigned here)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Order was placed and awaits confirmation.
    #[default]
    Pending,

    /// Order was confirmed (manually or by a successful payment).
    Confirmed,

    /// Order is being prepared.
    Processing,

    /// Order left the warehouse.
    Shipped,

    /// Order reached the buyer (terminal state).
    Delivered,

    /// Order was cancelled (terminal state).
    Cancelled,

    /// Order was returned (terminal state).
    Returned,
}

/// A lifecycle operation that moves an order to another status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transition {
    Confirm,
    StartProcessing,
    Ship,
    Deliver,
    Cancel,
}

impl Transition {
    /// Returns the operation name used in errors and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Transition::Confirm => "confirm",
            Transition::StartProcessing => "start processing",
            Transition::Ship => "ship",
            Transition::Deliver => "deliver",
            Transition::Cancel => "cancel",
        }
    }

    /// Returns the transition that leads to `target`, if one exists.
    ///
    /// `Pending` and `Returned` are never the target of a lifecycle operation.
    pub fn to_status(target: OrderStatus) -> Option<Self> {
        match target {
            OrderStatus::Confirmed => Some(Transition::Confirm),
            OrderStatus::Processing => Some(Transition::StartProcessing),
            OrderStatus::Shipped => Some(Transition::Ship),
            OrderStatus::Delivered => Some(Transition::Deliver),
            OrderStatus::Cancelled => Some(Transition::Cancel),
            OrderStatus::Pending | OrderStatus::Returned => None,
        }
    }
}

impl std::fmt::Display for Transition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl OrderStatus {
    /// Returns the status reached by applying `transition`, or `None` if the
    /// transition is not legal from this status.
    pub fn transition(self, transition: Transition) -> Option<OrderStatus> {
        use OrderStatus::*;
        use Transition::*;

        match (self, transition) {
            (Pending, Confirm) => Some(Confirmed),
            (Confirmed, StartProcessing) => Some(Processing),
            (Processing, Ship) => Some(Shipped),
            (Shipped, Deliver) => Some(Delivered),
            (Pending | Confirmed | Processing, Cancel) => Some(Cancelled),
            (Pending, StartProcessing | Ship | Deliver)
            | (Confirmed, Confirm | Ship | Deliver)
            | (Processing, Confirm | StartProcessing | Deliver)
            | (Shipped, Confirm | StartProcessing | Ship | Cancel)
            | (Delivered | Cancelled | Returned, _) => None,
        }
    }

    /// Returns true if `transition` is legal from this status.
    pub fn allows(self, transition: Transition) -> bool {
        self.transition(transition).is_some()
    }

    /// Returns true if the order can still be cancelled.
    pub fn can_be_cancelled(&self) -> bool {
        matches!(
            self,
            OrderStatus::Pending | OrderStatus::Confirmed | OrderStatus::Processing
        )
    }

    /// Returns true if this is a terminal state (no further transitions possible).
    pub fn is_finalized(&self) -> bool {
        matches!(
            self,
            OrderStatus::Delivered | OrderStatus::Cancelled | OrderStatus::Returned
        )
    }

    /// Returns the status code.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Confirmed => "CONFIRMED",
            OrderStatus::Processing => "PROCESSING",
            OrderStatus::Shipped => "SHIPPED",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Returned => "RETURNED",
        }
    }

    /// Returns a human-readable description.
    pub fn description(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Confirmed => "Confirmed",
            OrderStatus::Processing => "Processing",
            OrderStatus::Shipped => "Shipped",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::Cancelled => "Cancelled",
            OrderStatus::Returned => "Returned",
        }
    }

    /// All statuses, in lifecycle order.
    pub const ALL: [OrderStatus; 7] = [
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
        OrderStatus::Returned,
    ];
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown order status: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRANSITIONS: [Transition; 5] = [
        Transition::Confirm,
        Transition::StartProcessing,
        Transition::Ship,
        Transition::Deliver,
        Transition::Cancel,
    ];

    #[test]
    fn test_default_status_is_pending() {
        assert_eq!(OrderStatus::default(), OrderStatus::Pending);
    }

    #[test]
    fn test_happy_path_edges() {
        assert_eq!(
            OrderStatus::Pending.transition(Transition::Confirm),
            Some(OrderStatus::Confirmed)
        );
        assert_eq!(
            OrderStatus::Confirmed.transition(Transition::StartProcessing),
            Some(OrderStatus::Processing)
        );
        assert_eq!(
            OrderStatus::Processing.transition(Transition::Ship),
            Some(OrderStatus::Shipped)
        );
        assert_eq!(
            OrderStatus::Shipped.transition(Transition::Deliver),
            Some(OrderStatus::Delivered)
        );
    }

    #[test]
    fn test_cancel_only_before_shipping() {
        assert!(OrderStatus::Pending.allows(Transition::Cancel));
        assert!(OrderStatus::Confirmed.allows(Transition::Cancel));
        assert!(OrderStatus::Processing.allows(Transition::Cancel));
        assert!(!OrderStatus::Shipped.allows(Transition::Cancel));
        assert!(!OrderStatus::Delivered.allows(Transition::Cancel));
    }

    #[test]
    fn test_ship_from_pending_is_illegal() {
        assert!(!OrderStatus::Pending.allows(Transition::Ship));
    }

    #[test]
    fn test_terminal_states_reject_every_transition() {
        for status in [
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
            OrderStatus::Returned,
        ] {
            assert!(status.is_finalized());
            for transition in TRANSITIONS {
                assert!(!status.allows(transition), "{status} allowed {transition}");
            }
        }
    }

    #[test]
    fn test_can_be_cancelled_matches_table() {
        for status in OrderStatus::ALL {
            assert_eq!(status.can_be_cancelled(), status.allows(Transition::Cancel));
        }
    }

    #[test]
    fn test_to_status() {
        assert_eq!(
            Transition::to_status(OrderStatus::Shipped),
            Some(Transition::Ship)
        );
        assert_eq!(Transition::to_status(OrderStatus::Pending), None);
        assert_eq!(Transition::to_status(OrderStatus::Returned), None);
    }

    #[test]
    fn test_parse_and_display() {
        assert_eq!("shipped".parse::<OrderStatus>(), Ok(OrderStatus::Shipped));
        assert_eq!(" CANCELLED ".parse::<OrderStatus>(), Ok(OrderStatus::Cancelled));
        assert!("LOST".parse::<OrderStatus>().is_err());
        assert_eq!(OrderStatus::Processing.to_string(), "PROCESSING");
    }

    #[test]
    fn test_serialization() {
        let json = serde_json::to_string(&OrderStatus::Processing).unwrap();
        assert_eq!(json, "\"PROCESSING\"");
        let deserialized: OrderStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, OrderStatus::Processing);
    }
}
