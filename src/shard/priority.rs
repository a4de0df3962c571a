//! Queue priority lanes.
//!
//! Each ring node serves two queues. Subscribed installations go to the
//! `high` lane, everyone else to `low`.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::Subscription;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum QueuePriority {
    #[default]
    Low = 0,
    High = 1,
}

impl QueuePriority {
    /// Lane for a subscription.
    pub fn for_subscription(subscription: &Subscription) -> Self {
        if subscription.subscribed {
            QueuePriority::High
        } else {
            QueuePriority::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QueuePriority::Low => "low",
            QueuePriority::High => "high",
        }
    }
}

impl fmt::Display for QueuePriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribed_is_high() {
        assert_eq!(
            QueuePriority::for_subscription(&Subscription::new("t", true)),
            QueuePriority::High
        );
    }

    #[test]
    fn unsubscribed_is_low_even_with_token() {
        assert_eq!(
            QueuePriority::for_subscription(&Subscription::new("t", false)),
            QueuePriority::Low
        );
        assert_eq!(
            QueuePriority::for_subscription(&Subscription::default()),
            QueuePriority::Low
        );
    }

    #[test]
    fn high_orders_above_low() {
        assert!(QueuePriority::High > QueuePriority::Low);
    }

    #[test]
    fn display() {
        assert_eq!(QueuePriority::High.to_string(), "high");
        assert_eq!(QueuePriority::Low.to_string(), "low");
    }
}
