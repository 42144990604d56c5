// badge.rs — Traffic-light SLA badge for a single deadline.
//
// The badge compares a deadline with "now":
//   due - now <= 0             → red   (exactly on the deadline is already late)
//   0 < due - now <= window    → amber (exactly `window` out is still amber)
//   otherwise                  → green

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Default amber window: six hours before the deadline.
pub const DEFAULT_AMBER_WINDOW_HOURS: i64 = 6;

/// Ordered by severity, so `max()` picks the worse badge.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum SlaBadge {
    Green,
    Amber,
    Red,
}

impl SlaBadge {
    /// Rank used by the priority scorer: red=3, amber=2, green=1.
    pub fn rank(self) -> u8 {
        match self {
            SlaBadge::Green => 1,
            SlaBadge::Amber => 2,
            SlaBadge::Red => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SlaBadge::Green => "green",
            SlaBadge::Amber => "amber",
            SlaBadge::Red => "red",
        }
    }
}

impl fmt::Display for SlaBadge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SlaBadge {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "green" => Ok(SlaBadge::Green),
            "amber" => Ok(SlaBadge::Amber),
            "red" => Ok(SlaBadge::Red),
            other => Err(format!("unknown SLA badge '{}'", other)),
        }
    }
}

/// Badge for `due` as seen at `now`.
pub fn evaluate(due: DateTime<Utc>, now: DateTime<Utc>, amber_window: Duration) -> SlaBadge {
    let remaining = due - now;
    if remaining <= Duration::zero() {
        SlaBadge::Red
    } else if remaining <= amber_window {
        SlaBadge::Amber
    } else {
        SlaBadge::Green
    }
}

/// `evaluate` with the default six hour window.
pub fn evaluate_default(due: DateTime<Utc>, now: DateTime<Utc>) -> SlaBadge {
    evaluate(due, now, Duration::hours(DEFAULT_AMBER_WINDOW_HOURS))
}
