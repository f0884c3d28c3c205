//! # Freshness Policy
//!
//! Maximum tolerable age of a cached value before it has to be refetched.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, SystemTime};

const MINUTE_MS: i64 = 60 * 1000;
const HOUR_MS: i64 = 60 * MINUTE_MS;
const DAY_MS: i64 = 24 * HOUR_MS;
const WEEK_MS: i64 = 7 * DAY_MS;

/// Named maximum-age spans
///
/// `Immediately` has a zero span, so any measurable age is stale.
/// `Eternity` carries a negative sentinel span and is never stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Freshness {
    Immediately,
    OneMinute,
    OneHour,
    OneDay,
    OneWeek,
    Eternity,
}

impl Freshness {
    /// All policies, shortest span first
    pub const ALL: [Freshness; 6] = [
        Freshness::Immediately,
        Freshness::OneMinute,
        Freshness::OneHour,
        Freshness::OneDay,
        Freshness::OneWeek,
        Freshness::Eternity,
    ];

    /// Span in milliseconds; `-1` for `Eternity`
    pub const fn span_millis(self) -> i64 {
        match self {
            Freshness::Immediately => 0,
            Freshness::OneMinute => MINUTE_MS,
            Freshness::OneHour => HOUR_MS,
            Freshness::OneDay => DAY_MS,
            Freshness::OneWeek => WEEK_MS,
            Freshness::Eternity => -1,
        }
    }

    /// Span as a `Duration`, `None` when the policy never expires
    pub fn span(self) -> Option<Duration> {
        let millis = self.span_millis();
        (millis >= 0).then(|| Duration::from_millis(millis as u64))
    }

    /// Is this span exceeded by the distance between `t1` and `t2`?
    ///
    /// Order of the timestamps is irrelevant.
    pub fn is_exceeded(self, t1: SystemTime, t2: SystemTime) -> bool {
        let Some(span) = self.span() else {
            return false;
        };

        let distance = match t2.duration_since(t1) {
            Ok(forward) => forward,
            Err(backward) => backward.duration(),
        };

        distance > span
    }

    pub fn name(self) -> &'static str {
        match self {
            Freshness::Immediately => "immediately",
            Freshness::OneMinute => "one_minute",
            Freshness::OneHour => "one_hour",
            Freshness::OneDay => "one_day",
            Freshness::OneWeek => "one_week",
            Freshness::Eternity => "eternity",
        }
    }
}

impl Default for Freshness {
    fn default() -> Self {
        Freshness::Immediately
    }
}

impl fmt::Display for Freshness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
