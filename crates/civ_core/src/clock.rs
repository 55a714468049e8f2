//! Simulated time.
//!
//! Ticks are logical steps, not seconds. The engine never reads the wall
//! clock; callers pass timestamps in and get back the number of ticks that
//! are due. The same primitive drives the real-time loop (called every few
//! hundred milliseconds) and the offline catch-up pass (called once on
//! resume with the time since the last save).

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default real-time length of one tick in milliseconds.
pub const DEFAULT_TICK_MILLIS: u64 = 1000;

/// Number of whole ticks that fit between two timestamps.
///
/// Returns zero when `to` is not after `from` or `tick_duration` is zero.
/// The result is limited to `cap` when one is given.
#[must_use]
pub fn catch_up_ticks(
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    tick_duration: Duration,
    cap: Option<u64>,
) -> u64 {
    let tick_millis = tick_duration.as_millis();
    if tick_millis == 0 {
        return 0;
    }
    let Ok(elapsed) = (to - from).to_std() else {
        return 0;
    };

    let ticks = u64::try_from(elapsed.as_millis() / tick_millis).unwrap_or(u64::MAX);
    match cap {
        Some(cap) => ticks.min(cap),
        None => ticks,
    }
}

/// Tracks how much real time has been turned into ticks.
///
/// Time that does not add up to a whole tick is carried into the next
/// call, so a late wake-up yields two ticks instead of losing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clock {
    tick_duration: Duration,
    last_update: DateTime<Utc>,
}

impl Clock {
    /// Start a clock at `now`.
    #[must_use]
    pub const fn new(tick_duration: Duration, now: DateTime<Utc>) -> Self {
        Self {
            tick_duration,
            last_update: now,
        }
    }

    /// Real-time length of one tick.
    #[must_use]
    pub const fn tick_duration(&self) -> Duration {
        self.tick_duration
    }

    /// Timestamp up to which time has been accounted for.
    #[must_use]
    pub const fn last_update(&self) -> DateTime<Utc> {
        self.last_update
    }

    /// Ticks due at `now`, marking them as consumed.
    ///
    /// When `cap` truncates the count, the surplus time is dropped rather
    /// than carried.
    pub fn due_ticks(&mut self, now: DateTime<Utc>, cap: Option<u64>) -> u64 {
        let uncapped = catch_up_ticks(self.last_update, now, self.tick_duration, None);
        let ticks = cap.map_or(uncapped, |cap| uncapped.min(cap));

        if ticks < uncapped {
            self.last_update = now;
            return ticks;
        }

        let consumed = u32::try_from(ticks)
            .ok()
            .and_then(|t| self.tick_duration.checked_mul(t))
            .and_then(|d| chrono::Duration::from_std(d).ok());
        self.last_update = match consumed {
            Some(consumed) => self.last_update + consumed,
            None => now,
        };
        ticks
    }

    /// Forget any pending time, e.g. after loading a save.
    pub fn reset(&mut self, now: DateTime<Utc>) {
        self.last_update = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(millis: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_700_000_000_000 + millis).unwrap()
    }

    #[test]
    fn test_catch_up_ticks() {
        let second = Duration::from_secs(1);
        assert_eq!(catch_up_ticks(at(0), at(10_500), second, None), 10);
        assert_eq!(catch_up_ticks(at(0), at(10_500), second, Some(4)), 4);
        assert_eq!(catch_up_ticks(at(5_000), at(0), second, None), 0);
        assert_eq!(catch_up_ticks(at(0), at(5_000), Duration::ZERO, None), 0);
    }

    #[test]
    fn test_clock_carries_remainder() {
        let mut clock = Clock::new(Duration::from_millis(1000), at(0));
        assert_eq!(clock.due_ticks(at(600), None), 0);
        assert_eq!(clock.due_ticks(at(1_200), None), 1);
        assert_eq!(clock.last_update(), at(1_000));
        assert_eq!(clock.due_ticks(at(3_100), None), 2);
        assert_eq!(clock.last_update(), at(3_000));
    }

    #[test]
    fn test_clock_cap_drops_surplus() {
        let mut clock = Clock::new(Duration::from_millis(100), at(0));
        assert_eq!(clock.due_ticks(at(10_000), Some(5)), 5);
        assert_eq!(clock.last_update(), at(10_000));
        assert_eq!(clock.due_ticks(at(10_050), Some(5)), 0);
    }
}
