use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::timer::{Timestamp, saturating_nanos};

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Deadline for the current phase.
///
/// Armed once on phase entry with `(now, budget)`. `remaining` only shrinks
/// while the clock moves forward, and `poll` reports the expiry edge exactly
/// once; re-arming for the next phase is the only way to clear it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deadline {
    armed_at: Timestamp,
    budget_ns: Option<u64>,
    fired: bool,
}

impl Deadline {
    /// `budget = None` never expires (`Intro`, `Summary`).
    pub fn arm(now: Timestamp, budget: Option<Duration>) -> Self {
        Self {
            armed_at: now,
            budget_ns: budget.map(saturating_nanos),
            fired: false,
        }
    }

    pub fn unbounded(now: Timestamp) -> Self {
        Self::arm(now, None)
    }

    pub fn armed_at(&self) -> Timestamp {
        self.armed_at
    }

    pub fn budget(&self) -> Option<Duration> {
        self.budget_ns.map(Duration::from_nanos)
    }

    pub fn is_bounded(&self) -> bool {
        self.budget_ns.is_some()
    }

    pub fn elapsed(&self, now: Timestamp) -> Duration {
        Duration::from_nanos(now.saturating_sub(self.armed_at))
    }

    /// `max(0, budget - (now - armed_at))`, or `None` when unbounded.
    pub fn remaining(&self, now: Timestamp) -> Option<Duration> {
        let budget = self.budget_ns?;
        let spent = now.saturating_sub(self.armed_at);
        Some(Duration::from_nanos(budget.saturating_sub(spent)))
    }

    /// Whole seconds left, rounded up, for the on-screen countdown.
    pub fn remaining_secs(&self, now: Timestamp) -> Option<u64> {
        self.remaining(now)
            .map(|r| saturating_nanos(r).div_ceil(NANOS_PER_SEC))
    }

    pub fn is_reached(&self, now: Timestamp) -> bool {
        self.remaining(now).is_some_and(|r| r.is_zero())
    }

    pub fn has_fired(&self) -> bool {
        self.fired
    }

    /// True on the first call that observes the deadline, false afterwards.
    pub fn poll(&mut self, now: Timestamp) -> bool {
        if self.fired || !self.is_reached(now) {
            return false;
        }
        self.fired = true;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const SEC: u64 = NANOS_PER_SEC;

    #[test]
    fn remaining_counts_down_to_zero() {
        let d = Deadline::arm(10 * SEC, Some(Duration::from_secs(30)));
        assert_eq!(d.remaining(10 * SEC), Some(Duration::from_secs(30)));
        assert_eq!(d.remaining(25 * SEC), Some(Duration::from_secs(15)));
        assert_eq!(d.remaining(40 * SEC), Some(Duration::ZERO));
        assert_eq!(d.remaining(99 * SEC), Some(Duration::ZERO));
    }

    #[test]
    fn countdown_seconds_round_up() {
        let d = Deadline::arm(0, Some(Duration::from_secs(30)));
        assert_eq!(d.remaining_secs(0), Some(30));
        assert_eq!(d.remaining_secs(SEC / 2), Some(30));
        assert_eq!(d.remaining_secs(29 * SEC + 1), Some(1));
        assert_eq!(d.remaining_secs(30 * SEC), Some(0));
    }

    #[test]
    fn poll_fires_once() {
        let mut d = Deadline::arm(0, Some(Duration::from_secs(1)));
        assert!(!d.poll(SEC - 1));
        assert!(d.poll(SEC));
        assert!(!d.poll(SEC));
        assert!(!d.poll(5 * SEC));
        assert!(d.has_fired());
    }

    #[test]
    fn rearming_clears_the_edge() {
        let mut d = Deadline::arm(0, Some(Duration::from_secs(1)));
        assert!(d.poll(2 * SEC));
        d = Deadline::arm(2 * SEC, Some(Duration::from_secs(1)));
        assert!(!d.poll(2 * SEC));
        assert_eq!(d.remaining(2 * SEC), Some(Duration::from_secs(1)));
    }

    #[test]
    fn huge_budgets_saturate_instead_of_wrapping() {
        let budget = Duration::from_secs(20_000_000_000);
        let mut d = Deadline::arm(0, Some(budget));
        assert_eq!(d.budget(), Some(Duration::from_nanos(u64::MAX)));
        assert!(!d.poll(365 * 24 * 3600 * SEC));
        assert!(d.remaining_secs(0).is_some_and(|s| s > 500 * 365 * 24 * 3600));
    }

    #[test]
    fn unbounded_never_fires() {
        let mut d = Deadline::unbounded(0);
        assert_eq!(d.remaining(u64::MAX), None);
        assert!(!d.poll(u64::MAX));
    }

    proptest! {
        #[test]
        fn remaining_is_non_increasing(
            budget_ms in 1u64..200_000,
            steps in prop::collection::vec(0u64..5_000_000_000, 1..50),
        ) {
            let d = Deadline::arm(7, Some(Duration::from_millis(budget_ms)));
            let mut now = 7;
            let mut last = d.remaining(now).unwrap();
            prop_assert_eq!(last, Duration::from_millis(budget_ms));
            for step in steps {
                now += step;
                let r = d.remaining(now).unwrap();
                prop_assert!(r <= last);
                last = r;
            }
        }
    }
}
