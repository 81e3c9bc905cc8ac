//! Wall-clock gate on reports to the consumer.

use serde::{Deserialize, Serialize};

use crate::host::ClockTime;

/// Reference time for rate-limiting reports.
///
/// Only the minute field takes part in the comparison; the hour is recorded
/// but ignored. The reference is captured when the controller is built and is
/// not moved forward by a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportThrottle {
    reference: ClockTime,
    interval_minutes: u32,
}

impl ReportThrottle {
    pub fn new(reference: ClockTime, interval_minutes: u32) -> Self {
        Self {
            reference,
            interval_minutes,
        }
    }

    pub fn reference(&self) -> ClockTime {
        self.reference
    }

    pub fn interval_minutes(&self) -> u32 {
        self.interval_minutes
    }

    /// True when `now.minute > reference.minute + (interval - 1)`.
    pub fn is_due(&self, now: ClockTime) -> bool {
        let threshold = i64::from(self.reference.minute) + i64::from(self.interval_minutes) - 1;
        threshold < i64::from(now.minute)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_waits_for_full_interval() {
        let throttle = ReportThrottle::new(ClockTime::new(9, 10), 2);
        assert!(!throttle.is_due(ClockTime::new(9, 10)));
        assert!(!throttle.is_due(ClockTime::new(9, 11)));
        assert!(throttle.is_due(ClockTime::new(9, 12)));
        assert!(throttle.is_due(ClockTime::new(9, 59)));
    }

    #[test]
    fn hour_is_ignored() {
        let throttle = ReportThrottle::new(ClockTime::new(9, 50), 2);
        // An hour later but at a lower minute: still gated.
        assert!(!throttle.is_due(ClockTime::new(10, 5)));
        assert!(throttle.is_due(ClockTime::new(3, 52)));
    }

    #[test]
    fn one_minute_interval_opens_next_minute() {
        let throttle = ReportThrottle::new(ClockTime::new(0, 0), 1);
        assert!(!throttle.is_due(ClockTime::new(0, 0)));
        assert!(throttle.is_due(ClockTime::new(0, 1)));
    }

    #[test]
    fn zero_interval_opens_at_reference_minute() {
        let throttle = ReportThrottle::new(ClockTime::new(0, 30), 0);
        assert!(throttle.is_due(ClockTime::new(0, 30)));
        assert!(!throttle.is_due(ClockTime::new(0, 29)));
    }
}
