#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Remembers which advance and speed the scheduler last saw.

use timing_core::{Angle, RevolutionPeriod};

use crate::status::EngineSnapshot;

/// Advance and revolution period handed to the scheduler together.
pub type OperatingPoint = (Angle, RevolutionPeriod);

impl EngineSnapshot {
    pub const fn operating_point(&self) -> OperatingPoint {
        (self.advance, self.period)
    }
}

/// Tracks the last applied and the last rejected operating point.
#[derive(Default)]
pub struct OperatingPointTracker {
    applied: Option<OperatingPoint>,
    rejected: Option<OperatingPoint>,
}

impl OperatingPointTracker {
    pub const fn new() -> Self {
        Self {
            applied: None,
            rejected: None,
        }
    }

    /// Returns `true` when `point` was neither applied nor rejected last.
    pub fn is_new(&self, point: OperatingPoint) -> bool {
        self.applied != Some(point) && self.rejected != Some(point)
    }

    pub fn accept(&mut self, point: OperatingPoint) {
        self.applied = Some(point);
        self.rejected = None;
    }

    pub fn reject(&mut self, point: OperatingPoint) {
        self.rejected = Some(point);
    }

    /// Forgets both points, returning `true` if one had been applied.
    pub fn reset(&mut self) -> bool {
        self.rejected = None;
        self.applied.take().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(advance: Angle, rpm: u32) -> OperatingPoint {
        (advance, RevolutionPeriod::from_rpm(rpm).expect("running engine"))
    }

    #[test]
    fn rejected_point_is_only_tried_once() {
        let mut tracker = OperatingPointTracker::new();
        assert!(tracker.is_new(point(10, 4_000)));
        tracker.accept(point(10, 4_000));
        assert!(!tracker.is_new(point(10, 4_000)));

        tracker.reject(point(120, 4_000));
        assert!(!tracker.is_new(point(120, 4_000)));
        assert!(tracker.is_new(point(20, 4_000)));
        assert!(tracker.is_new(point(120, 3_000)));

        tracker.accept(point(20, 4_000));
        assert!(tracker.is_new(point(120, 4_000)));
    }

    #[test]
    fn reset_reports_whether_anything_was_applied() {
        let mut tracker = OperatingPointTracker::new();
        tracker.reject(point(120, 4_000));
        assert!(!tracker.reset());
        assert!(tracker.is_new(point(120, 4_000)));

        tracker.accept(point(10, 4_000));
        assert!(tracker.reset());
        assert!(!tracker.reset());
    }
}
