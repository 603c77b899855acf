//! Angle/time conversions driven by the measured revolution period.
//!
//! Every conversion works on a single period snapshot supplied by the
//! position-tracking layer. Nothing is smoothed or cached here: callers
//! convert again after the period changes. A stalled engine has no period at
//! all, which [`RevolutionPeriod`] expresses by refusing zero, so the
//! division-by-zero guard lives wherever the period is first obtained.

use core::num::NonZeroU32;
use core::time::Duration;

/// Crank angle in whole degrees. Signed because intermediate results may sit
/// one cycle outside the nominal range.
pub type Angle = i32;

/// Timer delay in microseconds.
pub type Micros = u32;

/// Degrees covered by one crank revolution, the span the period is measured over.
pub const DEGREES_PER_REVOLUTION: u32 = 360;

const MICROS_PER_MINUTE: u32 = 60_000_000;

/// Angular length of one engine cycle.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CycleLength {
    /// One crank revolution (two-stroke, wasted spark, or batch timing).
    Revolution,
    /// Two crank revolutions (sequential four-stroke).
    FourStroke,
}

impl CycleLength {
    /// Returns the cycle length in degrees.
    #[must_use]
    pub const fn degrees(self) -> Angle {
        match self {
            CycleLength::Revolution => 360,
            CycleLength::FourStroke => 720,
        }
    }

    /// Maps a raw degree count back to a cycle length.
    #[must_use]
    pub const fn from_degrees(degrees: Angle) -> Option<Self> {
        match degrees {
            360 => Some(CycleLength::Revolution),
            720 => Some(CycleLength::FourStroke),
            _ => None,
        }
    }

    /// Moves a negative angle forward by exactly one cycle.
    #[must_use]
    pub const fn wrap_negative(self, angle: Angle) -> Angle {
        if angle < 0 {
            angle + self.degrees()
        } else {
            angle
        }
    }

    /// Moves an angle at or past the cycle end back by exactly one cycle.
    #[must_use]
    pub const fn wrap_overflow(self, angle: Angle) -> Angle {
        if angle >= self.degrees() {
            angle - self.degrees()
        } else {
            angle
        }
    }

    /// Returns `true` when the angle lies in `[0, cycle)`.
    #[must_use]
    pub const fn contains(self, angle: Angle) -> bool {
        angle >= 0 && angle < self.degrees()
    }
}

/// Resolved bounds of one output event.
///
/// `start` is the dwell-on (or injector-open) point and `end` the fire point.
/// Each carries at most one wraparound correction, so `start > end` is a
/// legitimate result meaning the dwell straddles the cycle boundary.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EventAngles {
    pub start: Angle,
    pub end: Angle,
}

impl EventAngles {
    pub const fn new(start: Angle, end: Angle) -> Self {
        Self { start, end }
    }

    /// Returns `true` when the dwell begins before the cycle's zero point.
    #[must_use]
    pub const fn spans_wrap(&self) -> bool {
        self.start > self.end
    }
}

/// Measured duration of the most recent 360° of crank rotation.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RevolutionPeriod(NonZeroU32);

impl RevolutionPeriod {
    /// Wraps a measured period, returning `None` for a stalled engine.
    #[must_use]
    pub const fn from_micros(micros: u32) -> Option<Self> {
        match NonZeroU32::new(micros) {
            Some(value) => Some(Self(value)),
            None => None,
        }
    }

    /// Builds the period for a steady engine speed, rounded to the nearest microsecond.
    #[must_use]
    pub const fn from_rpm(rpm: u32) -> Option<Self> {
        if rpm == 0 {
            return None;
        }
        Self::from_micros(saturate(div_round_closest(
            MICROS_PER_MINUTE as u64,
            rpm as u64,
        )))
    }

    #[must_use]
    pub const fn as_micros(self) -> u32 {
        self.0.get()
    }

    /// Engine speed implied by this period, rounded to the nearest RPM.
    #[must_use]
    pub const fn rpm(self) -> u32 {
        saturate(div_round_closest(
            MICROS_PER_MINUTE as u64,
            self.0.get() as u64,
        ))
    }

    /// Degrees swept during `duration` at this speed.
    #[must_use]
    pub const fn time_to_angle(self, duration: Micros) -> u32 {
        time_to_angle(duration, self)
    }

    /// Microseconds needed to sweep `degrees` at this speed.
    #[must_use]
    pub const fn angle_to_time(self, degrees: u32) -> Micros {
        angle_to_time(degrees, self)
    }

    /// Angle equivalent of a real-time dwell at this speed.
    #[must_use]
    pub fn dwell_angle(self, dwell: Duration) -> Angle {
        self.duration_angle(dwell)
    }

    /// Degrees swept during `duration`, saturating instead of overflowing.
    #[must_use]
    pub fn duration_angle(self, duration: Duration) -> Angle {
        let micros = u32::try_from(duration.as_micros()).unwrap_or(u32::MAX);
        Angle::try_from(self.time_to_angle(micros)).unwrap_or(Angle::MAX)
    }
}

/// Converts a duration into the crank angle swept at the given speed.
#[must_use]
pub const fn time_to_angle(duration: Micros, period: RevolutionPeriod) -> u32 {
    let scaled = duration as u64 * DEGREES_PER_REVOLUTION as u64;
    saturate(div_round_closest(scaled, period.as_micros() as u64))
}

/// Converts a crank angle into the time needed to sweep it at the given speed.
#[must_use]
pub const fn angle_to_time(degrees: u32, period: RevolutionPeriod) -> Micros {
    let scaled = degrees as u64 * period.as_micros() as u64;
    saturate(div_round_closest(scaled, DEGREES_PER_REVOLUTION as u64))
}

const fn div_round_closest(numerator: u64, denominator: u64) -> u64 {
    (numerator + denominator / 2) / denominator
}

#[allow(clippy::cast_possible_truncation)]
const fn saturate(value: u64) -> u32 {
    if value > u32::MAX as u64 {
        u32::MAX
    } else {
        value as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn period(micros: u32) -> RevolutionPeriod {
        RevolutionPeriod::from_micros(micros).expect("non-zero period")
    }

    #[test]
    fn four_thousand_rpm_is_fifteen_milliseconds() {
        let period = RevolutionPeriod::from_rpm(4_000).expect("period");
        assert_eq!(period.as_micros(), 15_000);
        assert_eq!(period.rpm(), 4_000);
    }

    #[test]
    fn stalled_engine_has_no_period() {
        assert!(RevolutionPeriod::from_micros(0).is_none());
        assert!(RevolutionPeriod::from_rpm(0).is_none());
    }

    #[test]
    fn dwell_of_four_milliseconds_spans_ninety_six_degrees() {
        let period = period(15_000);
        assert_eq!(period.time_to_angle(4_000), 96);
        assert_eq!(period.dwell_angle(Duration::from_millis(4)), 96);
    }

    #[test]
    fn angle_to_time_rounds_to_nearest_microsecond() {
        let period = period(15_000);
        assert_eq!(angle_to_time(304, period), 12_667);
        assert_eq!(angle_to_time(349, period), 14_542);
        assert_eq!(angle_to_time(0, period), 0);
        assert_eq!(angle_to_time(360, period), 15_000);
    }

    #[test]
    fn conversions_round_trip_within_one_degree_of_time() {
        for micros in [15_000_u32, 6_000, 60_000, 120_000] {
            let period = period(micros);
            let tolerance = micros / DEGREES_PER_REVOLUTION + 1;
            for duration in [0_u32, 1_000, 3_000, 4_000, 9_999, 25_000] {
                let back = angle_to_time(time_to_angle(duration, period), period);
                assert!(
                    back.abs_diff(duration) <= tolerance,
                    "{duration}us at {micros}us/rev came back as {back}us"
                );
            }
        }
    }

    #[test]
    fn huge_inputs_saturate_instead_of_wrapping() {
        let slow = period(u32::MAX);
        assert_eq!(angle_to_time(u32::MAX, slow), u32::MAX);
        assert_eq!(time_to_angle(u32::MAX, period(1)), u32::MAX);
    }

    #[test]
    fn single_wraparound_helpers() {
        let cycle = CycleLength::Revolution;
        assert_eq!(cycle.wrap_negative(-40), 320);
        assert_eq!(cycle.wrap_negative(40), 40);
        assert_eq!(cycle.wrap_overflow(400), 40);
        assert_eq!(cycle.wrap_overflow(360), 0);
        assert_eq!(cycle.wrap_overflow(359), 359);
        // One correction only.
        assert_eq!(cycle.wrap_negative(-400), -40);
        assert!(cycle.contains(0));
        assert!(!cycle.contains(360));
        assert_eq!(CycleLength::from_degrees(720), Some(CycleLength::FourStroke));
        assert_eq!(CycleLength::from_degrees(540), None);
    }
}
