//! Engine timing configuration and the validation that keeps it in domain.
//!
//! The calculators apply at most one wraparound correction and never check
//! their inputs, so anything that could need two corrections has to be
//! rejected here, before it reaches the interrupt path.

use core::fmt;
use core::time::Duration;

use crate::angle::{Angle, CycleLength};

/// Largest advance (or retard) the resolver can absorb with one correction.
pub const MAX_ADVANCE_DEGREES: Angle = 90;
/// Largest split between leading and trailing rotor outputs.
pub const MAX_ROTARY_SPLIT_DEGREES: Angle = 90;
/// Dwell applied when nothing else is configured.
pub const DEFAULT_DWELL: Duration = Duration::from_millis(4);
/// Longest dwell accepted; beyond this a coil overheats long before it fires.
pub const MAX_DWELL: Duration = Duration::from_millis(20);
/// Crank angle left between a spark and the same coil's next dwell-on point.
pub const MIN_SPARK_GAP_DEGREES: Angle = 10;

/// Timing parameters that only change on reconfiguration.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TimingConfig {
    pub ignition_cycle: CycleLength,
    pub injection_cycle: CycleLength,
    pub dwell: Duration,
    pub rotary_split: Angle,
}

impl TimingConfig {
    /// Sequential four-stroke defaults with a single rotor output.
    pub const fn new() -> Self {
        Self {
            ignition_cycle: CycleLength::FourStroke,
            injection_cycle: CycleLength::FourStroke,
            dwell: DEFAULT_DWELL,
            rotary_split: 0,
        }
    }

    #[must_use]
    pub const fn with_cycles(mut self, ignition: CycleLength, injection: CycleLength) -> Self {
        self.ignition_cycle = ignition;
        self.injection_cycle = injection;
        self
    }

    #[must_use]
    pub const fn with_dwell(mut self, dwell: Duration) -> Self {
        self.dwell = dwell;
        self
    }

    #[must_use]
    pub const fn with_rotary_split(mut self, split: Angle) -> Self {
        self.rotary_split = split;
        self
    }

    /// Checks the static parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dwell.is_zero() || self.dwell > MAX_DWELL {
            return Err(ConfigError::DwellOutOfRange(self.dwell));
        }
        if !(0..=MAX_ROTARY_SPLIT_DEGREES).contains(&self.rotary_split) {
            return Err(ConfigError::RotarySplitOutOfRange(self.rotary_split));
        }
        Ok(())
    }

    /// Checks that a channel's nominal angle lies inside the ignition cycle.
    pub fn validate_channel_angle(&self, angle: Angle) -> Result<(), ConfigError> {
        check_channel_angle(angle, self.ignition_cycle)
    }

    /// Checks that an injector's nominal angle lies inside the injection cycle.
    pub fn validate_injection_channel_angle(&self, angle: Angle) -> Result<(), ConfigError> {
        check_channel_angle(angle, self.injection_cycle)
    }

    /// Largest dwell angle the ignition cycle can hold.
    ///
    /// A real-time dwell turns into more than a whole cycle at high speed,
    /// which one wraparound correction cannot absorb; the dwell is cut down
    /// to this instead.
    pub const fn max_dwell_angle(&self) -> Angle {
        self.ignition_cycle.degrees() - MIN_SPARK_GAP_DEGREES
    }

    /// Checks that an advance can be resolved with a single correction.
    pub fn validate_advance(&self, advance: Angle) -> Result<(), ConfigError> {
        if (-MAX_ADVANCE_DEGREES..=MAX_ADVANCE_DEGREES).contains(&advance) {
            Ok(())
        } else {
            Err(ConfigError::AdvanceOutOfRange(advance))
        }
    }
}

fn check_channel_angle(angle: Angle, cycle: CycleLength) -> Result<(), ConfigError> {
    if cycle.contains(angle) {
        Ok(())
    } else {
        Err(ConfigError::ChannelAngleOutOfRange { angle, cycle })
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Reasons a configuration is refused before it reaches the timing path.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ConfigError {
    AdvanceOutOfRange(Angle),
    DwellOutOfRange(Duration),
    RotarySplitOutOfRange(Angle),
    ChannelAngleOutOfRange { angle: Angle, cycle: CycleLength },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::AdvanceOutOfRange(advance) => write!(
                f,
                "advance {advance} outside ±{MAX_ADVANCE_DEGREES} degrees"
            ),
            ConfigError::DwellOutOfRange(dwell) => {
                write!(f, "dwell {}us outside (0, {}us]", dwell.as_micros(), MAX_DWELL.as_micros())
            }
            ConfigError::RotarySplitOutOfRange(split) => write!(
                f,
                "rotary split {split} outside 0..={MAX_ROTARY_SPLIT_DEGREES} degrees"
            ),
            ConfigError::ChannelAngleOutOfRange { angle, cycle } => write!(
                f,
                "channel angle {angle} outside 0..{} degrees",
                cycle.degrees()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use std::string::ToString;

    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = TimingConfig::default();
        assert_eq!(config.ignition_cycle, CycleLength::FourStroke);
        assert_eq!(config.dwell, DEFAULT_DWELL);
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn rejects_zero_and_excessive_dwell() {
        let zero = TimingConfig::new().with_dwell(Duration::ZERO);
        assert_eq!(
            zero.validate(),
            Err(ConfigError::DwellOutOfRange(Duration::ZERO))
        );

        let long = TimingConfig::new().with_dwell(MAX_DWELL + Duration::from_micros(1));
        assert!(matches!(
            long.validate(),
            Err(ConfigError::DwellOutOfRange(_))
        ));
    }

    #[test]
    fn rejects_negative_or_wide_rotary_split() {
        assert_eq!(
            TimingConfig::new().with_rotary_split(-1).validate(),
            Err(ConfigError::RotarySplitOutOfRange(-1))
        );
        assert_eq!(
            TimingConfig::new().with_rotary_split(91).validate(),
            Err(ConfigError::RotarySplitOutOfRange(91))
        );
        assert_eq!(TimingConfig::new().with_rotary_split(40).validate(), Ok(()));
    }

    #[test]
    fn channel_angle_must_fit_the_ignition_cycle() {
        let config = TimingConfig::new().with_cycles(CycleLength::Revolution, CycleLength::Revolution);
        assert_eq!(config.validate_channel_angle(0), Ok(()));
        assert_eq!(config.validate_channel_angle(359), Ok(()));
        assert_eq!(
            config.validate_channel_angle(360),
            Err(ConfigError::ChannelAngleOutOfRange {
                angle: 360,
                cycle: CycleLength::Revolution,
            })
        );
        assert_eq!(
            TimingConfig::new().validate_channel_angle(600),
            Ok(())
        );
    }

    #[test]
    fn injector_angle_is_checked_against_the_injection_cycle() {
        let config = TimingConfig::new().with_cycles(CycleLength::FourStroke, CycleLength::Revolution);
        assert_eq!(config.validate_channel_angle(540), Ok(()));
        assert_eq!(
            config.validate_injection_channel_angle(540),
            Err(ConfigError::ChannelAngleOutOfRange {
                angle: 540,
                cycle: CycleLength::Revolution,
            })
        );
    }

    #[test]
    fn advance_is_bounded_both_ways() {
        let config = TimingConfig::new();
        assert_eq!(config.validate_advance(-90), Ok(()));
        assert_eq!(config.validate_advance(90), Ok(()));
        assert_eq!(
            config.validate_advance(91),
            Err(ConfigError::AdvanceOutOfRange(91))
        );
    }

    #[test]
    fn dwell_angle_limit_leaves_a_spark_gap() {
        let revolution =
            TimingConfig::new().with_cycles(CycleLength::Revolution, CycleLength::Revolution);
        assert_eq!(revolution.max_dwell_angle(), 350);
        assert_eq!(TimingConfig::new().max_dwell_angle(), 710);
    }

    #[test]
    fn display_mentions_offending_value() {
        let message = ConfigError::AdvanceOutOfRange(120).to_string();
        assert!(message.contains("120"), "unexpected message: {message}");
    }
}
