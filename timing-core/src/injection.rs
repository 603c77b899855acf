//! Injector opening angles.
//!
//! Injection is scheduled the same way as ignition: an opening angle resolved
//! on every operating point change and a timeout computed per tick. The
//! configured injection angle marks where the injector must have closed,
//! relative to the channel's nominal angle, so the opening point sits one
//! pulse width before it.

use core::time::Duration;

use crate::angle::{Angle, CycleLength, EventAngles, Micros, RevolutionPeriod};
use crate::config::{ConfigError, TimingConfig};
use crate::schedule::{EventOutputs, Schedule, SchedulePhase};
use crate::timeout::event_timeout;

/// Angle at which the injector must open to close at `injection_angle`.
///
/// The result is reduced into `[0, cycle)` in constant time. Unlike spark
/// angles, a pulse width can span more than one cycle at high duty, so a
/// single correction is not enough here.
#[must_use]
pub const fn injector_start_angle(
    pulse_width_angle: Angle,
    channel_angle: Angle,
    injection_angle: Angle,
    cycle: CycleLength,
) -> Angle {
    (injection_angle + channel_angle - pulse_width_angle).rem_euclid(cycle.degrees())
}

/// Microseconds until the injector opens, measured over the injection cycle.
#[must_use]
pub fn injector_timeout(
    phase: SchedulePhase,
    start_angle: Angle,
    channel_angle: Angle,
    crank_angle: Angle,
    cycle: CycleLength,
    period: RevolutionPeriod,
) -> Micros {
    event_timeout(phase, start_angle, channel_angle, crank_angle, cycle, period)
}

/// One injector output, resolved and timed over the injection cycle.
#[derive(Clone, Debug)]
pub struct InjectionChannel<O> {
    schedule: Schedule<O>,
    injection_angle: Angle,
    applied: Option<(Angle, CycleLength)>,
}

impl<O: EventOutputs> InjectionChannel<O> {
    /// Creates an idle injector at `channel_angle` that closes
    /// `injection_angle` degrees past it.
    pub fn new(
        config: &TimingConfig,
        channel_angle: Angle,
        injection_angle: Angle,
        outputs: O,
    ) -> Result<Self, ConfigError> {
        config.validate_injection_channel_angle(channel_angle)?;
        Ok(Self {
            schedule: Schedule::new(channel_angle, outputs),
            injection_angle,
            applied: None,
        })
    }

    pub const fn schedule(&self) -> &Schedule<O> {
        &self.schedule
    }

    pub fn schedule_mut(&mut self) -> &mut Schedule<O> {
        &mut self.schedule
    }

    pub const fn angles(&self) -> EventAngles {
        self.schedule.angles()
    }

    /// Resolves the opening and closing angles for `pulse_width` at `period`.
    ///
    /// Returns `true` when the angles were recomputed.
    pub fn update(
        &mut self,
        pulse_width: Duration,
        period: RevolutionPeriod,
        config: &TimingConfig,
    ) -> bool {
        let pulse_width_angle = period.duration_angle(pulse_width);
        let cycle = config.injection_cycle;
        if self.applied == Some((pulse_width_angle, cycle)) {
            return false;
        }

        let channel_angle = self.schedule.channel_angle();
        let start =
            injector_start_angle(pulse_width_angle, channel_angle, self.injection_angle, cycle);
        let end = (self.injection_angle + channel_angle).rem_euclid(cycle.degrees());
        self.schedule.set_angles(EventAngles::new(start, end));
        self.applied = Some((pulse_width_angle, cycle));
        true
    }

    /// Microseconds until the injector next opens from `crank_angle`.
    pub fn timeout(
        &self,
        crank_angle: Angle,
        period: RevolutionPeriod,
        config: &TimingConfig,
    ) -> Micros {
        injector_timeout(
            self.schedule.phase(),
            self.schedule.angles().start,
            self.schedule.channel_angle(),
            crank_angle,
            config.injection_cycle,
            period,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::NoopOutputs;

    #[test]
    fn opens_one_pulse_width_before_the_end_angle() {
        assert_eq!(
            injector_start_angle(60, 0, 355, CycleLength::FourStroke),
            295
        );
        assert_eq!(
            injector_start_angle(60, 180, 355, CycleLength::FourStroke),
            475
        );
    }

    #[test]
    fn end_angle_past_cycle_is_reduced() {
        assert_eq!(
            injector_start_angle(20, 540, 355, CycleLength::FourStroke),
            155
        );
    }

    #[test]
    fn pulse_width_longer_than_a_cycle_still_lands_in_range() {
        let start = injector_start_angle(800, 0, 10, CycleLength::Revolution);
        assert_eq!(start, 290);
        assert!(CycleLength::Revolution.contains(start));
    }

    #[test]
    fn timeout_follows_injection_cycle() {
        let period = RevolutionPeriod::from_rpm(4_000).expect("period");
        let start = injector_start_angle(96, 0, 40, CycleLength::Revolution);
        assert_eq!(start, 304);
        assert_eq!(
            injector_timeout(SchedulePhase::Armed, start, 0, 0, CycleLength::Revolution, period),
            12_667
        );
        assert_eq!(
            injector_timeout(
                SchedulePhase::Started,
                start,
                0,
                315,
                CycleLength::Revolution,
                period
            ),
            14_542
        );
    }

    #[test]
    fn injector_channel_runs_on_the_injection_cycle() {
        let config = TimingConfig::new().with_cycles(CycleLength::FourStroke, CycleLength::Revolution);
        let period = RevolutionPeriod::from_rpm(4_000).expect("period");
        let mut injector =
            InjectionChannel::new(&config, 0, 355, NoopOutputs::new()).expect("injector");

        assert!(injector.update(Duration::from_micros(2_500), period, &config));
        assert_eq!(injector.angles(), EventAngles::new(295, 355));
        assert!(!injector.update(Duration::from_micros(2_500), period, &config));

        injector.schedule_mut().arm().expect("arm");
        assert_eq!(injector.timeout(0, period, &config), 12_292);

        injector.schedule_mut().on_compare_match();
        // Wraps over 360 degrees, not the ignition cycle's 720.
        assert_eq!(injector.timeout(300, period, &config), 14_792);
    }

    #[test]
    fn injector_outside_injection_cycle_is_rejected() {
        let config = TimingConfig::new().with_cycles(CycleLength::FourStroke, CycleLength::Revolution);
        assert!(matches!(
            InjectionChannel::new(&config, 540, 355, NoopOutputs::new()),
            Err(ConfigError::ChannelAngleOutOfRange { angle: 540, .. })
        ));
    }
}
