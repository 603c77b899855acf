//! Multi-channel ignition scheduling.
//!
//! [`IgnitionScheduler`] owns one [`IgnitionChannel`] per coil output. On an
//! operating point change it converts the dwell to an angle once and resolves
//! every channel, leading channels before the trailing rotor channels that
//! hang off them. On each scheduling tick it arms idle channels and reports
//! the delay the timer layer should program for every active one.

use core::fmt;

use heapless::Vec;

use crate::angle::{Angle, CycleLength, EventAngles, Micros, RevolutionPeriod};
use crate::config::{ConfigError, TimingConfig};
use crate::ignition::resolve;
use crate::rotary::resolve_trailing;
use crate::schedule::{EventOutputs, Schedule, ScheduleEdge, SchedulePhase, TransitionError};
use crate::telemetry::{ChannelId, TelemetryInstant, TelemetryRecorder};
use crate::timeout::has_passed;

/// Coil outputs supported by the default scheduler capacity.
pub const MAX_IGNITION_CHANNELS: usize = 8;

/// How a channel's angles are derived.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChannelKind {
    /// Resolved from its own nominal angle and the current advance.
    Leading,
    /// Rotary trailing plug, resolved from the leader's fire angle.
    Trailing { leader: usize },
}

/// Inputs the resolved angles were last computed from.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ResolveInputs {
    Leading {
        advance: Angle,
        dwell_angle: Angle,
        cycle: CycleLength,
    },
    Trailing {
        leading_end: Angle,
        dwell_angle: Angle,
        split: Angle,
        cycle: CycleLength,
    },
}

impl ResolveInputs {
    const fn resolve(self, channel_angle: Angle) -> EventAngles {
        match self {
            ResolveInputs::Leading {
                advance,
                dwell_angle,
                cycle,
            } => resolve(channel_angle, advance, dwell_angle, cycle),
            ResolveInputs::Trailing {
                leading_end,
                dwell_angle,
                split,
                cycle,
            } => resolve_trailing(leading_end, dwell_angle, split, cycle),
        }
    }
}

/// A schedule plus the inputs its angles were resolved from.
#[derive(Clone, Debug)]
pub struct IgnitionChannel<O> {
    schedule: Schedule<O>,
    kind: ChannelKind,
    applied: Option<ResolveInputs>,
}

impl<O: EventOutputs> IgnitionChannel<O> {
    pub const fn new(channel_angle: Angle, kind: ChannelKind, outputs: O) -> Self {
        Self {
            schedule: Schedule::new(channel_angle, outputs),
            kind,
            applied: None,
        }
    }

    pub const fn kind(&self) -> ChannelKind {
        self.kind
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

    pub const fn applied(&self) -> Option<ResolveInputs> {
        self.applied
    }

    /// Re-resolves the angles when `inputs` differ from the last applied set.
    ///
    /// Returns `true` when the angles were recomputed.
    pub fn apply(&mut self, inputs: ResolveInputs) -> bool {
        if self.applied == Some(inputs) {
            return false;
        }

        let angles = inputs.resolve(self.schedule.channel_angle());
        self.schedule.set_angles(angles);
        self.applied = Some(inputs);
        true
    }
}

/// Delay handed to the timer layer for one channel.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelTimeout {
    pub channel: usize,
    pub phase: SchedulePhase,
    pub delay: Micros,
}

/// Errors reported by [`IgnitionScheduler`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SchedulerError {
    /// Every channel slot is in use.
    RegistryFull,
    /// No channel exists at the given index.
    UnknownChannel(usize),
    /// A trailing channel must follow a leading one.
    LeaderNotLeading(usize),
    Config(ConfigError),
    Transition(TransitionError),
}

impl fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl From<ConfigError> for SchedulerError {
    fn from(error: ConfigError) -> Self {
        SchedulerError::Config(error)
    }
}

impl From<TransitionError> for SchedulerError {
    fn from(error: TransitionError) -> Self {
        SchedulerError::Transition(error)
    }
}

/// Fixed-capacity registry of ignition channels sharing one configuration.
pub struct IgnitionScheduler<O, const CAPACITY: usize = MAX_IGNITION_CHANNELS> {
    channels: Vec<IgnitionChannel<O>, CAPACITY>,
    config: TimingConfig,
    advance: Angle,
    dwell_angle: Angle,
}

impl<O: EventOutputs, const CAPACITY: usize> IgnitionScheduler<O, CAPACITY> {
    /// Creates an empty scheduler after validating `config`.
    pub fn new(config: TimingConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            channels: Vec::new(),
            config,
            advance: 0,
            dwell_angle: 0,
        })
    }

    pub const fn config(&self) -> &TimingConfig {
        &self.config
    }

    /// Advance applied by the last operating point update.
    pub const fn advance(&self) -> Angle {
        self.advance
    }

    /// Dwell angle computed by the last operating point update.
    pub const fn dwell_angle(&self) -> Angle {
        self.dwell_angle
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn channel(&self, index: usize) -> Option<&IgnitionChannel<O>> {
        self.channels.get(index)
    }

    pub fn channel_mut(&mut self, index: usize) -> Option<&mut IgnitionChannel<O>> {
        self.channels.get_mut(index)
    }

    pub fn channels(&self) -> core::slice::Iter<'_, IgnitionChannel<O>> {
        self.channels.iter()
    }

    /// Registers a leading channel at `channel_angle` and returns its index.
    pub fn add_channel(&mut self, channel_angle: Angle, outputs: O) -> Result<usize, SchedulerError> {
        self.config.validate_channel_angle(channel_angle)?;
        self.push(IgnitionChannel::new(
            channel_angle,
            ChannelKind::Leading,
            outputs,
        ))
    }

    /// Registers a rotary trailing channel driven from the leading channel `leader`.
    ///
    /// The trailing channel shares its leader's nominal angle, so its
    /// timeouts are measured in the same frame.
    pub fn add_trailing_channel(
        &mut self,
        leader: usize,
        outputs: O,
    ) -> Result<usize, SchedulerError> {
        let Some(leading) = self.channels.get(leader) else {
            return Err(SchedulerError::UnknownChannel(leader));
        };
        if leading.kind() != ChannelKind::Leading {
            return Err(SchedulerError::LeaderNotLeading(leader));
        }

        let channel_angle = leading.schedule().channel_angle();
        self.push(IgnitionChannel::new(
            channel_angle,
            ChannelKind::Trailing { leader },
            outputs,
        ))
    }

    fn push(&mut self, channel: IgnitionChannel<O>) -> Result<usize, SchedulerError> {
        let index = self.channels.len();
        self.channels
            .push(channel)
            .map_err(|_| SchedulerError::RegistryFull)?;
        debug!("ignition channel {} registered", index);
        Ok(index)
    }

    /// Applies a new advance and engine speed to every channel.
    ///
    /// Returns the number of channels whose angles changed. The advance is
    /// validated before anything is touched, so a rejected update leaves the
    /// previous angles in place. The dwell angle is capped at
    /// [`TimingConfig::max_dwell_angle`].
    pub fn update_operating_point<TInstant, const N: usize>(
        &mut self,
        advance: Angle,
        period: RevolutionPeriod,
        now: TInstant,
        telemetry: &mut TelemetryRecorder<TInstant, N>,
    ) -> Result<usize, SchedulerError>
    where
        TInstant: TelemetryInstant,
    {
        self.config.validate_advance(advance)?;
        self.advance = advance;

        let dwell_angle = period.dwell_angle(self.config.dwell);
        let max_dwell_angle = self.config.max_dwell_angle();
        if dwell_angle > max_dwell_angle {
            warn!(
                "dwell of {} deg at {} rpm cut to {} deg",
                dwell_angle,
                period.rpm(),
                max_dwell_angle
            );
        }
        self.dwell_angle = dwell_angle.min(max_dwell_angle);

        let cycle = self.config.ignition_cycle;
        let mut changed = 0;

        for (index, channel) in self.channels.iter_mut().enumerate() {
            if channel.kind() != ChannelKind::Leading {
                continue;
            }
            let inputs = ResolveInputs::Leading {
                advance,
                dwell_angle: self.dwell_angle,
                cycle,
            };
            if channel.apply(inputs) {
                changed += 1;
                telemetry.record_angles(channel_id(index), channel.angles(), now);
            }
        }

        for index in 0..self.channels.len() {
            let Some(ChannelKind::Trailing { leader }) =
                self.channels.get(index).map(IgnitionChannel::kind)
            else {
                continue;
            };
            let Some(leading_end) = self
                .channels
                .get(leader)
                .map(|leading| leading.angles().end)
            else {
                continue;
            };
            let inputs = ResolveInputs::Trailing {
                leading_end,
                dwell_angle: self.dwell_angle,
                split: self.config.rotary_split,
                cycle,
            };
            if let Some(channel) = self.channels.get_mut(index)
                && channel.apply(inputs)
            {
                changed += 1;
                telemetry.record_angles(channel_id(index), channel.angles(), now);
            }
        }

        trace!(
            "operating point: advance {} dwell {} deg, {} channels changed",
            advance,
            self.dwell_angle,
            changed
        );
        Ok(changed)
    }

    /// Produces the next timer delay for every channel at `crank_angle`.
    ///
    /// Idle channels are armed when their dwell-on point is still ahead or
    /// exactly under the crank; one whose dwell-on point has already passed
    /// this cycle stays idle until the crank comes back around. Channels that were armed earlier get a fresh
    /// delay, zero if they are now overdue. Started channels report the
    /// prediction for the next cycle.
    pub fn tick<TInstant, const N: usize>(
        &mut self,
        crank_angle: Angle,
        period: RevolutionPeriod,
        now: TInstant,
        telemetry: &mut TelemetryRecorder<TInstant, N>,
    ) -> Vec<ChannelTimeout, CAPACITY>
    where
        TInstant: TelemetryInstant,
    {
        let cycle = self.config.ignition_cycle;
        let mut timeouts = Vec::new();

        for (index, channel) in self.channels.iter_mut().enumerate() {
            if channel.applied().is_none() {
                continue;
            }
            let schedule = channel.schedule_mut();

            if schedule.phase() == SchedulePhase::Off {
                if has_passed(
                    schedule.angles().start,
                    schedule.channel_angle(),
                    crank_angle,
                    cycle,
                ) {
                    trace!("ignition channel {} waits for next cycle", index);
                    continue;
                }
                if schedule.arm().is_err() {
                    continue;
                }
                let delay = schedule.timeout(crank_angle, cycle, period);
                telemetry.record_armed(channel_id(index), crank_angle, delay, now);
                push_timeout(&mut timeouts, index, SchedulePhase::Armed, delay);
                continue;
            }

            let phase = schedule.phase();
            let delay = schedule.timeout(crank_angle, cycle, period);
            if phase == SchedulePhase::Armed && delay == 0 {
                warn!("ignition channel {} overdue at {}", index, crank_angle);
                telemetry.record_overdue(channel_id(index), crank_angle, now);
            }
            push_timeout(&mut timeouts, index, phase, delay);
        }

        timeouts
    }

    /// Runs the edge due on channel `index` and records it.
    pub fn on_compare_match<TInstant, const N: usize>(
        &mut self,
        index: usize,
        now: TInstant,
        telemetry: &mut TelemetryRecorder<TInstant, N>,
    ) -> Result<ScheduleEdge, SchedulerError>
    where
        TInstant: TelemetryInstant,
    {
        let channel = self
            .channels
            .get_mut(index)
            .ok_or(SchedulerError::UnknownChannel(index))?;

        let edge = channel.schedule_mut().on_compare_match();
        match edge {
            ScheduleEdge::Began => {
                telemetry.record_dwell_started(channel_id(index), now);
            }
            ScheduleEdge::Ended => {
                telemetry.record_spark(channel_id(index), now);
            }
            ScheduleEdge::Ignored => {
                trace!("compare match on idle channel {}", index);
            }
        }
        Ok(edge)
    }

    /// Moves channel `index` straight to off, firing a coil that is charging.
    pub fn disable(&mut self, index: usize) -> Result<(), SchedulerError> {
        let channel = self
            .channels
            .get_mut(index)
            .ok_or(SchedulerError::UnknownChannel(index))?;
        channel.schedule_mut().disable();
        Ok(())
    }

    /// Disables every channel, for example when the engine stalls.
    ///
    /// No coil is left energized afterwards.
    pub fn disable_all(&mut self) {
        for channel in &mut self.channels {
            channel.schedule_mut().disable();
        }
    }
}

fn push_timeout<const CAPACITY: usize>(
    timeouts: &mut Vec<ChannelTimeout, CAPACITY>,
    channel: usize,
    phase: SchedulePhase,
    delay: Micros,
) {
    // Never more timeouts than channels.
    let _ = timeouts.push(ChannelTimeout {
        channel,
        phase,
        delay,
    });
}

fn channel_id(index: usize) -> ChannelId {
    ChannelId::try_from(index).unwrap_or(ChannelId::MAX)
}
