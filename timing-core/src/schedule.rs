//! Per-output schedule record and its phase state machine.
//!
//! A schedule owns the resolved angles of one output, the output's nominal
//! angle and a capability object that drives the physical output. The timer
//! layer reports compare matches through [`Schedule::on_compare_match`]; the
//! scheduling tick asks [`Schedule::timeout`] how long to wait next.

use core::fmt;

use crate::angle::{Angle, CycleLength, EventAngles, Micros, RevolutionPeriod};
use crate::timeout::event_timeout;

/// Phase of a single output schedule.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SchedulePhase {
    /// Disabled; compare matches are ignored.
    #[default]
    Off,
    /// Waiting for the dwell-on point.
    Armed,
    /// Dwell in progress; the next compare match fires the output.
    Started,
}

impl SchedulePhase {
    /// Returns `true` when the timer layer should keep a compare pending.
    pub const fn is_active(self) -> bool {
        matches!(self, SchedulePhase::Armed | SchedulePhase::Started)
    }

    /// Returns `true` when `self -> next` is a legal move.
    pub const fn can_transition_to(self, next: SchedulePhase) -> bool {
        matches!(
            (self, next),
            (_, SchedulePhase::Off)
                | (SchedulePhase::Off | SchedulePhase::Started, SchedulePhase::Armed)
                | (SchedulePhase::Armed, SchedulePhase::Started)
        )
    }
}

/// Hardware hooks invoked when a schedule's edges occur.
pub trait EventOutputs {
    /// Starts the event (coil charge or injector open).
    fn begin(&mut self);

    /// Ends the event (spark or injector close).
    fn end(&mut self);
}

/// Output capability that performs no hardware interaction.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopOutputs;

impl NoopOutputs {
    /// Creates a new no-op output.
    pub const fn new() -> Self {
        Self
    }
}

impl EventOutputs for NoopOutputs {
    fn begin(&mut self) {}

    fn end(&mut self) {}
}

impl<O: EventOutputs + ?Sized> EventOutputs for &mut O {
    fn begin(&mut self) {
        (**self).begin();
    }

    fn end(&mut self) {
        (**self).end();
    }
}

/// Failure reported when attempting an invalid phase transition.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TransitionError {
    pub from: SchedulePhase,
    pub to: SchedulePhase,
}

impl TransitionError {
    /// Creates a new transition error describing the attempted phases.
    pub const fn new(from: SchedulePhase, to: SchedulePhase) -> Self {
        Self { from, to }
    }
}

impl fmt::Display for TransitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} -> {:?}", self.from, self.to)
    }
}

/// Edge produced by a compare match.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ScheduleEdge {
    /// `begin` ran; the schedule is now started.
    Began,
    /// `end` ran; the schedule is now off.
    Ended,
    /// The schedule was off and nothing happened.
    Ignored,
}

/// Schedule record for one output channel.
#[derive(Clone, Debug)]
pub struct Schedule<O> {
    phase: SchedulePhase,
    angles: EventAngles,
    channel_angle: Angle,
    outputs: O,
}

impl<O: EventOutputs> Schedule<O> {
    /// Creates a disabled schedule at the given nominal angle.
    pub const fn new(channel_angle: Angle, outputs: O) -> Self {
        Self {
            phase: SchedulePhase::Off,
            angles: EventAngles::new(0, 0),
            channel_angle,
            outputs,
        }
    }

    pub const fn phase(&self) -> SchedulePhase {
        self.phase
    }

    pub const fn angles(&self) -> EventAngles {
        self.angles
    }

    pub const fn channel_angle(&self) -> Angle {
        self.channel_angle
    }

    pub fn outputs(&self) -> &O {
        &self.outputs
    }

    pub fn outputs_mut(&mut self) -> &mut O {
        &mut self.outputs
    }

    /// Replaces the resolved angles; the phase is left untouched.
    pub fn set_angles(&mut self, angles: EventAngles) {
        self.angles = angles;
    }

    /// Moves the schedule to `next`, rejecting illegal moves.
    pub fn transition(&mut self, next: SchedulePhase) -> Result<(), TransitionError> {
        if self.phase.can_transition_to(next) {
            self.phase = next;
            Ok(())
        } else {
            Err(TransitionError::new(self.phase, next))
        }
    }

    /// Arms the schedule for its next dwell-on point.
    pub fn arm(&mut self) -> Result<(), TransitionError> {
        self.transition(SchedulePhase::Armed)
    }

    /// Disables the schedule.
    ///
    /// An event in progress is ended first so the output is never left
    /// driven with no compare match pending to release it.
    pub fn disable(&mut self) {
        if self.phase == SchedulePhase::Started {
            self.outputs.end();
        }
        self.phase = SchedulePhase::Off;
    }

    /// Runs the edge due at a compare match and advances the phase.
    pub fn on_compare_match(&mut self) -> ScheduleEdge {
        match self.phase {
            SchedulePhase::Armed => {
                self.outputs.begin();
                self.phase = SchedulePhase::Started;
                ScheduleEdge::Began
            }
            SchedulePhase::Started => {
                self.outputs.end();
                self.phase = SchedulePhase::Off;
                ScheduleEdge::Ended
            }
            SchedulePhase::Off => ScheduleEdge::Ignored,
        }
    }

    /// Microseconds until this schedule's dwell-on point from `crank_angle`.
    pub fn timeout(
        &self,
        crank_angle: Angle,
        cycle: CycleLength,
        period: RevolutionPeriod,
    ) -> Micros {
        event_timeout(
            self.phase,
            self.angles.start,
            self.channel_angle,
            crank_angle,
            cycle,
            period,
        )
    }
}
