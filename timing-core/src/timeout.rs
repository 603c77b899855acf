//! Delay until a channel's dwell-start edge next occurs.
//!
//! Both phases aim at the same reference, the resolved start angle, but treat
//! a start angle that is already behind the crank differently:
//!
//! * an [`Armed`](SchedulePhase::Armed) event has not fired this cycle, so a
//!   passed start is overdue and must fire immediately (zero delay);
//! * a [`Started`](SchedulePhase::Started) event is already running, so the
//!   delay is for the following cycle and wraps forward one cycle instead.
//!
//! Angles are compared in the channel's own frame (shifted by its nominal
//! angle) so "already passed" means passed since this channel's reference
//! point, not since crank zero. For a channel at 0° the shift is a no-op.

use crate::angle::{Angle, CycleLength, Micros, RevolutionPeriod, angle_to_time};
use crate::schedule::SchedulePhase;

/// Computes the microseconds until `start_angle` is next reached.
#[must_use]
pub fn event_timeout(
    phase: SchedulePhase,
    start_angle: Angle,
    channel_angle: Angle,
    crank_angle: Angle,
    cycle: CycleLength,
    period: RevolutionPeriod,
) -> Micros {
    let delta = angle_until(phase, start_angle, channel_angle, crank_angle, cycle);
    angle_to_time(delta, period)
}

/// Angular distance behind [`event_timeout`], before conversion to time.
///
/// Returns zero for an overdue armed event.
#[must_use]
pub const fn angle_until(
    phase: SchedulePhase,
    start_angle: Angle,
    channel_angle: Angle,
    crank_angle: Angle,
    cycle: CycleLength,
) -> u32 {
    let mut delta = signed_delta(start_angle, channel_angle, crank_angle, cycle);

    if delta < 0 {
        match phase {
            SchedulePhase::Started => delta += cycle.degrees(),
            SchedulePhase::Off | SchedulePhase::Armed => return 0,
        }
    }

    delta.unsigned_abs()
}

/// Returns `true` once the crank has moved past `start_angle` in the
/// channel's frame.
///
/// Unlike a zero [`angle_until`], this is `false` when the crank sits exactly
/// on the start angle.
#[must_use]
pub const fn has_passed(
    start_angle: Angle,
    channel_angle: Angle,
    crank_angle: Angle,
    cycle: CycleLength,
) -> bool {
    signed_delta(start_angle, channel_angle, crank_angle, cycle) < 0
}

const fn signed_delta(
    start_angle: Angle,
    channel_angle: Angle,
    crank_angle: Angle,
    cycle: CycleLength,
) -> Angle {
    relative_to_channel(start_angle, channel_angle, cycle)
        - relative_to_channel(crank_angle, channel_angle, cycle)
}

const fn relative_to_channel(angle: Angle, channel_angle: Angle, cycle: CycleLength) -> Angle {
    cycle.wrap_negative(angle - channel_angle)
}
