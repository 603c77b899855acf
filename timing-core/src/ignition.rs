//! Spark event angle resolution.
//!
//! Turns a channel's nominal angle, the current advance and the dwell angle
//! into the dwell-on and fire points. Both results carry exactly one
//! wraparound correction; inputs are kept bounded by
//! [`TimingConfig::validate_advance`](crate::config::TimingConfig::validate_advance)
//! so a second correction is never needed.

use crate::angle::{Angle, CycleLength, EventAngles};

/// Resolves the dwell-on (`start`) and fire (`end`) angles for one channel.
///
/// `end` lands in `[0, cycle)`. `start` is only pulled forward when negative,
/// so `start > end` signals a dwell that begins before the cycle's zero point.
#[must_use]
pub const fn resolve(
    channel_angle: Angle,
    advance: Angle,
    dwell_angle: Angle,
    cycle: CycleLength,
) -> EventAngles {
    let end = cycle.wrap_overflow(cycle.wrap_negative(channel_angle - advance));
    let start = cycle.wrap_negative(end - dwell_angle);
    EventAngles::new(start, end)
}
