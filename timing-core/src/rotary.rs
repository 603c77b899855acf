//! Trailing-rotor angles for rotary engines.
//!
//! A rotary fires a second, phase-shifted plug per rotor. Its fire point is
//! the leading plug's fire point pushed back by the configured split, and its
//! dwell is laid out behind that the same way as for a leading channel.

use crate::angle::{Angle, CycleLength, EventAngles};

/// Resolves the trailing plug's event angles from the leading fire angle.
///
/// The fire point `leading_end + split` is used as-is: the split is bounded
/// by [`MAX_ROTARY_SPLIT_DEGREES`](crate::config::MAX_ROTARY_SPLIT_DEGREES)
/// and never needs a correction. The dwell-on point gets one forward
/// correction when negative and nothing more, so a dwell longer than the
/// fire angle plus one cycle leaves it negative.
#[must_use]
pub const fn resolve_trailing(
    leading_end: Angle,
    dwell_angle: Angle,
    split: Angle,
    cycle: CycleLength,
) -> EventAngles {
    let end = leading_end + split;
    let start = cycle.wrap_negative(end - dwell_angle);
    EventAngles::new(start, end)
}
