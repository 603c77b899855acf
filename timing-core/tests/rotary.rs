use core::time::Duration;

use timing_core::angle::{Angle, CycleLength, EventAngles, RevolutionPeriod};
use timing_core::config::TimingConfig;
use timing_core::rotary::resolve_trailing;
use timing_core::scheduler::IgnitionScheduler;
use timing_core::schedule::NoopOutputs;
use timing_core::telemetry::{TelemetryInstant, TelemetryRecorder};

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
struct MockInstant(u64);

impl TelemetryInstant for MockInstant {
    fn saturating_duration_since(&self, earlier: Self) -> Duration {
        Duration::from_micros(self.0.saturating_sub(earlier.0))
    }
}

// (leading fire angle, dwell, split) -> (fire, dwell-on)
const TRAILING_TABLE: &[(Angle, Angle, Angle, Angle, Angle)] = &[
    (-40, 5, 0, -40, 315),
    (-40, 95, 0, -40, 225),
    (-40, 185, 0, -40, 135),
    (-40, 275, 0, -40, 45),
    (-40, 355, 0, -40, -35),
    (-40, 5, 40, 0, 355),
    (-40, 95, 40, 0, 265),
    (-40, 185, 40, 0, 175),
    (-40, 275, 40, 0, 85),
    (-40, 355, 40, 0, 5),
    (0, 5, 0, 0, 355),
    (0, 95, 0, 0, 265),
    (0, 185, 0, 0, 175),
    (0, 275, 0, 0, 85),
    (0, 355, 0, 0, 5),
    (0, 5, 40, 40, 35),
    (0, 95, 40, 40, 305),
    (0, 185, 40, 40, 215),
    (0, 275, 40, 40, 125),
    (0, 355, 40, 40, 45),
    (40, 5, 0, 40, 35),
    (40, 95, 0, 40, 305),
    (40, 185, 0, 40, 215),
    (40, 275, 0, 40, 125),
    (40, 355, 0, 40, 45),
    (40, 5, 40, 80, 75),
    (40, 95, 40, 80, 345),
    (40, 185, 40, 80, 255),
    (40, 275, 40, 80, 165),
    (40, 355, 40, 80, 85),
];

#[test]
fn trailing_angles_match_reference_table() {
    for &(leading_end, dwell, split, end, start) in TRAILING_TABLE {
        let angles = resolve_trailing(leading_end, dwell, split, CycleLength::Revolution);
        assert_eq!(
            angles,
            EventAngles::new(start, end),
            "leading {leading_end} dwell {dwell} split {split}"
        );
    }
}

#[test]
fn trailing_channel_follows_leader_through_operating_point_changes() {
    let config = TimingConfig::new()
        .with_cycles(CycleLength::Revolution, CycleLength::Revolution)
        .with_rotary_split(20);
    let mut scheduler = IgnitionScheduler::<NoopOutputs>::new(config).expect("valid config");
    let mut telemetry = TelemetryRecorder::<MockInstant>::new();

    let leading = scheduler
        .add_channel(180, NoopOutputs::new())
        .expect("leading rotor");
    let trailing = scheduler
        .add_trailing_channel(leading, NoopOutputs::new())
        .expect("trailing rotor");

    let period = RevolutionPeriod::from_rpm(4_000).expect("running engine");
    scheduler
        .update_operating_point(10, period, MockInstant(0), &mut telemetry)
        .expect("advance in range");

    let leader_angles = scheduler.channel(leading).expect("leader").angles();
    let trailer_angles = scheduler.channel(trailing).expect("trailer").angles();
    assert_eq!(leader_angles, EventAngles::new(74, 170));
    assert_eq!(trailer_angles, EventAngles::new(94, 190));
    assert_eq!(
        scheduler.channel(trailing).expect("trailer").schedule().channel_angle(),
        180
    );

    // Advancing the leader drags the trailing plug along by the same amount.
    let changed = scheduler
        .update_operating_point(30, period, MockInstant(1), &mut telemetry)
        .expect("advance in range");
    assert_eq!(changed, 2);
    let trailer_angles = scheduler.channel(trailing).expect("trailer").angles();
    assert_eq!(trailer_angles, EventAngles::new(74, 170));
}
