use embassy_futures::select::{Either, select};
use embassy_time::{Duration, Instant, Timer};
use timing_core::scheduler::MAX_IGNITION_CHANNELS;
use timing_core::{ScheduleEdge, SchedulePhase};

use super::{CoilScheduler, POSITION_UPDATED};
use crate::operating_point::OperatingPointTracker;
use crate::status;
use crate::telemetry::{FirmwareInstant, FirmwareTelemetry, TelemetryLog};

/// Pending edge for one coil.
#[derive(Copy, Clone)]
struct Deadline {
    channel: usize,
    at: Instant,
}

#[embassy_executor::task]
pub async fn run(mut scheduler: CoilScheduler, mut telemetry: FirmwareTelemetry) -> ! {
    let mut log = TelemetryLog::new();
    let mut fire_at: [Option<Instant>; MAX_IGNITION_CHANNELS] = [None; MAX_IGNITION_CHANNELS];
    let mut operating_point = OperatingPointTracker::new();

    defmt::info!("ignition: {} coils registered", scheduler.len());

    loop {
        let now = Instant::now();
        let Some(engine) = status::snapshot() else {
            if operating_point.reset() {
                defmt::info!("ignition: engine stalled, coils released");
            }
            scheduler.disable_all();
            fire_at = [None; MAX_IGNITION_CHANNELS];
            POSITION_UPDATED.wait().await;
            continue;
        };

        let point = engine.operating_point();
        if operating_point.is_new(point) {
            match scheduler.update_operating_point(
                engine.advance,
                engine.period,
                FirmwareInstant::from(now),
                &mut telemetry,
            ) {
                Ok(_) => operating_point.accept(point),
                Err(error) => {
                    operating_point.reject(point);
                    defmt::warn!(
                        "ignition: operating point rejected: {}",
                        defmt::Display2Format(&error)
                    );
                }
            }
        }

        let mut next: Option<Deadline> = None;
        for timeout in scheduler.tick(
            engine.crank_angle,
            engine.period,
            FirmwareInstant::from(now),
            &mut telemetry,
        ) {
            if timeout.phase == SchedulePhase::Armed {
                let at = now + Duration::from_micros(u64::from(timeout.delay));
                next = earliest(next, timeout.channel, at);
            }
        }
        for (channel, deadline) in fire_at.iter().enumerate() {
            if let Some(at) = *deadline {
                next = earliest(next, channel, at);
            }
        }
        log.flush(&telemetry);

        let Some(deadline) = next else {
            POSITION_UPDATED.wait().await;
            continue;
        };

        match select(Timer::at(deadline.at), POSITION_UPDATED.wait()).await {
            Either::First(()) => {
                let now = Instant::now();
                match scheduler.on_compare_match(
                    deadline.channel,
                    FirmwareInstant::from(now),
                    &mut telemetry,
                ) {
                    Ok(ScheduleEdge::Began) => {
                        // The dwell angle may be capped below the configured dwell time.
                        let dwell = engine
                            .period
                            .angle_to_time(scheduler.dwell_angle().unsigned_abs());
                        if let Some(slot) = fire_at.get_mut(deadline.channel) {
                            *slot = Some(now + Duration::from_micros(u64::from(dwell)));
                        }
                    }
                    Ok(ScheduleEdge::Ended | ScheduleEdge::Ignored) => {
                        if let Some(slot) = fire_at.get_mut(deadline.channel) {
                            *slot = None;
                        }
                    }
                    Err(error) => defmt::warn!(
                        "ignition: compare match dropped: {}",
                        defmt::Display2Format(&error)
                    ),
                }
                log.flush(&telemetry);
            }
            Either::Second(()) => {}
        }
    }
}

fn earliest(current: Option<Deadline>, channel: usize, at: Instant) -> Option<Deadline> {
    match current {
        Some(existing) if existing.at <= at => Some(existing),
        _ => Some(Deadline { channel, at }),
    }
}
