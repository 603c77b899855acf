#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Telemetry plumbing between `timing-core` and the firmware log sinks.
//!
//! The scheduler records into a [`TelemetryRecorder`] keyed by
//! [`FirmwareInstant`]; [`TelemetryLog`] then mirrors each new record to
//! defmt on the MCU or stdout on the host, once.

use core::time::Duration;

use embassy_time::Instant;
use timing_core::telemetry::{
    EventId, TelemetryEventKind, TelemetryInstant, TelemetryPayload, TelemetryRecord,
    TelemetryRecorder,
};

/// Embassy instant usable as a telemetry timestamp.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct FirmwareInstant(Instant);

impl FirmwareInstant {
    #[cfg(target_os = "none")]
    pub fn now() -> Self {
        Self(Instant::now())
    }

    pub const fn into_embassy(self) -> Instant {
        self.0
    }
}

impl From<Instant> for FirmwareInstant {
    fn from(instant: Instant) -> Self {
        Self(instant)
    }
}

impl TelemetryInstant for FirmwareInstant {
    fn saturating_duration_since(&self, earlier: Self) -> Duration {
        let elapsed = self.0.saturating_duration_since(earlier.0);
        Duration::from_micros(elapsed.as_micros())
    }
}

/// Recorder type used by the ignition task.
pub type FirmwareTelemetry = TelemetryRecorder<FirmwareInstant>;

/// Tracks which records have already been mirrored to the log.
#[derive(Default)]
pub struct TelemetryLog {
    next_id: EventId,
}

impl TelemetryLog {
    pub const fn new() -> Self {
        Self { next_id: 0 }
    }

    /// Emits every record newer than the last flush and returns how many.
    pub fn flush(&mut self, recorder: &FirmwareTelemetry) -> usize {
        let mut emitted = 0;
        for record in recorder.oldest_first() {
            if record.id.wrapping_sub(self.next_id) > EventId::MAX / 2 {
                continue;
            }
            log_record(record);
            self.next_id = record.id.wrapping_add(1);
            emitted += 1;
        }
        emitted
    }
}

fn log_record(record: &TelemetryRecord<FirmwareInstant>) {
    let timestamp_us = record.timestamp.into_embassy().as_micros();
    let code = record.event.to_raw();
    let label = event_label(record.event);
    let channel = record.event.channel().unwrap_or(u8::MAX);

    match record.details {
        TelemetryPayload::Angles(angles) => {
            emit_angles(label, channel, timestamp_us, angles.start, angles.end);
        }
        TelemetryPayload::Timeout(timeout) => {
            emit_timeout(label, channel, timestamp_us, timeout.crank_angle, timeout.delay);
        }
        TelemetryPayload::Spark(spark) => {
            let elapsed_us = spark
                .elapsed_since_previous
                .map(|elapsed| u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX));
            emit_spark(channel, timestamp_us, elapsed_us);
        }
        TelemetryPayload::None => emit_event(label, code, channel, timestamp_us),
    }
}

const fn event_label(event: TelemetryEventKind) -> &'static str {
    match event {
        TelemetryEventKind::AnglesResolved(_) => "angles",
        TelemetryEventKind::Armed(_) => "armed",
        TelemetryEventKind::TimeoutOverdue(_) => "overdue",
        TelemetryEventKind::DwellStarted(_) => "dwell",
        TelemetryEventKind::SparkFired(_) => "spark",
        TelemetryEventKind::Custom(_) => "custom",
    }
}

#[cfg(target_os = "none")]
fn emit_angles(label: &'static str, channel: u8, timestamp_us: u64, start: i32, end: i32) {
    defmt::debug!(
        "telemetry:ign {} ch={} t={}us start={} end={}",
        label,
        channel,
        timestamp_us,
        start,
        end
    );
}

#[cfg(not(target_os = "none"))]
fn emit_angles(label: &'static str, channel: u8, timestamp_us: u64, start: i32, end: i32) {
    println!("telemetry:ign {label} ch={channel} t={timestamp_us}us start={start} end={end}");
}

#[cfg(target_os = "none")]
fn emit_timeout(label: &'static str, channel: u8, timestamp_us: u64, crank: i32, delay: u32) {
    if delay == 0 {
        defmt::warn!(
            "telemetry:ign {} ch={} t={}us crank={}",
            label,
            channel,
            timestamp_us,
            crank
        );
    } else {
        defmt::trace!(
            "telemetry:ign {} ch={} t={}us crank={} in={}us",
            label,
            channel,
            timestamp_us,
            crank,
            delay
        );
    }
}

#[cfg(not(target_os = "none"))]
fn emit_timeout(label: &'static str, channel: u8, timestamp_us: u64, crank: i32, delay: u32) {
    println!("telemetry:ign {label} ch={channel} t={timestamp_us}us crank={crank} in={delay}us");
}

#[cfg(target_os = "none")]
fn emit_spark(channel: u8, timestamp_us: u64, elapsed_us: Option<u64>) {
    if let Some(elapsed) = elapsed_us {
        defmt::trace!(
            "telemetry:ign spark ch={} t={}us Δ={}us",
            channel,
            timestamp_us,
            elapsed
        );
    } else {
        defmt::trace!("telemetry:ign spark ch={} t={}us", channel, timestamp_us);
    }
}

#[cfg(not(target_os = "none"))]
fn emit_spark(channel: u8, timestamp_us: u64, elapsed_us: Option<u64>) {
    if let Some(elapsed) = elapsed_us {
        println!("telemetry:ign spark ch={channel} t={timestamp_us}us Δ={elapsed}us");
    } else {
        println!("telemetry:ign spark ch={channel} t={timestamp_us}us");
    }
}

#[cfg(target_os = "none")]
fn emit_event(label: &'static str, code: u16, channel: u8, timestamp_us: u64) {
    defmt::trace!(
        "telemetry:ign {} ({=u16:#x}) ch={} t={}us",
        label,
        code,
        channel,
        timestamp_us
    );
}

#[cfg(not(target_os = "none"))]
fn emit_event(label: &'static str, code: u16, channel: u8, timestamp_us: u64) {
    println!("telemetry:ign {label} ({code:#x}) ch={channel} t={timestamp_us}us");
}
