#![no_std]

// Ignition and injection timing shared by the firmware and host tests.
//
// Everything here is pure integer math or fixed-capacity state so the same
// code can run from an interrupt handler on the MCU and under `cargo test`
// on the host.

#[macro_use]
mod fmt;

pub mod angle;
pub mod config;
pub mod ignition;
pub mod injection;
pub mod rotary;
pub mod schedule;
pub mod scheduler;
pub mod telemetry;
pub mod timeout;

pub use angle::{Angle, CycleLength, EventAngles, Micros, RevolutionPeriod};
pub use config::{ConfigError, TimingConfig};
pub use injection::InjectionChannel;
pub use schedule::{
    EventOutputs, NoopOutputs, Schedule, ScheduleEdge, SchedulePhase, TransitionError,
};
pub use scheduler::{
    ChannelKind, ChannelTimeout, IgnitionChannel, IgnitionScheduler, MAX_IGNITION_CHANNELS,
    SchedulerError,
};
pub use telemetry::{TelemetryEventKind, TelemetryInstant, TelemetryRecorder};
