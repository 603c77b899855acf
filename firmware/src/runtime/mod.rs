use cortex_m::interrupt;
use cortex_m::register::primask;
use critical_section::{self, RawRestoreState};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_stm32 as hal;
use embassy_stm32::gpio::{Level, Output, Speed};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use timing_core::{CycleLength, IgnitionScheduler, TimingConfig};

use crate::outputs::CoilOutput;
use crate::telemetry::FirmwareTelemetry;

mod ignition_task;

critical_section::set_impl!(InterruptCriticalSection);

struct InterruptCriticalSection;

unsafe impl critical_section::Impl for InterruptCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        let primask = primask::read();
        interrupt::disable();
        primask.is_active()
    }

    unsafe fn release(restore_state: RawRestoreState) {
        if restore_state {
            unsafe {
                interrupt::enable();
            }
        }
    }
}

/// Coil scheduler with the board's output type.
pub(crate) type CoilScheduler = IgnitionScheduler<CoilOutput<'static>>;

/// Raised by the crank decoder after it publishes a new position.
pub(crate) static POSITION_UPDATED: Signal<CriticalSectionRawMutex, ()> = Signal::new();

/// Nominal firing angles for a sequential four-cylinder, 1-3-4-2 order.
const CHANNEL_ANGLES: [i32; 4] = [0, 180, 360, 540];

#[embassy_executor::main]
pub async fn main(spawner: Spawner) {
    let config = hal::Config::default();
    let hal::Peripherals {
        PA0, PA1, PA6, PA7, ..
    } = hal::init(config);

    let timing = TimingConfig::new().with_cycles(CycleLength::FourStroke, CycleLength::FourStroke);
    let mut scheduler = match CoilScheduler::new(timing) {
        Ok(scheduler) => scheduler,
        Err(error) => defmt::panic!("timing config rejected: {}", defmt::Display2Format(&error)),
    };

    let coils = [
        Output::new(PA0, Level::Low, Speed::VeryHigh),
        Output::new(PA1, Level::Low, Speed::VeryHigh),
        Output::new(PA6, Level::Low, Speed::VeryHigh),
        Output::new(PA7, Level::Low, Speed::VeryHigh),
    ];
    for (angle, pin) in CHANNEL_ANGLES.into_iter().zip(coils) {
        if let Err(error) = scheduler.add_channel(angle, CoilOutput::new(pin)) {
            defmt::warn!(
                "ignition: coil at {} not registered: {}",
                angle,
                defmt::Display2Format(&error)
            );
        }
    }

    spawner
        .spawn(ignition_task::run(scheduler, FirmwareTelemetry::new()))
        .expect("failed to spawn ignition task");

    core::future::pending::<()>().await;
}
