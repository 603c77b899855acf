//! Coil driver outputs.

use embassy_stm32::gpio::Output;
use timing_core::EventOutputs;

/// Push-pull coil driver input: high charges the coil, the falling edge fires it.
pub struct CoilOutput<'d> {
    pin: Output<'d>,
}

impl<'d> CoilOutput<'d> {
    pub fn new(pin: Output<'d>) -> Self {
        Self { pin }
    }
}

impl EventOutputs for CoilOutput<'_> {
    fn begin(&mut self) {
        self.pin.set_high();
    }

    fn end(&mut self) {
        self.pin.set_low();
    }
}
