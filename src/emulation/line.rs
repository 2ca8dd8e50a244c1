use std::io;

use super::{LineEvent, SharedWires, SlaveDevice};
use crate::bit_layer::LineDriver;

/// [`LineDriver`] wired straight onto the simulated bus.
///
/// Clones share the same bus, so a test can keep one handle for inspection
/// while the engine drives another.
#[derive(Clone)]
pub struct SimulatedLine {
    wires: SharedWires,
}

impl SimulatedLine {
    pub fn new() -> Self {
        SimulatedLine {
            wires: SharedWires::new(),
        }
    }

    pub fn attach_device(&self, device: SlaveDevice) {
        self.wires.0.borrow_mut().device = Some(device);
    }

    pub fn device(&self) -> Option<SlaveDevice> {
        self.wires.0.borrow().device.clone()
    }

    /// Keeps SCL low no matter what the master does.
    pub fn hold_clock_low(&self, hold: bool) {
        self.wires.0.borrow_mut().hold_clock = hold;
    }

    /// Stretches every clock pulse for `polls` samples of SCL.
    pub fn stretch_polls(&self, polls: u32) {
        self.wires.0.borrow_mut().stretch_polls = polls;
    }

    pub fn events(&self) -> Vec<LineEvent> {
        self.wires.0.borrow().events.clone()
    }

    pub fn starts(&self) -> usize {
        self.wires.0.borrow().starts
    }

    pub fn stops(&self) -> usize {
        self.wires.0.borrow().stops
    }

    pub fn clock_rises(&self) -> usize {
        self.wires.0.borrow().clock_rises
    }

    /// Current (clock, data) bus levels.
    pub fn levels(&self) -> (bool, bool) {
        let wires = self.wires.0.borrow();
        (wires.clock_level(), wires.data_level())
    }

    pub(super) fn drive(&self, clock: Option<bool>, data: Option<bool>) {
        let mut wires = self.wires.0.borrow_mut();
        if let Some(level) = clock {
            wires.drive_clock(level);
        }
        if let Some(level) = data {
            wires.drive_data(level);
        }
    }

    pub(super) fn sample(&self) -> (bool, bool) {
        let mut wires = self.wires.0.borrow_mut();
        (wires.sample_clock(), wires.data_level())
    }
}

impl Default for SimulatedLine {
    fn default() -> Self {
        Self::new()
    }
}

impl LineDriver for SimulatedLine {
    fn set_clock(&mut self, level: bool) -> io::Result<()> {
        self.wires.0.borrow_mut().drive_clock(level);
        Ok(())
    }

    fn set_data(&mut self, level: bool) -> io::Result<()> {
        self.wires.0.borrow_mut().drive_data(level);
        Ok(())
    }

    fn clock(&mut self) -> io::Result<bool> {
        Ok(self.wires.0.borrow_mut().sample_clock())
    }

    fn data(&mut self) -> io::Result<bool> {
        Ok(self.wires.0.borrow().data_level())
    }
}
