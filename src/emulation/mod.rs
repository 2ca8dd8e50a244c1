//! Simulated open-drain bus for exercising the master without hardware.
//!
//! Both lines are wired-AND of the master output and whatever the attached
//! slave pulls low. Start and stop conditions and clock edges are detected
//! from level changes and forwarded to the [`SlaveDevice`].

mod device;
mod line;
mod window;

use std::cell::RefCell;
use std::rc::Rc;

pub use self::device::SlaveDevice;
pub use self::line::SimulatedLine;
pub use self::window::{Access, SimulatedWindow};

/// Master-side line change, in call order.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LineEvent {
    Clock(bool),
    Data(bool),
}

#[derive(Default)]
struct Wires {
    master_clock_released: bool,
    master_data_released: bool,
    hold_clock: bool,
    stretch_polls: u32,
    stretch_left: u32,
    device: Option<SlaveDevice>,
    events: Vec<LineEvent>,
    starts: usize,
    stops: usize,
    clock_rises: usize,
}

impl Wires {
    fn clock_level(&self) -> bool {
        self.master_clock_released && !self.hold_clock
    }

    fn data_level(&self) -> bool {
        let pulled = self.device.as_ref().map_or(false, |d| d.pulls_data_low());
        self.master_data_released && !pulled
    }

    fn drive_clock(&mut self, level: bool) {
        self.events.push(LineEvent::Clock(level));

        let before = self.clock_level();
        self.master_clock_released = level;
        if level {
            self.stretch_left = self.stretch_polls;
        }
        let after = self.clock_level();

        if !before && after {
            self.clock_rises += 1;
            let data = self.data_level();
            if let Some(device) = self.device.as_mut() {
                device.on_clock_rise(data);
            }
        } else if before && !after {
            if let Some(device) = self.device.as_mut() {
                device.on_clock_fall();
            }
        }
    }

    fn drive_data(&mut self, level: bool) {
        self.events.push(LineEvent::Data(level));

        let before = self.data_level();
        self.master_data_released = level;
        let after = self.data_level();

        if !self.clock_level() {
            return;
        }
        if before && !after {
            trace!("simulated bus: start");
            self.starts += 1;
            if let Some(device) = self.device.as_mut() {
                device.on_start();
            }
        } else if !before && after {
            trace!("simulated bus: stop");
            self.stops += 1;
            if let Some(device) = self.device.as_mut() {
                device.on_stop();
            }
        }
    }

    /// Samples SCL, reporting low for the configured number of polls after
    /// each release.
    fn sample_clock(&mut self) -> bool {
        if !self.clock_level() {
            return false;
        }
        if self.stretch_left > 0 {
            self.stretch_left -= 1;
            return false;
        }
        true
    }
}

#[derive(Clone)]
struct SharedWires(Rc<RefCell<Wires>>);

impl SharedWires {
    fn new() -> Self {
        SharedWires(Rc::new(RefCell::new(Wires {
            master_clock_released: true,
            master_data_released: true,
            ..Wires::default()
        })))
    }
}
