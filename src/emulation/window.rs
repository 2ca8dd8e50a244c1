use std::cell::RefCell;
use std::io;
use std::rc::Rc;

use super::SimulatedLine;
use crate::hardware::{
    RegisterWindow, I2C_ENABLE, REGISTER_OFFSET, SCL_IN, SCL_OUT, SDA_IN, SDA_OUT, WINDOW_SIZE,
};

/// One access to the serial port register.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Access {
    Read(u32),
    Write(u32),
}

struct Register {
    value: u32,
    accesses: Vec<Access>,
}

/// Register window whose serial port register is wired to a [`SimulatedLine`].
///
/// The output bits only reach the bus once the I2C function is enabled. The
/// input bits always reflect the bus levels.
#[derive(Clone)]
pub struct SimulatedWindow {
    line: SimulatedLine,
    register: Rc<RefCell<Register>>,
    len: usize,
}

impl SimulatedWindow {
    pub fn new(line: SimulatedLine, initial: u32) -> Self {
        SimulatedWindow {
            line,
            register: Rc::new(RefCell::new(Register {
                value: initial,
                accesses: Vec::new(),
            })),
            len: WINDOW_SIZE,
        }
    }

    /// Pretends the mapping covers only `len` bytes.
    pub fn with_len(mut self, len: usize) -> Self {
        self.len = len;
        self
    }

    pub fn line(&self) -> &SimulatedLine {
        &self.line
    }

    /// Last value written to the register.
    pub fn value(&self) -> u32 {
        self.register.borrow().value
    }

    pub fn accesses(&self) -> Vec<Access> {
        self.register.borrow().accesses.clone()
    }

    fn check(&self, offset: usize) -> io::Result<()> {
        if offset + 4 > self.len {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("offset 0x{:x} outside window", offset),
            ));
        }
        Ok(())
    }
}

impl RegisterWindow for SimulatedWindow {
    fn len(&self) -> usize {
        self.len
    }

    fn read32(&mut self, offset: usize) -> io::Result<u32> {
        self.check(offset)?;
        if offset != REGISTER_OFFSET {
            return Ok(0);
        }

        let (clock, data) = self.line.sample();
        let mut register = self.register.borrow_mut();
        let mut value = register.value & !(SCL_IN | SDA_IN);
        if clock {
            value |= SCL_IN;
        }
        if data {
            value |= SDA_IN;
        }
        register.accesses.push(Access::Read(value));
        Ok(value)
    }

    fn write32(&mut self, offset: usize, value: u32) -> io::Result<()> {
        self.check(offset)?;
        if offset != REGISTER_OFFSET {
            return Ok(());
        }

        let previous = {
            let mut register = self.register.borrow_mut();
            register.accesses.push(Access::Write(value));
            let previous = register.value;
            register.value = value;
            previous
        };

        let pins = |r: u32| {
            let enabled = r & I2C_ENABLE != 0;
            (!enabled || r & SCL_OUT != 0, !enabled || r & SDA_OUT != 0)
        };
        let (old_clock, old_data) = pins(previous);
        let (clock, data) = pins(value);

        self.line.drive(
            if clock != old_clock { Some(clock) } else { None },
            if data != old_data { Some(data) } else { None },
        );
        Ok(())
    }
}
