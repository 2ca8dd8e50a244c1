use std::io;

use super::{RegisterWindow, I2C_ENABLE, REGISTER_OFFSET, SCL_IN, SCL_OUT, SDA_IN, SDA_OUT};
use crate::bit_layer::LineDriver;
use crate::error::ConfigError;

/// SCL and SDA on the shared serial port register.
///
/// The register has no per-bit write masks, so every update is a
/// read-modify-write that touches a single bit. Each write is followed by a
/// read to flush it past any posting buffer before the next bus phase.
pub struct RegisterLine<W>
where
    W: RegisterWindow,
{
    window: W,
}

impl<W> RegisterLine<W>
where
    W: RegisterWindow,
{
    pub fn new(window: W) -> Result<Self, ConfigError> {
        if window.len() < REGISTER_OFFSET + 4 {
            return Err(ConfigError::InvalidHandle);
        }

        Ok(RegisterLine { window })
    }

    /// Switches the multiplexed pins to the I2C function.
    pub fn enable(&mut self) -> io::Result<()> {
        self.update(I2C_ENABLE, true)
    }

    pub fn window(&self) -> &W {
        &self.window
    }

    pub fn into_inner(self) -> W {
        self.window
    }

    fn update(&mut self, mask: u32, set: bool) -> io::Result<()> {
        let mut r = self.window.read32(REGISTER_OFFSET)?;
        if set {
            r |= mask;
        } else {
            r &= !mask;
        }
        self.window.write32(REGISTER_OFFSET, r)?;
        self.window.read32(REGISTER_OFFSET)?;
        Ok(())
    }

    fn input(&mut self, mask: u32) -> io::Result<bool> {
        Ok(self.window.read32(REGISTER_OFFSET)? & mask != 0)
    }
}

impl<W> LineDriver for RegisterLine<W>
where
    W: RegisterWindow,
{
    fn set_clock(&mut self, level: bool) -> io::Result<()> {
        self.update(SCL_OUT, level)
    }

    fn set_data(&mut self, level: bool) -> io::Result<()> {
        self.update(SDA_OUT, level)
    }

    fn clock(&mut self) -> io::Result<bool> {
        self.input(SCL_IN)
    }

    fn data(&mut self) -> io::Result<bool> {
        self.input(SDA_IN)
    }
}
