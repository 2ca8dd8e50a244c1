//! Serial port register of the graphics chip, driven as two open-drain lines.

mod mmio;
mod register_line;

use std::io;

pub use self::mmio::MmioWindow;
pub use self::register_line::RegisterLine;

/// Offset of serial port 1 inside the mapped window.
pub const REGISTER_OFFSET: usize = 0xff20;

/// Size of the memory window behind BAR0.
pub const WINDOW_SIZE: usize = 0x80000;

// bit locations in the register
pub const SCL_OUT: u32 = 0x0000_0001;
pub const SDA_OUT: u32 = 0x0000_0002;
pub const SCL_IN: u32 = 0x0000_0008;
pub const SDA_IN: u32 = 0x0000_0010;
pub const I2C_ENABLE: u32 = 0x0000_0020;

/// Mapped register window handed over by device discovery.
pub trait RegisterWindow {
    /// Bytes addressable through this window.
    fn len(&self) -> usize;

    fn read32(&mut self, offset: usize) -> io::Result<u32>;

    fn write32(&mut self, offset: usize, value: u32) -> io::Result<()>;
}
