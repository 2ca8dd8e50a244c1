use std::io;
use std::ptr::{read_volatile, write_volatile};

use super::RegisterWindow;

/// Register window over memory that is already mapped into this process.
pub struct MmioWindow {
    base: *mut u8,
    len: usize,
}

impl MmioWindow {
    /// # Safety
    /// `base` must point to a mapping of at least `len` bytes that stays valid
    /// and is not accessed through any other window while this one lives.
    pub unsafe fn new(base: *mut u8, len: usize) -> Self {
        MmioWindow { base, len }
    }

    fn register(&self, offset: usize) -> io::Result<*mut u32> {
        if offset % 4 != 0 || offset + 4 > self.len {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("offset 0x{:x} outside window of 0x{:x}", offset, self.len),
            ));
        }
        Ok(self.base.wrapping_add(offset) as *mut u32)
    }
}

impl RegisterWindow for MmioWindow {
    fn len(&self) -> usize {
        self.len
    }

    fn read32(&mut self, offset: usize) -> io::Result<u32> {
        let register = self.register(offset)?;
        // Safety: in bounds and aligned per `register`, mapping valid per `new`.
        Ok(unsafe { read_volatile(register) })
    }

    fn write32(&mut self, offset: usize, value: u32) -> io::Result<()> {
        let register = self.register(offset)?;
        // Safety: see read32.
        unsafe { write_volatile(register, value) };
        Ok(())
    }
}
