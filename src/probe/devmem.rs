use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::FileExt;
use std::path::Path;

use crate::hardware::RegisterWindow;

/// Physical register window reached through a memory device such as `/dev/mem`.
///
/// Every access is a single 4-byte positioned read or write, which the kernel
/// turns into one uncached bus cycle.
pub struct DevMemWindow {
    file: File,
    base: u64,
    len: usize,
}

impl DevMemWindow {
    pub fn open<P: AsRef<Path>>(path: P, base: u64, len: usize) -> io::Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        Ok(DevMemWindow { file, base, len })
    }

    pub fn base(&self) -> u64 {
        self.base
    }

    fn position(&self, offset: usize) -> io::Result<u64> {
        if offset % 4 != 0 || offset + 4 > self.len {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("offset 0x{:x} outside window of 0x{:x}", offset, self.len),
            ));
        }
        Ok(self.base + offset as u64)
    }
}

impl RegisterWindow for DevMemWindow {
    fn len(&self) -> usize {
        self.len
    }

    fn read32(&mut self, offset: usize) -> io::Result<u32> {
        let mut bytes = [0u8; 4];
        self.file.read_exact_at(&mut bytes, self.position(offset)?)?;
        Ok(u32::from_le_bytes(bytes))
    }

    fn write32(&mut self, offset: usize, value: u32) -> io::Result<()> {
        self.file
            .write_all_at(&value.to_le_bytes(), self.position(offset)?)
    }
}
