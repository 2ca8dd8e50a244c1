//! Device discovery: finds the graphics chip on the PCI bus and maps the
//! window holding its serial port register.
//!
//! Discovery walks a sysfs-style directory (`/sys/bus/pci/devices`) so it can
//! be pointed at a fake tree in tests.

mod devmem;

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub use self::devmem::DevMemWindow;
use crate::error::Error;
use crate::hardware::WINDOW_SIZE;

pub const DEFAULT_SYSFS_ROOT: &str = "/sys/bus/pci/devices";
pub const DEFAULT_DEVMEM: &str = "/dev/mem";

pub const PCI_VENDOR_ID_S3: u16 = 0x5333;
pub const PCI_CHIP_SAVAGE4: u16 = 0x8a22;
pub const PCI_CHIP_SAVAGE2000: u16 = 0x9102;

/// Memory space bits of a base address register.
const PCI_BASE_ADDRESS_MEM_MASK: u64 = !0xf;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Chip {
    Savage4,
    Savage2000,
}

impl Chip {
    /// Exact vendor and device match; subsystem ids are not looked at.
    pub fn from_ids(vendor: u16, device: u16) -> Option<Chip> {
        match (vendor, device) {
            (PCI_VENDOR_ID_S3, PCI_CHIP_SAVAGE4) => Some(Chip::Savage4),
            (PCI_VENDOR_ID_S3, PCI_CHIP_SAVAGE2000) => Some(Chip::Savage2000),
            _ => None,
        }
    }
}

impl fmt::Display for Chip {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match *self {
            Chip::Savage4 => "Savage4",
            Chip::Savage2000 => "Savage2000",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PciDevice {
    pub slot: String,
    pub chip: Chip,
    /// Physical base of the register window.
    pub base: u64,
}

impl PciDevice {
    /// Maps the register window through `devmem`.
    pub fn open_window<P: AsRef<Path>>(&self, devmem: P) -> Result<DevMemWindow, Error> {
        let window = DevMemWindow::open(devmem, self.base, WINDOW_SIZE)?;
        info!("using {} at {} (0x{:x})", self.chip, self.slot, self.base);
        Ok(window)
    }
}

/// All matching devices below `root`, in slot order.
pub fn find_devices<P: AsRef<Path>>(root: P) -> Result<Vec<PciDevice>, Error> {
    let mut slots: Vec<PathBuf> = fs::read_dir(root.as_ref())?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .collect();
    slots.sort();

    let mut devices = Vec::new();
    for path in slots {
        match inspect(&path) {
            Ok(Some(device)) => devices.push(device),
            Ok(None) => {}
            Err(e) => debug!("skipping {}: {}", path.display(), e),
        }
    }
    Ok(devices)
}

/// First matching device, or [`Error::DeviceNotFound`].
pub fn find_device<P: AsRef<Path>>(root: P) -> Result<PciDevice, Error> {
    match find_devices(root)?.into_iter().next() {
        Some(device) => Ok(device),
        None => {
            warn!("no Savage4 or Savage2000 found");
            Err(Error::DeviceNotFound)
        }
    }
}

fn inspect(path: &Path) -> io::Result<Option<PciDevice>> {
    let vendor = read_id(&path.join("vendor"))?;
    let device = read_id(&path.join("device"))?;

    let chip = match Chip::from_ids(vendor, device) {
        Some(chip) => chip,
        None => return Ok(None),
    };

    let resource = fs::read_to_string(path.join("resource"))?;
    let base = parse_bar0(&resource).ok_or_else(|| invalid("no memory BAR0"))?;
    let slot = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    trace!("{} is a {} with BAR0 0x{:x}", slot, chip, base);
    Ok(Some(PciDevice { slot, chip, base }))
}

fn read_id(path: &Path) -> io::Result<u16> {
    let text = fs::read_to_string(path)?;
    parse_hex(&text)
        .and_then(|value| if value <= 0xffff { Some(value as u16) } else { None })
        .ok_or_else(|| invalid("malformed id"))
}

fn parse_hex(text: &str) -> Option<u64> {
    let text = text.trim();
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    u64::from_str_radix(digits, 16).ok()
}

/// Start of BAR0 from a sysfs `resource` file, masked to its memory bits.
fn parse_bar0(resource: &str) -> Option<u64> {
    let start = resource.lines().next()?.split_whitespace().next()?;
    match parse_hex(start)? & PCI_BASE_ADDRESS_MEM_MASK {
        0 => None,
        base => Some(base),
    }
}

fn invalid(descr: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, descr.to_owned())
}
