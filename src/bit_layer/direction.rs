use std::convert;
use std::fmt;

/// Highest 7-bit address.
pub const MAX_ADDRESS: u8 = 0x7f;

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            &Direction::Read => f.write_str("read"),
            &Direction::Write => f.write_str("write"),
        }
    }
}

/// Transfer direction as seen from the master.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Direction {
    Write,
    Read,
}

impl convert::From<u8> for Direction {
    /// Takes the R/W bit, the lowest bit of an address byte.
    fn from(value: u8) -> Self {
        if value & 0x1 == 1 {
            Direction::Read
        } else {
            Direction::Write
        }
    }
}

/// Address byte sent after a start condition: address in the upper seven bits,
/// R/W in bit 0.
pub fn address_byte(address: u8, direction: Direction) -> u8 {
    (address << 1)
        | match direction {
            Direction::Write => 0,
            Direction::Read => 1,
        }
}

/// Addresses set aside by the I2C specification for general call, CBUS,
/// high-speed master codes and 10-bit addressing.
pub fn is_reserved(address: u8) -> bool {
    match address {
        0x00..=0x07 | 0x78..=0xff => true,
        _ => false,
    }
}
