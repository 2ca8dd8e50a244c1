use std::{convert, error, fmt, io};

use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource};

/// Which frame of a transfer went unacknowledged.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NackSource {
    Address,
    /// Index of the rejected byte within the payload.
    Data(usize),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// The register window is too small or misaligned for the serial port register.
    InvalidHandle,
    AlreadyAttached,
    NotAttached,
    /// Address does not fit in 7 bits.
    InvalidAddress(u8),
    InvalidTiming,
}

#[derive(Debug)]
pub enum Error {
    Io(io::Error),
    Config(ConfigError),
    /// A released clock line never rose within the stretch timeout.
    Timeout { transferred: usize },
    Nack { source: NackSource, transferred: usize },
    /// The bus is not idle.
    Busy,
    DeviceNotFound,
    Registry(String),
}

impl Error {
    /// Number of payload bytes that completed before the failure.
    pub fn transferred(&self) -> usize {
        match *self {
            Error::Timeout { transferred } | Error::Nack { transferred, .. } => transferred,
            _ => 0,
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            Error::Io(ref e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            ConfigError::InvalidHandle => f.write_str("invalid register window"),
            ConfigError::AlreadyAttached => f.write_str("bus already attached"),
            ConfigError::NotAttached => f.write_str("bus not attached"),
            ConfigError::InvalidAddress(address) => {
                write!(f, "address 0x{:02x} is not a 7-bit address", address)
            }
            ConfigError::InvalidTiming => f.write_str("invalid bus timing"),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::Io(ref e) => write!(f, "IoError: {}", e),
            Error::Config(ref e) => write!(f, "ConfigError: {}", e),
            Error::Timeout { transferred } => write!(
                f,
                "bus timeout: clock line held low ({} bytes transferred)",
                transferred
            ),
            Error::Nack {
                source: NackSource::Address,
                ..
            } => f.write_str("address not acknowledged"),
            Error::Nack {
                source: NackSource::Data(index),
                transferred,
            } => write!(
                f,
                "data byte {} not acknowledged ({} bytes transferred)",
                index, transferred
            ),
            Error::Busy => f.write_str("bus busy"),
            Error::DeviceNotFound => f.write_str("no matching device found"),
            Error::Registry(ref descr) => write!(f, "RegistryError: {}", descr),
        }
    }
}

impl convert::From<io::Error> for Error {
    fn from(prev: io::Error) -> Self {
        Error::Io(prev)
    }
}

impl convert::From<ConfigError> for Error {
    fn from(prev: ConfigError) -> Self {
        Error::Config(prev)
    }
}

impl embedded_hal::i2c::Error for Error {
    fn kind(&self) -> ErrorKind {
        match *self {
            Error::Nack {
                source: NackSource::Address,
                ..
            } => ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address),
            Error::Nack {
                source: NackSource::Data(_),
                ..
            } => ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data),
            Error::Timeout { .. } | Error::Io(_) => ErrorKind::Bus,
            _ => ErrorKind::Other,
        }
    }
}
