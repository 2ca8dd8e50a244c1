//! Software I2C master for the serial port of S3 Savage4 and Savage2000
//! graphics chips.
//!
//! The chip exposes SCL and SDA as open-drain bits of a single memory-mapped
//! register. [`hardware::RegisterLine`] drives those bits,
//! [`bit_layer::BitLayer`] bit-bangs the protocol on top of any
//! [`bit_layer::LineDriver`] and [`adapter::BusAdapter`] ties both to a mapped
//! window handed over by [`probe`].

#[macro_use]
extern crate log;

pub mod adapter;
pub mod bit_layer;
pub mod emulation;
pub mod error;
pub mod hardware;
pub mod probe;

pub use crate::adapter::{BusAdapter, BusConfig, BusId, BusRegistry, BusState, Registry};
pub use crate::bit_layer::Direction;
pub use crate::error::{ConfigError, Error, NackSource};
