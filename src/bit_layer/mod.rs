mod bit_layer;
mod clock;
mod direction;

use std::io;

pub use self::bit_layer::{BitLayer, Phase, Timing};
pub use self::clock::{Clock, MockClock, SystemClock};
pub use self::direction::{address_byte, is_reserved, Direction, MAX_ADDRESS};

/// Open-drain access to the two bus lines.
///
/// Passing `true` to a setter releases the line and lets the pull-up raise it,
/// `false` actively pulls it low. The getters report the electrical level,
/// which can stay low after a release while a slave stretches the clock.
pub trait LineDriver {
    fn set_clock(&mut self, level: bool) -> io::Result<()>;

    fn set_data(&mut self, level: bool) -> io::Result<()>;

    fn clock(&mut self) -> io::Result<bool>;

    fn data(&mut self) -> io::Result<bool>;
}

impl<'a, L> LineDriver for &'a mut L
where
    L: LineDriver + ?Sized,
{
    fn set_clock(&mut self, level: bool) -> io::Result<()> {
        (**self).set_clock(level)
    }

    fn set_data(&mut self, level: bool) -> io::Result<()> {
        (**self).set_data(level)
    }

    fn clock(&mut self) -> io::Result<bool> {
        (**self).clock()
    }

    fn data(&mut self) -> io::Result<bool> {
        (**self).data()
    }
}
