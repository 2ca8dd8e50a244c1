use std::io;
use std::time::Duration;

use embedded_hal::i2c::Operation;

use super::{address_byte, Clock, Direction, LineDriver};
use crate::error::{Error, NackSource};

/// Bit timing of the emulated master.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Timing {
    /// Delay spent in each clock phase.
    pub half_period: Duration,
    /// Longest wait for a released clock line to rise, counted per bit.
    pub stretch_timeout: Duration,
    /// Pause between two clock samples while a slave stretches.
    pub poll_interval: Duration,
}

/// Where the engine is inside a transfer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Start,
    AddressByte,
    AwaitAck,
    DataByte,
    Stop,
}

enum Fault {
    Timeout,
    Io(io::Error),
}

impl From<io::Error> for Fault {
    fn from(prev: io::Error) -> Self {
        Fault::Io(prev)
    }
}

enum Abort {
    Nack(NackSource),
    Fault(Fault),
}

impl From<Fault> for Abort {
    fn from(prev: Fault) -> Self {
        Abort::Fault(prev)
    }
}

impl From<io::Error> for Abort {
    fn from(prev: io::Error) -> Self {
        Abort::Fault(Fault::Io(prev))
    }
}

/// Direction an operation is framed in; `None` for empty reads, which put
/// nothing on the bus.
fn frame_direction(operation: &Operation<'_>) -> Option<Direction> {
    match operation {
        Operation::Read(buffer) if buffer.is_empty() => None,
        Operation::Read(_) => Some(Direction::Read),
        Operation::Write(_) => Some(Direction::Write),
    }
}

/// Bit-banged I2C master running on any [`LineDriver`].
///
/// Every exit path of [`BitLayer::transaction`] leaves the bus idle: a NACK
/// ends in a regular stop condition, a timeout or line error in an abort-stop
/// that releases both lines without waiting on the clock again.
pub struct BitLayer<L, C>
where
    L: LineDriver,
    C: Clock,
{
    line: L,
    clock: C,
    timing: Timing,
    phase: Phase,
    transferred: usize,
}

impl<L, C> BitLayer<L, C>
where
    L: LineDriver,
    C: Clock,
{
    pub fn new(line: L, clock: C, timing: Timing) -> Self {
        BitLayer {
            line,
            clock,
            timing,
            phase: Phase::Idle,
            transferred: 0,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Runs `operations` against `address` as one transaction and returns the
    /// number of payload bytes moved.
    ///
    /// Adjacent operations of the same direction share one address frame; a
    /// change of direction issues a repeated start.
    pub fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<usize, Error> {
        self.transferred = 0;

        match self.run(address, operations) {
            Ok(()) => {
                debug!(
                    "transaction with 0x{:02x} done, {} bytes",
                    address, self.transferred
                );
                Ok(self.transferred)
            }
            Err(Abort::Nack(source)) => {
                warn!(
                    "0x{:02x} did not acknowledge {:?} after {} bytes",
                    address, source, self.transferred
                );
                if let Err(fault) = self.stop() {
                    self.abort_stop();
                    if let Fault::Io(e) = fault {
                        return Err(Error::Io(e));
                    }
                }
                Err(Error::Nack {
                    source,
                    transferred: self.transferred,
                })
            }
            Err(Abort::Fault(Fault::Timeout)) => {
                warn!(
                    "clock stretch timeout talking to 0x{:02x} after {} bytes",
                    address, self.transferred
                );
                self.abort_stop();
                Err(Error::Timeout {
                    transferred: self.transferred,
                })
            }
            Err(Abort::Fault(Fault::Io(e))) => {
                error!("line access failed: {}", e);
                self.abort_stop();
                Err(Error::Io(e))
            }
        }
    }

    fn run(&mut self, address: u8, operations: &mut [Operation<'_>]) -> Result<(), Abort> {
        let mut current: Option<Direction> = None;

        for index in 0..operations.len() {
            let direction = match frame_direction(&operations[index]) {
                Some(direction) => direction,
                None => continue,
            };
            // Keep acking only if the next frame continues this read run.
            let next_is_read = operations[index + 1..]
                .iter()
                .filter_map(frame_direction)
                .next()
                == Some(Direction::Read);

            if current != Some(direction) {
                self.start()?;
                self.phase = Phase::AddressByte;
                if !self.write_byte(address_byte(address, direction))? {
                    return Err(Abort::Nack(NackSource::Address));
                }
                current = Some(direction);
            }

            match operations[index] {
                Operation::Write(bytes) => {
                    for &byte in bytes {
                        self.phase = Phase::DataByte;
                        if !self.write_byte(byte)? {
                            return Err(Abort::Nack(NackSource::Data(self.transferred)));
                        }
                        self.transferred += 1;
                    }
                }
                Operation::Read(ref mut buffer) => {
                    let last = buffer.len() - 1;
                    for (i, slot) in buffer.iter_mut().enumerate() {
                        self.phase = Phase::DataByte;
                        *slot = self.read_byte(i != last || next_is_read)?;
                        self.transferred += 1;
                    }
                }
            }
        }

        if current.is_none() {
            self.start()?;
        }
        self.stop()?;
        Ok(())
    }

    /// Start condition, or repeated start when issued with the clock low.
    fn start(&mut self) -> Result<(), Fault> {
        trace!("start");
        self.phase = Phase::Start;
        self.line.set_data(true)?;
        self.clock_high()?;
        self.delay();
        self.line.set_data(false)?;
        self.delay();
        self.line.set_clock(false)?;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), Fault> {
        trace!("stop");
        self.phase = Phase::Stop;
        self.line.set_clock(false)?;
        self.line.set_data(false)?;
        self.delay();
        let released = self.clock_high();
        self.delay();
        self.line.set_data(true)?;
        self.delay();
        self.phase = Phase::Idle;
        released
    }

    /// Stop sequence that never waits for the clock, used once the bus has
    /// already misbehaved.
    fn abort_stop(&mut self) {
        trace!("abort stop");
        self.phase = Phase::Stop;
        let released = self
            .line
            .set_clock(false)
            .and_then(|_| self.line.set_data(false))
            .and_then(|_| self.line.set_clock(true));
        self.delay();
        if let Err(e) = released.and_then(|_| self.line.set_data(true)) {
            error!("could not release bus lines: {}", e);
        }
        self.delay();
        self.phase = Phase::Idle;
    }

    /// Sends eight bits MSB first and samples the acknowledge bit.
    fn write_byte(&mut self, byte: u8) -> Result<bool, Fault> {
        trace!("writing byte 0x{:02x}", byte);
        for shift in (0..8).rev() {
            self.write_bit((byte >> shift) & 0x1 == 1)?;
        }

        self.phase = Phase::AwaitAck;
        let nack = self.read_bit()?;
        Ok(!nack)
    }

    /// Receives eight bits MSB first, then answers with ACK or NACK.
    fn read_byte(&mut self, ack: bool) -> Result<u8, Fault> {
        let mut byte = 0u8;
        for _ in 0..8 {
            byte = (byte << 1) | self.read_bit()? as u8;
        }

        trace!("read byte 0x{:02x}, {}", byte, if ack { "ack" } else { "nack" });
        self.phase = Phase::AwaitAck;
        self.write_bit(!ack)?;
        Ok(byte)
    }

    fn write_bit(&mut self, bit: bool) -> Result<(), Fault> {
        self.line.set_clock(false)?;
        self.line.set_data(bit)?;
        self.delay();
        self.clock_high()?;
        self.delay();
        self.line.set_clock(false)?;
        Ok(())
    }

    fn read_bit(&mut self) -> Result<bool, Fault> {
        self.line.set_data(true)?;
        self.line.set_clock(false)?;
        self.delay();
        self.clock_high()?;
        let bit = self.line.data()?;
        self.delay();
        self.line.set_clock(false)?;
        Ok(bit)
    }

    /// Releases the clock and waits for it to rise while a slave may stretch it.
    fn clock_high(&mut self) -> Result<(), Fault> {
        self.line.set_clock(true)?;

        let started = self.clock.now();
        loop {
            if self.line.clock()? {
                return Ok(());
            }
            if self.clock.now().saturating_sub(started) >= self.timing.stretch_timeout {
                return Err(Fault::Timeout);
            }
            self.clock.sleep(self.timing.poll_interval);
        }
    }

    fn delay(&mut self) {
        self.clock.sleep(self.timing.half_period);
    }
}
