//! Bus adapter: owns the register window from attach to detach and runs
//! transfers on it.
//!
//! The adapter performs no locking and no retries. Callers sharing one bus
//! between threads wrap it in a `Mutex` held for the whole transfer.

mod registry;

use std::time::Duration;

use embedded_hal::i2c::{ErrorType, I2c, Operation, SevenBitAddress};

pub use self::registry::{BusId, BusRegistry, Registry};
use crate::bit_layer::{BitLayer, Clock, Direction, LineDriver, SystemClock, Timing, MAX_ADDRESS};
use crate::error::{ConfigError, Error, NackSource};
use crate::hardware::{RegisterLine, RegisterWindow};

/// Name the adapter registers under.
pub const ADAPTER_NAME: &str = "I2C Savage4 adapter";

/// Timing of an attached bus.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BusConfig {
    pub half_period: Duration,
    pub stretch_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for BusConfig {
    fn default() -> Self {
        BusConfig {
            half_period: Duration::from_micros(10),
            stretch_timeout: Duration::from_millis(500),
            poll_interval: Duration::from_micros(10),
        }
    }
}

impl BusConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stretch_timeout == Duration::from_secs(0)
            || self.poll_interval == Duration::from_secs(0)
        {
            return Err(ConfigError::InvalidTiming);
        }
        Ok(())
    }

    pub fn timing(&self) -> Timing {
        Timing {
            half_period: self.half_period,
            stretch_timeout: self.stretch_timeout,
            poll_interval: self.poll_interval,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BusState {
    Detached,
    Idle,
    Busy,
}

pub struct BusAdapter<W, C = SystemClock>
where
    W: RegisterWindow,
    C: Clock,
{
    line: Option<RegisterLine<W>>,
    clock: C,
    config: BusConfig,
    state: BusState,
    bus_id: Option<BusId>,
}

impl<W> BusAdapter<W, SystemClock>
where
    W: RegisterWindow,
{
    pub fn new() -> Self {
        Self::with_clock(SystemClock::new())
    }
}

impl<W> Default for BusAdapter<W, SystemClock>
where
    W: RegisterWindow,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<W, C> BusAdapter<W, C>
where
    W: RegisterWindow,
    C: Clock,
{
    pub fn with_clock(clock: C) -> Self {
        BusAdapter {
            line: None,
            clock,
            config: BusConfig::default(),
            state: BusState::Detached,
            bus_id: None,
        }
    }

    pub fn state(&self) -> BusState {
        self.state
    }

    pub fn bus_id(&self) -> Option<BusId> {
        self.bus_id
    }

    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn window(&self) -> Option<&W> {
        self.line.as_ref().map(|line| line.window())
    }

    /// Takes ownership of `window`, enables the I2C function and registers
    /// the bus.
    ///
    /// An adapter that is already attached keeps its current window and the
    /// new one is dropped.
    pub fn attach(
        &mut self,
        window: W,
        config: BusConfig,
        registry: &mut dyn BusRegistry,
    ) -> Result<BusId, Error> {
        if self.line.is_some() {
            error!("attach refused: bus already attached as {:?}", self.bus_id);
            return Err(ConfigError::AlreadyAttached.into());
        }
        config.validate()?;
        let mut line = RegisterLine::new(window)?;

        let id = registry.register(ADAPTER_NAME)?;
        let ready = line
            .set_clock(true)
            .and_then(|_| line.set_data(true))
            .and_then(|_| line.enable());
        if let Err(e) = ready {
            error!("could not enable serial port: {}", e);
            if let Err(e) = registry.unregister(id) {
                warn!("{}", e);
            }
            return Err(e.into());
        }

        info!(
            "attached {} as {}, half period {:?}, stretch timeout {:?}",
            ADAPTER_NAME, id, config.half_period, config.stretch_timeout
        );
        self.line = Some(line);
        self.config = config;
        self.state = BusState::Idle;
        self.bus_id = Some(id);
        Ok(id)
    }

    /// Unregisters the bus and hands the window back.
    pub fn detach(&mut self, registry: &mut dyn BusRegistry) -> Result<W, Error> {
        match self.state {
            BusState::Detached => return Err(ConfigError::NotAttached.into()),
            BusState::Busy => return Err(Error::Busy),
            BusState::Idle => {}
        }

        if self.line.is_none() {
            return Err(ConfigError::NotAttached.into());
        }
        // The adapter stays attached until the registry lets go of the bus.
        if let Some(id) = self.bus_id {
            registry.unregister(id)?;
            info!("detached {}", id);
        }

        self.bus_id = None;
        self.state = BusState::Detached;
        match self.line.take() {
            Some(line) => Ok(line.into_inner()),
            None => Err(ConfigError::NotAttached.into()),
        }
    }

    /// Moves `buffer` to or from the slave at `address` and returns the number
    /// of bytes transferred.
    pub fn transfer(
        &mut self,
        address: u8,
        direction: Direction,
        buffer: &mut [u8],
    ) -> Result<usize, Error> {
        match direction {
            Direction::Write => self.execute(address, &mut [Operation::Write(&*buffer)]),
            Direction::Read => self.execute(address, &mut [Operation::Read(buffer)]),
        }
    }

    pub fn write(&mut self, address: u8, bytes: &[u8]) -> Result<usize, Error> {
        self.execute(address, &mut [Operation::Write(bytes)])
    }

    pub fn read(&mut self, address: u8, buffer: &mut [u8]) -> Result<usize, Error> {
        self.execute(address, &mut [Operation::Read(buffer)])
    }

    /// Write followed by a read behind a repeated start.
    pub fn write_read(
        &mut self,
        address: u8,
        bytes: &[u8],
        buffer: &mut [u8],
    ) -> Result<usize, Error> {
        self.execute(
            address,
            &mut [Operation::Write(bytes), Operation::Read(buffer)],
        )
    }

    /// Quick write of the address alone; `false` if nothing answered.
    pub fn probe(&mut self, address: u8) -> Result<bool, Error> {
        match self.write(address, &[]) {
            Ok(_) => Ok(true),
            Err(Error::Nack {
                source: NackSource::Address,
                ..
            }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Runs `operations` as one transaction.
    pub fn execute(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<usize, Error> {
        if address > MAX_ADDRESS {
            return Err(ConfigError::InvalidAddress(address).into());
        }
        let line = match self.line.as_mut() {
            Some(line) => line,
            None => return Err(ConfigError::NotAttached.into()),
        };
        if self.state != BusState::Idle {
            return Err(Error::Busy);
        }

        self.state = BusState::Busy;
        let result =
            BitLayer::new(line, &mut self.clock, self.config.timing()).transaction(address, operations);
        self.state = BusState::Idle;
        result
    }
}

impl<W, C> ErrorType for BusAdapter<W, C>
where
    W: RegisterWindow,
    C: Clock,
{
    type Error = Error;
}

impl<W, C> I2c<SevenBitAddress> for BusAdapter<W, C>
where
    W: RegisterWindow,
    C: Clock,
{
    fn transaction(
        &mut self,
        address: SevenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        self.execute(address, operations).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bit_layer::MockClock;
    use crate::emulation::{SimulatedLine, SimulatedWindow, SlaveDevice};

    fn attached() -> (BusAdapter<SimulatedWindow, MockClock>, Registry, SimulatedLine) {
        let line = SimulatedLine::new();
        let window = SimulatedWindow::new(line.clone(), 0);
        let mut registry = Registry::new();
        let mut bus = BusAdapter::with_clock(MockClock::new());
        bus.attach(window, BusConfig::default(), &mut registry)
            .unwrap();
        (bus, registry, line)
    }

    #[test]
    fn attach_registers_and_enables() {
        let (bus, registry, line) = attached();

        assert_eq!(bus.state(), BusState::Idle);
        assert_eq!(registry.lookup(ADAPTER_NAME), bus.bus_id());
        assert_eq!(bus.window().unwrap().value() & 0x23, 0x23);
        assert_eq!(line.levels(), (true, true));
        assert_eq!(line.starts() + line.stops(), 0);
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let mut registry = Registry::new();
        let mut bus = BusAdapter::with_clock(MockClock::new());
        let config = BusConfig {
            stretch_timeout: Duration::from_secs(0),
            ..BusConfig::default()
        };

        let result = bus.attach(
            SimulatedWindow::new(SimulatedLine::new(), 0),
            config,
            &mut registry,
        );

        match result {
            Err(Error::Config(ConfigError::InvalidTiming)) => {}
            other => panic!("unexpected result {:?}", other),
        }
        assert!(registry.is_empty());
    }

    #[test]
    fn address_must_fit_seven_bits() {
        let (mut bus, _, _) = attached();

        match bus.write(0x80, &[0]) {
            Err(Error::Config(ConfigError::InvalidAddress(0x80))) => {}
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn probe_finds_present_device() {
        let (mut bus, _, line) = attached();
        line.attach_device(SlaveDevice::new(0x44, vec![0; 2]).unwrap());

        assert!(bus.probe(0x44).unwrap());
        assert!(!bus.probe(0x45).unwrap());
        assert_eq!(bus.state(), BusState::Idle);
    }

    #[test]
    fn failed_unregister_keeps_bus_attached() {
        let (mut bus, mut registry, _) = attached();
        let mut other = Registry::new();

        match bus.detach(&mut other) {
            Err(Error::Registry(_)) => {}
            other => panic!("unexpected result {:?}", other.map(|_| ())),
        }
        assert_eq!(bus.state(), BusState::Idle);
        assert!(bus.window().is_some());
        assert_eq!(registry.len(), 1);

        bus.detach(&mut registry).unwrap();
        assert_eq!(bus.state(), BusState::Detached);
        assert!(registry.is_empty());
    }

    #[test]
    fn transfer_on_detached_bus_fails() {
        let mut bus: BusAdapter<SimulatedWindow, MockClock> = BusAdapter::with_clock(MockClock::new());

        match bus.transfer(0x10, Direction::Read, &mut [0u8; 1]) {
            Err(Error::Config(ConfigError::NotAttached)) => {}
            other => panic!("unexpected result {:?}", other),
        }
    }
}
