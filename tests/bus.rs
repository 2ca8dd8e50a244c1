extern crate embedded_hal;
extern crate savage_i2c;

use std::time::Duration;

use embedded_hal::i2c::I2c;
use savage_i2c::bit_layer::{Clock, MockClock};
use savage_i2c::emulation::{Access, SimulatedLine, SimulatedWindow, SlaveDevice};
use savage_i2c::hardware::{I2C_ENABLE, SCL_IN, SCL_OUT, SDA_IN, SDA_OUT};
use savage_i2c::{
    BusAdapter, BusConfig, BusRegistry, BusState, ConfigError, Direction, Error, NackSource,
    Registry,
};

type Bus = BusAdapter<SimulatedWindow, MockClock>;

fn setup(initial: u32) -> (Bus, Registry, SimulatedLine) {
    setup_with(initial, BusConfig::default())
}

fn setup_with(initial: u32, config: BusConfig) -> (Bus, Registry, SimulatedLine) {
    let line = SimulatedLine::new();
    let mut registry = Registry::new();
    let mut bus = Bus::with_clock(MockClock::new());
    bus.attach(
        SimulatedWindow::new(line.clone(), initial),
        config,
        &mut registry,
    )
    .unwrap();
    (bus, registry, line)
}

/// Millisecond polling so a handful of polls spans the whole stretch timeout.
fn coarse_config() -> BusConfig {
    BusConfig {
        half_period: Duration::from_micros(10),
        stretch_timeout: Duration::from_millis(10),
        poll_interval: Duration::from_millis(1),
    }
}

fn with_device(device: SlaveDevice) -> (Bus, Registry, SimulatedLine) {
    let (bus, registry, line) = setup(0);
    line.attach_device(device);
    (bus, registry, line)
}

#[test]
fn attach_preserves_unrelated_register_bits() {
    let (bus, _, _) = setup(0x8000_0040);
    let value = bus.window().unwrap().value();

    // Input bits sampled by the read-modify-write are written back as read.
    assert_eq!(
        value & !(SCL_IN | SDA_IN),
        0x8000_0040 | I2C_ENABLE | SCL_OUT | SDA_OUT
    );
    assert_eq!(value, 0x8000_007b);
}

#[test]
fn empty_transaction_is_start_then_stop() {
    let (mut bus, _, line) = setup(0);

    assert_eq!(bus.execute(0x50, &mut []).unwrap(), 0);

    assert_eq!(line.starts(), 1);
    assert_eq!(line.stops(), 1);
    assert_eq!(line.levels(), (true, true));
    assert_eq!(bus.state(), BusState::Idle);
}

#[test]
fn silent_address_fails_after_one_byte() {
    let (mut bus, _, line) = setup(0);

    let err = bus
        .transfer(0x42, Direction::Write, &mut [0x01, 0x02])
        .unwrap_err();

    match err {
        Error::Nack {
            source: NackSource::Address,
            transferred: 0,
        } => {}
        other => panic!("unexpected error {:?}", other),
    }
    assert_eq!(line.clock_rises(), 10);
    assert_eq!(line.stops(), 1);
    assert_eq!(line.levels(), (true, true));
}

#[test]
fn stuck_clock_times_out() {
    let (mut bus, _, line) = setup(0);
    line.hold_clock_low(true);
    let config = *bus.config();

    let err = bus.write(0x1d, &[0x3a]).unwrap_err();

    match err {
        Error::Timeout { transferred: 0 } => {}
        other => panic!("unexpected error {:?}", other),
    }
    let bound = config.stretch_timeout + config.poll_interval + config.half_period * 8;
    assert!(bus.clock().now() <= bound, "took {:?}", bus.clock().now());
    assert_eq!(bus.state(), BusState::Idle);

    // The master let go of both lines even though SCL never came back.
    let value = bus.window().unwrap().value();
    assert_eq!(value & (SCL_OUT | SDA_OUT), SCL_OUT | SDA_OUT);
}

#[test]
fn writes_land_in_device_registers() {
    let (mut bus, _, line) = with_device(SlaveDevice::new(0x1d, vec![0; 4]).unwrap());

    let written = bus
        .transfer(0x1d, Direction::Write, &mut [0x01, 0x3a, 0xc5])
        .unwrap();

    assert_eq!(written, 3);
    assert_eq!(line.device().unwrap().registers(), &[0x00, 0x3a, 0xc5, 0x00]);
}

#[test]
fn reads_follow_register_pointer() {
    let (mut bus, _, _) = with_device(SlaveDevice::new(0x1d, vec![0xde, 0xad, 0xbe, 0xef]).unwrap());
    let mut buffer = [0u8; 3];

    let moved = bus.write_read(0x1d, &[0x01], &mut buffer).unwrap();

    assert_eq!(moved, 4);
    assert_eq!(buffer, [0xad, 0xbe, 0xef]);
}

#[test]
fn data_nack_reports_partial_write() {
    let mut device = SlaveDevice::new(0x1d, vec![0; 4]).unwrap();
    device.nack_after(1);
    let (mut bus, _, line) = with_device(device);

    let err = bus.write(0x1d, &[0x00, 0x11, 0x22]).unwrap_err();

    assert_eq!(err.transferred(), 1);
    match err {
        Error::Nack {
            source: NackSource::Data(1),
            ..
        } => {}
        other => panic!("unexpected error {:?}", other),
    }
    assert_eq!(line.stops(), 1);
    assert_eq!(bus.state(), BusState::Idle);
}

#[test]
fn works_as_embedded_hal_bus() {
    fn read_pair<I: I2c>(i2c: &mut I, address: u8) -> Result<[u8; 2], I::Error> {
        let mut pair = [0u8; 2];
        i2c.write_read(address, &[0x02], &mut pair)?;
        Ok(pair)
    }

    let (mut bus, _, _) = with_device(SlaveDevice::new(0x48, vec![0, 0, 0x19, 0x80]).unwrap());

    assert_eq!(read_pair(&mut bus, 0x48).unwrap(), [0x19, 0x80]);
}

#[test]
fn second_attach_keeps_first_window() {
    let (mut bus, mut registry, line) = with_device(SlaveDevice::new(0x1d, vec![0; 2]).unwrap());
    let other = SimulatedWindow::new(SimulatedLine::new(), 0);

    let err = bus
        .attach(other, BusConfig::default(), &mut registry)
        .unwrap_err();

    match err {
        Error::Config(ConfigError::AlreadyAttached) => {}
        other => panic!("unexpected error {:?}", other),
    }
    assert_eq!(registry.len(), 1);
    assert!(bus.probe(0x1d).unwrap());
    assert_eq!(line.starts(), 1);
}

#[test]
fn short_window_is_rejected() {
    let mut registry = Registry::new();
    let mut bus = Bus::with_clock(MockClock::new());
    let window = SimulatedWindow::new(SimulatedLine::new(), 0).with_len(0x1000);

    match bus.attach(window, BusConfig::default(), &mut registry) {
        Err(Error::Config(ConfigError::InvalidHandle)) => {}
        other => panic!("unexpected result {:?}", other),
    }
    assert!(registry.is_empty());
    assert_eq!(bus.state(), BusState::Detached);
}

#[test]
fn detach_returns_window_and_unregisters() {
    let (mut bus, mut registry, _) = setup(0);

    let window = bus.detach(&mut registry).unwrap();

    assert!(registry.is_empty());
    assert_eq!(bus.state(), BusState::Detached);
    match bus.detach(&mut registry) {
        Err(Error::Config(ConfigError::NotAttached)) => {}
        other => panic!("unexpected result {:?}", other.map(|_| ())),
    }

    let id = bus
        .attach(window, BusConfig::default(), &mut registry)
        .unwrap();
    assert_eq!(registry.lookup(savage_i2c::adapter::ADAPTER_NAME), Some(id));
}

#[test]
fn failing_registry_aborts_attach() {
    struct Full;
    impl BusRegistry for Full {
        fn register(&mut self, _: &str) -> Result<savage_i2c::BusId, Error> {
            Err(Error::Registry("no free bus numbers".to_owned()))
        }
        fn unregister(&mut self, _: savage_i2c::BusId) -> Result<(), Error> {
            Ok(())
        }
    }

    let line = SimulatedLine::new();
    let mut bus = Bus::with_clock(MockClock::new());

    assert!(bus
        .attach(SimulatedWindow::new(line.clone(), 0), BusConfig::default(), &mut Full)
        .is_err());
    assert_eq!(bus.state(), BusState::Detached);
    assert!(bus.window().is_none());
}

#[test]
fn slow_slave_stretching_within_timeout() {
    let (mut bus, _, line) = with_device(SlaveDevice::new(0x1d, vec![0x5a; 2]).unwrap());
    line.stretch_polls(20);
    let mut buffer = [0u8; 2];

    assert_eq!(bus.read(0x1d, &mut buffer).unwrap(), 2);
    assert_eq!(buffer, [0x5a, 0x5a]);
    assert!(bus.clock().now() > Duration::from_micros(0));
}

#[test]
fn every_register_write_is_read_back() {
    let (mut bus, _, _) = with_device(SlaveDevice::new(0x1d, vec![0; 2]).unwrap());

    bus.write(0x1d, &[0x00, 0x42]).unwrap();

    let accesses = bus.window().unwrap().accesses();
    assert!(!accesses.is_empty());
    for (i, access) in accesses.iter().enumerate() {
        if let Access::Write(_) = access {
            match accesses.get(i + 1) {
                Some(Access::Read(_)) => {}
                other => panic!("write at {} followed by {:?}", i, other),
            }
        }
    }
}

#[test]
fn stretch_timeout_restarts_every_bit() {
    let config = coarse_config();
    let (mut bus, _, line) = setup_with(0, config);
    line.attach_device(SlaveDevice::new(0x1d, vec![0x5a; 2]).unwrap());
    // Every clock pulse stays low for about 9ms of the 10ms allowed.
    line.stretch_polls(10);
    let mut buffer = [0u8; 2];

    assert_eq!(bus.read(0x1d, &mut buffer).unwrap(), 2);

    assert_eq!(buffer, [0x5a, 0x5a]);
    assert!(
        bus.clock().now() > config.stretch_timeout * 10,
        "took {:?}",
        bus.clock().now()
    );
}

#[test]
fn stretch_past_timeout_on_one_bit_fails() {
    let config = coarse_config();
    let (mut bus, _, line) = setup_with(0, config);
    line.attach_device(SlaveDevice::new(0x1d, vec![0x5a; 2]).unwrap());
    // The first clock pulse after the start is held low past the timeout.
    line.stretch_polls(12);
    let mut buffer = [0u8; 2];

    match bus.read(0x1d, &mut buffer) {
        Err(Error::Timeout { transferred: 0 }) => {}
        other => panic!("unexpected result {:?}", other),
    }
    let bound = config.stretch_timeout + config.poll_interval + config.half_period * 8;
    assert!(bus.clock().now() <= bound, "took {:?}", bus.clock().now());
    assert_eq!(bus.state(), BusState::Idle);
}
