use crate::bit_layer::{is_reserved, Direction};
use crate::error::ConfigError;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum State {
    Idle,
    ReadI2CAddr,
    // master writes; slave reads
    SlaveReadValue,
    // slave writes; master reads
    SlaveWriteValue,
}

/// Register-file slave reacting to bus edges.
///
/// The first byte of every write selects the current register, further bytes
/// are stored there with auto-increment. Reads start at the current register.
#[derive(Clone, Debug)]
pub struct SlaveDevice {
    address: u8,
    registers: Vec<u8>,
    current_register: Option<usize>,
    state: State,
    direction: Direction,
    shift: u8,
    bits: u8,
    acking: bool,
    master_acked: bool,
    pull_data_low: bool,
    received: usize,
    nack_after: Option<usize>,
}

impl SlaveDevice {
    /// Fails with [`ConfigError::InvalidAddress`] for reserved addresses.
    pub fn new(address: u8, registers: Vec<u8>) -> Result<Self, ConfigError> {
        if is_reserved(address) {
            return Err(ConfigError::InvalidAddress(address));
        }

        Ok(SlaveDevice {
            address,
            registers,
            current_register: None,
            state: State::Idle,
            direction: Direction::Write,
            shift: 0,
            bits: 0,
            acking: false,
            master_acked: false,
            pull_data_low: false,
            received: 0,
            nack_after: None,
        })
    }

    /// Refuse the data byte with index `count` of every write.
    pub fn nack_after(&mut self, count: usize) {
        self.nack_after = Some(count);
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn registers(&self) -> &[u8] {
        &self.registers
    }

    pub fn current_register(&self) -> Option<usize> {
        self.current_register
    }

    pub fn pulls_data_low(&self) -> bool {
        self.pull_data_low
    }

    pub fn on_start(&mut self) {
        self.state = State::ReadI2CAddr;
        self.shift = 0;
        self.bits = 0;
        self.acking = false;
        self.pull_data_low = false;
        self.received = 0;
    }

    pub fn on_stop(&mut self) {
        self.state = State::Idle;
        self.acking = false;
        self.pull_data_low = false;
    }

    pub fn on_clock_rise(&mut self, data: bool) {
        match self.state {
            State::ReadI2CAddr | State::SlaveReadValue => {
                if self.bits < 8 {
                    self.shift = (self.shift << 1) | data as u8;
                    self.bits += 1;
                }
            }
            State::SlaveWriteValue => {
                if self.bits == 8 {
                    self.master_acked = !data;
                }
            }
            State::Idle => {}
        }
    }

    pub fn on_clock_fall(&mut self) {
        match self.state {
            State::ReadI2CAddr => {
                if self.acking {
                    self.end_ack();
                    match self.direction {
                        Direction::Write => {
                            self.current_register = None;
                            self.state = State::SlaveReadValue;
                        }
                        Direction::Read => {
                            self.state = State::SlaveWriteValue;
                            self.load_byte();
                        }
                    }
                } else if self.bits == 8 {
                    if self.shift >> 1 == self.address {
                        self.direction = Direction::from(self.shift);
                        self.begin_ack();
                    } else {
                        self.state = State::Idle;
                    }
                }
            }
            State::SlaveReadValue => {
                if self.acking {
                    self.end_ack();
                } else if self.bits == 8 {
                    if self.nack_after == Some(self.received) {
                        self.state = State::Idle;
                    } else {
                        let value = self.shift;
                        self.store(value);
                        self.received += 1;
                        self.begin_ack();
                    }
                }
            }
            State::SlaveWriteValue => {
                if self.bits < 8 {
                    self.bits += 1;
                    self.pull_data_low = self.bits < 8 && !self.output_bit();
                } else if self.master_acked {
                    self.load_byte();
                } else {
                    self.state = State::Idle;
                    self.pull_data_low = false;
                }
            }
            State::Idle => {}
        }
    }

    fn begin_ack(&mut self) {
        self.acking = true;
        self.pull_data_low = true;
    }

    fn end_ack(&mut self) {
        self.acking = false;
        self.pull_data_low = false;
        self.shift = 0;
        self.bits = 0;
    }

    fn store(&mut self, value: u8) {
        match self.current_register {
            None => self.current_register = Some(value as usize),
            Some(register) => {
                if let Some(slot) = self.registers.get_mut(register) {
                    *slot = value;
                }
                self.current_register = Some(self.next_register(register));
            }
        }
    }

    fn load_byte(&mut self) {
        let register = self.current_register.unwrap_or(0);
        self.shift = self.registers.get(register).cloned().unwrap_or(0xff);
        self.current_register = Some(self.next_register(register));
        self.bits = 0;
        self.master_acked = false;
        self.pull_data_low = !self.output_bit();
    }

    fn output_bit(&self) -> bool {
        (self.shift >> (7 - self.bits)) & 0x1 == 1
    }

    fn next_register(&self, register: usize) -> usize {
        if self.registers.is_empty() {
            0
        } else {
            (register + 1) % self.registers.len()
        }
    }
}
