//! Master mode driver for the two-wire serial interface (TWI/I2C)
//!
//! The driver sequences the peripheral through start, address, data and
//! stop phases, busy-waiting on the TWINT flag after each one.  Every wait
//! is bounded by [`Config::max_polls`] so a device that holds the bus turns
//! into [`Error::Timeout`] instead of a hang.
//!
//! Whenever a phase ends with an unexpected status the driver issues a stop
//! condition itself before returning the error, the bus is never left held.
//! There are no retries, the caller decides whether to repeat the whole
//! transaction.
//!
//! # Caller contract
//! The driver assumes a single execution context.  It must not be used
//! from an interrupt handler while a transaction is open on `main`'s side.

use ufmt::derive::uDebug;

/// Mask for the status bits of TWSR, the low bits hold the prescaler
pub const STATUS_MASK: u8 = 0xF8;

/// Master mode status codes, as read from TWSR after masking
pub mod status {
    pub const START: u8 = 0x08;
    pub const REPEATED_START: u8 = 0x10;
    pub const SLA_W_ACK: u8 = 0x18;
    pub const SLA_W_NACK: u8 = 0x20;
    pub const DATA_W_ACK: u8 = 0x28;
    pub const DATA_W_NACK: u8 = 0x30;
    pub const ARBITRATION_LOST: u8 = 0x38;
    pub const SLA_R_ACK: u8 = 0x40;
    pub const SLA_R_NACK: u8 = 0x48;
    pub const DATA_R_ACK: u8 = 0x50;
    pub const DATA_R_NACK: u8 = 0x58;
    pub const NO_INFO: u8 = 0xF8;
}

/// TWCR bits
pub mod control {
    pub const TWINT: u8 = 1 << 7;
    pub const TWEA: u8 = 1 << 6;
    pub const TWSTA: u8 = 1 << 5;
    pub const TWSTO: u8 = 1 << 4;
    pub const TWWC: u8 = 1 << 3;
    pub const TWEN: u8 = 1 << 2;
    pub const TWIE: u8 = 1 << 0;
}

/// Bus level failures
#[derive(Debug, uDebug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// start condition was not acknowledged by the hardware
    StartFailed,
    /// repeated start condition was not acknowledged by the hardware
    RepeatedStartFailed,
    /// no slave acknowledged SLA+W
    AddressNackWrite,
    /// no slave acknowledged SLA+R
    AddressNackRead,
    /// slave did not acknowledge a data byte we sent
    SlaveDataNack,
    /// acknowledge of a received byte did not go out
    MasterDataNack,
    /// TWINT or TWSTO did not settle within the poll budget
    Timeout,
    /// requested SCL frequency can't be reached with the prescaler
    InvalidBitRate,
    /// slave address doesn't fit in 7 bits
    InvalidAddress,
}

/// R/W bit appended to the slave address
#[derive(Debug, uDebug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Direction {
    Write = 0,
    Read = 1,
}

/// TWPS field of TWSR
#[derive(Debug, uDebug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Prescaler {
    Div1 = 0,
    Div4 = 1,
    Div16 = 2,
    Div64 = 3,
}

impl Prescaler {
    pub fn factor(self) -> u32 {
        match self {
            Prescaler::Div1 => 1,
            Prescaler::Div4 => 4,
            Prescaler::Div16 => 16,
            Prescaler::Div64 => 64,
        }
    }
}

/// Bus settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// cpu clock in Hz
    pub cpu_hz: u32,
    /// wanted SCL frequency in Hz
    pub scl_hz: u32,
    pub prescaler: Prescaler,
    /// how often TWINT/TWSTO is polled before giving up
    pub max_polls: u16,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            cpu_hz: 16_000_000,
            scl_hz: 100_000,
            prescaler: Prescaler::Div1,
            max_polls: 10_000,
        }
    }
}

impl Config {
    /// Fast mode, SCL at 400kHz
    pub fn fast_mode() -> Self {
        Config {
            scl_hz: 400_000,
            ..Config::default()
        }
    }

    /// TWBR value for the requested SCL frequency
    ///
    /// `SCL = CPU / (16 + 2 * TWBR * prescaler)`, `None` if the result
    /// doesn't fit the register.
    pub fn bit_rate_divisor(&self) -> Option<u8> {
        if self.scl_hz == 0 {
            return None;
        }
        let ratio = (self.cpu_hz / self.scl_hz).checked_sub(16)?;
        let divisor = ratio / (2 * self.prescaler.factor());
        if divisor > u8::max_value() as u32 {
            None
        } else {
            Some(divisor as u8)
        }
    }
}

/// Access to the TWI registers
///
/// Implemented by the board crate for the real peripheral.
pub trait TwiRegisters {
    /// program TWSR prescaler bits and TWBR
    fn write_bit_rate(&mut self, prescaler: u8, bit_rate: u8);
    fn write_control(&mut self, value: u8);
    fn read_control(&self) -> u8;
    /// raw TWSR including prescaler bits
    fn read_status(&self) -> u8;
    fn write_data(&mut self, value: u8);
    fn read_data(&self) -> u8;
}

/// Byte level master transactions
pub trait Transport {
    /// Issue a start (or repeated start if a transaction is open) and send
    /// the 7 bit `address` with the R/W bit
    fn start_transaction(&mut self, address: u8, direction: Direction) -> Result<(), Error>;

    /// Send one byte, slave must acknowledge
    fn write_byte(&mut self, data: u8) -> Result<(), Error>;

    /// Clock in one byte. With `ack` set the master acknowledges so the
    /// slave keeps sending, without it this is the last byte.
    fn read_byte(&mut self, ack: bool) -> Result<u8, Error>;

    /// Issue a stop condition and wait for the bus to be released
    fn stop_transaction(&mut self) -> Result<(), Error>;

    /// Status of the most recently completed bus phase, prescaler masked out
    fn last_status(&self) -> u8;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn start_transaction(&mut self, address: u8, direction: Direction) -> Result<(), Error> {
        (**self).start_transaction(address, direction)
    }

    fn write_byte(&mut self, data: u8) -> Result<(), Error> {
        (**self).write_byte(data)
    }

    fn read_byte(&mut self, ack: bool) -> Result<u8, Error> {
        (**self).read_byte(ack)
    }

    fn stop_transaction(&mut self) -> Result<(), Error> {
        (**self).stop_transaction()
    }

    fn last_status(&self) -> u8 {
        (**self).last_status()
    }
}

/// TWI peripheral in master mode
pub struct TwiMaster<R> {
    regs: R,
    max_polls: u16,
    open: bool,
}

impl<R: TwiRegisters> TwiMaster<R> {
    /// Wrap the registers without touching them, call
    /// [`configure`](Self::configure) before the first transaction
    pub fn new(regs: R, max_polls: u16) -> TwiMaster<R> {
        TwiMaster {
            regs,
            max_polls,
            open: false,
        }
    }

    /// Validate `config`, then program and enable the peripheral
    pub fn from_config(regs: R, config: &Config) -> Result<TwiMaster<R>, Error> {
        let divisor = config.bit_rate_divisor().ok_or(Error::InvalidBitRate)?;
        let mut master = TwiMaster::new(regs, config.max_polls);
        master.configure(config.prescaler, divisor);
        Ok(master)
    }

    /// Program the prescaler and bit rate register, then enable the
    /// peripheral
    pub fn configure(&mut self, prescaler: Prescaler, bit_rate_divisor: u8) {
        self.regs.write_bit_rate(prescaler as u8, bit_rate_divisor);
        self.regs.write_control(control::TWEN);
        self.open = false;
    }

    /// is a transaction open, i.e. the next start is a repeated start
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Give back the registers
    pub fn release(self) -> R {
        self.regs
    }

    // spin until (TWCR & mask != 0) == set, false if the budget runs out
    fn wait_for(&self, mask: u8, set: bool) -> bool {
        let mut polls = self.max_polls;
        while (self.regs.read_control() & mask != 0) != set {
            if polls == 0 {
                return false;
            }
            polls -= 1;
        }
        true
    }

    // start a bus phase and wait for TWINT, returns the masked status
    fn execute(&mut self, extra: u8) -> Result<u8, Error> {
        self.regs
            .write_control(control::TWINT | control::TWEN | extra);
        if !self.wait_for(control::TWINT, true) {
            return Err(self.abort(Error::Timeout));
        }
        Ok(self.last_status())
    }

    // release the bus, then hand back the error that caused it
    fn abort(&mut self, error: Error) -> Error {
        // a stop that times out as well doesn't change what went wrong first
        let _ = self.stop_transaction();
        error
    }
}

impl<R: TwiRegisters> Transport for TwiMaster<R> {
    fn start_transaction(&mut self, address: u8, direction: Direction) -> Result<(), Error> {
        if address > 0x7F {
            // nothing goes on the bus, an open transaction is still released
            return Err(if self.open {
                self.abort(Error::InvalidAddress)
            } else {
                Error::InvalidAddress
            });
        }
        let (expected, failure) = if self.open {
            (status::REPEATED_START, Error::RepeatedStartFailed)
        } else {
            (status::START, Error::StartFailed)
        };
        if self.execute(control::TWSTA)? != expected {
            return Err(self.abort(failure));
        }
        self.open = true;

        self.regs.write_data((address << 1) | direction as u8);
        let (expected, failure) = match direction {
            Direction::Write => (status::SLA_W_ACK, Error::AddressNackWrite),
            Direction::Read => (status::SLA_R_ACK, Error::AddressNackRead),
        };
        if self.execute(0)? != expected {
            return Err(self.abort(failure));
        }
        Ok(())
    }

    fn write_byte(&mut self, data: u8) -> Result<(), Error> {
        self.regs.write_data(data);
        if self.execute(0)? != status::DATA_W_ACK {
            return Err(self.abort(Error::SlaveDataNack));
        }
        Ok(())
    }

    fn read_byte(&mut self, ack: bool) -> Result<u8, Error> {
        let observed = self.execute(if ack { control::TWEA } else { 0 })?;
        if ack && observed != status::DATA_R_ACK {
            return Err(self.abort(Error::MasterDataNack));
        }
        Ok(self.regs.read_data())
    }

    fn stop_transaction(&mut self) -> Result<(), Error> {
        self.regs
            .write_control(control::TWINT | control::TWSTO | control::TWEN);
        self.open = false;
        // TWSTO clears itself once the stop is on the bus
        if self.wait_for(control::TWSTO, false) {
            Ok(())
        } else {
            Err(Error::Timeout)
        }
    }

    fn last_status(&self) -> u8 {
        self.regs.read_status() & STATUS_MASK
    }
}
