//! Measurement settings, encoded into ctrl_meas (0xF4) and config (0xF5)

use ufmt::derive::uDebug;

/// Power mode, ctrl_meas bits 1:0
#[derive(Debug, uDebug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Mode {
    Sleep = 0x00,
    /// one measurement, then back to sleep
    Forced = 0x01,
    /// measure, stand by for t_sb, repeat
    Normal = 0x03,
}

impl Mode {
    fn from_bits(bits: u8) -> Mode {
        match bits & 0x03 {
            0x00 => Mode::Sleep,
            0x03 => Mode::Normal,
            // 01 and 10 both select forced mode
            _ => Mode::Forced,
        }
    }
}

/// Oversampling of one measurement channel
///
/// The same 3 bit code is used for pressure (osrs_p, ctrl_meas bits 4:2)
/// and temperature (osrs_t, ctrl_meas bits 7:5).  `Skipped` turns the
/// channel off, its output register then holds 0x80000.
#[derive(Debug, uDebug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Oversampling {
    Skipped = 0,
    /// 16 bit, 2.62 Pa / 0.0050 C
    X1 = 1,
    X2 = 2,
    X4 = 3,
    X8 = 4,
    /// 20 bit, 0.16 Pa / 0.0003 C
    X16 = 5,
}

impl Oversampling {
    pub fn pressure_bits(self) -> u8 {
        (self as u8) << 2
    }

    pub fn temperature_bits(self) -> u8 {
        (self as u8) << 5
    }

    fn from_code(code: u8) -> Oversampling {
        match code & 0x07 {
            0 => Oversampling::Skipped,
            1 => Oversampling::X1,
            2 => Oversampling::X2,
            3 => Oversampling::X4,
            4 => Oversampling::X8,
            // 101, 110 and 111 are all x16
            _ => Oversampling::X16,
        }
    }
}

/// IIR filter coefficient, config bits 4:2
#[derive(Debug, uDebug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Filter {
    Off = 0x00,
    /// lowest noise reduction
    X2 = 0x04,
    X4 = 0x08,
    X8 = 0x0C,
    /// highest noise reduction
    X16 = 0x10,
}

impl Filter {
    fn from_bits(bits: u8) -> Filter {
        match bits & 0x1C {
            0x00 => Filter::Off,
            0x04 => Filter::X2,
            0x08 => Filter::X4,
            0x0C => Filter::X8,
            _ => Filter::X16,
        }
    }
}

/// Inactive time between measurements in normal mode, config bits 7:5
#[derive(Debug, uDebug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Standby {
    Ms0_5 = 0x00,
    Ms62_5 = 0x20,
    Ms125 = 0x40,
    Ms250 = 0x60,
    Ms500 = 0x80,
    Ms1000 = 0xA0,
    Ms2000 = 0xC0,
    Ms4000 = 0xE0,
}

impl Standby {
    fn from_bits(bits: u8) -> Standby {
        match bits & 0xE0 {
            0x00 => Standby::Ms0_5,
            0x20 => Standby::Ms62_5,
            0x40 => Standby::Ms125,
            0x60 => Standby::Ms250,
            0x80 => Standby::Ms500,
            0xA0 => Standby::Ms1000,
            0xC0 => Standby::Ms2000,
            _ => Standby::Ms4000,
        }
    }
}

/// Sensor settings
#[derive(Debug, uDebug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    pub mode: Mode,
    pub pressure_oversampling: Oversampling,
    pub temperature_oversampling: Oversampling,
    pub filter: Filter,
    pub standby: Standby,
}

impl Default for Config {
    /// Normal mode, x16 pressure, x2 temperature, filter 2, 250ms standby
    fn default() -> Self {
        Config {
            mode: Mode::Normal,
            pressure_oversampling: Oversampling::X16,
            temperature_oversampling: Oversampling::X2,
            filter: Filter::X2,
            standby: Standby::Ms250,
        }
    }
}

impl Config {
    /// Value for the ctrl_meas register
    pub fn ctrl_meas(&self) -> u8 {
        self.temperature_oversampling.temperature_bits()
            | self.pressure_oversampling.pressure_bits()
            | self.mode as u8
    }

    /// Value for the config register, spi3w_en stays cleared
    pub fn config(&self) -> u8 {
        self.standby as u8 | self.filter as u8
    }

    /// Decode register contents read back from the device
    pub fn from_registers(ctrl_meas: u8, config: u8) -> Config {
        Config {
            mode: Mode::from_bits(ctrl_meas),
            pressure_oversampling: Oversampling::from_code(ctrl_meas >> 2),
            temperature_oversampling: Oversampling::from_code(ctrl_meas >> 5),
            filter: Filter::from_bits(config),
            standby: Standby::from_bits(config),
        }
    }
}
