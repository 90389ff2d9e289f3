//! BMP280 register map (Bosch BST-BMP280-DS001, section 4.3)

/// Slave address with SDO tied to GND
pub const DEFAULT_ADDRESS: u8 = 0x76;
/// Slave address with SDO tied to VDDIO
pub const SECONDARY_ADDRESS: u8 = 0x77;

/// Value of the chip id register for a BMP280
pub const CHIP_ID: u8 = 0x58;
/// Writing this to the reset register runs the power-on-reset procedure
pub const RESET_VALUE: u8 = 0xB6;

pub const CALIB_START: u8 = 0x88;
/// dig_T1..dig_T3, 0x88..0x8D
pub const CALIB_TEMPERATURE: u8 = 0x88;
pub const CALIB_TEMPERATURE_LEN: usize = 6;
/// dig_P1..dig_P9, 0x8E..0x9F
pub const CALIB_PRESSURE: u8 = 0x8E;
pub const CALIB_PRESSURE_LEN: usize = 18;

pub const CHIP_ID_REG: u8 = 0xD0;
pub const RESET: u8 = 0xE0;
/// bit 3 measuring, bit 0 im_update
pub const STATUS: u8 = 0xF3;
pub const CTRL_MEAS: u8 = 0xF4;
pub const CONFIG: u8 = 0xF5;

pub const PRESS_MSB: u8 = 0xF7;
pub const PRESS_LSB: u8 = 0xF8;
pub const PRESS_XLSB: u8 = 0xF9;
pub const TEMP_MSB: u8 = 0xFA;
pub const TEMP_LSB: u8 = 0xFB;
pub const TEMP_XLSB: u8 = 0xFC;

/// mode[1:0] of ctrl_meas
pub const MODE_MASK: u8 = 0x03;
pub const STATUS_MEASURING: u8 = 1 << 3;
pub const STATUS_IM_UPDATE: u8 = 1 << 0;
