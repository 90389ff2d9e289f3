//! Factory calibration and the compensation formulas
//!
//! The integer pipeline follows the datasheet reference code (section
//! 8.2): 32 bit arithmetic for temperature, 64 bit for pressure, same
//! shifts and operand widths, so results match the certified algorithm
//! down to the last bit.  Wrapping operations stand in for the reference
//! code's unchecked arithmetic, meaningless coefficients give meaningless
//! numbers but never a panic.

use ufmt::derive::uDebug;

use super::registers::{CALIB_PRESSURE_LEN, CALIB_TEMPERATURE_LEN};

/// dig_T1..dig_T3 and dig_P1..dig_P9
#[derive(Debug, uDebug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Calibration {
    pub t1: u16,
    pub t2: i16,
    pub t3: i16,
    pub p1: u16,
    pub p2: i16,
    pub p3: i16,
    pub p4: i16,
    pub p5: i16,
    pub p6: i16,
    pub p7: i16,
    pub p8: i16,
    pub p9: i16,
}

impl Calibration {
    /// Assemble the coefficients from the two little-endian register
    /// blocks, 0x88..0x8D and 0x8E..0x9F
    pub fn from_bytes(
        temperature: &[u8; CALIB_TEMPERATURE_LEN],
        pressure: &[u8; CALIB_PRESSURE_LEN],
    ) -> Calibration {
        let t = |i: usize| [temperature[i], temperature[i + 1]];
        let p = |i: usize| [pressure[i], pressure[i + 1]];
        Calibration {
            t1: u16::from_le_bytes(t(0)),
            t2: i16::from_le_bytes(t(2)),
            t3: i16::from_le_bytes(t(4)),
            p1: u16::from_le_bytes(p(0)),
            p2: i16::from_le_bytes(p(2)),
            p3: i16::from_le_bytes(p(4)),
            p4: i16::from_le_bytes(p(6)),
            p5: i16::from_le_bytes(p(8)),
            p6: i16::from_le_bytes(p(10)),
            p7: i16::from_le_bytes(p(12)),
            p8: i16::from_le_bytes(p(14)),
            p9: i16::from_le_bytes(p(16)),
        }
    }
}

/// Compensated temperature
#[derive(Debug, uDebug, Clone, Copy, PartialEq, Eq)]
pub struct Temperature {
    /// hundredths of a degree Celsius, 5123 is 51.23C
    pub centi_celsius: i32,
    /// t_fine, input to the pressure formula
    pub fine: i32,
}

impl Temperature {
    pub fn celsius(&self) -> f32 {
        self.centi_celsius as f32 / 100.0
    }
}

/// Pressure and the temperature of the same sample
#[derive(Debug, uDebug, Clone, Copy, PartialEq, Eq)]
pub struct Measurement {
    pub temperature: Temperature,
    /// Pa in Q24.8, 24674867 is 96386.2 Pa
    pub pressure: u32,
}

impl Measurement {
    pub fn celsius(&self) -> f32 {
        self.temperature.celsius()
    }

    pub fn pascals(&self) -> f32 {
        pressure_pascals(self.pressure)
    }
}

/// Q24.8 pressure to Pa
pub fn pressure_pascals(q24_8: u32) -> f32 {
    q24_8 as f32 / 256.0
}

/// 20 bit ADC value from the msb, lsb and xlsb registers
pub fn raw_sample(msb: u8, lsb: u8, xlsb: u8) -> i32 {
    ((msb as i32) << 12) | ((lsb as i32) << 4) | ((xlsb as i32) >> 4)
}

/// Temperature from a raw 20 bit ADC value
pub fn compensate_temperature(adc_t: i32, cal: &Calibration) -> Temperature {
    let t1 = cal.t1 as i32;
    let t2 = cal.t2 as i32;
    let t3 = cal.t3 as i32;

    let var1 = ((adc_t >> 3).wrapping_sub(t1 << 1)).wrapping_mul(t2) >> 11;
    let delta = (adc_t >> 4).wrapping_sub(t1);
    let var2 = ((delta.wrapping_mul(delta) >> 12).wrapping_mul(t3)) >> 14;
    let fine = var1.wrapping_add(var2);

    Temperature {
        centi_celsius: fine.wrapping_mul(5).wrapping_add(128) >> 8,
        fine,
    }
}

/// Pressure in Pa as Q24.8 from a raw 20 bit ADC value and t_fine
///
/// Returns 0 when the calibration makes the divisor vanish.
pub fn compensate_pressure(adc_p: i32, fine: i32, cal: &Calibration) -> u32 {
    let mut var1 = fine as i64 - 128_000;
    let mut var2 = var1.wrapping_mul(var1).wrapping_mul(cal.p6 as i64);
    var2 = var2.wrapping_add(var1.wrapping_mul(cal.p5 as i64) << 17);
    var2 = var2.wrapping_add((cal.p4 as i64) << 35);
    var1 = (var1.wrapping_mul(var1).wrapping_mul(cal.p3 as i64) >> 8)
        .wrapping_add(var1.wrapping_mul(cal.p2 as i64) << 12);
    var1 = ((1i64 << 47).wrapping_add(var1)).wrapping_mul(cal.p1 as i64) >> 33;

    if var1 == 0 {
        return 0;
    }

    let mut p = 1_048_576 - adc_p as i64;
    p = ((p << 31).wrapping_sub(var2)).wrapping_mul(3125).wrapping_div(var1);
    var1 = ((cal.p9 as i64).wrapping_mul(p >> 13).wrapping_mul(p >> 13)) >> 25;
    var2 = (cal.p8 as i64).wrapping_mul(p) >> 19;
    p = ((p.wrapping_add(var1).wrapping_add(var2)) >> 8).wrapping_add((cal.p7 as i64) << 4);
    p as u32
}

// worked example from the datasheet, section 8.1
#[cfg(test)]
pub(crate) const DATASHEET: Calibration = Calibration {
    t1: 27504,
    t2: 26435,
    t3: -1000,
    p1: 36477,
    p2: -10685,
    p3: 3024,
    p4: 2855,
    p5: 140,
    p6: -7,
    p7: 15500,
    p8: -14600,
    p9: 6000,
};
