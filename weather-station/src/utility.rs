//! output helpers for the serial port
//! ufmt has no float formatting, values are printed from their fixed
//! point forms

use uno_board::hal::port::mode::Floating;
use uno_board::prelude::*;
use uno_drivers::bmp280::Measurement;

const HEX_DIGITS: &[u8; 16] = b"0123456789ABCDEF";

pub fn send_hex_byte(serial: &mut uno_board::Serial<Floating>, b: u8) {
    let hi = HEX_DIGITS[(b >> 4) as usize] as char;
    let lo = HEX_DIGITS[(b & 0x0F) as usize] as char;
    ufmt::uwrite!(serial, "{}{}", hi, lo).void_unwrap();
}

/// dump an I/O register by its data space address
#[cfg(debug_assertions)]
pub fn send_reg(serial: &mut uno_board::Serial<Floating>, addr: u8) {
    let ptr = addr as *const u8;
    let b = unsafe { core::ptr::read_volatile(ptr) };
    send_hex_byte(serial, b);
    ufmt::uwriteln!(serial, "\r").void_unwrap();
}

/// hundredths as a decimal, -5 prints as -0.05
pub fn send_centi(serial: &mut uno_board::Serial<Floating>, value: i32) {
    if value < 0 {
        ufmt::uwrite!(serial, "-").void_unwrap();
    }
    let magnitude = (value as i64).abs() as u32;
    send_fraction(serial, magnitude / 100, (magnitude % 100) as u8);
}

/// Q24.8 as a decimal with two places, truncated
pub fn send_q24_8(serial: &mut uno_board::Serial<Floating>, value: u32) {
    let hundredths = ((value & 0xFF) * 100) >> 8;
    send_fraction(serial, value >> 8, hundredths as u8);
}

fn send_fraction(serial: &mut uno_board::Serial<Floating>, whole: u32, hundredths: u8) {
    ufmt::uwrite!(serial, "{}.", whole).void_unwrap();
    if hundredths < 10 {
        ufmt::uwrite!(serial, "0").void_unwrap();
    }
    ufmt::uwrite!(serial, "{}", hundredths).void_unwrap();
}

/// `T=25.08C P=100653.25Pa`
pub fn send_measurement(serial: &mut uno_board::Serial<Floating>, m: &Measurement) {
    ufmt::uwrite!(serial, "T=").void_unwrap();
    send_centi(serial, m.temperature.centi_celsius);
    ufmt::uwrite!(serial, "C P=").void_unwrap();
    send_q24_8(serial, m.pressure);
    ufmt::uwriteln!(serial, "Pa\r").void_unwrap();
}
