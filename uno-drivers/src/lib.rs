//! Peripheral drivers for ATmega328P boards
//!
//! The drivers talk to hardware through small register traits, so the
//! crate builds for the host too and the bus sequencing can be tested
//! without a board.  The `uno-board` crate binds the traits to the real
//! peripherals.
//!
//! * [`twi`] - master mode driver for the two-wire (I2C) interface
//! * [`bmp280`] - Bosch BMP280 pressure/temperature sensor on top of [`twi`]
//! * [`ring_buffer`] - receive buffer filled from the USART RX interrupt
//! * [`timer`] - millisecond tick bookkeeping for Timer0

#![cfg_attr(not(test), no_std)]

pub mod bmp280;
pub mod ring_buffer;
pub mod timer;
pub mod twi;
