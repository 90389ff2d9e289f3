//! Board Support Crate for Arduino Uno class boards (ATmega328P at 16MHz)
//!
//! Re-exports the HAL with the pins named as printed on the board, and
//! binds the register traits of [`uno_drivers`] to the real peripherals.
//!
//! A rough skeleton for an application:
//!
//! ```no_run
//! #![no_std]
//! #![no_main]
//!
//! extern crate panic_halt;
//!
//! use uno_board::prelude::*;
//!
//! #[uno_board::entry]
//! fn main() -> ! {
//!     let dp = uno_board::Peripherals::take().unwrap();
//!     let mut pins = uno_board::Pins::new(dp.PORTB, dp.PORTC, dp.PORTD);
//!
//!     let mut bus = uno_board::twi::master(
//!         dp.TWI,
//!         pins.a4,
//!         pins.a5,
//!         &mut pins.ddr,
//!         &uno_drivers::twi::Config::default(),
//!     ).unwrap();
//!
//!     unimplemented!()
//! }
//! ```

#![no_std]

// Expose hal & pac crates
pub use atmega328p_hal as hal;
pub use crate::hal::pac;

/// See [`avr_device::entry`](https://docs.rs/avr-device/latest/avr_device/attr.entry.html).
pub use crate::hal::entry;

pub use crate::pac::Peripherals;

mod pins;
pub use crate::pins::*;

pub mod prelude {
    pub use crate::hal::prelude::*;
    pub use crate::hal::usart::BaudrateArduinoExt as _;
}

/// Baudrate of the debug/console port
pub const BAUD_RATE: u32 = 57600;

#[cfg(debug_assertions)]
#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    use prelude::*;

    let mut serial: Serial<hal::port::mode::Floating> =
        unsafe { core::mem::MaybeUninit::uninit().assume_init() };

    ufmt::uwriteln!(&mut serial, "Firmware panic!\r").void_unwrap();

    if let Some(loc) = info.location() {
        ufmt::uwriteln!(
            &mut serial,
            "  At {}:{}:{}\r",
            loc.file(),
            loc.line(),
            loc.column(),
        )
        .void_unwrap();
    }

    loop {}
}

/// Busy-Delay
///
/// **Note**: For just delaying, [`delay_ms()`] or [`delay_us()`] is
/// probably the better choice.
pub type Delay = hal::delay::Delay<hal::clock::MHz16>;

/// Wait (busy spin) for `ms` milliseconds
pub fn delay_ms(ms: u16) {
    use prelude::*;

    Delay::new().delay_ms(ms)
}

/// Wait (busy spin) for `us` microseconds
pub fn delay_us(us: u16) {
    use prelude::*;

    Delay::new().delay_us(us)
}

/// Serial (UART) interface on pins `D0` (RX) and `D1` (TX)
///
/// ```no_run
/// let mut serial = uno_board::Serial::new(
///     dp.USART0,
///     pins.d0,
///     pins.d1.into_output(&mut pins.ddr),
///     uno_board::BAUD_RATE.into_baudrate(),
/// );
///
/// ufmt::uwriteln!(&mut serial, "Hello from Uno!\r").void_unwrap();
/// ```
pub type Serial<IMODE> = hal::usart::Usart0<hal::clock::MHz16, IMODE>;

/// Interrupt driven reception on USART0
///
/// The HAL serial keeps the transmitter, received bytes are taken out of
/// UDR0 in the `USART_RX` interrupt handler.
pub mod serial_rx {
    use crate::pac;

    /// Enable the receive complete interrupt
    pub fn listen() {
        // only RXCIE0 changes, the HAL owns the rest of UCSR0B
        unsafe {
            (*pac::USART0::ptr())
                .ucsr0b
                .modify(|_, w| w.rxcie0().set_bit());
        }
    }

    /// Take the received byte, clears the interrupt condition
    pub fn read_byte() -> u8 {
        unsafe { (*pac::USART0::ptr()).udr0.read().bits() }
    }
}

/// Two-wire interface on `A4` (SDA) and `A5` (SCL)
pub mod twi {
    use crate::hal::port::{mode, portc};
    use crate::pac;
    use uno_drivers::twi::{Config, Error, TwiMaster, TwiRegisters};

    pub type Sda = portc::PC4<mode::Input<mode::PullUp>>;
    pub type Scl = portc::PC5<mode::Input<mode::PullUp>>;

    /// The TWI peripheral together with its pins
    ///
    /// The internal pull-ups are enabled, they are weak, boards without
    /// external resistors may need them at 400kHz.
    pub struct Twi {
        p: pac::TWI,
        sda: Sda,
        scl: Scl,
    }

    impl Twi {
        pub fn new(p: pac::TWI, sda: Sda, scl: Scl) -> Twi {
            Twi { p, sda, scl }
        }

        /// Turn the peripheral off and give back the parts
        pub fn release(self) -> (pac::TWI, Sda, Scl) {
            self.p.twcr.reset();
            (self.p, self.sda, self.scl)
        }
    }

    impl TwiRegisters for Twi {
        fn write_bit_rate(&mut self, prescaler: u8, bit_rate: u8) {
            self.p.twsr.write(|w| unsafe { w.bits(prescaler & 0x03) });
            self.p.twbr.write(|w| unsafe { w.bits(bit_rate) });
        }

        fn write_control(&mut self, value: u8) {
            self.p.twcr.write(|w| unsafe { w.bits(value) });
        }

        fn read_control(&self) -> u8 {
            self.p.twcr.read().bits()
        }

        fn read_status(&self) -> u8 {
            self.p.twsr.read().bits()
        }

        fn write_data(&mut self, value: u8) {
            self.p.twdr.write(|w| unsafe { w.bits(value) });
        }

        fn read_data(&self) -> u8 {
            self.p.twdr.read().bits()
        }
    }

    /// Bus master on the board pins, clocked as `config` asks
    pub fn master<MODE>(
        p: pac::TWI,
        sda: portc::PC4<MODE>,
        scl: portc::PC5<MODE>,
        ddr: &mut crate::DDR,
        config: &Config,
    ) -> Result<TwiMaster<Twi>, Error> {
        let sda = sda.into_pull_up_input(ddr);
        let scl = scl.into_pull_up_input(ddr);
        TwiMaster::from_config(Twi::new(p, sda, scl), config)
    }
}

/// Timer0 as the millisecond tick source
pub mod timer {
    use crate::pac;
    use uno_drivers::timer::{compare_value, MILLIS_PRESCALER};

    pub const CPU_HZ: u32 = 16_000_000;

    /// CTC mode with a compare match A interrupt every millisecond
    ///
    /// The handler for `TIMER0_COMPA` has to be provided by the firmware.
    pub fn start_millis(tc0: &pac::TC0) {
        // 249 at 16MHz
        let top = compare_value(CPU_HZ, MILLIS_PRESCALER, 1000).unwrap_or(u8::max_value());
        tc0.tccr0a.write(|w| w.wgm0().ctc());
        tc0.ocr0a.write(|w| unsafe { w.bits(top) });
        tc0.tcnt0.write(|w| unsafe { w.bits(0) });
        tc0.tccr0b.write(|w| w.cs0().prescale_64());
        tc0.timsk0.write(|w| w.ocie0a().set_bit());
    }

    /// Stop the tick, the counter keeps its value
    pub fn stop_millis(tc0: &pac::TC0) {
        tc0.timsk0.write(|w| w.ocie0a().clear_bit());
        tc0.tccr0b.write(|w| w.cs0().no_clock());
    }
}
