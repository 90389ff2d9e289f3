//! firmware for an Uno with a BMP280 on the two-wire bus
//! samples temperature and pressure once a second and prints them on the
//! serial port, single byte commands are read from the same port
//!
//! commands:
//! * `r` reset the sensor and bring it up again
//! * `i` print the chip id
//! * `s` print the status register
//! * `f` take one forced measurement

#![no_std]
#![no_main]
#![feature(abi_avr_interrupt)]

// debug builds get the panic handler of the board crate
#[cfg(not(debug_assertions))]
extern crate panic_halt;

use avr_device::interrupt;
use core::cell::RefCell;
use nb;

use uno_board::hal;
use uno_board::prelude::*;
use uno_board::serial_rx;
use hal::port::mode::Floating;

use uno_drivers::bmp280::{self, Bmp280, Calibration};
use uno_drivers::ring_buffer::RingBuffer;
use uno_drivers::timer::{elapsed, Interval, MillisCounter};
use uno_drivers::twi;

//==========================================================

mod utility;
use utility::*;

//==========================================================
// Settings

#[cfg(feature = "secondary-address")]
const SENSOR_ADDRESS: u8 = bmp280::SECONDARY_ADDRESS;
#[cfg(not(feature = "secondary-address"))]
const SENSOR_ADDRESS: u8 = bmp280::DEFAULT_ADDRESS;

/// time between two printed samples
const SAMPLE_PERIOD_MS: u32 = 1000;
/// pause before bringing the sensor up again after an error
const RETRY_MS: u32 = 5000;
/// NVM copy after a soft reset takes 2ms
const STARTUP_MS: u32 = 2;

fn bus_config() -> twi::Config {
    if cfg!(feature = "fast-mode") {
        twi::Config::fast_mode()
    } else {
        twi::Config::default()
    }
}

//==========================================================
// Shared with interrupt handlers

static RX_BUFFER: interrupt::Mutex<RefCell<RingBuffer>> =
    interrupt::Mutex::new(RefCell::new(RingBuffer::new()));

static MILLIS: interrupt::Mutex<RefCell<MillisCounter>> =
    interrupt::Mutex::new(RefCell::new(MillisCounter::new()));

fn millis() -> u32 {
    interrupt::free(|cs| MILLIS.borrow(cs).borrow().now())
}

fn next_command() -> Option<u8> {
    interrupt::free(|cs| RX_BUFFER.borrow(cs).borrow_mut().pop())
}

//==========================================================

#[derive(Copy, Clone, PartialEq)]
enum SensorStateMachine {
    Start,
    ResetEntry,
    Reset,
    Probe,
    Calibrate,
    Configure,
    SampleEntry,
    Wait,
    Sample,
    ForceEntry,
    Force,
    FaultEntry,
    Fault,
}

fn change_state(new_state: SensorStateMachine,
                state_memo: (SensorStateMachine, SensorStateMachine))
                -> (SensorStateMachine, SensorStateMachine) {
    if let SensorStateMachine::Start
        | SensorStateMachine::Reset
        | SensorStateMachine::Wait
        | SensorStateMachine::Force
        | SensorStateMachine::Fault = state_memo.0 {
            (new_state, state_memo.0)
        } else {
            (new_state, state_memo.1)
        }
}

#[cfg(debug_assertions)]
impl SensorStateMachine {
    fn send(&self, serial: &mut uno_board::Serial<Floating>) {
        let s = match self {
            SensorStateMachine::Start => { r"Start" }
            SensorStateMachine::ResetEntry => { r"ResetEntry" }
            SensorStateMachine::Reset => { r"Reset" }
            SensorStateMachine::Probe => { r"Probe" }
            SensorStateMachine::Calibrate => { r"Calibrate" }
            SensorStateMachine::Configure => { r"Configure" }
            SensorStateMachine::SampleEntry => { r"SampleEntry" }
            SensorStateMachine::Wait => { r"Wait" }
            SensorStateMachine::Sample => { r"Sample" }
            SensorStateMachine::ForceEntry => { r"ForceEntry" }
            SensorStateMachine::Force => { r"Force" }
            SensorStateMachine::FaultEntry => { r"FaultEntry" }
            SensorStateMachine::Fault => { r"Fault" }
        };
        ufmt::uwrite!(serial, "{}", s).void_unwrap();
    }
}

#[cfg(debug_assertions)]
fn send_tuple(state: (SensorStateMachine, SensorStateMachine),
              serial: &mut uno_board::Serial<Floating>) {
    ufmt::uwrite!(serial, "Current:").void_unwrap();
    state.0.send(serial);
    ufmt::uwrite!(serial, " Previous:").void_unwrap();
    state.1.send(serial);
    ufmt::uwriteln!(serial, "\r").void_unwrap();
}

fn send_error(serial: &mut uno_board::Serial<Floating>, e: &bmp280::Error) {
    ufmt::uwriteln!(serial, "error: {:?}\r", e).void_unwrap();
}

//==========================================================

#[hal::entry]
fn main() -> ! {
    let dp = uno_board::Peripherals::take().unwrap();

    // turn off unused modules
    let cpu = dp.CPU;
    cpu.prr.write(|w| {
        w.prtim1().set_bit();
        w.prtim2().set_bit();
        w.prspi().set_bit();
        w.pradc().set_bit()
    });
    // turn off analog comparator
    let ac = dp.AC;
    ac.acsr.write(|w| w.acd().set_bit());

    let mut pins = uno_board::Pins::new(dp.PORTB, dp.PORTC, dp.PORTD);

    // LED on while sampling
    let mut led = pins.d13.into_output(&mut pins.ddr);

    let mut serial = uno_board::Serial::<Floating>::new(
        dp.USART0,
        pins.d0,
        pins.d1.into_output(&mut pins.ddr),
        uno_board::BAUD_RATE.into_baudrate(),
    );
    serial_rx::listen();

    // Timer0, 1ms compare match interrupt
    let timer0 = dp.TC0;
    uno_board::timer::start_millis(&timer0);

    let bus = match uno_board::twi::master(dp.TWI, pins.a4, pins.a5, &mut pins.ddr, &bus_config()) {
        Ok(bus) => bus,
        Err(e) => {
            ufmt::uwriteln!(&mut serial, "twi: {:?}\r", e).void_unwrap();
            loop {}
        }
    };
    let mut sensor = Bmp280::new(bus, SENSOR_ADDRESS);
    let mut calibration = Calibration::default();
    let mut sample_interval = Interval::new(SAMPLE_PERIOD_MS, 0);
    // entry time of the timed states
    let mut mark: u32 = 0;
    let mut fault: Option<bmp280::Error> = None;

    // start value of FSM
    let mut machine_state = (SensorStateMachine::Start, SensorStateMachine::Start);
    let mut prev_state = machine_state;

    // enable interrupts
    unsafe {
        interrupt::enable();
    }

    ufmt::uwriteln!(&mut serial, "\r\nWeatherStation Start\r").void_unwrap();

    #[cfg(debug_assertions)]
    ufmt::uwrite!(serial, "twbr:").void_unwrap();
    #[cfg(debug_assertions)]
    send_reg(&mut serial, 0xB8);
    #[cfg(debug_assertions)]
    ufmt::uwrite!(serial, "prr:").void_unwrap();
    #[cfg(debug_assertions)]
    send_reg(&mut serial, 0x64);

    loop {
        // FSM
        machine_state = match machine_state.0 {
            SensorStateMachine::Start => {
                led.set_low().void_unwrap();
                fault = None;
                change_state(SensorStateMachine::ResetEntry, machine_state)
            }
            SensorStateMachine::ResetEntry => {
                match sensor.reset() {
                    Ok(()) => {
                        mark = millis();
                        change_state(SensorStateMachine::Reset, machine_state)
                    }
                    Err(e) => {
                        fault = Some(e);
                        change_state(SensorStateMachine::FaultEntry, machine_state)
                    }
                }
            }
            SensorStateMachine::Reset => {
                if elapsed(mark, millis()) <= STARTUP_MS {
                    machine_state
                } else {
                    match sensor.status() {
                        Ok(status) if status.im_update => machine_state,
                        Ok(_) => change_state(SensorStateMachine::Probe, machine_state),
                        Err(e) => {
                            fault = Some(e);
                            change_state(SensorStateMachine::FaultEntry, machine_state)
                        }
                    }
                }
            }
            SensorStateMachine::Probe => {
                match sensor.verify_device_id() {
                    Ok(()) => change_state(SensorStateMachine::Calibrate, machine_state),
                    Err(e) => {
                        fault = Some(e);
                        change_state(SensorStateMachine::FaultEntry, machine_state)
                    }
                }
            }
            SensorStateMachine::Calibrate => {
                match sensor.load_calibration() {
                    Ok(c) => {
                        calibration = c;
                        #[cfg(debug_assertions)]
                        ufmt::uwriteln!(&mut serial, "{:?}\r", calibration).void_unwrap();
                        change_state(SensorStateMachine::Configure, machine_state)
                    }
                    Err(e) => {
                        fault = Some(e);
                        change_state(SensorStateMachine::FaultEntry, machine_state)
                    }
                }
            }
            SensorStateMachine::Configure => {
                match sensor.apply_default_configuration() {
                    Ok(()) => change_state(SensorStateMachine::SampleEntry, machine_state),
                    Err(e) => {
                        fault = Some(e);
                        change_state(SensorStateMachine::FaultEntry, machine_state)
                    }
                }
            }
            SensorStateMachine::SampleEntry => {
                led.set_high().void_unwrap();
                sample_interval.reset(millis());
                change_state(SensorStateMachine::Wait, machine_state)
            }
            SensorStateMachine::Wait => {
                if sample_interval.poll(millis()) {
                    change_state(SensorStateMachine::Sample, machine_state)
                } else {
                    machine_state
                }
            }
            SensorStateMachine::Sample => {
                match sensor.read_measurement(&calibration) {
                    Ok(m) => {
                        send_measurement(&mut serial, &m);
                        change_state(SensorStateMachine::Wait, machine_state)
                    }
                    Err(e) => {
                        fault = Some(e);
                        change_state(SensorStateMachine::FaultEntry, machine_state)
                    }
                }
            }
            SensorStateMachine::ForceEntry => {
                match sensor.force_measurement() {
                    Ok(()) => change_state(SensorStateMachine::Force, machine_state),
                    Err(e) => {
                        fault = Some(e);
                        change_state(SensorStateMachine::FaultEntry, machine_state)
                    }
                }
            }
            SensorStateMachine::Force => {
                match sensor.status() {
                    Ok(status) if status.measuring => machine_state,
                    Ok(_) => match sensor.read_measurement(&calibration) {
                        Ok(m) => {
                            send_measurement(&mut serial, &m);
                            // back to normal mode
                            change_state(SensorStateMachine::Configure, machine_state)
                        }
                        Err(e) => {
                            fault = Some(e);
                            change_state(SensorStateMachine::FaultEntry, machine_state)
                        }
                    },
                    Err(e) => {
                        fault = Some(e);
                        change_state(SensorStateMachine::FaultEntry, machine_state)
                    }
                }
            }
            SensorStateMachine::FaultEntry => {
                led.set_low().void_unwrap();
                if let Some(ref e) = fault {
                    send_error(&mut serial, e);
                }
                nb::block!(serial.flush()).void_unwrap();
                mark = millis();
                change_state(SensorStateMachine::Fault, machine_state)
            }
            SensorStateMachine::Fault => {
                if elapsed(mark, millis()) >= RETRY_MS {
                    change_state(SensorStateMachine::Start, machine_state)
                } else {
                    machine_state
                }
            }
        };

        // commands from the serial port
        match next_command() {
            Some(b'r') => {
                machine_state = change_state(SensorStateMachine::Start, machine_state);
            }
            Some(b'i') => match sensor.read_device_id() {
                Ok(id) => {
                    ufmt::uwrite!(&mut serial, "id:").void_unwrap();
                    send_hex_byte(&mut serial, id);
                    ufmt::uwriteln!(&mut serial, "\r").void_unwrap();
                }
                Err(e) => send_error(&mut serial, &e),
            },
            Some(b's') => match sensor.status() {
                Ok(status) => ufmt::uwriteln!(&mut serial, "{:?}\r", status).void_unwrap(),
                Err(e) => send_error(&mut serial, &e),
            },
            Some(b'f') => {
                if machine_state.0 == SensorStateMachine::Wait && sensor.is_ready() {
                    machine_state = change_state(SensorStateMachine::ForceEntry, machine_state);
                } else {
                    ufmt::uwriteln!(&mut serial, "busy\r").void_unwrap();
                }
            }
            _ => (),
        }

        // check and see if machine state has changed, if so, send it via serial port
        if prev_state.0 != machine_state.0 || prev_state.1 != machine_state.1 {
            #[cfg(debug_assertions)]
            send_tuple(machine_state, &mut serial);
            prev_state = machine_state;
        }
    }
}

//==========================================================

// interrupt handler for USART0 receive complete
#[interrupt(atmega328p)]
fn USART_RX() {
    // reading UDR0 clears the interrupt condition
    let byte = serial_rx::read_byte();
    interrupt::free(move |cs| {
        RX_BUFFER.borrow(cs).borrow_mut().push(byte);
    });
}

//==========================================================

// interrupt handler for Timer0 compare match A, every 1ms
#[interrupt(atmega328p)]
fn TIMER0_COMPA() {
    interrupt::free(|cs| {
        MILLIS.borrow(cs).borrow_mut().tick();
    });
}
