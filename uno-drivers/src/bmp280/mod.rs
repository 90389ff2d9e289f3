//! Bosch BMP280 barometric pressure and temperature sensor over TWI
//!
//! Bring-up sequence:
//! 1. [`Bmp280::reset`] (optional), wait ~2ms for the NVM copy
//! 2. [`Bmp280::verify_device_id`]
//! 3. [`Bmp280::load_calibration`], keep the returned [`Calibration`]
//! 4. [`Bmp280::apply_configuration`]
//!
//! Measurements are refused with [`Error::NotReady`] until both the
//! configuration and the calibration have been done.  Every operation is
//! all or nothing: the first bus error aborts it and is returned, values
//! read up to that point are dropped.

pub mod calibration;
pub mod config;
pub mod registers;

use ufmt::derive::uDebug;

use crate::twi::{self, Direction, Transport};

pub use calibration::{
    compensate_pressure, compensate_temperature, pressure_pascals, raw_sample, Calibration,
    Measurement, Temperature,
};
pub use config::{Config, Filter, Mode, Oversampling, Standby};
pub use registers::{DEFAULT_ADDRESS, SECONDARY_ADDRESS};

use registers::*;

#[derive(Debug, uDebug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// transport failed, the bus has been released
    Bus(twi::Error),
    /// measurement requested before configuration and calibration
    NotReady,
    /// chip id register didn't read 0x58
    UnexpectedChipId(u8),
}

impl From<twi::Error> for Error {
    fn from(e: twi::Error) -> Self {
        Error::Bus(e)
    }
}

/// Decoded status register
#[derive(Debug, uDebug, Clone, Copy, PartialEq, Eq)]
pub struct Status {
    /// a conversion is running
    pub measuring: bool,
    /// NVM data is being copied to image registers
    pub im_update: bool,
}

/// BMP280 driver
pub struct Bmp280<T> {
    transport: T,
    address: u8,
    configured: bool,
    calibrated: bool,
}

impl<T: Transport> Bmp280<T> {
    pub fn new(transport: T, address: u8) -> Bmp280<T> {
        Bmp280 {
            transport,
            address,
            configured: false,
            calibrated: false,
        }
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    /// configuration and calibration both done
    pub fn is_ready(&self) -> bool {
        self.configured && self.calibrated
    }

    /// Give back the transport
    pub fn release(self) -> T {
        self.transport
    }

    /// Write ctrl_meas and config in one transaction
    pub fn apply_configuration(&mut self, config: &Config) -> Result<(), Error> {
        self.transport.start_transaction(self.address, Direction::Write)?;
        self.transport.write_byte(CTRL_MEAS)?;
        self.transport.write_byte(config.ctrl_meas())?;
        self.transport.write_byte(CONFIG)?;
        self.transport.write_byte(config.config())?;
        self.transport.stop_transaction()?;
        self.configured = true;
        Ok(())
    }

    /// Normal mode, x16 pressure, x2 temperature, filter 2, 250ms standby
    pub fn apply_default_configuration(&mut self) -> Result<(), Error> {
        self.apply_configuration(&Config::default())
    }

    /// Read the factory calibration
    ///
    /// Each coefficient group is read as its own burst so the last byte
    /// of the group goes out without acknowledge.
    pub fn load_calibration(&mut self) -> Result<Calibration, Error> {
        let mut temperature = [0u8; CALIB_TEMPERATURE_LEN];
        let mut pressure = [0u8; CALIB_PRESSURE_LEN];
        self.read_registers(CALIB_TEMPERATURE, &mut temperature)?;
        self.read_registers(CALIB_PRESSURE, &mut pressure)?;
        self.calibrated = true;
        Ok(Calibration::from_bytes(&temperature, &pressure))
    }

    /// Temperature in degrees Celsius, resolution 0.01
    pub fn read_temperature(&mut self, calibration: &Calibration) -> Result<f32, Error> {
        Ok(self.read_compensated_temperature(calibration)?.celsius())
    }

    /// Temperature with the fine value for a following pressure
    /// compensation
    pub fn read_compensated_temperature(
        &mut self,
        calibration: &Calibration,
    ) -> Result<Temperature, Error> {
        self.check_ready()?;
        let mut raw = [0u8; 3];
        self.read_registers(TEMP_MSB, &mut raw)?;
        Ok(compensate_temperature(
            raw_sample(raw[0], raw[1], raw[2]),
            calibration,
        ))
    }

    /// Pressure in Pa
    ///
    /// Reads the temperature first so the pressure is compensated with a
    /// fresh fine value.  Returns 0 for calibrations that would divide by
    /// zero.
    pub fn read_pressure(&mut self, calibration: &Calibration) -> Result<f32, Error> {
        let temperature = self.read_compensated_temperature(calibration)?;
        let mut raw = [0u8; 3];
        self.read_registers(PRESS_MSB, &mut raw)?;
        let pressure = compensate_pressure(
            raw_sample(raw[0], raw[1], raw[2]),
            temperature.fine,
            calibration,
        );
        Ok(pressure_pascals(pressure))
    }

    /// Pressure and temperature from one burst over 0xF7..0xFC
    ///
    /// Both values come from the same sample, the sensor locks the data
    /// registers during a burst read.
    pub fn read_measurement(&mut self, calibration: &Calibration) -> Result<Measurement, Error> {
        self.check_ready()?;
        let mut raw = [0u8; 6];
        self.read_registers(PRESS_MSB, &mut raw)?;
        let temperature = compensate_temperature(raw_sample(raw[3], raw[4], raw[5]), calibration);
        let pressure =
            compensate_pressure(raw_sample(raw[0], raw[1], raw[2]), temperature.fine, calibration);
        Ok(Measurement {
            temperature,
            pressure,
        })
    }

    /// Chip id, 0x58 for a BMP280
    pub fn read_device_id(&mut self) -> Result<u8, Error> {
        self.read_register(CHIP_ID_REG)
    }

    /// Check wiring and address by reading the chip id
    pub fn verify_device_id(&mut self) -> Result<(), Error> {
        match self.read_device_id()? {
            CHIP_ID => Ok(()),
            id => Err(Error::UnexpectedChipId(id)),
        }
    }

    /// Soft reset, the sensor comes back in sleep mode
    pub fn reset(&mut self) -> Result<(), Error> {
        self.configured = false;
        self.write_register(RESET, RESET_VALUE)
    }

    pub fn status(&mut self) -> Result<Status, Error> {
        let status = self.read_register(STATUS)?;
        Ok(Status {
            measuring: status & STATUS_MEASURING != 0,
            im_update: status & STATUS_IM_UPDATE != 0,
        })
    }

    /// Start a single measurement, keeping the oversampling settings
    ///
    /// The sensor goes back to sleep once done, poll [`status`](Self::status)
    /// until `measuring` clears before reading.
    pub fn force_measurement(&mut self) -> Result<(), Error> {
        let ctrl_meas = self.read_register(CTRL_MEAS)?;
        self.write_register(CTRL_MEAS, (ctrl_meas & !MODE_MASK) | Mode::Forced as u8)
    }

    /// Current settings as stored in the sensor
    pub fn read_configuration(&mut self) -> Result<Config, Error> {
        let mut regs = [0u8; 2];
        self.read_registers(CTRL_MEAS, &mut regs)?;
        Ok(Config::from_registers(regs[0], regs[1]))
    }

    pub fn read_register(&mut self, register: u8) -> Result<u8, Error> {
        let mut value = [0u8];
        self.read_registers(register, &mut value)?;
        Ok(value[0])
    }

    /// Burst read starting at `register`, the sensor auto-increments
    pub fn read_registers(&mut self, register: u8, buffer: &mut [u8]) -> Result<(), Error> {
        // SLA+R must be followed by at least one data byte
        if buffer.is_empty() {
            return Ok(());
        }
        self.transport.start_transaction(self.address, Direction::Write)?;
        self.transport.write_byte(register)?;
        self.transport.start_transaction(self.address, Direction::Read)?;
        let last = buffer.len().saturating_sub(1);
        for (i, byte) in buffer.iter_mut().enumerate() {
            *byte = self.transport.read_byte(i != last)?;
        }
        self.transport.stop_transaction()?;
        Ok(())
    }

    pub fn write_register(&mut self, register: u8, value: u8) -> Result<(), Error> {
        self.transport.start_transaction(self.address, Direction::Write)?;
        self.transport.write_byte(register)?;
        self.transport.write_byte(value)?;
        self.transport.stop_transaction()?;
        Ok(())
    }

    fn check_ready(&self) -> Result<(), Error> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(Error::NotReady)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::calibration::DATASHEET;
    use super::*;
    use crate::twi::control::{TWEN, TWINT, TWSTA, TWSTO};
    use crate::twi::status;
    use crate::twi::tests::FakeTwi;
    use crate::twi::TwiMaster;

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Call {
        Start(u8, Direction),
        Write(u8),
        Read(bool),
        Stop,
    }

    // register file behind the byte level protocol
    struct FakeSensor {
        regs: [u8; 256],
        pointer: u8,
        // next written byte is a register address
        expect_address: bool,
        direction: Option<Direction>,
        calls: Vec<Call>,
        fail_start: Option<twi::Error>,
        status: u8,
    }

    impl FakeSensor {
        fn new() -> FakeSensor {
            let mut regs = [0u8; 256];
            regs[CHIP_ID_REG as usize] = CHIP_ID;
            FakeSensor {
                regs,
                pointer: 0,
                expect_address: true,
                direction: None,
                calls: Vec::new(),
                fail_start: None,
                status: status::NO_INFO,
            }
        }

        fn with_datasheet_calibration() -> FakeSensor {
            let mut sensor = FakeSensor::new();
            let c = DATASHEET;
            let words: [[u8; 2]; 12] = [
                c.t1.to_le_bytes(),
                c.t2.to_le_bytes(),
                c.t3.to_le_bytes(),
                c.p1.to_le_bytes(),
                c.p2.to_le_bytes(),
                c.p3.to_le_bytes(),
                c.p4.to_le_bytes(),
                c.p5.to_le_bytes(),
                c.p6.to_le_bytes(),
                c.p7.to_le_bytes(),
                c.p8.to_le_bytes(),
                c.p9.to_le_bytes(),
            ];
            for (i, word) in words.iter().enumerate() {
                sensor.regs[CALIB_START as usize + 2 * i] = word[0];
                sensor.regs[CALIB_START as usize + 2 * i + 1] = word[1];
            }
            // adc_P 415148, adc_T 519888
            sensor.regs[PRESS_MSB as usize..=TEMP_XLSB as usize]
                .copy_from_slice(&[0x65, 0x5A, 0xC0, 0x7E, 0xED, 0x00]);
            sensor
        }

        fn bus_calls_after_start(&self) -> usize {
            self.calls
                .iter()
                .filter(|c| matches!(c, Call::Write(_) | Call::Read(_)))
                .count()
        }
    }

    impl Transport for FakeSensor {
        fn start_transaction(&mut self, address: u8, direction: Direction) -> Result<(), twi::Error> {
            self.calls.push(Call::Start(address, direction));
            if let Some(e) = self.fail_start {
                self.calls.push(Call::Stop);
                return Err(e);
            }
            if address != DEFAULT_ADDRESS {
                self.calls.push(Call::Stop);
                return Err(match direction {
                    Direction::Write => twi::Error::AddressNackWrite,
                    Direction::Read => twi::Error::AddressNackRead,
                });
            }
            self.direction = Some(direction);
            self.expect_address = true;
            self.status = match direction {
                Direction::Write => status::SLA_W_ACK,
                Direction::Read => status::SLA_R_ACK,
            };
            Ok(())
        }

        fn write_byte(&mut self, data: u8) -> Result<(), twi::Error> {
            self.calls.push(Call::Write(data));
            assert_eq!(self.direction, Some(Direction::Write));
            if self.expect_address {
                self.pointer = data;
            } else {
                self.regs[self.pointer as usize] = data;
            }
            self.expect_address = !self.expect_address;
            self.status = status::DATA_W_ACK;
            Ok(())
        }

        fn read_byte(&mut self, ack: bool) -> Result<u8, twi::Error> {
            self.calls.push(Call::Read(ack));
            assert_eq!(self.direction, Some(Direction::Read));
            let value = self.regs[self.pointer as usize];
            self.pointer = self.pointer.wrapping_add(1);
            self.status = if ack {
                status::DATA_R_ACK
            } else {
                status::DATA_R_NACK
            };
            Ok(value)
        }

        fn stop_transaction(&mut self) -> Result<(), twi::Error> {
            self.calls.push(Call::Stop);
            self.direction = None;
            self.status = status::NO_INFO;
            Ok(())
        }

        fn last_status(&self) -> u8 {
            self.status
        }
    }

    fn ready_sensor(fake: &mut FakeSensor) -> (Bmp280<&mut FakeSensor>, Calibration) {
        let mut bmp = Bmp280::new(fake, DEFAULT_ADDRESS);
        bmp.apply_default_configuration().unwrap();
        let calibration = bmp.load_calibration().unwrap();
        (bmp, calibration)
    }

    #[test]
    fn default_configuration_reads_back() {
        let mut fake = FakeSensor::new();
        let mut bmp = Bmp280::new(&mut fake, DEFAULT_ADDRESS);
        bmp.apply_default_configuration().unwrap();
        assert_eq!(bmp.read_register(CTRL_MEAS), Ok(0x57));
        assert_eq!(bmp.read_register(CONFIG), Ok(0x64));
        assert_eq!(bmp.read_configuration(), Ok(Config::default()));
        drop(bmp);

        assert_eq!(
            &fake.calls[..6],
            &[
                Call::Start(DEFAULT_ADDRESS, Direction::Write),
                Call::Write(CTRL_MEAS),
                Call::Write(0x57),
                Call::Write(CONFIG),
                Call::Write(0x64),
                Call::Stop,
            ]
        );
    }

    #[test]
    fn calibration_fields_in_order() {
        let mut fake = FakeSensor::new();
        for i in 0..24u8 {
            // coefficient n reads as n + 1
            fake.regs[CALIB_START as usize + i as usize] = if i % 2 == 0 { i / 2 + 1 } else { 0 };
        }
        let mut bmp = Bmp280::new(&mut fake, DEFAULT_ADDRESS);
        let cal = bmp.load_calibration().unwrap();
        assert_eq!(
            [
                cal.t1 as i32,
                cal.t2 as i32,
                cal.t3 as i32,
                cal.p1 as i32,
                cal.p2 as i32,
                cal.p3 as i32,
                cal.p4 as i32,
                cal.p5 as i32,
                cal.p6 as i32,
                cal.p7 as i32,
                cal.p8 as i32,
                cal.p9 as i32,
            ],
            [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12]
        );
    }

    #[test]
    fn calibration_groups_end_with_nack() {
        let mut fake = FakeSensor::with_datasheet_calibration();
        let mut bmp = Bmp280::new(&mut fake, DEFAULT_ADDRESS);
        assert_eq!(bmp.load_calibration(), Ok(DATASHEET));
        drop(bmp);

        let reads: Vec<bool> = fake
            .calls
            .iter()
            .filter_map(|c| match c {
                Call::Read(ack) => Some(*ack),
                _ => None,
            })
            .collect();
        assert_eq!(reads.len(), 24);
        let nacks: Vec<usize> = reads
            .iter()
            .enumerate()
            .filter(|(_, ack)| !**ack)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(nacks, vec![5, 23]);
        assert!(fake.calls.contains(&Call::Write(CALIB_TEMPERATURE)));
        assert!(fake.calls.contains(&Call::Write(CALIB_PRESSURE)));
    }

    #[test]
    fn measurements_refused_until_ready() {
        let mut fake = FakeSensor::with_datasheet_calibration();
        let mut bmp = Bmp280::new(&mut fake, DEFAULT_ADDRESS);
        assert_eq!(bmp.read_temperature(&DATASHEET), Err(Error::NotReady));
        assert_eq!(bmp.read_pressure(&DATASHEET), Err(Error::NotReady));

        let calibration = bmp.load_calibration().unwrap();
        assert_eq!(bmp.read_measurement(&calibration), Err(Error::NotReady));

        bmp.apply_default_configuration().unwrap();
        assert!(bmp.is_ready());
        assert!(bmp.read_temperature(&calibration).is_ok());

        bmp.reset().unwrap();
        assert!(!bmp.is_ready());
        assert_eq!(bmp.read_temperature(&calibration), Err(Error::NotReady));
    }

    #[test]
    fn not_ready_does_not_touch_the_bus() {
        let mut fake = FakeSensor::new();
        let mut bmp = Bmp280::new(&mut fake, DEFAULT_ADDRESS);
        assert_eq!(bmp.read_pressure(&DATASHEET), Err(Error::NotReady));
        drop(bmp);
        assert!(fake.calls.is_empty());
    }

    #[test]
    fn datasheet_temperature_and_pressure() {
        let mut fake = FakeSensor::with_datasheet_calibration();
        let (mut bmp, calibration) = ready_sensor(&mut fake);

        let t = bmp.read_compensated_temperature(&calibration).unwrap();
        assert_eq!(t.centi_celsius, 2508);
        assert_eq!(t.fine, 128_422);
        assert!((bmp.read_temperature(&calibration).unwrap() - 25.08).abs() < 0.001);

        let pressure = bmp.read_pressure(&calibration).unwrap();
        assert_eq!(pressure, pressure_pascals(25_767_233));
    }

    #[test]
    fn pressure_read_refreshes_temperature_first() {
        let mut fake = FakeSensor::with_datasheet_calibration();
        let (mut bmp, calibration) = ready_sensor(&mut fake);
        bmp.transport.calls.clear();
        bmp.read_pressure(&calibration).unwrap();

        let selected: Vec<u8> = bmp
            .transport
            .calls
            .iter()
            .filter_map(|c| match c {
                Call::Write(register) => Some(*register),
                _ => None,
            })
            .collect();
        assert_eq!(selected, vec![TEMP_MSB, PRESS_MSB]);
    }

    #[test]
    fn burst_measurement_matches_separate_reads() {
        let mut fake = FakeSensor::with_datasheet_calibration();
        let (mut bmp, calibration) = ready_sensor(&mut fake);
        let m = bmp.read_measurement(&calibration).unwrap();
        assert_eq!(m.temperature.centi_celsius, 2508);
        assert_eq!(m.pressure, 25_767_233);
        assert_eq!(m.pascals(), bmp.read_pressure(&calibration).unwrap());
    }

    #[test]
    fn zero_p1_reads_zero_pressure() {
        let mut fake = FakeSensor::with_datasheet_calibration();
        let (mut bmp, _) = ready_sensor(&mut fake);
        let calibration = Calibration { p1: 0, ..DATASHEET };
        assert_eq!(bmp.read_pressure(&calibration), Ok(0.0));
    }

    #[test]
    fn address_nack_aborts_operation() {
        let mut fake = FakeSensor::new();
        fake.fail_start = Some(twi::Error::AddressNackWrite);
        let mut bmp = Bmp280::new(&mut fake, DEFAULT_ADDRESS);
        assert_eq!(
            bmp.apply_default_configuration(),
            Err(Error::Bus(twi::Error::AddressNackWrite))
        );
        assert!(!bmp.is_ready());
        assert_eq!(
            bmp.load_calibration(),
            Err(Error::Bus(twi::Error::AddressNackWrite))
        );
        assert_eq!(
            bmp.read_device_id(),
            Err(Error::Bus(twi::Error::AddressNackWrite))
        );
        drop(bmp);
        assert_eq!(fake.bus_calls_after_start(), 0);
    }

    #[test]
    fn wrong_address_is_reported() {
        let mut fake = FakeSensor::new();
        let mut bmp = Bmp280::new(&mut fake, SECONDARY_ADDRESS);
        assert_eq!(
            bmp.verify_device_id(),
            Err(Error::Bus(twi::Error::AddressNackWrite))
        );
    }

    #[test]
    fn device_id_check() {
        let mut fake = FakeSensor::new();
        let mut bmp = Bmp280::new(&mut fake, DEFAULT_ADDRESS);
        assert_eq!(bmp.read_device_id(), Ok(0x58));
        assert_eq!(bmp.verify_device_id(), Ok(()));
        bmp.write_register(CHIP_ID_REG, 0x60).unwrap();
        assert_eq!(bmp.verify_device_id(), Err(Error::UnexpectedChipId(0x60)));
    }

    #[test]
    fn reset_writes_magic_value() {
        let mut fake = FakeSensor::new();
        let mut bmp = Bmp280::new(&mut fake, DEFAULT_ADDRESS);
        bmp.reset().unwrap();
        drop(bmp);
        assert_eq!(fake.regs[RESET as usize], RESET_VALUE);
        assert_eq!(
            fake.calls,
            vec![
                Call::Start(DEFAULT_ADDRESS, Direction::Write),
                Call::Write(RESET),
                Call::Write(RESET_VALUE),
                Call::Stop,
            ]
        );
    }

    #[test]
    fn forced_measurement_keeps_oversampling() {
        let mut fake = FakeSensor::new();
        let mut bmp = Bmp280::new(&mut fake, DEFAULT_ADDRESS);
        bmp.apply_default_configuration().unwrap();
        bmp.force_measurement().unwrap();
        assert_eq!(bmp.read_register(CTRL_MEAS), Ok(0x55));
    }

    #[test]
    fn status_bits() {
        let mut fake = FakeSensor::new();
        fake.regs[STATUS as usize] = STATUS_MEASURING;
        let mut bmp = Bmp280::new(&mut fake, DEFAULT_ADDRESS);
        assert_eq!(
            bmp.status(),
            Ok(Status {
                measuring: true,
                im_update: false
            })
        );
    }

    #[test]
    fn empty_read_stays_off_the_bus() {
        let mut bmp = Bmp280::new(TwiMaster::new(FakeTwi::default(), 50), DEFAULT_ADDRESS);
        assert_eq!(bmp.read_registers(CHIP_ID_REG, &mut []), Ok(()));
        let regs = bmp.release().release();
        assert!(regs.controls.is_empty());
        assert!(regs.outgoing.is_empty());
    }

    #[test]
    fn chip_id_over_twi_master() {
        let mut twi = FakeTwi::with_statuses(&[
            status::START,
            status::SLA_W_ACK,
            status::DATA_W_ACK,
            status::REPEATED_START,
            status::SLA_R_ACK,
            status::DATA_R_NACK,
        ]);
        twi.incoming.push_back(CHIP_ID);
        let mut master = TwiMaster::new(twi, 50);
        let mut bmp = Bmp280::new(&mut master, DEFAULT_ADDRESS);
        assert_eq!(bmp.read_device_id(), Ok(CHIP_ID));
        drop(bmp);
        assert!(!master.is_open());

        let regs = master.release();
        // SLA+W, register, SLA+R
        assert_eq!(regs.outgoing, vec![0xEC, CHIP_ID_REG, 0xED]);
        let start = TWINT | TWSTA | TWEN;
        let next = TWINT | TWEN;
        assert_eq!(
            regs.controls,
            vec![start, next, next, start, next, next, TWINT | TWSTO | TWEN]
        );
        assert_eq!(regs.stops, 1);
    }
}
