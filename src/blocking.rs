use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{I2c, SevenBitAddress};

use crate::calibration::{BME280_CALIBRATION_LEN, BMP280_CALIBRATION_LEN, Calibration};
use crate::common::{
    ALTERNATE_ADDRESS, ChipVariant, Config, DEFAULT_ADDRESS, FilterCoefficient, Measurement,
    MeasurementInterval, Mode, Oversampling, ProbeRecord, RawReading, SOFT_RESET_COMMAND,
    STATUS_POLL_INTERVAL_US, Status, mask, merge_bits, register, unique_id_from_read_bytes,
};
use crate::compensation::Compensator;
use crate::error::Error;

/// A BMP280 or BME280 sensor on an I2C bus.
///
/// The sensor's calibration is read from NVM on the first measurement and
/// cached for the lifetime of the struct (or until [`Bmx280::reset`]).
///
/// The struct does no locking of its own. To share the bus with other
/// devices, pass a mutable reference or a bus-sharing wrapper as `I`.
pub struct Bmx280<I: I2c> {
    i2c: I,
    address: SevenBitAddress,
    variant: ChipVariant,
    compensator: Option<Compensator>,
}

impl<I: I2c> Bmx280<I> {
    /// Connect to a sensor of the given variant, checking that the chip
    /// identity register matches.
    ///
    /// Fails with [`Error::IncorrectDeviceIdentity`] if a different chip
    /// answers, or with [`Error::I2c`] if nothing does. Use [`autodetect`]
    /// if the variant or address is not known in advance.
    pub fn new(
        mut i2c: I,
        variant: ChipVariant,
        address: SevenBitAddress,
    ) -> Result<Self, Error<I::Error>> {
        identify(&mut i2c, address, variant)?;
        Ok(Self::new_unchecked(i2c, variant, address))
    }

    fn new_unchecked(i2c: I, variant: ChipVariant, address: SevenBitAddress) -> Self {
        Self {
            i2c,
            address,
            variant,
            compensator: None,
        }
    }

    pub fn destroy(self) -> I {
        self.i2c
    }

    pub fn address(&self) -> SevenBitAddress {
        self.address
    }

    pub fn variant(&self) -> ChipVariant {
        self.variant
    }

    /// Read the chip identity register.
    pub fn chip_id(&mut self) -> Result<u8, Error<I::Error>> {
        self.read_byte(register::CHIP_ID)
    }

    /// Read the sensor's unique id.
    ///
    /// This is undocumented in the datasheets; the layout comes from Bosch
    /// Sensortec's community forum.
    pub fn unique_id(&mut self) -> Result<u32, Error<I::Error>> {
        let mut buffer = [0u8; 4];
        self.read_register(register::UNIQUE_ID, &mut buffer)?;
        Ok(unique_id_from_read_bytes(buffer))
    }

    /// The sensor's calibration coefficients, read from NVM on first use.
    pub fn calibration(&mut self) -> Result<&Calibration, Error<I::Error>> {
        Ok(self.compensator()?.calibration())
    }

    /// Drop the cached calibration so that it is read again on next use.
    pub fn invalidate_calibration(&mut self) {
        self.compensator = None;
    }

    // Operation

    pub fn mode(&mut self) -> Result<Mode, Error<I::Error>> {
        Ok(Mode::from_bits(self.read_bits(register::CTRL_MEAS, mask::MODE)?))
    }

    pub fn set_mode(&mut self, mode: Mode) -> Result<(), Error<I::Error>> {
        #[cfg(feature = "defmt")]
        defmt::trace!("{=u8:#x}: mode -> {}", self.address, mode);
        self.write_bits(register::CTRL_MEAS, mask::MODE, mode.bits())
    }

    /// Take a single measurement in forced mode, blocking until it is done.
    ///
    /// The status register is polled every 100µs with no timeout, so a
    /// sensor that never finishes measuring will hang this call. The sensor
    /// returns to sleep mode afterwards.
    pub fn update(&mut self, mut delay: impl DelayNs) -> Result<(), Error<I::Error>> {
        self.set_mode(Mode::Forced)?;
        while self.status()? == Status::Measuring {
            delay.delay_us(STATUS_POLL_INTERVAL_US);
        }
        Ok(())
    }

    /// Start measuring continuously (normal mode).
    pub fn enable(&mut self) -> Result<(), Error<I::Error>> {
        self.set_mode(Mode::Normal)
    }

    /// Stop measuring (sleep mode).
    pub fn pause(&mut self) -> Result<(), Error<I::Error>> {
        self.set_mode(Mode::Sleep)
    }

    /// Perform a power-on reset and wait for the sensor to start up.
    ///
    /// All registers return to their defaults, so the sensor is left in
    /// sleep mode with every channel skipped. The cached calibration is
    /// dropped and will be read again on the next measurement.
    pub fn reset(&mut self, mut delay: impl DelayNs) -> Result<(), Error<I::Error>> {
        self.i2c
            .write(self.address, &[register::RESET, SOFT_RESET_COMMAND])?;
        self.invalidate_calibration();
        delay.delay_ms(2);
        Ok(())
    }

    pub fn status(&mut self) -> Result<Status, Error<I::Error>> {
        Ok(Status::from_bits(self.read_bits(register::STATUS, mask::STATUS)?))
    }

    // Configuration

    pub fn temperature_oversampling(&mut self) -> Result<Oversampling, Error<I::Error>> {
        let bits = self.read_bits(register::CTRL_MEAS, mask::TEMPERATURE_OVERSAMPLING)?;
        Ok(Oversampling::from_bits(bits >> 5))
    }

    pub fn set_temperature_oversampling(
        &mut self,
        oversampling: Oversampling,
    ) -> Result<(), Error<I::Error>> {
        self.write_bits(
            register::CTRL_MEAS,
            mask::TEMPERATURE_OVERSAMPLING,
            oversampling.bits() << 5,
        )
    }

    pub fn pressure_oversampling(&mut self) -> Result<Oversampling, Error<I::Error>> {
        let bits = self.read_bits(register::CTRL_MEAS, mask::PRESSURE_OVERSAMPLING)?;
        Ok(Oversampling::from_bits(bits >> 2))
    }

    pub fn set_pressure_oversampling(
        &mut self,
        oversampling: Oversampling,
    ) -> Result<(), Error<I::Error>> {
        self.write_bits(
            register::CTRL_MEAS,
            mask::PRESSURE_OVERSAMPLING,
            oversampling.bits() << 2,
        )
    }

    /// Humidity oversampling, or `None` on the BMP280.
    pub fn humidity_oversampling(&mut self) -> Result<Option<Oversampling>, Error<I::Error>> {
        if !self.variant.has_humidity() {
            return Ok(None);
        }
        let bits = self.read_bits(register::CTRL_HUM, mask::HUMIDITY_OVERSAMPLING)?;
        Ok(Some(Oversampling::from_bits(bits)))
    }

    /// Set humidity oversampling. Has no effect on the BMP280.
    ///
    /// The sensor only applies a change to `ctrl_hum` once `ctrl_meas` is
    /// written (datasheet 5.4.3), so the current contents of `ctrl_meas`
    /// are written back unchanged afterwards. The mode and the other
    /// oversampling settings are therefore preserved.
    pub fn set_humidity_oversampling(
        &mut self,
        oversampling: Oversampling,
    ) -> Result<(), Error<I::Error>> {
        if !self.variant.has_humidity() {
            return Ok(());
        }
        self.write_bits(
            register::CTRL_HUM,
            mask::HUMIDITY_OVERSAMPLING,
            oversampling.bits(),
        )?;
        self.commit_ctrl_hum()
    }

    pub fn filter_coefficient(&mut self) -> Result<FilterCoefficient, Error<I::Error>> {
        let bits = self.read_bits(register::CONFIG, mask::FILTER)?;
        Ok(FilterCoefficient::from_bits(bits >> 2))
    }

    /// Set the IIR filter coefficient.
    ///
    /// Writes to the config register may be ignored outside sleep mode, so
    /// the sensor is put to sleep for the write and then returned to the
    /// mode it was in before the call.
    pub fn set_filter_coefficient(
        &mut self,
        filter: FilterCoefficient,
    ) -> Result<(), Error<I::Error>> {
        let mode = self.mode()?;
        self.pause()?;
        self.write_bits(register::CONFIG, mask::FILTER, filter.bits() << 2)?;
        self.set_mode(mode)
    }

    pub fn measurement_interval(&mut self) -> Result<MeasurementInterval, Error<I::Error>> {
        let bits = self.read_bits(register::CONFIG, mask::MEASUREMENT_INTERVAL)?;
        Ok(MeasurementInterval::from_bits(bits >> 5, self.variant))
    }

    /// Set the standby time between measurements in normal mode.
    ///
    /// Fails with [`Error::UnsupportedInterval`], without touching the bus,
    /// if this chip variant does not offer `interval`.
    pub fn set_measurement_interval(
        &mut self,
        interval: MeasurementInterval,
    ) -> Result<(), Error<I::Error>> {
        let bits = interval
            .bits(self.variant)
            .ok_or(Error::UnsupportedInterval(interval))?;
        self.write_bits(register::CONFIG, mask::MEASUREMENT_INTERVAL, bits << 5)
    }

    /// Apply all settings in `config`, finishing in `config.mode`.
    ///
    /// The sensor is put to sleep first so that the config register write
    /// takes effect, and `ctrl_meas` is written last so that it also
    /// commits the humidity oversampling.
    pub fn configure(&mut self, config: Config) -> Result<(), Error<I::Error>> {
        let interval = config
            .measurement_interval
            .bits(self.variant)
            .ok_or(Error::UnsupportedInterval(config.measurement_interval))?;

        self.pause()?;
        if self.variant.has_humidity() {
            self.write_bits(
                register::CTRL_HUM,
                mask::HUMIDITY_OVERSAMPLING,
                config.humidity_oversampling.bits(),
            )?;
        }
        self.write_bits(
            register::CONFIG,
            mask::FILTER | mask::MEASUREMENT_INTERVAL,
            config.filter_coefficient.bits() << 2 | interval << 5,
        )?;
        self.write_bits(
            register::CTRL_MEAS,
            mask::TEMPERATURE_OVERSAMPLING | mask::PRESSURE_OVERSAMPLING | mask::MODE,
            config.temperature_oversampling.bits() << 5
                | config.pressure_oversampling.bits() << 2
                | config.mode.bits(),
        )
    }

    // Measurements

    /// Read and compensate the latest values from the data registers.
    ///
    /// This does not trigger a measurement: call [`Bmx280::update`] first
    /// in sleep mode, or [`Bmx280::enable`] once for continuous readings.
    ///
    /// Fails with [`Error::MissingTemperatureReading`] if the temperature
    /// channel is skipped and no earlier reading supplied a temperature.
    pub fn measurement(&mut self) -> Result<Measurement, Error<I::Error>> {
        let mut buffer = [0u8; 8];
        let data = &mut buffer[..self.variant.data_len()];
        self.read_register(register::DATA, data)?;
        let raw = RawReading::from_read_bytes(data);

        let compensator = self.compensator()?;
        let temperature = compensator.compensate_temperature(raw.temperature);
        let pressure = compensator.compensate_pressure(raw.pressure)?;
        let humidity = match raw.humidity {
            Some(raw_humidity) => compensator.compensate_humidity(raw_humidity)?,
            None => None,
        };

        Ok(Measurement {
            temperature,
            pressure,
            humidity,
        })
    }

    /// Temperature in °C.
    pub fn temperature(&mut self) -> Result<Option<f64>, Error<I::Error>> {
        Ok(self.measurement()?.temperature)
    }

    /// Compensated pressure, as returned by the datasheet's formula.
    ///
    /// The value is numerically in Pascal although [`Measurement`]'s
    /// `Display` labels it hPa.
    pub fn pressure(&mut self) -> Result<Option<f64>, Error<I::Error>> {
        Ok(self.measurement()?.pressure)
    }

    /// Relative humidity in %H. Always `None` on the BMP280.
    pub fn humidity(&mut self) -> Result<Option<f64>, Error<I::Error>> {
        Ok(self.measurement()?.humidity)
    }

    /// Absolute humidity in g/m³. Always `None` on the BMP280.
    pub fn absolute_humidity(&mut self) -> Result<Option<f64>, Error<I::Error>> {
        Ok(self.measurement()?.absolute_humidity())
    }

    // Register access

    fn compensator(&mut self) -> Result<&mut Compensator, Error<I::Error>> {
        let compensator = match self.compensator.take() {
            Some(compensator) => compensator,
            None => Compensator::new(self.read_calibration()?),
        };
        Ok(self.compensator.insert(compensator))
    }

    fn read_calibration(&mut self) -> Result<Calibration, Error<I::Error>> {
        #[cfg(feature = "defmt")]
        defmt::debug!("{=u8:#x}: reading calibration", self.address);
        match self.variant {
            ChipVariant::Bmp280 => {
                let mut buffer = [0u8; BMP280_CALIBRATION_LEN];
                self.read_register(register::CALIBRATION, &mut buffer)?;
                Ok(Calibration::from_bmp280_bytes(&buffer))
            }
            ChipVariant::Bme280 => {
                let mut buffer = [0u8; BME280_CALIBRATION_LEN];
                let (nvm, humidity) = buffer.split_at_mut(self.variant.calibration_len());
                self.read_register(register::CALIBRATION, nvm)?;
                self.read_register(register::HUMIDITY_CALIBRATION, humidity)?;
                Ok(Calibration::from_bme280_bytes(&buffer))
            }
        }
    }

    /// Rewrite `ctrl_meas` with its current contents.
    fn commit_ctrl_hum(&mut self) -> Result<(), Error<I::Error>> {
        let ctrl_meas = self.read_byte(register::CTRL_MEAS)?;
        self.i2c.write(self.address, &[register::CTRL_MEAS, ctrl_meas])?;
        Ok(())
    }

    fn read_register(&mut self, register: u8, buffer: &mut [u8]) -> Result<(), Error<I::Error>> {
        self.i2c.write_read(self.address, &[register], buffer)?;
        Ok(())
    }

    fn read_byte(&mut self, register: u8) -> Result<u8, Error<I::Error>> {
        let mut buffer = [0u8];
        self.read_register(register, &mut buffer)?;
        Ok(buffer[0])
    }

    fn read_bits(&mut self, register: u8, mask: u8) -> Result<u8, Error<I::Error>> {
        Ok(self.read_byte(register)? & mask)
    }

    /// Read-modify-write of the bits covered by `mask`.
    fn write_bits(&mut self, register: u8, mask: u8, value: u8) -> Result<(), Error<I::Error>> {
        let current = self.read_byte(register)?;
        self.i2c
            .write(self.address, &[register, merge_bits(current, mask, value)])?;
        Ok(())
    }
}

/// Find a supported sensor and connect to it.
///
/// With no `address`, 0x76 is tried before 0x77, moving on only if nothing
/// answers at 0x76. At each address the BMP280 is tried before the BME280.
///
/// Fails with [`Error::NoDeviceFound`] if nothing answers, or
/// [`Error::UnsupportedDevice`] if a device answers with an unknown chip
/// identity. Any I2C error while probing is taken to mean there is no
/// device at that address.
pub fn autodetect<I: I2c>(
    mut i2c: I,
    address: Option<SevenBitAddress>,
) -> Result<Bmx280<I>, Error<I::Error>> {
    let (address, variant) = match address {
        Some(address) => (address, probe(&mut i2c, address)?),
        None => probe_standard_addresses(&mut i2c)?,
    };
    Ok(Bmx280::new_unchecked(i2c, variant, address))
}

fn probe_standard_addresses<I: I2c>(
    i2c: &mut I,
) -> Result<(SevenBitAddress, ChipVariant), Error<I::Error>> {
    for address in [DEFAULT_ADDRESS, ALTERNATE_ADDRESS] {
        match probe(i2c, address) {
            Ok(variant) => return Ok((address, variant)),
            Err(Error::NoDeviceFound(_)) => continue,
            Err(e) => return Err(e),
        }
    }
    Err(Error::NoDeviceFound(None))
}

fn probe<I: I2c>(i2c: &mut I, address: SevenBitAddress) -> Result<ChipVariant, Error<I::Error>> {
    let mut record = ProbeRecord::default();
    for variant in ChipVariant::PROBE_ORDER {
        match identify(i2c, address, variant) {
            Ok(()) => {
                #[cfg(feature = "defmt")]
                defmt::debug!("{=u8:#x}: found {}", address, variant);
                return Ok(variant);
            }
            Err(e) => {
                #[cfg(feature = "defmt")]
                defmt::debug!("{=u8:#x}: not a {}", address, variant);
                record.record(e)?;
            }
        }
    }
    Err(record.exhausted(address))
}

fn identify<I: I2c>(
    i2c: &mut I,
    address: SevenBitAddress,
    variant: ChipVariant,
) -> Result<(), Error<I::Error>> {
    let mut chip_id = [0u8];
    i2c.write_read(address, &[register::CHIP_ID], &mut chip_id)?;
    variant.check_identity(chip_id[0])
}

#[cfg(test)]
mod test {
    extern crate std;
    use std::vec;

    use super::*;
    use embedded_hal::i2c::ErrorKind;
    use embedded_hal_mock::eh1::delay::NoopDelay;
    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction};

    const ADDR: u8 = 0x76;

    fn chip_id(address: u8, id: u8) -> Transaction {
        Transaction::write_read(address, vec![register::CHIP_ID], vec![id])
    }

    fn no_ack(address: u8) -> Transaction {
        Transaction::write_read(address, vec![register::CHIP_ID], vec![0])
            .with_error(ErrorKind::Other)
    }

    fn read(register: u8, value: u8) -> Transaction {
        Transaction::write_read(ADDR, vec![register], vec![value])
    }

    fn write(register: u8, value: u8) -> Transaction {
        Transaction::write(ADDR, vec![register, value])
    }

    fn connect(variant: ChipVariant, expectations: &[Transaction]) -> Bmx280<I2cMock> {
        let mut all = vec![chip_id(ADDR, variant.chip_id())];
        all.extend_from_slice(expectations);
        Bmx280::new(I2cMock::new(&all), variant, ADDR).unwrap()
    }

    #[test]
    fn new_rejects_wrong_chip() {
        let mut i2c = I2cMock::new(&[chip_id(ADDR, 0x60)]);
        let result = Bmx280::new(&mut i2c, ChipVariant::Bmp280, ADDR);
        assert!(matches!(
            result,
            Err(Error::IncorrectDeviceIdentity {
                expected: 0x58,
                found: 0x60
            })
        ));
        i2c.done();
    }

    #[test]
    fn new_propagates_bus_errors() {
        let mut i2c = I2cMock::new(&[no_ack(ADDR)]);
        let result = Bmx280::new(&mut i2c, ChipVariant::Bme280, ADDR);
        assert!(matches!(result, Err(Error::I2c(ErrorKind::Other))));
        i2c.done();
    }

    #[test]
    fn set_mode_preserves_oversampling() {
        let mut sensor = connect(
            ChipVariant::Bmp280,
            &[read(0xF4, 0b0100_1100), write(0xF4, 0b0100_1111)],
        );
        sensor.set_mode(Mode::Normal).unwrap();
        sensor.destroy().done();
    }

    #[test]
    fn mode_reads_low_bits() {
        let mut sensor = connect(ChipVariant::Bmp280, &[read(0xF4, 0b1010_0101)]);
        assert_eq!(sensor.mode().unwrap(), Mode::Forced);
        sensor.destroy().done();
    }

    #[test]
    fn update_polls_until_measurement_completes() {
        let mut sensor = connect(
            ChipVariant::Bmp280,
            &[
                read(0xF4, 0b0010_0100),
                write(0xF4, 0b0010_0101),
                read(0xF3, 0b0000_1001),
                read(0xF3, 0b0000_1000),
                read(0xF3, 0b0000_0000),
            ],
        );
        sensor.update(NoopDelay::new()).unwrap();
        sensor.destroy().done();
    }

    #[test]
    fn status_while_copying_nvm() {
        let mut sensor = connect(ChipVariant::Bmp280, &[read(0xF3, 0b1111_0001)]);
        assert_eq!(sensor.status().unwrap(), Status::CopyingNvm);
        sensor.destroy().done();
    }

    #[test]
    fn reset_writes_sentinel() {
        let mut sensor = connect(ChipVariant::Bme280, &[write(0xE0, 0xB6)]);
        sensor.reset(NoopDelay::new()).unwrap();
        sensor.destroy().done();
    }

    #[test]
    fn oversampling_fields() {
        let mut sensor = connect(
            ChipVariant::Bmp280,
            &[
                read(0xF4, 0b1010_1111),
                read(0xF4, 0b1010_1111),
                read(0xF4, 0b0000_0011),
                write(0xF4, 0b1010_0011),
                read(0xF4, 0b0000_0011),
                write(0xF4, 0b0000_1111),
            ],
        );
        assert_eq!(sensor.temperature_oversampling().unwrap(), Oversampling::X16);
        assert_eq!(sensor.pressure_oversampling().unwrap(), Oversampling::X4);
        sensor.set_temperature_oversampling(Oversampling::X16).unwrap();
        sensor.set_pressure_oversampling(Oversampling::X4).unwrap();
        sensor.destroy().done();
    }

    #[test]
    fn humidity_oversampling_commits_via_ctrl_meas() {
        let mut sensor = connect(
            ChipVariant::Bme280,
            &[
                read(0xF2, 0b0000_0000),
                write(0xF2, 0b0000_0011),
                read(0xF4, 0b0010_0111),
                write(0xF4, 0b0010_0111),
                read(0xF2, 0b1111_1011),
            ],
        );
        sensor.set_humidity_oversampling(Oversampling::X4).unwrap();
        assert_eq!(sensor.humidity_oversampling().unwrap(), Some(Oversampling::X4));
        sensor.destroy().done();
    }

    #[test]
    fn humidity_oversampling_on_bmp280_is_inert() {
        let mut sensor = connect(ChipVariant::Bmp280, &[]);
        assert_eq!(sensor.humidity_oversampling().unwrap(), None);
        sensor.set_humidity_oversampling(Oversampling::X2).unwrap();
        sensor.destroy().done();
    }

    #[test]
    fn filter_coefficient_sleeps_then_restores_mode() {
        let mut sensor = connect(
            ChipVariant::Bmp280,
            &[
                // current mode: normal
                read(0xF4, 0b0010_0111),
                // sleep
                read(0xF4, 0b0010_0111),
                write(0xF4, 0b0010_0100),
                // filter
                read(0xF5, 0b1010_0001),
                write(0xF5, 0b1011_0001),
                // restore normal
                read(0xF4, 0b0010_0100),
                write(0xF4, 0b0010_0111),
                read(0xF5, 0b1011_0001),
            ],
        );
        sensor.set_filter_coefficient(FilterCoefficient::X16).unwrap();
        assert_eq!(sensor.filter_coefficient().unwrap(), FilterCoefficient::X16);
        sensor.destroy().done();
    }

    #[test]
    fn measurement_interval_per_variant() {
        let mut sensor = connect(
            ChipVariant::Bme280,
            &[
                read(0xF5, 0b0000_0100),
                write(0xF5, 0b1100_0100),
                read(0xF5, 0b1100_0100),
            ],
        );
        sensor.set_measurement_interval(MeasurementInterval::Ms10).unwrap();
        assert_eq!(sensor.measurement_interval().unwrap(), MeasurementInterval::Ms10);
        assert!(matches!(
            sensor.set_measurement_interval(MeasurementInterval::Ms2000),
            Err(Error::UnsupportedInterval(MeasurementInterval::Ms2000))
        ));
        sensor.destroy().done();
    }

    #[test]
    fn configure_writes_ctrl_meas_last() {
        let mut sensor = connect(
            ChipVariant::Bme280,
            &[
                read(0xF4, 0b0000_0011),
                write(0xF4, 0b0000_0000),
                read(0xF2, 0b0000_0000),
                write(0xF2, 0b0000_0101),
                read(0xF5, 0b0000_0001),
                write(0xF5, 0b1000_1001),
                read(0xF4, 0b0000_0000),
                write(0xF4, 0b0100_1011),
            ],
        );
        sensor
            .configure(Config {
                temperature_oversampling: Oversampling::X2,
                pressure_oversampling: Oversampling::X2,
                humidity_oversampling: Oversampling::X16,
                filter_coefficient: FilterCoefficient::X4,
                measurement_interval: MeasurementInterval::Ms500,
                mode: Mode::Normal,
            })
            .unwrap();
        sensor.destroy().done();
    }

    #[test]
    fn unique_id() {
        let mut sensor = connect(
            ChipVariant::Bmp280,
            &[Transaction::write_read(
                ADDR,
                vec![0x83],
                vec![0xAA, 0xBB, 0xCC, 0xDD],
            )],
        );
        assert_eq!(sensor.unique_id().unwrap(), 0xCCDD_BBAA);
        sensor.destroy().done();
    }

    #[test]
    fn autodetect_fixed_address_tries_both_variants() {
        let mut i2c = I2cMock::new(&[chip_id(0x77, 0x61), chip_id(0x77, 0x60)]);
        let sensor = autodetect(&mut i2c, Some(0x77)).unwrap();
        assert_eq!(sensor.variant(), ChipVariant::Bme280);
        assert_eq!(sensor.address(), 0x77);
        drop(sensor);
        i2c.done();
    }

    #[test]
    fn autodetect_stops_at_first_match() {
        let mut i2c = I2cMock::new(&[chip_id(ADDR, 0x58)]);
        let sensor = autodetect(&mut i2c, None).unwrap();
        assert_eq!(sensor.variant(), ChipVariant::Bmp280);
        assert_eq!(sensor.address(), ADDR);
        drop(sensor);
        i2c.done();
    }

    #[test]
    fn autodetect_unsupported_does_not_try_alternate_address() {
        let mut i2c = I2cMock::new(&[chip_id(ADDR, 0x55), chip_id(ADDR, 0x55)]);
        let result = autodetect(&mut i2c, None);
        assert!(matches!(result, Err(Error::UnsupportedDevice(0x76))));
        i2c.done();
    }
}
