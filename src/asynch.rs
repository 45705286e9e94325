use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::{I2c, SevenBitAddress};

use crate::calibration::{BME280_CALIBRATION_LEN, BMP280_CALIBRATION_LEN, Calibration};
use crate::common::{
    ALTERNATE_ADDRESS, ChipVariant, Config, DEFAULT_ADDRESS, FilterCoefficient, Measurement,
    MeasurementInterval, Mode, Oversampling, ProbeRecord, RawReading, SOFT_RESET_COMMAND,
    STATUS_POLL_INTERVAL_US, Status, mask, merge_bits, register, unique_id_from_read_bytes,
};
use crate::compensation::Compensator;
use crate::error::Error;

/// Async counterpart of [`crate::blocking::Bmx280`].
pub struct Bmx280<I: I2c> {
    i2c: I,
    address: SevenBitAddress,
    variant: ChipVariant,
    compensator: Option<Compensator>,
}

impl<I: I2c> Bmx280<I> {
    pub async fn new(
        mut i2c: I,
        variant: ChipVariant,
        address: SevenBitAddress,
    ) -> Result<Self, Error<I::Error>> {
        identify(&mut i2c, address, variant).await?;
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

    pub async fn chip_id(&mut self) -> Result<u8, Error<I::Error>> {
        self.read_byte(register::CHIP_ID).await
    }

    pub async fn unique_id(&mut self) -> Result<u32, Error<I::Error>> {
        let mut buffer = [0u8; 4];
        self.read_register(register::UNIQUE_ID, &mut buffer).await?;
        Ok(unique_id_from_read_bytes(buffer))
    }

    pub async fn calibration(&mut self) -> Result<&Calibration, Error<I::Error>> {
        Ok(self.compensator().await?.calibration())
    }

    pub fn invalidate_calibration(&mut self) {
        self.compensator = None;
    }

    pub async fn mode(&mut self) -> Result<Mode, Error<I::Error>> {
        let bits = self.read_bits(register::CTRL_MEAS, mask::MODE).await?;
        Ok(Mode::from_bits(bits))
    }

    pub async fn set_mode(&mut self, mode: Mode) -> Result<(), Error<I::Error>> {
        #[cfg(feature = "defmt")]
        defmt::trace!("{=u8:#x}: mode -> {}", self.address, mode);
        self.write_bits(register::CTRL_MEAS, mask::MODE, mode.bits())
            .await
    }

    /// Take a single measurement in forced mode, waiting until it is done.
    ///
    /// As with the blocking driver there is no timeout.
    pub async fn update(&mut self, mut delay: impl DelayNs) -> Result<(), Error<I::Error>> {
        self.set_mode(Mode::Forced).await?;
        while self.status().await? == Status::Measuring {
            delay.delay_us(STATUS_POLL_INTERVAL_US).await;
        }
        Ok(())
    }

    pub async fn enable(&mut self) -> Result<(), Error<I::Error>> {
        self.set_mode(Mode::Normal).await
    }

    pub async fn pause(&mut self) -> Result<(), Error<I::Error>> {
        self.set_mode(Mode::Sleep).await
    }

    pub async fn reset(&mut self, mut delay: impl DelayNs) -> Result<(), Error<I::Error>> {
        self.i2c
            .write(self.address, &[register::RESET, SOFT_RESET_COMMAND])
            .await?;
        self.invalidate_calibration();
        delay.delay_ms(2).await;
        Ok(())
    }

    pub async fn status(&mut self) -> Result<Status, Error<I::Error>> {
        let bits = self.read_bits(register::STATUS, mask::STATUS).await?;
        Ok(Status::from_bits(bits))
    }

    pub async fn temperature_oversampling(&mut self) -> Result<Oversampling, Error<I::Error>> {
        let bits = self
            .read_bits(register::CTRL_MEAS, mask::TEMPERATURE_OVERSAMPLING)
            .await?;
        Ok(Oversampling::from_bits(bits >> 5))
    }

    pub async fn set_temperature_oversampling(
        &mut self,
        oversampling: Oversampling,
    ) -> Result<(), Error<I::Error>> {
        self.write_bits(
            register::CTRL_MEAS,
            mask::TEMPERATURE_OVERSAMPLING,
            oversampling.bits() << 5,
        )
        .await
    }

    pub async fn pressure_oversampling(&mut self) -> Result<Oversampling, Error<I::Error>> {
        let bits = self
            .read_bits(register::CTRL_MEAS, mask::PRESSURE_OVERSAMPLING)
            .await?;
        Ok(Oversampling::from_bits(bits >> 2))
    }

    pub async fn set_pressure_oversampling(
        &mut self,
        oversampling: Oversampling,
    ) -> Result<(), Error<I::Error>> {
        self.write_bits(
            register::CTRL_MEAS,
            mask::PRESSURE_OVERSAMPLING,
            oversampling.bits() << 2,
        )
        .await
    }

    pub async fn humidity_oversampling(
        &mut self,
    ) -> Result<Option<Oversampling>, Error<I::Error>> {
        if !self.variant.has_humidity() {
            return Ok(None);
        }
        let bits = self
            .read_bits(register::CTRL_HUM, mask::HUMIDITY_OVERSAMPLING)
            .await?;
        Ok(Some(Oversampling::from_bits(bits)))
    }

    /// See [`crate::blocking::Bmx280::set_humidity_oversampling`].
    pub async fn set_humidity_oversampling(
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
        )
        .await?;
        let ctrl_meas = self.read_byte(register::CTRL_MEAS).await?;
        self.i2c
            .write(self.address, &[register::CTRL_MEAS, ctrl_meas])
            .await?;
        Ok(())
    }

    pub async fn filter_coefficient(&mut self) -> Result<FilterCoefficient, Error<I::Error>> {
        let bits = self.read_bits(register::CONFIG, mask::FILTER).await?;
        Ok(FilterCoefficient::from_bits(bits >> 2))
    }

    /// See [`crate::blocking::Bmx280::set_filter_coefficient`].
    pub async fn set_filter_coefficient(
        &mut self,
        filter: FilterCoefficient,
    ) -> Result<(), Error<I::Error>> {
        let mode = self.mode().await?;
        self.pause().await?;
        self.write_bits(register::CONFIG, mask::FILTER, filter.bits() << 2)
            .await?;
        self.set_mode(mode).await
    }

    pub async fn measurement_interval(
        &mut self,
    ) -> Result<MeasurementInterval, Error<I::Error>> {
        let bits = self
            .read_bits(register::CONFIG, mask::MEASUREMENT_INTERVAL)
            .await?;
        Ok(MeasurementInterval::from_bits(bits >> 5, self.variant))
    }

    pub async fn set_measurement_interval(
        &mut self,
        interval: MeasurementInterval,
    ) -> Result<(), Error<I::Error>> {
        let bits = interval
            .bits(self.variant)
            .ok_or(Error::UnsupportedInterval(interval))?;
        self.write_bits(register::CONFIG, mask::MEASUREMENT_INTERVAL, bits << 5)
            .await
    }

    /// See [`crate::blocking::Bmx280::configure`].
    pub async fn configure(&mut self, config: Config) -> Result<(), Error<I::Error>> {
        let interval = config
            .measurement_interval
            .bits(self.variant)
            .ok_or(Error::UnsupportedInterval(config.measurement_interval))?;

        self.pause().await?;
        if self.variant.has_humidity() {
            self.write_bits(
                register::CTRL_HUM,
                mask::HUMIDITY_OVERSAMPLING,
                config.humidity_oversampling.bits(),
            )
            .await?;
        }
        self.write_bits(
            register::CONFIG,
            mask::FILTER | mask::MEASUREMENT_INTERVAL,
            config.filter_coefficient.bits() << 2 | interval << 5,
        )
        .await?;
        self.write_bits(
            register::CTRL_MEAS,
            mask::TEMPERATURE_OVERSAMPLING | mask::PRESSURE_OVERSAMPLING | mask::MODE,
            config.temperature_oversampling.bits() << 5
                | config.pressure_oversampling.bits() << 2
                | config.mode.bits(),
        )
        .await
    }

    pub async fn measurement(&mut self) -> Result<Measurement, Error<I::Error>> {
        let mut buffer = [0u8; 8];
        let data = &mut buffer[..self.variant.data_len()];
        self.read_register(register::DATA, data).await?;
        let raw = RawReading::from_read_bytes(data);

        let compensator = self.compensator().await?;
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

    pub async fn temperature(&mut self) -> Result<Option<f64>, Error<I::Error>> {
        Ok(self.measurement().await?.temperature)
    }

    /// Compensated pressure, as returned by the datasheet's formula.
    pub async fn pressure(&mut self) -> Result<Option<f64>, Error<I::Error>> {
        Ok(self.measurement().await?.pressure)
    }

    pub async fn humidity(&mut self) -> Result<Option<f64>, Error<I::Error>> {
        Ok(self.measurement().await?.humidity)
    }

    pub async fn absolute_humidity(&mut self) -> Result<Option<f64>, Error<I::Error>> {
        Ok(self.measurement().await?.absolute_humidity())
    }

    async fn compensator(&mut self) -> Result<&mut Compensator, Error<I::Error>> {
        let compensator = match self.compensator.take() {
            Some(compensator) => compensator,
            None => Compensator::new(self.read_calibration().await?),
        };
        Ok(self.compensator.insert(compensator))
    }

    async fn read_calibration(&mut self) -> Result<Calibration, Error<I::Error>> {
        match self.variant {
            ChipVariant::Bmp280 => {
                let mut buffer = [0u8; BMP280_CALIBRATION_LEN];
                self.read_register(register::CALIBRATION, &mut buffer)
                    .await?;
                Ok(Calibration::from_bmp280_bytes(&buffer))
            }
            ChipVariant::Bme280 => {
                let mut buffer = [0u8; BME280_CALIBRATION_LEN];
                let (nvm, humidity) = buffer.split_at_mut(self.variant.calibration_len());
                self.read_register(register::CALIBRATION, nvm).await?;
                self.read_register(register::HUMIDITY_CALIBRATION, humidity)
                    .await?;
                Ok(Calibration::from_bme280_bytes(&buffer))
            }
        }
    }

    async fn read_register(
        &mut self,
        register: u8,
        buffer: &mut [u8],
    ) -> Result<(), Error<I::Error>> {
        self.i2c
            .write_read(self.address, &[register], buffer)
            .await?;
        Ok(())
    }

    async fn read_byte(&mut self, register: u8) -> Result<u8, Error<I::Error>> {
        let mut buffer = [0u8];
        self.read_register(register, &mut buffer).await?;
        Ok(buffer[0])
    }

    async fn read_bits(&mut self, register: u8, mask: u8) -> Result<u8, Error<I::Error>> {
        Ok(self.read_byte(register).await? & mask)
    }

    async fn write_bits(
        &mut self,
        register: u8,
        mask: u8,
        value: u8,
    ) -> Result<(), Error<I::Error>> {
        let current = self.read_byte(register).await?;
        self.i2c
            .write(self.address, &[register, merge_bits(current, mask, value)])
            .await?;
        Ok(())
    }
}

/// Async counterpart of [`crate::blocking::autodetect`].
pub async fn autodetect<I: I2c>(
    mut i2c: I,
    address: Option<SevenBitAddress>,
) -> Result<Bmx280<I>, Error<I::Error>> {
    let (address, variant) = match address {
        Some(address) => (address, probe(&mut i2c, address).await?),
        None => probe_standard_addresses(&mut i2c).await?,
    };
    Ok(Bmx280::new_unchecked(i2c, variant, address))
}

async fn probe_standard_addresses<I: I2c>(
    i2c: &mut I,
) -> Result<(SevenBitAddress, ChipVariant), Error<I::Error>> {
    for address in [DEFAULT_ADDRESS, ALTERNATE_ADDRESS] {
        match probe(i2c, address).await {
            Ok(variant) => return Ok((address, variant)),
            Err(Error::NoDeviceFound(_)) => continue,
            Err(e) => return Err(e),
        }
    }
    Err(Error::NoDeviceFound(None))
}

async fn probe<I: I2c>(
    i2c: &mut I,
    address: SevenBitAddress,
) -> Result<ChipVariant, Error<I::Error>> {
    let mut record = ProbeRecord::default();
    for variant in ChipVariant::PROBE_ORDER {
        match identify(i2c, address, variant).await {
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

async fn identify<I: I2c>(
    i2c: &mut I,
    address: SevenBitAddress,
    variant: ChipVariant,
) -> Result<(), Error<I::Error>> {
    let mut chip_id = [0u8];
    i2c.write_read(address, &[register::CHIP_ID], &mut chip_id)
        .await?;
    variant.check_identity(chip_id[0])
}
