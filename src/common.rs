use embedded_hal::i2c::SevenBitAddress;

use crate::calibration::{BME280_CALIBRATION_LEN, BMP280_CALIBRATION_LEN};
use crate::error::Error;

/// Address used when the SDO pin is pulled to ground.
pub const DEFAULT_ADDRESS: SevenBitAddress = 0x76;
/// Address used when the SDO pin is pulled to VDDIO.
pub const ALTERNATE_ADDRESS: SevenBitAddress = 0x77;

/// Register map shared by the BMP280 and BME280.
///
/// See section 5.3 of the BMP280 datasheet and 5.4 of the BME280 datasheet.
pub(crate) mod register {
    pub const UNIQUE_ID: u8 = 0x83;
    pub const CALIBRATION: u8 = 0x88;
    pub const CHIP_ID: u8 = 0xD0;
    pub const RESET: u8 = 0xE0;
    pub const HUMIDITY_CALIBRATION: u8 = 0xE1;
    pub const CTRL_HUM: u8 = 0xF2;
    pub const STATUS: u8 = 0xF3;
    pub const CTRL_MEAS: u8 = 0xF4;
    pub const CONFIG: u8 = 0xF5;
    pub const DATA: u8 = 0xF7;
}

/// Bit-field masks within the registers above.
pub(crate) mod mask {
    pub const MODE: u8 = 0b0000_0011;
    pub const PRESSURE_OVERSAMPLING: u8 = 0b0001_1100;
    pub const TEMPERATURE_OVERSAMPLING: u8 = 0b1110_0000;
    pub const HUMIDITY_OVERSAMPLING: u8 = 0b0000_0111;
    pub const FILTER: u8 = 0b0001_1100;
    pub const MEASUREMENT_INTERVAL: u8 = 0b1110_0000;
    pub const STATUS: u8 = 0b0000_1001;
}

pub(crate) const SOFT_RESET_COMMAND: u8 = 0xB6;

/// Delay between polls of the status register while waiting for a forced
/// measurement to complete.
pub(crate) const STATUS_POLL_INTERVAL_US: u32 = 100;

/// Invert an 8-bit register mask.
pub const fn invert_mask(mask: u8) -> u8 {
    0xFF - mask
}

/// Replace the bits of `current` covered by `mask` with those of `value`,
/// leaving all other bits untouched.
pub(crate) const fn merge_bits(current: u8, mask: u8, value: u8) -> u8 {
    (current & invert_mask(mask)) | (value & mask)
}

/// The two supported chips.
///
/// The BME280 is register-compatible with the BMP280, adding a humidity
/// channel with its own calibration block and oversampling register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChipVariant {
    /// Pressure and temperature.
    Bmp280,
    /// Pressure, temperature and humidity.
    Bme280,
}

impl ChipVariant {
    /// Order in which variants are tried during autodetection.
    pub(crate) const PROBE_ORDER: [ChipVariant; 2] = [ChipVariant::Bmp280, ChipVariant::Bme280];

    /// Value of the chip identity register (0xD0) for this variant.
    pub const fn chip_id(self) -> u8 {
        match self {
            ChipVariant::Bmp280 => 0x58,
            ChipVariant::Bme280 => 0x60,
        }
    }

    pub const fn has_humidity(self) -> bool {
        matches!(self, ChipVariant::Bme280)
    }

    /// Number of bytes read from the data registers starting at 0xF7.
    pub(crate) const fn data_len(self) -> usize {
        match self {
            ChipVariant::Bmp280 => 6,
            ChipVariant::Bme280 => 8,
        }
    }

    /// Number of calibration bytes read from 0x88, before any humidity block.
    pub(crate) const fn calibration_len(self) -> usize {
        match self {
            ChipVariant::Bmp280 => BMP280_CALIBRATION_LEN,
            ChipVariant::Bme280 => BME280_CALIBRATION_LEN - HUMIDITY_CALIBRATION_LEN,
        }
    }

    /// Check a chip identity byte against this variant.
    pub(crate) fn check_identity<E>(self, found: u8) -> Result<(), Error<E>>
    where
        E: embedded_hal::i2c::Error,
    {
        if found == self.chip_id() {
            Ok(())
        } else {
            Err(Error::IncorrectDeviceIdentity {
                expected: self.chip_id(),
                found,
            })
        }
    }
}

/// Length of the BME280 humidity calibration block at 0xE1.
pub(crate) const HUMIDITY_CALIBRATION_LEN: usize = 7;

/// Sensor power mode.
///
/// - `Sleep`: no measurements are performed.
/// - `Forced`: a single measurement is taken, after which the sensor
///   returns to sleep by itself.
/// - `Normal`: the sensor cycles between measurement and standby, with the
///   standby period set by the [`MeasurementInterval`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    Sleep,
    Forced,
    Normal,
}

impl Mode {
    pub(crate) const fn bits(self) -> u8 {
        match self {
            Mode::Sleep => 0b00,
            Mode::Forced => 0b01,
            Mode::Normal => 0b11,
        }
    }

    /// Both `01` and `10` select forced mode (datasheet table 10).
    pub(crate) const fn from_bits(bits: u8) -> Self {
        match bits & mask::MODE {
            0b00 => Mode::Sleep,
            0b11 => Mode::Normal,
            _ => Mode::Forced,
        }
    }
}

/// Number of ADC samples averaged per reported value.
///
/// Higher oversampling reduces noise at the cost of measurement time and
/// current draw. `Skipped` disables the channel, in which case the sensor
/// reports the "no reading" sentinel for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Oversampling {
    Skipped,
    X1,
    X2,
    X4,
    X8,
    X16,
}

impl Oversampling {
    pub(crate) const fn bits(self) -> u8 {
        match self {
            Oversampling::Skipped => 0b000,
            Oversampling::X1 => 0b001,
            Oversampling::X2 => 0b010,
            Oversampling::X4 => 0b011,
            Oversampling::X8 => 0b100,
            Oversampling::X16 => 0b101,
        }
    }

    /// Codes `101`, `110` and `111` all select ×16.
    pub(crate) const fn from_bits(bits: u8) -> Self {
        match bits & 0b111 {
            0b000 => Oversampling::Skipped,
            0b001 => Oversampling::X1,
            0b010 => Oversampling::X2,
            0b011 => Oversampling::X4,
            0b100 => Oversampling::X8,
            _ => Oversampling::X16,
        }
    }
}

/// IIR filter coefficient applied to pressure and temperature readings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FilterCoefficient {
    Off,
    X2,
    X4,
    X8,
    X16,
}

impl FilterCoefficient {
    pub(crate) const fn bits(self) -> u8 {
        match self {
            FilterCoefficient::Off => 0b000,
            FilterCoefficient::X2 => 0b001,
            FilterCoefficient::X4 => 0b010,
            FilterCoefficient::X8 => 0b011,
            FilterCoefficient::X16 => 0b100,
        }
    }

    /// Codes `100` and above all select a coefficient of 16.
    pub(crate) const fn from_bits(bits: u8) -> Self {
        match bits & 0b111 {
            0b000 => FilterCoefficient::Off,
            0b001 => FilterCoefficient::X2,
            0b010 => FilterCoefficient::X4,
            0b011 => FilterCoefficient::X8,
            _ => FilterCoefficient::X16,
        }
    }
}

/// Standby time between measurements in normal mode.
///
/// The two chips share the `t_sb` field at bits 5–7 of the config register
/// but assign different durations to its codes: the BMP280 offers 2 s and
/// 4 s where the BME280 offers 10 ms and 20 ms. Setting an interval the
/// chip does not offer fails with [`Error::UnsupportedInterval`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MeasurementInterval {
    Ms0_5,
    /// BME280 only.
    Ms10,
    /// BME280 only.
    Ms20,
    Ms62_5,
    Ms125,
    Ms250,
    Ms500,
    Ms1000,
    /// BMP280 only.
    Ms2000,
    /// BMP280 only.
    Ms4000,
}

impl MeasurementInterval {
    pub(crate) const fn bits(self, variant: ChipVariant) -> Option<u8> {
        use ChipVariant::{Bme280, Bmp280};
        use MeasurementInterval::*;

        match (self, variant) {
            (Ms0_5, _) => Some(0b000),
            (Ms62_5, _) => Some(0b001),
            (Ms125, _) => Some(0b010),
            (Ms250, _) => Some(0b011),
            (Ms500, _) => Some(0b100),
            (Ms1000, _) => Some(0b101),
            (Ms2000, Bmp280) => Some(0b110),
            (Ms4000, Bmp280) => Some(0b111),
            (Ms10, Bme280) => Some(0b110),
            (Ms20, Bme280) => Some(0b111),
            (Ms2000 | Ms4000, Bme280) | (Ms10 | Ms20, Bmp280) => None,
        }
    }

    pub(crate) const fn from_bits(bits: u8, variant: ChipVariant) -> Self {
        use MeasurementInterval::*;

        match (bits & 0b111, variant) {
            (0b000, _) => Ms0_5,
            (0b001, _) => Ms62_5,
            (0b010, _) => Ms125,
            (0b011, _) => Ms250,
            (0b100, _) => Ms500,
            (0b101, _) => Ms1000,
            (0b110, ChipVariant::Bmp280) => Ms2000,
            (_, ChipVariant::Bmp280) => Ms4000,
            (0b110, ChipVariant::Bme280) => Ms10,
            (_, ChipVariant::Bme280) => Ms20,
        }
    }
}

/// Device activity, as reported by the status register (0xF3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Status {
    Idle,
    /// Calibration data is being copied from NVM to the image registers.
    CopyingNvm,
    /// A conversion is running. Takes priority over `CopyingNvm` when both
    /// bits are set.
    Measuring,
}

impl Status {
    pub(crate) const fn from_bits(bits: u8) -> Self {
        const MEASURING: u8 = 0b1000;
        const IM_UPDATE: u8 = 0b0001;

        if bits & MEASURING != 0 {
            Status::Measuring
        } else if bits & IM_UPDATE != 0 {
            Status::CopyingNvm
        } else {
            Status::Idle
        }
    }
}

/// Settings applied together by `configure`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    pub temperature_oversampling: Oversampling,
    pub pressure_oversampling: Oversampling,
    /// Ignored on the BMP280.
    pub humidity_oversampling: Oversampling,
    pub filter_coefficient: FilterCoefficient,
    pub measurement_interval: MeasurementInterval,
    pub mode: Mode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            temperature_oversampling: Oversampling::X1,
            pressure_oversampling: Oversampling::X1,
            humidity_oversampling: Oversampling::X1,
            filter_coefficient: FilterCoefficient::Off,
            measurement_interval: MeasurementInterval::Ms0_5,
            mode: Mode::Sleep,
        }
    }
}

/// Uncompensated ADC values read from the data registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RawReading {
    pub pressure: u32,
    pub temperature: u32,
    pub humidity: Option<u16>,
}

impl RawReading {
    /// Decode the burst read from 0xF7.
    ///
    /// Pressure and temperature are 20-bit values stored MSB first across
    /// three bytes, the lowest nibble of the XLSB byte being unused. The
    /// BME280 appends a 16-bit humidity value.
    pub(crate) fn from_read_bytes(bytes: &[u8]) -> Self {
        let twenty_bit = |b: &[u8]| u32::from_be_bytes([0, b[0], b[1], b[2]]) >> 4;
        Self {
            pressure: twenty_bit(&bytes[0..3]),
            temperature: twenty_bit(&bytes[3..6]),
            humidity: match bytes {
                [_, _, _, _, _, _, h0, h1] => Some(u16::from_be_bytes([*h0, *h1])),
                _ => None,
            },
        }
    }
}

/// Combine the four bytes read from 0x83 into the sensor's unique id.
pub(crate) fn unique_id_from_read_bytes(bytes: [u8; 4]) -> u32 {
    let [b0, b1, b2, b3] = bytes.map(u32::from);
    b0 + (b1 << 8) + (((b3 + (b2 << 8)) & 0x7FFFF) << 16)
}

/// Compensated readings from a single burst read of the data registers.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Measurement {
    /// Temperature in °C, or `None` if the channel was skipped.
    pub temperature: Option<f64>,
    /// Pressure as produced by the datasheet's floating-point compensation
    /// formula, or `None` if the channel was skipped.
    pub pressure: Option<f64>,
    /// Relative humidity in %H, clamped to `[0, 100]`. Always `None` on the
    /// BMP280.
    pub humidity: Option<f64>,
}

impl Measurement {
    /// Absolute humidity in g/m³, if both temperature and humidity are present.
    pub fn absolute_humidity(&self) -> Option<f64> {
        match (self.temperature, self.humidity) {
            (Some(t), Some(h)) => Some(crate::conversions::absolute_humidity(t, h)),
            _ => None,
        }
    }
}

impl core::fmt::Display for Measurement {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut separator = "";
        if let Some(t) = self.temperature {
            write!(f, "{t:.2}°C")?;
            separator = ", ";
        }
        if let Some(p) = self.pressure {
            write!(f, "{separator}{p:.2}hPa")?;
            separator = ", ";
        }
        if let Some(h) = self.humidity {
            write!(f, "{separator}{h:.2}%H")?;
            if let Some(ah) = self.absolute_humidity() {
                write!(f, ", {ah:.2} g/m3")?;
            }
        }
        Ok(())
    }
}

/// Tracks the outcome of probing each chip variant at one address.
#[derive(Default)]
pub(crate) struct ProbeRecord {
    responded: bool,
}

impl ProbeRecord {
    /// Note a failed identification attempt. Returns the error back if it is
    /// one that should abort autodetection rather than move on.
    pub(crate) fn record<E>(&mut self, error: Error<E>) -> Result<(), Error<E>>
    where
        E: embedded_hal::i2c::Error,
    {
        match error {
            Error::I2c(_) => Ok(()),
            Error::IncorrectDeviceIdentity { .. } => {
                self.responded = true;
                Ok(())
            }
            other => Err(other),
        }
    }

    /// The error to report once every variant has been tried.
    pub(crate) fn exhausted<E>(self, address: SevenBitAddress) -> Error<E>
    where
        E: embedded_hal::i2c::Error,
    {
        if self.responded {
            Error::UnsupportedDevice(address)
        } else {
            Error::NoDeviceFound(Some(address))
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use embedded_hal::i2c::ErrorKind;

    #[test]
    fn invert_mask_examples() {
        assert_eq!(invert_mask(0b1111_0000), 0b0000_1111);
        assert_eq!(invert_mask(0b1111_1111), 0b0000_0000);
        assert_eq!(invert_mask(0b1010_1010), 0b0101_0101);
    }

    #[test]
    fn invert_mask_is_an_involution() {
        for m in 0..=u8::MAX {
            assert_eq!(invert_mask(invert_mask(m)), m);
        }
    }

    #[test]
    fn merge_bits_preserves_untouched_bits() {
        assert_eq!(merge_bits(0b1010_1010, 0b0001_1100, 0b0001_0100), 0b1011_0110);
        // Value bits outside the mask are discarded.
        assert_eq!(merge_bits(0b0000_0000, 0b0000_0011, 0b1111_1111), 0b0000_0011);
    }

    #[test]
    fn status_measuring_overrides_copying() {
        assert_eq!(Status::from_bits(0b0000), Status::Idle);
        assert_eq!(Status::from_bits(0b0001), Status::CopyingNvm);
        assert_eq!(Status::from_bits(0b1000), Status::Measuring);
        assert_eq!(Status::from_bits(0b1001), Status::Measuring);
    }

    #[test]
    fn mode_codes() {
        assert_eq!(Mode::from_bits(0b00), Mode::Sleep);
        assert_eq!(Mode::from_bits(0b01), Mode::Forced);
        assert_eq!(Mode::from_bits(0b10), Mode::Forced);
        assert_eq!(Mode::from_bits(0b11), Mode::Normal);
        assert_eq!(Mode::Normal.bits(), 0b11);
    }

    #[test]
    fn measurement_interval_codes_depend_on_variant() {
        use ChipVariant::{Bme280, Bmp280};

        assert_eq!(MeasurementInterval::from_bits(0b110, Bmp280), MeasurementInterval::Ms2000);
        assert_eq!(MeasurementInterval::from_bits(0b110, Bme280), MeasurementInterval::Ms10);
        assert_eq!(MeasurementInterval::from_bits(0b111, Bme280), MeasurementInterval::Ms20);
        assert_eq!(MeasurementInterval::Ms4000.bits(Bmp280), Some(0b111));
        assert_eq!(MeasurementInterval::Ms4000.bits(Bme280), None);
        assert_eq!(MeasurementInterval::Ms10.bits(Bmp280), None);
        assert_eq!(MeasurementInterval::Ms500.bits(Bme280), Some(0b100));
    }

    #[test]
    fn raw_reading_bmp280() {
        let raw = RawReading::from_read_bytes(&[79, 202, 0, 129, 50, 112]);
        assert_eq!(raw.pressure, 326816);
        assert_eq!(raw.temperature, 529191);
        assert_eq!(raw.humidity, None);
    }

    #[test]
    fn raw_reading_bme280() {
        let raw = RawReading::from_read_bytes(&[0x80, 0x00, 0x00, 0x80, 0x00, 0x0F, 118, 73]);
        assert_eq!(raw.pressure, 0x80000);
        // The unused low nibble is discarded.
        assert_eq!(raw.temperature, 0x80000);
        assert_eq!(raw.humidity, Some(30281));
    }

    #[test]
    fn unique_id() {
        assert_eq!(unique_id_from_read_bytes([0x01, 0x02, 0x00, 0x03]), 0x0003_0201);
        assert_eq!(unique_id_from_read_bytes([0xAA, 0xBB, 0xCC, 0xDD]), 0xCCDD_BBAA);
    }

    #[test]
    fn identity_check() {
        assert_eq!(ChipVariant::Bme280.check_identity::<ErrorKind>(0x60), Ok(()));
        assert_eq!(
            ChipVariant::Bmp280.check_identity::<ErrorKind>(0x60),
            Err(Error::IncorrectDeviceIdentity {
                expected: 0x58,
                found: 0x60
            })
        );
    }

    #[test]
    fn probe_record_classification() {
        let mut record = ProbeRecord::default();
        assert_eq!(record.record(Error::I2c(ErrorKind::Other)), Ok(()));
        assert_eq!(record.exhausted::<ErrorKind>(0x76), Error::NoDeviceFound(Some(0x76)));

        let mut record = ProbeRecord::default();
        let mismatch = Error::<ErrorKind>::IncorrectDeviceIdentity {
            expected: 0x58,
            found: 0x61,
        };
        assert_eq!(record.record(mismatch), Ok(()));
        assert_eq!(record.exhausted::<ErrorKind>(0x77), Error::UnsupportedDevice(0x77));
    }

    #[test]
    fn absolute_humidity_requires_both_inputs() {
        let m = Measurement {
            temperature: Some(25.0),
            pressure: None,
            humidity: None,
        };
        assert_eq!(m.absolute_humidity(), None);
        let m = Measurement {
            humidity: Some(50.0),
            ..m
        };
        let ah = m.absolute_humidity().unwrap();
        assert!((ah - 11.51276).abs() < 1e-4);
    }
}
