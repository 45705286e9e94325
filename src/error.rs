use embedded_hal::i2c::SevenBitAddress;

use crate::common::MeasurementInterval;

#[derive(Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<I2cError>
where
    I2cError: embedded_hal::i2c::Error,
{
    /// No device acknowledged at the probed address (or at either of the
    /// standard addresses, when autodetecting without one).
    NoDeviceFound(Option<SevenBitAddress>),
    /// The device answered, but its chip identity byte is not the one
    /// expected for the requested chip variant.
    IncorrectDeviceIdentity { expected: u8, found: u8 },
    /// A device answered during autodetection but matched no known variant.
    UnsupportedDevice(SevenBitAddress),
    /// Pressure or humidity compensation was requested before temperature
    /// compensation established the fine temperature value.
    MissingTemperatureReading,
    /// The measurement interval is not offered by the chip variant.
    UnsupportedInterval(MeasurementInterval),
    I2c(I2cError),
}

impl<I2cError> From<I2cError> for Error<I2cError>
where
    I2cError: embedded_hal::i2c::Error,
{
    fn from(value: I2cError) -> Self {
        Error::I2c(value)
    }
}

impl<I2cError> From<MissingTemperatureReading> for Error<I2cError>
where
    I2cError: embedded_hal::i2c::Error,
{
    fn from(_: MissingTemperatureReading) -> Self {
        Error::MissingTemperatureReading
    }
}

impl<I2cError> core::fmt::Display for Error<I2cError>
where
    I2cError: embedded_hal::i2c::Error,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::NoDeviceFound(Some(address)) => {
                write!(f, "No device was found on address {address:#04x}")
            }
            Error::NoDeviceFound(None) => write!(f, "No device was found on either address"),
            Error::IncorrectDeviceIdentity { expected, found } => write!(
                f,
                "Expected chip identity {expected:#04x} but the device reported {found:#04x}"
            ),
            Error::UnsupportedDevice(address) => {
                write!(f, "The device on address {address:#04x} is unsupported")
            }
            Error::MissingTemperatureReading => write!(f, "{}", MissingTemperatureReading),
            Error::UnsupportedInterval(interval) => {
                write!(f, "Measurement interval {interval:?} is not supported by this chip")
            }
            Error::I2c(e) => write!(f, "Received I2C error: {:?}", e),
        }
    }
}

impl<I> core::error::Error for Error<I> where I: embedded_hal::i2c::Error {}

/// Returned by the compensation routines when pressure or humidity is
/// compensated before any temperature reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MissingTemperatureReading;

impl core::fmt::Display for MissingTemperatureReading {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "A temperature reading is required to compensate pressure or humidity data"
        )
    }
}

impl core::error::Error for MissingTemperatureReading {}
