//! Driver for the Bosch BMP280 (pressure, temperature) and BME280 (pressure,
//! temperature, humidity) sensors over I2C.
//!
//! ```rust,ignore
//! let mut sensor = bmx280::blocking::autodetect(i2c, None)?;
//! sensor.update(&mut delay)?;
//! let measurement = sensor.measurement()?;
//! ```
#![no_std]

#[cfg(feature = "async")]
pub mod asynch;
#[cfg(feature = "blocking")]
pub mod blocking;
pub mod calibration;
pub mod common;
pub mod compensation;
pub mod conversions;
pub mod error;
