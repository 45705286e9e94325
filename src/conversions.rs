//! Derived quantities computed from compensated readings.
//!
//! These are used by [`Measurement::absolute_humidity`] but are provided
//! here should you want to apply them to values from elsewhere.
//!
//! [`Measurement::absolute_humidity`]: crate::common::Measurement::absolute_humidity

/// Absolute humidity in g/m³ from temperature in °C and relative humidity
/// in %H.
///
/// Uses the Magnus approximation of saturation vapour pressure, which is
/// accurate to within 0.1% between −30°C and 35°C.
pub fn absolute_humidity(celsius: f64, relative_humidity: f64) -> f64 {
    13.2471 * relative_humidity * libm::exp((17.67 * celsius) / (243.5 + celsius))
        / (273.15 + celsius)
}
