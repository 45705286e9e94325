//! Conversion of raw ADC readings into physical values.
//!
//! These are the double-precision floating-point formulas from section
//! 8.1 of the BMP280 datasheet and 8.1 of the BME280 datasheet.
//!
//! Pressure and humidity compensation both depend on a "fine temperature"
//! (`t_fine`) that is only produced by temperature compensation, so a
//! [`Compensator`] holds the most recent one. Temperature must be
//! compensated before pressure or humidity, otherwise those calls fail with
//! [`MissingTemperatureReading`].

use crate::calibration::Calibration;
use crate::error::MissingTemperatureReading;

/// The 20-bit pattern reported for a skipped pressure or temperature channel.
pub const NO_READING: u32 = 0x80000;

/// Calibration coefficients together with the fine temperature from the
/// last temperature compensation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Compensator {
    calibration: Calibration,
    t_fine: Option<f64>,
}

impl Compensator {
    pub fn new(calibration: Calibration) -> Self {
        Self {
            calibration,
            t_fine: None,
        }
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    /// Fine temperature from the last successful temperature compensation.
    pub fn t_fine(&self) -> Option<f64> {
        self.t_fine
    }

    /// Forget the stored fine temperature.
    pub fn reset(&mut self) {
        self.t_fine = None;
    }

    /// Compensate a raw temperature reading, returning °C.
    ///
    /// Returns `None` for the [`NO_READING`] sentinel, in which case the
    /// stored fine temperature is left as it was.
    pub fn compensate_temperature(&mut self, raw: u32) -> Option<f64> {
        if raw == NO_READING {
            return None;
        }
        let c = &self.calibration;
        let raw = f64::from(raw);
        let t1 = f64::from(c.t1);

        let var1 = (raw / 16384.0 - t1 / 1024.0) * f64::from(c.t2);
        let var2 = raw / 131072.0 - t1 / 8192.0;
        let var2 = var2 * var2 * f64::from(c.t3);

        let t_fine = var1 + var2;
        self.t_fine = Some(t_fine);
        Some(t_fine / 5120.0)
    }

    /// Compensate a raw pressure reading.
    ///
    /// Returns `Ok(None)` for the [`NO_READING`] sentinel.
    pub fn compensate_pressure(&self, raw: u32) -> Result<Option<f64>, MissingTemperatureReading> {
        let t_fine = self.t_fine.ok_or(MissingTemperatureReading)?;
        if raw == NO_READING {
            return Ok(None);
        }
        let c = &self.calibration;
        let p1 = f64::from(c.p1);
        let [p2, p3, p4, p5, p6, p7, p8, p9] =
            [c.p2, c.p3, c.p4, c.p5, c.p6, c.p7, c.p8, c.p9].map(f64::from);

        let var1 = t_fine / 2.0 - 64000.0;
        let var2 = var1 * var1 * p6 / 32768.0;
        let var2 = var2 + var1 * p5 * 2.0;
        let var2 = var2 / 4.0 + p4 * 65536.0;
        let var1 = (p3 * var1 * var1 / 524288.0 + p2 * var1) / 524288.0;
        let var1 = (1.0 + var1 / 32768.0) * p1;

        let pressure = 1048576.0 - f64::from(raw);
        let pressure = (pressure - var2 / 4096.0) * 6250.0 / var1;
        let var1 = p9 * pressure * pressure / 2147483648.0;
        let var2 = pressure * p8 / 32768.0;
        Ok(Some(pressure + (var1 + var2 + p7) / 16.0))
    }

    /// Compensate a raw humidity reading, returning %H clamped to
    /// `[0, 100]`.
    ///
    /// Returns `Ok(None)` if the calibration has no humidity coefficients,
    /// as is the case for the BMP280.
    pub fn compensate_humidity(&self, raw: u16) -> Result<Option<f64>, MissingTemperatureReading> {
        let t_fine = self.t_fine.ok_or(MissingTemperatureReading)?;
        let Some(h) = self.calibration.humidity else {
            return Ok(None);
        };

        let var1 = t_fine - 76800.0;
        let var2 = f64::from(h.h4) * 64.0 + (f64::from(h.h5) / 16384.0) * var1;
        let var3 = f64::from(raw) - var2;
        let var4 = f64::from(h.h2) / 65536.0;
        let var5 = 1.0 + (f64::from(h.h3) / 67108864.0) * var1;
        let var6 = 1.0 + (f64::from(h.h6) / 67108864.0) * var1 * var5;
        let var6 = var3 * var4 * (var5 * var6);

        let humidity = var6 * (1.0 - f64::from(h.h1) * var6 / 524288.0);
        Ok(Some(humidity.clamp(0.0, 100.0)))
    }
}
