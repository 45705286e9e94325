//! Factory calibration coefficients stored in the sensor's NVM.
//!
//! Every sensor is individually trimmed at the factory, and the resulting
//! coefficients are needed to turn raw ADC counts into physical values.
//! See section 3.11.2 of the BMP280 datasheet and 4.2.2 of the BME280
//! datasheet for the register layout.

/// Bytes of pressure and temperature coefficients read from 0x88.
pub const BMP280_CALIBRATION_LEN: usize = 24;

/// 25 bytes from 0x88 followed by 7 bytes from 0xE1.
pub const BME280_CALIBRATION_LEN: usize = 32;

/// Pressure and temperature coefficients, plus humidity coefficients for
/// the BME280.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Calibration {
    pub t1: u16,
    pub t2: i16,
    pub t3: i16,
    pub p1: u16,
    pub p2: i16,
    pub p3: i16,
    pub p4: i16,
    pub p5: i16,
    pub p6: i16,
    pub p7: i16,
    pub p8: i16,
    pub p9: i16,
    pub humidity: Option<HumidityCalibration>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HumidityCalibration {
    pub h1: u8,
    pub h2: i16,
    pub h3: u8,
    /// 12-bit signed.
    pub h4: i16,
    /// 12-bit signed.
    pub h5: i16,
    pub h6: i8,
}

impl Calibration {
    /// Parse the 24 bytes read from 0x88 on a BMP280.
    ///
    /// All coefficients are little-endian: `t1` and `p1` unsigned, the
    /// rest signed.
    pub fn from_bmp280_bytes(bytes: &[u8; BMP280_CALIBRATION_LEN]) -> Self {
        let u16_at = |i: usize| u16::from_le_bytes([bytes[i], bytes[i + 1]]);
        let i16_at = |i: usize| i16::from_le_bytes([bytes[i], bytes[i + 1]]);

        Self {
            t1: u16_at(0),
            t2: i16_at(2),
            t3: i16_at(4),
            p1: u16_at(6),
            p2: i16_at(8),
            p3: i16_at(10),
            p4: i16_at(12),
            p5: i16_at(14),
            p6: i16_at(16),
            p7: i16_at(18),
            p8: i16_at(20),
            p9: i16_at(22),
            humidity: None,
        }
    }

    /// Parse the BME280 calibration: 25 bytes from 0x88 concatenated with
    /// 7 bytes from 0xE1.
    ///
    /// The humidity block is laid out as
    ///
    /// | bytes   | content                                  |
    /// |---------|------------------------------------------|
    /// | 24      | `h1`, u8                                 |
    /// | 25–26   | `h2`, i16 little-endian                  |
    /// | 27      | `h3`, u8                                 |
    /// | 28–30   | `h4` and `h5`, two 12-bit signed values  |
    /// | 31      | `h6`, i8                                 |
    ///
    /// `h4` is built from byte 28 shifted up a nibble with the low nibble
    /// of byte 29; `h5` from the high nibble of byte 29 with byte 30
    /// shifted up a nibble.
    pub fn from_bme280_bytes(bytes: &[u8; BME280_CALIBRATION_LEN]) -> Self {
        let mut base = [0u8; BMP280_CALIBRATION_LEN];
        base.copy_from_slice(&bytes[..BMP280_CALIBRATION_LEN]);

        let [x, y, z] = [bytes[28], bytes[29], bytes[30]].map(u16::from);

        Self {
            humidity: Some(HumidityCalibration {
                h1: bytes[24],
                h2: i16::from_le_bytes([bytes[25], bytes[26]]),
                h3: bytes[27],
                h4: sign_extend_12((x << 4) | (y & 0x0F)),
                h5: sign_extend_12((y >> 4) | (z << 4)),
                h6: bytes[31] as i8,
            }),
            ..Self::from_bmp280_bytes(&base)
        }
    }
}

/// Interpret the low 12 bits of `value` as a two's-complement number.
const fn sign_extend_12(value: u16) -> i16 {
    ((value << 4) as i16) >> 4
}
