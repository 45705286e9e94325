//! Reads a real sensor through an MCP2221 USB-to-I2C bridge.
//!
//! Run with `cargo test --test mcp2221 -- --ignored` with the bridge
//! attached and a BMP280 or BME280 on its I2C bus.
use bmx280::blocking::autodetect;
use bmx280::common::{FilterCoefficient, Oversampling};
use embedded_hal_mock::eh1::delay::StdSleep;
use mcp2221_hal::MCP2221;

fn report(e: impl core::fmt::Debug) -> anyhow::Error {
    anyhow::anyhow!("{e:?}")
}

#[test]
#[ignore = "requires an MCP2221 with a sensor attached"]
fn mcp() -> anyhow::Result<()> {
    let device = MCP2221::connect().map_err(report)?;
    let mut sensor = autodetect(device, None).map_err(report)?;
    println!("Found {:?} at {:#04x}", sensor.variant(), sensor.address());

    let unique_id = sensor.unique_id().map_err(report)?;
    println!("Unique id: {unique_id:#010x}");

    sensor.set_temperature_oversampling(Oversampling::X2).map_err(report)?;
    sensor.set_pressure_oversampling(Oversampling::X16).map_err(report)?;
    sensor.set_humidity_oversampling(Oversampling::X1).map_err(report)?;
    sensor.set_filter_coefficient(FilterCoefficient::X4).map_err(report)?;

    sensor.update(StdSleep::new()).map_err(report)?;
    let measurement = sensor.measurement().map_err(report)?;
    println!("{measurement}");

    Ok(())
}
