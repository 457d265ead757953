//! Sensor decoding for a Raspberry Pi weather station.
//!
//! * [`gpio`] maps the SoC GPIO registers for bit-banged protocols
//! * [`dht`] reads DHT11/DHT22/AM2302 humidity sensors over their one-wire protocol
//! * [`baro`] reads Bosch BME280 and BMP180 sensors over I2C
//!
//! All reads are single shot, retry policy belongs to the caller.

pub mod baro;
pub mod dht;
pub mod error;
pub mod gpio;
pub mod i2c;
pub mod timing;

pub use baro::{read_bme280, read_bmp180};
pub use dht::{read_onewire, read_onewire_on, DhtKind};
pub use error::{DhtError, GpioError, I2cError};
