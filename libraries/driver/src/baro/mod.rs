// Bosch barometric sensors on the Linux I2C bus
//
// Both drivers follow the same cycle on every call:
// 1. Read the chip ID (logged, not verified)
// 2. Read the factory calibration block, nothing is cached between calls
// 3. Start a forced conversion and wait for it
// 4. Burst-read the raw ADC counts and apply the datasheet compensation

pub mod bme280;
pub mod bmp180;

pub use self::bme280::{read_bme280, read_bme280_on, Bme280, Bme280Calibration, Bme280Config};
pub use self::bmp180::{read_bmp180, read_bmp180_on, Bmp180, Bmp180Calibration, Bmp180Config, Oversampling};
