use std::path::Path;

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use hal::{ClimateReading, Sensor};
use log::debug;

use crate::error::I2cError;
use crate::i2c::{open_bus, parse_address, I2cDevice, DEFAULT_I2C_BUS};

// BME280 I2C addresses (depends on SDO pin state)
pub const BME280_I2C_ADDR_PRIMARY: u8 = 0x76;
pub const BME280_I2C_ADDR_SECONDARY: u8 = 0x77;

// Register addresses
pub const BME280_REG_ID: u8 = 0xD0;
pub const BME280_REG_CALIB_TP: u8 = 0x88;
pub const BME280_REG_CALIB_TP_LENGTH: usize = 24;
pub const BME280_REG_CALIB_H1: u8 = 0xA1;
pub const BME280_REG_CALIB_H2: u8 = 0xE1;
pub const BME280_REG_CALIB_H2_LENGTH: usize = 7;
pub const BME280_REG_CTRL_HUM: u8 = 0xF2;
pub const BME280_REG_CTRL_MEAS: u8 = 0xF4;
pub const BME280_REG_CONFIG: u8 = 0xF5;
pub const BME280_REG_DATA: u8 = 0xF7;
pub const BME280_REG_DATA_LENGTH: usize = 8;

// Oversampling settings
pub const BME280_OVERSAMPLING_1X: u8 = 0x01;
pub const BME280_OVERSAMPLING_4X: u8 = 0x03;

// Power modes
pub const BME280_POWER_FORCED: u8 = 0x01;
pub const BME280_POWER_NORMAL: u8 = 0x03;

// Standby times (normal mode)
pub const BME280_STANDBY_0_5_MS: u8 = 0x00;
pub const BME280_STANDBY_1000_MS: u8 = 0x05;

pub const BME280_FILTER_OFF: u8 = 0x00;

/// Measurement settings written before every read
#[derive(Debug, Clone, Copy)]
pub struct Bme280Config {
    /// Humidity oversampling (ctrl_hum, 3 bits)
    pub humidity_oversampling: u8,
    /// Temperature oversampling (ctrl_meas bits 7..5)
    pub temp_oversampling: u8,
    /// Pressure oversampling (ctrl_meas bits 4..2)
    pub pressure_oversampling: u8,
    /// Power mode (ctrl_meas bits 1..0)
    pub power_mode: u8,
    /// Standby time in normal mode (config bits 7..5)
    pub standby_time: u8,
    /// IIR filter coefficient (config bits 4..2)
    pub filter_coefficient: u8,
    /// Shortest wait between configuring and reading the data registers,
    /// raised to the worst-case measurement time of the oversampling settings
    pub conversion_wait_us: u32,
}

impl Default for Bme280Config {
    fn default() -> Self {
        Self {
            humidity_oversampling: BME280_OVERSAMPLING_1X,
            temp_oversampling: BME280_OVERSAMPLING_4X,
            pressure_oversampling: BME280_OVERSAMPLING_4X,
            power_mode: BME280_POWER_FORCED,
            standby_time: BME280_STANDBY_1000_MS,
            filter_coefficient: BME280_FILTER_OFF,
            conversion_wait_us: 4500,
        }
    }
}

impl Bme280Config {
    /// Value of the ctrl_meas register (0xF4)
    pub fn ctrl_meas(&self) -> u8 {
        (self.temp_oversampling << 5) | (self.pressure_oversampling << 2) | self.power_mode
    }

    /// Value of the config register (0xF5)
    pub fn config(&self) -> u8 {
        (self.standby_time << 5) | (self.filter_coefficient << 2)
    }

    /// Maximum measurement time in microseconds (datasheet appendix 9.1)
    pub fn measurement_time_us(&self) -> u32 {
        let samples = |setting: u8| -> u32 {
            match setting & 0x07 {
                0 => 0,
                s @ 1..=4 => 1 << (s - 1),
                _ => 16,
            }
        };
        let channel = |setting: u8| match samples(setting) {
            0 => 0,
            n => 2300 * n + 575,
        };
        1250 + 2300 * samples(self.temp_oversampling)
            + channel(self.pressure_oversampling)
            + channel(self.humidity_oversampling)
    }

    /// Time to wait after starting a measurement
    pub fn conversion_wait(&self) -> u32 {
        self.conversion_wait_us.max(self.measurement_time_us())
    }
}

/// Factory trimming words, re-read on every measurement
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bme280Calibration {
    // Temperature compensation
    pub dig_t1: u16,
    pub dig_t2: i16,
    pub dig_t3: i16,

    // Pressure compensation
    pub dig_p1: u16,
    pub dig_p2: i16,
    pub dig_p3: i16,
    pub dig_p4: i16,
    pub dig_p5: i16,
    pub dig_p6: i16,
    pub dig_p7: i16,
    pub dig_p8: i16,
    pub dig_p9: i16,

    // Humidity compensation
    pub dig_h1: u8,
    pub dig_h2: i16,
    pub dig_h3: u8,
    pub dig_h4: i16,
    pub dig_h5: i16,
    pub dig_h6: i8,
}

impl Bme280Calibration {
    /// Assemble coefficients from the 0x88, 0xA1 and 0xE1 register blocks
    pub fn from_registers(
        tp: &[u8; BME280_REG_CALIB_TP_LENGTH],
        h1: u8,
        h: &[u8; BME280_REG_CALIB_H2_LENGTH],
    ) -> Self {
        let word = |i: usize| i16::from_le_bytes([tp[i], tp[i + 1]]);
        Self {
            dig_t1: u16::from_le_bytes([tp[0], tp[1]]),
            dig_t2: word(2),
            dig_t3: word(4),
            dig_p1: u16::from_le_bytes([tp[6], tp[7]]),
            dig_p2: word(8),
            dig_p3: word(10),
            dig_p4: word(12),
            dig_p5: word(14),
            dig_p6: word(16),
            dig_p7: word(18),
            dig_p8: word(20),
            dig_p9: word(22),
            dig_h1: h1,
            dig_h2: i16::from_le_bytes([h[0], h[1]]),
            dig_h3: h[2],
            // 12-bit values sharing the nibbles of 0xE5
            dig_h4: ((h[3] as i8 as i16) << 4) | (h[4] & 0x0F) as i16,
            dig_h5: ((h[5] as i8 as i16) << 4) | (h[4] >> 4) as i16,
            dig_h6: h[6] as i8,
        }
    }

    /// Temperature in Celsius and the fine temperature shared with the
    /// pressure and humidity formulas
    pub fn compensate_temperature(&self, adc_t: u32) -> (f64, i32) {
        let adc_t = adc_t as f64;
        let t1 = self.dig_t1 as f64;
        let var1 = (adc_t / 16384.0 - t1 / 1024.0) * self.dig_t2 as f64;
        let var2 = (adc_t / 131072.0 - t1 / 8192.0) * (adc_t / 131072.0 - t1 / 8192.0) * self.dig_t3 as f64;
        let t_fine = (var1 + var2) as i32;
        ((var1 + var2) / 5120.0, t_fine)
    }

    /// Pressure in Pascals
    pub fn compensate_pressure(&self, adc_p: u32, t_fine: i32) -> f64 {
        let var1 = t_fine as f64 / 2.0 - 64000.0;
        let var2 = var1 * var1 * self.dig_p6 as f64 / 32768.0;
        let var2 = var2 + var1 * self.dig_p5 as f64 * 2.0;
        let var2 = var2 / 4.0 + self.dig_p4 as f64 * 65536.0;
        let var1 = (self.dig_p3 as f64 * var1 * var1 / 524288.0 + self.dig_p2 as f64 * var1) / 524288.0;
        let var1 = (1.0 + var1 / 32768.0) * self.dig_p1 as f64;

        if var1 == 0.0 {
            // Avoid division by zero on blank calibration
            return 0.0;
        }

        let p = 1048576.0 - adc_p as f64;
        let p = (p - var2 / 4096.0) * 6250.0 / var1;
        let var1 = self.dig_p9 as f64 * p * p / 2147483648.0;
        let var2 = p * self.dig_p8 as f64 / 32768.0;
        p + (var1 + var2 + self.dig_p7 as f64) / 16.0
    }

    /// Relative humidity in percent, clamped to [0, 100]
    pub fn compensate_humidity(&self, adc_h: u16, t_fine: i32) -> f64 {
        let h2 = self.dig_h2 as f64;
        let h3 = self.dig_h3 as f64;
        let h4 = self.dig_h4 as f64;
        let h5 = self.dig_h5 as f64;
        let h6 = self.dig_h6 as f64;

        let var_h = t_fine as f64 - 76800.0;
        let var_h = (adc_h as f64 - (h4 * 64.0 + h5 / 16384.0 * var_h))
            * (h2 / 65536.0 * (1.0 + h6 / 67108864.0 * var_h * (1.0 + h3 / 67108864.0 * var_h)));
        let humidity = var_h * (1.0 - self.dig_h1 as f64 * var_h / 524288.0);

        humidity.clamp(0.0, 100.0)
    }

    pub fn compensate(&self, raw: &RawMeasurements) -> ClimateReading {
        let (temperature, t_fine) = self.compensate_temperature(raw.temperature);
        ClimateReading {
            temperature_c: temperature as f32,
            humidity_pct: self.compensate_humidity(raw.humidity, t_fine) as f32,
            pressure_pa: self.compensate_pressure(raw.pressure, t_fine) as f32,
        }
    }
}

/// Uncompensated ADC counts from the 0xF7 data burst
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawMeasurements {
    /// 20-bit pressure
    pub pressure: u32,
    /// 20-bit temperature
    pub temperature: u32,
    /// 16-bit humidity
    pub humidity: u16,
}

impl RawMeasurements {
    pub fn from_burst(buffer: &[u8; BME280_REG_DATA_LENGTH]) -> Self {
        let twenty_bit = |msb: u8, lsb: u8, xlsb: u8| ((msb as u32) << 12) | ((lsb as u32) << 4) | ((xlsb as u32) >> 4);
        Self {
            pressure: twenty_bit(buffer[0], buffer[1], buffer[2]),
            temperature: twenty_bit(buffer[3], buffer[4], buffer[5]),
            humidity: u16::from_be_bytes([buffer[6], buffer[7]]),
        }
    }
}

/// BME280 temperature / humidity / pressure sensor
pub struct Bme280<I: I2c, D: DelayNs> {
    i2c: I,
    delay: D,
    addr: u8,
    config: Bme280Config,
}

impl<I: I2c, D: DelayNs> Bme280<I, D> {
    pub fn new(i2c: I, delay: D, addr: u8) -> Self {
        Self::new_with_config(i2c, delay, addr, Bme280Config::default())
    }

    pub fn new_with_config(i2c: I, delay: D, addr: u8, config: Bme280Config) -> Self {
        Self {
            i2c,
            delay,
            addr,
            config,
        }
    }

    /// Chip ID, 0x60 for a genuine BME280. Diagnostic only.
    pub fn chip_id(&mut self) -> Result<u8, I2cError> {
        self.i2c.read_reg(self.addr, BME280_REG_ID)
    }

    /// Trimming words from the 0x88, 0xA1 and 0xE1 blocks
    pub fn read_calibration(&mut self) -> Result<Bme280Calibration, I2cError> {
        let mut tp = [0u8; BME280_REG_CALIB_TP_LENGTH];
        self.i2c.read_regs(self.addr, BME280_REG_CALIB_TP, &mut tp)?;
        let h1 = self.i2c.read_reg(self.addr, BME280_REG_CALIB_H1)?;
        let mut h = [0u8; BME280_REG_CALIB_H2_LENGTH];
        self.i2c.read_regs(self.addr, BME280_REG_CALIB_H2, &mut h)?;

        let cal = Bme280Calibration::from_registers(&tp, h1, &h);
        debug!("BME280 calibration {:?}", cal);
        Ok(cal)
    }

    /// Write ctrl_hum before ctrl_meas, the humidity setting only latches
    /// on a ctrl_meas write
    fn configure(&mut self) -> Result<(), I2cError> {
        self.i2c
            .write_reg(self.addr, BME280_REG_CTRL_HUM, self.config.humidity_oversampling)?;
        self.i2c
            .write_reg(self.addr, BME280_REG_CTRL_MEAS, self.config.ctrl_meas())?;
        self.i2c.write_reg(self.addr, BME280_REG_CONFIG, self.config.config())
    }

    fn read_raw_measurements(&mut self) -> Result<RawMeasurements, I2cError> {
        let mut buffer = [0u8; BME280_REG_DATA_LENGTH];
        self.i2c.read_regs(self.addr, BME280_REG_DATA, &mut buffer)?;
        Ok(RawMeasurements::from_burst(&buffer))
    }

    /// One complete forced measurement
    pub fn measure(&mut self) -> Result<ClimateReading, I2cError> {
        let chip_id = self.chip_id()?;
        debug!("BME280 at {:#04x}, chip id {:#04x}", self.addr, chip_id);

        let cal = self.read_calibration()?;
        self.configure()?;
        self.delay.delay_us(self.config.conversion_wait());

        let raw = self.read_raw_measurements()?;
        debug!("BME280 raw {:?}", raw);

        let reading = cal.compensate(&raw);
        debug!(
            "BME280: {:.2}°C {:.2}% {:.2}Pa",
            reading.temperature_c, reading.humidity_pct, reading.pressure_pa
        );
        Ok(reading)
    }
}

impl<I: I2c, D: DelayNs> Sensor for Bme280<I, D> {
    type Reading = ClimateReading;
    type Error = I2cError;

    fn name(&self) -> &'static str {
        "BME280"
    }

    fn read(&mut self) -> Result<ClimateReading, I2cError> {
        self.measure()
    }
}

/// Read a BME280 on the default bus, `addr` given in hex such as `"0x76"`
pub fn read_bme280(addr: &str) -> Result<ClimateReading, I2cError> {
    read_bme280_on(DEFAULT_I2C_BUS, addr)
}

pub fn read_bme280_on(bus: impl AsRef<Path>, addr: &str) -> Result<ClimateReading, I2cError> {
    let addr = parse_address(addr)?;
    let i2c = open_bus(bus)?;
    Bme280::new(i2c, linux_embedded_hal::Delay, addr).measure()
}
