use std::path::Path;

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use hal::{PressureReading, Sensor};
use log::debug;

use crate::error::I2cError;
use crate::i2c::{open_bus, parse_address, I2cDevice, DEFAULT_I2C_BUS};

pub const BMP180_I2C_ADDR: u8 = 0x77;

// Register addresses
pub const BMP180_REG_ID: u8 = 0xD0;
pub const BMP180_REG_CALIB: u8 = 0xAA;
pub const BMP180_REG_CALIB_LENGTH: usize = 22;
pub const BMP180_REG_CONTROL: u8 = 0xF4;
pub const BMP180_REG_DATA: u8 = 0xF6;

// Control register commands
pub const BMP180_CMD_TEMPERATURE: u8 = 0x2E;
pub const BMP180_CMD_PRESSURE: u8 = 0x34;

/// Temperature conversion time, 4.5 ms
const TEMPERATURE_WAIT_US: u32 = 4500;

/// Pressure oversampling setting (oss)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Oversampling {
    #[default]
    UltraLowPower = 0,
    Standard = 1,
    HighResolution = 2,
    UltraHighResolution = 3,
}

impl Oversampling {
    pub fn oss(self) -> u8 {
        self as u8
    }

    /// Conversion time: 4.5, 7.5, 13.5 or 25.5 ms, rounded up to whole ms
    pub fn wait_ms(self) -> u32 {
        2 + (3 << self.oss())
    }

    pub fn command(self) -> u8 {
        BMP180_CMD_PRESSURE + (self.oss() << 6)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Bmp180Config {
    pub oversampling: Oversampling,
}

/// EEPROM calibration words, re-read on every measurement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bmp180Calibration {
    pub ac1: i16,
    pub ac2: i16,
    pub ac3: i16,
    pub ac4: u16,
    pub ac5: u16,
    pub ac6: u16,
    pub b1: i16,
    pub b2: i16,
    pub mb: i16,
    pub mc: i16,
    pub md: i16,
}

impl Bmp180Calibration {
    /// Eleven big-endian words starting at 0xAA
    pub fn from_registers(buf: &[u8; BMP180_REG_CALIB_LENGTH]) -> Self {
        let unsigned = |i: usize| u16::from_be_bytes([buf[i * 2], buf[i * 2 + 1]]);
        let signed = |i: usize| unsigned(i) as i16;
        Self {
            ac1: signed(0),
            ac2: signed(1),
            ac3: signed(2),
            ac4: unsigned(3),
            ac5: unsigned(4),
            ac6: unsigned(5),
            b1: signed(6),
            b2: signed(7),
            mb: signed(8),
            mc: signed(9),
            md: signed(10),
        }
    }

    /// B5, the temperature term the pressure formula depends on
    fn b5(&self, ut: i64) -> i64 {
        let x1 = ((ut - self.ac6 as i64) * self.ac5 as i64) >> 15;
        let denominator = x1 + self.md as i64;
        if denominator == 0 {
            return x1;
        }
        x1 + ((self.mc as i64) << 11) / denominator
    }

    /// Temperature in 0.1 °C
    pub fn temperature(&self, ut: i64) -> i64 {
        (self.b5(ut) + 8) >> 4
    }

    /// Pressure in Pa from uncompensated temperature and pressure
    pub fn pressure(&self, ut: i64, up: i64, oss: u8) -> i64 {
        let b6 = self.b5(ut) - 4000;

        let x1 = (self.b2 as i64 * ((b6 * b6) >> 12)) >> 11;
        let x2 = (self.ac2 as i64 * b6) >> 11;
        let x3 = x1 + x2;
        let b3 = ((((self.ac1 as i64) * 4 + x3) << oss) + 2) / 4;

        let x1 = (self.ac3 as i64 * b6) >> 13;
        let x2 = (self.b1 as i64 * ((b6 * b6) >> 12)) >> 16;
        let x3 = (x1 + x2 + 2) >> 2;
        let b4 = (self.ac4 as u32).wrapping_mul((x3 + 32768) as u32) >> 15;
        let b7 = ((up - b3) as u32).wrapping_mul(50000 >> oss);

        if b4 == 0 {
            return 0;
        }
        let p: i64 = if b7 < 0x8000_0000 {
            ((b7 * 2) / b4) as i64
        } else {
            (b7 / b4) as i64 * 2
        };

        let x1 = (p >> 8) * (p >> 8);
        let x1 = (x1 * 3038) >> 16;
        let x2 = (-7357 * p) >> 16;
        p + ((x1 + x2 + 3791) >> 4)
    }
}

/// BMP180 barometric pressure sensor
pub struct Bmp180<I: I2c, D: DelayNs> {
    i2c: I,
    delay: D,
    addr: u8,
    config: Bmp180Config,
}

impl<I: I2c, D: DelayNs> Bmp180<I, D> {
    pub fn new(i2c: I, delay: D, addr: u8) -> Self {
        Self::new_with_config(i2c, delay, addr, Bmp180Config::default())
    }

    pub fn new_with_config(i2c: I, delay: D, addr: u8, config: Bmp180Config) -> Self {
        Self {
            i2c,
            delay,
            addr,
            config,
        }
    }

    /// Chip ID, 0x55 for a genuine BMP180. Diagnostic only.
    pub fn chip_id(&mut self) -> Result<u8, I2cError> {
        self.i2c.read_reg(self.addr, BMP180_REG_ID)
    }

    pub fn read_calibration(&mut self) -> Result<Bmp180Calibration, I2cError> {
        let mut buf = [0u8; BMP180_REG_CALIB_LENGTH];
        self.i2c.read_regs(self.addr, BMP180_REG_CALIB, &mut buf)?;
        let cal = Bmp180Calibration::from_registers(&buf);
        debug!("BMP180 calibration {:?}", cal);
        Ok(cal)
    }

    fn read_uncompensated_temperature(&mut self) -> Result<i64, I2cError> {
        self.i2c
            .write_reg(self.addr, BMP180_REG_CONTROL, BMP180_CMD_TEMPERATURE)?;
        self.delay.delay_us(TEMPERATURE_WAIT_US);

        let mut buf = [0u8; 2];
        self.i2c.read_regs(self.addr, BMP180_REG_DATA, &mut buf)?;
        Ok(u16::from_be_bytes(buf) as i64)
    }

    fn read_uncompensated_pressure(&mut self) -> Result<i64, I2cError> {
        let oversampling = self.config.oversampling;
        self.i2c
            .write_reg(self.addr, BMP180_REG_CONTROL, oversampling.command())?;
        self.delay.delay_ms(oversampling.wait_ms());

        let mut buf = [0u8; 3];
        self.i2c.read_regs(self.addr, BMP180_REG_DATA, &mut buf)?;
        let raw = ((buf[0] as i64) << 16) | ((buf[1] as i64) << 8) | buf[2] as i64;
        Ok(raw >> (8 - oversampling.oss()))
    }

    /// Temperature conversion followed by a pressure conversion
    pub fn measure(&mut self) -> Result<PressureReading, I2cError> {
        let chip_id = self.chip_id()?;
        debug!("BMP180 at {:#04x}, chip id {:#04x}", self.addr, chip_id);

        let cal = self.read_calibration()?;
        let ut = self.read_uncompensated_temperature()?;
        let up = self.read_uncompensated_pressure()?;
        debug!("BMP180 raw UT {} UP {}", ut, up);

        let temperature = cal.temperature(ut);
        let pressure = cal.pressure(ut, up, self.config.oversampling.oss());
        debug!("BMP180: {:.1}°C {}Pa", temperature as f32 / 10.0, pressure);

        Ok(PressureReading {
            pressure_pa: pressure as f32,
        })
    }
}

impl<I: I2c, D: DelayNs> Sensor for Bmp180<I, D> {
    type Reading = PressureReading;
    type Error = I2cError;

    fn name(&self) -> &'static str {
        "BMP180"
    }

    fn read(&mut self) -> Result<PressureReading, I2cError> {
        self.measure()
    }
}

/// Read a BMP180 on the default bus, `addr` given in hex such as `"0x77"`
pub fn read_bmp180(addr: &str) -> Result<PressureReading, I2cError> {
    read_bmp180_on(DEFAULT_I2C_BUS, addr)
}

pub fn read_bmp180_on(bus: impl AsRef<Path>, addr: &str) -> Result<PressureReading, I2cError> {
    let addr = parse_address(addr)?;
    let i2c = open_bus(bus)?;
    Bmp180::new(i2c, linux_embedded_hal::Delay, addr).measure()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::i2c::fake::FakeBus;

    // Calculation example from the Bosch BMP180 datasheet, section 3.5
    const DATASHEET_CALIB: [u8; 22] = [
        0x01, 0x98, // AC1 = 408
        0xFF, 0xB8, // AC2 = -72
        0xC7, 0xD1, // AC3 = -14383
        0x7F, 0xE5, // AC4 = 32741
        0x7F, 0xF5, // AC5 = 32757
        0x5A, 0x71, // AC6 = 23153
        0x18, 0x2E, // B1 = 6190
        0x00, 0x04, // B2 = 4
        0x80, 0x00, // MB = -32768
        0xDD, 0xF9, // MC = -8711
        0x0B, 0x34, // MD = 2868
    ];

    #[derive(Default)]
    struct RecordingDelay {
        total_us: u64,
    }

    impl DelayNs for RecordingDelay {
        fn delay_ns(&mut self, ns: u32) {
            self.total_us += ns as u64 / 1000;
        }
    }

    #[test]
    fn test_calibration_words() {
        let cal = Bmp180Calibration::from_registers(&DATASHEET_CALIB);
        assert_eq!(cal.ac1, 408);
        assert_eq!(cal.ac2, -72);
        assert_eq!(cal.ac3, -14383);
        assert_eq!(cal.ac4, 32741);
        assert_eq!(cal.ac5, 32757);
        assert_eq!(cal.ac6, 23153);
        assert_eq!(cal.b1, 6190);
        assert_eq!(cal.b2, 4);
        assert_eq!(cal.mb, -32768);
        assert_eq!(cal.mc, -8711);
        assert_eq!(cal.md, 2868);
    }

    #[test]
    fn test_datasheet_example() {
        let cal = Bmp180Calibration::from_registers(&DATASHEET_CALIB);
        assert_eq!(cal.temperature(27898), 150, "15.0 °C");
        assert_eq!(cal.pressure(27898, 23843, 0), 69964, "exact pressure from the datasheet");
    }

    #[test]
    fn test_blank_calibration_does_not_panic() {
        let cal = Bmp180Calibration::from_registers(&[0u8; 22]);
        assert_eq!(cal.pressure(27898, 23843, 0), 0, "zero AC4 yields no pressure");
    }

    #[test]
    fn test_oversampling_settings() {
        assert_eq!(Oversampling::UltraLowPower.command(), 0x34);
        assert_eq!(Oversampling::UltraHighResolution.command(), 0xF4);
        assert_eq!(Oversampling::UltraLowPower.wait_ms(), 5);
        assert_eq!(Oversampling::Standard.wait_ms(), 8);
        assert_eq!(Oversampling::HighResolution.wait_ms(), 14);
        assert_eq!(Oversampling::UltraHighResolution.wait_ms(), 26);
    }

    #[test]
    fn test_measure_over_fake_bus() {
        let mut bus = FakeBus::new(0x77);
        bus.load(BMP180_REG_ID, &[0x55]);
        bus.load(BMP180_REG_CALIB, &DATASHEET_CALIB);
        // UT = 27898 = 0x6CFA, UP = 23843 = 0x5D23 (oss 0, shifted right by 8)
        bus.on_write.push((
            BMP180_REG_CONTROL,
            BMP180_CMD_TEMPERATURE,
            vec![(0xF6, 0x6C), (0xF7, 0xFA)],
        ));
        bus.on_write.push((
            BMP180_REG_CONTROL,
            BMP180_CMD_PRESSURE,
            vec![(0xF6, 0x5D), (0xF7, 0x23), (0xF8, 0x00)],
        ));

        let mut delay = RecordingDelay::default();
        let reading = Bmp180::new(&mut bus, &mut delay, 0x77)
            .measure()
            .expect("measurement over fake bus");

        assert_eq!(reading.pressure_pa, 69964.0);
        assert!((reading.pressure_hpa() - 699.64).abs() < 0.01);
        assert_eq!(
            bus.writes,
            vec![(BMP180_REG_CONTROL, 0x2E), (BMP180_REG_CONTROL, 0x34)],
            "temperature conversion must come first"
        );
        assert_eq!(delay.total_us, 4500 + 5000);
    }

    #[test]
    fn test_measure_ultra_high_resolution() {
        let mut bus = FakeBus::new(0x77);
        bus.load(BMP180_REG_ID, &[0x55]);
        bus.load(BMP180_REG_CALIB, &DATASHEET_CALIB);
        bus.on_write.push((
            BMP180_REG_CONTROL,
            BMP180_CMD_TEMPERATURE,
            vec![(0xF6, 0x6C), (0xF7, 0xFA)],
        ));
        // 0x5D2300 >> 5 gives UP = 190744, eight times the oss 0 reading
        bus.on_write.push((
            BMP180_REG_CONTROL,
            0xF4,
            vec![(0xF6, 0x5D), (0xF7, 0x23), (0xF8, 0x00)],
        ));

        let config = Bmp180Config {
            oversampling: Oversampling::UltraHighResolution,
        };
        let mut delay = RecordingDelay::default();
        let reading = Bmp180::new_with_config(&mut bus, &mut delay, 0x77, config)
            .measure()
            .expect("measurement over fake bus");

        assert_eq!(reading.pressure_pa, 69963.0, "oss 3 scales B3 up and B7 down");
        assert_eq!(bus.writes, vec![(BMP180_REG_CONTROL, 0x2E), (BMP180_REG_CONTROL, 0xF4)]);
        assert_eq!(delay.total_us, 4500 + 26000);
    }

    #[test]
    fn test_measure_short_read_fails() {
        let mut bus = FakeBus::new(0x77);
        bus.failing.push(BMP180_REG_CALIB);

        let result = Bmp180::new(&mut bus, RecordingDelay::default(), 0x77).measure();
        match result {
            Err(I2cError::Transfer { register, .. }) => assert_eq!(register, BMP180_REG_CALIB),
            other => panic!("Expected Transfer error, got {:?}", other),
        }
    }

    #[test]
    fn test_read_bmp180_missing_bus() {
        let result = read_bmp180_on("/dev/i2c-does-not-exist", "0x77");
        assert!(matches!(result, Err(I2cError::BusOpen { .. })), "got {:?}", result);
    }
}
