use anyhow::{anyhow, bail, Context};
use driver::i2c::{parse_address, DEFAULT_I2C_BUS};
use hal::ClimateReading;

use crate::retry::RetryPolicy;

// Environment variables read by the station
pub const ENV_TYPE: &str = "GETSENSOR_TYPE";
pub const ENV_ADDR: &str = "GETSENSOR_ADDR";
pub const ENV_PIN: &str = "GETSENSOR_PIN";
pub const ENV_BUS: &str = "GETSENSOR_BUS";
pub const ENV_TEMP_OFFSET: &str = "GETSENSOR_TEMP_OFFSET";
pub const ENV_HUMI_OFFSET: &str = "GETSENSOR_HUMI_OFFSET";
pub const ENV_PRES_OFFSET: &str = "GETSENSOR_PRES_OFFSET";

/// Which sensors make up the station
#[derive(Debug, Clone, PartialEq)]
pub enum SensorSetup {
    /// BME280 alone covers temperature, humidity and pressure
    Bme280 { addr: String },
    /// AM2302 for temperature and humidity, BMP180 for pressure
    Am2302 { pin: usize, bmp180_addr: String },
}

/// Fixed corrections added to decoded values
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Offsets {
    pub temperature_c: f32,
    pub humidity_pct: f32,
    pub pressure_pa: f32,
}

impl Offsets {
    pub fn apply(&self, reading: ClimateReading) -> ClimateReading {
        ClimateReading {
            temperature_c: reading.temperature_c + self.temperature_c,
            humidity_pct: reading.humidity_pct + self.humidity_pct,
            pressure_pa: reading.pressure_pa + self.pressure_pa,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StationConfig {
    pub setup: SensorSetup,
    /// I2C bus character device
    pub bus: String,
    pub offsets: Offsets,
    /// Retry policy for the one-wire sensor
    pub retry: RetryPolicy,
}

impl StationConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let kind = lookup(ENV_TYPE).ok_or_else(|| anyhow!("{} is not set", ENV_TYPE))?;
        let addr = lookup(ENV_ADDR).ok_or_else(|| anyhow!("{} is not set", ENV_ADDR))?;
        parse_address(&addr).with_context(|| format!("{} is not a valid I2C address", ENV_ADDR))?;

        let setup = match kind.as_str() {
            "bme280" => SensorSetup::Bme280 { addr },
            "am2302" => {
                let pin = lookup(ENV_PIN)
                    .ok_or_else(|| anyhow!("{} is required for am2302", ENV_PIN))?
                    .trim()
                    .parse::<usize>()
                    .with_context(|| format!("{} must be a GPIO number", ENV_PIN))?;
                if pin == 0 {
                    bail!("{} must be a non-zero GPIO number", ENV_PIN);
                }
                SensorSetup::Am2302 {
                    pin,
                    bmp180_addr: addr,
                }
            }
            other => bail!("unsupported sensor type {:?}, expected bme280 or am2302", other),
        };

        let offset = |key: &str| -> anyhow::Result<f32> {
            match lookup(key) {
                Some(value) => value
                    .trim()
                    .parse()
                    .with_context(|| format!("{} must be a number", key)),
                None => Ok(0.0),
            }
        };

        Ok(Self {
            setup,
            bus: lookup(ENV_BUS).unwrap_or_else(|| DEFAULT_I2C_BUS.to_string()),
            offsets: Offsets {
                temperature_c: offset(ENV_TEMP_OFFSET)?,
                humidity_pct: offset(ENV_HUMI_OFFSET)?,
                pressure_pa: offset(ENV_PRES_OFFSET)?,
            },
            retry: RetryPolicy::default(),
        })
    }
}
