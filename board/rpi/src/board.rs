use std::thread;

use anyhow::Context;
use driver::baro::{read_bme280_on, read_bmp180_on};
use driver::dht::{Dht, DhtKind};
use driver::gpio;
use hal::ClimateReading;
use linux_embedded_hal::Delay;
use log::info;

use crate::config::{SensorSetup, StationConfig};
use crate::retry::read_with_retry;

/// The sensors of one weather station, read together
pub struct Station {
    config: StationConfig,
}

impl Station {
    pub fn new(config: StationConfig) -> Self {
        Station { config }
    }

    pub fn name(&self) -> &str {
        match self.config.setup {
            SensorSetup::Bme280 { .. } => "bme280",
            SensorSetup::Am2302 { .. } => "am2302",
        }
    }

    /// Read all sensors and apply the configured offsets
    pub fn measure(&self) -> anyhow::Result<ClimateReading> {
        let reading = match &self.config.setup {
            SensorSetup::Bme280 { addr } => read_bme280_on(&self.config.bus, addr)
                .with_context(|| format!("cannot read bme280 at {}", addr))?,
            SensorSetup::Am2302 { pin, bmp180_addr } => {
                let gpio = gpio::initialize().context("cannot initialize GPIO memory")?;
                let line = gpio.pin(*pin)?;
                let mut dht = Dht::new(DhtKind::AM2302, line, Delay);

                let (hygro, retries) = read_with_retry(&mut dht, &self.config.retry, thread::sleep)
                    .with_context(|| {
                        format!(
                            "cannot read am2302 on GPIO {} after {} attempts",
                            pin, self.config.retry.max_attempts
                        )
                    })?;
                info!("am2302 read after {} retries", retries);

                let pressure = read_bmp180_on(&self.config.bus, bmp180_addr)
                    .with_context(|| format!("cannot read bmp180 at {}", bmp180_addr))?;

                ClimateReading::combine(hygro, pressure)
            }
        };

        let adjusted = self.config.offsets.apply(reading);
        if adjusted != reading {
            info!("applied calibration offsets {:?}", self.config.offsets);
        }
        Ok(adjusted)
    }
}
