// Reading value types shared by every sensor driver

/// Temperature and relative humidity from a hygrometer (DHT11/DHT22/AM2302)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HygroReading {
    /// Temperature in Celsius
    pub temperature_c: f32,
    /// Relative humidity in percent
    pub humidity_pct: f32,
}

/// Barometric pressure only (BMP180)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PressureReading {
    /// Pressure in Pascals
    pub pressure_pa: f32,
}

impl PressureReading {
    /// Pressure in hectopascals
    pub fn pressure_hpa(&self) -> f32 {
        self.pressure_pa / 100.0
    }
}

/// Full climate reading (BME280)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClimateReading {
    /// Temperature in Celsius
    pub temperature_c: f32,
    /// Relative humidity in percent, always within [0, 100]
    pub humidity_pct: f32,
    /// Pressure in Pascals
    pub pressure_pa: f32,
}

impl ClimateReading {
    /// Pressure in hectopascals
    pub fn pressure_hpa(&self) -> f32 {
        self.pressure_pa / 100.0
    }

    /// Join a hygrometer and a barometer reading taken together
    pub fn combine(hygro: HygroReading, pressure: PressureReading) -> Self {
        Self {
            temperature_c: hygro.temperature_c,
            humidity_pct: hygro.humidity_pct,
            pressure_pa: pressure.pressure_pa,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combine_readings() {
        let hygro = HygroReading {
            temperature_c: 21.5,
            humidity_pct: 48.0,
        };
        let pressure = PressureReading { pressure_pa: 101325.0 };
        let reading = ClimateReading::combine(hygro, pressure);

        assert_eq!(reading.temperature_c, 21.5);
        assert_eq!(reading.humidity_pct, 48.0);
        assert_eq!(reading.pressure_pa, 101325.0);
        assert_eq!(reading.pressure_hpa(), 1013.25);
    }
}
