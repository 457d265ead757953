// AOSong DHT11 / DHT22 / AM2302 one-wire decoder
//
// The sensor answers a start pulse with an 80us low/high preamble followed
// by 40 bits. Every bit starts with a ~50us low, the following high lasts
// ~26us for a zero and ~70us for a one. Durations are measured in poll
// counts, the mean of the 50us lows is the decision threshold.

use std::str::FromStr;
use std::time::Duration;

use embedded_hal::delay::DelayNs;
use hal::{DataLine, HygroReading, Sensor};
use log::{debug, trace};

use crate::error::DhtError;
use crate::gpio::{self, GpioMap};
use crate::timing::{busy_wait, settle, spin_while, RealtimeGuard};

/// Polls spent on one line level before giving up. Suits a Pi-class CPU.
pub const DHT_MAXCOUNT: u32 = 32000;

/// Preamble plus 40 data bits
pub const DHT_PULSES: usize = 41;

const FRAME_LEN: usize = 5;
const SETTLE_SPINS: u32 = 50;

/// Supported one-wire humidity sensors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DhtKind {
    /// Whole degrees / percent
    Dht11,
    /// Tenths of degrees / percent, signed temperature
    Dht22,
}

impl DhtKind {
    /// The AM2302 is a packaged DHT22
    pub const AM2302: DhtKind = DhtKind::Dht22;

    pub fn name(&self) -> &'static str {
        match self {
            DhtKind::Dht11 => "DHT11",
            DhtKind::Dht22 => "DHT22",
        }
    }
}

impl FromStr for DhtKind {
    type Err = DhtError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "dht11" | "11" => Ok(DhtKind::Dht11),
            "dht22" | "22" | "am2302" => Ok(DhtKind::Dht22),
            _ => Err(DhtError::UnknownKind(s.to_string())),
        }
    }
}

/// Start sequence timing and the poll budget
#[derive(Debug, Clone, Copy)]
pub struct DhtConfig {
    /// Line held high before the start signal, lets the sensor wake up
    pub wake_high_ms: u32,
    /// Start signal, line held low
    pub start_low_ms: u32,
    /// Maximum polls per line level
    pub max_count: u32,
}

impl Default for DhtConfig {
    fn default() -> Self {
        Self {
            wake_high_ms: 500,
            start_low_ms: 20,
            max_count: DHT_MAXCOUNT,
        }
    }
}

/// Poll counts of one read: even entries are lows, odd entries highs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PulseTrace {
    counts: [u32; DHT_PULSES * 2],
}

impl PulseTrace {
    pub fn from_pairs(pairs: [(u32, u32); DHT_PULSES]) -> Self {
        let mut counts = [0u32; DHT_PULSES * 2];
        for (i, (low, high)) in pairs.into_iter().enumerate() {
            counts[i * 2] = low;
            counts[i * 2 + 1] = high;
        }
        Self { counts }
    }

    pub fn low(&self, pulse: usize) -> u32 {
        self.counts[pulse * 2]
    }

    pub fn high(&self, pulse: usize) -> u32 {
        self.counts[pulse * 2 + 1]
    }

    /// Mean low duration of the data pulses, the preamble is excluded
    pub fn threshold(&self) -> u32 {
        let sum: u32 = (1..DHT_PULSES).map(|p| self.low(p)).sum();
        sum / (DHT_PULSES as u32 - 1)
    }
}

/// A checksum-verified 5 byte frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    bytes: [u8; FRAME_LEN],
}

impl Frame {
    /// Accept `bytes` only when the last byte is the truncated sum of the others
    pub fn new(bytes: [u8; FRAME_LEN]) -> Result<Self, DhtError> {
        let expected = bytes[..4].iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
        if bytes[4] != expected {
            return Err(DhtError::ChecksumMismatch {
                expected,
                actual: bytes[4],
            });
        }
        Ok(Self { bytes })
    }

    pub fn bytes(&self) -> [u8; FRAME_LEN] {
        self.bytes
    }

    /// Convert to physical units, DHT11 frames carry whole units only
    pub fn reading(&self, kind: DhtKind) -> HygroReading {
        let b = self.bytes;
        match kind {
            DhtKind::Dht11 => HygroReading {
                temperature_c: b[2] as f32,
                humidity_pct: b[0] as f32,
            },
            DhtKind::Dht22 => {
                let humidity = (b[0] as u16 * 256 + b[1] as u16) as f32 / 10.0;
                let mut temperature = ((b[2] & 0x7F) as u16 * 256 + b[3] as u16) as f32 / 10.0;
                if b[2] & 0x80 != 0 {
                    temperature = -temperature;
                }
                HygroReading {
                    temperature_c: temperature,
                    humidity_pct: humidity,
                }
            }
        }
    }
}

/// Turn a pulse trace into a verified frame
pub fn decode(trace: &PulseTrace) -> Result<Frame, DhtError> {
    let threshold = trace.threshold();
    let mut bytes = [0u8; FRAME_LEN];
    for pulse in 1..DHT_PULSES {
        let index = (pulse - 1) / 8;
        bytes[index] <<= 1;
        if trace.high(pulse) >= threshold {
            bytes[index] |= 1;
        }
    }
    debug!(
        "DHT frame {:#04x} {:#04x} {:#04x} {:#04x} {:#04x} (threshold {})",
        bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], threshold
    );
    Frame::new(bytes)
}

/// One-wire humidity/temperature sensor on a single data line
pub struct Dht<L: DataLine, D: DelayNs> {
    kind: DhtKind,
    line: L,
    delay: D,
    config: DhtConfig,
}

impl<L: DataLine, D: DelayNs> Dht<L, D> {
    /// Sensor on `line` with the default start sequence timing
    pub fn new(kind: DhtKind, line: L, delay: D) -> Self {
        Self::with_config(kind, line, delay, DhtConfig::default())
    }

    /// Sensor with custom start sequence timing or poll budget
    pub fn with_config(kind: DhtKind, line: L, delay: D, config: DhtConfig) -> Self {
        Self {
            kind,
            line,
            delay,
            config,
        }
    }

    /// Sensor variant, decides the frame conversion
    pub fn kind(&self) -> DhtKind {
        self.kind
    }

    /// Run one complete start/capture/decode cycle. Never retries; the
    /// sensor refuses reads more often than about every 2 seconds.
    pub fn read(&mut self) -> Result<HygroReading, DhtError> {
        self.line.set_output();
        self.line.set_high();
        self.delay.delay_ms(self.config.wake_high_ms);

        let frame = {
            let priority = RealtimeGuard::acquire();
            trace!("capturing with real-time priority: {}", priority.is_elevated());

            self.line.set_low();
            busy_wait(Duration::from_millis(self.config.start_low_ms as u64));
            self.line.set_input();
            settle(SETTLE_SPINS);

            let trace = self.capture()?;
            decode(&trace)?
        };

        let reading = frame.reading(self.kind);
        debug!(
            "{}: {:.1}°C {:.1}%",
            self.kind.name(),
            reading.temperature_c,
            reading.humidity_pct
        );
        Ok(reading)
    }

    /// Wait for the acknowledge, then time every low/high pulse
    fn capture(&mut self) -> Result<PulseTrace, DhtError> {
        let budget = self.config.max_count;
        let line = &mut self.line;

        spin_while(budget, || line.is_high()).map_err(|_| DhtError::AckTimeout)?;

        let mut counts = [0u32; DHT_PULSES * 2];
        for i in (0..DHT_PULSES * 2).step_by(2) {
            counts[i] = spin_while(budget, || !line.is_high())
                .map_err(|_| DhtError::PulseTimeout { index: i })?;
            counts[i + 1] = spin_while(budget, || line.is_high())
                .map_err(|_| DhtError::PulseTimeout { index: i + 1 })?;
        }

        trace!("DHT pulse counts {:?}", counts);
        Ok(PulseTrace { counts })
    }
}

impl<L: DataLine, D: DelayNs> Sensor for Dht<L, D> {
    type Reading = HygroReading;
    type Error = DhtError;

    fn name(&self) -> &'static str {
        self.kind().name()
    }

    fn read(&mut self) -> Result<HygroReading, DhtError> {
        Dht::read(self)
    }
}

/// Read a one-wire sensor on a GPIO pin of the shared register map
pub fn read_onewire(kind: DhtKind, pin: usize) -> Result<HygroReading, DhtError> {
    let gpio = gpio::initialize()?;
    read_onewire_on(gpio, kind, pin)
}

/// Read a one-wire sensor on a GPIO pin of `map`
pub fn read_onewire_on(map: &GpioMap, kind: DhtKind, pin: usize) -> Result<HygroReading, DhtError> {
    let line = map.pin(pin)?;
    debug!("reading {} on GPIO {}", kind.name(), line.number());
    Dht::new(kind, line, linux_embedded_hal::Delay).read()
}
