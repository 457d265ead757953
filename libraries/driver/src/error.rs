use embedded_hal::i2c::ErrorKind;
use hal::Retryable;
use thiserror::Error;

/// Failures while mapping the GPIO peripheral into the process
#[derive(Error, Debug)]
pub enum GpioError {
    /// The peripheral base address could not be read from the device tree
    #[error("cannot read peripheral base from {path}: {source}")]
    DeviceTree {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The privileged memory device could not be opened
    #[error("cannot open {path}: {source}")]
    MemDevice {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// mmap of the register window failed
    #[error("cannot map GPIO registers at {base:#x}: {source}")]
    Map {
        base: u64,
        #[source]
        source: std::io::Error,
    },

    /// Pin number outside of the register block
    #[error("GPIO pin {pin} out of range (0..{max})")]
    InvalidPin { pin: usize, max: usize },
}

impl Retryable for GpioError {
    fn is_transient(&self) -> bool {
        false
    }
}

/// Failures of a single one-wire (DHT11/DHT22/AM2302) read
#[derive(Error, Debug)]
pub enum DhtError {
    /// GPIO access is not available
    #[error("GPIO not initialized: {0}")]
    Gpio(#[from] GpioError),

    /// The sensor never pulled the line low after the start signal
    #[error("no acknowledge from sensor")]
    AckTimeout,

    /// The line got stuck while receiving pulse `index` (0..82)
    #[error("timeout while receiving pulse {index}")]
    PulseTimeout { index: usize },

    /// The frame was received but its checksum byte does not match
    #[error("checksum mismatch (expected {expected:#04x}, got {actual:#04x})")]
    ChecksumMismatch { expected: u8, actual: u8 },

    /// Sensor type string not recognized
    #[error("unknown sensor type {0:?}")]
    UnknownKind(String),
}

impl Retryable for DhtError {
    fn is_transient(&self) -> bool {
        matches!(
            self,
            DhtError::AckTimeout | DhtError::PulseTimeout { .. } | DhtError::ChecksumMismatch { .. }
        )
    }
}

/// Failures talking to an I2C sensor
#[derive(Error, Debug)]
pub enum I2cError {
    /// Address string is not a valid 7-bit hex address
    #[error("invalid I2C address {0:?}")]
    InvalidAddress(String),

    /// The bus character device could not be opened
    #[error("failed to open I2C bus {path}: {source}")]
    BusOpen {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A register transfer failed or returned short
    #[error("I2C transfer at register {register:#04x} failed: {kind:?}")]
    Transfer { register: u8, kind: ErrorKind },
}

impl Retryable for I2cError {
    fn is_transient(&self) -> bool {
        matches!(self, I2cError::Transfer { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dht_error_classification() {
        assert!(DhtError::AckTimeout.is_transient());
        assert!(DhtError::PulseTimeout { index: 3 }.is_transient());
        assert!(DhtError::ChecksumMismatch { expected: 0xFC, actual: 0xFF }.is_transient());

        let gpio = DhtError::Gpio(GpioError::InvalidPin { pin: 99, max: 54 });
        assert!(!gpio.is_transient(), "missing GPIO access should not be retried");
        assert!(!DhtError::UnknownKind("dht33".into()).is_transient());
    }

    #[test]
    fn test_i2c_error_classification() {
        let transfer = I2cError::Transfer { register: 0x88, kind: ErrorKind::Other };
        assert!(transfer.is_transient());
        assert!(!I2cError::InvalidAddress("zz".into()).is_transient());

        let open = I2cError::BusOpen {
            path: "/dev/i2c-9".into(),
            source: Box::new(std::io::Error::from(std::io::ErrorKind::NotFound)),
        };
        assert!(!open.is_transient(), "a missing bus device should not be retried");
    }

    #[test]
    fn test_error_messages() {
        let err = DhtError::ChecksumMismatch { expected: 0xFC, actual: 0xFF };
        assert_eq!(err.to_string(), "checksum mismatch (expected 0xfc, got 0xff)");

        let err = I2cError::Transfer { register: 0xF7, kind: ErrorKind::Other };
        assert!(err.to_string().contains("0xf7"), "register should be in message: {}", err);
    }
}
