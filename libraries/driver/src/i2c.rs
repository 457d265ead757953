// Register-level I2C helpers shared by the Bosch drivers

use std::path::Path;

use embedded_hal::i2c::{Error as _, I2c};
use linux_embedded_hal::I2cdev;
use log::debug;

use crate::error::I2cError;

/// Raspberry Pi 2 and later expose the header I2C pins as bus 1
pub const DEFAULT_I2C_BUS: &str = "/dev/i2c-1";

/// Parse a 7-bit address written in hex, with or without `0x` prefix
pub fn parse_address(addr: &str) -> Result<u8, I2cError> {
    let trimmed = addr.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    match u8::from_str_radix(digits, 16) {
        Ok(value) if (0x03..=0x77).contains(&value) => Ok(value),
        _ => Err(I2cError::InvalidAddress(addr.to_string())),
    }
}

/// Open a Linux I2C character device
pub fn open_bus(path: impl AsRef<Path>) -> Result<I2cdev, I2cError> {
    let path = path.as_ref();
    debug!("opening I2C bus {}", path.display());
    I2cdev::new(path).map_err(|e| I2cError::BusOpen {
        path: path.display().to_string(),
        source: Box::new(e),
    })
}

/// Register access on top of a raw I2C bus
pub trait I2cDevice {
    /// Read consecutive registers starting at `reg`
    fn read_regs(&mut self, addr: u8, reg: u8, data: &mut [u8]) -> Result<(), I2cError>;

    /// Write a single register
    fn write_reg(&mut self, addr: u8, reg: u8, value: u8) -> Result<(), I2cError>;

    /// Read a single register
    fn read_reg(&mut self, addr: u8, reg: u8) -> Result<u8, I2cError> {
        let mut buffer = [0u8; 1];
        self.read_regs(addr, reg, &mut buffer)?;
        Ok(buffer[0])
    }
}

impl<T: I2c> I2cDevice for T {
    fn read_regs(&mut self, addr: u8, reg: u8, data: &mut [u8]) -> Result<(), I2cError> {
        self.write_read(addr, &[reg], data).map_err(|e| I2cError::Transfer {
            register: reg,
            kind: e.kind(),
        })
    }

    fn write_reg(&mut self, addr: u8, reg: u8, value: u8) -> Result<(), I2cError> {
        self.write(addr, &[reg, value]).map_err(|e| I2cError::Transfer {
            register: reg,
            kind: e.kind(),
        })
    }
}


#[cfg(test)]
mod tests {
    use super::fake::FakeBus;
    use super::*;
    use embedded_hal::i2c::ErrorKind;

    #[test]
    fn test_parse_address() {
        assert_eq!(parse_address("0x76").ok(), Some(0x76));
        assert_eq!(parse_address("0X77").ok(), Some(0x77));
        assert_eq!(parse_address("76").ok(), Some(0x76));
        assert_eq!(parse_address(" 0x40 ").ok(), Some(0x40));

        assert!(matches!(parse_address("0x78"), Err(I2cError::InvalidAddress(_))));
        assert!(matches!(parse_address("0xZZ"), Err(I2cError::InvalidAddress(_))));
        assert!(matches!(parse_address(""), Err(I2cError::InvalidAddress(_))));
    }

    #[test]
    fn test_open_missing_bus() {
        match open_bus("/dev/i2c-does-not-exist") {
            Err(I2cError::BusOpen { path, .. }) => assert_eq!(path, "/dev/i2c-does-not-exist"),
            Err(other) => panic!("Expected BusOpen error, got {:?}", other),
            Ok(_) => panic!("Expected BusOpen error"),
        }
    }

    #[test]
    fn test_register_helpers() {
        let mut bus = FakeBus::new(0x76);
        bus.load(0xD0, &[0x60]);
        bus.load(0x88, &[1, 2, 3]);

        assert_eq!(bus.read_reg(0x76, 0xD0).ok(), Some(0x60));

        let mut buf = [0u8; 3];
        bus.read_regs(0x76, 0x88, &mut buf).expect("burst read");
        assert_eq!(buf, [1, 2, 3]);

        bus.write_reg(0x76, 0xF4, 0x6D).expect("register write");
        assert_eq!(bus.writes, vec![(0xF4, 0x6D)]);
    }

    #[test]
    fn test_transfer_errors_carry_register() {
        let mut bus = FakeBus::new(0x76);
        bus.failing.push(0x88);

        let mut buf = [0u8; 24];
        match bus.read_regs(0x76, 0x88, &mut buf) {
            Err(I2cError::Transfer { register, kind }) => {
                assert_eq!(register, 0x88);
                assert_eq!(kind, ErrorKind::Other);
            }
            other => panic!("Expected Transfer error, got {:?}", other),
        }

        // Wrong address is a NACK
        assert!(matches!(bus.read_reg(0x77, 0xD0), Err(I2cError::Transfer { register: 0xD0, .. })));
    }
}
