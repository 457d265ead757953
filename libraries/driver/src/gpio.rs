// Memory-mapped GPIO register access for BCM283x/BCM2711 SoCs
//
// The peripheral window is mapped once per process and handed out as a
// shared `&'static GpioMap`. Pin operations are plain volatile register
// accesses, no system calls. There is no locking: at most one measurement
// may drive the registers at a time.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom};
use std::os::unix::fs::OpenOptionsExt;
use std::ptr::NonNull;
use std::sync::OnceLock;

use hal::DataLine;
use log::debug;
use memmap2::{MmapMut, MmapOptions};

use crate::error::GpioError;

/// Offset of the GPIO block from the SoC peripheral base
pub const GPIO_BASE_OFFSET: u64 = 0x20_0000;
/// Size of the mapped register window in bytes
pub const GPIO_LENGTH: usize = 4096;
/// Number of GPIO lines in the register block
pub const GPIO_PIN_COUNT: usize = 54;

// Function select: 10 pins per register, 3 bits per pin
const FSEL_PINS_PER_REG: usize = 10;
const FSEL_BITS: usize = 3;
const FSEL_MASK: u32 = 0b111;
const FSEL_OUTPUT: u32 = 0b001;

// Word offsets of the output set, output clear and level registers
const GPSET0: usize = 7;
const GPCLR0: usize = 10;
const GPLEV0: usize = 13;

/// Where to find the peripheral base and the register device
#[derive(Debug, Clone)]
pub struct GpioConfig {
    /// Device tree file holding the SoC bus ranges
    pub ranges_path: String,
    /// Character device exposing the GPIO registers
    pub mem_device: String,
    /// Offset of the GPIO block from the peripheral base
    pub gpio_offset: u64,
}

impl Default for GpioConfig {
    fn default() -> Self {
        Self {
            ranges_path: "/proc/device-tree/soc/ranges".into(),
            mem_device: "/dev/gpiomem".into(),
            gpio_offset: GPIO_BASE_OFFSET,
        }
    }
}

static SHARED: OnceLock<GpioMap> = OnceLock::new();

/// Map the GPIO block with the default configuration, once per process.
pub fn initialize() -> Result<&'static GpioMap, GpioError> {
    initialize_with(&GpioConfig::default())
}

/// Map the GPIO block once per process. Later calls return the existing
/// mapping and ignore `config`.
pub fn initialize_with(config: &GpioConfig) -> Result<&'static GpioMap, GpioError> {
    if let Some(map) = SHARED.get() {
        return Ok(map);
    }
    let map = GpioMap::open(config)?;
    // A racing initializer may have won, its mapping is kept and ours dropped
    Ok(SHARED.get_or_init(|| map))
}

/// Owner of the mapped GPIO register window
pub struct GpioMap {
    regs: NonNull<u32>,
    _mmap: MmapMut,
}

// The raw pointer only ever addresses `_mmap`, which lives as long as the map.
unsafe impl Send for GpioMap {}
unsafe impl Sync for GpioMap {}

impl GpioMap {
    /// Map the register window described by `config`
    pub fn open(config: &GpioConfig) -> Result<Self, GpioError> {
        let peri_base = read_peripheral_base(&config.ranges_path)?;
        let gpio_base = peri_base + config.gpio_offset;
        debug!("GPIO peripheral base {:#x}, GPIO block {:#x}", peri_base, gpio_base);

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_SYNC)
            .open(&config.mem_device)
            .map_err(|source| GpioError::MemDevice {
                path: config.mem_device.clone(),
                source,
            })?;

        let mmap = unsafe {
            MmapOptions::new()
                .offset(gpio_base)
                .len(GPIO_LENGTH)
                .map_mut(&file)
        }
        .map_err(|source| GpioError::Map { base: gpio_base, source })?;

        Ok(Self::from_mmap(mmap))
    }

    fn from_mmap(mut mmap: MmapMut) -> Self {
        let regs = NonNull::new(mmap.as_mut_ptr() as *mut u32)
            .unwrap_or(NonNull::dangling());
        Self { regs, _mmap: mmap }
    }

    /// Zeroed private window in place of the hardware
    #[cfg(test)]
    pub(crate) fn anonymous() -> Self {
        let mmap = MmapOptions::new().len(GPIO_LENGTH).map_anon().expect("anonymous map");
        Self::from_mmap(mmap)
    }

    /// Borrow a validated pin handle
    pub fn pin(&self, pin: usize) -> Result<Pin<'_>, GpioError> {
        if pin >= GPIO_PIN_COUNT {
            return Err(GpioError::InvalidPin { pin, max: GPIO_PIN_COUNT });
        }
        Ok(Pin { map: self, pin })
    }

    /// Clear the function select field: pin becomes an input
    pub fn set_input(&self, pin: usize) {
        let (word, shift) = fsel_position(pin);
        self.modify(word, |v| v & !(FSEL_MASK << shift));
    }

    /// Set the function select field to output
    pub fn set_output(&self, pin: usize) {
        let (word, shift) = fsel_position(pin);
        self.modify(word, |v| (v & !(FSEL_MASK << shift)) | (FSEL_OUTPUT << shift));
    }

    /// Drive the pin high through the set register
    pub fn set_high(&self, pin: usize) {
        self.write(GPSET0 + pin / 32, 1 << (pin % 32));
    }

    /// Drive the pin low through the clear register
    pub fn set_low(&self, pin: usize) {
        self.write(GPCLR0 + pin / 32, 1 << (pin % 32));
    }

    /// Non-zero when the pin level bit is set
    pub fn read(&self, pin: usize) -> u32 {
        self.load(GPLEV0 + pin / 32) & (1 << (pin % 32))
    }

    #[inline(always)]
    fn load(&self, word: usize) -> u32 {
        debug_assert!(word < GPIO_LENGTH / 4);
        unsafe { self.regs.as_ptr().add(word).read_volatile() }
    }

    #[inline(always)]
    fn write(&self, word: usize, value: u32) {
        debug_assert!(word < GPIO_LENGTH / 4);
        unsafe { self.regs.as_ptr().add(word).write_volatile(value) }
    }

    #[inline(always)]
    fn modify(&self, word: usize, f: impl FnOnce(u32) -> u32) {
        let value = self.load(word);
        self.write(word, f(value));
    }
}

fn fsel_position(pin: usize) -> (usize, usize) {
    (pin / FSEL_PINS_PER_REG, (pin % FSEL_PINS_PER_REG) * FSEL_BITS)
}

/// The peripheral base is the big-endian word at byte 4 of the ranges file
fn read_peripheral_base(path: &str) -> Result<u64, GpioError> {
    let device_tree = |source| GpioError::DeviceTree {
        path: path.to_string(),
        source,
    };
    let mut file = File::open(path).map_err(device_tree)?;
    let mut buf = [0u8; 4];
    file.seek(SeekFrom::Start(4)).map_err(device_tree)?;
    file.read_exact(&mut buf).map_err(device_tree)?;
    Ok(u32::from_be_bytes(buf) as u64)
}

/// A validated pin on the shared register map
#[derive(Clone, Copy)]
pub struct Pin<'a> {
    map: &'a GpioMap,
    pin: usize,
}

impl Pin<'_> {
    /// BCM pin number
    pub fn number(&self) -> usize {
        self.pin
    }
}

impl DataLine for Pin<'_> {
    fn set_input(&mut self) {
        self.map.set_input(self.pin);
    }

    fn set_output(&mut self) {
        self.map.set_output(self.pin);
    }

    fn set_high(&mut self) {
        self.map.set_high(self.pin);
    }

    fn set_low(&mut self) {
        self.map.set_low(self.pin);
    }

    #[inline(always)]
    fn is_high(&mut self) -> bool {
        self.map.read(self.pin) != 0
    }
}
