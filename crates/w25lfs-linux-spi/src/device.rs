//! Linux SPI device implementation
//!
//! This module provides the `LinuxSpi` struct that implements the `Transport`
//! trait using Linux's spidev interface.
//!
//! spidev has no separate chip-select control: CS is asserted for the length
//! of one `SPI_IOC_MESSAGE`. Transmitted bytes are therefore buffered from
//! `select` on and sent together with the receive phase (write then read in
//! one message), or on `deselect` for write-only frames.

use crate::error::{LinuxSpiError, Result};

use w25lfs_core::error::{Error as CoreError, Phase, Result as CoreResult};
use w25lfs_core::spi::MAX_HEADER_LEN;
use w25lfs_core::transport::Transport;

use std::fs::{File, OpenOptions};
use std::os::unix::io::AsRawFd;
use std::time::{Duration, Instant};

/// Path to kernel spidev buffer size parameter
const BUF_SIZE_SYSFS: &str = "/sys/module/spidev/parameters/bufsiz";

/// Default SPI clock speed in Hz (2 MHz)
const DEFAULT_SPEED_HZ: u32 = 2_000_000;

/// SPI mode constants
pub mod mode {
    /// SPI mode 0: CPOL=0, CPHA=0
    pub const MODE_0: u8 = 0;
    /// SPI mode 1: CPOL=0, CPHA=1
    pub const MODE_1: u8 = 1;
    /// SPI mode 2: CPOL=1, CPHA=0
    pub const MODE_2: u8 = 2;
    /// SPI mode 3: CPOL=1, CPHA=1
    pub const MODE_3: u8 = 3;
}

/// Linux spidev ioctl constants
mod ioctl {
    use nix::ioctl_write_ptr;

    // SPI ioctl magic number
    const SPI_IOC_MAGIC: u8 = b'k';

    // SPI ioctl type numbers
    const SPI_IOC_TYPE_MODE: u8 = 1;
    const SPI_IOC_TYPE_BITS_PER_WORD: u8 = 3;
    const SPI_IOC_TYPE_MAX_SPEED_HZ: u8 = 4;

    ioctl_write_ptr!(spi_ioc_wr_mode, SPI_IOC_MAGIC, SPI_IOC_TYPE_MODE, u8);
    ioctl_write_ptr!(
        spi_ioc_wr_bits_per_word,
        SPI_IOC_MAGIC,
        SPI_IOC_TYPE_BITS_PER_WORD,
        u8
    );
    ioctl_write_ptr!(
        spi_ioc_wr_max_speed_hz,
        SPI_IOC_MAGIC,
        SPI_IOC_TYPE_MAX_SPEED_HZ,
        u32
    );

    /// Size of struct spi_ioc_transfer
    pub const SPI_IOC_TRANSFER_SIZE: usize = 32;

    /// Calculate ioctl number for SPI_IOC_MESSAGE(n)
    pub fn spi_ioc_message(n: u8) -> libc::c_ulong {
        let size = (n as usize) * SPI_IOC_TRANSFER_SIZE;
        // _IOC(dir, type, nr, size) = ((dir)<<30)|((size)<<16)|((type)<<8)|(nr), _IOC_WRITE = 1
        ((1u32 << 30) | ((size as u32) << 16) | ((SPI_IOC_MAGIC as u32) << 8)) as libc::c_ulong
    }
}

/// SPI transfer structure for ioctl
/// This must match the kernel's struct spi_ioc_transfer layout
#[repr(C)]
#[derive(Debug, Default, Clone)]
struct SpiIocTransfer {
    tx_buf: u64,          // __u64 tx_buf
    rx_buf: u64,          // __u64 rx_buf
    len: u32,             // __u32 len
    speed_hz: u32,        // __u32 speed_hz
    delay_usecs: u16,     // __u16 delay_usecs
    bits_per_word: u8,    // __u8 bits_per_word
    cs_change: u8,        // __u8 cs_change
    tx_nbits: u8,         // __u8 tx_nbits
    rx_nbits: u8,         // __u8 rx_nbits
    word_delay_usecs: u8, // __u8 word_delay_usecs
    _pad: u8,             // padding
}

impl SpiIocTransfer {
    fn tx(data: &[u8], speed_hz: u32) -> Self {
        Self {
            tx_buf: data.as_ptr() as u64,
            len: data.len() as u32,
            speed_hz,
            bits_per_word: 8,
            ..Default::default()
        }
    }

    fn rx(buf: &mut [u8], speed_hz: u32) -> Self {
        Self {
            rx_buf: buf.as_mut_ptr() as u64,
            len: buf.len() as u32,
            speed_hz,
            bits_per_word: 8,
            ..Default::default()
        }
    }
}

/// Configuration for opening a Linux SPI device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinuxSpiConfig {
    /// Device path (e.g., "/dev/spidev0.0")
    pub device: String,
    /// SPI clock speed in Hz (default: 2 MHz)
    pub speed_hz: u32,
    /// SPI mode (0-3, default: 0)
    pub mode: u8,
}

impl Default for LinuxSpiConfig {
    fn default() -> Self {
        Self {
            device: String::new(),
            speed_hz: DEFAULT_SPEED_HZ,
            mode: mode::MODE_0,
        }
    }
}

impl LinuxSpiConfig {
    /// Create a new configuration with the given device path
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            ..Default::default()
        }
    }

    /// Set the SPI clock speed in Hz
    pub fn with_speed(mut self, speed_hz: u32) -> Self {
        self.speed_hz = speed_hz;
        self
    }

    /// Set the SPI mode (0-3)
    pub fn with_mode(mut self, mode: u8) -> Self {
        self.mode = mode;
        self
    }
}

/// Flash transport over `/dev/spidevX.Y`
#[derive(Debug)]
pub struct LinuxSpi {
    /// File handle for spidev device
    file: File,
    /// Maximum kernel buffer size
    max_kernel_buf_size: usize,
    /// Current speed in Hz
    speed_hz: u32,
    /// Bytes transmitted since select, not yet on the wire
    pending_tx: Vec<u8>,
    /// Longest transmit deadline seen in the open frame
    tx_deadline_ms: u32,
    /// The open frame already went out with its receive phase
    flushed: bool,
}

impl LinuxSpi {
    /// Open a Linux SPI device with the given configuration
    pub fn open(config: &LinuxSpiConfig) -> Result<Self> {
        if config.device.is_empty() {
            return Err(LinuxSpiError::NoDevice);
        }

        log::debug!("linux_spi: Opening device {}", config.device);

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&config.device)
            .map_err(|source| LinuxSpiError::Configure {
                what: format!("open {}", config.device),
                source,
            })?;

        let fd = file.as_raw_fd();

        let mode = config.mode;
        unsafe {
            ioctl::spi_ioc_wr_mode(fd, &mode)
                .map_err(|e| LinuxSpiError::ioctl(format!("set SPI mode {}", mode), e))?;
        }

        // Set bits per word (always 8)
        let bits: u8 = 8;
        unsafe {
            ioctl::spi_ioc_wr_bits_per_word(fd, &bits)
                .map_err(|e| LinuxSpiError::ioctl(format!("set bits per word to {}", bits), e))?;
        }

        let speed = config.speed_hz;
        unsafe {
            ioctl::spi_ioc_wr_max_speed_hz(fd, &speed)
                .map_err(|e| LinuxSpiError::ioctl(format!("set clock speed to {} Hz", speed), e))?;
        }

        log::info!(
            "linux_spi: Opened {} (mode={}, speed={} kHz)",
            config.device,
            mode,
            speed / 1000
        );

        let max_kernel_buf_size = get_max_kernel_buf_size();
        log::debug!(
            "linux_spi: Max kernel buffer size: {} bytes",
            max_kernel_buf_size
        );

        Ok(Self {
            file,
            max_kernel_buf_size,
            speed_hz: speed,
            pending_tx: Vec::new(),
            tx_deadline_ms: 0,
            flushed: false,
        })
    }

    /// Open a device with default settings
    pub fn open_device(device: &str) -> Result<Self> {
        Self::open(&LinuxSpiConfig::new(device))
    }

    /// Get current speed setting
    pub fn speed_hz(&self) -> u32 {
        self.speed_hz
    }

    /// Issue one SPI_IOC_MESSAGE: write phase, then optional read phase
    ///
    /// CS stays asserted across both transfers.
    fn spi_transfer(&mut self, write_data: &[u8], read_buf: &mut [u8]) -> Result<()> {
        if write_data.is_empty() {
            return Err(LinuxSpiError::InvalidParameter(
                "Write data cannot be empty".into(),
            ));
        }

        let mut transfers = vec![SpiIocTransfer::tx(write_data, self.speed_hz)];
        if !read_buf.is_empty() {
            transfers.push(SpiIocTransfer::rx(read_buf, self.speed_hz));
        }

        let ioctl_num = ioctl::spi_ioc_message(transfers.len() as u8);
        let ret = unsafe { libc::ioctl(self.file.as_raw_fd(), ioctl_num, transfers.as_ptr()) };

        if ret < 0 {
            return Err(LinuxSpiError::TransferFailed(
                std::io::Error::last_os_error(),
            ));
        }

        Ok(())
    }

    /// Run a transfer and map an overrun of `deadline_ms` to a timeout
    ///
    /// The deadline is checked once the ioctl returns. spidev transfers
    /// cannot be interrupted, so a transfer the kernel never completes still
    /// blocks the caller; this only reports transfers that finished late.
    fn timed_transfer(
        &mut self,
        write_data: &[u8],
        read_buf: &mut [u8],
        phase: Phase,
        deadline_ms: u32,
    ) -> CoreResult<()> {
        let started = Instant::now();
        self.spi_transfer(write_data, read_buf)?;
        check_deadline(started.elapsed(), phase, deadline_ms)
    }
}

/// Fail with [`CoreError::TransportTimeout`] when `elapsed` overran the deadline
fn check_deadline(elapsed: Duration, phase: Phase, deadline_ms: u32) -> CoreResult<()> {
    if elapsed > Duration::from_millis(deadline_ms as u64) {
        log::error!(
            "linux_spi: {} took {} ms (deadline {} ms)",
            phase,
            elapsed.as_millis(),
            deadline_ms
        );
        return Err(CoreError::TransportTimeout(phase));
    }
    Ok(())
}

impl Transport for LinuxSpi {
    fn select(&mut self) -> CoreResult<()> {
        self.pending_tx.clear();
        self.tx_deadline_ms = 0;
        self.flushed = false;
        Ok(())
    }

    fn deselect(&mut self) -> CoreResult<()> {
        if self.flushed || self.pending_tx.is_empty() {
            return Ok(());
        }
        let tx = std::mem::take(&mut self.pending_tx);
        let result = self.timed_transfer(&tx, &mut [], Phase::Transmit, self.tx_deadline_ms);
        self.pending_tx = tx;
        self.flushed = true;
        result
    }

    fn transmit(&mut self, data: &[u8], timeout_ms: u32) -> CoreResult<()> {
        if self.flushed {
            log::warn!("linux_spi: transmit after receive in one frame, starting a new message");
            self.pending_tx.clear();
            self.flushed = false;
        }
        self.pending_tx.extend_from_slice(data);
        self.tx_deadline_ms = self.tx_deadline_ms.max(timeout_ms);
        Ok(())
    }

    fn receive(&mut self, buf: &mut [u8], timeout_ms: u32) -> CoreResult<()> {
        let tx = std::mem::take(&mut self.pending_tx);
        let result = self.timed_transfer(&tx, buf, Phase::Receive, timeout_ms);
        self.pending_tx = tx;
        self.flushed = true;
        result
    }

    fn max_read_len(&self) -> usize {
        // Command, address and dummy bytes share the kernel buffer
        self.max_kernel_buf_size.saturating_sub(MAX_HEADER_LEN)
    }

    fn delay_us(&mut self, us: u32) {
        std::thread::sleep(Duration::from_micros(us as u64));
    }
}

/// Read the maximum kernel buffer size from sysfs, or use page size as fallback
fn get_max_kernel_buf_size() -> usize {
    if let Ok(content) = std::fs::read_to_string(BUF_SIZE_SYSFS) {
        if let Ok(size) = content.trim().parse::<usize>() {
            if size > 0 {
                log::debug!("linux_spi: Using buffer size {} from sysfs", size);
                return size;
            }
        }
        log::warn!("linux_spi: Invalid buffer size in {}", BUF_SIZE_SYSFS);
    } else {
        log::debug!("linux_spi: Cannot read {}, using page size", BUF_SIZE_SYSFS);
    }

    // Fall back to page size
    let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) } as usize;
    log::debug!("linux_spi: Using page size {} as buffer size", page_size);
    page_size
}

/// Parse programmer options from a list of key-value pairs
pub fn parse_options(options: &[(&str, &str)]) -> Result<LinuxSpiConfig> {
    let mut config = LinuxSpiConfig::default();

    for (key, value) in options {
        match *key {
            "dev" => {
                config.device = value.to_string();
            }
            "spispeed" => {
                // Parse speed in kHz
                let speed_khz: u32 = value.parse().map_err(|_| {
                    LinuxSpiError::InvalidParameter(format!("Invalid spispeed value: {}", value))
                })?;
                config.speed_hz = speed_khz.saturating_mul(1000);
            }
            "mode" => {
                let mode: u8 = value.parse().map_err(|_| {
                    LinuxSpiError::InvalidParameter(format!("Invalid mode value: {}", value))
                })?;
                if mode > mode::MODE_3 {
                    return Err(LinuxSpiError::InvalidParameter(format!(
                        "Invalid SPI mode: {} (must be 0-3)",
                        mode
                    )));
                }
                config.mode = mode;
            }
            _ => {
                log::warn!("linux_spi: Unknown option: {}={}", key, value);
            }
        }
    }

    if config.device.is_empty() {
        return Err(LinuxSpiError::NoDevice);
    }

    Ok(config)
}
