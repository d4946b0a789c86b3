//! w25lfs-linux-spi - Linux spidev support
//!
//! This crate provides a [`Transport`](w25lfs_core::transport::Transport)
//! over the `/dev/spidevX.Y` device interface, for driving a W25Q chip wired
//! to a single-board computer.
//!
//! # Example
//!
//! ```no_run
//! use w25lfs_linux_spi::{LinuxSpi, LinuxSpiConfig};
//! use w25lfs_core::device::FlashDevice;
//!
//! let config = LinuxSpiConfig::new("/dev/spidev0.0")
//!     .with_speed(4_000_000)  // 4 MHz
//!     .with_mode(0);
//! let spi = LinuxSpi::open(&config)?;
//!
//! let mut flash = FlashDevice::new(spi, 8 * 1024 * 1024)?;
//! println!("JEDEC ID: {}", flash.read_id()?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Usage with the w25lfs CLI
//!
//! ```bash
//! # Probe chip using default settings
//! w25lfs probe -p linux_spi:dev=/dev/spidev0.0
//!
//! # Specify SPI speed in kHz and SPI mode
//! w25lfs read -p linux_spi:dev=/dev/spidev0.0,spispeed=4000,mode=3 -o flash.bin
//! ```
//!
//! # System Requirements
//!
//! - Linux kernel with spidev support enabled (`CONFIG_SPI_SPIDEV`)
//! - Read/write access to `/dev/spidevX.Y` device

pub mod device;
pub mod error;

// Re-exports
pub use device::{mode, parse_options, LinuxSpi, LinuxSpiConfig};
pub use error::{LinuxSpiError, Result};

/// Open a Linux SPI device and return a boxed transport
///
/// This is a convenience function for use in the CLI programmer dispatch.
///
/// # Example Options
///
/// - `dev=/dev/spidev0.0` - Required: device path
/// - `spispeed=4000` - Optional: speed in kHz (default: 2000)
/// - `mode=0` - Optional: SPI mode 0-3 (default: 0)
pub fn open_linux_spi(
    options: &[(&str, &str)],
) -> std::result::Result<Box<dyn w25lfs_core::transport::Transport>, Box<dyn std::error::Error>> {
    let config = parse_options(options)?;
    let spi = LinuxSpi::open(&config)?;
    Ok(Box::new(spi))
}
