//! w25lfs-core - NOR flash block-device driver core
//!
//! This crate bridges a log-structured filesystem (littlefs and friends) to a
//! W25Q-class SPI NOR flash chip. The chip can only program within a 256 byte
//! page and only erase whole 4 KiB sectors; the filesystem wants to read and
//! program arbitrary `(block, offset, size)` ranges. The layers, leaves first:
//!
//! - [`transport`] - chip-select framed SPI transactions with deadlines
//! - [`device`] - JEDEC-level flash operations on top of a transport
//! - [`page`] - splitting linear writes into page-program calls
//! - [`blockdev`] - the four-operation block-device contract
//! - [`checksum`] - the filesystem's table-driven CRC
//!
//! The crate is `no_std` compatible. Everything is synchronous and blocking:
//! busy polling and settle delays on this class of device have no cooperative
//! yield point below a single operation.
//!
//! # Features
//!
//! - `std` - Enable standard library support (includes `alloc`, TOML config)
//! - `alloc` - Enable boxed transports
//! - `embedded-hal` - [`hal::HalTransport`] over `embedded-hal` 1.0 traits
//!
//! # Example
//!
//! ```ignore
//! use w25lfs_core::blockdev::{BlockDevice, BlockDeviceConfig, FlashBlockDevice};
//! use w25lfs_core::device::FlashDevice;
//!
//! fn mount<T: w25lfs_core::transport::Transport>(transport: T) -> w25lfs_core::Result<()> {
//!     let config = BlockDeviceConfig::default();
//!     let flash = FlashDevice::new(transport, config.capacity())?;
//!     let mut bd = FlashBlockDevice::new(flash, config)?;
//!     let mut buf = [0u8; 16];
//!     bd.read(0, 0, &mut buf)?;
//!     Ok(())
//! }
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(any(feature = "std", test))]
extern crate std;

pub mod blockdev;
pub mod checksum;
pub mod device;
pub mod error;
#[cfg(feature = "embedded-hal")]
pub mod hal;
pub mod page;
pub mod sfdp;
pub mod spi;
pub mod transport;

pub use error::{Error, Result};
