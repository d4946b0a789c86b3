//! The four-operation block-device contract
//!
//! A log-structured filesystem drives its storage through `read`, `prog`,
//! `erase` and `sync` on `(block, offset)` coordinates. [`FlashBlockDevice`]
//! maps those onto a [`FlashDevice`](crate::device::FlashDevice): one block
//! is one erase sector, reads go straight to the chip and programs go
//! through the page splitter.

mod adapter;
mod config;
mod status;

pub use adapter::FlashBlockDevice;
pub use config::BlockDeviceConfig;
pub use status::{describe, to_code, Status};

use crate::error::Result;

/// Storage as seen by the filesystem
///
/// Implementations never retry; the first failure is returned as is.
pub trait BlockDevice {
    /// Geometry this device was mounted with
    fn config(&self) -> &BlockDeviceConfig;

    /// Read `buf.len()` bytes from `offset` inside `block`
    fn read(&mut self, block: u32, offset: u32, buf: &mut [u8]) -> Result<()>;

    /// Program `data` at `offset` inside `block`
    ///
    /// The range must have been erased since it was last programmed.
    fn prog(&mut self, block: u32, offset: u32, data: &[u8]) -> Result<()>;

    /// Reset `block` to all-ones
    fn erase(&mut self, block: u32) -> Result<()>;

    /// Flush pending writes
    fn sync(&mut self) -> Result<()>;
}

impl<B: BlockDevice + ?Sized> BlockDevice for &mut B {
    fn config(&self) -> &BlockDeviceConfig {
        (**self).config()
    }

    fn read(&mut self, block: u32, offset: u32, buf: &mut [u8]) -> Result<()> {
        (**self).read(block, offset, buf)
    }

    fn prog(&mut self, block: u32, offset: u32, data: &[u8]) -> Result<()> {
        (**self).prog(block, offset, data)
    }

    fn erase(&mut self, block: u32) -> Result<()> {
        (**self).erase(block)
    }

    fn sync(&mut self) -> Result<()> {
        (**self).sync()
    }
}
