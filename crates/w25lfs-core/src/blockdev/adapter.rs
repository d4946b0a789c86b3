//! Block device backed by a W25Q flash chip

use super::{BlockDevice, BlockDeviceConfig};
use crate::device::FlashDevice;
use crate::error::{ConfigError, Error, Result};
use crate::page;
use crate::transport::Transport;

/// [`BlockDevice`] over a [`FlashDevice`]
///
/// Holds no cache: every `prog` and `erase` has reached the chip by the time
/// it returns, so `sync` has nothing to do.
pub struct FlashBlockDevice<T> {
    flash: FlashDevice<T>,
    config: BlockDeviceConfig,
}

impl<T: Transport> FlashBlockDevice<T> {
    /// Mount `config` on `flash`
    ///
    /// The config is validated and must fit inside the chip.
    pub fn new(flash: FlashDevice<T>, config: BlockDeviceConfig) -> Result<Self> {
        config.validate()?;
        if config.capacity() > flash.capacity() {
            return Err(Error::InvalidConfig(ConfigError::ExceedsDevice));
        }
        log::debug!(
            "block device: {} blocks of {} bytes",
            config.block_count,
            config.block_size
        );
        Ok(Self { flash, config })
    }

    /// Get a reference to the flash device
    pub fn flash(&self) -> &FlashDevice<T> {
        &self.flash
    }

    /// Get a mutable reference to the flash device
    pub fn flash_mut(&mut self) -> &mut FlashDevice<T> {
        &mut self.flash
    }

    /// Unmount and return the flash device
    pub fn into_inner(self) -> FlashDevice<T> {
        self.flash
    }

    /// Linear address of `(block, offset)` after checking `len` bytes fit
    fn locate(&self, block: u32, offset: u32, len: usize) -> Result<u32> {
        if block >= self.config.block_count {
            return Err(Error::AddressOutOfRange);
        }
        if offset as u64 + len as u64 > self.config.block_size as u64 {
            return Err(Error::AddressOutOfRange);
        }
        Ok(block * self.config.block_size + offset)
    }
}

impl<T: Transport> BlockDevice for FlashBlockDevice<T> {
    fn config(&self) -> &BlockDeviceConfig {
        &self.config
    }

    fn read(&mut self, block: u32, offset: u32, buf: &mut [u8]) -> Result<()> {
        log::trace!("bd read: block {}, off {}, size {}", block, offset, buf.len());
        let addr = self.locate(block, offset, buf.len())?;
        self.flash.read(addr, buf)
    }

    fn prog(&mut self, block: u32, offset: u32, data: &[u8]) -> Result<()> {
        log::trace!("bd prog: block {}, off {}, size {}", block, offset, data.len());
        let addr = self.locate(block, offset, data.len())?;
        page::write_pages(&mut self.flash, addr, data)
    }

    fn erase(&mut self, block: u32) -> Result<()> {
        log::trace!("bd erase: block {}", block);
        self.locate(block, 0, 0)?;
        self.flash.erase_sector(block)
    }

    fn sync(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockdev::to_code;
    use crate::spi::opcodes;
    use crate::transport::mock::{MockTransport, MOCK_SIZE};
    use std::vec;
    use std::vec::Vec;

    fn block_device() -> FlashBlockDevice<MockTransport> {
        let flash = FlashDevice::new(MockTransport::new(), MOCK_SIZE as u32).unwrap();
        let config = BlockDeviceConfig::default().with_block_count(16);
        FlashBlockDevice::new(flash, config).unwrap()
    }

    fn programs(bd: &FlashBlockDevice<MockTransport>) -> Vec<(u32, usize)> {
        bd.flash().transport().programs()
    }

    #[test]
    fn test_round_trip() {
        let mut bd = block_device();
        for (block, offset, size) in [(0, 0, 1), (1, 100, 600), (3, 4000, 96), (15, 0, 4096)] {
            let data: Vec<u8> = (0..size).map(|i| (i * 7 + block as usize) as u8).collect();
            bd.erase(block).unwrap();
            bd.prog(block, offset, &data).unwrap();
            let mut back = vec![0u8; size];
            bd.read(block, offset, &mut back).unwrap();
            assert_eq!(back, data, "block {} offset {}", block, offset);
        }
    }

    #[test]
    fn test_full_page_is_one_program() {
        let mut bd = block_device();
        bd.prog(2, 256, &[0x5A; 256]).unwrap();
        assert_eq!(programs(&bd), [(2 * 4096 + 256, 256)]);
    }

    #[test]
    fn test_page_plus_one_is_two_programs() {
        let mut bd = block_device();
        bd.prog(0, 0, &[0u8; 257]).unwrap();
        assert_eq!(programs(&bd), [(0, 256), (256, 1)]);
    }

    #[test]
    fn test_mid_page_pair() {
        let mut bd = block_device();
        bd.prog(0, 255, &[1, 2]).unwrap();
        assert_eq!(programs(&bd), [(255, 1), (256, 1)]);
    }

    #[test]
    fn test_erase_sets_ones() {
        let mut bd = block_device();
        bd.prog(4, 0, &[0u8; 4096]).unwrap();
        bd.erase(4).unwrap();
        let mut back = vec![0u8; 4096];
        bd.read(4, 0, &mut back).unwrap();
        assert!(back.iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn test_bounds_are_recoverable() {
        let mut bd = block_device();
        let mut buf = [0u8; 8];
        assert_eq!(bd.read(16, 0, &mut buf), Err(Error::AddressOutOfRange));
        assert_eq!(bd.read(0, 4090, &mut buf), Err(Error::AddressOutOfRange));
        assert_eq!(bd.prog(0, 4095, &[0, 0]), Err(Error::AddressOutOfRange));
        assert_eq!(bd.erase(16), Err(Error::AddressOutOfRange));
        assert_eq!(to_code(bd.erase(99)), -22);
        assert_eq!(bd.flash().transport().selects, 0);
    }

    #[test]
    fn test_sync_is_silent() {
        let mut bd = block_device();
        assert_eq!(bd.sync(), Ok(()));
        assert_eq!(bd.flash().transport().selects, 0);
    }

    #[test]
    fn test_failures_propagate() {
        let mut bd = block_device();
        bd.flash_mut().transport_mut().stuck_busy = true;
        let err = bd.erase(0).unwrap_err();
        assert_eq!(err, Error::BusyTimeout);
        assert_eq!(to_code(Err(err)), -5);
        assert_eq!(bd.flash().transport().frames_with(opcodes::SE_20).len(), 1);
    }

    #[test]
    fn test_geometry_must_fit_chip() {
        let flash = FlashDevice::new(MockTransport::new(), MOCK_SIZE as u32).unwrap();
        let config = BlockDeviceConfig::default();
        assert_eq!(
            FlashBlockDevice::new(flash, config).err(),
            Some(Error::InvalidConfig(ConfigError::ExceedsDevice))
        );
    }
}
