//! JEDEC-level flash operations
//!
//! [`FlashDevice`] owns a [`Transport`] and knows the W25Q command set:
//! identification, status registers, reads, page program and erase. Every
//! mutating operation follows the same sequence:
//!
//! 1. Write Enable
//! 2. the command itself
//! 3. poll status register 1 until BUSY clears, bounded by a [`PollPolicy`]
//! 4. Write Disable
//!
//! A chip that never leaves BUSY fails with [`Error::BusyTimeout`] once the
//! poll budget is used up.

mod status;
mod timing;

pub use status::{JedecId, Status1, StatusRegister};
pub use timing::{PollPolicy, Timing};

use crate::error::{ConfigError, Error, Result};
use crate::sfdp::SFDP_DUMP_LEN;
use crate::spi::{opcodes, AddressWidth, SpiCommand, PAGE_SIZE, SECTOR_SIZE};
use crate::transport::{self, Transport};

/// A W25Q-class SPI NOR flash chip behind a transport
///
/// # Example
///
/// ```ignore
/// use w25lfs_core::device::FlashDevice;
///
/// let mut flash = FlashDevice::new(transport, 8 * 1024 * 1024)?;
/// flash.reset()?;
/// let id = flash.read_id()?;
/// log::info!("JEDEC ID {}", id);
/// ```
pub struct FlashDevice<T> {
    transport: T,
    capacity: u32,
    timing: Timing,
}

impl<T: Transport> FlashDevice<T> {
    /// Wrap a transport talking to a chip of `capacity` bytes
    ///
    /// Commands use 3-byte addresses, so the capacity must stay below 16 MiB.
    pub fn new(transport: T, capacity: u32) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::InvalidConfig(ConfigError::ZeroSize));
        }
        if capacity >= AddressWidth::ThreeByte.max_size() {
            return Err(Error::CapacityTooLarge);
        }
        Ok(Self {
            transport,
            capacity,
            timing: Timing::default(),
        })
    }

    /// Replace the default deadlines and poll budgets
    pub fn with_timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }

    /// Chip size in bytes
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Number of 4 KiB sectors
    pub fn sector_count(&self) -> u32 {
        self.capacity / SECTOR_SIZE
    }

    /// Active timing configuration
    pub fn timing(&self) -> &Timing {
        &self.timing
    }

    /// Get a reference to the underlying transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Get a mutable reference to the underlying transport
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Consume the device and return the transport
    pub fn into_inner(self) -> T {
        self.transport
    }

    fn execute(&mut self, cmd: &mut SpiCommand<'_>) -> Result<()> {
        transport::execute(&mut self.transport, cmd, self.timing.deadlines)
    }

    fn check_range(&self, addr: u32, len: usize) -> Result<()> {
        let end = addr as u64 + len as u64;
        if end > self.capacity as u64 {
            return Err(Error::AddressOutOfRange);
        }
        Ok(())
    }

    /// Software reset: Reset Enable, Reset Device, then the settle delay
    ///
    /// The two opcodes go out as separate chip-select frames, not as one
    /// two-byte `66 99` frame. Reset Enable only latches when CS rises after
    /// it, so a single frame would clock `99` without the enable in effect.
    pub fn reset(&mut self) -> Result<()> {
        self.execute(&mut SpiCommand::simple(opcodes::RSTEN))?;
        self.execute(&mut SpiCommand::simple(opcodes::RST))?;
        self.transport.delay_ms(self.timing.reset_settle_ms);
        log::info!("flash reset");
        Ok(())
    }

    /// Read the 24-bit JEDEC ID
    pub fn read_id(&mut self) -> Result<JedecId> {
        let mut buf = [0u8; 3];
        self.execute(&mut SpiCommand::read_reg(opcodes::RDID, &mut buf))?;
        let id = JedecId::from_bytes(buf);
        log::debug!("JEDEC ID: {}", id);
        Ok(id)
    }

    /// Read the factory-programmed 64-bit unique ID
    pub fn read_unique_id(&mut self) -> Result<u64> {
        let mut buf = [0u8; 8];
        self.execute(&mut SpiCommand::read_id_dummy(opcodes::RDUID, &mut buf))?;
        let id = u64::from_be_bytes(buf);
        log::debug!("unique ID: {:016X}", id);
        Ok(id)
    }

    /// Read the first 256 bytes of the SFDP space
    pub fn read_sfdp(&mut self, buf: &mut [u8; SFDP_DUMP_LEN]) -> Result<()> {
        let max_len = self.transport.max_read_len().max(1);
        let mut offset = 0;

        while offset < buf.len() {
            let chunk_len = core::cmp::min(max_len, buf.len() - offset);
            let chunk = &mut buf[offset..offset + chunk_len];
            let mut cmd = SpiCommand::read_3b(opcodes::RDSFDP, offset as u32, chunk)
                .with_dummy_bytes(1);
            self.execute(&mut cmd)?;
            offset += chunk_len;
        }

        Ok(())
    }

    /// Read status register `reg` (1, 2 or 3)
    ///
    /// Any other selector fails with [`Error::InvalidRegister`] before a
    /// transaction is started.
    pub fn read_status(&mut self, reg: u8) -> Result<u8> {
        let reg = StatusRegister::try_from(reg)?;
        self.read_register(reg)
    }

    /// Read one status register
    pub fn read_register(&mut self, reg: StatusRegister) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.execute(&mut SpiCommand::read_reg(reg.read_opcode(), &mut buf))?;
        Ok(buf[0])
    }

    /// Read status register 1 as flags
    pub fn read_status1(&mut self) -> Result<Status1> {
        self.read_register(StatusRegister::One)
            .map(Status1::from_bits_truncate)
    }

    /// Write status register `reg` (1, 2 or 3)
    ///
    /// An invalid selector is logged and ignored.
    pub fn write_status(&mut self, reg: u8, value: u8) -> Result<()> {
        match StatusRegister::try_from(reg) {
            Ok(reg) => self.write_register(reg, value),
            Err(_) => {
                log::warn!("ignoring write to invalid status register {}", reg);
                Ok(())
            }
        }
    }

    /// Write one status register
    pub fn write_register(&mut self, reg: StatusRegister, value: u8) -> Result<()> {
        let data = [value];
        let mut cmd = SpiCommand::write_reg(reg.write_opcode(), &data);
        let policy = self.timing.status_write;
        self.mutate(&mut cmd, policy)
    }

    /// Plain read (0x03) of `buf.len()` bytes at `addr`
    ///
    /// Reads longer than the transport's `max_read_len` are split into
    /// consecutive transactions.
    pub fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<()> {
        self.read_with(opcodes::READ, 0, addr, buf)
    }

    /// Fast read (0x0B): same data as [`read`](Self::read), one dummy byte
    pub fn fast_read(&mut self, addr: u32, buf: &mut [u8]) -> Result<()> {
        self.read_with(opcodes::FAST_READ, 1, addr, buf)
    }

    fn read_with(&mut self, opcode: u8, dummy: u8, addr: u32, buf: &mut [u8]) -> Result<()> {
        self.check_range(addr, buf.len())?;
        let max_len = self.transport.max_read_len().max(1);
        let mut offset = 0;

        while offset < buf.len() {
            let chunk_len = core::cmp::min(max_len, buf.len() - offset);
            let chunk = &mut buf[offset..offset + chunk_len];
            let mut cmd =
                SpiCommand::read_3b(opcode, addr + offset as u32, chunk).with_dummy_bytes(dummy);
            self.execute(&mut cmd)?;
            offset += chunk_len;
        }

        Ok(())
    }

    /// Send the Write Enable command
    pub fn write_enable(&mut self) -> Result<()> {
        self.execute(&mut SpiCommand::simple(opcodes::WREN))
    }

    /// Send the Write Disable command
    pub fn write_disable(&mut self) -> Result<()> {
        self.execute(&mut SpiCommand::simple(opcodes::WRDI))
    }

    /// Program `data` into page `page` starting at byte `offset` of that page
    ///
    /// The range must stay inside the page. Nothing is sent when the request
    /// is rejected or `data` is empty.
    pub fn program(&mut self, page: u32, offset: u32, data: &[u8]) -> Result<()> {
        if offset as u64 + data.len() as u64 > PAGE_SIZE as u64 {
            return Err(Error::CrossesPageBoundary);
        }
        let addr = page
            .checked_mul(PAGE_SIZE)
            .and_then(|base| base.checked_add(offset))
            .ok_or(Error::AddressOutOfRange)?;
        self.check_range(addr, data.len())?;
        if data.is_empty() {
            return Ok(());
        }

        log::trace!(
            "program page {} offset {} len {} (0x{:06X})",
            page,
            offset,
            data.len(),
            addr
        );
        let mut cmd = SpiCommand::write_3b(opcodes::PP, addr, data);
        let policy = self.timing.page_program;
        self.mutate(&mut cmd, policy)
    }

    /// Erase the 4 KiB sector with index `index`
    pub fn erase_sector(&mut self, index: u32) -> Result<()> {
        if index >= self.sector_count() {
            return Err(Error::AddressOutOfRange);
        }
        let addr = index * SECTOR_SIZE;
        log::trace!("erase sector {} (0x{:06X})", index, addr);
        let mut cmd = SpiCommand::erase_3b(opcodes::SE_20, addr);
        let policy = self.timing.sector_erase;
        self.mutate(&mut cmd, policy)
    }

    /// Erase the whole chip
    pub fn erase_chip(&mut self) -> Result<()> {
        log::debug!("chip erase");
        let mut cmd = SpiCommand::simple(opcodes::CE_60);
        let policy = self.timing.chip_erase;
        self.mutate(&mut cmd, policy)
    }

    /// True while an erase or program is in progress
    pub fn is_busy(&mut self) -> Result<bool> {
        Ok(self.read_status1()?.contains(Status1::BUSY))
    }

    /// Poll status register 1 until BUSY clears
    ///
    /// Reads the register at most `policy.max_polls()` times with
    /// `policy.interval_us` between reads.
    pub fn wait_ready(&mut self, policy: PollPolicy) -> Result<()> {
        for _ in 0..policy.max_polls() {
            if !self.is_busy()? {
                return Ok(());
            }
            if policy.interval_us > 0 {
                self.transport.delay_us(policy.interval_us);
            }
        }

        log::debug!(
            "busy after {} polls ({} us budget)",
            policy.max_polls(),
            policy.timeout_us
        );
        Err(Error::BusyTimeout)
    }

    fn mutate(&mut self, cmd: &mut SpiCommand<'_>, policy: PollPolicy) -> Result<()> {
        self.write_enable()?;
        self.execute(cmd)?;
        self.wait_ready(policy)?;
        self.write_disable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::{MockTransport, MOCK_SIZE};

    fn device() -> FlashDevice<MockTransport> {
        FlashDevice::new(MockTransport::new(), MOCK_SIZE as u32).unwrap()
    }

    #[test]
    fn test_capacity_limit() {
        let err = FlashDevice::new(MockTransport::new(), 16 * 1024 * 1024).err();
        assert_eq!(err, Some(Error::CapacityTooLarge));
        assert!(FlashDevice::new(MockTransport::new(), 16 * 1024 * 1024 - 4096).is_ok());
    }

    #[test]
    fn test_reset_is_two_commands_then_settle() {
        let mut dev = device();
        dev.reset().unwrap();
        let mock = dev.transport();
        assert_eq!(mock.opcodes(), [opcodes::RSTEN, opcodes::RST]);
        // One opcode per frame
        assert!(mock.frames.iter().all(|f| f.tx.len() == 1));
        assert_eq!(mock.selects, 2);
        assert!(mock.delayed_us >= 100_000);
    }

    #[test]
    fn test_identification() {
        let mut dev = device();
        dev.transport_mut().reply(&[0xEF, 0x40, 0x17]);
        dev.transport_mut().reply(&[0xD1, 0x63, 0x48, 0x20, 0x47, 0x31, 0x2B, 0x2C]);
        assert_eq!(dev.read_id().unwrap(), JedecId(0xEF4017));
        assert_eq!(dev.read_unique_id().unwrap(), 0xD163_4820_4731_2B2C);

        let frames = &dev.transport().frames;
        assert_eq!(frames[0].tx, [0x9F]);
        assert_eq!(frames[0].rx_len, 3);
        assert_eq!(frames[1].tx, [0x4B, 0, 0, 0, 0]);
        assert_eq!(frames[1].rx_len, 8);
    }

    #[test]
    fn test_sfdp_framing() {
        let mut dev = device();
        dev.transport_mut().reply(b"SFDP");
        let mut buf = [0u8; SFDP_DUMP_LEN];
        dev.read_sfdp(&mut buf).unwrap();
        assert_eq!(&buf[..4], b"SFDP");
        let frame = &dev.transport().frames[0];
        assert_eq!(frame.tx, [0x5A, 0, 0, 0, 0]);
        assert_eq!(frame.rx_len, 256);
    }

    #[test]
    fn test_invalid_register_no_traffic() {
        let mut dev = device();
        assert_eq!(dev.read_status(0), Err(Error::InvalidRegister(0)));
        assert_eq!(dev.read_status(4), Err(Error::InvalidRegister(4)));
        assert_eq!(dev.write_status(7, 0xFF), Ok(()));
        assert_eq!(dev.transport().selects, 0);
    }

    #[test]
    fn test_write_status_bracketed() {
        let mut dev = device();
        dev.write_status(2, 0x02).unwrap();
        assert_eq!(
            dev.transport().opcodes(),
            [opcodes::WREN, opcodes::WRSR2, opcodes::RDSR, opcodes::WRDI]
        );
        assert_eq!(dev.transport().frames[1].tx, [0x31, 0x02]);

        dev.transport_mut().reply(&[0x02]);
        assert_eq!(dev.read_status(2).unwrap(), 0x02);
        assert_eq!(dev.transport().frames[4].tx, [0x35]);
    }

    #[test]
    fn test_program_sequence() {
        let mut dev = device();
        dev.transport_mut().busy_after_mutation = 3;
        dev.program(1, 16, &[0x12, 0x34]).unwrap();

        let mock = dev.transport();
        assert_eq!(
            mock.opcodes(),
            [
                opcodes::WREN,
                opcodes::PP,
                opcodes::RDSR,
                opcodes::RDSR,
                opcodes::RDSR,
                opcodes::RDSR,
                opcodes::WRDI
            ]
        );
        assert_eq!(mock.programs(), [(0x110, 2)]);
        assert_eq!(&mock.memory[0x110..0x112], &[0x12, 0x34]);
        assert_eq!(mock.ignored_while_busy, 0);
    }

    #[test]
    fn test_program_rejects_page_crossing() {
        let mut dev = device();
        assert_eq!(dev.program(0, 255, &[0, 0]), Err(Error::CrossesPageBoundary));
        let last_page = MOCK_SIZE as u32 / PAGE_SIZE;
        assert_eq!(dev.program(last_page, 0, &[0]), Err(Error::AddressOutOfRange));
        assert!(dev.transport().frames.is_empty());
    }

    #[test]
    fn test_erase_sector() {
        let mut dev = device();
        dev.transport_mut().memory[0x2000..0x3000].fill(0x00);
        dev.erase_sector(2).unwrap();

        let mock = dev.transport();
        assert!(mock.memory[0x2000..0x3000].iter().all(|&b| b == 0xFF));
        assert_eq!(mock.frames_with(opcodes::SE_20)[0].address(), Some(0x2000));
        assert_eq!(dev.erase_sector(16), Err(Error::AddressOutOfRange));
    }

    #[test]
    fn test_busy_wait_is_bounded() {
        let mut dev = device();
        dev.transport_mut().stuck_busy = true;
        assert_eq!(dev.erase_sector(0), Err(Error::BusyTimeout));

        let polls = dev.transport().frames_with(opcodes::RDSR).len() as u32;
        assert_eq!(polls, dev.timing().sector_erase.max_polls());
        assert!(dev.transport().frames_with(opcodes::WRDI).is_empty());
    }

    #[test]
    fn test_read_is_chunked() {
        let mut dev = device();
        dev.transport_mut().memory[..10].copy_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
        dev.transport_mut().max_read = 4;
        let mut buf = [0u8; 10];
        dev.read(0, &mut buf).unwrap();

        assert_eq!(buf, [1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
        let addrs: std::vec::Vec<_> = dev.transport().frames.iter().map(|f| f.address()).collect();
        assert_eq!(addrs, [Some(0), Some(4), Some(8)]);
    }

    #[test]
    fn test_fast_read_matches_read() {
        let mut dev = device();
        dev.transport_mut().memory[0x40..0x44].copy_from_slice(&[9, 8, 7, 6]);
        let mut plain = [0u8; 4];
        let mut fast = [0u8; 4];
        dev.read(0x40, &mut plain).unwrap();
        dev.fast_read(0x40, &mut fast).unwrap();

        assert_eq!(plain, fast);
        assert_eq!(dev.transport().frames[1].tx, [0x0B, 0x00, 0x00, 0x40, 0x00]);
        assert_eq!(dev.read(MOCK_SIZE as u32 - 2, &mut plain), Err(Error::AddressOutOfRange));
    }

    #[test]
    fn test_transport_timeout_propagates() {
        let mut dev = device();
        dev.transport_mut().fail_receive = true;
        assert_eq!(
            dev.read_id(),
            Err(Error::TransportTimeout(crate::error::Phase::Receive))
        );
        assert!(!dev.transport().selected);
    }
}
