//! w25lfs-dummy - In-memory W25Q flash emulator for testing
//!
//! [`DummyFlash`] implements [`Transport`] by decoding the byte stream of
//! each chip-select frame the way a W25Q chip does: reads, IDs, SFDP and
//! status are answered while the frame is open, program/erase/register
//! writes take effect when chip-select is released. It keeps a transaction
//! log and can inject faults, which makes it the test bench for everything
//! above the transport.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(feature = "alloc")]
use alloc::vec;
#[cfg(feature = "alloc")]
use alloc::vec::Vec;

#[cfg(feature = "alloc")]
use w25lfs_core::error::{Error, Phase, Result};
#[cfg(feature = "alloc")]
use w25lfs_core::spi::{opcodes, AddressWidth};
#[cfg(feature = "alloc")]
use w25lfs_core::transport::Transport;

/// Configuration for the dummy flash
#[derive(Debug, Clone)]
pub struct DummyConfig {
    /// JEDEC manufacturer ID
    pub manufacturer_id: u8,
    /// JEDEC device ID
    pub device_id: u16,
    /// Factory unique ID
    pub unique_id: u64,
    /// Flash size in bytes
    pub size: usize,
    /// Page size for programming
    pub page_size: usize,
    /// Sector size for smallest erase
    pub sector_size: usize,
    /// Status reads that report BUSY after each program or erase
    pub busy_polls: u32,
    /// Largest receive phase per transaction
    pub max_read_len: usize,
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self {
            manufacturer_id: 0xEF, // Winbond
            device_id: 0x4017,     // W25Q64
            unique_id: 0xD163_4820_4731_2B2C,
            size: 8 * 1024 * 1024,
            page_size: 256,
            sector_size: 4096,
            busy_polls: 2,
            max_read_len: 4096,
        }
    }
}

/// Failure the emulator can be told to produce
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Every transmit fails with a transmit timeout
    TransmitTimeout,
    /// Every receive fails with a receive timeout
    ReceiveTimeout,
}

/// One chip-select frame as the emulator saw it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transaction {
    /// First byte of the frame
    pub opcode: u8,
    /// Decoded 24-bit address for addressed commands
    pub address: Option<u32>,
    /// Bytes clocked out by the host, opcode included
    pub tx_len: usize,
    /// Bytes clocked back to the host
    pub rx_len: usize,
}

#[cfg(feature = "alloc")]
fn is_addressed(opcode: u8) -> bool {
    matches!(
        opcode,
        opcodes::READ | opcodes::FAST_READ | opcodes::PP | opcodes::SE_20 | opcodes::RDSFDP
    )
}

/// Dummy flash chip
///
/// Emulates a W25Q chip in memory for testing purposes.
#[cfg(feature = "alloc")]
pub struct DummyFlash {
    config: DummyConfig,
    data: Vec<u8>,
    sfdp: [u8; 256],
    status: [u8; 3],
    write_enabled: bool,
    reset_enabled: bool,
    busy_remaining: u32,
    stuck_busy: bool,
    selected: bool,
    tx: Vec<u8>,
    rx_len: usize,
    log: Vec<Transaction>,
    ignored_while_busy: u32,
    resets: u32,
    fault: Option<Fault>,
}

#[cfg(feature = "alloc")]
impl DummyFlash {
    /// Create a new dummy flash with the given configuration
    pub fn new(config: DummyConfig) -> Self {
        let data = vec![0xFF; config.size];
        let sfdp = synthesize_sfdp(&config);
        Self {
            config,
            data,
            sfdp,
            status: [0; 3],
            write_enabled: false,
            reset_enabled: false,
            busy_remaining: 0,
            stuck_busy: false,
            selected: false,
            tx: Vec::new(),
            rx_len: 0,
            log: Vec::new(),
            ignored_while_busy: 0,
            resets: 0,
            fault: None,
        }
    }

    /// Create a new dummy flash with default configuration (W25Q64)
    pub fn new_default() -> Self {
        Self::new(DummyConfig::default())
    }

    /// Create a dummy flash with pre-filled data
    pub fn with_data(config: DummyConfig, initial_data: &[u8]) -> Self {
        let mut flash = Self::new(config);
        let len = core::cmp::min(initial_data.len(), flash.data.len());
        flash.data[..len].copy_from_slice(&initial_data[..len]);
        flash
    }

    /// Get a reference to the flash data
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Get a mutable reference to the flash data
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Get the configuration
    pub fn config(&self) -> &DummyConfig {
        &self.config
    }

    /// Every frame since creation or the last [`clear_log`](Self::clear_log)
    pub fn transactions(&self) -> &[Transaction] {
        &self.log
    }

    /// Number of logged frames
    pub fn transaction_count(&self) -> usize {
        self.log.len()
    }

    /// Forget logged frames
    pub fn clear_log(&mut self) {
        self.log.clear();
    }

    /// `(address, length)` of every logged page program
    pub fn program_ops(&self) -> Vec<(u32, usize)> {
        self.log
            .iter()
            .filter(|t| t.opcode == opcodes::PP)
            .map(|t| (t.address.unwrap_or(0), t.tx_len.saturating_sub(4)))
            .collect()
    }

    /// Commands dropped because they arrived while the chip was busy
    pub fn ignored_while_busy(&self) -> u32 {
        self.ignored_while_busy
    }

    /// Completed software resets
    pub fn resets(&self) -> u32 {
        self.resets
    }

    /// Keep BUSY set forever, or release it
    pub fn set_stuck_busy(&mut self, stuck: bool) {
        self.stuck_busy = stuck;
    }

    /// Make every following transaction fail
    pub fn inject_fault(&mut self, fault: Fault) {
        self.fault = Some(fault);
    }

    /// Stop failing
    pub fn clear_fault(&mut self) {
        self.fault = None;
    }

    fn is_busy(&self) -> bool {
        self.stuck_busy || self.busy_remaining > 0
    }

    fn frame_address(&self) -> Option<u32> {
        let opcode = *self.tx.first()?;
        if !is_addressed(opcode) {
            return None;
        }
        AddressWidth::ThreeByte.decode(&self.tx[1..])
    }

    fn status1(&mut self) -> u8 {
        let busy = self.is_busy();
        if self.busy_remaining > 0 {
            self.busy_remaining -= 1;
        }
        let mut value = self.status[0] & !0x03;
        if self.write_enabled {
            value |= 0x02;
        }
        if busy {
            value |= 0x01;
        }
        value
    }

    fn handle_receive(&mut self, buf: &mut [u8]) {
        let opcode = self.tx.first().copied().unwrap_or(0);
        if opcode == opcodes::RDSR {
            let value = self.status1();
            buf.fill(value);
            return;
        }
        if self.is_busy() {
            self.ignored_while_busy += 1;
            buf.fill(0xFF);
            return;
        }

        let addr = self.frame_address().unwrap_or(0) as usize;
        match opcode {
            opcodes::RDSR2 => buf.fill(self.status[1]),
            opcodes::RDSR3 => buf.fill(self.status[2]),
            opcodes::RDID => {
                let id = [
                    self.config.manufacturer_id,
                    (self.config.device_id >> 8) as u8,
                    self.config.device_id as u8,
                ];
                copy_cycled(buf, &id);
            }
            opcodes::RDUID => copy_cycled(buf, &self.config.unique_id.to_be_bytes()),
            opcodes::RDSFDP => {
                for (i, byte) in buf.iter_mut().enumerate() {
                    *byte = self.sfdp.get(addr + i).copied().unwrap_or(0xFF);
                }
            }
            opcodes::READ | opcodes::FAST_READ => {
                // Sequential reads wrap at the end of the array
                let size = self.data.len();
                for (i, byte) in buf.iter_mut().enumerate() {
                    *byte = self.data[(addr + i) % size];
                }
            }
            other => {
                log::warn!("dummy: read with unsupported opcode 0x{:02X}", other);
                buf.fill(0xFF);
            }
        }
    }

    fn handle_frame_end(&mut self) {
        let opcode = match self.tx.first() {
            Some(&op) => op,
            None => return,
        };
        if self.is_busy() {
            log::debug!("dummy: opcode 0x{:02X} ignored while busy", opcode);
            self.ignored_while_busy += 1;
            return;
        }

        match opcode {
            opcodes::WREN => self.write_enabled = true,
            opcodes::WRDI => self.write_enabled = false,
            opcodes::RSTEN => self.reset_enabled = true,
            opcodes::RST => {
                if self.reset_enabled {
                    self.write_enabled = false;
                    self.status = [0; 3];
                    self.resets += 1;
                }
                self.reset_enabled = false;
            }
            opcodes::PP | opcodes::SE_20 | opcodes::CE_60 => {
                if self.check_write_enabled(opcode) {
                    match opcode {
                        opcodes::PP => self.handle_page_program(),
                        opcodes::SE_20 => self.handle_sector_erase(),
                        _ => self.data.fill(0xFF),
                    }
                    self.finish_mutation();
                }
            }
            opcodes::WRSR | opcodes::WRSR2 | opcodes::WRSR3 => {
                if self.check_write_enabled(opcode) {
                    let index = match opcode {
                        opcodes::WRSR => 0,
                        opcodes::WRSR2 => 1,
                        _ => 2,
                    };
                    if let Some(&value) = self.tx.get(1) {
                        // BUSY and WEL are read-only
                        self.status[index] = if index == 0 { value & !0x03 } else { value };
                    }
                    self.finish_mutation();
                }
            }
            // A read whose receive phase never happened
            opcodes::READ
            | opcodes::FAST_READ
            | opcodes::RDID
            | opcodes::RDUID
            | opcodes::RDSFDP
            | opcodes::RDSR
            | opcodes::RDSR2
            | opcodes::RDSR3 => {}
            other => log::warn!("dummy: unsupported opcode 0x{:02X}", other),
        }
        if opcode != opcodes::RSTEN {
            self.reset_enabled = false;
        }
    }

    fn check_write_enabled(&self, opcode: u8) -> bool {
        if !self.write_enabled {
            log::warn!("dummy: opcode 0x{:02X} without write enable ignored", opcode);
        }
        self.write_enabled
    }

    fn finish_mutation(&mut self) {
        self.write_enabled = false;
        self.busy_remaining = self.config.busy_polls;
    }

    fn handle_page_program(&mut self) {
        let addr = match self.frame_address() {
            Some(addr) if (addr as usize) < self.data.len() => addr as usize,
            other => {
                log::warn!("dummy: page program at invalid address {:?}", other);
                return;
            }
        };
        let page_size = self.config.page_size;
        let page_base = addr - addr % page_size;
        let offset = addr - page_base;

        // Flash programming: can only change 1 -> 0, wrapping inside the page
        for (i, &byte) in self.tx[4..].iter().enumerate() {
            let target = page_base + (offset + i) % page_size;
            if let Some(cell) = self.data.get_mut(target) {
                *cell &= byte;
            }
        }
    }

    fn handle_sector_erase(&mut self) {
        let sector_size = self.config.sector_size;
        let addr = match self.frame_address() {
            Some(addr) if (addr as usize) < self.data.len() => addr as usize,
            other => {
                log::warn!("dummy: sector erase at invalid address {:?}", other);
                return;
            }
        };
        let start = addr - addr % sector_size;
        let end = core::cmp::min(start + sector_size, self.data.len());
        self.data[start..end].fill(0xFF);
    }
}

#[cfg(feature = "alloc")]
fn copy_cycled(buf: &mut [u8], src: &[u8]) {
    for (dst, byte) in buf.iter_mut().zip(src.iter().cycle()) {
        *dst = *byte;
    }
}

/// SFDP header plus a 16-DWORD Basic Flash Parameter Table at 0x30
#[cfg(feature = "alloc")]
fn synthesize_sfdp(config: &DummyConfig) -> [u8; 256] {
    let mut sfdp = [0xFFu8; 256];
    sfdp[..8].copy_from_slice(&[0x53, 0x46, 0x44, 0x50, 0x06, 0x01, 0x00, 0xFF]);
    sfdp[8..16].copy_from_slice(&[0x00, 0x06, 0x01, 0x10, 0x30, 0x00, 0x00, 0xFF]);

    // 4 KiB erase supported with 0x20
    let dword1: u32 = 0xFFF1_00E5 | ((opcodes::SE_20 as u32) << 8);
    let dword2: u32 = (config.size as u64 * 8 - 1) as u32;
    let page_exp = config.page_size.trailing_zeros();
    let dword11: u32 = 0xFFFF_FF0F | (page_exp << 4);

    sfdp[0x30..0x34].copy_from_slice(&dword1.to_le_bytes());
    sfdp[0x34..0x38].copy_from_slice(&dword2.to_le_bytes());
    sfdp[0x58..0x5C].copy_from_slice(&dword11.to_le_bytes());
    sfdp
}

#[cfg(feature = "alloc")]
impl Transport for DummyFlash {
    fn select(&mut self) -> Result<()> {
        if self.selected {
            log::warn!("dummy: chip-select asserted twice");
        }
        self.selected = true;
        self.tx.clear();
        self.rx_len = 0;
        Ok(())
    }

    fn deselect(&mut self) -> Result<()> {
        if !self.selected {
            log::warn!("dummy: chip-select released while idle");
            return Ok(());
        }
        self.selected = false;
        if let Some(&opcode) = self.tx.first() {
            self.log.push(Transaction {
                opcode,
                address: self.frame_address(),
                tx_len: self.tx.len(),
                rx_len: self.rx_len,
            });
            if self.rx_len == 0 {
                self.handle_frame_end();
            }
        }
        Ok(())
    }

    fn transmit(&mut self, data: &[u8], _timeout_ms: u32) -> Result<()> {
        if self.fault == Some(Fault::TransmitTimeout) {
            return Err(Error::TransportTimeout(Phase::Transmit));
        }
        self.tx.extend_from_slice(data);
        Ok(())
    }

    fn receive(&mut self, buf: &mut [u8], _timeout_ms: u32) -> Result<()> {
        if self.fault == Some(Fault::ReceiveTimeout) {
            return Err(Error::TransportTimeout(Phase::Receive));
        }
        self.handle_receive(buf);
        self.rx_len += buf.len();
        Ok(())
    }

    fn max_read_len(&self) -> usize {
        self.config.max_read_len
    }

    fn delay_us(&mut self, _us: u32) {
        // No delay needed for in-memory operations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use w25lfs_core::blockdev::{to_code, BlockDevice, BlockDeviceConfig, FlashBlockDevice};
    use w25lfs_core::checksum::crc32;
    use w25lfs_core::device::{FlashDevice, JedecId};
    use w25lfs_core::sfdp;
    use w25lfs_core::spi::SpiCommand;
    use w25lfs_core::transport::{execute, Deadlines};

    fn device() -> FlashDevice<DummyFlash> {
        let flash = DummyFlash::new_default();
        let size = flash.config().size as u32;
        FlashDevice::new(flash, size).unwrap()
    }

    fn block_device() -> FlashBlockDevice<DummyFlash> {
        FlashBlockDevice::new(device(), BlockDeviceConfig::default()).unwrap()
    }

    fn pattern(len: usize, seed: u8) -> Vec<u8> {
        (0..len)
            .map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed))
            .collect()
    }

    fn raw(flash: &mut DummyFlash, cmd: &mut SpiCommand<'_>) {
        execute(flash, cmd, Deadlines::default()).unwrap();
    }

    #[test]
    fn test_identify() {
        let mut dev = device();
        dev.reset().unwrap();
        assert_eq!(dev.read_id().unwrap(), JedecId(0xEF4017));
        assert_eq!(dev.read_unique_id().unwrap(), 0xD163_4820_4731_2B2C);
        assert_eq!(dev.transport().resets(), 1);
    }

    #[test]
    fn test_sfdp_describes_geometry() {
        let mut dev = device();
        let mut dump = [0u8; sfdp::SFDP_DUMP_LEN];
        dev.read_sfdp(&mut dump).unwrap();
        let basic = sfdp::parse(&dump).unwrap().basic.unwrap();
        assert_eq!(basic.density_bytes, 8 * 1024 * 1024);
        assert_eq!(basic.page_size, 256);
        assert_eq!(basic.erase_4k_opcode, Some(opcodes::SE_20));
    }

    #[test]
    fn test_round_trip() {
        let mut bd = block_device();
        let cases = [
            (0u32, 0u32, 1usize),
            (1, 0, 4096),
            (2, 255, 2),
            (3, 17, 1000),
            (2047, 3840, 256),
            (100, 4095, 1),
        ];
        for (i, &(block, offset, size)) in cases.iter().enumerate() {
            let data = pattern(size, i as u8);
            bd.erase(block).unwrap();
            bd.prog(block, offset, &data).unwrap();
            let mut back = vec![0u8; size];
            bd.read(block, offset, &mut back).unwrap();
            assert_eq!(back, data, "block {} offset {} size {}", block, offset, size);
        }
        assert_eq!(bd.flash().transport().ignored_while_busy(), 0);
    }

    #[test]
    fn test_program_counts() {
        let mut bd = block_device();
        bd.prog(0, 0, &[0u8; 256]).unwrap();
        assert_eq!(bd.flash().transport().program_ops(), [(0, 256)]);

        bd.flash_mut().transport_mut().clear_log();
        bd.prog(1, 0, &[0u8; 257]).unwrap();
        assert_eq!(bd.flash().transport().program_ops(), [(4096, 256), (4096 + 256, 1)]);

        bd.flash_mut().transport_mut().clear_log();
        bd.prog(2, 255, &[0u8; 2]).unwrap();
        assert_eq!(
            bd.flash().transport().program_ops(),
            [(2 * 4096 + 255, 1), (2 * 4096 + 256, 1)]
        );
    }

    #[test]
    fn test_programs_never_cross_a_page() {
        let mut bd = block_device();
        for offset in [0u32, 1, 128, 255, 256, 1000, 3000] {
            for size in [1usize, 100, 256, 257, 511, 1096] {
                if offset as usize + size > 4096 {
                    continue;
                }
                bd.prog(5, offset, &pattern(size, 1)).unwrap();
            }
        }
        let ops = bd.flash().transport().program_ops();
        assert!(!ops.is_empty());
        for (addr, len) in ops {
            assert!(len > 0);
            assert!(addr as usize % 256 + len <= 256, "0x{:X}+{}", addr, len);
        }
    }

    #[test]
    fn test_erase_sets_ones() {
        let mut bd = block_device();
        bd.prog(9, 0, &[0u8; 4096]).unwrap();
        bd.erase(9).unwrap();
        let mut back = vec![0u8; 4096];
        bd.read(9, 0, &mut back).unwrap();
        assert!(back.iter().all(|&b| b == 0xFF));
        assert!(bd.flash().transport().data()[8 * 4096..9 * 4096].iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn test_program_only_clears_bits() {
        let mut bd = block_device();
        bd.prog(0, 0, &[0xF0]).unwrap();
        bd.prog(0, 0, &[0x3C]).unwrap();
        let mut back = [0u8; 1];
        bd.read(0, 0, &mut back).unwrap();
        assert_eq!(back, [0x30]);
    }

    #[test]
    fn test_busy_wait_is_bounded() {
        let mut dev = device();
        dev.transport_mut().set_stuck_busy(true);
        assert_eq!(dev.erase_sector(0), Err(Error::BusyTimeout));

        let polls = dev
            .transport()
            .transactions()
            .iter()
            .filter(|t| t.opcode == opcodes::RDSR)
            .count() as u32;
        assert_eq!(polls, dev.timing().sector_erase.max_polls());
    }

    #[test]
    fn test_transport_faults() {
        let mut bd = block_device();
        bd.flash_mut().transport_mut().inject_fault(Fault::ReceiveTimeout);
        let mut buf = [0u8; 4];
        assert_eq!(
            bd.read(0, 0, &mut buf),
            Err(Error::TransportTimeout(Phase::Receive))
        );

        bd.flash_mut().transport_mut().inject_fault(Fault::TransmitTimeout);
        let err = bd.prog(0, 0, &buf).unwrap_err();
        assert_eq!(err, Error::TransportTimeout(Phase::Transmit));
        assert_eq!(to_code(Err(err)), -5);

        bd.flash_mut().transport_mut().clear_fault();
        assert!(bd.read(0, 0, &mut buf).is_ok());
    }

    #[test]
    fn test_invalid_register_without_traffic() {
        let mut dev = device();
        assert_eq!(dev.read_status(0), Err(Error::InvalidRegister(0)));
        assert_eq!(dev.read_status(4), Err(Error::InvalidRegister(4)));
        assert_eq!(dev.transport().transaction_count(), 0);
    }

    #[test]
    fn test_status_write_persists() {
        let mut dev = device();
        dev.write_status(3, 0x60).unwrap();
        assert_eq!(dev.read_status(3).unwrap(), 0x60);
        dev.write_status(1, 0xFF).unwrap();
        assert_eq!(dev.read_status(1).unwrap(), 0xFC);
    }

    #[test]
    fn test_program_without_wren_is_ignored() {
        let mut flash = DummyFlash::new_default();
        let data = [0x12, 0x34];
        raw(&mut flash, &mut SpiCommand::write_3b(opcodes::PP, 0x100, &data));
        assert_eq!(&flash.data()[0x100..0x102], &[0xFF, 0xFF]);
    }

    #[test]
    fn test_page_program_wraps() {
        let mut flash = DummyFlash::new_default();
        raw(&mut flash, &mut SpiCommand::simple(opcodes::WREN));
        raw(&mut flash, &mut SpiCommand::write_3b(opcodes::PP, 0x1FF, &[0xAA, 0xBB]));
        assert_eq!(flash.data()[0x1FF], 0xAA);
        assert_eq!(flash.data()[0x100], 0xBB);
        assert_eq!(flash.data()[0x200], 0xFF);
    }

    #[test]
    fn test_commands_while_busy_are_dropped() {
        let mut flash = DummyFlash::new_default();
        raw(&mut flash, &mut SpiCommand::simple(opcodes::WREN));
        raw(&mut flash, &mut SpiCommand::erase_3b(opcodes::SE_20, 0));
        raw(&mut flash, &mut SpiCommand::simple(opcodes::WREN));
        assert_eq!(flash.ignored_while_busy(), 1);
    }

    #[test]
    fn test_sealed_records_survive() {
        let mut bd = block_device();
        bd.erase(7).unwrap();
        let mut offset = 3u32;
        for len in [5usize, 300, 17, 1000] {
            let mut record = pattern(len, len as u8);
            let crc = crc32(0xFFFF_FFFF, &record);
            record.extend_from_slice(&crc.to_le_bytes());
            bd.prog(7, offset, &record).unwrap();

            let mut back = vec![0u8; record.len()];
            bd.read(7, offset, &mut back).unwrap();
            let (body, tail) = back.split_at(len);
            assert_eq!(crc32(0xFFFF_FFFF, body).to_le_bytes(), tail);
            offset += record.len() as u32 + 11;
        }
    }
}
