//! W25Q-family SPI flash opcodes
//!
//! Only the single-I/O, 3-byte-address command set this driver issues.
//! Values are bit-exact against the Winbond W25Qxx datasheets.

// ============================================================================
// Write control
// ============================================================================

/// Write Enable - required before any write/erase operation
pub const WREN: u8 = 0x06;
/// Write Disable - clears WEL bit in status register
pub const WRDI: u8 = 0x04;

// ============================================================================
// Status register operations
// ============================================================================

/// Read Status Register 1
pub const RDSR: u8 = 0x05;
/// Read Status Register 2
pub const RDSR2: u8 = 0x35;
/// Read Status Register 3
pub const RDSR3: u8 = 0x15;
/// Write Status Register 1
pub const WRSR: u8 = 0x01;
/// Write Status Register 2
pub const WRSR2: u8 = 0x31;
/// Write Status Register 3
pub const WRSR3: u8 = 0x11;

// ============================================================================
// Identification
// ============================================================================

/// Read JEDEC ID (manufacturer + memory type + capacity)
pub const RDID: u8 = 0x9F;
/// Read Unique ID (4 dummy bytes, 8 byte response)
pub const RDUID: u8 = 0x4B;
/// Read SFDP (JEDEC JESD216)
pub const RDSFDP: u8 = 0x5A;

// ============================================================================
// Read, program, erase - 3-byte address
// ============================================================================

/// Read Data
pub const READ: u8 = 0x03;
/// Fast Read (one dummy byte after the address)
pub const FAST_READ: u8 = 0x0B;
/// Page Program
pub const PP: u8 = 0x02;
/// Sector Erase 4KB
pub const SE_20: u8 = 0x20;
/// Chip Erase
pub const CE_60: u8 = 0x60;

// ============================================================================
// Software Reset
// ============================================================================

/// Reset Enable
pub const RSTEN: u8 = 0x66;
/// Reset Device
pub const RST: u8 = 0x99;

// ============================================================================
// Geometry shared by the whole W25Q family
// ============================================================================

/// Program unit: a page program never touches bytes of two pages
pub const PAGE_SIZE: u32 = 256;
/// Erase unit: a sector erase resets this many bytes to 0xFF
pub const SECTOR_SIZE: u32 = 4096;
