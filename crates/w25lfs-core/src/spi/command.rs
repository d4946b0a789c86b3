//! SPI command structure

use super::AddressWidth;

/// Longest header any command produces: opcode, 4 address bytes, 4 dummy bytes
pub const MAX_HEADER_LEN: usize = 1 + 4 + MAX_DUMMY_BYTES;

/// Upper bound on dummy bytes between header and data phase
pub const MAX_DUMMY_BYTES: usize = 4;

/// A single chip-select framed SPI transaction
///
/// Designed to avoid allocation - uses slices for data.
/// The lifetime parameter `'a` ties the command to the buffers it references.
pub struct SpiCommand<'a> {
    /// The opcode byte
    pub opcode: u8,

    /// Address (if any)
    pub address: Option<u32>,

    /// Address width
    pub address_width: AddressWidth,

    /// Number of dummy bytes clocked out after the address
    pub dummy_bytes: u8,

    /// Data to write after opcode/address/dummy
    pub write_data: &'a [u8],

    /// Buffer to read into (mutable)
    pub read_buf: &'a mut [u8],
}

impl<'a> SpiCommand<'a> {
    /// Create a simple command with no address or data (e.g., WREN, WRDI)
    pub fn simple(opcode: u8) -> Self {
        Self {
            opcode,
            address: None,
            address_width: AddressWidth::None,
            dummy_bytes: 0,
            write_data: &[],
            read_buf: &mut [],
        }
    }

    /// Create a read register command with no address (e.g., RDSR, RDID)
    pub fn read_reg(opcode: u8, buf: &'a mut [u8]) -> Self {
        Self {
            opcode,
            address: None,
            address_width: AddressWidth::None,
            dummy_bytes: 0,
            write_data: &[],
            read_buf: buf,
        }
    }

    /// Create a write register command with no address (e.g., WRSR)
    pub fn write_reg(opcode: u8, data: &'a [u8]) -> Self {
        Self {
            opcode,
            address: None,
            address_width: AddressWidth::None,
            dummy_bytes: 0,
            write_data: data,
            read_buf: &mut [],
        }
    }

    /// Create a read command with 3-byte address (e.g., READ)
    pub fn read_3b(opcode: u8, addr: u32, buf: &'a mut [u8]) -> Self {
        Self {
            opcode,
            address: Some(addr),
            address_width: AddressWidth::ThreeByte,
            dummy_bytes: 0,
            write_data: &[],
            read_buf: buf,
        }
    }

    /// Create a fast read command: 3-byte address followed by one dummy byte
    pub fn fast_read_3b(opcode: u8, addr: u32, buf: &'a mut [u8]) -> Self {
        Self::read_3b(opcode, addr, buf).with_dummy_bytes(1)
    }

    /// Create an ID read framed by four dummy bytes instead of an address
    ///
    /// Used by Read Unique ID.
    pub fn read_id_dummy(opcode: u8, buf: &'a mut [u8]) -> Self {
        Self::read_reg(opcode, buf).with_dummy_bytes(4)
    }

    /// Create a write command with 3-byte address (e.g., PP)
    pub fn write_3b(opcode: u8, addr: u32, data: &'a [u8]) -> Self {
        Self {
            opcode,
            address: Some(addr),
            address_width: AddressWidth::ThreeByte,
            dummy_bytes: 0,
            write_data: data,
            read_buf: &mut [],
        }
    }

    /// Create an erase command with 3-byte address
    pub fn erase_3b(opcode: u8, addr: u32) -> Self {
        Self {
            opcode,
            address: Some(addr),
            address_width: AddressWidth::ThreeByte,
            dummy_bytes: 0,
            write_data: &[],
            read_buf: &mut [],
        }
    }

    /// Set the number of dummy bytes, capped at [`MAX_DUMMY_BYTES`]
    pub fn with_dummy_bytes(mut self, count: u8) -> Self {
        debug_assert!(count as usize <= MAX_DUMMY_BYTES);
        self.dummy_bytes = core::cmp::min(count, MAX_DUMMY_BYTES as u8);
        self
    }

    /// Returns true if this command has a read phase
    pub fn has_read(&self) -> bool {
        !self.read_buf.is_empty()
    }

    /// Returns true if this command has a write payload
    pub fn has_write(&self) -> bool {
        !self.write_data.is_empty()
    }

    /// Returns true if this command has an address phase
    pub fn has_address(&self) -> bool {
        self.address.is_some()
    }

    /// Length of opcode + address + dummy bytes
    pub fn header_len(&self) -> usize {
        let address_len = if self.address.is_some() {
            self.address_width.bytes() as usize
        } else {
            0
        };
        1 + address_len + self.dummy_bytes as usize
    }

    /// Encode opcode, big-endian address and zeroed dummy bytes into `buf`
    ///
    /// Returns the number of header bytes written. `buf` must hold at least
    /// [`header_len`](Self::header_len) bytes.
    pub fn encode_header(&self, buf: &mut [u8]) -> usize {
        let len = self.header_len();
        buf[0] = self.opcode;
        let mut pos = 1;
        if let Some(addr) = self.address {
            let width = self.address_width.bytes() as usize;
            self.address_width.encode(addr, &mut buf[pos..pos + width]);
            pos += width;
        }
        buf[pos..len].fill(0);
        len
    }

    /// Total number of bytes clocked while chip-select is asserted
    pub fn total_bytes(&self) -> usize {
        self.header_len() + self.write_data.len() + self.read_buf.len()
    }
}
