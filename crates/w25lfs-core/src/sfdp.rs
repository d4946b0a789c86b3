//! SFDP (Serial Flash Discoverable Parameters) decoding
//!
//! Decodes the first 256 bytes of the SFDP space as returned by
//! [`FlashDevice::read_sfdp`](crate::device::FlashDevice::read_sfdp): the
//! header, the parameter headers and the few Basic Flash Parameter Table
//! fields this driver cares about (density, 4 KiB erase opcode, page size).
//! A table that points outside the dump is reported as absent.

/// Length of the SFDP dump read from the chip
pub const SFDP_DUMP_LEN: usize = 256;

/// SFDP signature "SFDP" in little-endian
pub const SFDP_SIGNATURE: u32 = 0x50444653;

/// Basic Flash Parameter Table ID
pub const PARAM_ID_BASIC: u16 = 0xFF00;

/// SFDP revision (major.minor)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SfdpRevision {
    /// Major revision number
    pub major: u8,
    /// Minor revision number
    pub minor: u8,
}

/// SFDP header at address 0
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SfdpHeader {
    /// SFDP signature (should be 0x50444653)
    pub signature: u32,
    /// SFDP revision
    pub revision: SfdpRevision,
    /// Number of parameter headers (0-based, so actual count is nph + 1)
    pub nph: u8,
    /// Access protocol (0xFF for legacy)
    pub access_protocol: u8,
}

impl SfdpHeader {
    /// Parse SFDP header from raw bytes
    ///
    /// Expects 8 bytes in little-endian format.
    pub fn parse(data: &[u8; 8]) -> Self {
        Self {
            signature: u32::from_le_bytes([data[0], data[1], data[2], data[3]]),
            revision: SfdpRevision {
                minor: data[4],
                major: data[5],
            },
            nph: data[6],
            access_protocol: data[7],
        }
    }

    /// Check if the signature is valid
    pub fn is_valid(&self) -> bool {
        self.signature == SFDP_SIGNATURE
    }

    /// Get the number of parameter headers
    pub fn num_param_headers(&self) -> usize {
        (self.nph as usize) + 1
    }
}

/// Parameter header structure (8 bytes each, starting at address 0x08)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ParameterHeader {
    /// Parameter ID (MSB << 8 | LSB)
    pub id: u16,
    /// Parameter table revision
    pub revision: SfdpRevision,
    /// Parameter table length in DWORDs
    pub length_dwords: u8,
    /// Parameter table pointer (24-bit byte address)
    pub table_pointer: u32,
}

impl ParameterHeader {
    /// Parse a parameter header from raw bytes
    ///
    /// Expects 8 bytes in little-endian format.
    pub fn parse(data: &[u8; 8]) -> Self {
        Self {
            id: ((data[7] as u16) << 8) | (data[0] as u16),
            revision: SfdpRevision {
                minor: data[1],
                major: data[2],
            },
            length_dwords: data[3],
            table_pointer: u32::from_le_bytes([data[4], data[5], data[6], 0]),
        }
    }

    /// Get the table length in bytes
    pub fn length_bytes(&self) -> usize {
        (self.length_dwords as usize) * 4
    }

    /// Check if this is the Basic Flash Parameter Table
    pub fn is_basic(&self) -> bool {
        self.id == PARAM_ID_BASIC
    }
}

/// Fields decoded from the Basic Flash Parameter Table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BasicFlashParams {
    /// Chip size in bytes
    pub density_bytes: u64,
    /// Opcode for 4 KiB erase, if the chip has one
    pub erase_4k_opcode: Option<u8>,
    /// Page program size in bytes
    pub page_size: u32,
}

/// Decoded SFDP dump
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sfdp {
    /// Header at address 0
    pub header: SfdpHeader,
    /// Basic Flash Parameter Table, when present inside the dump
    pub basic: Option<BasicFlashParams>,
}

fn eight(dump: &[u8], at: usize) -> Option<&[u8; 8]> {
    dump.get(at..at + 8)?.try_into().ok()
}

/// Decode a dump; `None` when the signature is wrong
pub fn parse(dump: &[u8; SFDP_DUMP_LEN]) -> Option<Sfdp> {
    let header = SfdpHeader::parse(eight(dump, 0)?);
    if !header.is_valid() {
        log::debug!("SFDP signature invalid (expected 'SFDP')");
        return None;
    }
    log::debug!(
        "SFDP revision {}.{}, {} parameter header(s)",
        header.revision.major,
        header.revision.minor,
        header.num_param_headers()
    );

    let basic = (0..header.num_param_headers())
        .map_while(|i| eight(dump, 0x08 + i * 8).map(ParameterHeader::parse))
        .find(ParameterHeader::is_basic)
        .and_then(|ph| parse_basic(dump, &ph));

    Some(Sfdp { header, basic })
}

fn parse_basic(dump: &[u8], ph: &ParameterHeader) -> Option<BasicFlashParams> {
    let start = ph.table_pointer as usize;
    let table = dump.get(start..start + ph.length_bytes())?;
    let dword = |n: usize| -> Option<u32> {
        let bytes = table.get(n * 4..n * 4 + 4)?;
        Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    };

    // DWORD 1 bits [1:0] = 01b when 4 KiB erase exists, opcode in [15:8]
    let dword1 = dword(0)?;
    let erase_4k_opcode = ((dword1 & 0x03) == 0x01).then_some((dword1 >> 8) as u8);

    // DWORD 2 bit 31 selects bit count (0) or 2^N bits (1)
    let dword2 = dword(1)?;
    let density_bytes = if dword2 & (1 << 31) == 0 {
        ((dword2 & 0x7FFF_FFFF) as u64 + 1) / 8
    } else {
        let n = dword2 & 0x7FFF_FFFF;
        if !(3..=63).contains(&n) {
            return None;
        }
        1u64 << (n - 3)
    };

    // DWORD 11 bits [7:4] = N, page size 2^N
    let page_size = match dword(10).map(|d| (d >> 4) & 0x0F) {
        Some(exp) if exp > 0 => 1u32 << exp,
        _ => 256,
    };

    Some(BasicFlashParams {
        density_bytes,
        erase_4k_opcode,
        page_size,
    })
}
