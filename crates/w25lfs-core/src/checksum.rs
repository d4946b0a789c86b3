//! Filesystem metadata checksum
//!
//! Reflected CRC-32 (polynomial 0xEDB88320) computed a nibble at a time from
//! a 16-entry table, low nibble first. There is no final xor and the seed is
//! the caller's: the filesystem starts from `0xFFFF_FFFF` and chains the
//! result of one call into the next.

const RTABLE: [u32; 16] = [
    0x0000_0000,
    0x1db7_1064,
    0x3b6e_20c8,
    0x26d9_30ac,
    0x76dc_4190,
    0x6b6b_51f4,
    0x4db2_6158,
    0x5005_713c,
    0xedb8_8320,
    0xf00f_9344,
    0xd6d6_a3e8,
    0xcb61_b38c,
    0x9b64_c2b0,
    0x86d3_d2d4,
    0xa00a_e278,
    0xbdbd_f21c,
];

/// Fold `data` into `crc`
///
/// `crc32(crc32(seed, a), b) == crc32(seed, a ++ b)` and an empty slice
/// returns the seed unchanged.
pub fn crc32(mut crc: u32, data: &[u8]) -> u32 {
    for &byte in data {
        crc = (crc >> 4) ^ RTABLE[((crc ^ byte as u32) & 0xF) as usize];
        crc = (crc >> 4) ^ RTABLE[((crc ^ (byte as u32 >> 4)) & 0xF) as usize];
    }
    crc
}

/// Streaming form of [`crc32`] for input that arrives in pieces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Crc32 {
    state: u32,
}

impl Crc32 {
    /// Seed used by the filesystem
    pub const INIT: u32 = 0xFFFF_FFFF;

    /// Start from [`Crc32::INIT`]
    pub const fn new() -> Self {
        Self::with_seed(Self::INIT)
    }

    /// Start from an arbitrary seed
    pub const fn with_seed(seed: u32) -> Self {
        Self { state: seed }
    }

    /// Fold more bytes in
    pub fn update(&mut self, data: &[u8]) {
        self.state = crc32(self.state, data);
    }

    /// Current value, usable as the seed of a later call
    pub fn value(&self) -> u32 {
        self.state
    }
}

impl Default for Crc32 {
    fn default() -> Self {
        Self::new()
    }
}
