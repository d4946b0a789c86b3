//! Address width types

/// Address width for SPI commands
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AddressWidth {
    /// No address phase
    #[default]
    None,
    /// 3-byte (24-bit) address - supports up to 16 MiB
    ThreeByte,
    /// 4-byte (32-bit) address
    ///
    /// Not issued by [`FlashDevice`](crate::device::FlashDevice), which
    /// rejects chips of 16 MiB and above. This is where 4-byte mode plugs in.
    FourByte,
}

impl AddressWidth {
    /// Returns the number of address bytes
    pub const fn bytes(&self) -> u8 {
        match self {
            Self::None => 0,
            Self::ThreeByte => 3,
            Self::FourByte => 4,
        }
    }

    /// Returns the maximum addressable size in bytes
    pub const fn max_size(&self) -> u32 {
        match self {
            Self::None => 0,
            Self::ThreeByte => 16 * 1024 * 1024, // 16 MiB
            Self::FourByte => u32::MAX,
        }
    }

    /// Encode an address into bytes, most significant first
    pub fn encode(&self, address: u32, buf: &mut [u8]) {
        match self {
            Self::None => {}
            Self::ThreeByte => {
                buf[0] = (address >> 16) as u8;
                buf[1] = (address >> 8) as u8;
                buf[2] = address as u8;
            }
            Self::FourByte => {
                buf[..4].copy_from_slice(&address.to_be_bytes());
            }
        }
    }

    /// Decode a big-endian address from the start of `buf`
    ///
    /// Returns `None` when `buf` is shorter than the address.
    pub fn decode(&self, buf: &[u8]) -> Option<u32> {
        match self {
            Self::None => Some(0),
            Self::ThreeByte => match buf {
                [a, b, c, ..] => Some(u32::from_be_bytes([0, *a, *b, *c])),
                _ => None,
            },
            Self::FourByte => match buf {
                [a, b, c, d, ..] => Some(u32::from_be_bytes([*a, *b, *c, *d])),
                _ => None,
            },
        }
    }
}
