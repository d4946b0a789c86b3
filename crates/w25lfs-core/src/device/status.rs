//! Status registers and identification values

use core::fmt;

use bitflags::bitflags;

use crate::error::Error;
use crate::spi::opcodes;

/// One of the three independently addressable status registers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusRegister {
    /// SR1: busy, write enable latch, block protect
    One,
    /// SR2: quad enable, security register locks
    Two,
    /// SR3: output drive strength, write protect selection
    Three,
}

impl StatusRegister {
    /// Opcode that reads this register
    pub const fn read_opcode(self) -> u8 {
        match self {
            Self::One => opcodes::RDSR,
            Self::Two => opcodes::RDSR2,
            Self::Three => opcodes::RDSR3,
        }
    }

    /// Opcode that writes this register
    pub const fn write_opcode(self) -> u8 {
        match self {
            Self::One => opcodes::WRSR,
            Self::Two => opcodes::WRSR2,
            Self::Three => opcodes::WRSR3,
        }
    }

    /// Register number as used in datasheets (1..=3)
    pub const fn number(self) -> u8 {
        match self {
            Self::One => 1,
            Self::Two => 2,
            Self::Three => 3,
        }
    }
}

impl TryFrom<u8> for StatusRegister {
    type Error = Error;

    fn try_from(reg: u8) -> Result<Self, Error> {
        match reg {
            1 => Ok(Self::One),
            2 => Ok(Self::Two),
            3 => Ok(Self::Three),
            other => Err(Error::InvalidRegister(other)),
        }
    }
}

bitflags! {
    /// Status register 1 bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Status1: u8 {
        /// Erase or program in progress
        const BUSY = 1 << 0;
        /// Write enable latch
        const WEL  = 1 << 1;
        /// Block protect bit 0
        const BP0  = 1 << 2;
        /// Block protect bit 1
        const BP1  = 1 << 3;
        /// Block protect bit 2
        const BP2  = 1 << 4;
        /// Top/bottom protect
        const TB   = 1 << 5;
        /// Sector/block protect
        const SEC  = 1 << 6;
        /// Status register protect 0
        const SRP0 = 1 << 7;
    }
}

/// 24-bit JEDEC identification: manufacturer, memory type, capacity code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JedecId(pub u32);

impl JedecId {
    /// Assemble from the three response bytes, first byte most significant
    pub fn from_bytes(bytes: [u8; 3]) -> Self {
        Self(u32::from_be_bytes([0, bytes[0], bytes[1], bytes[2]]))
    }

    /// Manufacturer code (0xEF for Winbond)
    pub fn manufacturer(&self) -> u8 {
        (self.0 >> 16) as u8
    }

    /// Memory type byte
    pub fn memory_type(&self) -> u8 {
        (self.0 >> 8) as u8
    }

    /// Capacity code, log2 of the size in bytes on W25Q parts
    pub fn capacity_code(&self) -> u8 {
        self.0 as u8
    }

    /// Size in bytes implied by the capacity code
    ///
    /// Returns `None` for codes that do not describe a plausible size.
    pub fn capacity_bytes(&self) -> Option<u32> {
        match self.capacity_code() {
            code @ 10..=31 => Some(1u32 << code),
            _ => None,
        }
    }
}

impl fmt::Display for JedecId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:06X}", self.0)
    }
}
