//! Error types for w25lfs-core
//!
//! This module provides a no_std compatible error type that is shared by
//! every driver layer. Layers never retry: the first failure is reported
//! verbatim and the caller decides what to do with it.

use core::fmt;

use crate::blockdev::Status;

/// Which half of a transaction ran out of time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Command, address and payload bytes going out
    Transmit,
    /// Response bytes coming back
    Receive,
}

/// Reasons a [`BlockDeviceConfig`](crate::blockdev::BlockDeviceConfig) is rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// A size or count is zero
    ZeroSize,
    /// Block size differs from the chip's erase sector
    BlockSizeNotSector,
    /// Read or program size does not divide the block size
    UnalignedGranularity,
    /// Cache size is not a multiple of read/prog size or does not divide the block size
    BadCacheSize,
    /// Lookahead size is not a multiple of 8
    BadLookaheadSize,
    /// Geometry file could not be parsed
    Unparsable,
    /// Geometry covers more bytes than the chip has
    ExceedsDevice,
}

/// Core error type - no_std compatible, Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    // Transport errors
    /// A transmit or receive did not complete within its deadline
    TransportTimeout(Phase),
    /// The underlying link reported a failure
    TransportFailed,

    // Device errors
    /// A program/erase busy-wait exceeded its poll budget
    BusyTimeout,
    /// Status register selector outside 1..=3; no transaction was issued
    InvalidRegister(u8),

    // Address/size errors
    /// Block, offset or length falls outside the device
    AddressOutOfRange,
    /// A single page program would touch bytes of two pages
    CrossesPageBoundary,
    /// Chip capacity needs more than 3 address bytes
    CapacityTooLarge,

    // Configuration errors
    /// Block device geometry is inconsistent
    InvalidConfig(ConfigError),
}

impl Error {
    /// Map onto the block-device contract's status code
    ///
    /// Caller contract violations become `Inval`, everything that went wrong
    /// on the wire or in the chip becomes `Io`.
    pub fn status(&self) -> Status {
        match self {
            Self::AddressOutOfRange
            | Self::CrossesPageBoundary
            | Self::InvalidRegister(_)
            | Self::CapacityTooLarge
            | Self::InvalidConfig(_) => Status::Inval,
            Self::TransportTimeout(_) | Self::TransportFailed | Self::BusyTimeout => Status::Io,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transmit => write!(f, "transmit"),
            Self::Receive => write!(f, "receive"),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroSize => write!(f, "sizes and counts must be non-zero"),
            Self::BlockSizeNotSector => write!(f, "block size must equal the erase sector size"),
            Self::UnalignedGranularity => {
                write!(f, "read and prog size must divide the block size")
            }
            Self::BadCacheSize => write!(
                f,
                "cache size must be a multiple of read/prog size and divide the block size"
            ),
            Self::BadLookaheadSize => write!(f, "lookahead size must be a multiple of 8"),
            Self::Unparsable => write!(f, "geometry file could not be parsed"),
            Self::ExceedsDevice => write!(f, "geometry is larger than the flash chip"),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TransportTimeout(phase) => write!(f, "SPI {} timed out", phase),
            Self::TransportFailed => write!(f, "SPI transfer failed"),
            Self::BusyTimeout => write!(f, "flash stayed busy past its timeout"),
            Self::InvalidRegister(reg) => write!(f, "invalid status register {}", reg),
            Self::AddressOutOfRange => write!(f, "address out of range"),
            Self::CrossesPageBoundary => write!(f, "page program crosses a page boundary"),
            Self::CapacityTooLarge => {
                write!(f, "capacity needs 4-byte addressing (must be below 16 MiB)")
            }
            Self::InvalidConfig(e) => write!(f, "invalid block device config: {}", e),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;
