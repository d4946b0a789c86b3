//! CLI error type

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the command layer on top of the driver's own
#[derive(Debug, Error)]
pub enum CliError {
    #[error("unknown programmer: {name}\n\n{help}\nUse 'w25lfs list-programmers' for more details")]
    UnknownProgrammer { name: String, help: String },

    #[error("failed to read geometry file {}", path.display())]
    GeometryFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid geometry in {}: {source}", path.display())]
    Geometry {
        path: PathBuf,
        #[source]
        source: w25lfs_core::Error,
    },

    #[error("{len} bytes at block {block} offset {offset} do not fit in the device")]
    OutOfRange { block: u32, offset: u32, len: usize },

    #[error("verification failed at 0x{addr:06X}: expected 0x{expected:02X}, found 0x{found:02X}")]
    VerifyMismatch { addr: u32, expected: u8, found: u8 },

    #[error("self-test failed on block {block}: {reason}")]
    Selftest { block: u32, reason: String },

    #[error(transparent)]
    Flash(#[from] w25lfs_core::Error),
}
