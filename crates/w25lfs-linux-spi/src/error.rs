//! Error types for Linux SPI operations

use thiserror::Error;

/// Linux SPI specific errors
#[derive(Debug, Error)]
pub enum LinuxSpiError {
    /// Opening the spidev node or applying a bus setting failed
    #[error("Failed to {what}: {source}")]
    Configure {
        what: String,
        #[source]
        source: std::io::Error,
    },

    /// SPI_IOC_MESSAGE failed
    #[error("SPI transfer failed: {0}")]
    TransferFailed(#[source] std::io::Error),

    /// Invalid programmer option
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Device not specified
    #[error("No device specified. Use dev=/dev/spidevX.Y")]
    NoDevice,
}

impl LinuxSpiError {
    /// Map a failed spidev ioctl, described by `what`
    pub(crate) fn ioctl(what: String, errno: nix::errno::Errno) -> Self {
        LinuxSpiError::Configure {
            what,
            source: std::io::Error::from_raw_os_error(errno as i32),
        }
    }
}

impl From<LinuxSpiError> for w25lfs_core::Error {
    fn from(e: LinuxSpiError) -> Self {
        log::error!("linux_spi: {}", e);
        w25lfs_core::Error::TransportFailed
    }
}

/// Result type for Linux SPI operations
pub type Result<T> = std::result::Result<T, LinuxSpiError>;
