//! CLI command implementations
//!
//! Every command that touches a chip opens it the same way: load the
//! geometry, open the programmer's transport, wrap it in a
//! [`FlashDevice`], reset it and, for block-level commands, mount a
//! [`FlashBlockDevice`] on top.

mod crc;
mod erase;
mod list;
mod probe;
mod read;
mod selftest;
mod write;

pub use crc::run_crc;
pub use erase::{run_erase_blocks, run_erase_chip};
pub use list::list_programmers;
pub use probe::run_probe;
pub use read::run_read;
pub use selftest::run_selftest;
pub use write::run_write;

use crate::cli::DeviceArgs;
use crate::error::CliError;
use crate::programmers;
use indicatif::{ProgressBar, ProgressStyle};
use std::ops::Range;
use w25lfs_core::blockdev::{BlockDeviceConfig, FlashBlockDevice};
use w25lfs_core::device::FlashDevice;
use w25lfs_core::transport::Transport;

/// Flash device behind whichever programmer was selected
pub type Flash = FlashDevice<Box<dyn Transport>>;

/// Block device behind whichever programmer was selected
pub type Blocks = FlashBlockDevice<Box<dyn Transport>>;

/// Load the geometry file, or the default board geometry
pub fn load_geometry(args: &DeviceArgs) -> Result<BlockDeviceConfig, CliError> {
    let Some(path) = &args.geometry else {
        return Ok(BlockDeviceConfig::default());
    };
    let content = std::fs::read_to_string(path).map_err(|source| CliError::GeometryFile {
        path: path.clone(),
        source,
    })?;
    let config = BlockDeviceConfig::from_toml_str(&content).map_err(|source| CliError::Geometry {
        path: path.clone(),
        source,
    })?;
    log::info!("Loaded geometry from {:?}", path);
    Ok(config)
}

/// Open and reset the chip
pub fn open_flash(
    args: &DeviceArgs,
) -> Result<(Flash, BlockDeviceConfig), Box<dyn std::error::Error>> {
    let geometry = load_geometry(args)?;
    geometry.validate().map_err(|source| CliError::Geometry {
        path: args.geometry.clone().unwrap_or_default(),
        source,
    })?;
    let transport = programmers::open_transport(&args.programmer, geometry.capacity())?;
    let mut flash = FlashDevice::new(transport, geometry.capacity())?;
    flash.reset()?;
    Ok((flash, geometry))
}

/// Open the chip and mount the block device on it
pub fn open_block_device(args: &DeviceArgs) -> Result<Blocks, Box<dyn std::error::Error>> {
    let (flash, geometry) = open_flash(args)?;
    Ok(FlashBlockDevice::new(flash, geometry)?)
}

/// Part of a linear transfer that falls inside one block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockSpan {
    pub block: u32,
    pub offset: u32,
    /// Byte range within the caller's buffer
    pub source: Range<usize>,
}

/// Split `len` bytes starting at `(block, offset)` into per-block spans
///
/// Fails when the transfer runs past the last block.
pub fn block_spans(
    config: &BlockDeviceConfig,
    block: u32,
    offset: u32,
    len: usize,
) -> Result<Vec<BlockSpan>, CliError> {
    let out_of_range = CliError::OutOfRange { block, offset, len };
    let start = block as u64 * config.block_size as u64 + offset as u64;
    if block >= config.block_count
        || offset > config.block_size
        || (offset == config.block_size && len > 0)
        || start + len as u64 > config.capacity() as u64
    {
        return Err(out_of_range);
    }

    let mut spans = Vec::new();
    let mut block = block;
    let mut offset = offset;
    let mut done = 0usize;
    while done < len {
        let room = (config.block_size - offset) as usize;
        let take = room.min(len - done);
        spans.push(BlockSpan {
            block,
            offset,
            source: done..done + take,
        });
        done += take;
        block += 1;
        offset = 0;
    }
    Ok(spans)
}

/// Create a progress bar with custom phase message
pub fn create_progress_bar_with_phase(
    total: u64,
    phase: &str,
) -> Result<ProgressBar, Box<dyn std::error::Error>> {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&format!(
                "{{spinner:.green}} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{bytes}}/{{total_bytes}} ({{bytes_per_sec}}, {{eta}}) {}",
                phase
            ))?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

/// Create a progress bar counting blocks rather than bytes
pub fn create_block_bar(total: u64, phase: &str) -> Result<ProgressBar, Box<dyn std::error::Error>> {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&format!(
                "{{spinner:.green}} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos}}/{{len}} blocks {}",
                phase
            ))?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

/// Create a spinner for operations without a known size
pub fn create_spinner(message: String) -> Result<ProgressBar, Box<dyn std::error::Error>> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message(message);
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    Ok(pb)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry() -> BlockDeviceConfig {
        BlockDeviceConfig::default().with_block_count(4)
    }

    #[test]
    fn test_span_inside_one_block() {
        let spans = block_spans(&geometry(), 1, 100, 200).unwrap();
        assert_eq!(
            spans,
            [BlockSpan {
                block: 1,
                offset: 100,
                source: 0..200
            }]
        );
    }

    #[test]
    fn test_span_across_blocks() {
        let spans = block_spans(&geometry(), 0, 4000, 4096 + 200).unwrap();
        assert_eq!(spans.len(), 3);
        assert_eq!((spans[0].block, spans[0].offset, spans[0].source.clone()), (0, 4000, 0..96));
        assert_eq!((spans[1].block, spans[1].offset, spans[1].source.clone()), (1, 0, 96..4192));
        assert_eq!((spans[2].block, spans[2].offset, spans[2].source.clone()), (2, 0, 4192..4296));
    }

    #[test]
    fn test_span_past_end() {
        assert!(block_spans(&geometry(), 3, 4000, 97).is_err());
        assert!(block_spans(&geometry(), 4, 0, 1).is_err());
        assert_eq!(block_spans(&geometry(), 3, 4000, 96).unwrap().len(), 1);
    }

    #[test]
    fn test_span_offset_past_block() {
        assert!(matches!(
            block_spans(&geometry(), 0, 5000, 10),
            Err(CliError::OutOfRange {
                block: 0,
                offset: 5000,
                len: 10
            })
        ));
        assert!(block_spans(&geometry(), 1, 4096, 1).is_err());
        assert!(block_spans(&geometry(), 0, 4097, 0).is_err());
        assert!(block_spans(&geometry(), 0, 4096, 0).unwrap().is_empty());
    }

    #[test]
    fn test_empty_span() {
        assert!(block_spans(&geometry(), 2, 0, 0).unwrap().is_empty());
    }

    #[test]
    fn test_default_geometry_without_file() {
        let args = DeviceArgs {
            programmer: "dummy".into(),
            geometry: None,
        };
        assert_eq!(load_geometry(&args).unwrap(), BlockDeviceConfig::default());
    }

    #[test]
    fn test_missing_geometry_file() {
        let args = DeviceArgs {
            programmer: "dummy".into(),
            geometry: Some("/nonexistent/geometry.toml".into()),
        };
        assert!(matches!(
            load_geometry(&args),
            Err(CliError::GeometryFile { .. })
        ));
    }

    #[cfg(feature = "dummy")]
    #[test]
    fn test_open_block_device_dummy() {
        use w25lfs_core::blockdev::BlockDevice;

        let args = DeviceArgs {
            programmer: "dummy".into(),
            geometry: None,
        };
        let mut bd = open_block_device(&args).unwrap();
        assert_eq!(bd.config().block_count, 2048);
        let mut buf = [0u8; 16];
        bd.read(2047, 4080, &mut buf).unwrap();
        assert_eq!(buf, [0xFF; 16]);
    }
}
