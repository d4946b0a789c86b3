//! Read command implementation

use super::{block_spans, create_progress_bar_with_phase};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use w25lfs_core::blockdev::BlockDevice;

/// Read one block range, or the whole device when `block` is `None`
pub fn run_read<B: BlockDevice>(
    bd: &mut B,
    output: &Path,
    block: Option<u32>,
    offset: Option<u32>,
    length: Option<u32>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = *bd.config();
    let (block, offset, len) = match block {
        Some(block) => {
            let offset = offset.unwrap_or(0);
            let len = length.unwrap_or(config.block_size.saturating_sub(offset));
            (block, offset, len as usize)
        }
        None => (0, 0, config.capacity() as usize),
    };

    let data = read_with_progress(bd, block, offset, len)?;

    let mut file = File::create(output)?;
    file.write_all(&data)?;
    println!("Wrote {} bytes to {:?}", data.len(), output);
    Ok(())
}

/// Read `len` bytes starting at `(block, offset)`, crossing blocks as needed
pub fn read_with_progress<B: BlockDevice>(
    bd: &mut B,
    block: u32,
    offset: u32,
    len: usize,
) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let spans = block_spans(bd.config(), block, offset, len)?;
    let mut data = vec![0u8; len];

    let pb = create_progress_bar_with_phase(len as u64, "Reading")?;
    for span in spans {
        bd.read(span.block, span.offset, &mut data[span.source.clone()])?;
        pb.set_position(span.source.end as u64);
    }
    pb.finish_with_message("Read complete");

    Ok(data)
}
