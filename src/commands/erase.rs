//! Erase command implementation

use super::{create_block_bar, create_spinner};
use w25lfs_core::blockdev::BlockDevice;
use w25lfs_core::device::FlashDevice;
use w25lfs_core::transport::Transport;

/// Erase `count` blocks starting at `first`
pub fn run_erase_blocks<B: BlockDevice>(
    bd: &mut B,
    first: u32,
    count: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let block_count = bd.config().block_count;
    let end = first
        .checked_add(count)
        .filter(|&end| end <= block_count)
        .ok_or_else(|| {
            format!(
                "blocks {}..{} exceed the device ({} blocks)",
                first,
                first.saturating_add(count),
                block_count
            )
        })?;

    let pb = create_block_bar(count as u64, "Erasing")?;
    for block in first..end {
        bd.erase(block)?;
        pb.inc(1);
    }
    pb.finish_with_message("Erase complete");

    println!("Erased {} block(s) starting at {}", count, first);
    Ok(())
}

/// Erase the whole chip
pub fn run_erase_chip<T: Transport>(
    flash: &mut FlashDevice<T>,
) -> Result<(), Box<dyn std::error::Error>> {
    let pb = create_spinner(format!(
        "Erasing {} bytes (this may take a while)...",
        flash.capacity()
    ))?;
    let result = flash.erase_chip();
    pb.finish_and_clear();
    result?;

    println!("Chip erase complete");
    Ok(())
}
