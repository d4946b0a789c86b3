//! Write command implementation

use super::{block_spans, create_block_bar, create_progress_bar_with_phase, BlockSpan};
use crate::error::CliError;
use std::path::Path;
use w25lfs_core::blockdev::BlockDevice;

/// Write a file starting at `(block, offset)`
pub fn run_write<B: BlockDevice>(
    bd: &mut B,
    input: &Path,
    block: u32,
    offset: u32,
    erase: bool,
    verify: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let data = std::fs::read(input)?;
    println!("Read {} bytes from {:?}", data.len(), input);

    write_blocks(bd, block, offset, &data, erase, verify)?;
    println!("Wrote {} bytes at block {} offset {}", data.len(), block, offset);
    Ok(())
}

/// Erase (optionally), program and verify (optionally) `data`
pub fn write_blocks<B: BlockDevice>(
    bd: &mut B,
    block: u32,
    offset: u32,
    data: &[u8],
    erase: bool,
    verify: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let spans = block_spans(bd.config(), block, offset, data.len())?;

    if erase {
        let pb = create_block_bar(spans.len() as u64, "Erasing")?;
        for span in &spans {
            bd.erase(span.block)?;
            pb.inc(1);
        }
        pb.finish_and_clear();
    }

    let pb = create_progress_bar_with_phase(data.len() as u64, "Writing")?;
    for span in &spans {
        bd.prog(span.block, span.offset, &data[span.source.clone()])?;
        pb.set_position(span.source.end as u64);
    }
    bd.sync()?;
    pb.finish_with_message("Write complete");

    if verify {
        verify_spans(bd, &spans, data)?;
        println!("Verification passed");
    }
    Ok(())
}

fn verify_spans<B: BlockDevice>(
    bd: &mut B,
    spans: &[BlockSpan],
    data: &[u8],
) -> Result<(), Box<dyn std::error::Error>> {
    let block_size = bd.config().block_size;
    let pb = create_progress_bar_with_phase(data.len() as u64, "Verifying")?;

    for span in spans {
        let expected = &data[span.source.clone()];
        let mut found = vec![0u8; expected.len()];
        bd.read(span.block, span.offset, &mut found)?;

        if let Some(i) = expected.iter().zip(&found).position(|(a, b)| a != b) {
            pb.abandon();
            return Err(CliError::VerifyMismatch {
                addr: span.block * block_size + span.offset + i as u32,
                expected: expected[i],
                found: found[i],
            }
            .into());
        }
        pb.set_position(span.source.end as u64);
    }

    pb.finish_and_clear();
    Ok(())
}
