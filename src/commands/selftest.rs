//! Block-device self-test
//!
//! Each block goes through erase, blank check, program, read back and erase
//! again. The programmed pattern is a run of named records, each sealed with
//! the filesystem checksum and packed back to back from an odd offset so that
//! programs straddle page boundaries.

use super::create_block_bar;
use crate::error::CliError;
use w25lfs_core::blockdev::BlockDevice;
use w25lfs_core::checksum::{crc32, Crc32};

/// Records written per block
const RECORDS_PER_BLOCK: usize = 32;

/// Offset of the first record inside a block
const FIRST_RECORD_OFFSET: u32 = 1;

/// Outcome of a successful run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SelftestReport {
    pub blocks: u32,
    pub records: usize,
    pub bytes: usize,
}

/// Payload of record `index` in `block`, NUL-terminated
fn record_payload(block: u32, index: usize) -> Vec<u8> {
    let mut payload = format!("/blk{:04}/rec{:02}.txt", block, index).into_bytes();
    payload.push(0);
    payload
}

/// Payload followed by its little-endian checksum
fn seal(payload: &[u8]) -> Vec<u8> {
    let mut record = payload.to_vec();
    record.extend_from_slice(&crc32(Crc32::INIT, payload).to_le_bytes());
    record
}

fn fail(block: u32, reason: impl Into<String>) -> CliError {
    CliError::Selftest {
        block,
        reason: reason.into(),
    }
}

fn check_blank<B: BlockDevice>(bd: &mut B, block: u32, when: &str) -> Result<(), CliError> {
    let mut buf = vec![0u8; bd.config().block_size as usize];
    bd.read(block, 0, &mut buf)?;
    if let Some(pos) = buf.iter().position(|&b| b != 0xFF) {
        return Err(fail(
            block,
            format!("byte {} is 0x{:02X} {}", pos, buf[pos], when),
        ));
    }
    Ok(())
}

/// Run the exerciser on one block, returning the number of records written
pub fn exercise_block<B: BlockDevice>(bd: &mut B, block: u32) -> Result<(usize, usize), CliError> {
    let block_size = bd.config().block_size;

    bd.erase(block)?;
    check_blank(bd, block, "after erase")?;

    let mut placed = Vec::new();
    let mut offset = FIRST_RECORD_OFFSET;
    for index in 0..RECORDS_PER_BLOCK {
        let record = seal(&record_payload(block, index));
        if offset as usize + record.len() > block_size as usize {
            break;
        }
        bd.prog(block, offset, &record)?;
        placed.push((offset, record.len()));
        offset += record.len() as u32;
    }
    bd.sync()?;
    log::debug!("block {}: {} records, {} bytes", block, placed.len(), offset);

    for (index, &(offset, len)) in placed.iter().enumerate() {
        let mut record = vec![0u8; len];
        bd.read(block, offset, &mut record)?;

        let (payload, stored) = record.split_at(len - 4);
        let stored = u32::from_le_bytes([stored[0], stored[1], stored[2], stored[3]]);
        if crc32(Crc32::INIT, payload) != stored {
            return Err(fail(block, format!("record {} checksum mismatch", index)));
        }
        if payload != record_payload(block, index).as_slice() {
            return Err(fail(block, format!("record {} content mismatch", index)));
        }
    }

    bd.erase(block)?;
    check_blank(bd, block, "after final erase")?;

    Ok((placed.len(), offset as usize))
}

/// Exercise `count` blocks starting at `first`
pub fn selftest<B: BlockDevice>(
    bd: &mut B,
    first: u32,
    count: u32,
) -> Result<SelftestReport, Box<dyn std::error::Error>> {
    let block_count = bd.config().block_count;
    let end = first
        .checked_add(count)
        .filter(|&end| end <= block_count)
        .ok_or_else(|| fail(first, format!("range exceeds the device ({} blocks)", block_count)))?;

    let mut report = SelftestReport::default();
    let pb = create_block_bar(count as u64, "Testing")?;
    for block in first..end {
        match exercise_block(bd, block) {
            Ok((records, bytes)) => {
                report.blocks += 1;
                report.records += records;
                report.bytes += bytes;
                pb.inc(1);
            }
            Err(e) => {
                pb.abandon();
                return Err(e.into());
            }
        }
    }
    pb.finish_with_message("Self-test complete");
    Ok(report)
}

/// Run the self-test and print a summary
pub fn run_selftest<B: BlockDevice>(
    bd: &mut B,
    first: u32,
    count: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let report = selftest(bd, first, count)?;
    println!(
        "Self-test passed: {} block(s), {} record(s), {} bytes programmed",
        report.blocks, report.records, report.bytes
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_appends_checksum() {
        let payload = record_payload(3, 7);
        assert_eq!(payload, b"/blk0003/rec07.txt\0");
        let record = seal(&payload);
        assert_eq!(record.len(), payload.len() + 4);
        assert_eq!(
            &record[payload.len()..],
            &crc32(Crc32::INIT, &payload).to_le_bytes()
        );
    }

    #[cfg(feature = "dummy")]
    mod on_dummy {
        use super::super::*;
        use w25lfs_core::blockdev::{BlockDeviceConfig, FlashBlockDevice};
        use w25lfs_core::device::FlashDevice;
        use w25lfs_dummy::{DummyConfig, DummyFlash};

        fn block_device() -> FlashBlockDevice<DummyFlash> {
            let dummy = DummyFlash::with_data(
                DummyConfig {
                    size: 4 * 4096,
                    ..Default::default()
                },
                &[0u8; 4 * 4096],
            );
            let flash = FlashDevice::new(dummy, 4 * 4096).unwrap();
            FlashBlockDevice::new(flash, BlockDeviceConfig::default().with_block_count(4)).unwrap()
        }

        #[test]
        fn test_selftest_passes() {
            let mut bd = block_device();
            let report = selftest(&mut bd, 1, 3).unwrap();
            assert_eq!(report.blocks, 3);
            assert_eq!(report.records, 3 * RECORDS_PER_BLOCK);

            let dummy = bd.flash().transport();
            // Untouched block keeps its contents, exercised blocks end erased
            assert!(dummy.data()[..4096].iter().all(|&b| b == 0));
            assert!(dummy.data()[4096..].iter().all(|&b| b == 0xFF));
            // 23-byte records from offset 1 straddle page boundaries
            let programs = dummy.program_ops();
            assert!(programs.len() > 3 * RECORDS_PER_BLOCK);
            assert!(programs
                .iter()
                .all(|&(addr, len)| (addr % 256) as usize + len <= 256));
        }

        #[test]
        fn test_selftest_range_past_end() {
            let mut bd = block_device();
            assert!(selftest(&mut bd, 2, 3).is_err());
            assert_eq!(bd.flash().transport().program_ops().len(), 0);
        }

        #[test]
        fn test_selftest_reports_stuck_chip() {
            let mut bd = block_device();
            bd.flash_mut().transport_mut().set_stuck_busy(true);
            let err = selftest(&mut bd, 0, 1).unwrap_err();
            let err = err.downcast::<CliError>().unwrap();
            assert!(matches!(
                *err,
                CliError::Flash(w25lfs_core::Error::BusyTimeout)
            ));
        }
    }
}
