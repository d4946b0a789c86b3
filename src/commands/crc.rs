//! Checksum command implementation

use std::path::Path;
use w25lfs_core::checksum::Crc32;

/// Length and filesystem checksum of a file
pub fn file_checksum(input: &Path, seed: u32) -> std::io::Result<(usize, u32)> {
    let data = std::fs::read(input)?;
    let mut crc = Crc32::with_seed(seed);
    crc.update(&data);
    Ok((data.len(), crc.value()))
}

/// Print the filesystem checksum of a file
pub fn run_crc(input: &Path, seed: u32) -> Result<(), Box<dyn std::error::Error>> {
    let (len, value) = file_checksum(input, seed)?;

    println!("{:?}: {} bytes", input, len);
    println!("  checksum: 0x{:08X}", value);
    // Standard CRC-32 when seeded with all ones
    println!("  inverted: 0x{:08X}", !value);
    Ok(())
}
