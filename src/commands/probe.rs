//! Probe command implementation

use w25lfs_core::blockdev::BlockDeviceConfig;
use w25lfs_core::device::{FlashDevice, JedecId, StatusRegister};
use w25lfs_core::sfdp::{self, Sfdp, SFDP_DUMP_LEN};
use w25lfs_core::transport::Transport;

/// What the chip reported about itself
#[derive(Debug, Clone, Copy)]
pub struct ProbeReport {
    pub id: JedecId,
    pub unique_id: u64,
    /// Status registers 1 to 3
    pub status: [u8; 3],
    pub sfdp: Option<Sfdp>,
}

impl ProbeReport {
    /// Density from SFDP when the chip reports fewer bytes than `geometry` needs
    pub fn undersized_for(&self, geometry: &BlockDeviceConfig) -> Option<u64> {
        let density = self.sfdp?.basic?.density_bytes;
        (density < geometry.capacity() as u64).then_some(density)
    }
}

/// Read identification, status registers and SFDP
pub fn probe_report<T: Transport>(
    flash: &mut FlashDevice<T>,
) -> Result<ProbeReport, w25lfs_core::Error> {
    let id = flash.read_id()?;
    let unique_id = flash.read_unique_id()?;

    let mut status = [0u8; 3];
    for (slot, reg) in status
        .iter_mut()
        .zip([StatusRegister::One, StatusRegister::Two, StatusRegister::Three])
    {
        *slot = flash.read_register(reg)?;
    }

    let mut dump = [0u8; SFDP_DUMP_LEN];
    flash.read_sfdp(&mut dump)?;

    Ok(ProbeReport {
        id,
        unique_id,
        status,
        sfdp: sfdp::parse(&dump),
    })
}

/// Identify the chip and print its registers and SFDP summary
///
/// The chip has already been reset by the caller.
pub fn run_probe<T: Transport>(
    flash: &mut FlashDevice<T>,
    geometry: &BlockDeviceConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let report = probe_report(flash)?;
    let id = report.id;

    println!("Found flash chip:");
    println!(
        "  JEDEC ID:  {} (manufacturer {:02X}, type {:02X}, capacity {:02X})",
        id,
        id.manufacturer(),
        id.memory_type(),
        id.capacity_code()
    );
    if let Some(bytes) = id.capacity_bytes() {
        println!("  Size:      {} bytes ({} KiB)", bytes, bytes / 1024);
    }
    println!("  Unique ID: {:016X}", report.unique_id);
    for (i, value) in report.status.iter().enumerate() {
        println!("  SR{}:       0x{:02X}", i + 1, value);
    }

    match report.sfdp {
        Some(table) => {
            println!(
                "  SFDP:      revision {}.{}, {} parameter header(s)",
                table.header.revision.major,
                table.header.revision.minor,
                table.header.num_param_headers()
            );
            if let Some(basic) = table.basic {
                println!(
                    "  Density:   {} bytes, page {} bytes, 4 KiB erase {}",
                    basic.density_bytes,
                    basic.page_size,
                    basic
                        .erase_4k_opcode
                        .map(|op| format!("0x{:02X}", op))
                        .unwrap_or_else(|| "unsupported".into())
                );
            }
        }
        None => println!("  SFDP:      not present"),
    }
    if let Some(density) = report.undersized_for(geometry) {
        log::warn!(
            "Geometry needs {} bytes but the chip reports {}",
            geometry.capacity(),
            density
        );
    }

    println!(
        "Geometry:    {} blocks of {} bytes ({} bytes)",
        geometry.block_count,
        geometry.block_size,
        geometry.capacity()
    );
    Ok(())
}
