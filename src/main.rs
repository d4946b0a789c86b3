//! w25lfs - W25Q flash as a littlefs block device
//!
//! Bring-up and maintenance tool for a W25Qxx NOR flash used as the backing
//! store of a log-structured filesystem. It identifies the chip, moves data
//! in and out through the same block-device adapter the filesystem uses,
//! and exercises that adapter end to end.
//!
//! # Architecture
//!
//! A programmer provides a byte-level [`Transport`](w25lfs_core::transport::Transport)
//! (the in-memory emulator or Linux spidev). The core crate turns it into a
//! [`FlashDevice`](w25lfs_core::device::FlashDevice) speaking the W25Q command
//! set, and a [`FlashBlockDevice`](w25lfs_core::blockdev::FlashBlockDevice)
//! mounts the configured geometry on it.

mod cli;
mod commands;
mod error;
mod programmers;

use clap::Parser;
use cli::{Cli, Commands};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    run(cli.command)
}

/// Dispatch one subcommand
fn run(command: Commands) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Probe { device } => {
            let (mut flash, geometry) = commands::open_flash(&device)?;
            commands::run_probe(&mut flash, &geometry)
        }
        Commands::Read {
            device,
            output,
            block,
            offset,
            length,
        } => {
            let mut bd = commands::open_block_device(&device)?;
            commands::run_read(&mut bd, &output, block, offset, length)
        }
        Commands::Write {
            device,
            input,
            block,
            offset,
            erase,
            no_verify,
        } => {
            let mut bd = commands::open_block_device(&device)?;
            commands::run_write(&mut bd, &input, block, offset, erase, !no_verify)
        }
        Commands::Erase {
            device,
            block,
            count,
            chip,
        } => {
            if chip {
                let (mut flash, _) = commands::open_flash(&device)?;
                commands::run_erase_chip(&mut flash)
            } else {
                let mut bd = commands::open_block_device(&device)?;
                commands::run_erase_blocks(&mut bd, block.unwrap_or(0), count)
            }
        }
        Commands::Crc { input, seed } => commands::run_crc(&input, seed),
        Commands::Selftest {
            device,
            first_block,
            blocks,
        } => {
            let mut bd = commands::open_block_device(&device)?;
            commands::run_selftest(&mut bd, first_block, blocks)
        }
        Commands::ListProgrammers => {
            commands::list_programmers();
            Ok(())
        }
    }
}
