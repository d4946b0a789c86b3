//! CLI argument parsing

use crate::programmers;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Parse a string as a hex or decimal u32
fn parse_hex_u32(s: &str) -> Result<u32, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u32>().map_err(|e| format!("Invalid number: {}", e))
    }
}

/// Generate dynamic help text for the programmer argument
fn programmer_help() -> String {
    format!(
        "Programmer to use [available: {}]",
        programmers::programmer_names_short()
    )
}

#[derive(Parser)]
#[command(name = "w25lfs")]
#[command(author, version, about = "W25Q flash block-device tool", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every command that talks to a chip
#[derive(clap::Args, Debug, Clone)]
pub struct DeviceArgs {
    /// Programmer to use
    #[arg(short, long, help = programmer_help())]
    pub programmer: String,

    /// Block-device geometry file (TOML), defaults to 2048 blocks of 4 KiB
    #[arg(long)]
    pub geometry: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Identify the chip and dump its registers
    Probe {
        #[command(flatten)]
        device: DeviceArgs,
    },

    /// Read flash contents to file
    Read {
        #[command(flatten)]
        device: DeviceArgs,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Read a single block instead of the whole device
        #[arg(long, value_parser = parse_hex_u32)]
        block: Option<u32>,

        /// Offset inside the block (requires --block)
        #[arg(long, value_parser = parse_hex_u32, requires = "block")]
        offset: Option<u32>,

        /// Number of bytes to read (requires --block)
        #[arg(long, value_parser = parse_hex_u32, requires = "block")]
        length: Option<u32>,
    },

    /// Write file to flash through the block device
    Write {
        #[command(flatten)]
        device: DeviceArgs,

        /// Input file path
        #[arg(short, long)]
        input: PathBuf,

        /// First block to write
        #[arg(long, value_parser = parse_hex_u32)]
        block: u32,

        /// Offset inside the first block
        #[arg(long, value_parser = parse_hex_u32, default_value = "0")]
        offset: u32,

        /// Erase the covered blocks before writing
        #[arg(long)]
        erase: bool,

        /// Skip the read-back comparison
        #[arg(long)]
        no_verify: bool,
    },

    /// Erase blocks or the whole chip
    Erase {
        #[command(flatten)]
        device: DeviceArgs,

        /// First block to erase
        #[arg(long, value_parser = parse_hex_u32, required_unless_present = "chip")]
        block: Option<u32>,

        /// Number of blocks to erase
        #[arg(long, value_parser = parse_hex_u32, default_value = "1", requires = "block")]
        count: u32,

        /// Erase the whole chip
        #[arg(long, conflicts_with = "block")]
        chip: bool,
    },

    /// Print the filesystem checksum of a file
    Crc {
        /// Input file path
        #[arg(short, long)]
        input: PathBuf,

        /// Initial checksum state
        #[arg(long, value_parser = parse_hex_u32, default_value = "0xFFFFFFFF")]
        seed: u32,
    },

    /// Exercise the block device: erase, program, read back, erase
    Selftest {
        #[command(flatten)]
        device: DeviceArgs,

        /// First block to exercise
        #[arg(long, value_parser = parse_hex_u32, default_value = "0")]
        first_block: u32,

        /// Number of blocks to exercise
        #[arg(long, value_parser = parse_hex_u32, default_value = "4")]
        blocks: u32,
    },

    /// List supported programmers
    ListProgrammers,
}
