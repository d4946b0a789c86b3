//! SPI types and command structures
//!
//! This module provides types for representing SPI transactions and the
//! W25Q opcode table.

mod address;
mod command;
pub mod opcodes;

pub use address::AddressWidth;
pub use command::{SpiCommand, MAX_DUMMY_BYTES, MAX_HEADER_LEN};
pub use opcodes::*;
