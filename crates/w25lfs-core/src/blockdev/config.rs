//! Block device geometry
//!
//! With the `std` feature a geometry can be loaded from TOML:
//!
//! ```toml
//! read_size = 256
//! prog_size = 256
//! block_size = 0x1000
//! block_count = 2048
//! cache_size = 1024
//! lookahead_size = 32
//! block_cycles = 100
//! ```
//!
//! Numbers may be decimal or `0x` hex strings; missing keys keep their
//! defaults.

use crate::error::{ConfigError, Error, Result};
use crate::spi::{AddressWidth, PAGE_SIZE, SECTOR_SIZE};

/// Geometry and tuning handed to the filesystem at mount time
///
/// Defaults describe a W25Q64 (8 MiB, 2048 sectors).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(serde::Deserialize))]
#[cfg_attr(feature = "std", serde(default, deny_unknown_fields))]
pub struct BlockDeviceConfig {
    /// Minimum read granularity in bytes
    #[cfg_attr(feature = "std", serde(deserialize_with = "toml_format::hex_u32"))]
    pub read_size: u32,
    /// Minimum program granularity in bytes
    #[cfg_attr(feature = "std", serde(deserialize_with = "toml_format::hex_u32"))]
    pub prog_size: u32,
    /// Erase unit in bytes, one sector
    #[cfg_attr(feature = "std", serde(deserialize_with = "toml_format::hex_u32"))]
    pub block_size: u32,
    /// Number of erase blocks
    #[cfg_attr(feature = "std", serde(deserialize_with = "toml_format::hex_u32"))]
    pub block_count: u32,
    /// Per-file and metadata cache size in bytes
    #[cfg_attr(feature = "std", serde(deserialize_with = "toml_format::hex_u32"))]
    pub cache_size: u32,
    /// Lookahead buffer size in bytes
    #[cfg_attr(feature = "std", serde(deserialize_with = "toml_format::hex_u32"))]
    pub lookahead_size: u32,
    /// Erase cycles before the filesystem moves metadata, -1 disables
    pub block_cycles: i32,
}

impl Default for BlockDeviceConfig {
    fn default() -> Self {
        Self {
            read_size: PAGE_SIZE,
            prog_size: PAGE_SIZE,
            block_size: SECTOR_SIZE,
            block_count: 2048,
            cache_size: 1024,
            lookahead_size: 32,
            block_cycles: 100,
        }
    }
}

impl BlockDeviceConfig {
    /// Set the number of blocks
    pub fn with_block_count(mut self, block_count: u32) -> Self {
        self.block_count = block_count;
        self
    }

    /// Set read and program granularity
    pub fn with_io_size(mut self, read_size: u32, prog_size: u32) -> Self {
        self.read_size = read_size;
        self.prog_size = prog_size;
        self
    }

    /// Set the cache size
    pub fn with_cache_size(mut self, cache_size: u32) -> Self {
        self.cache_size = cache_size;
        self
    }

    /// Set the lookahead size
    pub fn with_lookahead_size(mut self, lookahead_size: u32) -> Self {
        self.lookahead_size = lookahead_size;
        self
    }

    /// Set the wear budget
    pub fn with_block_cycles(mut self, block_cycles: i32) -> Self {
        self.block_cycles = block_cycles;
        self
    }

    /// Total bytes covered by the block device
    pub fn capacity(&self) -> u32 {
        self.block_size.saturating_mul(self.block_count)
    }

    /// Check the geometry is consistent with the chip and itself
    pub fn validate(&self) -> Result<()> {
        let invalid = |e: ConfigError| -> Result<()> { Err(Error::InvalidConfig(e)) };

        let sizes = [
            self.read_size,
            self.prog_size,
            self.block_size,
            self.block_count,
            self.cache_size,
            self.lookahead_size,
        ];
        if sizes.contains(&0) {
            return invalid(ConfigError::ZeroSize);
        }
        if self.block_size != SECTOR_SIZE {
            return invalid(ConfigError::BlockSizeNotSector);
        }
        if self.block_size % self.read_size != 0 || self.block_size % self.prog_size != 0 {
            return invalid(ConfigError::UnalignedGranularity);
        }
        if self.cache_size % self.read_size != 0
            || self.cache_size % self.prog_size != 0
            || self.block_size % self.cache_size != 0
        {
            return invalid(ConfigError::BadCacheSize);
        }
        if self.lookahead_size % 8 != 0 {
            return invalid(ConfigError::BadLookaheadSize);
        }
        let capacity = self.block_size as u64 * self.block_count as u64;
        if capacity >= AddressWidth::ThreeByte.max_size() as u64 {
            return Err(Error::CapacityTooLarge);
        }
        Ok(())
    }

    /// Parse and validate a TOML geometry
    #[cfg(feature = "std")]
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| {
            log::debug!("geometry parse error: {}", e);
            Error::InvalidConfig(ConfigError::Unparsable)
        })?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(feature = "std")]
mod toml_format {
    use std::format;
    use std::string::String;

    /// Deserialize a u32 that can be hex (0x...) or decimal
    pub(super) fn hex_u32<'de, D>(deserializer: D) -> Result<u32, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::Deserialize;

        #[derive(Deserialize)]
        #[serde(untagged)]
        enum HexOrInt {
            Int(u32),
            Str(String),
        }

        match HexOrInt::deserialize(deserializer)? {
            HexOrInt::Int(n) => Ok(n),
            HexOrInt::Str(s) => parse_number(&s).map_err(serde::de::Error::custom),
        }
    }

    /// Parse a number that can be hex (0x...) or decimal
    pub(super) fn parse_number(s: &str) -> Result<u32, String> {
        let s = s.trim();
        if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            u32::from_str_radix(hex, 16).map_err(|e| format!("invalid hex: {}", e))
        } else {
            s.parse().map_err(|e| format!("invalid number: {}", e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = BlockDeviceConfig::default();
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.capacity(), 8 * 1024 * 1024);
    }

    #[test]
    fn test_validate_rejects() {
        let base = BlockDeviceConfig::default();
        let cases = [
            (base.with_block_count(0), Error::InvalidConfig(ConfigError::ZeroSize)),
            (
                BlockDeviceConfig {
                    block_size: 8192,
                    ..base
                },
                Error::InvalidConfig(ConfigError::BlockSizeNotSector),
            ),
            (
                base.with_io_size(256, 384),
                Error::InvalidConfig(ConfigError::UnalignedGranularity),
            ),
            (
                base.with_cache_size(128),
                Error::InvalidConfig(ConfigError::BadCacheSize),
            ),
            (
                base.with_lookahead_size(12),
                Error::InvalidConfig(ConfigError::BadLookaheadSize),
            ),
            (base.with_block_count(4096), Error::CapacityTooLarge),
        ];
        for (config, expected) in cases {
            assert_eq!(config.validate(), Err(expected), "{:?}", config);
        }
    }

    #[cfg(feature = "std")]
    #[test]
    fn test_parse_toml() {
        let toml = r#"
block_size = "0x1000"
block_count = 1024
cache_size = "512"
"#;
        let config = BlockDeviceConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.block_count, 1024);
        assert_eq!(config.cache_size, 512);
        assert_eq!(config.read_size, 256);
        assert_eq!(config.block_cycles, 100);
    }

    #[cfg(feature = "std")]
    #[test]
    fn test_parse_toml_errors() {
        assert_eq!(
            BlockDeviceConfig::from_toml_str("block_count = \"lots\""),
            Err(Error::InvalidConfig(ConfigError::Unparsable))
        );
        assert_eq!(
            BlockDeviceConfig::from_toml_str("block_count = 8192"),
            Err(Error::CapacityTooLarge)
        );
        assert_eq!(toml_format::parse_number("0x800"), Ok(2048));
    }
}
