//! Cache configuration and the geometry derived from it.

use std::fmt;

use anyhow::Result;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bin::exact_log2;

pub const MIN_CACHE_SIZE: usize = 8usize;
pub const MAX_CACHE_SIZE: usize = 256usize;
/// addresses are 8 bits wide.
pub const MAX_RAM_SIZE: usize = 256usize;
pub const SUPPORTED_ASSOCIATIVITY: [usize; 3] = [1, 2, 4];

/// Numeric codes follow the menu of the interactive front end.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TryFromPrimitive, IntoPrimitive,
)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ReplacementPolicy {
    #[serde(alias = "random_replacement")]
    Random = 1,
    #[serde(alias = "least_recently_used")]
    Lru = 2,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TryFromPrimitive, IntoPrimitive,
)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum WriteHitPolicy {
    WriteThrough = 1,
    WriteBack = 2,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TryFromPrimitive, IntoPrimitive,
)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum WriteMissPolicy {
    WriteAllocate = 1,
    NoWriteAllocate = 2,
}

impl fmt::Display for ReplacementPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplacementPolicy::Random => write!(f, "random_replacement"),
            ReplacementPolicy::Lru => write!(f, "least_recently_used"),
        }
    }
}

impl fmt::Display for WriteHitPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteHitPolicy::WriteThrough => write!(f, "write_through"),
            WriteHitPolicy::WriteBack => write!(f, "write_back"),
        }
    }
}

impl fmt::Display for WriteMissPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteMissPolicy::WriteAllocate => write!(f, "write_allocate"),
            WriteMissPolicy::NoWriteAllocate => write!(f, "no_write_allocate"),
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{what} must be a power of two, got {value}")]
    NotPowerOfTwo { what: &'static str, value: usize },
    #[error("associativity must be one of 1, 2 or 4, got {0}")]
    UnsupportedAssociativity(usize),
    #[error("cache size must be at least 8 bytes, got {0}")]
    CacheTooSmall(usize),
    #[error("cache size must be at most 256 bytes, got {0}")]
    CacheTooLarge(usize),
    #[error("memory size must be at most 256 bytes, got {0}")]
    MemoryTooLarge(usize),
    #[error("cache of {cache_size} bytes cannot hold a single set of {associativity} x {block_size}-byte blocks")]
    NoCompleteSet {
        cache_size: usize,
        block_size: usize,
        associativity: usize,
    },
    #[error("{addr_bits}-bit addresses cannot hold {index_bits} index bits and {offset_bits} offset bits")]
    NegativeTagWidth {
        addr_bits: u32,
        index_bits: u32,
        offset_bits: u32,
    },
}

/// Everything needed to build a simulator, as entered by the user or read from JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    pub ram_size: usize,
    pub cache_size: usize,
    pub block_size: usize,
    pub associativity: usize,
    pub replacement_policy: ReplacementPolicy,
    pub write_hit_policy: WriteHitPolicy,
    pub write_miss_policy: WriteMissPolicy,
}

impl CacheConfig {
    pub fn deser(file: impl std::io::Read) -> Result<Self> {
        Ok(serde_json::from_reader(file)?)
    }
}

/// Validated, immutable shape of the cache: S = C / (E * B), b = log2 B,
/// s = log2 S, t = log2 M - s - b.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Geometry {
    pub ram_size: usize,
    pub cache_size: usize,
    pub block_size: usize,
    pub associativity: usize,
    pub num_sets: usize,
    pub tag_bits: u32,
    pub index_bits: u32,
    pub offset_bits: u32,
}

fn log2_of(what: &'static str, value: usize) -> Result<u32, ConfigError> {
    exact_log2(value).ok_or(ConfigError::NotPowerOfTwo { what, value })
}

pub fn check_ram_size(ram_size: usize) -> Result<u32, ConfigError> {
    if ram_size > MAX_RAM_SIZE {
        return Err(ConfigError::MemoryTooLarge(ram_size));
    }
    log2_of("memory size", ram_size)
}

pub fn check_cache_size(cache_size: usize) -> Result<(), ConfigError> {
    if cache_size < MIN_CACHE_SIZE {
        return Err(ConfigError::CacheTooSmall(cache_size));
    }
    if cache_size > MAX_CACHE_SIZE {
        return Err(ConfigError::CacheTooLarge(cache_size));
    }
    log2_of("cache size", cache_size).map(|_| ())
}

pub fn check_associativity(associativity: usize) -> Result<(), ConfigError> {
    if SUPPORTED_ASSOCIATIVITY.contains(&associativity) {
        Ok(())
    } else {
        Err(ConfigError::UnsupportedAssociativity(associativity))
    }
}

impl Geometry {
    pub fn new(config: &CacheConfig) -> Result<Self, ConfigError> {
        let addr_bits = check_ram_size(config.ram_size)?;
        check_cache_size(config.cache_size)?;
        let offset_bits = log2_of("block size", config.block_size)?;
        check_associativity(config.associativity)?;

        let no_complete_set = ConfigError::NoCompleteSet {
            cache_size: config.cache_size,
            block_size: config.block_size,
            associativity: config.associativity,
        };
        let set_bytes = match config.associativity.checked_mul(config.block_size) {
            Some(n) if n <= config.cache_size => n,
            _ => return Err(no_complete_set),
        };
        // every factor is a power of two, so S is one too
        let num_sets = config.cache_size / set_bytes;
        let index_bits = num_sets.trailing_zeros();
        let tag_bits = addr_bits
            .checked_sub(index_bits + offset_bits)
            .ok_or(ConfigError::NegativeTagWidth {
                addr_bits,
                index_bits,
                offset_bits,
            })?;

        Ok(Self {
            ram_size: config.ram_size,
            cache_size: config.cache_size,
            block_size: config.block_size,
            associativity: config.associativity,
            num_sets,
            tag_bits,
            index_bits,
            offset_bits,
        })
    }

    pub fn addr_bits(&self) -> u32 {
        self.tag_bits + self.index_bits + self.offset_bits
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn config(
        ram_size: usize,
        cache_size: usize,
        block_size: usize,
        associativity: usize,
    ) -> CacheConfig {
        CacheConfig {
            ram_size,
            cache_size,
            block_size,
            associativity,
            replacement_policy: ReplacementPolicy::Lru,
            write_hit_policy: WriteHitPolicy::WriteBack,
            write_miss_policy: WriteMissPolicy::WriteAllocate,
        }
    }

    #[test]
    fn test_geometry_derivation() {
        let g = Geometry::new(&config(256, 32, 8, 1)).unwrap();
        assert_eq!(4, g.num_sets);
        assert_eq!(3, g.offset_bits);
        assert_eq!(2, g.index_bits);
        assert_eq!(3, g.tag_bits);
        assert_eq!(8, g.addr_bits());
    }
    #[test]
    fn test_single_set_geometry() {
        let g = Geometry::new(&config(256, 32, 8, 4)).unwrap();
        assert_eq!(1, g.num_sets);
        assert_eq!(0, g.index_bits);
        assert_eq!(5, g.tag_bits);
    }
    #[test]
    fn test_rejects_inconsistent_geometry() {
        assert_eq!(
            Err(ConfigError::UnsupportedAssociativity(3)),
            Geometry::new(&config(256, 32, 8, 3))
        );
        assert_eq!(
            Err(ConfigError::NotPowerOfTwo {
                what: "block size",
                value: 6
            }),
            Geometry::new(&config(256, 32, 6, 1))
        );
        assert_eq!(
            Err(ConfigError::NotPowerOfTwo {
                what: "memory size",
                value: 200
            }),
            Geometry::new(&config(200, 32, 8, 1))
        );
        assert_eq!(
            Err(ConfigError::CacheTooSmall(4)),
            Geometry::new(&config(256, 4, 2, 1))
        );
        assert!(matches!(
            Geometry::new(&config(256, 16, 8, 4)),
            Err(ConfigError::NoCompleteSet { .. })
        ));
        assert!(matches!(
            Geometry::new(&config(16, 64, 8, 1)),
            Err(ConfigError::NegativeTagWidth { .. })
        ));
    }
    #[test]
    fn test_rejects_huge_block_without_overflow() {
        assert_eq!(
            Err(ConfigError::NoCompleteSet {
                cache_size: 32,
                block_size: 1 << (usize::BITS - 1),
                associativity: 4,
            }),
            Geometry::new(&config(256, 32, 1 << (usize::BITS - 1), 4))
        );
        assert!(matches!(
            Geometry::new(&config(256, 32, 64, 1)),
            Err(ConfigError::NoCompleteSet { .. })
        ));
    }
    #[test]
    fn test_size_limits() {
        assert!(Geometry::new(&config(256, 256, 8, 1)).is_ok());
        assert_eq!(
            Err(ConfigError::CacheTooLarge(512)),
            Geometry::new(&config(256, 512, 8, 1))
        );
        assert_eq!(Err(ConfigError::CacheTooLarge(512)), check_cache_size(512));
        assert_eq!(
            Err(ConfigError::MemoryTooLarge(1 << 20)),
            Geometry::new(&config(1 << 20, 32, 8, 1))
        );
        assert_eq!(Ok(8), check_ram_size(256));
        assert_eq!(Err(ConfigError::MemoryTooLarge(512)), check_ram_size(512));
    }
    #[test]
    fn test_policy_codes() {
        assert_eq!(
            ReplacementPolicy::Lru,
            ReplacementPolicy::try_from(2u8).unwrap()
        );
        assert!(WriteHitPolicy::try_from(3u8).is_err());
        assert_eq!(2u8, u8::from(WriteMissPolicy::NoWriteAllocate));
    }
    #[test]
    fn test_deser_config() {
        let json = r#"{
            "ram_size": 256,
            "cache_size": 32,
            "block_size": 8,
            "associativity": 2,
            "replacement_policy": "least_recently_used",
            "write_hit_policy": "write_through",
            "write_miss_policy": "no_write_allocate"
        }"#;
        let c = CacheConfig::deser(json.as_bytes()).unwrap();
        assert_eq!(ReplacementPolicy::Lru, c.replacement_policy);
        assert_eq!(WriteHitPolicy::WriteThrough, c.write_hit_policy);
        assert_eq!(WriteMissPolicy::NoWriteAllocate, c.write_miss_policy);
        assert_eq!(2, c.associativity);
    }
}
