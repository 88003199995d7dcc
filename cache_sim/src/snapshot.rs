//! Point-in-time copies of simulator state, printable in the `cache-view` and
//! `memory-view` layouts or serialisable as JSON.

use std::fmt;

use serde::Serialize;

use crate::config::CacheConfig;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineSnapshot {
    pub set: usize,
    pub slot: usize,
    pub valid: bool,
    pub dirty: bool,
    pub tag: usize,
    pub data: Vec<u8>,
}

/// Configuration, counters and every line in set-major, slot-minor order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheSnapshot {
    pub config: CacheConfig,
    pub hits: usize,
    pub misses: usize,
    pub lines: Vec<LineSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemorySnapshot {
    pub block_size: usize,
    pub bytes: Vec<u8>,
}

fn write_bytes(f: &mut fmt::Formatter<'_>, bytes: &[u8]) -> fmt::Result {
    let mut first = true;
    for b in bytes {
        if first {
            first = false;
        } else {
            write!(f, " ")?;
        }
        write!(f, "{b:02X}")?;
    }
    Ok(())
}

impl fmt::Display for LineSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {:02x} ",
            u8::from(self.valid),
            u8::from(self.dirty),
            self.tag
        )?;
        write_bytes(f, &self.data)
    }
}

impl fmt::Display for CacheSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = &self.config;
        writeln!(f, "cache_size:{}", c.cache_size)?;
        writeln!(f, "data_block_size:{}", c.block_size)?;
        writeln!(f, "associativity:{}", c.associativity)?;
        writeln!(f, "replacement_policy:{}", c.replacement_policy)?;
        writeln!(f, "write_hit_policy:{}", c.write_hit_policy)?;
        writeln!(f, "write_miss_policy:{}", c.write_miss_policy)?;
        writeln!(f, "number_of_cache_hits:{}", self.hits)?;
        writeln!(f, "number_of_cache_misses:{}", self.misses)?;
        write!(f, "cache_content:")?;
        for line in &self.lines {
            write!(f, "\n{line}")?;
        }
        Ok(())
    }
}

impl fmt::Display for MemorySnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "memory_size:{}", self.bytes.len())?;
        writeln!(f, "memory_content:")?;
        write!(f, "address:data")?;
        for (i, block) in self.bytes.chunks(self.block_size).enumerate() {
            write!(f, "\n{:#x}:", i * self.block_size)?;
            write_bytes(f, block)?;
        }
        Ok(())
    }
}
