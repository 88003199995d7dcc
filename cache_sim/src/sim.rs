use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::{
    cache::CacheStore,
    codec::{AddressCodec, DecodedAddr},
    common::{parse_addr, parse_byte, ParseHexError},
    config::{CacheConfig, ConfigError, Geometry, ReplacementPolicy, WriteHitPolicy, WriteMissPolicy},
    memory::{Addr, MemoryAccessError, PhysicalMemory},
    replacement::ReplacementEngine,
    snapshot::{CacheSnapshot, LineSnapshot, MemorySnapshot},
};

#[cfg(feature = "stat")]
use crate::stat::{AddStats, CacheStat, Stats};

/// A request that was rejected before touching any state.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RequestError {
    #[error(transparent)]
    OutOfRange(#[from] MemoryAccessError),
    #[error(transparent)]
    MalformedInput(#[from] ParseHexError),
}

pub type Result<T> = std::result::Result<T, RequestError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReadResult {
    pub set: usize,
    pub tag: usize,
    pub hit: bool,
    /// slot whose previous contents were replaced; `None` on a hit or when an empty slot was used.
    pub eviction: Option<usize>,
    /// address fetched from memory; `None` on a hit.
    pub ram_address: Option<Addr>,
    pub data: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteResult {
    pub set: usize,
    pub tag: usize,
    pub hit: bool,
    pub eviction: Option<usize>,
    pub ram_address: Option<Addr>,
    pub data: u8,
    /// whether a cache line was written (and so marked dirty).
    pub dirty: bool,
}

fn fmt_or_minus_one<T: fmt::Display>(v: &Option<T>) -> String {
    match v {
        Some(v) => v.to_string(),
        None => "-1".to_owned(),
    }
}

impl fmt::Display for ReadResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "set:{}", self.set)?;
        writeln!(f, "tag:{:02x}", self.tag)?;
        writeln!(f, "hit:{}", if self.hit { "yes" } else { "no" })?;
        writeln!(f, "eviction line:{}", fmt_or_minus_one(&self.eviction))?;
        writeln!(f, "ram_address:{}", fmt_or_minus_one(&self.ram_address))?;
        write!(f, "data:{:#04X}", self.data)
    }
}

impl fmt::Display for WriteResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "set:{}", self.set)?;
        writeln!(f, "tag:{:02x}", self.tag)?;
        writeln!(f, "write_hit:{}", if self.hit { "yes" } else { "no" })?;
        writeln!(f, "eviction_line:{}", fmt_or_minus_one(&self.eviction))?;
        writeln!(f, "ram_address:{}", fmt_or_minus_one(&self.ram_address))?;
        writeln!(f, "data:{:#04X}", self.data)?;
        write!(f, "dirty_bit:{}", u8::from(self.dirty))
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Counters {
    pub hits: usize,
    pub misses: usize,
}

/// The cache controller: owns the cache, the memory behind it and the hit/miss
/// counters, and serves one request at a time.
///
/// All state is plain owned data mutated through `&mut self`; sharing a
/// simulator between threads needs external synchronisation.
pub struct Simulator {
    config: CacheConfig,
    geometry: Geometry,
    codec: AddressCodec,
    memory: PhysicalMemory,
    cache: CacheStore,
    replacement: ReplacementEngine,
    counters: Counters,
}

impl Simulator {
    pub fn new(config: CacheConfig, image: &[u8]) -> std::result::Result<Self, ConfigError> {
        let replacement = ReplacementEngine::new(config.replacement_policy);
        Self::with_engine(config, image, replacement)
    }
    /// like [`Simulator::new`] with a reproducible random replacement sequence.
    pub fn with_seed(
        config: CacheConfig,
        image: &[u8],
        seed: u64,
    ) -> std::result::Result<Self, ConfigError> {
        let replacement = ReplacementEngine::with_seed(config.replacement_policy, seed);
        Self::with_engine(config, image, replacement)
    }
    fn with_engine(
        config: CacheConfig,
        image: &[u8],
        replacement: ReplacementEngine,
    ) -> std::result::Result<Self, ConfigError> {
        let geometry = Geometry::new(&config)?;
        let mut memory = PhysicalMemory::new(geometry.ram_size, geometry.block_size);
        let ignored = memory.init_from_slice(image);
        if ignored > 0 {
            log::warn!(
                "memory image has {} bytes, the last {ignored} do not fit in {} bytes of memory",
                image.len(),
                geometry.ram_size
            );
        }
        log::info!(
            "configured {} sets x {} lines x {} bytes (t={}, s={}, b={}), {}, {}, {}",
            geometry.num_sets,
            geometry.associativity,
            geometry.block_size,
            geometry.tag_bits,
            geometry.index_bits,
            geometry.offset_bits,
            config.replacement_policy,
            config.write_hit_policy,
            config.write_miss_policy
        );
        Ok(Self {
            config,
            geometry,
            codec: AddressCodec::new(&geometry),
            memory,
            cache: CacheStore::new(geometry.num_sets, geometry.associativity, geometry.block_size),
            replacement,
            counters: Counters::default(),
        })
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }
    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }
    pub fn counters(&self) -> Counters {
        self.counters
    }
    pub fn codec(&self) -> &AddressCodec {
        &self.codec
    }

    fn touch(&mut self, index: usize, slot: usize) {
        if self.replacement.policy() == ReplacementPolicy::Lru {
            self.cache.touch_recency(index, slot);
        }
    }

    /// Brings the block containing `addr` into its set. Recency is updated
    /// exactly once, either here or inside the replacement engine.
    fn allocate(&mut self, addr: Addr, d: DecodedAddr) -> Result<(usize, Option<usize>)> {
        let block = self.memory.read_block(addr)?.to_vec();
        match self.cache.insert_into_empty_slot(d.index, d.tag, &block) {
            Some(slot) => {
                self.touch(d.index, slot);
                Ok((slot, None))
            }
            None => {
                let slot = self.replacement.replace(
                    &mut self.cache,
                    &mut self.memory,
                    &self.codec,
                    d.index,
                    d.tag,
                    &block,
                )?;
                log::debug!("evicted set {} slot {slot}", d.index);
                Ok((slot, Some(slot)))
            }
        }
    }

    pub fn read(&mut self, addr: Addr) -> Result<ReadResult> {
        let d = self.codec.decode(addr)?;
        if let Some(slot) = self.cache.lookup(d.index, d.tag) {
            self.counters.hits += 1;
            self.touch(d.index, slot);
            log::debug!("read hit {addr}: set {} slot {slot}", d.index);
            return Ok(ReadResult {
                set: d.index,
                tag: d.tag,
                hit: true,
                eviction: None,
                ram_address: None,
                data: self.cache.line(d.index, slot).data[d.offset],
            });
        }
        self.counters.misses += 1;
        let (slot, eviction) = self.allocate(addr, d)?;
        log::debug!("read miss {addr}: set {} slot {slot}", d.index);
        Ok(ReadResult {
            set: d.index,
            tag: d.tag,
            hit: false,
            eviction,
            ram_address: Some(addr),
            data: self.cache.line(d.index, slot).data[d.offset],
        })
    }

    pub fn write(&mut self, addr: Addr, byte: u8) -> Result<WriteResult> {
        let d = self.codec.decode(addr)?;
        let mut result = WriteResult {
            set: d.index,
            tag: d.tag,
            hit: false,
            eviction: None,
            ram_address: Some(addr),
            data: byte,
            dirty: true,
        };
        if let Some(slot) = self.cache.lookup(d.index, d.tag) {
            self.counters.hits += 1;
            self.cache.mark_dirty(d.index, slot, d.offset, byte);
            if self.config.write_hit_policy == WriteHitPolicy::WriteThrough {
                self.memory.write_byte(addr, byte)?;
            }
            self.touch(d.index, slot);
            log::debug!("write hit {addr}: set {} slot {slot}", d.index);
            result.hit = true;
            result.ram_address = None;
            return Ok(result);
        }
        self.counters.misses += 1;
        match self.config.write_miss_policy {
            WriteMissPolicy::WriteAllocate => {
                let (slot, eviction) = self.allocate(addr, d)?;
                self.cache.mark_dirty(d.index, slot, d.offset, byte);
                if self.config.write_hit_policy == WriteHitPolicy::WriteThrough {
                    self.memory.write_byte(addr, byte)?;
                }
                log::debug!("write miss {addr}: allocated set {} slot {slot}", d.index);
                result.eviction = eviction;
            }
            WriteMissPolicy::NoWriteAllocate => {
                self.memory.write_byte(addr, byte)?;
                log::debug!("write miss {addr}: written around the cache");
                result.dirty = false;
            }
        }
        Ok(result)
    }

    pub fn read_hex(&mut self, addr: &str) -> Result<ReadResult> {
        let addr = parse_addr(addr)?;
        self.read(addr)
    }

    pub fn write_hex(&mut self, addr: &str, byte: &str) -> Result<WriteResult> {
        let addr = parse_addr(addr)?;
        let byte = parse_byte(byte)?;
        self.write(addr, byte)
    }

    /// Writes every dirty line back and leaves the cache cold. Counters survive.
    pub fn flush(&mut self) -> Result<()> {
        let mut written_back = 0;
        for (index, _, line) in self.cache.lines() {
            if line.valid && line.dirty {
                let base = self.codec.encode(line.tag, index);
                self.memory.write_block(base, &line.data)?;
                written_back += 1;
            }
        }
        self.cache.reset();
        log::info!("cache flushed, {written_back} dirty lines written back");
        Ok(())
    }

    pub fn cache_snapshot(&self) -> CacheSnapshot {
        CacheSnapshot {
            config: self.config,
            hits: self.counters.hits,
            misses: self.counters.misses,
            lines: self
                .cache
                .lines()
                .map(|(set, slot, line)| LineSnapshot {
                    set,
                    slot,
                    valid: line.valid,
                    dirty: line.dirty,
                    tag: line.tag,
                    data: line.data.clone(),
                })
                .collect(),
        }
    }

    pub fn memory_snapshot(&self) -> MemorySnapshot {
        MemorySnapshot {
            block_size: self.geometry.block_size,
            bytes: self.memory.as_slice().to_vec(),
        }
    }

    #[cfg(feature = "stat")]
    pub fn collect_stat(&self) -> Stats {
        let mut ss = Stats::default();
        self.add_stats(&mut ss);
        ss
    }
}

#[cfg(feature = "stat")]
impl AddStats for Simulator {
    fn add_stats(&self, buf: &mut Stats) {
        buf.push(Box::new(CacheStat::new(self.counters.hits, self.counters.misses)));
    }
}
