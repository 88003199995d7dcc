use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{
    cache::CacheStore,
    codec::AddressCodec,
    config::ReplacementPolicy,
    memory::{self, PhysicalMemory},
};

/// Picks and refills a victim line once a set has no empty slot left.
pub struct ReplacementEngine {
    policy: ReplacementPolicy,
    rng: StdRng,
}

impl ReplacementEngine {
    pub fn new(policy: ReplacementPolicy) -> Self {
        Self {
            policy,
            rng: StdRng::from_entropy(),
        }
    }
    pub fn with_seed(policy: ReplacementPolicy, seed: u64) -> Self {
        Self {
            policy,
            rng: StdRng::seed_from_u64(seed),
        }
    }
    pub fn policy(&self) -> ReplacementPolicy {
        self.policy
    }

    pub fn select_victim(&mut self, cache: &CacheStore, index: usize) -> usize {
        match self.policy {
            ReplacementPolicy::Random => self.rng.gen_range(0..cache.associativity()),
            ReplacementPolicy::Lru => cache.victim_by_lru(index),
        }
    }

    /// Evicts a line of the full set `index` in favour of `block`, writing the
    /// victim back first when it is dirty. Returns the slot reused.
    pub fn replace(
        &mut self,
        cache: &mut CacheStore,
        memory: &mut PhysicalMemory,
        codec: &AddressCodec,
        index: usize,
        tag: usize,
        block: &[u8],
    ) -> memory::Result<usize> {
        let slot = self.select_victim(cache, index);
        let victim = cache.line(index, slot);
        if victim.dirty {
            let base = codec.encode(victim.tag, index);
            log::debug!("write back set {index} slot {slot} to {base}");
            memory.write_block(base, &victim.data)?;
        }
        cache.overwrite(index, slot, tag, block);
        if self.policy == ReplacementPolicy::Lru {
            cache.touch_recency(index, slot);
        }
        Ok(slot)
    }
}
