use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Line {
    pub valid: bool,
    pub dirty: bool,
    pub tag: usize,
    pub data: Vec<u8>,
}

impl Line {
    fn cold(block_size: usize) -> Self {
        Self {
            valid: false,
            dirty: false,
            tag: 0,
            data: vec![0; block_size],
        }
    }
}

/// Set-associative line array plus the per-set recency table used by LRU.
///
/// Lines never move inside a set; only their recency counters change. A counter
/// is the number of touches to other lines of the set since the line was last
/// touched, so the largest counter marks the least recently used line.
pub struct CacheStore {
    sets: Vec<Vec<Line>>,
    recency: Vec<Vec<u64>>,
    associativity: usize,
    block_size: usize,
}

impl CacheStore {
    pub fn new(num_sets: usize, associativity: usize, block_size: usize) -> Self {
        Self {
            sets: Self::cold_sets(num_sets, associativity, block_size),
            recency: vec![vec![0; associativity]; num_sets],
            associativity,
            block_size,
        }
    }

    fn cold_sets(num_sets: usize, associativity: usize, block_size: usize) -> Vec<Vec<Line>> {
        (0..num_sets)
            .map(|_| {
                (0..associativity)
                    .map(|_| Line::cold(block_size))
                    .collect()
            })
            .collect()
    }

    pub fn num_sets(&self) -> usize {
        self.sets.len()
    }
    pub fn associativity(&self) -> usize {
        self.associativity
    }
    pub fn line(&self, index: usize, slot: usize) -> &Line {
        &self.sets[index][slot]
    }
    pub fn recency(&self, index: usize) -> &[u64] {
        &self.recency[index]
    }
    /// `(set index, slot, line)` in set-major, slot-minor order.
    pub fn lines(&self) -> impl Iterator<Item = (usize, usize, &Line)> {
        self.sets.iter().enumerate().flat_map(|(index, set)| {
            set.iter()
                .enumerate()
                .map(move |(slot, line)| (index, slot, line))
        })
    }

    pub fn lookup(&self, index: usize, tag: usize) -> Option<usize> {
        self.sets[index]
            .iter()
            .position(|line| line.valid && line.tag == tag)
    }

    pub fn insert_into_empty_slot(&mut self, index: usize, tag: usize, block: &[u8]) -> Option<usize> {
        let slot = self.sets[index].iter().position(|line| !line.valid)?;
        self.overwrite(index, slot, tag, block);
        Some(slot)
    }

    /// installs a clean copy of `block` in `slot`, whatever was there before.
    pub fn overwrite(&mut self, index: usize, slot: usize, tag: usize, block: &[u8]) {
        debug_assert_eq!(block.len(), self.block_size);
        let line = &mut self.sets[index][slot];
        line.valid = true;
        line.dirty = false;
        line.tag = tag;
        line.data.copy_from_slice(block);
    }

    pub fn mark_dirty(&mut self, index: usize, slot: usize, offset: usize, byte: u8) {
        let line = &mut self.sets[index][slot];
        debug_assert!(line.valid, "writing into an invalid line");
        line.data[offset] = byte;
        line.dirty = true;
    }

    pub fn touch_recency(&mut self, index: usize, slot: usize) {
        for (i, counter) in self.recency[index].iter_mut().enumerate() {
            if i == slot {
                *counter = 0;
            } else {
                *counter = counter.saturating_add(1);
            }
        }
    }

    /// slot holding the largest counter, the lowest such slot on ties.
    pub fn victim_by_lru(&self, index: usize) -> usize {
        let counters = &self.recency[index];
        let mut victim = 0;
        for (slot, &counter) in counters.iter().enumerate() {
            if counter > counters[victim] {
                victim = slot;
            }
        }
        victim
    }

    /// back to the cold state. Dirty lines are dropped, not written back.
    pub fn reset(&mut self) {
        self.sets = Self::cold_sets(self.sets.len(), self.associativity, self.block_size);
        for counters in &mut self.recency {
            counters.fill(0);
        }
    }
}
