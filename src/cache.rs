use std::{iter, ops::Range};

use crate::{
    addr::{self, Address},
    config::LevelGeometry,
    lru::{self, Rank},
    stats::LevelStats,
    trace::Op,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Line {
    pub valid: bool,
    pub dirty: bool,
    pub tag: Address,
}

/// Where the data for a freshly allocated line comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fill {
    /// Copy handed up by the level below, which still owns the data. Always clean.
    Forwarded,
    /// The request itself lands here; a write leaves the line dirty.
    Installed,
}

/// A line pushed out by [`CacheLevel::allocate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evicted {
    pub addr: Address,
    pub dirty: bool,
}

#[derive(Debug)]
pub struct CacheLevel {
    name: String,
    pub offset_bits: u32,
    pub n_sets: usize,
    pub n_ways: usize,
    pub latency: u32,
    lines: Vec<Line>,
    ranks: Vec<Rank>,
    accesses: u64,
    misses: u64,
}

impl CacheLevel {
    pub fn new(name: impl Into<String>, offset_bits: u32, geometry: &LevelGeometry) -> Self {
        let n_ways = 1usize << geometry.assoc_bits;
        let n_sets = 1usize << (geometry.size_bits - offset_bits - geometry.assoc_bits);

        let mut ranks = vec![0; n_sets * n_ways];
        for set in ranks.chunks_mut(n_ways) {
            lru::reset(set);
        }

        CacheLevel {
            name: name.into(),
            offset_bits,
            n_sets,
            n_ways,
            latency: geometry.cycles,
            lines: iter::repeat(Line::default()).take(n_sets * n_ways).collect(),
            ranks,
            accesses: 0,
            misses: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn get_set(&self, set: usize) -> Range<usize> {
        set * self.n_ways..(set + 1) * self.n_ways
    }

    fn locate(&self, addr: Address) -> (usize, Address) {
        (
            addr::set_index(addr, self.offset_bits, self.n_sets),
            addr::tag(addr, self.offset_bits, self.n_sets),
        )
    }

    fn find(&self, set: usize, tag: Address) -> Option<usize> {
        self.lines[self.get_set(set)]
            .iter()
            .position(|line| line.valid && line.tag == tag)
    }

    /// Looks the block up, promoting it on a hit.
    fn lookup(&mut self, addr: Address) -> Option<&mut Line> {
        let (set, tag) = self.locate(addr);
        let way = self.find(set, tag)?;
        let range = self.get_set(set);
        lru::promote(&mut self.ranks[range.clone()], way);
        Some(&mut self.lines[range][way])
    }

    pub fn probe_read(&mut self, addr: Address) -> bool {
        self.accesses += 1;
        self.lookup(addr).is_some()
    }

    /// Like [`probe_read`](Self::probe_read) but dirties the line on a hit.
    /// Write-backs pass `count_as_access = false` so they stay out of the counters.
    pub fn probe_write(&mut self, addr: Address, count_as_access: bool) -> bool {
        if count_as_access {
            self.accesses += 1;
        }
        match self.lookup(addr) {
            Some(line) => {
                line.dirty = true;
                true
            }
            None => false,
        }
    }

    /// Installs the block holding `addr`, evicting the set's LRU line if no
    /// way is free.
    pub fn allocate(&mut self, addr: Address, op: Op, fill: Fill) -> Option<Evicted> {
        let (set, tag) = self.locate(addr);
        let range = self.get_set(set);
        let dirty = op == Op::Write && fill == Fill::Installed;

        let (way, evicted) = match self.lines[range.clone()].iter().position(|l| !l.valid) {
            Some(way) => (way, None),
            None => {
                let way = lru::victim(&self.ranks[range.clone()]);
                let victim = self.lines[range.start + way];
                let evicted = Evicted {
                    addr: addr::reconstruct(victim.tag, set, self.offset_bits, self.n_sets),
                    dirty: victim.dirty,
                };
                (way, Some(evicted))
            }
        };

        self.lines[range.start + way] = Line {
            valid: true,
            dirty,
            tag,
        };
        lru::promote(&mut self.ranks[range], way);
        evicted
    }

    /// Drops the block holding `addr` if present.
    pub fn invalidate(&mut self, addr: Address) {
        let (set, tag) = self.locate(addr);
        if let Some(way) = self.find(set, tag) {
            let range = self.get_set(set);
            self.lines[range.start + way] = Line::default();
            lru::demote(&mut self.ranks[range], way);
        }
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    #[cfg(test)]
    pub fn accesses(&self) -> u64 {
        self.accesses
    }

    #[cfg(test)]
    pub fn misses(&self) -> u64 {
        self.misses
    }

    pub fn clear_stats(&mut self) {
        self.accesses = 0;
        self.misses = 0;
    }

    pub fn make_stats(&self) -> LevelStats {
        LevelStats::new(self.name.clone(), self.accesses, self.misses, self.latency)
    }

    /// Current state of the block holding `addr`, without touching recency or counters.
    #[cfg(test)]
    pub fn peek(&self, addr: Address) -> Option<Line> {
        let (set, tag) = self.locate(addr);
        self.find(set, tag)
            .map(|way| self.lines[self.get_set(set)][way])
    }

    #[cfg(test)]
    pub fn set_state(&self, set: usize) -> (&[Line], &[Rank]) {
        let range = self.get_set(set);
        (&self.lines[range.clone()], &self.ranks[range])
    }
}
