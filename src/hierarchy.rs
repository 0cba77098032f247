use crate::{
    addr::Address,
    cache::{CacheLevel, Fill},
    stats::Stats,
    trace::Op,
};

/// Two cache levels in front of main memory.
///
/// L2 evictions invalidate the same block in L1, and dirty L1 evictions are
/// written back into L2. Levels never see each other; all coordination
/// happens here.
#[derive(Debug)]
pub struct CacheHierarchy {
    l1: CacheLevel,
    l2: CacheLevel,
    mem_latency: u32,
    write_allocate: bool,
    total_cycles: u64,
}

impl CacheHierarchy {
    pub fn new(l1: CacheLevel, l2: CacheLevel, mem_latency: u32, write_allocate: bool) -> Self {
        CacheHierarchy {
            l1,
            l2,
            mem_latency,
            write_allocate,
            total_cycles: 0,
        }
    }

    pub fn access(&mut self, addr: Address, op: Op) {
        let l1_hit = match op {
            Op::Read => self.l1.probe_read(addr),
            Op::Write => self.l1.probe_write(addr, true),
        };
        self.total_cycles += u64::from(self.l1.latency);
        if l1_hit {
            return;
        }
        self.l1.record_miss();

        let l2_hit = match op {
            Op::Read => self.l2.probe_read(addr),
            Op::Write => self.l2.probe_write(addr, true),
        };
        self.total_cycles += u64::from(self.l2.latency);

        if l2_hit {
            if op == Op::Read || self.write_allocate {
                self.fill_l1(addr, op);
            }
            return;
        }
        self.l2.record_miss();
        self.total_cycles += u64::from(self.mem_latency);

        if op == Op::Write && !self.write_allocate {
            log::trace!("{addr:#x}: write miss bypasses both levels");
            return;
        }
        self.fill_l2(addr, op);
        self.fill_l1(addr, op);
    }

    /// The request lands in L2; anything it pushes out must leave L1 too.
    fn fill_l2(&mut self, addr: Address, op: Op) {
        if let Some(evicted) = self.l2.allocate(addr, op, Fill::Installed) {
            log::trace!(
                "{addr:#x}: {} evicts {:#x}, invalidating in {}",
                self.l2.name(),
                evicted.addr,
                self.l1.name()
            );
            self.l1.invalidate(evicted.addr);
        }
    }

    /// L1 always takes a clean copy from L2. A dirty victim is merged back
    /// into L2 without being counted or billed there.
    fn fill_l1(&mut self, addr: Address, op: Op) {
        if let Some(evicted) = self.l1.allocate(addr, op, Fill::Forwarded) {
            if evicted.dirty {
                let merged = self.l2.probe_write(evicted.addr, false);
                log::trace!(
                    "{addr:#x}: write-back of {:#x} to {} ({})",
                    evicted.addr,
                    self.l2.name(),
                    if merged { "merged" } else { "not resident" }
                );
            }
        }
    }

    /// Forgets all counters but keeps cache content, for warm-up.
    pub fn clear_stats(&mut self) {
        self.l1.clear_stats();
        self.l2.clear_stats();
        self.total_cycles = 0;
    }

    #[cfg(test)]
    pub fn total_cycles(&self) -> u64 {
        self.total_cycles
    }

    #[cfg(test)]
    pub fn l1(&self) -> &CacheLevel {
        &self.l1
    }

    #[cfg(test)]
    pub fn l2(&self) -> &CacheLevel {
        &self.l2
    }

    pub fn finalize(&self) -> Stats {
        Stats::new(self.l1.make_stats(), self.l2.make_stats(), self.total_cycles)
    }
}
