use std::fmt;

use serde::Serialize;

fn ratio(num: f64, den: u64) -> f64 {
    if den == 0 {
        0.0
    } else {
        num / den as f64
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LevelStats {
    pub name: String,
    pub accesses: u64,
    pub misses: u64,
    pub miss_rate: f64,
    pub latency: u32,
}

impl LevelStats {
    pub fn new(name: String, accesses: u64, misses: u64, latency: u32) -> Self {
        LevelStats {
            name,
            accesses,
            misses,
            miss_rate: ratio(misses as f64, accesses),
            latency,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stats {
    pub l1_miss_rate: f64,
    pub l2_miss_rate: f64,
    pub avg_access_time: f64,
    pub total_cycles: u64,
    pub levels: Vec<LevelStats>,
}

impl Stats {
    /// Every request probes L1 exactly once, so L1's access count is the request count.
    pub fn new(l1: LevelStats, l2: LevelStats, total_cycles: u64) -> Self {
        Stats {
            l1_miss_rate: l1.miss_rate,
            l2_miss_rate: l2.miss_rate,
            avg_access_time: ratio(total_cycles as f64, l1.accesses),
            total_cycles,
            levels: vec![l1, l2],
        }
    }
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "L1miss={:.3} L2miss={:.3} AccTimeAvg={:.3}",
            self.l1_miss_rate, self.l2_miss_rate, self.avg_access_time
        )
    }
}
