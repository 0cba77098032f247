//! Recency ranking for one set.
//!
//! Each way carries a rank in `0..n_ways`; rank `n_ways - 1` is the most
//! recently used way and rank `0` is the next victim. Every function keeps
//! the ranks a permutation of `0..n_ways`.

pub type Rank = u32;

pub fn reset(ranks: &mut [Rank]) {
    for (way, rank) in ranks.iter_mut().enumerate() {
        *rank = way as Rank;
    }
}

/// Moves `way` to the MRU position, closing the gap it leaves.
pub fn promote(ranks: &mut [Rank], way: usize) {
    let old = ranks[way];
    for rank in ranks.iter_mut().filter(|r| **r > old) {
        *rank -= 1;
    }
    ranks[way] = (ranks.len() - 1) as Rank;
}

/// Moves `way` to the LRU position.
pub fn demote(ranks: &mut [Rank], way: usize) {
    let old = ranks[way];
    for rank in ranks.iter_mut().filter(|r| **r < old) {
        *rank += 1;
    }
    ranks[way] = 0;
}

pub fn victim(ranks: &[Rank]) -> usize {
    ranks.iter().position(|&r| r == 0).unwrap_or(0)
}

#[cfg(test)]
pub fn is_permutation(ranks: &[Rank]) -> bool {
    let mut seen = vec![false; ranks.len()];
    for &rank in ranks {
        match seen.get_mut(rank as usize) {
            Some(slot) if !*slot => *slot = true,
            _ => return false,
        }
    }
    true
}
