/// Trace addresses are 32 bits wide.
pub type Address = u32;

const ADDRESS_BITS: u32 = Address::BITS;

fn set_bits(n_sets: usize) -> u32 {
    if n_sets <= 1 {
        0
    } else {
        n_sets.ilog2()
    }
}

/// Set selected by the bits directly above the block offset.
pub fn set_index(addr: Address, offset_bits: u32, n_sets: usize) -> usize {
    if n_sets <= 1 {
        return 0;
    }
    let mask = (1 << set_bits(n_sets)) - 1;
    addr.checked_shr(offset_bits).unwrap_or(0) as usize & mask
}

/// Everything above the offset and index bits.
pub fn tag(addr: Address, offset_bits: u32, n_sets: usize) -> Address {
    let shift = offset_bits + set_bits(n_sets);
    if shift >= ADDRESS_BITS {
        return 0;
    }
    addr >> shift
}

/// Block address (offset bits zeroed) of the line holding `tag` in `set`.
pub fn reconstruct(tag: Address, set: usize, offset_bits: u32, n_sets: usize) -> Address {
    let shift = offset_bits + set_bits(n_sets);
    let high = tag.checked_shl(shift).unwrap_or(0);
    let low = (set as Address).checked_shl(offset_bits).unwrap_or(0);
    high | low
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_index_above_offset() {
        // 4-byte blocks, 8 sets: bits [2..5) pick the set
        assert_eq!(set_index(0b10_110_11, 2, 8), 0b110);
        assert_eq!(tag(0b10_110_11, 2, 8), 0b10);
    }

    #[test]
    fn single_set_has_no_index_bits() {
        assert_eq!(set_index(0xdead_beef, 4, 1), 0);
        assert_eq!(tag(0xdead_beef, 4, 1), 0xdead_beef >> 4);
    }

    #[test]
    fn full_width_shift_yields_zero_tag() {
        assert_eq!(tag(0xffff_ffff, 28, 16), 0);
        assert_eq!(tag(0xffff_ffff, 32, 1), 0);
    }

    #[test]
    fn reconstruct_drops_only_the_offset() {
        let addr = 0x1234_5678;
        for (offset_bits, n_sets) in [(2, 4), (6, 64), (0, 1), (5, 1024)] {
            let set = set_index(addr, offset_bits, n_sets);
            let t = tag(addr, offset_bits, n_sets);
            let block = addr & !((1 << offset_bits) - 1);
            assert_eq!(reconstruct(t, set, offset_bits, n_sets), block);
        }
    }
}
