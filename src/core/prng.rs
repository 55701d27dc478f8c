// Seedable PRNG (no external crates).
//
// This is NOT cryptographically secure.
// Every random draw of a mind (node remakes, edge regeneration, remodel
// sampling) goes through one of these, so a run is reproducible from its seed.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::config::ValueRange;

const ZERO_STATE_REPLACEMENT: u64 = 0x9E3779B97F4A7C15;

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Prng {
    state: u64,
}

impl Prng {
    pub fn new(seed: u64) -> Self {
        Self::from_state(seed)
    }

    pub(crate) fn from_state(state: u64) -> Self {
        // Avoid a zero state.
        let state = if state == 0 {
            ZERO_STATE_REPLACEMENT
        } else {
            state
        };
        Self { state }
    }

    pub(crate) fn state(&self) -> u64 {
        self.state
    }

    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        // xorshift64*
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545F4914F6CDD1D)
    }

    #[inline]
    pub fn next_u32(&mut self) -> u32 {
        (self.next_u64() >> 32) as u32
    }

    /// Uniform in `[0, bound)`; returns 0 for an empty bound.
    #[inline]
    pub fn below(&mut self, bound: u64) -> u64 {
        if bound == 0 {
            return 0;
        }
        // Multiply-shift keeps the modulo bias negligible for the small spans used here.
        ((self.next_u64() as u128 * bound as u128) >> 64) as u64
    }

    #[inline]
    pub fn gen_range_usize(&mut self, low: usize, high: usize) -> usize {
        if high <= low {
            return low;
        }
        low + self.below((high - low) as u64) as usize
    }

    /// Uniform over the inclusive range `[range.min, range.max]`.
    #[inline]
    pub fn gen_in(&mut self, range: ValueRange) -> i64 {
        if range.max <= range.min {
            return range.min;
        }
        let span = (range.max - range.min) as u64 + 1;
        range.min + self.below(span) as i64
    }

    /// A uniformly chosen element of `0..len` other than `exclude`.
    ///
    /// Returns `None` when no such element exists.
    pub fn pick_other(&mut self, len: usize, exclude: usize) -> Option<usize> {
        if exclude < len {
            if len < 2 {
                return None;
            }
            let v = self.gen_range_usize(0, len - 1);
            Some(if v >= exclude { v + 1 } else { v })
        } else if len == 0 {
            None
        } else {
            Some(self.gen_range_usize(0, len))
        }
    }

    /// `count` distinct values from `0..len`, without replacement
    /// (partial Fisher-Yates).
    pub fn sample_distinct(&mut self, len: usize, count: usize) -> Vec<usize> {
        let count = count.min(len);
        let mut pool: Vec<usize> = (0..len).collect();
        for i in 0..count {
            let j = self.gen_range_usize(i, len);
            pool.swap(i, j);
        }
        pool.truncate(count);
        pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_sequence() {
        let mut a = Prng::new(7);
        let mut b = Prng::new(7);
        for _ in 0..32 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
    }

    #[test]
    fn zero_seed_is_not_stuck() {
        let mut rng = Prng::new(0);
        assert_ne!(rng.next_u64(), 0);
        assert_ne!(rng.state(), 0);
    }

    #[test]
    fn inclusive_range_hits_both_ends() {
        let mut rng = Prng::new(11);
        let range = ValueRange::new(2, 4);
        let mut seen = [false; 3];
        for _ in 0..500 {
            let v = rng.gen_in(range);
            assert!((2..=4).contains(&v));
            seen[(v - 2) as usize] = true;
        }
        assert!(seen.iter().all(|s| *s));
    }

    #[test]
    fn pick_other_never_returns_excluded() {
        let mut rng = Prng::new(3);
        for _ in 0..200 {
            let v = rng.pick_other(5, 2).unwrap();
            assert!(v < 5);
            assert_ne!(v, 2);
        }
        assert_eq!(rng.pick_other(1, 0), None);
        assert_eq!(rng.pick_other(0, 0), None);
    }

    #[test]
    fn sample_distinct_has_no_duplicates() {
        let mut rng = Prng::new(99);
        let mut picked = rng.sample_distinct(10, 6);
        assert_eq!(picked.len(), 6);
        picked.sort_unstable();
        picked.dedup();
        assert_eq!(picked.len(), 6);
        assert!(picked.iter().all(|v| *v < 10));
    }
}
