//! Seeded generator: xfnv1a string hash feeding mulberry32
//!
//! The seed string is folded into a 32-bit state with an FNV-1a accumulation
//! over its UTF-16 code units followed by a fixed avalanche mix. The state then
//! drives mulberry32, a counter-based mixer that advances by a fixed odd
//! increment per call.
//!
//! Everything is wrapping `u32` arithmetic, so the sequence is identical on all
//! platforms and matches the reference generator bit for bit.

use super::UnitRandom;

const FNV_OFFSET_BASIS: u32 = 2_166_136_261;
const FNV_PRIME: u32 = 16_777_619;
const MULBERRY_INCREMENT: u32 = 0x6D2B_79F5;
const TWO_POW_32: f64 = 4_294_967_296.0;

/// Hash a seed string to a 32-bit state
pub fn xfnv1a_hash(seed: &str) -> u32 {
    let mut h = FNV_OFFSET_BASIS;
    for unit in seed.encode_utf16() {
        h ^= unit as u32;
        h = h.wrapping_mul(FNV_PRIME);
    }
    h = h.wrapping_add(h << 13);
    h ^= h >> 7;
    h = h.wrapping_add(h << 3);
    h ^= h >> 17;
    h = h.wrapping_add(h << 5);
    h
}

/// Deterministic mulberry32 generator
#[derive(Debug, Clone)]
pub struct SeededRandom {
    state: u32,
}

impl SeededRandom {
    /// Create a generator from a raw 32-bit state
    pub fn new(state: u32) -> Self {
        Self { state }
    }

    /// Create a generator from a seed string
    pub fn from_seed_str(seed: &str) -> Self {
        Self::new(xfnv1a_hash(seed))
    }

    /// Next raw 32-bit output
    #[inline]
    pub fn next_u32(&mut self) -> u32 {
        self.state = self.state.wrapping_add(MULBERRY_INCREMENT);
        let a = self.state;
        let mut t = (a ^ (a >> 15)).wrapping_mul(1 | a);
        t = t.wrapping_add((t ^ (t >> 7)).wrapping_mul(61 | t)) ^ t;
        t ^ (t >> 14)
    }
}

impl UnitRandom for SeededRandom {
    #[inline]
    fn next_unit(&mut self) -> f64 {
        self.next_u32() as f64 / TWO_POW_32
    }

    fn is_reproducible(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_known_values() {
        assert_eq!(xfnv1a_hash("fixed"), 570_397_329);
        assert_eq!(xfnv1a_hash("seed-A"), 4_096_033_106);
        assert_eq!(xfnv1a_hash("seed-B"), 2_940_784_950);
        assert_eq!(xfnv1a_hash(""), 1_493_338_014);
    }

    #[test]
    fn test_hash_non_ascii_uses_utf16_units() {
        assert_eq!(xfnv1a_hash("žluťoučký kůň"), 1_197_690_499);
    }

    #[test]
    fn test_sequence_known_values() {
        let mut rng = SeededRandom::from_seed_str("fixed");
        assert_eq!(rng.next_unit(), 0.7287279793526977);
        assert_eq!(rng.next_unit(), 0.3514942931942642);
        assert_eq!(rng.next_unit(), 0.8067044178023934);

        let mut rng = SeededRandom::from_seed_str("seed-A");
        assert_eq!(rng.next_unit(), 0.7136208035517484);
        assert_eq!(rng.next_unit(), 0.13758344668895006);
    }

    #[test]
    fn test_same_seed_same_sequence() {
        let mut a = SeededRandom::from_seed_str("seed-A");
        let mut b = SeededRandom::from_seed_str("seed-A");
        for _ in 0..1000 {
            assert_eq!(a.next_unit(), b.next_unit());
        }
    }

    #[test]
    fn test_different_seeds_diverge() {
        let mut a = SeededRandom::from_seed_str("seed-A");
        let mut b = SeededRandom::from_seed_str("seed-B");
        let same = (0..1000).filter(|_| a.next_unit() == b.next_unit()).count();
        assert!(same < 5, "{} identical outputs", same);
    }

    #[test]
    fn test_output_range() {
        let mut rng = SeededRandom::new(0);
        for _ in 0..10_000 {
            let v = rng.next_unit();
            assert!((0.0..1.0).contains(&v));
        }
    }
}
