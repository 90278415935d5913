//! Unseeded fallback generator and seed generation
//!
//! Uses the xoshiro256++ PRNG seeded from OS entropy. Runs that use it cannot
//! be reproduced; callers who need reproducibility should generate a seed with
//! [`make_random_seed`] and pass it explicitly.

use super::UnitRandom;
use rand::Rng;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

/// Entropy-seeded generator
pub struct EntropyRandom {
    rng: Xoshiro256PlusPlus,
}

impl EntropyRandom {
    /// Create a generator with a random seed
    pub fn new() -> Self {
        Self {
            rng: Xoshiro256PlusPlus::from_entropy(),
        }
    }
}

impl Default for EntropyRandom {
    fn default() -> Self {
        Self::new()
    }
}

impl UnitRandom for EntropyRandom {
    #[inline]
    fn next_unit(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }

    fn is_reproducible(&self) -> bool {
        false
    }
}

/// Create a short random seed string
///
/// Format: `<millis since epoch, base 36>-<random below 10^6, base 36>`,
/// e.g. `"mgt0xq3k-5yc1"`.
pub fn make_random_seed() -> String {
    let millis = chrono::Utc::now().timestamp_millis().max(0) as u64;
    let suffix: u64 = rand::thread_rng().gen_range(0..1_000_000);
    format!("{}-{}", to_base36(millis), to_base36(suffix))
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}
