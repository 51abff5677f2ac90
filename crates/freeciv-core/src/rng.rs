//! Deterministic random numbers for combat, veteran promotion and huts.
//!
//! This simple PRNG ensures that the same seed always produces the same
//! sequence of numbers on every platform, so a game can be replayed from its
//! settings alone.

use serde::{Deserialize, Serialize};

/// xorshift64* generator.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GameRng {
    state: u64,
}

impl GameRng {
    pub fn new(seed: u64) -> Self {
        // FNV-1a over the seed bytes
        let mut state: u64 = 0xcbf29ce484222325;
        for byte in seed.to_le_bytes() {
            state ^= byte as u64;
            state = state.wrapping_mul(0x100000001b3);
        }
        if state == 0 {
            state = 0x853c49e6748fea9b;
        }
        Self { state }
    }

    pub fn next_u64(&mut self) -> u64 {
        self.state ^= self.state >> 12;
        self.state ^= self.state << 25;
        self.state ^= self.state >> 27;
        self.state.wrapping_mul(0x2545F4914F6CDD1D)
    }

    pub fn next_u32(&mut self) -> u32 {
        (self.next_u64() >> 32) as u32
    }

    /// Uniform number in `[0, max)`; zero when `max` is zero.
    pub fn rand(&mut self, max: u32) -> u32 {
        if max == 0 {
            return 0;
        }
        self.next_u32() % max
    }

    /// True with the given chance in percent.
    pub fn percent(&mut self, chance: i32) -> bool {
        chance > 0 && (self.rand(100) as i32) < chance
    }
}

impl Default for GameRng {
    fn default() -> Self {
        Self::new(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_sequence() {
        let mut a = GameRng::new(42);
        let mut b = GameRng::new(42);
        for _ in 0..100 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
    }

    #[test]
    fn test_different_seeds_diverge() {
        let mut a = GameRng::new(1);
        let mut b = GameRng::new(2);
        assert_ne!(a.next_u64(), b.next_u64());
    }

    #[test]
    fn test_rand_in_range() {
        let mut rng = GameRng::new(7);
        for _ in 0..1000 {
            assert!(rng.rand(6) < 6);
        }
        assert_eq!(rng.rand(0), 0);
    }

    #[test]
    fn test_percent_extremes() {
        let mut rng = GameRng::new(9);
        for _ in 0..100 {
            assert!(!rng.percent(0));
            assert!(rng.percent(100));
        }
    }
}
