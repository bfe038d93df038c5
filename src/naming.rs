// SPDX-License-Identifier: MIT
//! Human-friendly random names for stored uploads

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Characters used in generated names; look-alikes such as `0/O` and `1/l/I` are left out
pub const NAME_CHARSET: &[u8] = b"abcdefghkmnoprstwxzABCDEFGHJKLMNPQRTWXY34689";

/// Generates URL-friendly names from an owned random source
#[derive(Debug, Clone)]
pub struct NameGenerator<G = StdRng> {
    rng: G,
}

impl NameGenerator<StdRng> {
    /// Create a generator seeded from the operating system
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_os_rng())
    }

    /// Create a deterministic generator, mainly for tests
    pub fn from_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }
}

impl Default for NameGenerator<StdRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<G: Rng> NameGenerator<G> {
    pub fn with_rng(rng: G) -> Self {
        Self { rng }
    }

    /// Produce a name of exactly `length` characters drawn uniformly from [`NAME_CHARSET`]
    pub fn generate(&mut self, length: usize) -> String {
        let mut name = String::with_capacity(length);
        for _ in 0..length {
            let index = self.rng.random_range(0..NAME_CHARSET.len());
            name.push(NAME_CHARSET[index] as char);
        }
        name
    }
}

/// Generate a name using the thread-local generator
pub fn generate_random_name(length: usize) -> String {
    NameGenerator::with_rng(rand::rng()).generate(length)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_from_charset(name: &str) -> bool {
        name.bytes().all(|b| NAME_CHARSET.contains(&b))
    }

    #[test]
    fn test_generate_lengths() {
        let long = generate_random_name(32);
        let short = generate_random_name(8);
        assert_eq!(long.len(), 32);
        assert_eq!(short.len(), 8);
        assert!(all_from_charset(&long));
        assert!(all_from_charset(&short));
    }

    #[test]
    fn test_generated_names_differ() {
        assert_ne!(generate_random_name(32), generate_random_name(32));
    }

    #[test]
    fn test_zero_length_is_empty() {
        assert_eq!(generate_random_name(0), "");
        assert_eq!(NameGenerator::from_seed(1).generate(0), "");
    }

    #[test]
    fn test_seeded_generator_is_deterministic() {
        let a = NameGenerator::from_seed(42).generate(16);
        let b = NameGenerator::from_seed(42).generate(16);
        assert_eq!(a, b);
        assert!(all_from_charset(&a));
    }

    #[test]
    fn test_owned_generator_advances() {
        let mut generator = NameGenerator::from_seed(7);
        let first = generator.generate(16);
        let second = generator.generate(16);
        assert_ne!(first, second);
    }

    #[test]
    fn test_charset_is_ascii_without_lookalikes() {
        assert_eq!(NAME_CHARSET.len(), 44);
        assert!(NAME_CHARSET.is_ascii());
        for c in b"0O1lIiuvjqyS25" {
            assert!(!NAME_CHARSET.contains(c), "{} should be excluded", *c as char);
        }
    }
}
