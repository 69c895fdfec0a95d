//! Stable string hashing used to build index keys.
//!
//! `spec.md` §3 requires that equal (name, value) pairs always yield equal
//! keys, which in turn requires a hash that is stable across calls within a
//! process. `ahash::AHasher` is fast but keyed from a random per-process
//! seed unless constructed explicitly, so we fix the seed here rather than
//! going through `ahash::RandomState`.

use std::hash::Hasher;

const SEED_1: u64 = 0x243F_6A88_85A3_08D3;
const SEED_2: u64 = 0x1319_8A2E_0370_7344;

/// A 64-bit stable hash of a string, used as input to the index key halves.
pub fn stable_hash64(s: &str) -> u64 {
    let mut hasher = ahash::AHasher::default();
    // Re-seed deterministically; AHasher::default() would otherwise pick up
    // ahash's process-random seed.
    hasher.write_u64(SEED_1);
    hasher.write_u64(SEED_2);
    hasher.write(s.as_bytes());
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stable_across_calls() {
        assert_eq!(stable_hash64("job"), stable_hash64("job"));
        assert_ne!(stable_hash64("job"), stable_hash64("instance"));
    }
}
