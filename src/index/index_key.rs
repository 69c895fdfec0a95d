//! 8-byte composite index keys, grounded in
//! `examples/original_source/src/index/index_tree.cpp` (`make_key`,
//! `_hash_string_name`, `_hash_string_value`).

use crate::common::hash::stable_hash64;

/// `name_hash` occupies the high 4 bytes, `value_prefix_hash` the low 4
/// bytes, so keys partition first by label name and then roughly order by
/// value prefix within that partition -- the order `resolve_label_matchers`
/// range-scans over.
pub type IndexKey = u64;

fn hash_string_name(name: &str) -> u32 {
    (stable_hash64(name) & 0xFFFF_FFFF) as u32
}

/// Hashes a label value down to 4 bytes: the first two raw bytes of the
/// value (for prefix locality within a name, matching `original_source`'s
/// `_hash_string_value`), followed by a 2-byte hash of the full value so
/// distinct values sharing a 2-byte prefix still land in distinct keys most
/// of the time. Residual collisions are resolved by per-entry filtering in
/// `label_index::resolve_label_matchers`.
fn hash_string_value(value: &str) -> u32 {
    let bytes = value.as_bytes();
    let b0 = bytes.first().copied().unwrap_or(0);
    let b1 = bytes.get(1).copied().unwrap_or(0);
    let tail_hash = (stable_hash64(value) & 0xFFFF) as u16;
    u32::from_be_bytes([b0, b1, (tail_hash >> 8) as u8, tail_hash as u8])
}

/// Builds the composite key for a (name, value) pair.
pub fn make_key(name: &str, value: &str) -> IndexKey {
    let name_hash = hash_string_name(name) as u64;
    let value_hash = hash_string_value(value) as u64;
    (name_hash << 32) | value_hash
}

/// The lowest key that could belong to `name` (`value_prefix_hash` all zero bits).
pub fn name_lower_bound(name: &str) -> IndexKey {
    (hash_string_name(name) as u64) << 32
}

/// The highest key that could belong to `name` (`value_prefix_hash` all one bits).
pub fn name_upper_bound(name: &str) -> IndexKey {
    ((hash_string_name(name) as u64) << 32) | 0xFFFF_FFFF
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_pairs_yield_equal_keys() {
        assert_eq!(make_key("job", "api"), make_key("job", "api"));
    }

    #[test]
    fn different_names_partition_the_keyspace() {
        let lo = name_lower_bound("job");
        let hi = name_upper_bound("job");
        let k = make_key("job", "api");
        assert!(k >= lo && k <= hi);
        let other = make_key("instance", "api");
        assert!(other < lo || other > hi);
    }

    #[test]
    fn distinguishes_values_with_different_prefixes() {
        let a = make_key("job", "api");
        let b = make_key("job", "worker");
        assert_ne!(a, b);
    }
}
