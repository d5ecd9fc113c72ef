//! Deterministic hashing used to name synthesized nodes
//!
//! Insert-node names must be a pure function of the rule and the original
//! assignment that triggered the match, so that replaying the same sequence
//! of proposals against the same store always produces the same node names
//! (see the Assignment Executor, spec.md §4.5 and §6).

use sha2::{Digest, Sha224};

/// Returns a 56-hex-character SHA-224 digest of `item`.
pub fn real_hash(item: &str) -> String {
    let mut hasher = Sha224::new();
    hasher.update(item.as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|byte| format!("{byte:02x}")).collect()
}

/// Hashes an assignment (declared node name -> matched node name) the way
/// `real_hash` hashes a dict in the original runtime: sort by key, render as
/// `[('key', 'value'), ...]`, then hash that string.
pub fn hash_assignment(pairs: &[(String, String)]) -> String {
    let mut sorted = pairs.to_vec();
    sorted.sort();
    let rendered = sorted
        .iter()
        .map(|(key, value)| format!("('{key}', '{value}')"))
        .collect::<Vec<_>>()
        .join(", ");
    real_hash(&format!("[{rendered}]"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn real_hash_is_deterministic_and_56_hex_chars() {
        let a = real_hash("hello");
        let b = real_hash("hello");
        assert_eq!(a, b);
        assert_eq!(a.len(), 56);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn real_hash_distinguishes_inputs() {
        assert_ne!(real_hash("a"), real_hash("b"));
    }

    #[test]
    fn hash_assignment_is_order_independent() {
        let a = hash_assignment(&[("B".into(), "X".into()), ("A".into(), "Y".into())]);
        let b = hash_assignment(&[("A".into(), "Y".into()), ("B".into(), "X".into())]);
        assert_eq!(a, b);
    }
}
