//! Content hashing of JSON values and document nodes.
//!
//! Both hashes ignore CRDT metadata: two nodes with different editing
//! histories that render the same value hash the same.

pub mod hash;
pub mod struct_hash;
pub mod struct_hash_crdt;

pub use hash::{hash, hash_node, JsonHasher};
pub use struct_hash::struct_hash;
pub use struct_hash_crdt::struct_hash_crdt;

/// Lowercase base-36 digits of `n`.
pub(crate) fn radix_36(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".into();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize] as char);
        n /= 36;
    }
    out.iter().rev().collect()
}
