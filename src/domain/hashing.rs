//! Trace Hashing
//!
//! All structural hashes in the engine are 64-bit and deterministic across runs:
//! they end up in the export files, so two runs over the same program must agree.
//! The algorithm sits behind `HashScheme` so it can be strengthened without
//! touching any call site.

/// Width and type of every structural hash in the engine.
pub type TraceHash = u64;

/// A `trace_hash` of 0 on a dependency node means "no fingerprint attached".
pub const NO_TRACE_HASH: TraceHash = 0;

/// Pluggable hash algorithm for structural hashing.
pub trait HashScheme {
    fn hash_bytes(&self, bytes: &[u8]) -> TraceHash;
}

/// Default scheme: 64-bit FNV-1a.
pub struct Fnv64;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

impl HashScheme for Fnv64 {
    fn hash_bytes(&self, bytes: &[u8]) -> TraceHash {
        let mut hash = FNV_OFFSET;
        for byte in bytes {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(FNV_PRIME);
        }
        hash
    }
}

/// Hash a string with the default scheme.
pub fn hash_str(s: &str) -> TraceHash {
    Fnv64.hash_bytes(s.as_bytes())
}

/// Hash a parameter position with the default scheme.
pub fn hash_position(pos: i32) -> TraceHash {
    Fnv64.hash_bytes(&pos.to_le_bytes())
}

/// Fold one element hash into an accumulator commutatively.
///
/// Slot maps and attribute lists are iterated in nondeterministic order, so the
/// combination must not depend on ordering. Multiplication (not concatenation)
/// gives that, at the cost of tolerable collision behavior.
pub fn combine_commutative(acc: TraceHash, element: TraceHash) -> TraceHash {
    acc.wrapping_mul(element)
}
