// Cryptography module
//
// Hashing primitives used for trie commitments:
// - Keccak-256 digests of canonical node encodings
// - The `Hash` newtype for root hashes

pub mod hash;

pub use hash::{keccak256, Hash, EMPTY_ROOT, HASH_LEN};
