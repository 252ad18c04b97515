//! Merkle Patricia Trie implementation
//!
//! This module provides an in-memory Modified Merkle Patricia Trie (MPT).
//! Besides lookups, inserts and deletes, the trie commits to its contents
//! with a Keccak-256 root hash and exposes the canonical RLP encoding of its
//! root. The shape of the tree, and therefore the hash, depends only on the
//! stored key-value set.
//!
//! The encoding follows the Ethereum Yellow Paper, so root hashes match any
//! other conforming implementation bit for bit.

pub mod encode;
pub mod node;
pub mod codec;
pub mod mpt;
pub mod sorted;

// Re-export main components
pub use node::{Node, NodeRef};
pub use mpt::MerklePatriciaTrie;
pub use sorted::SortedMapTrie;

use crate::crypto::Hash;
use crate::error::TrieError;

/// Optional operations an engine may offer on top of get/put/hash
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// `delete` is available
    pub delete: bool,
    /// `serialize` returns the canonical root encoding
    pub serialize: bool,
}

impl Capabilities {
    /// Every operation is available
    pub const FULL: Capabilities = Capabilities { delete: true, serialize: true };
}

/// Common interface of the trie engines.
///
/// `get`, `put` and `hash` are always available. `delete` and `serialize`
/// fail with `TrieError::NotSupported` on engines whose `capabilities` do
/// not advertise them.
pub trait Trie {
    /// Look up the value stored under `key`
    fn get(&self, key: &[u8]) -> Result<Vec<u8>, TrieError>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// An empty value removes the key.
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), TrieError>;

    /// Remove `key`, failing with `TrieError::NotFound` if it is absent
    fn delete(&mut self, _key: &[u8]) -> Result<(), TrieError> {
        Err(TrieError::NotSupported("delete"))
    }

    /// Root hash over the current contents
    fn hash(&self) -> Hash;

    /// Canonical encoding of the root node
    fn serialize(&self) -> Result<Vec<u8>, TrieError> {
        Err(TrieError::NotSupported("serialize"))
    }

    /// Optional operations this engine offers
    fn capabilities(&self) -> Capabilities;
}
