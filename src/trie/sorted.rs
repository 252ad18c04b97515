//! Value-only trie engine.
//!
//! `SortedMapTrie` keeps nothing but a sorted key-value map and derives the
//! root hash by building the canonical encoding bottom-up from the sorted
//! keys, the way batch trie-root builders do. It keeps no node structure, so
//! it reports serialization as unsupported; it serves as an independent
//! cross-check of `MerklePatriciaTrie` hashes.

use std::collections::BTreeMap;

use log::trace;

use crate::crypto::Hash;
use crate::error::TrieError;
use crate::trie::codec::{encode_branch, encode_extension, encode_leaf, reference_of};
use crate::trie::encode::{bytes_to_nibbles, common_prefix_len, Nibble};
use crate::trie::{Capabilities, Trie};

/// Trie engine backed by a sorted map
#[derive(Debug, Clone, Default)]
pub struct SortedMapTrie {
    entries: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl SortedMapTrie {
    /// Create a new empty trie
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the trie holds no keys
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Compute the root hash from scratch
    pub fn root_hash(&self) -> Hash {
        // Byte order of keys is nibble order of their paths
        let input: Vec<(Vec<Nibble>, &[u8])> = self
            .entries
            .iter()
            .map(|(key, value)| (bytes_to_nibbles(key), value.as_slice()))
            .collect();

        let encoded = Self::encode_range(&input, 0);
        trace!("sorted root over {} keys: {} bytes", input.len(), encoded.len());
        Hash::from_data(&encoded)
    }

    /// Canonical encoding of the subtree holding `input` (sorted, distinct
    /// paths sharing their first `depth` nibbles)
    fn encode_range(input: &[(Vec<Nibble>, &[u8])], depth: usize) -> Vec<u8> {
        let (first_path, first_value) = match input {
            [] => return rlp::NULL_RLP.to_vec(),
            [(path, value)] => return encode_leaf(&path[depth..], value),
            [first, ..] => (&first.0, first.1),
        };

        // Sorted input: the first and last paths bound the shared prefix
        let last_path = &input[input.len() - 1].0;
        let shared = common_prefix_len(&first_path[depth..], &last_path[depth..]);
        if shared > 0 {
            let child = reference_of(Self::encode_range(input, depth + shared));
            return encode_extension(&first_path[depth..depth + shared], &child);
        }

        // A path ending here sorts first and becomes the branch value
        let (value, mut rest) = if first_path.len() == depth {
            (Some(first_value), &input[1..])
        } else {
            (None, input)
        };

        let mut children = Vec::with_capacity(16);
        for nibble in 0..16u8 {
            let len = rest.iter().take_while(|(path, _)| path[depth] == nibble).count();
            if len == 0 {
                children.push(None);
            } else {
                let (group, tail) = rest.split_at(len);
                children.push(Some(reference_of(Self::encode_range(group, depth + 1))));
                rest = tail;
            }
        }

        encode_branch(children, value)
    }
}

impl Trie for SortedMapTrie {
    fn get(&self, key: &[u8]) -> Result<Vec<u8>, TrieError> {
        self.entries.get(key).cloned().ok_or(TrieError::NotFound)
    }

    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), TrieError> {
        if value.is_empty() {
            self.entries.remove(key);
        } else {
            self.entries.insert(key.to_vec(), value.to_vec());
        }
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<(), TrieError> {
        self.entries.remove(key).map(|_| ()).ok_or(TrieError::NotFound)
    }

    fn hash(&self) -> Hash {
        self.root_hash()
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            delete: true,
            serialize: false,
        }
    }
}
