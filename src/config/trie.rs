use serde::{Serialize, Deserialize};

use crate::trie::{MerklePatriciaTrie, SortedMapTrie, Trie};

/// Trie engine selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    /// Node-structured Merkle Patricia Trie with full capabilities
    Patricia,
    /// Sorted map hashed from scratch, without serialization
    SortedMap,
}

/// Trie configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrieConfig {
    /// Engine used by the tools
    pub engine: EngineKind,

    /// Memoize node references between hash computations
    pub cache_hashes: bool,
}

impl Default for TrieConfig {
    fn default() -> Self {
        Self {
            engine: EngineKind::Patricia,
            cache_hashes: true,
        }
    }
}

impl TrieConfig {
    /// Build an empty trie of the configured engine
    pub fn build_engine(&self) -> Box<dyn Trie> {
        match self.engine {
            EngineKind::Patricia => Box::new(MerklePatriciaTrie::with_hash_cache(self.cache_hashes)),
            EngineKind::SortedMap => Box::new(SortedMapTrie::new()),
        }
    }
}
