// mptrie - In-memory Modified Merkle Patricia Trie with Ethereum-compatible root hashes

pub mod config;
pub mod crypto;
pub mod error;
pub mod trie;

pub use crypto::{Hash, EMPTY_ROOT};
pub use error::TrieError;
pub use trie::{Capabilities, MerklePatriciaTrie, SortedMapTrie, Trie};

// Initialize logging
pub fn init_logger() {
    env_logger::init();
}
