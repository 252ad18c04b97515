use thiserror::Error;

/// Trie error types
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrieError {
    /// Key is not stored in the trie
    #[error("Key not found")]
    NotFound,

    /// Operation is not offered by this engine
    #[error("Operation not supported: {0}")]
    NotSupported(&'static str),

    /// Structural invariant violated
    #[error("Invalid node: {0}")]
    InvalidNode(String),
}

impl TrieError {
    /// Whether this error means the key was absent
    pub fn is_not_found(&self) -> bool {
        matches!(self, TrieError::NotFound)
    }

    /// Whether this error means the engine lacks the capability
    pub fn is_not_supported(&self) -> bool {
        matches!(self, TrieError::NotSupported(_))
    }
}
