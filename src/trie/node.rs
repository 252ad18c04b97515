use std::fmt;

use array_init::array_init;
use once_cell::unsync::OnceCell;

use crate::crypto::Hash;
use crate::trie::encode::Nibble;

/// Reference to a node as embedded in its parent's encoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeRef {
    /// Encoding shorter than 32 bytes, embedded verbatim
    Inline(Vec<u8>),
    /// Keccak-256 of the encoding
    Hash(Hash),
}

impl NodeRef {
    /// Digest of the referenced encoding
    pub fn digest(&self) -> Hash {
        match self {
            NodeRef::Inline(encoded) => Hash::from_data(encoded),
            NodeRef::Hash(hash) => *hash,
        }
    }
}

/// Memoized reference of a node.
///
/// Mutations rebuild every node on the touched path, so a node's cache never
/// outlives the contents it was computed from. The cache takes no part in
/// node equality.
#[doc(hidden)]
#[derive(Clone, Default)]
pub struct RefCache(OnceCell<NodeRef>);

impl RefCache {
    /// Cached reference, if computed
    pub fn get(&self) -> Option<&NodeRef> {
        self.0.get()
    }

    /// Return the cached reference, computing it on first use
    pub fn get_or_init<F: FnOnce() -> NodeRef>(&self, f: F) -> &NodeRef {
        self.0.get_or_init(f)
    }
}

impl PartialEq for RefCache {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

impl Eq for RefCache {}

impl fmt::Debug for RefCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(_) => write!(f, "RefCache(cached)"),
            None => write!(f, "RefCache(empty)"),
        }
    }
}

/// Node types in the Merkle Patricia Trie
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Node {
    /// Empty node (null)
    #[default]
    Empty,

    /// Leaf node containing a value
    Leaf {
        /// Remaining nibble path from this point to the stored key
        path: Vec<Nibble>,
        /// Value stored at this leaf
        value: Vec<u8>,
        /// Memoized reference, owned by the engine
        cache: RefCache,
    },

    /// Extension node with a shared prefix
    Extension {
        /// Nibble prefix shared by every key below
        path: Vec<Nibble>,
        /// Next node, always a branch in a canonical trie
        child: Box<Node>,
        /// Memoized reference, owned by the engine
        cache: RefCache,
    },

    /// Branch node with up to 16 children
    Branch {
        /// Children nodes (one for each hex digit)
        children: [Option<Box<Node>>; 16],
        /// Value whose key ends exactly at this branch
        value: Option<Vec<u8>>,
        /// Memoized reference, owned by the engine
        cache: RefCache,
    },
}

impl Node {
    /// Create a new empty node
    pub fn empty() -> Self {
        Node::Empty
    }

    /// Create a new leaf node
    pub fn leaf(path: Vec<Nibble>, value: Vec<u8>) -> Self {
        Node::Leaf { path, value, cache: RefCache::default() }
    }

    /// Create a new extension node
    pub fn extension(path: Vec<Nibble>, child: Node) -> Self {
        Node::Extension { path, child: Box::new(child), cache: RefCache::default() }
    }

    /// Create a new branch node
    pub fn branch(children: [Option<Box<Node>>; 16], value: Option<Vec<u8>>) -> Self {
        Node::Branch { children, value, cache: RefCache::default() }
    }

    /// Create a new branch node with no children or value
    pub fn empty_branch() -> Self {
        Node::branch(array_init(|_| None), None)
    }

    /// Check if the node is empty
    pub fn is_empty(&self) -> bool {
        matches!(self, Node::Empty)
    }

    /// Get the value from a node if it's a leaf or branch with value
    pub fn value(&self) -> Option<&[u8]> {
        match self {
            Node::Leaf { value, .. } => Some(value),
            Node::Branch { value: Some(v), .. } => Some(v),
            _ => None,
        }
    }

    /// Get the child of an extension node
    pub fn child(&self) -> Option<&Node> {
        match self {
            Node::Extension { child, .. } => Some(child),
            _ => None,
        }
    }

    /// Get a child of a branch node
    pub fn branch_child(&self, index: usize) -> Option<&Node> {
        match self {
            Node::Branch { children, .. } => children.get(index)?.as_deref(),
            _ => None,
        }
    }

    /// Get the path of a leaf or extension node
    pub fn path(&self) -> Option<&[Nibble]> {
        match self {
            Node::Leaf { path, .. } | Node::Extension { path, .. } => Some(path),
            _ => None,
        }
    }

    /// Memoized reference cache, absent for the empty node
    pub fn cache(&self) -> Option<&RefCache> {
        match self {
            Node::Empty => None,
            Node::Leaf { cache, .. }
            | Node::Extension { cache, .. }
            | Node::Branch { cache, .. } => Some(cache),
        }
    }

    /// Get the node type as a string
    pub fn node_type(&self) -> &'static str {
        match self {
            Node::Empty => "empty",
            Node::Leaf { .. } => "leaf",
            Node::Extension { .. } => "extension",
            Node::Branch { .. } => "branch",
        }
    }
}
