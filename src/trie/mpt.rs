use std::mem;

use array_init::array_init;
use log::{debug, trace};

use crate::crypto::Hash;
use crate::error::TrieError;
use crate::trie::codec::{encode_node, root_hash};
use crate::trie::encode::{
    bytes_to_nibbles, common_prefix_len, concat_nibbles, nibbles_to_hex, Nibble,
};
use crate::trie::node::Node;
use crate::trie::{Capabilities, Trie};

type Children = [Option<Box<Node>>; 16];

/// Merkle Patricia Trie implementation
#[derive(Debug, Clone)]
pub struct MerklePatriciaTrie {
    /// Root node of the trie
    root: Node,
    /// Memoize node references between hash computations
    cache_hashes: bool,
}

impl Default for MerklePatriciaTrie {
    fn default() -> Self {
        Self::new()
    }
}

impl MerklePatriciaTrie {
    /// Create a new empty trie
    pub fn new() -> Self {
        Self::with_hash_cache(true)
    }

    /// Create a new empty trie, choosing whether node references are memoized
    pub fn with_hash_cache(cache_hashes: bool) -> Self {
        Self {
            root: Node::empty(),
            cache_hashes,
        }
    }

    /// Root node of the trie
    pub fn root(&self) -> &Node {
        &self.root
    }

    /// Check if the trie holds no keys
    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        fn count(node: &Node) -> usize {
            match node {
                Node::Empty => 0,
                Node::Leaf { .. } => 1,
                Node::Extension { child, .. } => count(child),
                Node::Branch { children, value, .. } => {
                    usize::from(value.is_some())
                        + children.iter().flatten().map(|c| count(c)).sum::<usize>()
                }
            }
        }
        count(&self.root)
    }

    /// Get the root hash of the trie
    pub fn root_hash(&self) -> Hash {
        root_hash(&self.root, self.cache_hashes)
    }

    /// Canonical encoding of the root node
    pub fn encoded_root(&self) -> Vec<u8> {
        encode_node(&self.root, self.cache_hashes)
    }

    /// Get a value from the trie
    pub fn lookup(&self, key: &[u8]) -> Option<&[u8]> {
        let nibbles = bytes_to_nibbles(key);
        Self::get_at(&self.root, &nibbles)
    }

    /// Helper function to get a value below a node
    fn get_at<'a>(node: &'a Node, path: &[Nibble]) -> Option<&'a [u8]> {
        match node {
            Node::Empty => None,

            Node::Leaf { path: suffix, value, .. } => {
                (suffix.as_slice() == path).then_some(value.as_slice())
            }

            Node::Extension { path: prefix, child, .. } => {
                let rest = path.strip_prefix(prefix.as_slice())?;
                Self::get_at(child, rest)
            }

            Node::Branch { children, value, .. } => match path.split_first() {
                None => value.as_deref(),
                Some((&nibble, rest)) => {
                    let child = children[nibble as usize].as_deref()?;
                    Self::get_at(child, rest)
                }
            },
        }
    }

    /// Insert a key-value pair into the trie.
    ///
    /// An empty value removes the key instead.
    pub fn insert(&mut self, key: &[u8], value: Vec<u8>) {
        if value.is_empty() {
            match self.remove(key) {
                Ok(_) => debug!("Empty value removed key {}", hex::encode(key)),
                Err(_) => trace!("Empty value for absent key {}", hex::encode(key)),
            }
            return;
        }

        let nibbles = bytes_to_nibbles(key);
        trace!("Inserting path {} ({} value bytes)", nibbles_to_hex(&nibbles), value.len());
        let root = mem::take(&mut self.root);
        self.root = Self::insert_at(root, &nibbles, value);
    }

    /// Helper function to insert a value below a node, returning its replacement
    fn insert_at(node: Node, path: &[Nibble], value: Vec<u8>) -> Node {
        match node {
            Node::Empty => Node::leaf(path.to_vec(), value),

            Node::Leaf { path: suffix, value: old_value, .. } => {
                let common = common_prefix_len(path, &suffix);
                if common == suffix.len() && common == path.len() {
                    // Same key, replace the value
                    return Node::leaf(suffix, value);
                }

                // The paths diverge at `common`: hang both below a new branch
                let mut children: Children = array_init(|_| None);
                let mut branch_value = None;
                Self::place_value(&mut children, &mut branch_value, &suffix[common..], old_value);
                Self::place_value(&mut children, &mut branch_value, &path[common..], value);

                Self::join(&path[..common], Node::branch(children, branch_value))
            }

            Node::Extension { path: prefix, child, .. } => {
                let common = common_prefix_len(path, &prefix);
                if common == prefix.len() {
                    let new_child = Self::insert_at(*child, &path[common..], value);
                    return Self::join(&prefix, new_child);
                }

                // Split the extension; its remainder past `common` is non-empty
                let mut children: Children = array_init(|_| None);
                let mut branch_value = None;
                children[prefix[common] as usize] =
                    Some(Box::new(Self::join(&prefix[common + 1..], *child)));
                Self::place_value(&mut children, &mut branch_value, &path[common..], value);

                Self::join(&prefix[..common], Node::branch(children, branch_value))
            }

            Node::Branch { mut children, value: branch_value, .. } => match path.split_first() {
                None => Node::branch(children, Some(value)),
                Some((&nibble, rest)) => {
                    let slot = &mut children[nibble as usize];
                    let child = slot.take().map(|c| *c).unwrap_or_default();
                    *slot = Some(Box::new(Self::insert_at(child, rest, value)));
                    Node::branch(children, branch_value)
                }
            },
        }
    }

    /// Store a value below a branch being built: on the branch itself when
    /// the remaining path is empty, otherwise in a leaf under its first nibble
    fn place_value(
        children: &mut Children,
        branch_value: &mut Option<Vec<u8>>,
        path: &[Nibble],
        value: Vec<u8>,
    ) {
        match path.split_first() {
            None => *branch_value = Some(value),
            Some((&nibble, rest)) => {
                children[nibble as usize] = Some(Box::new(Node::leaf(rest.to_vec(), value)));
            }
        }
    }

    /// Prefix a node with a nibble path, merging into leaves and extensions
    /// so that no extension ever points at a leaf or another extension
    fn join(prefix: &[Nibble], node: Node) -> Node {
        if prefix.is_empty() {
            return node;
        }

        match node {
            Node::Empty => Node::empty(),
            Node::Leaf { path, value, .. } => Node::leaf(concat_nibbles(prefix, &path), value),
            Node::Extension { path, child, .. } => {
                Node::extension(concat_nibbles(prefix, &path), *child)
            }
            branch @ Node::Branch { .. } => Node::extension(prefix.to_vec(), branch),
        }
    }

    /// Delete a key from the trie, returning its value
    pub fn remove(&mut self, key: &[u8]) -> Result<Vec<u8>, TrieError> {
        let nibbles = bytes_to_nibbles(key);
        if Self::get_at(&self.root, &nibbles).is_none() {
            return Err(TrieError::NotFound);
        }

        trace!("Removing path {}", nibbles_to_hex(&nibbles));
        let root = mem::take(&mut self.root);
        let (new_root, removed) = Self::delete_at(root, &nibbles);
        self.root = new_root;
        removed.ok_or(TrieError::NotFound)
    }

    /// Helper function to delete a key below a node.
    ///
    /// Returns the replacement node and the removed value. When nothing was
    /// removed the node comes back unchanged, cache included.
    fn delete_at(node: Node, path: &[Nibble]) -> (Node, Option<Vec<u8>>) {
        match node {
            Node::Empty => (Node::empty(), None),

            Node::Leaf { path: suffix, value, cache } => {
                if suffix.as_slice() == path {
                    (Node::empty(), Some(value))
                } else {
                    (Node::Leaf { path: suffix, value, cache }, None)
                }
            }

            Node::Extension { path: prefix, child, cache } => {
                let rest = match path.strip_prefix(prefix.as_slice()) {
                    Some(rest) => rest,
                    None => return (Node::Extension { path: prefix, child, cache }, None),
                };

                match Self::delete_at(*child, rest) {
                    (new_child, None) => {
                        let child = Box::new(new_child);
                        (Node::Extension { path: prefix, child, cache }, None)
                    }
                    (new_child, removed) => (Self::join(&prefix, new_child), removed),
                }
            }

            Node::Branch { mut children, value, cache } => match path.split_first() {
                None => match value {
                    Some(removed) => (Self::collapse(children, None), Some(removed)),
                    None => (Node::Branch { children, value, cache }, None),
                },
                Some((&nibble, rest)) => {
                    let index = nibble as usize;
                    let child = match children[index].take() {
                        Some(child) => child,
                        None => return (Node::Branch { children, value, cache }, None),
                    };

                    match Self::delete_at(*child, rest) {
                        (new_child, None) => {
                            children[index] = Some(Box::new(new_child));
                            (Node::Branch { children, value, cache }, None)
                        }
                        (new_child, removed) => {
                            if !new_child.is_empty() {
                                children[index] = Some(Box::new(new_child));
                            }
                            (Self::collapse(children, value), removed)
                        }
                    }
                }
            },
        }
    }

    /// Re-canonicalize a branch that lost a child or its value
    fn collapse(mut children: Children, value: Option<Vec<u8>>) -> Node {
        let mut occupied = children
            .iter()
            .enumerate()
            .filter_map(|(i, child)| child.as_ref().map(|_| i));
        let first = occupied.next();
        let single = first.is_some() && occupied.next().is_none();

        match (first, value) {
            (None, None) => Node::empty(),
            (None, Some(value)) => Node::leaf(Vec::new(), value),
            (Some(index), None) if single => match children[index].take() {
                Some(child) => Self::join(&[index as Nibble], *child),
                None => Node::empty(),
            },
            (_, value) => Node::branch(children, value),
        }
    }

    /// Check the structural invariants of the whole tree.
    ///
    /// Returns `TrieError::InvalidNode` describing the first violation found.
    pub fn verify(&self) -> Result<(), TrieError> {
        match &self.root {
            Node::Empty => Ok(()),
            root => Self::verify_node(root),
        }
    }

    fn verify_node(node: &Node) -> Result<(), TrieError> {
        match node {
            Node::Empty => Err(TrieError::InvalidNode("empty node below the root".to_string())),

            Node::Leaf { path, value, .. } => {
                Self::verify_path(path)?;
                if value.is_empty() {
                    return Err(TrieError::InvalidNode("leaf with empty value".to_string()));
                }
                Ok(())
            }

            Node::Extension { path, child, .. } => {
                Self::verify_path(path)?;
                if path.is_empty() {
                    return Err(TrieError::InvalidNode("extension with empty prefix".to_string()));
                }
                match child.as_ref() {
                    branch @ Node::Branch { .. } => Self::verify_node(branch),
                    other => Err(TrieError::InvalidNode(format!(
                        "extension over {} node",
                        other.node_type()
                    ))),
                }
            }

            Node::Branch { children, value, .. } => {
                let count = children.iter().flatten().count();
                if count == 0 || (count == 1 && value.is_none()) {
                    return Err(TrieError::InvalidNode(format!(
                        "branch with {} children and {} value",
                        count,
                        if value.is_some() { "a" } else { "no" }
                    )));
                }
                if value.as_ref().map_or(false, |v| v.is_empty()) {
                    return Err(TrieError::InvalidNode("branch with empty value".to_string()));
                }
                children.iter().flatten().try_for_each(|child| Self::verify_node(child))
            }
        }
    }

    fn verify_path(path: &[Nibble]) -> Result<(), TrieError> {
        match path.iter().find(|&&nibble| nibble > 0x0F) {
            Some(nibble) => Err(TrieError::InvalidNode(format!("invalid nibble {:#x}", nibble))),
            None => Ok(()),
        }
    }
}

impl Trie for MerklePatriciaTrie {
    fn get(&self, key: &[u8]) -> Result<Vec<u8>, TrieError> {
        self.lookup(key).map(<[u8]>::to_vec).ok_or(TrieError::NotFound)
    }

    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), TrieError> {
        self.insert(key, value.to_vec());
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<(), TrieError> {
        self.remove(key).map(|_| ())
    }

    fn hash(&self) -> Hash {
        self.root_hash()
    }

    fn serialize(&self) -> Result<Vec<u8>, TrieError> {
        Ok(self.encoded_root())
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::FULL
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::EMPTY_ROOT;

    fn build(pairs: &[(&[u8], &[u8])]) -> MerklePatriciaTrie {
        let mut trie = MerklePatriciaTrie::new();
        for (key, value) in pairs {
            trie.insert(key, value.to_vec());
            trie.verify().unwrap();
        }
        trie
    }

    #[test]
    fn test_empty_trie() {
        let trie = MerklePatriciaTrie::new();
        assert_eq!(trie.lookup(b"key"), None);
        assert!(trie.is_empty());
        assert_eq!(trie.len(), 0);
        assert_eq!(trie.root_hash(), EMPTY_ROOT);
        assert_eq!(trie.encoded_root(), vec![0x80]);
    }

    #[test]
    fn test_insert_and_get() {
        let mut trie = MerklePatriciaTrie::new();
        trie.insert(b"key1", b"value1".to_vec());

        assert_eq!(trie.lookup(b"key1"), Some(&b"value1"[..]));
        assert_eq!(trie.lookup(b"key2"), None);
        assert_eq!(trie.lookup(b"key"), None);
        assert_eq!(trie.lookup(b"key11"), None);
        assert_eq!(trie.len(), 1);
    }

    #[test]
    fn test_update() {
        let mut trie = build(&[(b"key1", b"value1"), (b"key2", b"value2")]);
        let before = trie.root().clone();

        trie.insert(b"key1", b"value3".to_vec());
        assert_eq!(trie.lookup(b"key1"), Some(&b"value3"[..]));
        assert_eq!(trie.lookup(b"key2"), Some(&b"value2"[..]));
        assert_eq!(trie.len(), 2);
        assert_ne!(trie.root(), &before);

        trie.insert(b"key1", b"value1".to_vec());
        assert_eq!(trie.root(), &before);
    }

    #[test]
    fn test_prefix_keys_share_a_branch_value() {
        let trie = build(&[
            (&[0x01, 0x23, 0x45, 0x67, 0x89], &[0xAA, 0xAA]),
            (&[0x01, 0x23, 0x45, 0x67, 0x89, 0x01], &[0xBB, 0xBB]),
            (&[0x01, 0x23, 0x45, 0x67], &[0xCC, 0xCC]),
        ]);

        // extension 01234567 -> branch holding 0xCCCC with the longer keys below
        let branch = match trie.root() {
            Node::Extension { path, child, .. } => {
                assert_eq!(path, &vec![0, 1, 2, 3, 4, 5, 6, 7]);
                child.as_ref()
            }
            other => panic!("expected extension root, got {}", other.node_type()),
        };
        assert_eq!(branch.value(), Some(&[0xCC, 0xCC][..]));
        assert_eq!(branch.branch_child(8).map(Node::node_type), Some("extension"));
        assert_eq!(trie.len(), 3);
    }

    #[test]
    fn test_delete() {
        let mut trie = build(&[(b"key1", b"value1"), (b"key2", b"value2")]);

        assert_eq!(trie.remove(b"key1"), Ok(b"value1".to_vec()));
        trie.verify().unwrap();
        assert_eq!(trie.lookup(b"key1"), None);
        assert_eq!(trie.lookup(b"key2"), Some(&b"value2"[..]));

        assert_eq!(trie.remove(b"key3"), Err(TrieError::NotFound));
        assert_eq!(trie.remove(b"key1"), Err(TrieError::NotFound));

        // Only the remaining key is left, as a single leaf
        assert_eq!(trie.root(), build(&[(b"key2", b"value2")]).root());
        assert_eq!(trie.remove(b"key2"), Ok(b"value2".to_vec()));
        assert!(trie.is_empty());
        assert_eq!(trie.root_hash(), EMPTY_ROOT);
    }

    #[test]
    fn test_delete_collapses_branch_value() {
        let mut trie = build(&[
            (&[0x01, 0x23], &[0x01]),
            (&[0x01, 0x23, 0x45], &[0x02]),
            (&[0x01, 0x23, 0x46], &[0x03]),
        ]);

        trie.remove(&[0x01, 0x23, 0x45]).unwrap();
        trie.verify().unwrap();
        assert_eq!(trie.root(), build(&[(&[0x01, 0x23], &[0x01]), (&[0x01, 0x23, 0x46], &[0x03])]).root());

        // Dropping the branch value leaves a single leaf
        trie.remove(&[0x01, 0x23]).unwrap();
        trie.verify().unwrap();
        assert_eq!(trie.root(), &Node::leaf(vec![0, 1, 2, 3, 4, 6], vec![0x03]));
    }

    #[test]
    fn test_delete_absent_keeps_hash() {
        let mut trie = build(&[(b"abc", b"1"), (b"abd", b"2"), (b"b", b"3")]);
        let hash = trie.root_hash();

        for key in [&b"ab"[..], b"abe", b"abcd", b"", b"c"] {
            assert_eq!(trie.remove(key), Err(TrieError::NotFound));
        }
        assert_eq!(trie.root_hash(), hash);
    }

    #[test]
    fn test_empty_value_removes_key() {
        let mut trie = build(&[(b"key1", b"value1"), (b"key2", b"value2")]);
        trie.insert(b"key1", Vec::new());
        assert_eq!(trie.lookup(b"key1"), None);
        assert_eq!(trie.root(), build(&[(b"key2", b"value2")]).root());

        // No-op for absent keys
        trie.insert(b"key9", Vec::new());
        assert_eq!(trie.len(), 1);
    }

    #[test]
    fn test_empty_key() {
        let mut trie = build(&[(b"", b"root"), (b"a", b"child")]);
        assert_eq!(trie.lookup(b""), Some(&b"root"[..]));
        assert_eq!(trie.lookup(b"a"), Some(&b"child"[..]));

        trie.remove(b"").unwrap();
        trie.verify().unwrap();
        assert_eq!(trie.root(), build(&[(b"a", b"child")]).root());
    }

    #[test]
    fn test_root_hash() {
        let trie1 = build(&[(b"key1", b"value1"), (b"key2", b"value2")]);
        let mut trie2 = build(&[(b"key2", b"value2"), (b"key1", b"value1")]);
        assert_eq!(trie1.root_hash(), trie2.root_hash());

        trie2.insert(b"key3", b"value3".to_vec());
        assert_ne!(trie1.root_hash(), trie2.root_hash());
    }

    #[test]
    fn test_hash_cache_matches_recomputation() {
        let mut cached = MerklePatriciaTrie::new();
        let mut uncached = MerklePatriciaTrie::with_hash_cache(false);

        for i in 0..200u32 {
            let key = format!("key{}", i);
            let value = format!("value-{:040}", i);
            cached.insert(key.as_bytes(), value.as_bytes().to_vec());
            uncached.insert(key.as_bytes(), value.as_bytes().to_vec());
            if i % 17 == 0 {
                assert_eq!(cached.root_hash(), uncached.root_hash());
            }
        }
        for i in (0..200u32).step_by(3) {
            let key = format!("key{}", i);
            cached.remove(key.as_bytes()).unwrap();
            uncached.remove(key.as_bytes()).unwrap();
            assert_eq!(cached.root_hash(), uncached.root_hash());
        }
        assert_eq!(cached.encoded_root(), uncached.encoded_root());
    }

    #[test]
    fn test_complex_trie() {
        let mut trie = MerklePatriciaTrie::new();

        for i in 0..100 {
            let key = format!("key{}", i);
            let value = format!("value{}", i);
            trie.insert(key.as_bytes(), value.as_bytes().to_vec());
        }
        trie.verify().unwrap();
        assert_eq!(trie.len(), 100);

        for i in 0..100 {
            let key = format!("key{}", i);
            let value = format!("value{}", i);
            assert_eq!(trie.lookup(key.as_bytes()), Some(value.as_bytes()));
        }

        for i in 0..50 {
            let key = format!("key{}", i);
            let value = format!("value{}", i);
            assert_eq!(trie.remove(key.as_bytes()), Ok(value.as_bytes().to_vec()));
            trie.verify().unwrap();
        }

        for i in 0..50 {
            let key = format!("key{}", i);
            assert_eq!(trie.lookup(key.as_bytes()), None);
        }

        for i in 50..100 {
            let key = format!("key{}", i);
            let value = format!("value{}", i);
            assert_eq!(trie.lookup(key.as_bytes()), Some(value.as_bytes()));
        }
        assert_eq!(trie.len(), 50);
    }

    #[test]
    fn test_verify_rejects_bad_shapes() {
        let mut trie = MerklePatriciaTrie::new();

        trie.root = Node::extension(vec![1], Node::leaf(vec![2], vec![3]));
        assert!(matches!(trie.verify(), Err(TrieError::InvalidNode(_))));

        trie.root = Node::extension(Vec::new(), Node::empty_branch());
        assert!(matches!(trie.verify(), Err(TrieError::InvalidNode(_))));

        let mut children: Children = array_init(|_| None);
        children[4] = Some(Box::new(Node::leaf(vec![1], vec![1])));
        trie.root = Node::branch(children, None);
        assert!(matches!(trie.verify(), Err(TrieError::InvalidNode(_))));

        trie.root = Node::leaf(vec![0x10], vec![1]);
        assert!(matches!(trie.verify(), Err(TrieError::InvalidNode(_))));
    }
}
