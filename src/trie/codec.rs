//! Canonical node encoding.
//!
//! Nodes are framed with RLP. A child whose encoding is shorter than
//! `INLINE_THRESHOLD` bytes is embedded verbatim in its parent; larger
//! children are replaced by the Keccak-256 digest of their encoding. The root
//! is always hashed, whatever its size.

use log::trace;
use rlp::RlpStream;

use crate::crypto::Hash;
use crate::trie::encode::{compact_encode, Nibble};
use crate::trie::node::{Node, NodeRef};

/// Encodings shorter than this are inlined into the parent
pub const INLINE_THRESHOLD: usize = 32;

/// Encode a leaf: `[compact(path, leaf), value]`
pub fn encode_leaf(path: &[Nibble], value: &[u8]) -> Vec<u8> {
    let mut stream = RlpStream::new_list(2);
    stream.append(&compact_encode(path, true).as_slice());
    stream.append(&value);
    stream.out().to_vec()
}

/// Encode an extension: `[compact(path, extension), childRef]`
pub fn encode_extension(path: &[Nibble], child: &NodeRef) -> Vec<u8> {
    let mut stream = RlpStream::new_list(2);
    stream.append(&compact_encode(path, false).as_slice());
    append_ref(&mut stream, child);
    stream.out().to_vec()
}

/// Encode a branch: sixteen child references followed by the value.
///
/// `children` must yield exactly sixteen slots.
pub fn encode_branch<I>(children: I, value: Option<&[u8]>) -> Vec<u8>
where
    I: IntoIterator<Item = Option<NodeRef>>,
{
    let mut stream = RlpStream::new_list(17);
    let mut slots = 0;
    for child in children {
        match child {
            Some(child) => append_ref(&mut stream, &child),
            None => {
                stream.append_empty_data();
            }
        }
        slots += 1;
    }
    debug_assert_eq!(slots, 16, "branch encoded with {} slots", slots);

    match value {
        Some(value) => stream.append(&value),
        None => stream.append_empty_data(),
    };
    stream.out().to_vec()
}

/// Canonical encoding of a node.
///
/// With `use_cache`, child references come from (and populate) the per-node
/// caches.
pub fn encode_node(node: &Node, use_cache: bool) -> Vec<u8> {
    match node {
        Node::Empty => rlp::NULL_RLP.to_vec(),
        Node::Leaf { path, value, .. } => encode_leaf(path, value),
        Node::Extension { path, child, .. } => {
            encode_extension(path, &node_ref(child, use_cache))
        }
        Node::Branch { children, value, .. } => encode_branch(
            children
                .iter()
                .map(|child| child.as_deref().map(|c| node_ref(c, use_cache))),
            value.as_deref(),
        ),
    }
}

/// Turn an encoding into the reference a parent embeds
pub fn reference_of(encoded: Vec<u8>) -> NodeRef {
    if encoded.len() < INLINE_THRESHOLD {
        NodeRef::Inline(encoded)
    } else {
        NodeRef::Hash(Hash::from_data(&encoded))
    }
}

/// Reference of a node as embedded in its parent
pub fn node_ref(node: &Node, use_cache: bool) -> NodeRef {
    match node.cache() {
        Some(cache) if use_cache => cache
            .get_or_init(|| reference_of(encode_node(node, true)))
            .clone(),
        _ => reference_of(encode_node(node, use_cache)),
    }
}

/// Root hash of the tree below `node`: the digest of its encoding, even when
/// the encoding would otherwise be inlined
pub fn root_hash(node: &Node, use_cache: bool) -> Hash {
    let reference = node_ref(node, use_cache);
    trace!("root {} reference: {:?}", node.node_type(), reference);
    reference.digest()
}

fn append_ref(stream: &mut RlpStream, reference: &NodeRef) {
    match reference {
        NodeRef::Inline(encoded) => stream.append_raw(encoded, 1),
        NodeRef::Hash(hash) => stream.append(&hash.as_bytes().as_slice()),
    };
}
