/// Nibble is a 4-bit value (0-15)
pub type Nibble = u8;

/// Encode a byte slice into a vector of nibbles
///
/// Each byte is split into two nibbles (4-bit values), high nibble first.
/// For example, the byte 0xAB becomes two nibbles: 0xA and 0xB.
pub fn bytes_to_nibbles(bytes: &[u8]) -> Vec<Nibble> {
    let mut nibbles = Vec::with_capacity(bytes.len() * 2);

    for &byte in bytes {
        nibbles.push(byte >> 4);
        nibbles.push(byte & 0x0F);
    }

    nibbles
}

/// Length of the longest prefix shared by two nibble paths
pub fn common_prefix_len(a: &[Nibble], b: &[Nibble]) -> usize {
    a.iter()
        .zip(b.iter())
        .take_while(|(x, y)| x == y)
        .count()
}

/// Concatenate two nibble paths
pub fn concat_nibbles(prefix: &[Nibble], suffix: &[Nibble]) -> Vec<Nibble> {
    let mut path = Vec::with_capacity(prefix.len() + suffix.len());
    path.extend_from_slice(prefix);
    path.extend_from_slice(suffix);
    path
}

/// Convert a vector of nibbles to a hex string
///
/// Each nibble becomes a hex character.
/// For example, the nibbles [0xA, 0xB] become the string "ab".
pub fn nibbles_to_hex(nibbles: &[Nibble]) -> String {
    nibbles
        .iter()
        .map(|&nibble| char::from_digit(u32::from(nibble), 16).unwrap_or('?'))
        .collect()
}

/// Compact (hex-prefix) encoding for paths in extension and leaf nodes
///
/// The first nibble of the compact encoding contains flags:
/// - bit 0 is set when the path has an odd number of nibbles
/// - bit 1 is set when the path belongs to a leaf node
///
/// An odd path stores its first nibble in the low half of the first byte;
/// an even path pads the first byte with a zero nibble.
///
/// For example:
/// - [0, 1, 2, 3, 4, 5] as an extension node becomes [0x00, 0x01, 0x23, 0x45]
/// - [0, 1, 2, 3, 4, 5] as a leaf node becomes [0x20, 0x01, 0x23, 0x45]
/// - [1, 2, 3, 4, 5] as an extension node becomes [0x11, 0x23, 0x45]
/// - [1, 2, 3, 4, 5] as a leaf node becomes [0x31, 0x23, 0x45]
pub fn compact_encode(nibbles: &[Nibble], is_leaf: bool) -> Vec<u8> {
    let mut compact = Vec::with_capacity(nibbles.len() / 2 + 1);

    let mut flags = if is_leaf { 0x20 } else { 0x00 };

    let rest = if nibbles.len() % 2 == 1 {
        flags |= 0x10;
        compact.push(flags | nibbles[0]);
        &nibbles[1..]
    } else {
        compact.push(flags);
        nibbles
    };

    for pair in rest.chunks(2) {
        compact.push((pair[0] << 4) | pair[1]);
    }

    compact
}
