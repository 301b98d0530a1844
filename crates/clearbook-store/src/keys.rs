//! Key encoding.
//!
//! Every key is `prefix || subkey`, where numeric subkeys are fixed-width
//! big-endian. Lexicographic byte order therefore equals numeric order, which
//! range and reverse scans rely on.

use clearbook_types::BlockHeight;

/// Separator appended to a table or namespace name.
pub const SEPARATOR: u8 = b'/';

/// `name || '/'`.
#[must_use]
pub fn table_prefix(name: &str) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(name.len() + 1);
    prefix.extend_from_slice(name.as_bytes());
    prefix.push(SEPARATOR);
    prefix
}

/// `prefix || subkey`.
#[must_use]
pub fn prefix_key(prefix: &[u8], subkey: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(prefix.len() + subkey.len());
    key.extend_from_slice(prefix);
    key.extend_from_slice(subkey);
    key
}

/// Smallest key strictly greater than every key starting with `prefix`.
///
/// `None` when no such key exists (empty prefix or all `0xff`), meaning the
/// scan runs to the end of the keyspace.
#[must_use]
pub fn prefix_end(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut end = prefix.to_vec();
    while let Some(last) = end.pop() {
        if last < u8::MAX {
            end.push(last + 1);
            return Some(end);
        }
    }
    None
}

/// Fixed-width big-endian encoding of a `u64` subkey.
#[must_use]
pub fn u64_subkey(value: u64) -> [u8; 8] {
    value.to_be_bytes()
}

/// Subkey for a block height.
#[must_use]
pub fn block_subkey(height: BlockHeight) -> [u8; 8] {
    u64_subkey(height)
}

/// Concatenate several subkeys.
#[must_use]
pub fn join(parts: &[&[u8]]) -> Vec<u8> {
    parts.concat()
}
