use crate::chunk::uri::DocUri;
use std::collections::{BTreeMap, BTreeSet};

/// Original document URI to its final URI. `key == value` marks a chunk file
/// the chunker already wrote in place.
pub type ChangeTable = BTreeMap<DocUri, DocUri>;

/// Original URI to the URI of a different file it collides with.
pub type ConflictTable = BTreeMap<DocUri, DocUri>;

/// Topics absorbed into a chunk; a fragment limits absorption to that element.
pub type ChunkTopicSet = BTreeSet<DocUri>;

/// Final URI to the directory prefix its relative hrefs were authored against.
pub type RelativePathFix = BTreeMap<DocUri, String>;

/// Identity entries of `change_table`, in table order.
pub fn identity_entries(change_table: &ChangeTable) -> impl Iterator<Item = &DocUri> {
    change_table
        .iter()
        .filter(|(key, value)| key == value)
        .map(|(key, _)| key)
}
