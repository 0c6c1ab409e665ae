use crate::chunk::conflict;
use crate::chunk::failure::{FailureKind, FileFailure};
use crate::chunk::fsops;
use crate::chunk::reconcile::ReconcileOutcome;
use crate::chunk::registry::{FileFormat, Registry};
use crate::chunk::tables::{
    ChangeTable, ChunkTopicSet, ConflictTable, RelativePathFix, identity_entries,
};
use crate::chunk::uri::{DocUri, WorkDir};
use std::collections::BTreeSet;
use tracing::debug;

const MAP_EXTENSION: &str = "ditamap";

/// The working sets that decide which files survive a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetainedSets {
    pub topic_list: BTreeSet<DocUri>,
    pub map_list: BTreeSet<DocUri>,
    pub chunked_topic_set: BTreeSet<DocUri>,
    pub chunked_map_set: BTreeSet<DocUri>,
    /// Previously registered topics nobody wants any more.
    pub old_topic_list: BTreeSet<DocUri>,
}

impl RetainedSets {
    pub fn all(&self) -> BTreeSet<DocUri> {
        self.topic_list
            .iter()
            .chain(&self.map_list)
            .chain(&self.chunked_map_set)
            .chain(&self.chunked_topic_set)
            .cloned()
            .collect()
    }

    /// Move the bookkeeping for `from` over to `to`.
    pub fn relocated(mut self, from: &DocUri, to: &DocUri) -> Self {
        if self.chunked_map_set.remove(from) {
            self.map_list.remove(from);
            self.map_list.insert(to.clone());
            self.chunked_map_set.insert(to.clone());
        } else {
            self.topic_list.remove(from);
            self.chunked_topic_set.remove(from);
            self.topic_list.insert(to.clone());
            self.chunked_topic_set.insert(to.clone());
        }
        self.old_topic_list.remove(to);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkedKind {
    Topic,
    Map,
}

/// Files without an extension are treated as maps.
fn classify(uri: &DocUri) -> ChunkedKind {
    match uri.extension() {
        Some(ext) if !ext.eq_ignore_ascii_case(MAP_EXTENSION) => ChunkedKind::Topic,
        _ => ChunkedKind::Map,
    }
}

fn absorbs(absorbed: &DocUri, candidate: &DocUri) -> bool {
    if absorbed.has_fragment() {
        candidate == absorbed
    } else {
        candidate.resolved() == *absorbed
    }
}

/// Drop every entry a chunk absorbed. Whole-document absorption removes all
/// fragment-less references to the document; fragment absorption removes only
/// the exact reference.
pub fn remove_absorbed(
    href_topics: BTreeSet<DocUri>,
    chunk_topics: &ChunkTopicSet,
) -> BTreeSet<DocUri> {
    let absorbed = chunk_topics
        .iter()
        .map(DocUri::resolved)
        .collect::<Vec<_>>();
    href_topics
        .into_iter()
        .filter(|uri| !absorbed.iter().any(|a| absorbs(a, uri)))
        .collect()
}

/// Registry targets still referenced directly after chunking.
pub fn href_topics(registry: &Registry, chunk_topics: &ChunkTopicSet) -> BTreeSet<DocUri> {
    let absorbed = chunk_topics
        .iter()
        .map(DocUri::resolved)
        .collect::<BTreeSet<_>>();
    let targets = registry
        .records()
        .filter(|r| r.is_target && !absorbed.contains(&r.uri.resolved()))
        .map(|r| r.uri.clone())
        .collect();
    remove_absorbed(targets, &absorbed)
}

pub fn plan_retained_sets(
    registry: &Registry,
    change_table: &ChangeTable,
    href_topics: &BTreeSet<DocUri>,
) -> RetainedSets {
    let mut topic_list = href_topics.clone();
    let mut old_topic_list = registry
        .records()
        .filter(|r| r.is_topic() && !topic_list.contains(&r.uri))
        .map(|r| r.uri.clone())
        .collect::<BTreeSet<_>>();
    let mut map_list = registry
        .records()
        .filter(|r| r.is_map())
        .map(|r| r.uri.clone())
        .collect::<BTreeSet<_>>();
    let mut chunked_topic_set = BTreeSet::new();
    let mut chunked_map_set = BTreeSet::new();

    for original in identity_entries(change_table) {
        let chunked = original.resolved();
        match classify(&chunked) {
            ChunkedKind::Topic => {
                chunked_topic_set.insert(chunked.clone());
                if topic_list.insert(chunked.clone()) {
                    old_topic_list.remove(&chunked);
                }
            }
            ChunkedKind::Map => {
                if map_list.insert(chunked.clone()) {
                    old_topic_list.remove(&chunked);
                }
                chunked_map_set.insert(chunked);
            }
        }
    }

    RetainedSets {
        topic_list,
        map_list,
        chunked_topic_set,
        chunked_map_set,
        old_topic_list,
    }
}

/// Delete obsolete files. A file stays while any retained URI, fragment or
/// not, still addresses it.
fn delete_obsolete(work_dir: &WorkDir, sets: &RetainedSets, outcome: &mut ReconcileOutcome) {
    let referenced = sets
        .all()
        .iter()
        .map(DocUri::strip_fragment)
        .collect::<BTreeSet<_>>();
    for uri in &sets.old_topic_list {
        if referenced.contains(&uri.strip_fragment()) {
            debug!("keep {uri}; file still referenced");
            continue;
        }
        let path = work_dir.path_of(uri);
        debug!("delete {}", path.display());
        match fsops::delete_quietly(&path) {
            Ok(true) => outcome.deleted_files += 1,
            Ok(false) => {}
            Err(err) => {
                outcome.record_failure(FileFailure::new(FailureKind::Delete, uri.as_str(), &err))
            }
        }
    }
}

fn prune_records(registry: &mut Registry, sets: &RetainedSets, outcome: &mut ReconcileOutcome) {
    let all = sets.all();
    for uri in sets.old_topic_list.difference(&all) {
        if registry.remove(uri).is_some() {
            debug!("unregister {uri}");
            outcome.records_removed += 1;
        }
    }
}

fn upsert_records(registry: &mut Registry, sets: &RetainedSets, outcome: &mut ReconcileOutcome) {
    let mut touched = BTreeSet::new();

    for uri in &sets.topic_list {
        let key = uri.strip_fragment();
        registry.get_or_create(&key).format = Some(FileFormat::Topic);
        touched.insert(key);
    }
    for uri in &sets.map_list {
        registry.get_or_create(uri).format = Some(FileFormat::Map);
        touched.insert(uri.clone());
    }
    for uri in &sets.chunked_map_set {
        let record = registry.get_or_create(uri);
        record.format = Some(FileFormat::Map);
        record.is_resource_only = false;
        touched.insert(uri.clone());
    }
    for uri in &sets.chunked_topic_set {
        let key = uri.strip_fragment();
        let record = registry.get_or_create(&key);
        record.format = Some(FileFormat::Topic);
        record.is_resource_only = false;
        touched.insert(key);
    }

    outcome.records_upserted = touched.len();
}

/// Bring the registry and the working directory in line with the chunked
/// topology. Returns the directory prefixes of files moved by conflict
/// settlement.
pub fn reconcile_registry(
    work_dir: &WorkDir,
    registry: &mut Registry,
    change_table: &ChangeTable,
    conflict_table: &mut ConflictTable,
    chunk_topics: &ChunkTopicSet,
    outcome: &mut ReconcileOutcome,
) -> RelativePathFix {
    let referenced = href_topics(registry, chunk_topics);
    let sets = plan_retained_sets(registry, change_table, &referenced);
    let sets = conflict::carry_settled(work_dir, change_table, conflict_table, sets);

    delete_obsolete(work_dir, &sets, outcome);

    let (sets, path_fix) = conflict::settle_conflicts(
        work_dir,
        registry,
        change_table,
        conflict_table,
        sets,
        outcome,
    );

    prune_records(registry, &sets, outcome);
    upsert_records(registry, &sets, outcome);

    if let Err(err) = registry.write() {
        outcome.record_failure(FileFailure::new(
            FailureKind::Persist,
            registry.path().display().to_string(),
            &err,
        ));
    }

    path_fix
}
