use crate::chunk::naming::ChunkFilenameGenerator;
use crate::chunk::tables::{ChangeTable, ChunkTopicSet, ConflictTable};
use crate::chunk::uri::{DocUri, WorkDir};
use crate::error::ChunkError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

const GENERATED_CHUNK_PREFIX: &str = "Chunk";
const GENERATED_CHUNK_EXTENSION: &str = ".dita";

/// One chunk action as decided by the chunk policy. Opaque to reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkOperation {
    pub kind: String,
    #[serde(default)]
    pub src: Option<DocUri>,
    #[serde(default)]
    pub dst: Option<DocUri>,
}

/// Serialized output of the upstream chunker. Locations may be relative to
/// the working directory, absolute paths under it, or `file:` URIs.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChunkPlan {
    #[serde(default)]
    pub operations: Vec<ChunkOperation>,
    #[serde(default)]
    pub change_table: BTreeMap<String, String>,
    #[serde(default)]
    pub conflict_table: BTreeMap<String, String>,
    #[serde(default)]
    pub chunk_topics: Vec<String>,
}

pub trait ChunkPolicyEvaluator {
    fn set_navigation_support(&mut self, enabled: bool);

    fn set_root_chunk_override(&mut self, value: Option<&str>);

    fn read(&mut self, map_file: &Path) -> Result<(), ChunkError>;

    fn chunk_operations(&self) -> &[ChunkOperation];

    fn change_table(&self) -> &ChangeTable;

    fn conflict_table(&self) -> &ConflictTable;

    fn chunk_topic_set(&self) -> &ChunkTopicSet;
}

/// Evaluator backed by a precomputed [`ChunkPlan`].
pub struct PlanEvaluator {
    navigation_support: bool,
    root_chunk_override: Option<String>,
    maps_read: Vec<PathBuf>,
    operations: Vec<ChunkOperation>,
    change_table: ChangeTable,
    conflict_table: ConflictTable,
    chunk_topics: ChunkTopicSet,
}

fn to_uri(work_dir: &WorkDir, raw: &str) -> Result<DocUri, ChunkError> {
    work_dir.relativize(raw).ok_or_else(|| {
        ChunkError::InvalidPlan(format!(
            "{raw} is not a location under {}",
            work_dir.root().display()
        ))
    })
}

fn to_table(
    work_dir: &WorkDir,
    raw: &BTreeMap<String, String>,
) -> Result<BTreeMap<DocUri, DocUri>, ChunkError> {
    raw.iter()
        .map(|(key, value)| Ok((to_uri(work_dir, key)?, to_uri(work_dir, value)?)))
        .collect()
}

impl PlanEvaluator {
    pub fn load(
        plan_path: &Path,
        work_dir: &WorkDir,
        generator: Box<dyn ChunkFilenameGenerator>,
    ) -> Result<Self, ChunkError> {
        let raw = fs::read_to_string(plan_path).map_err(|err| {
            ChunkError::InvalidPlan(format!("failed to read {}: {err}", plan_path.display()))
        })?;
        let plan: ChunkPlan = serde_json::from_str(&raw).map_err(|err| {
            ChunkError::InvalidPlan(format!("failed to parse {}: {err}", plan_path.display()))
        })?;
        Self::from_plan(plan, work_dir, generator)
    }

    pub fn from_plan(
        plan: ChunkPlan,
        work_dir: &WorkDir,
        generator: Box<dyn ChunkFilenameGenerator>,
    ) -> Result<Self, ChunkError> {
        let change_table = to_table(work_dir, &plan.change_table)?;
        let conflict_table = to_table(work_dir, &plan.conflict_table)?;
        let chunk_topics = plan
            .chunk_topics
            .iter()
            .map(|raw| to_uri(work_dir, raw))
            .collect::<Result<ChunkTopicSet, _>>()?;

        let operations = plan
            .operations
            .into_iter()
            .map(|op| {
                let src = op.src.map(|src| src.resolved());
                let dst = match op.dst {
                    Some(dst) => dst.resolved(),
                    None => {
                        let dir = src.as_ref().map(|s| s.dir_prefix()).unwrap_or("");
                        let name = generator
                            .generate_filename(GENERATED_CHUNK_PREFIX, GENERATED_CHUNK_EXTENSION);
                        DocUri::new(format!("{dir}{name}"))
                    }
                };
                ChunkOperation {
                    kind: op.kind,
                    src,
                    dst: Some(dst),
                }
            })
            .collect();

        Ok(Self {
            navigation_support: false,
            root_chunk_override: None,
            maps_read: Vec::new(),
            operations,
            change_table,
            conflict_table,
            chunk_topics,
        })
    }

    pub fn maps_read(&self) -> &[PathBuf] {
        &self.maps_read
    }

    pub fn navigation_support(&self) -> bool {
        self.navigation_support
    }

    pub fn root_chunk_override(&self) -> Option<&str> {
        self.root_chunk_override.as_deref()
    }
}

impl ChunkPolicyEvaluator for PlanEvaluator {
    fn set_navigation_support(&mut self, enabled: bool) {
        self.navigation_support = enabled;
    }

    fn set_root_chunk_override(&mut self, value: Option<&str>) {
        self.root_chunk_override = value.map(ToOwned::to_owned);
    }

    fn read(&mut self, map_file: &Path) -> Result<(), ChunkError> {
        let meta = fs::metadata(map_file).map_err(|err| {
            ChunkError::InputMap(format!("failed to read {}: {err}", map_file.display()))
        })?;
        if !meta.is_file() {
            return Err(ChunkError::InputMap(format!(
                "{} is not a file",
                map_file.display()
            )));
        }
        tracing::debug!("read map {}", map_file.display());
        self.maps_read.push(map_file.to_path_buf());
        Ok(())
    }

    fn chunk_operations(&self) -> &[ChunkOperation] {
        &self.operations
    }

    fn change_table(&self) -> &ChangeTable {
        &self.change_table
    }

    fn conflict_table(&self) -> &ConflictTable {
        &self.conflict_table
    }

    fn chunk_topic_set(&self) -> &ChunkTopicSet {
        &self.chunk_topics
    }
}
