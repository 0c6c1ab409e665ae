use crate::chunk::uri::DocUri;
use crate::error::ChunkError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const REGISTRY_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FileFormat {
    Topic,
    Map,
    Other(String),
}

impl FileFormat {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Topic => "dita",
            Self::Map => "ditamap",
            Self::Other(other) => other,
        }
    }
}

impl From<String> for FileFormat {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "dita" => Self::Topic,
            "ditamap" => Self::Map,
            _ => Self::Other(raw),
        }
    }
}

impl From<FileFormat> for String {
    fn from(format: FileFormat) -> Self {
        format.as_str().to_string()
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub uri: DocUri,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<FileFormat>,
    #[serde(default)]
    pub is_input: bool,
    #[serde(default)]
    pub is_target: bool,
    #[serde(default)]
    pub is_resource_only: bool,
}

impl FileRecord {
    pub fn new(uri: DocUri) -> Self {
        Self {
            uri,
            format: None,
            is_input: false,
            is_target: false,
            is_resource_only: false,
        }
    }

    pub fn is_topic(&self) -> bool {
        self.format == Some(FileFormat::Topic)
    }

    pub fn is_map(&self) -> bool {
        self.format == Some(FileFormat::Map)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RegistryFile {
    #[serde(default = "default_schema_version")]
    schema_version: u32,
    #[serde(default)]
    files: Vec<FileRecord>,
}

fn default_schema_version() -> u32 {
    REGISTRY_SCHEMA_VERSION
}

/// Per-file metadata for the working document set, keyed by URI.
#[derive(Debug, Clone)]
pub struct Registry {
    path: PathBuf,
    records: BTreeMap<DocUri, FileRecord>,
}

impl Registry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            records: BTreeMap::new(),
        }
    }

    /// Load the registry; a missing backing file yields an empty registry.
    pub fn load(path: &Path) -> Result<Self, ChunkError> {
        let mut registry = Self::new(path);
        if !path.exists() {
            return Ok(registry);
        }

        let raw = fs::read_to_string(path).map_err(|err| {
            ChunkError::InvalidRegistry(format!("failed to read {}: {err}", path.display()))
        })?;
        let parsed: RegistryFile = serde_json::from_str(&raw).map_err(|err| {
            ChunkError::InvalidRegistry(format!("failed to parse {}: {err}", path.display()))
        })?;
        if parsed.schema_version > REGISTRY_SCHEMA_VERSION {
            return Err(ChunkError::InvalidRegistry(format!(
                "{} has schema_version {}, newest supported is {REGISTRY_SCHEMA_VERSION}",
                path.display(),
                parsed.schema_version
            )));
        }

        for record in parsed.files {
            registry.insert(record);
        }
        Ok(registry)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &FileRecord> {
        self.records.values()
    }

    pub fn filter<F>(&self, predicate: F) -> Vec<&FileRecord>
    where
        F: Fn(&FileRecord) -> bool,
    {
        self.records.values().filter(|r| predicate(r)).collect()
    }

    pub fn get(&self, uri: &DocUri) -> Option<&FileRecord> {
        self.records.get(uri)
    }

    pub fn insert(&mut self, record: FileRecord) {
        self.records.insert(record.uri.clone(), record);
    }

    pub fn get_or_create(&mut self, uri: &DocUri) -> &mut FileRecord {
        self.records
            .entry(uri.clone())
            .or_insert_with(|| FileRecord::new(uri.clone()))
    }

    pub fn remove(&mut self, uri: &DocUri) -> Option<FileRecord> {
        self.records.remove(uri)
    }

    /// Persist to the backing file through a sibling temp file and rename.
    pub fn write(&self) -> Result<()> {
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;

        let doc = RegistryFile {
            schema_version: REGISTRY_SCHEMA_VERSION,
            files: self.records.values().cloned().collect(),
        };
        let data = serde_json::to_string_pretty(&doc)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&parent)
            .with_context(|| format!("failed to create temp file in {}", parent.display()))?;
        tmp.write_all(format!("{data}\n").as_bytes())
            .with_context(|| format!("failed to write {}", tmp.path().display()))?;
        tmp.persist(&self.path)
            .with_context(|| format!("failed to write {}", self.path.display()))?;
        Ok(())
    }
}
