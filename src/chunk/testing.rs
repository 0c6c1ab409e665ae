use crate::chunk::registry::{FileFormat, FileRecord, Registry};
use crate::chunk::uri::{DocUri, WorkDir};
use std::fs;
use tempfile::TempDir;

pub struct Fixture {
    pub tmp: TempDir,
    pub work_dir: WorkDir,
    pub registry: Registry,
}

impl Fixture {
    pub fn new() -> Self {
        let tmp = tempfile::tempdir().expect("tempdir");
        let work_dir = WorkDir::new(tmp.path());
        let registry = Registry::new(tmp.path().join(".job.json"));
        Self {
            tmp,
            work_dir,
            registry,
        }
    }

    pub fn write(&self, uri: &str, content: &str) {
        let path = self.work_dir.path_of(&DocUri::from(uri));
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("mkdir");
        }
        fs::write(path, content).expect("write fixture file");
    }

    pub fn read(&self, uri: &str) -> String {
        fs::read_to_string(self.work_dir.path_of(&DocUri::from(uri))).expect("read fixture file")
    }

    pub fn exists(&self, uri: &str) -> bool {
        self.work_dir.path_of(&DocUri::from(uri)).exists()
    }

    pub fn topic(&mut self, uri: &str, is_target: bool) {
        self.registry.insert(FileRecord {
            format: Some(FileFormat::Topic),
            is_target,
            ..FileRecord::new(DocUri::from(uri))
        });
    }

    pub fn map(&mut self, uri: &str, is_input: bool) {
        self.registry.insert(FileRecord {
            format: Some(FileFormat::Map),
            is_input,
            ..FileRecord::new(DocUri::from(uri))
        });
    }

    pub fn record(&self, uri: &str) -> Option<&FileRecord> {
        self.registry.get(&DocUri::from(uri))
    }
}

pub fn uri(raw: &str) -> DocUri {
    DocUri::from(raw)
}

pub fn table(entries: &[(&str, &str)]) -> std::collections::BTreeMap<DocUri, DocUri> {
    entries
        .iter()
        .map(|(key, value)| (DocUri::from(*key), DocUri::from(*value)))
        .collect()
}
