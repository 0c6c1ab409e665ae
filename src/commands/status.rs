use anyhow::Result;

use crate::chunk::config::load_config;
use crate::chunk::paths::resolve_paths;
use crate::chunk::registry::{FileFormat, Registry};
use crate::commands::CommandReport;
use std::path::Path;

include!(concat!(env!("OUT_DIR"), "/chunk_env_allowlist.rs"));

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrySummary {
    pub topics: usize,
    pub maps: usize,
    pub other: usize,
    pub targets: usize,
    pub resource_only: usize,
    pub inputs: Vec<String>,
}

pub fn summarize(registry: &Registry) -> RegistrySummary {
    let mut summary = RegistrySummary::default();
    for record in registry.records() {
        match record.format {
            Some(FileFormat::Topic) => summary.topics += 1,
            Some(FileFormat::Map) => summary.maps += 1,
            _ => summary.other += 1,
        }
        if record.is_target {
            summary.targets += 1;
        }
        if record.is_resource_only {
            summary.resource_only += 1;
        }
        if record.is_input {
            summary.inputs.push(record.uri.to_string());
        }
    }
    summary
}

pub fn run(temp_dir: Option<&Path>) -> Result<CommandReport> {
    let mut report = CommandReport::new("status");
    let cfg = load_config()?;
    let paths = resolve_paths(temp_dir, &cfg.registry.file_name)?;

    report.detail(format!("build={}", env!("BUILD_UUID")));
    report.detail(format!("work_dir={}", paths.work_dir.display()));
    report.detail(format!(
        "transtype={} id_generation_scheme={}",
        cfg.reconcile.transtype,
        cfg.reconcile.id_scheme()
    ));
    report.detail(format!(
        "recognised_env={}",
        GENERATED_CHUNK_ENV_ALLOWLIST.join(",")
    ));

    if !paths.registry_file.exists() {
        report.issue(format!(
            "registry not found at {}",
            paths.registry_file.display()
        ));
        return Ok(report);
    }

    let registry = Registry::load(&paths.registry_file)?;
    let summary = summarize(&registry);
    report.detail(format!("registry={}", paths.registry_file.display()));
    report.detail(format!(
        "records={} topics={} maps={} other={}",
        registry.len(),
        summary.topics,
        summary.maps,
        summary.other
    ));
    report.detail(format!(
        "targets={} resource_only={}",
        summary.targets, summary.resource_only
    ));
    if registry.is_empty() {
        report.detail("registry has no records");
    }
    if summary.inputs.is_empty() {
        report.issue("no input map registered");
    } else {
        report.detail(format!("inputs={}", summary.inputs.join(",")));
    }
    Ok(report)
}
