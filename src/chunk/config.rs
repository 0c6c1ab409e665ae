use crate::chunk::naming::IdScheme;
use crate::error::ChunkError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;

pub const DEFAULT_REGISTRY_FILE: &str = ".job.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileSection {
    pub transtype: String,
    #[serde(default)]
    pub root_chunk_override: Option<String>,
    #[serde(default = "default_id_generation_scheme")]
    pub id_generation_scheme: String,
}

fn default_id_generation_scheme() -> String {
    IdScheme::Random.as_str().to_string()
}

impl Default for ReconcileSection {
    fn default() -> Self {
        Self {
            transtype: "xhtml".to_string(),
            root_chunk_override: None,
            id_generation_scheme: default_id_generation_scheme(),
        }
    }
}

impl ReconcileSection {
    pub fn id_scheme(&self) -> IdScheme {
        IdScheme::parse(&self.id_generation_scheme)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrySection {
    pub file_name: String,
}

impl Default for RegistrySection {
    fn default() -> Self {
        Self {
            file_name: DEFAULT_REGISTRY_FILE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChunkConfig {
    pub reconcile: ReconcileSection,
    pub registry: RegistrySection,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialChunkConfig {
    reconcile: Option<ReconcileSection>,
    registry: Option<RegistrySection>,
}

fn env_or_string(var: &str, fallback: &str) -> String {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => fallback.to_string(),
    }
}

fn env_or_optional(var: &str, fallback: Option<String>) -> Option<String> {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        Ok(_) => None,
        Err(_) => fallback,
    }
}

fn invalid(message: impl Into<String>) -> anyhow::Error {
    ChunkError::InvalidConfig(message.into()).into()
}

pub fn validate(cfg: &ChunkConfig) -> Result<()> {
    if cfg.reconcile.transtype.trim().is_empty() {
        return Err(invalid("transtype cannot be empty"));
    }
    let scheme = cfg.reconcile.id_generation_scheme.trim();
    if scheme != IdScheme::Random.as_str() && scheme != IdScheme::Counter.as_str() {
        return Err(invalid(format!(
            "id generation scheme `{scheme}`: use `random` or `counter`"
        )));
    }
    let file_name = cfg.registry.file_name.trim();
    if file_name.is_empty() || file_name.contains(['/', '\\']) || file_name == ".." {
        return Err(invalid(format!(
            "registry file name `{file_name}` must be a plain file name"
        )));
    }
    Ok(())
}

fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(custom) = env::var("CHUNK_CONFIG_PATH") {
        let trimmed = custom.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }

    let config = dirs::config_dir()?;
    Some(config.join("chunk-reconcile").join("chunk.toml"))
}

fn merge_file_config(base: &mut ChunkConfig) -> Result<()> {
    let Some(path) = resolve_config_path() else {
        return Ok(());
    };
    if !path.exists() {
        return Ok(());
    }

    let raw = fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let parsed: PartialChunkConfig = toml::from_str(&raw)
        .map_err(|err| invalid(format!("failed to parse {}: {err}", path.display())))?;
    if let Some(reconcile) = parsed.reconcile {
        base.reconcile = reconcile;
    }
    if let Some(registry) = parsed.registry {
        base.registry = registry;
    }
    Ok(())
}

pub fn load_config() -> Result<ChunkConfig> {
    let mut cfg = ChunkConfig::default();
    merge_file_config(&mut cfg)?;

    cfg.reconcile.transtype = env_or_string("CHUNK_TRANSTYPE", &cfg.reconcile.transtype);
    cfg.reconcile.root_chunk_override = env_or_optional(
        "CHUNK_ROOT_CHUNK_OVERRIDE",
        cfg.reconcile.root_chunk_override.take(),
    );
    cfg.reconcile.id_generation_scheme = env_or_string(
        "CHUNK_ID_GENERATION_SCHEME",
        &cfg.reconcile.id_generation_scheme,
    );
    cfg.registry.file_name = env_or_string("CHUNK_REGISTRY_FILE", &cfg.registry.file_name);

    validate(&cfg)?;
    Ok(cfg)
}
