use thiserror::Error;

/// Setup failures. These abort a run; per-file problems are
/// [`crate::chunk::failure::FileFailure`] instead.
#[derive(Debug, Error)]
pub enum ChunkError {
    #[error("no input map registered in {0}")]
    MissingInputMap(String),
    #[error("input map invalid or unreadable: {0}")]
    InputMap(String),
    #[error("chunk plan invalid or unreadable: {0}")]
    InvalidPlan(String),
    #[error("file registry invalid or unreadable: {0}")]
    InvalidRegistry(String),
    #[error("config file invalid or unreadable: {0}")]
    InvalidConfig(String),
    #[error("working directory locked by another run: {0}")]
    Locked(String),
}
