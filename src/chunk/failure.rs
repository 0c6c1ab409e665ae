use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FailureKind {
    Delete,
    Move,
    Rewrite,
    Persist,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Delete => "DELETE_FAILED",
            Self::Move => "MOVE_FAILED",
            Self::Rewrite => "REWRITE_FAILED",
            Self::Persist => "PERSIST_FAILED",
        }
    }

    fn stage(self) -> &'static str {
        match self {
            Self::Delete => "prune-obsolete",
            Self::Move => "settle-conflict",
            Self::Rewrite => "rewrite-refs",
            Self::Persist => "persist-registry",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A per-file problem that was recovered from locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileFailure {
    pub kind: FailureKind,
    pub uri: String,
    pub message: String,
}

impl FileFailure {
    pub fn new(kind: FailureKind, uri: impl Into<String>, err: &anyhow::Error) -> Self {
        Self {
            kind,
            uri: uri.into(),
            message: format!("{err:#}"),
        }
    }
}

impl fmt::Display for FileFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.kind, self.uri, self.message)
    }
}

fn sanitize_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut prev_sep = false;
    for ch in value.chars() {
        if ch.is_ascii_whitespace() {
            if !out.is_empty() && !prev_sep {
                out.push('_');
                prev_sep = true;
            }
        } else if ch.is_ascii_graphic() {
            out.push(ch);
            prev_sep = false;
        }
    }
    let trimmed = out.trim_matches('_');
    if trimmed.is_empty() {
        "na".to_string()
    } else {
        trimmed.to_string()
    }
}

fn render(failure: &FileFailure) -> String {
    format!(
        "CHUNK_FAIL code={} stage={} file={} err={}",
        failure.kind.as_str(),
        failure.kind.stage(),
        sanitize_value(&failure.uri),
        sanitize_value(&failure.message),
    )
}

/// Log `failure` at error severity as a single grep-able line.
pub fn emit(failure: &FileFailure) {
    tracing::error!(target: "chunk_reconcile::failure", "{}", render(failure));
}
