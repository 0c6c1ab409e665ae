use anyhow::{Context, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

/// Remove `path` if present. Returns whether a file was actually removed.
pub fn delete_quietly(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err).with_context(|| format!("failed to delete {}", path.display())),
    }
}

/// Move `from` onto `to`, creating parent directories. Falls back to
/// copy-and-remove when a plain rename is not possible.
pub fn move_file(from: &Path, to: &Path) -> Result<()> {
    if from == to {
        return Ok(());
    }
    if !from.is_file() {
        anyhow::bail!("source {} does not exist", from.display());
    }
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    match fs::rename(from, to) {
        Ok(_) => Ok(()),
        Err(rename_err) => {
            if matches!(
                rename_err.kind(),
                ErrorKind::CrossesDevices | ErrorKind::PermissionDenied
            ) {
                fs::copy(from, to).with_context(|| {
                    format!("failed to copy {} to {}", from.display(), to.display())
                })?;
                fs::remove_file(from)
                    .with_context(|| format!("failed to remove {}", from.display()))?;
                Ok(())
            } else {
                Err(rename_err).with_context(|| {
                    format!("failed to move {} to {}", from.display(), to.display())
                })
            }
        }
    }
}

/// Replace whatever sits at `to` with `from`.
pub fn replace_file(from: &Path, to: &Path) -> Result<()> {
    tracing::debug!("delete {}", to.display());
    delete_quietly(to)?;
    tracing::debug!("move {} to {}", from.display(), to.display());
    move_file(from, to)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn delete_quietly_reports_absence() {
        let tmp = tempdir().expect("tempdir");
        let file = tmp.path().join("t.dita");
        assert!(!delete_quietly(&file).expect("absent ok"));
        fs::write(&file, "x").expect("write");
        assert!(delete_quietly(&file).expect("delete"));
        assert!(!file.exists());
    }

    #[test]
    fn move_file_creates_target_dirs() {
        let tmp = tempdir().expect("tempdir");
        let from = tmp.path().join("a/t.dita");
        let to = tmp.path().join("b/c/t.dita");
        fs::create_dir_all(from.parent().expect("parent")).expect("mkdir");
        fs::write(&from, "topic").expect("write");

        move_file(&from, &to).expect("move");
        assert!(!from.exists());
        assert_eq!(fs::read_to_string(&to).expect("read"), "topic");
    }

    #[test]
    fn move_file_fails_for_missing_source() {
        let tmp = tempdir().expect("tempdir");
        let err = move_file(&tmp.path().join("nope.dita"), &tmp.path().join("t.dita"))
            .expect_err("missing source");
        assert!(format!("{err:#}").contains("does not exist"));
    }

    #[test]
    fn replace_file_overwrites_stale_target() {
        let tmp = tempdir().expect("tempdir");
        let from = tmp.path().join("new.dita");
        let to = tmp.path().join("old.dita");
        fs::write(&from, "fresh").expect("write from");
        fs::write(&to, "stale").expect("write to");

        replace_file(&from, &to).expect("replace");
        assert_eq!(fs::read_to_string(&to).expect("read"), "fresh");
        assert!(!from.exists());
    }
}
