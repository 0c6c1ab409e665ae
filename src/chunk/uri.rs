use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// A document URI relative to the working root, `/`-separated, with an
/// optional `#fragment`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct DocUri(String);

impl From<String> for DocUri {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

impl From<&str> for DocUri {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<DocUri> for String {
    fn from(uri: DocUri) -> Self {
        uri.0
    }
}

impl fmt::Display for DocUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl DocUri {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into().replace('\\', "/"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn path(&self) -> &str {
        match self.0.split_once('#') {
            Some((path, _)) => path,
            None => &self.0,
        }
    }

    pub fn fragment(&self) -> Option<&str> {
        self.0.split_once('#').map(|(_, fragment)| fragment)
    }

    pub fn has_fragment(&self) -> bool {
        self.0.contains('#')
    }

    pub fn strip_fragment(&self) -> DocUri {
        Self(self.path().to_string())
    }

    pub fn with_fragment(&self, fragment: Option<&str>) -> DocUri {
        match fragment {
            Some(fragment) => Self(format!("{}#{fragment}", self.path())),
            None => self.strip_fragment(),
        }
    }

    /// Lexically normalised form: `.` segments and empty segments dropped,
    /// `..` folded into its parent. The fragment is kept as-is.
    pub fn resolved(&self) -> DocUri {
        let path = normalize_segments(self.path().split('/')).join("/");
        Self(path).with_fragment(self.fragment())
    }

    /// Extension of the last path segment, without the dot.
    pub fn extension(&self) -> Option<&str> {
        let name = self.file_name();
        match name.rfind('.') {
            Some(0) | None => None,
            Some(idx) => Some(&name[idx + 1..]),
        }
    }

    pub fn file_name(&self) -> &str {
        let path = self.path();
        match path.rfind('/') {
            Some(idx) => &path[idx + 1..],
            None => path,
        }
    }

    /// Directory part of the path including the trailing `/`; empty at the root.
    pub fn dir_prefix(&self) -> &str {
        let path = self.path();
        match path.rfind('/') {
            Some(idx) => &path[..=idx],
            None => "",
        }
    }

    /// Resolve `href` against the directory of this URI.
    pub fn join(&self, href: &str) -> DocUri {
        let joined = if href.starts_with('#') {
            format!("{}{href}", self.path())
        } else {
            format!("{}{href}", self.dir_prefix())
        };
        DocUri::new(joined).resolved()
    }

    /// Render this URI relative to the directory holding `base`.
    pub fn relative_to(&self, base: &DocUri) -> String {
        let target = self.resolved();
        let base = base.resolved();
        let base_dir = base
            .dir_prefix()
            .split('/')
            .filter(|segment| !segment.is_empty())
            .collect::<Vec<_>>();
        let target_segments = target.path().split('/').collect::<Vec<_>>();

        let common = base_dir
            .iter()
            .zip(target_segments.iter())
            .take_while(|(a, b)| a == b)
            .count();
        let common = common.min(target_segments.len().saturating_sub(1));

        let mut parts = Vec::new();
        for _ in common..base_dir.len() {
            parts.push("..");
        }
        parts.extend(target_segments[common..].iter().copied());

        let mut out = parts.join("/");
        if let Some(fragment) = target.fragment() {
            out.push('#');
            out.push_str(fragment);
        }
        out
    }
}

fn normalize_segments<'a>(segments: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
    let mut out: Vec<&str> = Vec::new();
    for segment in segments {
        match segment {
            "" | "." => {}
            ".." => match out.last() {
                Some(last) if *last != ".." => {
                    out.pop();
                }
                _ => out.push(".."),
            },
            other => out.push(other),
        }
    }
    out
}

/// The temporary working root every registry URI is relative to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkDir {
    root: PathBuf,
}

impl WorkDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// On-disk location of `uri`; the fragment is ignored.
    pub fn path_of(&self, uri: &DocUri) -> PathBuf {
        let resolved = uri.resolved();
        let mut out = self.root.clone();
        for segment in resolved.path().split('/').filter(|s| !s.is_empty()) {
            out.push(segment);
        }
        out
    }

    /// Turn a raw reference (relative URI, absolute path or `file:` URI) into a
    /// URI relative to the root. `None` when an absolute location lies outside it.
    pub fn relativize(&self, raw: &str) -> Option<DocUri> {
        let (location, fragment) = match raw.split_once('#') {
            Some((location, fragment)) => (location, Some(fragment)),
            None => (raw, None),
        };
        let location = location
            .strip_prefix("file://")
            .or_else(|| location.strip_prefix("file:"))
            .unwrap_or(location);

        let path = Path::new(location);
        let relative = if path.is_absolute() {
            let stripped = path.strip_prefix(&self.root).ok()?;
            path_to_uri(stripped)
        } else {
            location.replace('\\', "/")
        };

        let uri = DocUri::new(relative).resolved().with_fragment(fragment);
        if uri.path().is_empty() || uri.path().starts_with("..") {
            return None;
        }
        Some(uri)
    }
}

fn path_to_uri(path: &Path) -> String {
    path.components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            Component::ParentDir => Some("..".to_string()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fragment_accessors_split_on_hash() {
        let uri = DocUri::from("a/topic.dita#intro");
        assert_eq!(uri.path(), "a/topic.dita");
        assert_eq!(uri.fragment(), Some("intro"));
        assert_eq!(uri.strip_fragment(), DocUri::from("a/topic.dita"));
        assert!(!DocUri::from("a/topic.dita").has_fragment());
    }

    #[test]
    fn resolved_folds_dot_segments() {
        assert_eq!(
            DocUri::from("a/./b/../topic.dita#x").resolved(),
            DocUri::from("a/topic.dita#x")
        );
        assert_eq!(DocUri::from("a\\b.dita").as_str(), "a/b.dita");
    }

    #[test]
    fn extension_and_dir_prefix() {
        let uri = DocUri::from("maps/root.ditamap");
        assert_eq!(uri.extension(), Some("ditamap"));
        assert_eq!(uri.dir_prefix(), "maps/");
        assert_eq!(DocUri::from("README").extension(), None);
        assert_eq!(DocUri::from("topic.dita").dir_prefix(), "");
    }

    #[test]
    fn join_resolves_against_directory() {
        let base = DocUri::from("a/b/topic.dita");
        assert_eq!(base.join("../c.dita#t1"), DocUri::from("a/c.dita#t1"));
        assert_eq!(base.join("#frag"), DocUri::from("a/b/topic.dita#frag"));
    }

    #[test]
    fn relative_to_walks_up_and_down() {
        let from = DocUri::from("a/b/topic.dita");
        assert_eq!(DocUri::from("a/c/t.dita").relative_to(&from), "../c/t.dita");
        assert_eq!(DocUri::from("a/b/t.dita#x").relative_to(&from), "t.dita#x");
        assert_eq!(DocUri::from("t.dita").relative_to(&from), "../../t.dita");
        assert_eq!(
            DocUri::from("a/b/c/t.dita").relative_to(&DocUri::from("root.ditamap")),
            "a/b/c/t.dita"
        );
    }

    #[test]
    fn relativize_accepts_absolute_and_file_uris() {
        let work = WorkDir::new("/tmp/work");
        assert_eq!(
            work.relativize("/tmp/work/a/t.dita#x"),
            Some(DocUri::from("a/t.dita#x"))
        );
        assert_eq!(
            work.relativize("file:/tmp/work/t.dita"),
            Some(DocUri::from("t.dita"))
        );
        assert_eq!(work.relativize("./b/../t.dita"), Some(DocUri::from("t.dita")));
        assert_eq!(work.relativize("/elsewhere/t.dita"), None);
        assert_eq!(work.relativize("../t.dita"), None);
    }

    #[test]
    fn path_of_ignores_fragment() {
        let work = WorkDir::new("/tmp/work");
        assert_eq!(
            work.path_of(&DocUri::from("a/t.dita#x")),
            PathBuf::from("/tmp/work/a/t.dita")
        );
    }
}
