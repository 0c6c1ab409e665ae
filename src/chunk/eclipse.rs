use crate::chunk::reconcile::ECLIPSE_HELP_TRANSTYPE;
use crate::chunk::registry::Registry;
use crate::chunk::uri::WorkDir;
use crate::error::ChunkError;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::debug;

/// A DITA `class` attribute value, e.g. `- map/map eclipsemap/plugin `.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DitaClass {
    tokens: Vec<String>,
}

pub const ECLIPSEMAP_PLUGIN: &str = "eclipsemap/plugin";

impl DitaClass {
    pub fn parse(value: &str) -> Self {
        Self {
            tokens: value
                .split_whitespace()
                .filter(|token| *token != "-" && *token != "+")
                .map(ToOwned::to_owned)
                .collect(),
        }
    }

    pub fn matches(&self, token: &str) -> bool {
        self.tokens.iter().any(|t| t == token)
    }
}

static ROOT_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^<([A-Za-z_][\w.:-]*)([^>]*)>").expect("root tag pattern"));

static CLASS_ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\bclass\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("class attribute pattern")
});

/// Skip the prolog (declarations, comments, doctype) up to the root element.
fn skip_prolog(mut text: &str) -> Option<&str> {
    loop {
        text = text.trim_start_matches('\u{feff}').trim_start();
        if let Some(rest) = text.strip_prefix("<?") {
            text = &rest[rest.find("?>")? + 2..];
        } else if let Some(rest) = text.strip_prefix("<!--") {
            text = &rest[rest.find("-->")? + 3..];
        } else if let Some(rest) = text.strip_prefix("<!DOCTYPE") {
            text = skip_doctype(rest)?;
        } else {
            return text.starts_with('<').then_some(text);
        }
    }
}

fn skip_doctype(text: &str) -> Option<&str> {
    let mut depth = 0usize;
    for (idx, ch) in text.char_indices() {
        match ch {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            '>' if depth == 0 => return Some(&text[idx + 1..]),
            _ => {}
        }
    }
    None
}

fn root_class(text: &str) -> Option<Option<DitaClass>> {
    let root = skip_prolog(text)?;
    let caps = ROOT_TAG.captures(root)?;
    let attrs = caps.get(2).map(|m| m.as_str()).unwrap_or("");
    Some(CLASS_ATTR.captures(attrs).map(|class| {
        let value = class
            .get(1)
            .or_else(|| class.get(2))
            .map(|m| m.as_str())
            .unwrap_or("");
        DitaClass::parse(value)
    }))
}

/// Whether the root element of `map_file` is an Eclipse plugin map.
pub fn is_eclipse_map(map_file: &Path) -> Result<bool, ChunkError> {
    let text = fs::read_to_string(map_file).map_err(|err| {
        ChunkError::InputMap(format!("failed to read {}: {err}", map_file.display()))
    })?;
    let class = root_class(&text).ok_or_else(|| {
        ChunkError::InputMap(format!("{} has no root element", map_file.display()))
    })?;
    Ok(class.is_some_and(|class| class.matches(ECLIPSEMAP_PLUGIN)))
}

/// Maps the chunk policy has to read: every registered map for an Eclipse
/// plugin map under `eclipsehelp`, otherwise only the input map.
pub fn select_input_maps(
    registry: &Registry,
    work_dir: &WorkDir,
    transtype: &str,
) -> Result<Vec<PathBuf>, ChunkError> {
    let input = registry
        .records()
        .find(|r| r.is_input)
        .ok_or_else(|| ChunkError::MissingInputMap(registry.path().display().to_string()))?;
    let input_path = work_dir.path_of(&input.uri);

    if transtype == ECLIPSE_HELP_TRANSTYPE && is_eclipse_map(&input_path)? {
        let maps = registry
            .filter(|r| r.is_map())
            .into_iter()
            .map(|r| work_dir.path_of(&r.uri))
            .collect::<Vec<_>>();
        debug!("eclipse plugin map; reading {} maps", maps.len());
        return Ok(maps);
    }

    Ok(vec![input_path])
}
