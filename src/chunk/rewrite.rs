use crate::chunk::failure::{FailureKind, FileFailure};
use crate::chunk::reconcile::ReconcileOutcome;
use crate::chunk::registry::Registry;
use crate::chunk::tables::{ChangeTable, ConflictTable, RelativePathFix};
use crate::chunk::uri::{DocUri, WorkDir};
use anyhow::{Context, Result};
use regex::{Captures, Regex};
use std::fs;
use std::path::Path;
use std::sync::LazyLock;
use tracing::debug;

/// Rewrites cross-document references inside a single file.
pub trait ReferenceRewriter {
    fn configure(
        &mut self,
        change_table: &ChangeTable,
        conflict_table: &ConflictTable,
        path_fix: &RelativePathFix,
    );

    /// Directory prefix the next file's relative references were authored
    /// against, if it was moved.
    fn set_fix_path(&mut self, prefix: Option<&str>);

    /// Rewrite `file` in place. Returns whether its contents changed.
    fn write(&mut self, file: &Path) -> Result<bool>;
}

/// Run `rewriter` over every registered topic and map.
pub fn rewrite_references(
    work_dir: &WorkDir,
    registry: &Registry,
    rewriter: &mut dyn ReferenceRewriter,
    change_table: &ChangeTable,
    conflict_table: &ConflictTable,
    path_fix: &RelativePathFix,
    outcome: &mut ReconcileOutcome,
) {
    rewriter.configure(change_table, conflict_table, path_fix);

    for record in registry.filter(|r| r.is_topic() || r.is_map()) {
        rewriter.set_fix_path(path_fix.get(&record.uri).map(String::as_str));
        let file = work_dir.path_of(&record.uri);
        if !file.is_file() {
            debug!("skip rewrite of missing {}", file.display());
            outcome.missing_files += 1;
            continue;
        }

        match rewriter.write(&file) {
            Ok(true) => outcome.rewritten_files += 1,
            Ok(false) => outcome.unchanged_files += 1,
            Err(err) => outcome.record_failure(FileFailure::new(
                FailureKind::Rewrite,
                record.uri.as_str(),
                &err,
            )),
        }
    }
}

/// Comments, CDATA sections, declarations and start tags. Only start tags are
/// rewritten; everything between matches is character data.
static MARKUP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?s)<!--.*?-->|<!\[CDATA\[.*?\]\]>|<[?!][^>]*>|<[A-Za-z_][\w.:-]*(?:\s+[^\s=/>]+\s*=\s*(?:"[^"]*"|'[^']*'))*\s*/?>"#,
    )
    .expect("markup pattern")
});

static REFERENCE_ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?P<lead>\s(?:href|conref)\s*=\s*)(?:"(?P<dq>[^"]*)"|'(?P<sq>[^']*)')"#)
        .expect("reference attribute pattern")
});

fn has_scheme(value: &str) -> bool {
    let Some(idx) = value.find(':') else {
        return false;
    };
    let scheme = &value[..idx];
    // single letters are drive names, not schemes
    scheme.len() > 1
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Textual `href` / `conref` rewriter for XML documents under a working root.
#[derive(Debug, Clone)]
pub struct HrefRewriter {
    work_dir: WorkDir,
    change_table: ChangeTable,
    conflict_table: ConflictTable,
    fix_path: Option<String>,
}

impl HrefRewriter {
    pub fn new(work_dir: WorkDir) -> Self {
        Self {
            work_dir,
            change_table: ChangeTable::new(),
            conflict_table: ConflictTable::new(),
            fix_path: None,
        }
    }

    fn redirect(&self, target: &DocUri) -> Option<DocUri> {
        let changed = self.change_table.get(target).cloned().or_else(|| {
            if !target.has_fragment() {
                return None;
            }
            self.change_table
                .get(&target.strip_fragment())
                .map(|next| match next.fragment() {
                    Some(_) => next.clone(),
                    None => next.with_fragment(target.fragment()),
                })
        });

        let base = changed.clone().unwrap_or_else(|| target.clone());
        let next = match self.conflict_table.get(&base.strip_fragment()) {
            Some(moved) => Some(moved.with_fragment(base.fragment())),
            None => changed,
        };
        next.filter(|next| next != target)
    }

    /// New attribute value for `raw` inside `current`, if it needs to change.
    fn rewrite_value(&self, current: &DocUri, raw: &str) -> Option<String> {
        if raw.trim().is_empty() || raw.starts_with('#') || has_scheme(raw) {
            return None;
        }

        let mut value = raw;
        if let Some(prefix) = self.fix_path.as_deref() {
            value = value.strip_prefix(prefix).unwrap_or(value);
        }

        let target = current.join(value);
        match self.redirect(&target) {
            Some(next) => Some(next.relative_to(current)),
            None if value != raw => Some(value.to_string()),
            None => None,
        }
    }

    fn rewrite_text(&self, current: &DocUri, text: &str) -> Option<String> {
        let mut changed = false;
        let out = MARKUP.replace_all(text, |markup: &Captures<'_>| {
            let tag = &markup[0];
            if tag.starts_with("<!") || tag.starts_with("<?") {
                return tag.to_string();
            }
            REFERENCE_ATTR
                .replace_all(tag, |caps: &Captures<'_>| {
                    let (raw, quote) = match caps.name("dq") {
                        Some(m) => (m.as_str(), '"'),
                        None => (caps.name("sq").map(|m| m.as_str()).unwrap_or(""), '\''),
                    };
                    match self.rewrite_value(current, raw) {
                        Some(next) => {
                            changed = true;
                            format!("{}{quote}{next}{quote}", &caps["lead"])
                        }
                        None => caps[0].to_string(),
                    }
                })
                .into_owned()
        });
        changed.then(|| out.into_owned())
    }
}

impl ReferenceRewriter for HrefRewriter {
    fn configure(
        &mut self,
        change_table: &ChangeTable,
        conflict_table: &ConflictTable,
        _path_fix: &RelativePathFix,
    ) {
        self.change_table = change_table
            .iter()
            .map(|(from, to)| (from.resolved(), to.resolved()))
            .collect();
        self.conflict_table = conflict_table
            .iter()
            .map(|(from, to)| (from.resolved(), to.resolved()))
            .collect();
    }

    fn set_fix_path(&mut self, prefix: Option<&str>) {
        self.fix_path = prefix.map(ToOwned::to_owned);
    }

    fn write(&mut self, file: &Path) -> Result<bool> {
        let current = self
            .work_dir
            .relativize(&file.display().to_string())
            .with_context(|| format!("{} is outside the working directory", file.display()))?;
        let text =
            fs::read_to_string(file).with_context(|| format!("failed to read {}", file.display()))?;

        let Some(next) = self.rewrite_text(&current, &text) else {
            return Ok(false);
        };
        debug!("rewrite references in {}", file.display());
        fs::write(file, next).with_context(|| format!("failed to write {}", file.display()))?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::testing::{Fixture, table, uri};

    fn rewriter(fx: &Fixture, change: &[(&str, &str)], conflict: &[(&str, &str)]) -> HrefRewriter {
        let mut rewriter = HrefRewriter::new(fx.work_dir.clone());
        rewriter.configure(&table(change), &table(conflict), &RelativePathFix::new());
        rewriter
    }

    #[test]
    fn scheme_detection_ignores_drive_letters() {
        assert!(has_scheme("https://example.com"));
        assert!(has_scheme("mailto:a@b.c"));
        assert!(!has_scheme("C:/docs/t.dita"));
        assert!(!has_scheme("a/t.dita#x"));
    }

    #[test]
    fn change_table_redirect_keeps_fragment() {
        let fx = Fixture::new();
        let rw = rewriter(&fx, &[("a/t1.dita", "chunk.dita#t1")], &[]);
        let current = uri("a/index.dita");
        assert_eq!(
            rw.rewrite_value(&current, "t1.dita"),
            Some("../chunk.dita#t1".to_string())
        );

        let rw = rewriter(&fx, &[("a/t1.dita", "b/t1.dita")], &[]);
        assert_eq!(
            rw.rewrite_value(&current, "t1.dita#t1/p1"),
            Some("../b/t1.dita#t1/p1".to_string())
        );
    }

    #[test]
    fn conflict_redirects_to_target() {
        let fx = Fixture::new();
        let rw = rewriter(&fx, &[("Told.xml", "Told.xml")], &[("Told.xml", "Tnew.xml")]);
        assert_eq!(
            rw.rewrite_value(&uri("map.ditamap"), "Told.xml#x"),
            Some("Tnew.xml#x".to_string())
        );
    }

    #[test]
    fn untouched_values_are_left_alone() {
        let fx = Fixture::new();
        let rw = rewriter(&fx, &[("t.dita", "t.dita")], &[]);
        let current = uri("map.ditamap");
        assert_eq!(rw.rewrite_value(&current, "t.dita"), None);
        assert_eq!(rw.rewrite_value(&current, "#local"), None);
        assert_eq!(rw.rewrite_value(&current, "http://x/t.dita"), None);
        assert_eq!(rw.rewrite_value(&current, ""), None);
    }

    #[test]
    fn fix_path_strips_authoring_prefix() {
        let fx = Fixture::new();
        let mut rw = rewriter(&fx, &[], &[]);
        rw.set_fix_path(Some("b/"));
        assert_eq!(
            rw.rewrite_value(&uri("b/topic1.xml"), "b/other.xml"),
            Some("other.xml".to_string())
        );
        assert_eq!(rw.rewrite_value(&uri("b/topic1.xml"), "other.xml"), None);
    }

    #[test]
    fn write_rewrites_both_quote_styles() {
        let fx = Fixture::new();
        fx.write(
            "map.ditamap",
            "<map><topicref href=\"Told.xml\"/><topicref href='keep.dita'/><p conref='Told.xml#t/p'/></map>",
        );
        let mut rw = rewriter(&fx, &[], &[("Told.xml", "sub/Tnew.xml")]);

        let changed = rw
            .write(&fx.work_dir.path_of(&uri("map.ditamap")))
            .expect("write");
        assert!(changed);
        assert_eq!(
            fx.read("map.ditamap"),
            "<map><topicref href=\"sub/Tnew.xml\"/><topicref href='keep.dita'/><p conref='sub/Tnew.xml#t/p'/></map>"
        );

        let again = rw
            .write(&fx.work_dir.path_of(&uri("map.ditamap")))
            .expect("second write");
        assert!(!again);
    }

    #[test]
    fn only_start_tag_attributes_are_rewritten() {
        let fx = Fixture::new();
        let rw = rewriter(&fx, &[], &[("Told.xml", "Tnew.xml")]);
        let text = concat!(
            "<topic id=\"t\"><!-- <xref href=\"Told.xml\"/> -->",
            "<codeblock><![CDATA[<xref href=\"Told.xml\"/>]]></codeblock>",
            "<p>set href=\"Told.xml\" on the link</p>",
            "<xref data-href=\"Told.xml\" href=\"Told.xml\"/></topic>",
        );

        let out = rw
            .rewrite_text(&uri("map.ditamap"), text)
            .expect("start tag rewritten");
        assert_eq!(
            out,
            concat!(
                "<topic id=\"t\"><!-- <xref href=\"Told.xml\"/> -->",
                "<codeblock><![CDATA[<xref href=\"Told.xml\"/>]]></codeblock>",
                "<p>set href=\"Told.xml\" on the link</p>",
                "<xref data-href=\"Told.xml\" href=\"Tnew.xml\"/></topic>",
            )
        );
        assert_eq!(
            rw.rewrite_text(&uri("map.ditamap"), "<!-- href=\"Told.xml\" -->"),
            None
        );
    }

    #[test]
    fn driver_isolates_failures_and_passes_fix_path() {
        struct Recording {
            seen: Vec<(String, Option<String>)>,
            fix: Option<String>,
        }
        impl ReferenceRewriter for Recording {
            fn configure(&mut self, _: &ChangeTable, _: &ConflictTable, _: &RelativePathFix) {}
            fn set_fix_path(&mut self, prefix: Option<&str>) {
                self.fix = prefix.map(ToOwned::to_owned);
            }
            fn write(&mut self, file: &Path) -> Result<bool> {
                let name = file
                    .file_name()
                    .and_then(|s| s.to_str())
                    .unwrap_or_default()
                    .to_string();
                self.seen.push((name.clone(), self.fix.clone()));
                if name == "broken.dita" {
                    anyhow::bail!("malformed document");
                }
                Ok(true)
            }
        }

        let mut fx = Fixture::new();
        fx.map("root.ditamap", true);
        fx.topic("broken.dita", true);
        fx.topic("b/topic1.xml", false);
        fx.topic("gone.dita", false);
        for name in ["root.ditamap", "broken.dita", "b/topic1.xml"] {
            fx.write(name, "<x/>");
        }

        let mut path_fix = RelativePathFix::new();
        path_fix.insert(uri("b/topic1.xml"), "b/".to_string());
        let mut recording = Recording {
            seen: Vec::new(),
            fix: None,
        };
        let mut outcome = ReconcileOutcome::default();
        rewrite_references(
            &fx.work_dir,
            &fx.registry,
            &mut recording,
            &ChangeTable::new(),
            &ConflictTable::new(),
            &path_fix,
            &mut outcome,
        );

        assert_eq!(
            recording.seen,
            vec![
                ("topic1.xml".to_string(), Some("b/".to_string())),
                ("broken.dita".to_string(), None),
                ("root.ditamap".to_string(), None),
            ]
        );
        assert_eq!(outcome.rewritten_files, 2);
        assert_eq!(outcome.missing_files, 1);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].kind, FailureKind::Rewrite);
        assert_eq!(outcome.failures[0].uri, "broken.dita");
    }
}
