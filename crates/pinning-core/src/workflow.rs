//! In-memory workflow document.
//!
//! A [`Workflow`] keeps the original source text next to a span-carrying YAML
//! tree. Reads go through the tree; writes are applied as text edits at the
//! exact position of a scalar so everything else in the file (key order,
//! comments, quoting, indentation, long lines) survives byte-for-byte.

use crate::error::{PinError, Result};
use crate::io;
use marked_yaml::types::{MarkedMappingNode, MarkedScalarNode, Node};
use std::path::{Path, PathBuf};

pub const JOBS_KEY: &str = "jobs";
pub const STEPS_KEY: &str = "steps";
pub const USES_KEY: &str = "uses";

/// Replace one scalar on a given line and set its trailing comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScalarEdit {
    /// 1-based line of the scalar.
    pub line: usize,
    /// 1-based column where the scalar starts.
    pub column: usize,
    /// Current scalar value, without quotes.
    pub original: String,
    pub replacement: String,
    /// Comment text written after `#`.
    pub comment: String,
}

#[derive(Debug, Clone)]
pub struct Workflow {
    path: PathBuf,
    source: String,
    root: MarkedMappingNode,
    dirty: bool,
}

impl Workflow {
    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path).map_err(|source| PinError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(path, source)
    }

    /// Parse `source` as a workflow. The document must be a mapping with a
    /// `jobs` mapping at the top level.
    pub fn parse(path: impl Into<PathBuf>, source: String) -> Result<Self> {
        let path = path.into();
        let root = parse_root(&path, &source)?;
        match root.get_node(JOBS_KEY) {
            None => return Err(PinError::NoJobs(path)),
            Some(Node::Mapping(_)) => {}
            Some(_) => return Err(PinError::InvalidJobs(path)),
        }
        Ok(Self {
            path,
            source,
            root,
            dirty: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn jobs(&self) -> Result<&MarkedMappingNode> {
        match self.root.get_node(JOBS_KEY) {
            Some(Node::Mapping(jobs)) => Ok(jobs),
            Some(_) => Err(PinError::InvalidJobs(self.path.clone())),
            None => Err(PinError::NoJobs(self.path.clone())),
        }
    }

    /// Apply all edits or none of them.
    ///
    /// Edits are applied from the bottom of the file up so earlier positions
    /// stay valid. The edited text is re-parsed before it replaces the
    /// current document. Returns the edits that could not carry their
    /// comment because the line continues after the scalar.
    pub fn apply(&mut self, mut edits: Vec<ScalarEdit>) -> Result<Vec<ScalarEdit>> {
        if edits.is_empty() {
            return Ok(Vec::new());
        }
        edits.sort_by(|a, b| (b.line, b.column).cmp(&(a.line, a.column)));

        let mut updated = self.source.clone();
        let mut uncommented = Vec::new();
        for edit in edits {
            let unlocatable = || PinError::Unlocatable {
                path: self.path.clone(),
                line: edit.line,
                value: edit.original.clone(),
            };
            let (start, end) = line_bounds(&updated, edit.line).ok_or_else(unlocatable)?;
            let (line, commented) = edit_line(&updated[start..end], &edit).ok_or_else(unlocatable)?;
            updated.replace_range(start..end, &line);
            if !commented {
                uncommented.push(edit);
            }
        }

        self.root = parse_root(&self.path, &updated)?;
        self.source = updated;
        self.dirty = true;
        Ok(uncommented)
    }

    /// Write the current source back to disk.
    pub fn save(&self) -> Result<()> {
        io::atomic_write(&self.path, self.source.as_bytes())
    }
}

/// 1-based line and column where a scalar starts.
pub fn scalar_position(node: &MarkedScalarNode) -> Option<(usize, usize)> {
    node.span().start().map(|m| (m.line(), m.column()))
}

/// Parse the document into a positioned tree.
///
/// The positioned parser rejects anchors and aliases. When plain YAML
/// accepts the same text the document is reported as unsupported rather
/// than broken.
fn parse_root(path: &Path, source: &str) -> Result<MarkedMappingNode> {
    let node = marked_yaml::parse_yaml(0, source).map_err(|e| {
        let message = e.to_string();
        if serde_yaml::from_str::<serde_yaml::Value>(source).is_ok() {
            PinError::Unsupported {
                path: path.to_path_buf(),
                message,
            }
        } else {
            PinError::Parse {
                path: path.to_path_buf(),
                message,
            }
        }
    })?;
    match node {
        Node::Mapping(root) => Ok(root),
        _ => Err(PinError::NotAMapping(path.to_path_buf())),
    }
}

/// Byte range of a 1-based line, excluding its line terminator.
fn line_bounds(source: &str, line: usize) -> Option<(usize, usize)> {
    let mut start = 0;
    for (index, text) in source.split_inclusive('\n').enumerate() {
        if index + 1 == line {
            let content = text.strip_suffix('\n').unwrap_or(text);
            let content = content.strip_suffix('\r').unwrap_or(content);
            return Some((start, start + content.len()));
        }
        start += text.len();
    }
    None
}

/// Rewrite the scalar on one line. Returns the new line and whether the
/// comment could be attached.
///
/// The scalar is looked up from one character before its recorded column so
/// both plain and quoted forms are found; the quote style is kept.
fn edit_line(line: &str, edit: &ScalarEdit) -> Option<(String, bool)> {
    let from = line
        .char_indices()
        .nth(edit.column.saturating_sub(2))
        .map(|(i, _)| i)
        .unwrap_or(line.len());

    let (start, quote) = ["\"", "'", ""]
        .into_iter()
        .filter_map(|quote| {
            let needle = format!("{quote}{}{quote}", edit.original);
            line[from..].find(&needle).map(|pos| (from + pos, quote))
        })
        .min_by_key(|(pos, _)| *pos)?;

    let end = start + edit.original.len() + 2 * quote.len();
    let rest = &line[end..];
    let comment = format!(" #{}", edit.comment);

    let (tail, commented) = if rest.trim().is_empty() || rest.trim_start().starts_with('#') {
        (comment, true)
    } else if !rest.contains('#') {
        (format!("{rest}{comment}"), true)
    } else {
        (rest.to_string(), false)
    };

    Some((
        format!("{}{quote}{}{quote}{tail}", &line[..start], edit.replacement),
        commented,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHA: &str = "0123456789abcdef0123456789abcdef01234567";

    fn workflow(source: &str) -> Workflow {
        Workflow::parse("ci.yml", source.to_string()).unwrap()
    }

    fn uses_edit(wf: &Workflow, job: &str, step: usize, replacement: &str, comment: &str) -> ScalarEdit {
        let jobs = wf.jobs().unwrap();
        let uses = jobs
            .get_mapping(job)
            .and_then(|j| j.get_sequence(STEPS_KEY))
            .and_then(|s| s.get(step))
            .and_then(|s| s.as_mapping())
            .and_then(|s| s.get_scalar(USES_KEY))
            .unwrap();
        let (line, column) = scalar_position(uses).unwrap();
        ScalarEdit {
            line,
            column,
            original: uses.as_str().to_string(),
            replacement: replacement.to_string(),
            comment: comment.to_string(),
        }
    }

    #[test]
    fn missing_jobs_is_rejected() {
        let err = Workflow::parse("ci.yml", "name: CI\non: push\n".to_string()).unwrap_err();
        assert!(matches!(err, PinError::NoJobs(_)));
        assert_eq!(err.to_string(), "No jobs found at ci.yml");
    }

    #[test]
    fn non_mapping_jobs_is_rejected() {
        let err = Workflow::parse("ci.yml", "jobs:\n  - build\n".to_string()).unwrap_err();
        assert!(matches!(err, PinError::InvalidJobs(_)));
    }

    #[test]
    fn broken_yaml_is_a_parse_error() {
        let err = Workflow::parse("ci.yml", "jobs: [unclosed\n".to_string()).unwrap_err();
        assert!(matches!(err, PinError::Parse { .. }));
    }

    #[test]
    fn sequence_document_is_not_a_mapping() {
        let err = Workflow::parse("ci.yml", "- a\n- b\n".to_string()).unwrap_err();
        assert!(matches!(err, PinError::NotAMapping(_)));
        assert_eq!(err.to_string(), "ci.yml is not a YAML mapping");
    }

    #[test]
    fn anchors_are_unsupported_not_broken() {
        let source = "jobs:\n  a:\n    steps:\n      - &s\n        uses: x/y@v1\n  b:\n    steps:\n      - *s\n";
        let err = Workflow::parse("ci.yml", source.to_string()).unwrap_err();
        assert!(matches!(err, PinError::Unsupported { .. }), "{err:?}");
        assert!(err.to_string().starts_with("cannot pin ci.yml in place"));
    }

    #[test]
    fn load_error_names_the_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("gone.yml");
        let err = Workflow::load(&path).unwrap_err();
        assert!(matches!(err, PinError::ReadFile { .. }));
        assert!(err.to_string().contains("gone.yml"), "{err}");
    }

    #[test]
    fn apply_rewrites_plain_scalar_and_adds_comment() {
        let source = "jobs:\n  build:\n    steps:\n      - uses: owner/tool@v1\n        with:\n          x: 1\n";
        let mut wf = workflow(source);
        let edit = uses_edit(&wf, "build", 0, &format!("owner/tool@{SHA}"), "actions-pinning<v1>");
        let uncommented = wf.apply(vec![edit]).unwrap();

        assert!(uncommented.is_empty());
        assert!(wf.is_dirty());
        assert_eq!(
            wf.source(),
            format!("jobs:\n  build:\n    steps:\n      - uses: owner/tool@{SHA} #actions-pinning<v1>\n        with:\n          x: 1\n")
        );
    }

    #[test]
    fn apply_keeps_quotes_comments_and_crlf() {
        let source = "# top comment\r\njobs:\r\n  build:\r\n    steps:\r\n      - name: Checkout   # keep me\r\n        uses: \"owner/tool@v1\" # old note\r\n";
        let mut wf = workflow(source);
        let edit = uses_edit(&wf, "build", 0, &format!("owner/tool@{SHA}"), "actions-pinning<v1>");
        wf.apply(vec![edit]).unwrap();

        assert_eq!(
            wf.source(),
            format!("# top comment\r\njobs:\r\n  build:\r\n    steps:\r\n      - name: Checkout   # keep me\r\n        uses: \"owner/tool@{SHA}\" #actions-pinning<v1>\r\n")
        );
    }

    #[test]
    fn apply_handles_two_scalars_on_separate_lines() {
        let source = "jobs:\n  a:\n    steps:\n      - uses: x/y@v1\n      - uses: 'x/z@v2'\n";
        let mut wf = workflow(source);
        let first = uses_edit(&wf, "a", 0, &format!("x/y@{SHA}"), "actions-pinning<v1>");
        let second = uses_edit(&wf, "a", 1, &format!("x/z@{SHA}"), "actions-pinning<v2>");
        wf.apply(vec![first, second]).unwrap();

        assert_eq!(
            wf.source(),
            format!("jobs:\n  a:\n    steps:\n      - uses: x/y@{SHA} #actions-pinning<v1>\n      - uses: 'x/z@{SHA}' #actions-pinning<v2>\n")
        );
    }

    #[test]
    fn flow_mapping_gets_comment_at_line_end() {
        let source = "jobs:\n  a:\n    steps:\n      - { uses: x/y@v1, name: go }\n";
        let mut wf = workflow(source);
        let edit = uses_edit(&wf, "a", 0, &format!("x/y@{SHA}"), "actions-pinning<v1>");
        wf.apply(vec![edit]).unwrap();

        assert_eq!(
            wf.source(),
            format!("jobs:\n  a:\n    steps:\n      - {{ uses: x/y@{SHA}, name: go }} #actions-pinning<v1>\n")
        );
    }

    #[test]
    fn unlocatable_edit_leaves_document_untouched() {
        let source = "jobs:\n  a:\n    steps:\n      - uses: x/y@v1\n";
        let mut wf = workflow(source);
        let mut edit = uses_edit(&wf, "a", 0, "x/y@abc", "actions-pinning<v1>");
        edit.original = "x/other@v9".to_string();

        let err = wf.apply(vec![edit]).unwrap_err();
        assert!(matches!(err, PinError::Unlocatable { line: 4, .. }));
        assert_eq!(wf.source(), source);
        assert!(!wf.is_dirty());
    }

    #[test]
    fn line_bounds_excludes_terminators() {
        let src = "a\r\nbb\nccc";
        assert_eq!(line_bounds(src, 1), Some((0, 1)));
        assert_eq!(line_bounds(src, 2), Some((3, 5)));
        assert_eq!(line_bounds(src, 3), Some((6, 9)));
        assert_eq!(line_bounds(src, 4), None);
    }
}
