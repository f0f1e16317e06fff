//! Template loading with path containment.
//!
//! Templates are immutable documents authored outside this system. A
//! requested path is only honored when it stays strictly inside one of a
//! fixed set of allowed roots: absolute paths and `..` segments are rejected
//! up front, and the canonicalized result is re-checked against the
//! canonicalized root before reading (symlinks cannot smuggle a read
//! outside a root).
//!
//! The on-disk dialect is JSON plus `//` and `/* */` comments and trailing
//! commas. Both extensions are stripped (string-literal aware) before
//! handing the text to `serde_json`.

use std::path::{Component, Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::TemplateError;

/// The fixed set of directories templates may be loaded from.
#[derive(Clone, Debug)]
pub struct TemplateRoots {
    roots: Vec<PathBuf>,
}

impl TemplateRoots {
    /// Create a root set. Order matters: the first root containing the
    /// requested file wins.
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self { roots }
    }

    /// Create a root set with a single root.
    pub fn single(root: impl Into<PathBuf>) -> Self {
        Self {
            roots: vec![root.into()],
        }
    }

    /// Load and parse the template at `path` (relative to an allowed root).
    pub fn load(&self, path: &str) -> Result<Value, TemplateError> {
        let rel = Path::new(path);
        if rel.is_absolute() {
            return Err(TemplateError::PathNotAllowed(path.to_string()));
        }
        // Only plain segments (and a harmless leading `./`) are accepted.
        if rel
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(TemplateError::PathNotAllowed(path.to_string()));
        }

        for root in &self.roots {
            let candidate = root.join(rel);
            if !candidate.is_file() {
                continue;
            }
            // Re-validate after resolution: the canonical path must stay a
            // descendant of the canonical root.
            let canonical_root = root.canonicalize().map_err(|source| TemplateError::Io {
                path: path.to_string(),
                source,
            })?;
            let canonical = candidate.canonicalize().map_err(|source| TemplateError::Io {
                path: path.to_string(),
                source,
            })?;
            if !canonical.starts_with(&canonical_root) {
                return Err(TemplateError::PathNotAllowed(path.to_string()));
            }

            debug!(path, root = %root.display(), "loading template");
            let raw =
                std::fs::read_to_string(&canonical).map_err(|source| TemplateError::Io {
                    path: path.to_string(),
                    source,
                })?;
            let cleaned = strip_jsonc(&raw);
            return serde_json::from_str(&cleaned).map_err(|e| TemplateError::Invalid {
                path: path.to_string(),
                message: e.to_string(),
            });
        }

        Err(TemplateError::NotFound(path.to_string()))
    }
}

/// Strip comments and trailing commas from a JSON-with-comments document.
#[must_use]
pub fn strip_jsonc(input: &str) -> String {
    strip_trailing_commas(&strip_comments(input))
}

/// Remove `//` line comments and `/* */` block comments, leaving string
/// literals untouched.
fn strip_comments(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    let mut in_string = false;
    let mut escaped = false;

    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            '/' => match chars.peek() {
                Some('/') => {
                    // Consume to end of line; keep the newline itself so
                    // parse error line numbers stay meaningful.
                    while let Some(&next) = chars.peek() {
                        if next == '\n' {
                            break;
                        }
                        let _ = chars.next();
                    }
                }
                Some('*') => {
                    let _ = chars.next();
                    let mut prev = '\0';
                    for next in chars.by_ref() {
                        if prev == '*' && next == '/' {
                            break;
                        }
                        prev = next;
                    }
                }
                _ => out.push(c),
            },
            _ => out.push(c),
        }
    }
    out
}

/// Remove commas that directly precede a closing `}` or `]`.
fn strip_trailing_commas(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let mut in_string = false;
    let mut escaped = false;

    for (i, &c) in chars.iter().enumerate() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            ',' => {
                let next_significant = chars[i + 1..].iter().find(|ch| !ch.is_whitespace());
                if !matches!(next_significant, Some('}') | Some(']')) {
                    out.push(c);
                }
            }
            _ => out.push(c),
        }
    }
    out
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn write_template(dir: &Path, name: &str, body: &str) {
        std::fs::write(dir.join(name), body).unwrap();
    }

    // ── strip_jsonc ─────────────────────────────────────────────────

    #[test]
    fn strips_line_comments() {
        let cleaned = strip_jsonc("{\n  // the model\n  \"a\": 1\n}");
        let v: Value = serde_json::from_str(&cleaned).unwrap();
        assert_eq!(v, json!({"a": 1}));
    }

    #[test]
    fn strips_block_comments() {
        let cleaned = strip_jsonc("{ /* multi\nline */ \"a\": 1 }");
        let v: Value = serde_json::from_str(&cleaned).unwrap();
        assert_eq!(v, json!({"a": 1}));
    }

    #[test]
    fn strips_trailing_commas_in_objects_and_arrays() {
        let cleaned = strip_jsonc("{\"a\": [1, 2, ], \"b\": {\"c\": 3,},}");
        let v: Value = serde_json::from_str(&cleaned).unwrap();
        assert_eq!(v, json!({"a": [1, 2], "b": {"c": 3}}));
    }

    #[test]
    fn leaves_string_contents_alone() {
        let cleaned = strip_jsonc(r#"{"url": "https://x.test/a,b", "note": "a // b, ]"}"#);
        let v: Value = serde_json::from_str(&cleaned).unwrap();
        assert_eq!(v["url"], "https://x.test/a,b");
        assert_eq!(v["note"], "a // b, ]");
    }

    #[test]
    fn escaped_quote_does_not_end_string() {
        let cleaned = strip_jsonc(r#"{"a": "say \"hi\", // not a comment"}"#);
        let v: Value = serde_json::from_str(&cleaned).unwrap();
        assert_eq!(v["a"], "say \"hi\", // not a comment");
    }

    // ── path containment ────────────────────────────────────────────

    #[test]
    fn loads_from_first_root_containing_file() {
        let dir_a = tempfile::tempdir().unwrap();
        let dir_b = tempfile::tempdir().unwrap();
        write_template(dir_b.path(), "flow.json", r#"{"orchestrator_class": "chat"}"#);

        let roots = TemplateRoots::new(vec![dir_a.path().into(), dir_b.path().into()]);
        let doc = roots.load("flow.json").unwrap();
        assert_eq!(doc["orchestrator_class"], "chat");
    }

    #[test]
    fn rejects_absolute_path() {
        let dir = tempfile::tempdir().unwrap();
        let roots = TemplateRoots::single(dir.path());
        assert_matches!(
            roots.load("/etc/passwd"),
            Err(TemplateError::PathNotAllowed(_))
        );
    }

    #[test]
    fn rejects_parent_segments() {
        let dir = tempfile::tempdir().unwrap();
        let roots = TemplateRoots::single(dir.path());
        assert_matches!(
            roots.load("../outside.json"),
            Err(TemplateError::PathNotAllowed(_))
        );
        assert_matches!(
            roots.load("nested/../../outside.json"),
            Err(TemplateError::PathNotAllowed(_))
        );
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let roots = TemplateRoots::single(dir.path());
        assert_matches!(roots.load("absent.json"), Err(TemplateError::NotFound(_)));
    }

    #[test]
    fn unparsable_file_is_invalid_not_a_crash() {
        let dir = tempfile::tempdir().unwrap();
        write_template(dir.path(), "broken.json", "{ not json at all");
        let roots = TemplateRoots::single(dir.path());
        assert_matches!(roots.load("broken.json"), Err(TemplateError::Invalid { .. }));
    }

    #[test]
    fn parses_commented_template() {
        let dir = tempfile::tempdir().unwrap();
        write_template(
            dir.path(),
            "flow.json",
            "{\n  // which orchestrator runs this workflow\n  \"orchestrator_class\": \"chat\",\n}",
        );
        let roots = TemplateRoots::single(dir.path());
        let doc = roots.load("flow.json").unwrap();
        assert_eq!(doc["orchestrator_class"], "chat");
    }
}
