// ABOUTME: Decides which local entries take part in an upload
// Applied before descending so an ignored directory prunes its whole subtree

use crate::models::SyncOptions;
use glob::Pattern;
use lazy_static::lazy_static;
use regex::Regex;
use std::path::{Path, PathBuf};

/// Version-control metadata directories, always ignored.
pub const IGNORE_DIRS: &[&str] = &[".git"];
/// Hidden and private-name conventions, always ignored.
pub const IGNORE_PREFIXES: &[&str] = &["_", "."];

lazy_static! {
    static ref TOKEN_SEPARATOR: Regex = Regex::new(r"[,\s]+").unwrap();
}

#[derive(Debug, Clone)]
struct ExcludePattern {
    raw: String,
    glob: Option<Pattern>,
}

impl ExcludePattern {
    fn new(token: &str) -> Self {
        Self {
            raw: token.to_string(),
            glob: Pattern::new(token).ok(),
        }
    }

    fn matches(&self, candidate: &str) -> bool {
        candidate == self.raw || self.glob.as_ref().is_some_and(|g| g.matches(candidate))
    }

    /// Full paths match literally; wildcards only see names below the root.
    fn matches_full_path(&self, full: &str) -> bool {
        full == self.raw
    }
}

#[derive(Debug, Clone)]
pub struct PathFilter {
    root: PathBuf,
    patterns: Vec<ExcludePattern>,
}

impl PathFilter {
    /// Build a filter for entries under `root`. Without a user list the
    /// exclusions default to [`IGNORE_DIRS`].
    pub fn new(root: impl Into<PathBuf>, exclude: Option<&str>) -> Self {
        let tokens: Vec<String> = match exclude.map(str::trim) {
            Some(list) if !list.is_empty() => TOKEN_SEPARATOR
                .split(list)
                .map(|token| token.trim_end_matches('/'))
                .filter(|token| !token.is_empty())
                .map(String::from)
                .collect(),
            _ => IGNORE_DIRS.iter().map(|d| (*d).to_string()).collect(),
        };

        Self {
            root: root.into(),
            patterns: tokens.iter().map(|t| ExcludePattern::new(t)).collect(),
        }
    }

    pub fn from_options(options: &SyncOptions) -> Self {
        Self::new(&options.local_root, options.exclude.as_deref())
    }

    pub fn should_ignore(&self, path: &Path) -> bool {
        let base_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        if IGNORE_DIRS.contains(&base_name.as_str()) {
            return true;
        }
        if IGNORE_PREFIXES.iter().any(|p| base_name.starts_with(p)) {
            return true;
        }
        if self.patterns.is_empty() {
            return false;
        }

        let full = path.to_string_lossy().replace('\\', "/");
        let relative = path
            .strip_prefix(&self.root)
            .ok()
            .map(|rel| rel.to_string_lossy().replace('\\', "/"));

        self.patterns.iter().any(|pattern| {
            pattern.matches(&base_name)
                || pattern.matches_full_path(&full)
                || relative.as_deref().is_some_and(|rel| pattern.matches(rel))
        })
    }
}

/// One-shot form of [`PathFilter::should_ignore`].
pub fn should_ignore(path: &Path, options: &SyncOptions) -> bool {
    PathFilter::from_options(options).should_ignore(path)
}
