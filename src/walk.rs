//! Repository walk with ignore rules.
//!
//! A file is visited when none of these reject it:
//!
//! 1. [`IGNORED_DIRS`]: directory names pruned anywhere in the tree.
//! 2. Default excludes for logs, env files, and minified or bundled assets.
//! 3. `ingest.exclude_globs` from the config.
//! 4. The repository's `.gitignore` files (nested ones and negations
//!    included) and `.git/info/exclude`, read by the `ignore` crate.
//! 5. The language allowlist in [`code_rag_core::languages`].
//!
//! Ignore files outside the root and the user's global excludes are not
//! consulted. A malformed pattern is logged and the remaining lines still
//! apply.
//!
//! Traversal is depth-first with entries sorted by name, so two walks of an
//! unchanged tree yield the same order.

use std::path::{Path, PathBuf};

use anyhow::Result;
use ignore::overrides::{Override, OverrideBuilder};
use ignore::{DirEntry, WalkBuilder};

use code_rag_core::languages::is_supported;

use crate::config::IngestConfig;

/// Directory names never descended into.
pub const IGNORED_DIRS: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    "node_modules",
    "bower_components",
    "vendor",
    "target",
    "dist",
    "build",
    "out",
    "coverage",
    ".next",
    ".nuxt",
    ".cache",
    "__pycache__",
    ".pytest_cache",
    ".mypy_cache",
    ".venv",
    "venv",
    ".idea",
    ".vscode",
];

const DEFAULT_EXCLUDES: &[&str] = &[
    "**/*.log",
    "**/.env",
    "**/.env.*",
    "**/*.min.js",
    "**/*.min.css",
    "**/*.bundle.js",
    "**/*.map",
    "**/package-lock.json",
    "**/yarn.lock",
    "**/pnpm-lock.yaml",
];

/// A file selected for extraction.
#[derive(Debug, Clone)]
pub struct RepoFile {
    pub path: PathBuf,
    /// Forward-slash path relative to the repository root.
    pub relative: String,
}

/// Excludes as overrides. Each glob is negated, which marks a match as
/// ignored without whitelisting everything else.
fn exclude_overrides(root: &Path, config: &IngestConfig) -> Override {
    let mut builder = OverrideBuilder::new(root);
    let patterns = DEFAULT_EXCLUDES
        .iter()
        .copied()
        .chain(config.exclude_globs.iter().map(String::as_str));
    for pattern in patterns {
        if let Err(err) = builder.add(&format!("!{pattern}")) {
            tracing::warn!(pattern, error = %err, "skipping invalid exclude glob");
        }
    }
    builder.build().unwrap_or_else(|err| {
        tracing::warn!(error = %err, "exclude globs unusable, applying none");
        Override::empty()
    })
}

fn relative_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

fn is_ignored_dir(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_some_and(|ft| ft.is_dir())
        && IGNORED_DIRS
            .iter()
            .any(|name| entry.file_name().to_string_lossy() == *name)
}

/// List the supported, non-ignored files under `root`.
///
/// Walk errors on individual entries are logged and skipped.
pub fn collect_files(root: &Path, config: &IngestConfig) -> Result<Vec<RepoFile>> {
    if !root.is_dir() {
        anyhow::bail!("Repository root is not a directory: {}", root.display());
    }

    let walker = WalkBuilder::new(root)
        .hidden(false)
        .parents(false)
        .ignore(false)
        .git_ignore(true)
        .git_exclude(true)
        .git_global(false)
        .require_git(false)
        .follow_links(config.follow_symlinks)
        .overrides(exclude_overrides(root, config))
        .sort_by_file_name(|a, b| a.cmp(b))
        .filter_entry(|entry| !is_ignored_dir(entry))
        .build();

    let mut files = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                tracing::warn!(error = %err, "skipping unreadable directory entry");
                continue;
            }
        };
        if let Some(err) = entry.error() {
            tracing::warn!(
                path = %entry.path().display(),
                error = %err,
                "ignoring malformed ignore pattern"
            );
        }
        if !entry.file_type().is_some_and(|ft| ft.is_file()) {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if !is_supported(&name) {
            continue;
        }
        files.push(RepoFile {
            path: entry.path().to_path_buf(),
            relative: relative_path(root, entry.path()),
        });
    }
    Ok(files)
}
