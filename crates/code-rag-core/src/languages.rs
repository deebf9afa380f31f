//! Supported-extension allowlist and per-language lexical conventions.
//!
//! The extension decides three things: whether a file is ingested at all,
//! the `file_type` tag stored on its chunks, and which extraction strategy
//! runs on its content.

use serde::{Deserialize, Serialize};

/// Extraction strategy for a file, beyond the always-emitted overview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    /// Source code: structural (function/class/route) extraction.
    Code,
    /// Markdown: header-delimited documentation sections.
    Markdown,
    /// JSON: one pretty-printed configuration chunk when it parses.
    Json,
    /// Overview only.
    Plain,
}

/// Single-line comment syntax used by the overview comment scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentSyntax {
    /// `//`, `/* */`, and leading `*` continuation lines.
    Slash,
    /// `#`.
    Hash,
    /// `--`.
    DoubleDash,
    /// `<!-- -->`.
    Markup,
    Absent,
}

/// A recognised file language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Language {
    /// Stored as the chunk's `file_type`.
    pub tag: &'static str,
    pub kind: FileKind,
    pub comments: CommentSyntax,
}

const fn lang(tag: &'static str, kind: FileKind, comments: CommentSyntax) -> Language {
    Language {
        tag,
        kind,
        comments,
    }
}

/// Detect a language from a file name by its (lowercased) extension.
///
/// Returns `None` for extensions outside the allowlist; such files are
/// never ingested.
pub fn detect_language(file_name: &str) -> Option<Language> {
    let ext = file_name.rsplit_once('.')?.1.to_ascii_lowercase();
    use CommentSyntax::*;
    use FileKind::*;
    let language = match ext.as_str() {
        "js" | "jsx" | "mjs" | "cjs" => lang("javascript", Code, Slash),
        "ts" | "tsx" | "mts" | "cts" => lang("typescript", Code, Slash),
        "vue" => lang("vue", Code, Slash),
        "svelte" => lang("svelte", Code, Slash),
        "py" | "pyi" => lang("python", Code, Hash),
        "rb" => lang("ruby", Code, Hash),
        "php" => lang("php", Code, Slash),
        "java" => lang("java", Code, Slash),
        "kt" | "kts" => lang("kotlin", Code, Slash),
        "scala" => lang("scala", Code, Slash),
        "go" => lang("go", Code, Slash),
        "rs" => lang("rust", Code, Slash),
        "c" | "h" => lang("c", Code, Slash),
        "cc" | "cpp" | "cxx" | "hpp" | "hh" => lang("cpp", Code, Slash),
        "cs" => lang("csharp", Code, Slash),
        "swift" => lang("swift", Code, Slash),
        "dart" => lang("dart", Code, Slash),
        "md" | "markdown" | "mdx" => lang("markdown", Markdown, Markup),
        "json" => lang("json", Json, Absent),
        "yml" | "yaml" => lang("yaml", Plain, Hash),
        "toml" => lang("toml", Plain, Hash),
        "sql" => lang("sql", Plain, DoubleDash),
        "sh" | "bash" | "zsh" => lang("shell", Plain, Hash),
        "html" | "htm" => lang("html", Plain, Markup),
        "css" | "scss" | "sass" | "less" => lang("css", Plain, Slash),
        "txt" | "rst" => lang("text", Plain, Absent),
        _ => return None,
    };
    Some(language)
}

/// Whether a file name is in the supported-extension allowlist.
pub fn is_supported(file_name: &str) -> bool {
    detect_language(file_name).is_some()
}

impl Language {
    /// Whether `trimmed` is a comment line under this language's syntax.
    pub fn is_comment_line(&self, trimmed: &str) -> bool {
        match self.comments {
            CommentSyntax::Slash => {
                trimmed.starts_with("//")
                    || trimmed.starts_with("/*")
                    || trimmed.starts_with('*')
                    || trimmed.starts_with("*/")
            }
            CommentSyntax::Hash => {
                (trimmed.starts_with('#') && !trimmed.starts_with("#include"))
                    || trimmed.starts_with("\"\"\"")
                    || trimmed.starts_with("'''")
            }
            CommentSyntax::DoubleDash => trimmed.starts_with("--"),
            CommentSyntax::Markup => trimmed.starts_with("<!--"),
            CommentSyntax::Absent => false,
        }
    }
}

/// Whether `trimmed` looks like an import/include statement in any
/// supported language.
pub fn is_import_line(trimmed: &str) -> bool {
    const PREFIXES: &[&str] = &[
        "import ",
        "import{",
        "from ",
        "#include",
        "require ",
        "require(",
        "using ",
        "use ",
        "package ",
        "extern crate ",
        "@import",
    ];
    if PREFIXES.iter().any(|p| trimmed.starts_with(p)) {
        return true;
    }
    // `const x = require('x')`
    (trimmed.starts_with("const ") || trimmed.starts_with("var ") || trimmed.starts_with("let "))
        && trimmed.contains("require(")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_common_extensions() {
        assert_eq!(detect_language("auth.js").unwrap().tag, "javascript");
        assert_eq!(detect_language("App.TSX").unwrap().tag, "typescript");
        assert_eq!(detect_language("README.md").unwrap().kind, FileKind::Markdown);
        assert_eq!(detect_language("package.json").unwrap().kind, FileKind::Json);
        assert_eq!(detect_language("main.py").unwrap().kind, FileKind::Code);
    }

    #[test]
    fn test_unsupported_extensions_rejected() {
        assert!(detect_language("logo.png").is_none());
        assert!(detect_language("Makefile").is_none());
        assert!(!is_supported("archive.tar.gz"));
    }

    #[test]
    fn test_comment_lines_by_syntax() {
        let js = detect_language("a.js").unwrap();
        assert!(js.is_comment_line("// hello"));
        assert!(js.is_comment_line("* @param x"));
        assert!(!js.is_comment_line("# not a js comment"));

        let py = detect_language("a.py").unwrap();
        assert!(py.is_comment_line("# hello"));
        assert!(py.is_comment_line("\"\"\"Module docs.\"\"\""));
        assert!(!py.is_comment_line("// nope"));
    }

    #[test]
    fn test_import_lines() {
        assert!(is_import_line("import React from 'react';"));
        assert!(is_import_line("from os import path"));
        assert!(is_import_line("#include <stdio.h>"));
        assert!(is_import_line("const express = require('express');"));
        assert!(is_import_line("use std::io;"));
        assert!(!is_import_line("const x = 5;"));
    }
}
