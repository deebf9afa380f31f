//! Heuristic chunk extraction from a single file's text.
//!
//! Every supported file yields exactly one [`ChunkType::FileOverview`]
//! chunk. Depending on the file kind, extraction then adds:
//!
//! - **code**: function / class / route chunks from a single forward scan
//!   driven by the [`patterns`](crate::patterns) table;
//! - **markdown**: one documentation chunk per header-delimited section;
//! - **JSON**: one pretty-printed configuration chunk when the file parses.
//!
//! # Structural scan
//!
//! The scan keeps an optional accumulator, a brace balance, and an
//! "inside block comment" flag. Blank lines, comment lines, and lines
//! inside a block comment are appended to the open accumulator but never
//! start a chunk. Any other line is classified; a match flushes the open
//! accumulator and starts a new one at that line. After each code line is
//! appended the balance is updated by `{` minus `}`, and the chunk closes
//! once the balance is zero or below **and** its content is longer than
//! [`MIN_CHUNK_CHARS`].
//!
//! Nesting is not tracked: a nested declaration flushes the enclosing
//! chunk, and any closing brace that returns the balance to zero ends a
//! chunk once it is past the size threshold, so enclosing bodies can be
//! cut short. That truncation is accepted heuristic behavior.
//!
//! Extraction is pure: the same text always yields the same chunks.

use crate::languages::{detect_language, is_import_line, CommentSyntax, FileKind, Language};
use crate::models::{Chunk, ChunkType};
use crate::patterns::{classify_line, extract_class_name, extract_function_name};

/// A structural chunk closes only once its content exceeds this many characters.
pub const MIN_CHUNK_CHARS: usize = 100;

const MAX_OVERVIEW_IMPORTS: usize = 10;
const MAX_OVERVIEW_COMMENTS: usize = 20;
const OVERVIEW_PREVIEW_LINES: usize = 30;

/// One file handed to the extractor.
#[derive(Debug, Clone, Copy)]
pub struct SourceFile<'a> {
    pub repository: &'a str,
    pub branch: &'a str,
    /// Repository-relative path with `/` separators.
    pub file_path: &'a str,
    pub content: &'a str,
}

impl<'a> SourceFile<'a> {
    pub fn file_name(&self) -> &'a str {
        self.file_path
            .rsplit_once('/')
            .map(|(_, name)| name)
            .unwrap_or(self.file_path)
    }
}

/// Extract all chunks from one file.
///
/// Returns an empty list for unsupported extensions and for files with no
/// non-whitespace content.
pub fn extract_chunks(file: &SourceFile<'_>) -> Vec<Chunk> {
    let file_name = file.file_name();
    let Some(language) = detect_language(file_name) else {
        return Vec::new();
    };
    if file.content.trim().is_empty() {
        return Vec::new();
    }

    let lines: Vec<&str> = file.content.lines().collect();
    let builder = ChunkBuilder {
        file,
        file_name,
        file_type: language.tag,
    };

    let mut chunks = vec![overview_chunk(&builder, &language, &lines)];
    match language.kind {
        FileKind::Code => chunks.extend(structural_chunks(&builder, &language, &lines)),
        FileKind::Markdown => chunks.extend(markdown_chunks(&builder, &lines)),
        FileKind::Json => chunks.extend(configuration_chunk(&builder, lines.len())),
        FileKind::Plain => {}
    }
    chunks
}

struct ChunkBuilder<'a> {
    file: &'a SourceFile<'a>,
    file_name: &'a str,
    file_type: &'static str,
}

impl ChunkBuilder<'_> {
    fn build(&self, chunk_type: ChunkType, content: String, start_line: usize, end_line: usize) -> Chunk {
        Chunk {
            chunk_type,
            content,
            file_path: self.file.file_path.to_string(),
            file_name: self.file_name.to_string(),
            file_type: self.file_type.to_string(),
            repository: self.file.repository.to_string(),
            branch: self.file.branch.to_string(),
            start_line,
            end_line,
            function_name: None,
            class_name: None,
            description: None,
        }
    }
}

fn overview_chunk(builder: &ChunkBuilder<'_>, language: &Language, lines: &[&str]) -> Chunk {
    let mut imports = Vec::new();
    let mut comments = Vec::new();
    for line in lines {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if is_import_line(trimmed) {
            if imports.len() < MAX_OVERVIEW_IMPORTS {
                imports.push(trimmed);
            }
        } else if language.is_comment_line(trimmed) {
            if comments.len() < MAX_OVERVIEW_COMMENTS {
                comments.push(trimmed);
            }
        } else {
            break;
        }
    }

    let mut content = format!(
        "File: {}\nType: {}\nLines: {}\n",
        builder.file.file_path,
        builder.file_type,
        lines.len()
    );
    if !imports.is_empty() {
        content.push_str("\nImports:\n");
        content.push_str(&imports.join("\n"));
        content.push('\n');
    }
    if !comments.is_empty() {
        content.push_str("\nComments:\n");
        content.push_str(&comments.join("\n"));
        content.push('\n');
    }
    content.push_str("\nPreview:\n");
    let preview_len = lines.len().min(OVERVIEW_PREVIEW_LINES);
    content.push_str(&lines[..preview_len].join("\n"));

    let mut chunk = builder.build(ChunkType::FileOverview, content, 1, lines.len());
    chunk.description = Some(format!("Overview of {}", builder.file_name));
    chunk
}

/// Open structural chunk.
struct Accumulator<'a> {
    chunk_type: ChunkType,
    start_line: usize,
    end_line: usize,
    function_name: Option<String>,
    class_name: Option<String>,
    lines: Vec<&'a str>,
    chars: usize,
}

impl<'a> Accumulator<'a> {
    fn start(chunk_type: ChunkType, line: &str, line_no: usize) -> Self {
        let (function_name, class_name) = match chunk_type {
            ChunkType::Class => (None, extract_class_name(line)),
            _ => (extract_function_name(line), None),
        };
        Self {
            chunk_type,
            start_line: line_no,
            end_line: line_no,
            function_name,
            class_name,
            lines: Vec::new(),
            chars: 0,
        }
    }

    fn push(&mut self, line: &'a str, line_no: usize) {
        if !self.lines.is_empty() {
            self.chars += 1;
        }
        self.chars += line.chars().count();
        self.lines.push(line);
        self.end_line = line_no;
    }

    fn finish(self, builder: &ChunkBuilder<'_>) -> Option<Chunk> {
        let content = self.lines.join("\n");
        if content.trim().is_empty() {
            return None;
        }
        let mut chunk = builder.build(self.chunk_type, content, self.start_line, self.end_line);
        chunk.function_name = self.function_name;
        chunk.class_name = self.class_name;
        Some(chunk)
    }
}

/// Update the block-comment flag for a line. Returns the new state.
fn toggle_block_comment(comments: CommentSyntax, trimmed: &str, inside: bool) -> bool {
    match comments {
        CommentSyntax::Slash => {
            if inside {
                !trimmed.contains("*/")
            } else {
                match trimmed.find("/*") {
                    Some(open) => !trimmed[open + 2..].contains("*/"),
                    None => false,
                }
            }
        }
        CommentSyntax::Hash => {
            let delimiters = trimmed.matches("\"\"\"").count() + trimmed.matches("'''").count();
            if delimiters % 2 == 1 {
                !inside
            } else {
                inside
            }
        }
        CommentSyntax::Markup => {
            if inside {
                !trimmed.contains("-->")
            } else {
                match trimmed.find("<!--") {
                    Some(open) => !trimmed[open + 4..].contains("-->"),
                    None => false,
                }
            }
        }
        CommentSyntax::DoubleDash | CommentSyntax::Absent => false,
    }
}

fn structural_chunks(builder: &ChunkBuilder<'_>, language: &Language, lines: &[&str]) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut current: Option<Accumulator<'_>> = None;
    let mut balance: i64 = 0;
    let mut in_block_comment = false;

    for (idx, &line) in lines.iter().enumerate() {
        let line_no = idx + 1;
        let trimmed = line.trim();

        let was_inside = in_block_comment;
        in_block_comment = toggle_block_comment(language.comments, trimmed, in_block_comment);
        if was_inside || in_block_comment || trimmed.is_empty() || language.is_comment_line(trimmed) {
            if let Some(acc) = current.as_mut() {
                acc.push(line, line_no);
            }
            continue;
        }

        if let Some(chunk_type) = classify_line(line) {
            if let Some(chunk) = current.take().and_then(|acc| acc.finish(builder)) {
                chunks.push(chunk);
            }
            current = Some(Accumulator::start(chunk_type, line, line_no));
            balance = 0;
        }

        let Some(acc) = current.as_mut() else {
            continue;
        };
        acc.push(line, line_no);
        balance += line.matches('{').count() as i64 - line.matches('}').count() as i64;

        if balance <= 0 && acc.chars > MIN_CHUNK_CHARS {
            if let Some(chunk) = current.take().and_then(|acc| acc.finish(builder)) {
                chunks.push(chunk);
            }
            balance = 0;
        }
    }

    if let Some(chunk) = current.take().and_then(|acc| acc.finish(builder)) {
        chunks.push(chunk);
    }
    chunks
}

/// Header text for a markdown ATX header line (`#` through `######`).
fn markdown_header(trimmed: &str) -> Option<&str> {
    let level = trimmed.chars().take_while(|c| *c == '#').count();
    if level == 0 || level > 6 {
        return None;
    }
    let rest = &trimmed[level..];
    if !rest.starts_with(' ') && !rest.starts_with('\t') {
        return None;
    }
    let title = rest.trim().trim_end_matches('#').trim_end();
    if title.is_empty() {
        None
    } else {
        Some(title)
    }
}

fn markdown_chunks(builder: &ChunkBuilder<'_>, lines: &[&str]) -> Vec<Chunk> {
    struct Section<'a> {
        title: Option<&'a str>,
        start_line: usize,
        lines: Vec<&'a str>,
    }

    fn flush(builder: &ChunkBuilder<'_>, section: Section<'_>, out: &mut Vec<Chunk>) {
        // Trailing blank lines do not extend a section.
        let kept = section
            .lines
            .iter()
            .rposition(|l| !l.trim().is_empty())
            .map(|i| i + 1)
            .unwrap_or(0);
        if kept == 0 {
            return;
        }
        let end_line = section.start_line + kept - 1;
        let content = section.lines[..kept].join("\n");
        let mut chunk = builder.build(ChunkType::Documentation, content, section.start_line, end_line);
        chunk.description = section.title.map(str::to_string);
        out.push(chunk);
    }

    let mut chunks = Vec::new();
    let mut in_fence = false;
    let mut section = Section {
        title: None,
        start_line: 1,
        lines: Vec::new(),
    };

    for (idx, &line) in lines.iter().enumerate() {
        let trimmed = line.trim();
        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            in_fence = !in_fence;
        } else if !in_fence {
            if let Some(title) = markdown_header(trimmed) {
                let next = Section {
                    title: Some(title),
                    start_line: idx + 1,
                    lines: Vec::new(),
                };
                flush(builder, std::mem::replace(&mut section, next), &mut chunks);
            }
        }
        if section.lines.is_empty() && trimmed.is_empty() && section.title.is_none() {
            // Leading blank lines before any content.
            section.start_line = idx + 2;
            continue;
        }
        section.lines.push(line);
    }
    flush(builder, section, &mut chunks);
    chunks
}

fn configuration_chunk(builder: &ChunkBuilder<'_>, total_lines: usize) -> Option<Chunk> {
    let value: serde_json::Value = match serde_json::from_str(builder.file.content) {
        Ok(value) => value,
        Err(e) => {
            tracing::trace!(file = builder.file.file_path, error = %e, "skipping configuration chunk for unparsable JSON");
            return None;
        }
    };
    let content = serde_json::to_string_pretty(&value).ok()?;
    let mut chunk = builder.build(ChunkType::Configuration, content, 1, total_lines);
    chunk.description = Some(format!("Configuration: {}", builder.file_name));
    Some(chunk)
}
