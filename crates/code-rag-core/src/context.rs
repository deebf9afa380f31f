//! Renders ranked chunks into one bounded context block for a generator.

use crate::models::Chunk;

/// Returned instead of a context when nothing was retrieved.
pub const NO_CONTEXT: &str = "No relevant code context was found in the indexed repository.";

/// Per-chunk content limit, in characters.
pub const MAX_CHUNK_CHARS: usize = 1000;

/// Appended to content cut at [`MAX_CHUNK_CHARS`].
pub const TRUNCATION_MARKER: &str = "\n... [truncated]";

/// Assemble chunks (already in rank order) into a context string.
///
/// Each chunk becomes a block:
///
/// ```text
/// ### [1] auth.js (function)
/// Path: src/auth.js
/// Function: login
///
/// <content, truncated to 1000 characters>
/// ```
///
/// An empty input yields [`NO_CONTEXT`].
pub fn assemble_context<'a, I>(chunks: I) -> String
where
    I: IntoIterator<Item = &'a Chunk>,
{
    let blocks: Vec<String> = chunks
        .into_iter()
        .enumerate()
        .map(|(i, chunk)| render_block(i + 1, chunk))
        .collect();
    if blocks.is_empty() {
        return NO_CONTEXT.to_string();
    }
    blocks.join("\n\n")
}

/// Whether a context string is the empty-retrieval sentinel.
pub fn is_no_context(context: &str) -> bool {
    context == NO_CONTEXT
}

fn render_block(rank: usize, chunk: &Chunk) -> String {
    let mut block = format!(
        "### [{}] {} ({})\nPath: {}\n",
        rank, chunk.file_name, chunk.chunk_type, chunk.file_path
    );
    if let Some(name) = &chunk.function_name {
        block.push_str(&format!("Function: {name}\n"));
    }
    if let Some(name) = &chunk.class_name {
        block.push_str(&format!("Class: {name}\n"));
    }
    block.push('\n');
    block.push_str(&truncate_content(&chunk.content, MAX_CHUNK_CHARS));
    block
}

/// Cut `content` to `max_chars` characters, appending [`TRUNCATION_MARKER`]
/// when anything was removed. Not line-aware.
pub fn truncate_content(content: &str, max_chars: usize) -> String {
    match content.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}{}", &content[..cut], TRUNCATION_MARKER),
        None => content.to_string(),
    }
}
