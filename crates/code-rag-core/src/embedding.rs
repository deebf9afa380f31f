//! Embedding provider trait, chunk text preparation, and vector utilities.
//!
//! Concrete providers (OpenAI, Ollama, fastembed) live in the `code-rag`
//! app crate. Providers do not retry: a failed call fails that one item.

use anyhow::Result;
use async_trait::async_trait;

use crate::models::Chunk;

/// Converts text into a fixed-dimension vector.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;
    /// Returns the embedding vector dimensionality (e.g. `1536`).
    fn dims(&self) -> usize;
    /// Embed one text. Errors are not retried by callers.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Text sent to the embedding model for a chunk.
///
/// Collapses whitespace runs in the content to single spaces, trims, and
/// prepends a `File:` / `Type:` / optional `Description:` header. Query
/// text is embedded as-is and never passes through here.
pub fn prepare_chunk_text(chunk: &Chunk) -> String {
    let body = chunk.content.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut text = format!("File: {}\nType: {}\n", chunk.file_path, chunk.chunk_type);
    if let Some(description) = &chunk.description {
        text.push_str("Description: ");
        text.push_str(description);
        text.push('\n');
    }
    text.push('\n');
    text.push_str(&body);
    text
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
///
/// ```rust
/// use code_rag_core::embedding::{vec_to_blob, blob_to_vec};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12);
/// assert_eq!(blob_to_vec(&blob), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB written by [`vec_to_blob`].
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

/// Cosine similarity in `[-1.0, 1.0]`.
///
/// Returns `0.0` for empty vectors, mismatched lengths, or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }
    dot / denom
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChunkType;

    fn chunk(content: &str, description: Option<&str>) -> Chunk {
        Chunk {
            chunk_type: ChunkType::Function,
            content: content.to_string(),
            file_path: "src/auth.js".to_string(),
            file_name: "auth.js".to_string(),
            file_type: "javascript".to_string(),
            repository: "demo".to_string(),
            branch: "main".to_string(),
            start_line: 1,
            end_line: 3,
            function_name: Some("login".to_string()),
            class_name: None,
            description: description.map(str::to_string),
        }
    }

    #[test]
    fn test_prepare_collapses_whitespace() {
        let text = prepare_chunk_text(&chunk("function login() {\n    return   1;\n}\n", None));
        assert_eq!(
            text,
            "File: src/auth.js\nType: function\n\nfunction login() { return 1; }"
        );
    }

    #[test]
    fn test_prepare_includes_description() {
        let text = prepare_chunk_text(&chunk("x", Some("Overview of auth.js")));
        assert!(text.contains("Description: Overview of auth.js\n"));
        assert!(text.ends_with("\n\nx"));
    }

    #[test]
    fn test_vec_blob_roundtrip() {
        let vec = vec![1.0f32, -2.5, 3.125, 0.0, -0.001];
        assert_eq!(blob_to_vec(&vec_to_blob(&vec)), vec);
    }

    #[test]
    fn test_cosine_identical_and_orthogonal() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_degenerate_inputs() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }
}
