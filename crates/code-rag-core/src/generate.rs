//! Generator trait and prompt rendering.

use anyhow::Result;
use async_trait::async_trait;

use crate::context::is_no_context;
use crate::models::Interaction;

/// Produces an answer from a fully rendered prompt.
#[async_trait]
pub trait Generator: Send + Sync {
    fn model_name(&self) -> &str;
    async fn generate(&self, prompt: &str) -> Result<String>;
}

const PREAMBLE: &str = "You are a senior engineer answering questions about a source-code \
repository. Answer using the code context below. Cite files by path when you rely on them. \
If the context does not contain the answer, say so instead of guessing.";

const NO_CONTEXT_PREAMBLE: &str = "You are a senior engineer answering questions about a \
source-code repository. No repository context matched this question; answer from general \
knowledge and say clearly that the indexed code did not cover it.";

/// Render the generator prompt: preamble, context, history, question.
///
/// History is rendered as `user:` / `assistant:` lines, oldest first.
pub fn render_prompt(context: &str, history: &[Interaction], question: &str) -> String {
    let preamble = if is_no_context(context) {
        NO_CONTEXT_PREAMBLE
    } else {
        PREAMBLE
    };

    let mut prompt = String::with_capacity(preamble.len() + context.len() + question.len() + 64);
    prompt.push_str(preamble);
    prompt.push_str("\n\n## Context\n\n");
    prompt.push_str(context);
    if !history.is_empty() {
        prompt.push_str("\n\n## Conversation\n\n");
        for interaction in history {
            prompt.push_str(&format!("user: {}\n", interaction.query));
            prompt.push_str(&format!("assistant: {}\n", interaction.response));
        }
    }
    prompt.push_str("\n\n## Question\n\n");
    prompt.push_str(question);
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::NO_CONTEXT;
    use chrono::Utc;

    #[test]
    fn test_prompt_sections_in_order() {
        let history = vec![Interaction {
            query: "where is login?".into(),
            response: "src/auth.js".into(),
            sources: vec![],
            timestamp: Utc::now(),
        }];
        let prompt = render_prompt("### [1] auth.js (function)", &history, "how is it tested?");
        let ctx = prompt.find("## Context").unwrap();
        let conv = prompt.find("user: where is login?\nassistant: src/auth.js").unwrap();
        let question = prompt.find("## Question\n\nhow is it tested?").unwrap();
        assert!(prompt.starts_with(PREAMBLE));
        assert!(ctx < conv && conv < question);
    }

    #[test]
    fn test_no_context_changes_preamble() {
        let prompt = render_prompt(NO_CONTEXT, &[], "anything?");
        assert!(prompt.starts_with(NO_CONTEXT_PREAMBLE));
        assert!(!prompt.contains("## Conversation"));
    }
}
