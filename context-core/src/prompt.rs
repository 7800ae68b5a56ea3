//! Prompt assembly: context block formatting and the fixed answer template.

use crate::models::{Chunk, VectorMatch};

/// Context used when the similarity search returns nothing.
pub const NO_CONTEXT: &str = "No relevant context found.";

pub const PROMPT_TEMPLATE: &str = "You are a helpful assistant powered by a context engine. \n\
Use the following pieces of retrieved context to answer the question. \n\
If you don't know the answer, just say that you don't know. \n\
Do not make up an answer.\n\
\n\
Context: \n\
{context}\n\
\n\
Question: {question}\n\
\n\
Helpful Answer:";

/// Join fetched chunks into one delimited block, in the order given.
pub fn format_context(chunks: &[Chunk]) -> String {
    chunks
        .iter()
        .map(|chunk| {
            format!(
                "--- Document ID: {} | Chunk ID: {} ---\n{}\n",
                chunk.document_id, chunk.chunk_id, chunk.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_prompt(context: &str, question: &str) -> String {
    // Split at "{context}" and fill "{question}" only in the tail, so placeholder
    // text inside either value is never substituted.
    let (head, tail) = PROMPT_TEMPLATE
        .split_once("{context}")
        .unwrap_or((PROMPT_TEMPLATE, ""));
    format!("{}{}{}", head, context, tail.replace("{question}", question))
}

/// Numbered, one-line-per-match listing used in the retrieval trace entry.
pub fn format_match_listing(matches: &[VectorMatch]) -> String {
    matches
        .iter()
        .enumerate()
        .map(|(i, m)| {
            format!(
                "{}. document {} (chunk {}) score {:.4}",
                i + 1,
                m.document_id().unwrap_or("unknown"),
                m.chunk_id().unwrap_or("unknown"),
                m.score
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn chunk(chunk_id: &str, document_id: &str, content: &str) -> Chunk {
        Chunk {
            chunk_id: chunk_id.to_string(),
            document_id: document_id.to_string(),
            content: content.to_string(),
        }
    }

    #[test]
    fn test_format_context_delimits_each_chunk() {
        let context = format_context(&[
            chunk("c1", "d1", "X is a letter."),
            chunk("c2", "d1", "X follows W."),
        ]);
        assert_eq!(
            context,
            "--- Document ID: d1 | Chunk ID: c1 ---\nX is a letter.\n\n\
             --- Document ID: d1 | Chunk ID: c2 ---\nX follows W.\n"
        );
    }

    #[test]
    fn test_format_context_empty_is_empty_string() {
        assert_eq!(format_context(&[]), "");
    }

    #[test]
    fn test_render_prompt_fills_both_slots() {
        let prompt = render_prompt(NO_CONTEXT, "What is X?");
        assert!(prompt.starts_with("You are a helpful assistant powered by a context engine."));
        assert!(prompt.contains("Context: \nNo relevant context found.\n\nQuestion: What is X?\n"));
        assert!(prompt.ends_with("Helpful Answer:"));
        assert!(!prompt.contains("{context}"));
        assert!(!prompt.contains("{question}"));
    }

    #[test]
    fn test_render_prompt_keeps_braces_in_question() {
        let prompt = render_prompt("ctx", "what does {context} mean?");
        assert!(prompt.contains("Context: \nctx\n"));
        assert!(prompt.contains("Question: what does {context} mean?"));
    }

    #[test]
    fn test_render_prompt_keeps_braces_in_context() {
        let prompt = render_prompt("templates use {question} and {context}", "What is X?");
        assert!(prompt.contains("Context: \ntemplates use {question} and {context}\n"));
        assert!(prompt.contains("Question: What is X?"));
        assert_eq!(prompt.matches("What is X?").count(), 1);
    }

    #[test]
    fn test_match_listing_numbers_each_match() {
        let matches = vec![
            VectorMatch {
                point_id: "p1".to_string(),
                score: 0.87314,
                metadata: json!({ "metadata": { "chunk_id": "c1", "document_id": "d1" } }),
            },
            VectorMatch {
                point_id: "p2".to_string(),
                score: 0.5,
                metadata: json!({}),
            },
        ];
        assert_eq!(
            format_match_listing(&matches),
            "1. document d1 (chunk c1) score 0.8731\n2. document unknown (chunk unknown) score 0.5000"
        );
    }
}
