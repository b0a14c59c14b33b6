//! Prompt assembly from a retrieved context

use super::search::RetrievedContext;

/// Render a prompt-ready text block from a retrieved context
///
/// Each admitted chunk becomes a numbered source block with file name and
/// similarity, followed by a deduplicated source list and the original
/// query. With no admitted chunks the base prompt is returned unchanged, so
/// chat degrades gracefully to its non-augmented form.
pub fn augment_prompt(base_prompt: &str, context: &RetrievedContext) -> String {
    if context.chunks.is_empty() {
        return base_prompt.to_string();
    }

    let mut prompt = String::from(
        "Use the following context from the knowledge base to answer the question.\n\n",
    );

    for (i, chunk) in context.chunks.iter().enumerate() {
        prompt.push_str(&format!(
            "[Source {}] From \"{}\" (similarity: {:.0}%):\n{}\n\n",
            i + 1,
            chunk.file_name,
            chunk.score * 100.0,
            chunk.content
        ));
    }

    let mut seen = Vec::new();
    for chunk in &context.chunks {
        if !seen.iter().any(|s| s == &chunk.file_name) {
            seen.push(chunk.file_name.clone());
        }
    }
    prompt.push_str(&format!("Sources: {}\n\n", seen.join(", ")));
    prompt.push_str(&format!("Question: {}", base_prompt));

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::search::{RetrievedChunk, SourceSummary};
    use uuid::Uuid;

    fn chunk(file_name: &str, content: &str, score: f32) -> RetrievedChunk {
        RetrievedChunk {
            chunk_id: Uuid::new_v4(),
            document_id: Uuid::new_v4(),
            content: content.to_string(),
            chunk_index: 0,
            token_count: 4,
            score,
            file_name: file_name.to_string(),
            page: None,
        }
    }

    #[test]
    fn test_empty_context_returns_base_prompt_unchanged() {
        let context = RetrievedContext::empty();
        assert_eq!(augment_prompt("What is Rust?", &context), "What is Rust?");
    }

    #[test]
    fn test_chunks_rendered_with_attribution() {
        let context = RetrievedContext {
            chunks: vec![
                chunk("guide.txt", "Rust is a systems language.", 0.92),
                chunk("faq.docx", "It has no garbage collector.", 0.81),
            ],
            total_tokens: 8,
            sources: vec![
                SourceSummary {
                    file_name: "guide.txt".to_string(),
                    chunk_count: 1,
                },
                SourceSummary {
                    file_name: "faq.docx".to_string(),
                    chunk_count: 1,
                },
            ],
        };

        let prompt = augment_prompt("What is Rust?", &context);

        assert!(prompt.contains("[Source 1] From \"guide.txt\" (similarity: 92%):"));
        assert!(prompt.contains("Rust is a systems language."));
        assert!(prompt.contains("[Source 2] From \"faq.docx\" (similarity: 81%):"));
        assert!(prompt.contains("Sources: guide.txt, faq.docx"));
        assert!(prompt.ends_with("Question: What is Rust?"));
    }

    #[test]
    fn test_source_list_deduplicated() {
        let context = RetrievedContext {
            chunks: vec![
                chunk("guide.txt", "First passage.", 0.9),
                chunk("guide.txt", "Second passage.", 0.8),
            ],
            total_tokens: 8,
            sources: vec![SourceSummary {
                file_name: "guide.txt".to_string(),
                chunk_count: 2,
            }],
        };

        let prompt = augment_prompt("q", &context);
        assert!(prompt.contains("Sources: guide.txt\n"));
        assert_eq!(prompt.matches("Sources:").count(), 1);
    }
}
