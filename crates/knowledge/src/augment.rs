//! Query augmentation: retrieved context plus the user query, as one prompt.
//!
//! This is the only surface the chat pipeline calls. It never fails: when
//! the index is unavailable, when retrieval returns nothing, or when
//! anything goes wrong internally, the user's query passes through in a
//! plain prompt instead of propagating the failure.

use crate::service::KnowledgeService;

/// Augment a user query with retrieved knowledge-base context.
pub async fn enhance_query(service: &KnowledgeService, query: &str) -> String {
    if !service.is_available() {
        tracing::debug!("Knowledge index unavailable, passing query through");
        return passthrough_prompt(query);
    }

    let top_k = service.config().top_k as usize;

    match service.search(query, top_k).await {
        Ok(hits) if hits.is_empty() => {
            tracing::debug!("No relevant chunks for query, passing through");
            no_context_prompt(query)
        }
        Ok(hits) => {
            tracing::debug!("Augmenting query with {} retrieved chunks", hits.len());
            let context = hits
                .iter()
                .map(|(chunk, _score)| chunk.text.as_str())
                .collect::<Vec<_>>()
                .join("\n\n");
            augmented_prompt(&context, query)
        }
        Err(e) => {
            tracing::warn!("Retrieval failed, passing query through: {}", e);
            passthrough_prompt(query)
        }
    }
}

/// Prompt used when no knowledge base was consulted.
pub fn passthrough_prompt(query: &str) -> String {
    format!(
        "User question: {}\n\n\
         Answer from your own knowledge.",
        query
    )
}

/// Prompt used when the knowledge base held nothing relevant.
pub fn no_context_prompt(query: &str) -> String {
    format!(
        "User question: {}\n\n\
         Note: the knowledge base contained nothing relevant to this \
         question. Answer from your general knowledge.",
        query
    )
}

/// Prompt carrying retrieved context in similarity-rank order.
pub fn augmented_prompt(context: &str, query: &str) -> String {
    format!(
        "Answer the user's question using the reference material below.\n\n\
         Reference material:\n{}\n\n\
         User question: {}\n\n\
         Base your answer on the reference material. Where it is not \
         sufficient, supplement it with your general knowledge.",
        context, query
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passthrough_contains_query() {
        let prompt = passthrough_prompt("what is the refund policy?");
        assert!(prompt.contains("what is the refund policy?"));
        assert!(!prompt.contains("Reference material"));
    }

    #[test]
    fn test_no_context_notes_absence() {
        let prompt = no_context_prompt("anything");
        assert!(prompt.contains("anything"));
        assert!(prompt.contains("nothing relevant"));
    }

    #[test]
    fn test_augmented_orders_context_before_query() {
        let prompt = augmented_prompt("fact one\n\nfact two", "the question");
        let context_pos = prompt.find("fact one").unwrap();
        let query_pos = prompt.find("the question").unwrap();
        assert!(context_pos < query_pos);
        assert!(prompt.contains("Reference material"));
    }
}
