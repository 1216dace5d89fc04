//! Trigram embedding provider: deterministic, offline, content-aware.
//!
//! Hashes character trigrams and whole words into a fixed-dimension vector
//! and normalizes it. Not semantically comparable to a neural model, but
//! deterministic and content-dependent, which makes it the default for
//! development and for tests that must run without a local model server.

use crate::embed::provider::EmbeddingProvider;
use grounded_core::AppResult;
use std::collections::HashMap;

/// Common words excluded before hashing for better discrimination.
const STOP_WORDS: &[&str] = &[
    "the", "is", "at", "which", "on", "a", "an", "as", "are", "was", "were", "for", "to", "of",
    "in", "and", "or", "but", "with", "by", "from", "this", "that", "be", "have", "has", "had",
    "it", "its", "their", "they", "them",
];

#[derive(Debug)]
pub struct TrigramProvider {
    dimensions: usize,
}

impl TrigramProvider {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.dimensions];

        for (word, freq) in word_frequencies(text) {
            let chars: Vec<char> = word.chars().collect();

            // Each trigram scatters the word across several dimensions
            for tri in chars.windows(3) {
                let idx = hash_chars(tri, 37) as usize % self.dimensions;
                embedding[idx] += (freq as f32).sqrt();
            }

            // Whole word anchors one dimension
            let idx = hash_chars(&chars, 31) as usize % self.dimensions;
            embedding[idx] += freq as f32;
        }

        normalize(&mut embedding);
        embedding
    }
}

/// Lowercased word frequencies with stop words and short tokens removed.
fn word_frequencies(text: &str) -> HashMap<String, u32> {
    let lower = text.to_lowercase();
    let mut freq = HashMap::new();

    for word in lower
        .split_whitespace()
        .filter(|w| w.len() > 2 && !STOP_WORDS.contains(w))
    {
        *freq.entry(word.to_string()).or_insert(0u32) += 1;
    }

    freq
}

fn hash_chars(chars: &[char], multiplier: u64) -> u64 {
    let mut acc = 0u64;
    for &c in chars {
        let mut buf = [0u8; 4];
        for &b in c.encode_utf8(&mut buf).as_bytes() {
            acc = acc.wrapping_mul(multiplier).wrapping_add(b as u64);
        }
    }
    acc
}

fn normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for TrigramProvider {
    fn provider_name(&self) -> &str {
        "trigram"
    }

    fn model_name(&self) -> &str {
        "trigram-v1"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.embed_text(text)).collect())
    }
}
