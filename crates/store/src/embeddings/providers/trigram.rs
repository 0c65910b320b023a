//! Trigram embedding provider using character trigram hashing.

use crate::embeddings::normalize;
use crate::embeddings::provider::EmbeddingProvider;
use recall_core::AppResult;
use std::collections::BTreeMap;

const STOP_WORDS: &[&str] = &[
    "the", "is", "at", "which", "on", "a", "an", "as", "are", "was", "were", "for", "to", "of",
    "in", "and", "or", "but", "with", "by", "from", "this", "that", "be", "have", "has", "had",
    "it", "its", "their", "they", "them",
];

/// Trigram-based embedding provider for local, offline operation.
///
/// Each word contributes its character trigrams and the whole word to hashed
/// dimensions. Words are visited in sorted order so floating-point sums are
/// identical across runs, which keeps retrieval rankings reproducible.
#[derive(Debug)]
pub struct TrigramProvider {
    dimensions: usize,
    normalize: bool,
}

impl TrigramProvider {
    /// Create a new trigram provider with specified dimensions.
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            normalize: true,
        }
    }

    /// Toggle unit-length normalization (on by default).
    pub fn with_normalize(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }

    fn generate_trigram_embedding(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0; self.dimensions];
        if self.dimensions == 0 {
            return embedding;
        }

        let lower = text.to_lowercase();

        let mut word_freq: BTreeMap<&str, u32> = BTreeMap::new();
        for word in lower
            .split_whitespace()
            .filter(|w| !STOP_WORDS.contains(w) && w.len() > 2)
        {
            *word_freq.entry(word).or_insert(0) += 1;
        }

        for (word, freq) in &word_freq {
            let chars: Vec<char> = word.chars().collect();
            for window in chars.windows(3) {
                let trigram: String = window.iter().collect();
                let dim_idx = (hash_bytes(&trigram, 37) as usize) % self.dimensions;
                embedding[dim_idx] += (*freq as f32).sqrt();
            }

            let base_dim = (hash_bytes(word, 31) as usize) % self.dimensions;
            embedding[base_dim] += *freq as f32;
        }

        if self.normalize {
            normalize(&mut embedding);
        }

        embedding
    }
}

fn hash_bytes(s: &str, multiplier: u64) -> u64 {
    s.bytes()
        .fold(0u64, |acc, b| acc.wrapping_mul(multiplier).wrapping_add(b as u64))
}

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

    fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| self.generate_trigram_embedding(text))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigram_provider_dimensions() {
        let provider = TrigramProvider::new(384);
        assert_eq!(provider.dimensions(), 384);
        assert_eq!(provider.provider_name(), "trigram");
        assert_eq!(provider.model_name(), "trigram-v1");
    }

    #[test]
    fn test_trigram_provider_embed_single() {
        let provider = TrigramProvider::new(384);
        let embedding = provider.embed("hello world").unwrap();

        assert_eq!(embedding.len(), 384);

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_trigram_provider_embed_batch() {
        let provider = TrigramProvider::new(384);
        let texts = vec![
            "hello world".to_string(),
            "test embedding".to_string(),
            "rust programming".to_string(),
        ];

        let embeddings = provider.embed_batch(&texts).unwrap();

        assert_eq!(embeddings.len(), 3);
        for embedding in &embeddings {
            assert_eq!(embedding.len(), 384);
            let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
            assert!((norm - 1.0).abs() < 0.001);
        }
    }

    #[test]
    fn test_trigram_provider_deterministic() {
        let provider = TrigramProvider::new(384);
        let text = "deterministic test with several distinct words";

        let embedding1 = provider.embed(text).unwrap();
        let embedding2 = provider.embed(text).unwrap();

        assert_eq!(embedding1, embedding2);
    }

    #[test]
    fn test_trigram_provider_different_texts() {
        let provider = TrigramProvider::new(384);

        let embedding1 = provider.embed("hello world").unwrap();
        let embedding2 = provider.embed("goodbye world").unwrap();

        assert_ne!(embedding1, embedding2);
    }

    #[test]
    fn test_trigram_provider_empty_text() {
        let provider = TrigramProvider::new(384);
        let embedding = provider.embed("").unwrap();

        assert_eq!(embedding.len(), 384);
        assert!(embedding.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_trigram_provider_without_normalization() {
        let provider = TrigramProvider::new(384).with_normalize(false);
        let embedding = provider.embed("doc2").unwrap();

        // "doc", "oc2" and the whole word each add 1.0
        assert_eq!(embedding.iter().sum::<f32>(), 3.0);
    }

    #[test]
    fn test_trigram_provider_utf8_safety() {
        let provider = TrigramProvider::new(384);

        let text = "Gamedex é um aplicativo 🎮 brasileiro para gerenciar jogos!";
        let embedding = provider.embed(text).unwrap();

        assert_eq!(embedding.len(), 384);
        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 0.001);
    }
}
