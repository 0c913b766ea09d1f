//! Embedding-driven semantic chunking

use tracing::debug;

use lmpipe_core::{EmbeddingProvider, Error, Result};

use crate::splitter::split_sentences;
use crate::vector_store::cosine_similarity;

/// Percentile of `values` with linear interpolation between closest ranks
pub fn percentile(values: &[f32], pct: f32) -> Option<f32> {
    if values.is_empty() || !(0.0..=100.0).contains(&pct) {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let rank = pct / 100.0 * (sorted.len() - 1) as f32;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let weight = rank - lower as f32;

    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * weight)
}

/// Split text where the topic shifts between consecutive sentences.
///
/// A split happens before a sentence whose similarity to its predecessor is
/// below the `threshold_percentile` of all consecutive similarities. Low
/// percentiles split only at the sharpest topic changes; high percentiles
/// split more often.
pub async fn semantic_split<E>(text: &str, embedder: &E, threshold_percentile: f32) -> Result<Vec<String>>
where
    E: EmbeddingProvider + ?Sized,
{
    if !(0.0..=100.0).contains(&threshold_percentile) {
        return Err(Error::InvalidInput(format!(
            "threshold percentile must be within 0-100, got {}",
            threshold_percentile
        )));
    }

    let sentences = split_sentences(text);
    if sentences.len() < 2 {
        let trimmed = text.trim();
        return Ok(if trimmed.is_empty() { Vec::new() } else { vec![trimmed.to_string()] });
    }

    let owned: Vec<String> = sentences.iter().map(|s| s.to_string()).collect();
    let embeddings = embedder.embed_batch(&owned).await?;
    if embeddings.len() != sentences.len() {
        return Err(Error::Embedding(format!(
            "expected {} sentence embeddings, got {}",
            sentences.len(),
            embeddings.len()
        )));
    }

    let similarities: Vec<f32> = embeddings
        .windows(2)
        .map(|pair| cosine_similarity(&pair[0], &pair[1]))
        .collect();

    let threshold = percentile(&similarities, threshold_percentile)
        .ok_or_else(|| Error::Other("no similarities to threshold".to_string()))?;
    debug!(sentences = sentences.len(), threshold, "semantic split threshold");

    let mut chunks = Vec::new();
    let mut start = 0;
    for (i, similarity) in similarities.iter().enumerate() {
        if *similarity < threshold {
            chunks.push(sentences[start..=i].join(" "));
            start = i + 1;
        }
    }
    chunks.push(sentences[start..].join(" "));

    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    /// Puts sentences about cats and rockets on orthogonal axes
    struct TopicEmbedder;

    #[async_trait]
    impl EmbeddingProvider for TopicEmbedder {
        async fn embed(&self, input: &str) -> Result<Vec<f32>> {
            if input.contains("Cats") {
                Ok(vec![1.0, 0.0])
            } else {
                Ok(vec![0.0, 1.0])
            }
        }

        fn embedding_model(&self) -> &str {
            "topic"
        }
    }

    #[test]
    fn test_percentile_interpolates() {
        let values = [0.0, 1.0, 2.0, 3.0, 4.0];
        assert_eq!(percentile(&values, 50.0), Some(2.0));
        assert_eq!(percentile(&values, 0.0), Some(0.0));
        assert_eq!(percentile(&values, 100.0), Some(4.0));
        assert!((percentile(&values, 95.0).unwrap() - 3.8).abs() < 1e-5);
        assert_eq!(percentile(&[0.5], 95.0), Some(0.5));
        assert_eq!(percentile(&[], 50.0), None);
        assert_eq!(percentile(&values, 101.0), None);
    }

    #[tokio::test]
    async fn test_splits_at_topic_change() {
        let text = "Cats purr softly. Cats chase mice. Rockets reach orbit. Rockets burn fuel.";
        let chunks = semantic_split(text, &TopicEmbedder, 50.0).await.unwrap();

        assert_eq!(
            chunks,
            vec!["Cats purr softly. Cats chase mice.", "Rockets reach orbit. Rockets burn fuel."]
        );
    }

    #[tokio::test]
    async fn test_single_sentence_is_returned_whole() {
        let chunks = semantic_split("  Only one sentence here.  ", &TopicEmbedder, 95.0).await.unwrap();
        assert_eq!(chunks, vec!["Only one sentence here."]);
    }

    #[tokio::test]
    async fn test_rejects_bad_percentile() {
        let result = semantic_split("A. B.", &TopicEmbedder, 120.0).await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }
}
