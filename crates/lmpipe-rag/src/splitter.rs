//! Sentence-aware text splitting

use unicode_segmentation::UnicodeSegmentation;

use lmpipe_core::{Error, Result};

/// Split text into trimmed sentences on Unicode sentence boundaries
pub fn split_sentences(text: &str) -> Vec<&str> {
    text.unicode_sentences()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Count word-level tokens: every word and every punctuation mark is one token
pub fn count_tokens(text: &str) -> usize {
    text.split_word_bounds()
        .filter(|segment| !segment.trim().is_empty())
        .count()
}

/// Splits text into chunks of whole sentences bounded by a token budget,
/// with roughly `token_overlap` tokens repeated between neighbours.
#[derive(Debug, Clone, Copy)]
pub struct SentenceSplitter {
    num_tokens: usize,
    token_overlap: usize,
}

impl SentenceSplitter {
    pub fn new(num_tokens: usize, token_overlap: usize) -> Result<Self> {
        if num_tokens <= token_overlap {
            return Err(Error::InvalidInput(format!(
                "num_tokens ({}) must be greater than token_overlap ({})",
                num_tokens, token_overlap
            )));
        }
        Ok(Self { num_tokens, token_overlap })
    }

    pub fn num_tokens(&self) -> usize {
        self.num_tokens
    }

    pub fn token_overlap(&self) -> usize {
        self.token_overlap
    }

    pub fn split(&self, text: &str) -> Vec<String> {
        let sentences: Vec<(&str, usize)> = split_sentences(text)
            .into_iter()
            .map(|s| (s, count_tokens(s)))
            .collect();

        let mut chunks = Vec::new();
        let mut start = 0;

        while start < sentences.len() {
            let mut end = start;
            let mut chunk_tokens = 0;

            while end < sentences.len() {
                let count = sentences[end].1;

                // an oversized sentence is a chunk of its own
                if end == start && count > self.num_tokens {
                    end += 1;
                    break;
                }
                if chunk_tokens + count > self.num_tokens {
                    break;
                }

                chunk_tokens += count;
                end += 1;
            }

            let chunk: Vec<&str> = sentences[start..end].iter().map(|(s, _)| *s).collect();
            chunks.push(chunk.join(" "));

            if end >= sentences.len() {
                break;
            }

            // Walk back from the chunk's last sentence until the overlap is
            // covered, never reaching the chunk's first sentence.
            let mut overlap_tokens = 0;
            let mut next_start = end - 1;
            while next_start > start && overlap_tokens < self.token_overlap {
                overlap_tokens += sentences[next_start].1;
                next_start -= 1;
            }

            start = (next_start + 1).max(start + 1);
        }

        chunks
    }
}

/// Split `text` into sentence-aligned chunks of at most `num_tokens` tokens
pub fn sentence_aware_split(text: &str, num_tokens: usize, token_overlap: usize) -> Result<Vec<String>> {
    Ok(SentenceSplitter::new(num_tokens, token_overlap)?.split(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_sentences() {
        let sentences = split_sentences("First sentence. Second one!  Third?");
        assert_eq!(sentences, vec!["First sentence.", "Second one!", "Third?"]);
    }

    #[test]
    fn test_count_tokens_includes_punctuation() {
        assert_eq!(count_tokens("One two three."), 4);
        assert_eq!(count_tokens("Hello, world!"), 4);
        assert_eq!(count_tokens("   "), 0);
    }

    #[test]
    fn test_overlap_must_be_smaller_than_chunk() {
        assert!(matches!(SentenceSplitter::new(16, 16), Err(Error::InvalidInput(_))));
        assert!(sentence_aware_split("text.", 8, 10).is_err());
    }

    #[test]
    fn test_empty_text_has_no_chunks() {
        assert!(sentence_aware_split("", 8, 2).unwrap().is_empty());
        assert!(sentence_aware_split("  \n ", 8, 2).unwrap().is_empty());
    }

    #[test]
    fn test_short_text_is_one_chunk() {
        let chunks = sentence_aware_split("Hello world. Bye now.", 100, 10).unwrap();
        assert_eq!(chunks, vec!["Hello world. Bye now."]);
    }

    #[test]
    fn test_chunks_overlap_by_one_sentence() {
        // every sentence is four tokens
        let text = "One two three. Four five six. Seven eight nine. Ten eleven twelve.";
        let chunks = sentence_aware_split(text, 8, 4).unwrap();

        assert_eq!(
            chunks,
            vec![
                "One two three. Four five six.",
                "Four five six. Seven eight nine.",
                "Seven eight nine. Ten eleven twelve.",
            ]
        );
    }

    #[test]
    fn test_no_overlap_when_chunk_is_one_sentence() {
        let text = "One two three. Four five six. Seven eight nine.";
        let chunks = sentence_aware_split(text, 5, 4).unwrap();
        assert_eq!(chunks, vec!["One two three.", "Four five six.", "Seven eight nine."]);
    }

    #[test]
    fn test_zero_overlap() {
        let text = "One two three. Four five six. Seven eight nine. Ten eleven twelve.";
        let chunks = sentence_aware_split(text, 8, 0).unwrap();
        assert_eq!(
            chunks,
            vec!["One two three. Four five six.", "Seven eight nine. Ten eleven twelve."]
        );
    }

    #[test]
    fn test_oversized_sentence_is_its_own_chunk() {
        let text = "Short one. This sentence has far too many words to fit. End here.";
        let chunks = sentence_aware_split(text, 4, 1).unwrap();

        assert_eq!(
            chunks,
            vec!["Short one.", "This sentence has far too many words to fit.", "End here."]
        );
    }
}
