//! Map-reduce summarizer

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info, warn};

use lmpipe_core::{LLMProvider, GenerationConfig, Error, Result};
use lmpipe_rag::{SentenceSplitter, count_tokens};

/// Tuning for map-reduce summarization.
///
/// Chunk size, overlap and the context window should be tuned together:
/// every chunk costs one model call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarizerConfig {
    pub num_tokens: usize,
    pub token_overlap: usize,
    pub generation: GenerationConfig,
    /// Map calls allowed in flight at once
    pub map_concurrency: usize,
    /// Largest combined size, in tokens, of the summaries fed to one reduce call
    pub reduce_token_budget: usize,
    /// Reduce rounds allowed, the final one included
    pub max_reduce_rounds: usize,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            num_tokens: 1024,
            token_overlap: 128,
            generation: GenerationConfig::default(),
            map_concurrency: 1,
            reduce_token_budget: 4096,
            max_reduce_rounds: 4,
        }
    }
}

/// Outcome of the map step for one chunk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkStat {
    /// 1-based chunk number
    pub index: usize,
    pub chunk_chars: usize,
    /// 0 when the chunk could not be summarized
    pub summary_chars: usize,
    pub compression_pct: f64,
    pub elapsed_secs: f64,
    pub succeeded: bool,
}

/// Everything the summarizer measured along the way
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryReport {
    pub chunks: Vec<ChunkStat>,
    pub input_chars: usize,
    pub total_chunk_chars: usize,
    pub total_summary_chars: usize,
    pub map_secs: f64,
    pub reduce_secs: f64,
    pub reduce_rounds: usize,
    pub final_summary: String,
    pub final_compression_pct: f64,
}

impl SummaryReport {
    pub fn failed_chunks(&self) -> usize {
        self.chunks.iter().filter(|c| !c.succeeded).count()
    }
}

pub(crate) fn compression_pct(original: usize, condensed: usize) -> f64 {
    if original == 0 {
        return 0.0;
    }
    let pct = (original as f64 - condensed as f64) / original as f64 * 100.0;
    (pct * 100.0).round() / 100.0
}

/// Map-reduce summarizer over any LLM provider
pub struct MapReduceSummarizer<L: LLMProvider> {
    llm: L,
    config: SummarizerConfig,
}

impl<L: LLMProvider> MapReduceSummarizer<L> {
    /// Create a new summarizer
    pub fn new(llm: L, config: SummarizerConfig) -> Result<Self> {
        SentenceSplitter::new(config.num_tokens, config.token_overlap)?;
        if config.map_concurrency == 0 {
            return Err(Error::InvalidInput("map_concurrency must be at least 1".to_string()));
        }
        if config.max_reduce_rounds == 0 {
            return Err(Error::InvalidInput("max_reduce_rounds must be at least 1".to_string()));
        }
        Ok(Self { llm, config })
    }

    pub fn llm(&self) -> &L {
        &self.llm
    }

    pub fn config(&self) -> &SummarizerConfig {
        &self.config
    }

    pub fn map_prompt(chunk: &str) -> String {
        format!(
            "You are a helpful assistant. Please summarize the following text. \
            Keep the summary concise and retain the most important details.\n\n\
            TEXT:\n---\n{}\n---\nSUMMARY: ",
            chunk
        )
    }

    pub fn reduce_prompt(summaries: &[String]) -> String {
        let bullets: Vec<String> = summaries.iter().map(|s| format!("- {}", s.trim())).collect();
        format!(
            "You are a helpful summarization assistant. You are given several summaries of a long document. \
            Please combine these summaries into one final, coherent summary. \
            Ensure all key points from the individual summaries are included. \
            Output the summary in proper Markdown format with bullet key points.\n\n\
            SUMMARIES:\n---\n{}\n---\nFINAL SUMMARY: ",
            bullets.join("\n")
        )
    }

    /// The map step: summarize a single chunk
    async fn map_chunk(&self, index: usize, chunk: &str) -> (ChunkStat, Option<String>) {
        let start = Instant::now();
        let outcome = self
            .llm
            .generate(&Self::map_prompt(chunk), &self.config.generation)
            .await;
        let elapsed_secs = start.elapsed().as_secs_f64();
        let chunk_chars = chunk.chars().count();

        let summary = match outcome {
            Ok(result) if !result.text.trim().is_empty() => Some(result.text),
            Ok(_) => {
                warn!(chunk = index, "map step returned an empty summary");
                None
            }
            Err(e) => {
                warn!(chunk = index, error = %e, "map step failed");
                None
            }
        };

        let summary_chars = summary.as_ref().map(|s| s.chars().count()).unwrap_or(0);
        debug!(chunk = index, chunk_chars, summary_chars, elapsed_secs, "chunk summarized");

        let stat = ChunkStat {
            index,
            chunk_chars,
            summary_chars,
            compression_pct: compression_pct(chunk_chars, summary_chars),
            elapsed_secs,
            succeeded: summary.is_some(),
        };
        (stat, summary)
    }

    /// The reduce step: merge summaries into one
    async fn reduce(&self, summaries: &[String]) -> Result<String> {
        let result = self
            .llm
            .generate(&Self::reduce_prompt(summaries), &self.config.generation)
            .await
            .map_err(|e| Error::Summarization(format!("Failed to generate final summary: {}", e)))?;
        Ok(result.text)
    }

    /// Pack consecutive summaries into groups of at most `budget` tokens.
    /// A summary larger than the budget forms a group of its own.
    pub(crate) fn pack(summaries: &[String], budget: usize) -> Vec<Vec<String>> {
        let mut groups: Vec<Vec<String>> = Vec::new();
        let mut current: Vec<String> = Vec::new();
        let mut current_tokens = 0;

        for summary in summaries {
            let tokens = count_tokens(summary);
            if !current.is_empty() && current_tokens + tokens > budget {
                groups.push(std::mem::take(&mut current));
                current_tokens = 0;
            }
            current.push(summary.clone());
            current_tokens += tokens;
        }
        if !current.is_empty() {
            groups.push(current);
        }

        groups
    }

    /// Reduce in rounds until the summaries fit one call, then reduce once more.
    /// Returns the final summary and the number of rounds used.
    async fn reduce_all(&self, summaries: Vec<String>) -> Result<(String, usize)> {
        let budget = self.config.reduce_token_budget;
        let mut current = summaries;
        let mut rounds = 0;

        while rounds + 1 < self.config.max_reduce_rounds
            && current.len() > 1
            && count_tokens(&current.join("\n")) > budget
        {
            let groups = Self::pack(&current, budget);
            if groups.len() >= current.len() {
                // every summary is already over budget on its own
                break;
            }

            rounds += 1;
            info!(round = rounds, inputs = current.len(), groups = groups.len(), "intermediate reduce");

            let mut next = Vec::with_capacity(groups.len());
            for group in &groups {
                next.push(self.reduce(group).await?);
            }
            current = next;
        }

        let final_summary = self.reduce(&current).await?;
        Ok((final_summary, rounds + 1))
    }

    /// Orchestrate the whole map-reduce summarization of `text`
    pub async fn summarize(&self, text: &str) -> Result<SummaryReport> {
        let splitter = SentenceSplitter::new(self.config.num_tokens, self.config.token_overlap)?;
        let chunks = splitter.split(text);
        if chunks.is_empty() {
            return Err(Error::InvalidInput("Nothing to summarize".to_string()));
        }
        info!(chunks = chunks.len(), model = %self.config.generation.model_id, "starting map step");

        let map_start = Instant::now();
        let mapped: Vec<(ChunkStat, Option<String>)> = stream::iter(chunks.iter().enumerate())
            .map(|(i, chunk)| self.map_chunk(i + 1, chunk))
            .buffered(self.config.map_concurrency)
            .collect()
            .await;
        let map_secs = map_start.elapsed().as_secs_f64();

        let mut stats = Vec::with_capacity(mapped.len());
        let mut summaries = Vec::new();
        for (stat, summary) in mapped {
            stats.push(stat);
            summaries.extend(summary);
        }

        if summaries.is_empty() {
            return Err(Error::Summarization(format!(
                "Failed to generate any of the {} chunk summaries",
                chunks.len()
            )));
        }

        let input_chars = text.chars().count();
        let total_chunk_chars = stats.iter().map(|s| s.chunk_chars).sum();
        let total_summary_chars = stats.iter().map(|s| s.summary_chars).sum();

        let reduce_start = Instant::now();
        let (final_summary, reduce_rounds) = self.reduce_all(summaries).await?;
        let reduce_secs = reduce_start.elapsed().as_secs_f64();

        let final_compression_pct = compression_pct(input_chars, final_summary.chars().count());
        info!(reduce_rounds, final_compression_pct, "summary finished");

        Ok(SummaryReport {
            chunks: stats,
            input_chars,
            total_chunk_chars,
            total_summary_chars,
            map_secs,
            reduce_secs,
            reduce_rounds,
            final_summary,
            final_compression_pct,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::compression_pct;

    #[test]
    fn test_compression_pct() {
        assert_eq!(compression_pct(200, 50), 75.0);
        assert_eq!(compression_pct(3, 2), 33.33);
        assert_eq!(compression_pct(0, 10), 0.0);
    }
}
