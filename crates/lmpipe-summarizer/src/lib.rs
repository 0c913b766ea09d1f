//! Map-reduce document summarization for lmpipe
//!
//! A document is split into context-window sized chunks, each chunk is
//! summarized on its own (map), and the chunk summaries are merged into one
//! Markdown summary (reduce). When the merged input would itself overflow
//! the context window the reduce step runs in rounds.

mod reader;
mod summarizer;
mod markdown;


pub use reader::{DocumentReader, TextCleaner, truncate_chars};
pub use summarizer::{MapReduceSummarizer, SummarizerConfig, SummaryReport, ChunkStat};
pub use markdown::{render_markdown, save_summary_as_markdown, default_summary_filename};

// Re-export core types for convenience
pub use lmpipe_core::{LLMProvider, GenerationConfig, Error, Result};
