//! UI utilities for the CLI

use colored::*;
use crossterm::terminal::size;

use lmpipe_rag::IngestReport;
use lmpipe_summarizer::SummaryReport;

/// Display startup banner
pub fn display_banner() {
    let terminal_width = size().map(|(w, _)| w as usize).unwrap_or(80);
    let banner_width = std::cmp::min(60, terminal_width.saturating_sub(4)).max(40);

    let top_border = format!("┌{}┐", "─".repeat(banner_width - 2));
    let bottom_border = format!("└{}┘", "─".repeat(banner_width - 2));
    let empty_line = format!("│{}│", " ".repeat(banner_width - 2));

    println!();
    println!("{}", top_border.blue());
    println!("{}", empty_line.blue());

    let title = "lmpipe - local LLM pipelines";
    println!(
        "│  {}{}│",
        title.blue().bold(),
        " ".repeat(banner_width.saturating_sub(title.len() + 4))
    );

    println!("{}", empty_line.blue());

    let feature_lines = [
        "summarize  map-reduce document summaries",
        "rag        parent-child retrieval",
        "agent      ReAct agent with web search",
        "chunk      sentence and semantic splitting",
    ];
    for line in feature_lines {
        let content = format!("│  {}{}│", line, " ".repeat(banner_width.saturating_sub(line.len() + 4)));
        println!("{}", content.blue());
    }

    println!("{}", empty_line.blue());
    println!("{}", bottom_border.blue());
    println!();
}

/// Per-chunk map statistics and totals
pub fn summary_table(report: &SummaryReport) -> String {
    let mut out = format!(
        "{:>5} {:>8} {:>8} {:>12} {:>8}\n",
        "Chunk", "Chars", "Summary", "Compression", "Time"
    );
    for chunk in &report.chunks {
        let summary = if chunk.succeeded {
            chunk.summary_chars.to_string()
        } else {
            "failed".to_string()
        };
        out.push_str(&format!(
            "{:>5} {:>8} {:>8} {:>11.2}% {:>7.2}s\n",
            chunk.index, chunk.chunk_chars, summary, chunk.compression_pct, chunk.elapsed_secs
        ));
    }
    out.push_str(&format!(
        "{:>5} {:>8} {:>8} {:>12} {:>7.2}s\n",
        "Total", report.total_chunk_chars, report.total_summary_chars, "", report.map_secs
    ));
    out.push_str(&format!(
        "Final summary: {} chars from {} input chars ({:.2}% compression), {} reduce round(s) in {:.2}s",
        report.final_summary.chars().count(),
        report.input_chars,
        report.final_compression_pct,
        report.reduce_rounds,
        report.reduce_secs
    ));
    out
}

pub fn print_summary_report(report: &SummaryReport) {
    println!("{}", "Map step".bold());
    println!("{}", summary_table(report));
    println!();
    println!("{}", "Final Summary".green().bold());
    println!("{}", report.final_summary);
}

/// Chunking and retrieval statistics
pub fn ingest_table(report: &IngestReport) -> String {
    let config = &report.config;
    format!(
        "Parent chunks: {} in {:.2}s ({} tokens, {} overlap)\n\
        Child chunks: {} in {:.2}s ({} tokens, {} overlap)\n\
        Retrieved {} parent chunk(s) for {:?} in {:.2}s",
        report.parent_count,
        report.parent_secs,
        config.parent_tokens,
        config.parent_overlap,
        report.child_count,
        report.child_secs,
        config.child_tokens,
        config.child_overlap,
        report.retrieved.len(),
        report.query,
        report.retrieval_secs
    )
}

pub fn print_ingest_report(report: &IngestReport) {
    println!("{}", ingest_table(report));
    println!();
    println!("{}", "Context".bold());
    println!("{}", report.context.trim_end());
}

pub fn print_chunks(chunks: &[String]) {
    for (i, chunk) in chunks.iter().enumerate() {
        println!("{} {}", format!("[{}]", i + 1).cyan().bold(), chunk);
    }
    println!("{}", format!("{} chunk(s)", chunks.len()).dimmed());
}

pub fn print_answer(answer: &str) {
    println!();
    println!("{}", "Answer".green().bold());
    println!("{}", answer.trim());
}
