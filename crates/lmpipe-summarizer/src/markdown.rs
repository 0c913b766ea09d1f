//! Markdown export of summaries

use chrono::Local;
use std::path::{Path, PathBuf};
use tracing::info;

use lmpipe_core::Result;

/// Render a titled summary document
pub fn render_markdown(title: &str, summary: &str) -> String {
    format!("# {}\n\n## Final Summary\n{}", title, summary)
}

/// `Summary_<timestamp>.md` in the current directory
pub fn default_summary_filename() -> PathBuf {
    PathBuf::from(format!("Summary_{}.md", Local::now().format("%Y-%m-%d_%H-%M-%S")))
}

/// Save the summary as Markdown, creating parent directories as needed.
/// Returns the path written.
pub async fn save_summary_as_markdown(summary: &str, title: &str, path: Option<&Path>) -> Result<PathBuf> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_summary_filename);

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    tokio::fs::write(&path, render_markdown(title, summary)).await?;

    info!(path = %path.display(), "saved summary");
    Ok(path)
}
