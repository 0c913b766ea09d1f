//! Document reading and text cleanup

use regex::Regex;
use std::path::Path;
use tracing::{debug, info};

use lmpipe_core::{Error, Result};

/// Normalizes text extracted from PDFs before chunking
pub struct TextCleaner {
    replacements: Vec<(Regex, &'static str)>,
}

impl TextCleaner {
    /// Create a new text cleaner
    pub fn new() -> Self {
        let rules = vec![
            // numeric citations such as "[1, 2, 3]"
            (r"\[\s*\d+(?:,\s*\d+)*\s*\]", ""),
            (r"[“”]", "\""),
            (r"[‘’]", "'"),
            // words hyphenated across a line break: "informa-\ntion"
            (r"([a-zA-Z])-\s*\n", "$1"),
            (r"\n+", " "),
            (r"\s+", " "),
        ];

        let replacements = rules
            .into_iter()
            .filter_map(|(pattern, replacement)| Regex::new(pattern).ok().map(|re| (re, replacement)))
            .collect();

        Self { replacements }
    }

    pub fn clean(&self, text: &str) -> String {
        let mut cleaned = text.to_string();
        for (pattern, replacement) in &self.replacements {
            cleaned = pattern.replace_all(&cleaned, *replacement).into_owned();
        }
        cleaned.trim().to_string()
    }
}

impl Default for TextCleaner {
    fn default() -> Self {
        Self::new()
    }
}

/// Cut `text` to at most `max_chars` characters
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

/// Reads PDFs and plain-text files into cleaned text
pub struct DocumentReader {
    cleaner: TextCleaner,
    max_chars: Option<usize>,
}

impl DocumentReader {
    pub fn new() -> Self {
        Self {
            cleaner: TextCleaner::new(),
            max_chars: None,
        }
    }

    /// Only keep the first `max_chars` characters of every document
    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = Some(max_chars);
        self
    }

    /// Read and clean a document. PDFs are extracted page by page; any
    /// other file is read as UTF-8 text.
    pub async fn read(&self, path: impl AsRef<Path>) -> Result<String> {
        let path = path.as_ref();
        let is_pdf = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

        let text = if is_pdf {
            let bytes = tokio::fs::read(path).await?;
            let raw = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
                .await
                .map_err(|e| Error::DocumentReader(format!("PDF extraction task failed: {}", e)))?
                .map_err(|e| Error::DocumentReader(format!("Failed to read PDF {}: {}", path.display(), e)))?;
            self.clean_pages(&raw)
        } else {
            let raw = tokio::fs::read_to_string(path).await?;
            self.cleaner.clean(&raw)
        };

        info!(path = %path.display(), chars = text.chars().count(), "read document");

        Ok(match self.max_chars {
            Some(max) => {
                let truncated = truncate_chars(&text, max);
                if truncated.len() < text.len() {
                    debug!(max_chars = max, "truncated document");
                }
                truncated.to_string()
            }
            None => text,
        })
    }

    /// Clean each page on its own; pages are separated by form feeds
    fn clean_pages(&self, raw: &str) -> String {
        raw.split('\x0C')
            .map(|page| self.cleaner.clean(page))
            .filter(|page| !page.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl Default for DocumentReader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_text() {
        let cleaner = TextCleaner::new();
        let raw = "Memory safety [1, 2] is “key”.\nIt is informa-\ntion rich [3].\n\n  It’s  done.  ";
        assert_eq!(
            cleaner.clean(raw),
            "Memory safety is \"key\". It is information rich . It's done."
        );
    }

    #[test]
    fn test_clean_keeps_bracketed_words() {
        let cleaner = TextCleaner::new();
        assert_eq!(cleaner.clean("see [appendix] and [12]"), "see [appendix] and");
    }

    #[test]
    fn test_truncate_chars_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("short", 10), "short");
        assert_eq!(truncate_chars("", 3), "");
    }

    #[test]
    fn test_pages_are_cleaned_separately() {
        let reader = DocumentReader::new();
        let joined = reader.clean_pages("Page one\nends.\x0C\x0CPage two [4].");
        assert_eq!(joined, "Page one ends. Page two .");
    }

    #[tokio::test]
    async fn test_read_text_file_with_limit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "Alpha\nbeta gamma.").unwrap();

        let text = DocumentReader::new().with_max_chars(10).read(&path).await.unwrap();
        assert_eq!(text, "Alpha beta");
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let result = DocumentReader::new().read("/definitely/not/here.txt").await;
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
