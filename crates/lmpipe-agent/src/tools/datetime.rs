//! Current local date and time

use async_trait::async_trait;
use chrono::Local;
use chrono::format::{Item, StrftimeItems};
use serde_json::Value;
use std::fmt::Write;

use lmpipe_core::{Error, Result};

use super::{Tool, ToolParameter, string_arg};

pub struct DateTimeTool;

impl DateTimeTool {
    pub fn new() -> Self {
        Self
    }

    /// Format the current local time with a strftime string
    pub fn now(format_string: &str) -> Result<String> {
        let items: Vec<Item> = StrftimeItems::new(format_string).collect();
        if items.iter().any(|item| matches!(item, Item::Error)) {
            return Err(Error::InvalidInput(format!("Invalid datetime format: {}", format_string)));
        }

        let mut out = String::new();
        write!(out, "{}", Local::now().format_with_items(items.into_iter()))
            .map_err(|_| Error::InvalidInput(format!("Cannot format the current time with: {}", format_string)))?;
        Ok(out)
    }
}

impl Default for DateTimeTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for DateTimeTool {
    fn name(&self) -> &str {
        "DateTimeTool"
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![ToolParameter::new(
            "format_string",
            "string",
            "Datetime format. E.g. %Y-%m-%d or %Y-%m-%d-%H-%M-%S",
        )]
    }

    async fn call(&self, args: &Value) -> Result<String> {
        Self::now(string_arg(args, "format_string")?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_year() {
        let year = DateTimeTool::now("%Y").unwrap();
        assert_eq!(year.len(), 4);
        assert!(year.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_literal_text_is_kept() {
        let out = DateTimeTool::now("year %Y").unwrap();
        assert!(out.starts_with("year "));
    }

    #[test]
    fn test_invalid_format() {
        assert!(matches!(DateTimeTool::now("%Y %"), Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_call_requires_format() {
        let out = DateTimeTool.call(&json!({"format_string": "%Y-%m-%d"})).await.unwrap();
        assert_eq!(out.len(), 10);
        assert!(matches!(DateTimeTool.call(&json!({})).await, Err(Error::InvalidInput(_))));
    }
}
