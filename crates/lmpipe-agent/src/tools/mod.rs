//! Tools the agent can call

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use lmpipe_core::{Error, Result};

mod calculator;
mod datetime;
mod web_search;

pub use calculator::CalculatorTool;
pub use datetime::DateTimeTool;
pub use web_search::{WebSearchTool, SearchHit, parse_results, format_results};

/// A parameter as advertised to the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolParameter {
    pub name: String,
    /// Type name shown in the prompt, e.g. `string` or `float`
    pub kind: String,
    pub description: String,
}

impl ToolParameter {
    pub fn new(name: &str, kind: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: kind.to_string(),
            description: description.to_string(),
        }
    }
}

/// Trait for agent tools
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name the model uses to select the tool
    fn name(&self) -> &str;

    fn parameters(&self) -> Vec<ToolParameter>;

    /// Run the tool with the model-supplied arguments object
    async fn call(&self, args: &Value) -> Result<String>;

    /// One prompt line: `- Name | (param: type) -> description | `
    fn describe(&self) -> String {
        let mut line = format!("- {} | ", self.name());
        for param in self.parameters() {
            line.push_str(&format!("({}: {}) -> {} | ", param.name, param.kind, param.description));
        }
        line
    }
}

/// Ordered collection of tools
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Date/time, web search and calculator, in that order
    pub fn with_default_tools() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(DateTimeTool::new()));
        registry.register(Arc::new(WebSearchTool::new()));
        registry.register(Arc::new(CalculatorTool));
        registry
    }

    /// Register a tool, replacing any tool with the same name
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.retain(|t| t.name() != tool.name());
        self.tools.push(tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name).cloned()
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Tool listing for the system prompt, one line per tool
    pub fn describe(&self) -> String {
        self.tools.iter().map(|t| format!("{}\n", t.describe())).collect()
    }
}

/// Fetch a required string argument
pub(crate) fn string_arg<'a>(args: &'a Value, name: &str) -> Result<&'a str> {
    args.get(name)
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::InvalidInput(format!("Missing '{}' parameter", name)))
}

/// Fetch a required number, accepting JSON numbers and numeric strings
pub(crate) fn number_arg(args: &Value, name: &str) -> Result<f64> {
    match args.get(name) {
        Some(Value::Number(n)) => n
            .as_f64()
            .ok_or_else(|| Error::InvalidInput(format!("'{}' is not a valid number", name))),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| Error::InvalidInput(format!("'{}' is not a valid number: {}", name, s))),
        Some(other) => Err(Error::InvalidInput(format!("'{}' is not a number: {}", name, other))),
        None => Err(Error::InvalidInput(format!("Missing '{}' parameter", name))),
    }
}
