//! ReAct agent for lmpipe
//!
//! The agent asks a chat model which tool to call next, runs the tool, and
//! feeds the result back as an observation until the model produces a final
//! answer or the step limit is reached.

mod agent;
pub mod tools;

#[cfg(test)]
mod tests;

pub use agent::{ReActAgent, AgentConfig, AgentAnswer, AgentAction, ToolCall, AgentObserver, NoopObserver, extract_json, parse_action};
pub use tools::{Tool, ToolParameter, ToolRegistry, DateTimeTool, WebSearchTool, CalculatorTool};

// Re-export core types for convenience
pub use lmpipe_core::{LLMProvider, ChatMessage, Error, Result};
