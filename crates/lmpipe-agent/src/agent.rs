//! ReAct loop

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::{Arc, LazyLock};
use tracing::{debug, info, warn};

use lmpipe_core::{LLMProvider, GenerationConfig, ChatMessage, Error, Result};

use crate::tools::ToolRegistry;

/// Name of the pseudo-tool the model uses to finish
pub const ANSWER_TOOL: &str = "AnswerTool";

static JSON_OBJECT: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"(?s)(\{.*\})").ok());

/// Agent configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub model_name: String,
    pub temperature: f32,
    pub max_steps: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model_name: "qwen3:1.7b".to_string(),
            temperature: 0.1,
            max_steps: 5,
        }
    }
}

impl AgentConfig {
    /// Only the temperature is sent; the server picks the other options
    pub fn generation(&self) -> GenerationConfig {
        GenerationConfig {
            model_id: self.model_name.clone(),
            temperature: Some(self.temperature),
            top_k: None,
            top_p: None,
            num_ctx: None,
            ..Default::default()
        }
    }
}

/// What the model asked for in one step
#[derive(Debug, Clone, PartialEq)]
pub struct AgentAction {
    pub tool: Option<String>,
    pub args: Value,
}

/// A tool call that succeeded
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub tool: String,
    pub args: Value,
    pub output: String,
}

/// The final answer and how it was reached
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentAnswer {
    pub answer: String,
    pub steps: usize,
    pub tool_calls: Vec<ToolCall>,
}

/// Receives a trace of the agent's progress
pub trait AgentObserver: Send + Sync {
    fn on_step(&self, _step: usize) {}
    fn on_raw_output(&self, _raw: &str) {}
    fn on_tool_call(&self, _tool: &str, _args: &Value) {}
    fn on_tool_result(&self, _tool: &str, _output: &str) {}
    fn on_tool_error(&self, _tool: &str, _error: &Error) {}
    fn on_final_answer(&self, _answer: &str) {}
}

pub struct NoopObserver;

impl AgentObserver for NoopObserver {}

/// The outermost `{...}` of a response, or the trimmed response
pub fn extract_json(response: &str) -> &str {
    JSON_OBJECT
        .as_ref()
        .and_then(|re| re.captures(response))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .unwrap_or_else(|| response.trim())
}

fn missing_message(tool: &str) -> String {
    format!("Tool '{}' not found", tool)
}

/// Parse `{"tool": ..., "args": {...}}`
pub fn parse_action(raw: &str) -> Result<AgentAction> {
    let data: Value = serde_json::from_str(raw)
        .map_err(|e| Error::Agent(format!("Could not parse agent's response: {}. Raw response: {}", e, raw)))?;
    if data.is_null() {
        return Err(Error::Agent(format!("Could not parse agent's response: {}", raw)));
    }

    let tool = data.get("tool").and_then(Value::as_str).map(str::to_string);
    let args = match data.get("args") {
        Some(Value::Null) | None => json!({}),
        Some(args) => args.clone(),
    };
    Ok(AgentAction { tool, args })
}

/// ReAct agent over a chat model and a set of tools
pub struct ReActAgent<L: LLMProvider> {
    llm: L,
    tools: ToolRegistry,
    config: AgentConfig,
    observer: Arc<dyn AgentObserver>,
}

impl<L: LLMProvider> ReActAgent<L> {
    pub fn new(llm: L, tools: ToolRegistry, config: AgentConfig) -> Self {
        Self {
            llm,
            tools,
            config,
            observer: Arc::new(NoopObserver),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn AgentObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn llm(&self) -> &L {
        &self.llm
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn system_prompt(&self) -> String {
        format!(
            "You are a smart agent who answers user query using the tools provided below. Tools:\n\
            {}\
            - {} | (final_answer : string) -> If you have an answer and require no further tools.\n\n\
            Provide output in JSON format **only**:\
            ```json\n{{\"tool\": \"Name of the tool\", \"args\": {{\"args1\": \"value1\", \"args2\": \"value2\"}}}}\n```",
            self.tools.describe(),
            ANSWER_TOOL
        )
    }

    /// Answer `query`, calling tools until the model gives a final answer
    pub async fn run(&self, query: &str) -> Result<AgentAnswer> {
        let generation = self.config.generation();
        let system = ChatMessage::system(self.system_prompt());
        let mut history: Vec<ChatMessage> = Vec::new();
        let mut user_msg = query.to_string();
        let mut tool_calls = Vec::new();

        info!(model = %self.config.model_name, max_steps = self.config.max_steps, "agent started");

        for step in 1..=self.config.max_steps {
            self.observer.on_step(step);

            let mut messages = Vec::with_capacity(history.len() + 2);
            messages.push(system.clone());
            messages.extend(history.iter().cloned());
            messages.push(ChatMessage::user(user_msg.as_str()));

            let response = self.llm.chat(&messages, &generation).await?;
            let raw = extract_json(&response.text);
            debug!(step, raw, "agent output");
            self.observer.on_raw_output(raw);

            let action = parse_action(raw)?;
            let tool_name = action.tool.ok_or_else(|| {
                Error::Agent("Agent could not decide on a tool or final answer".to_string())
            })?;

            if tool_name == ANSWER_TOOL {
                let answer = action
                    .args
                    .get("final_answer")
                    .map(|v| match v {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .unwrap_or_default();
                self.observer.on_final_answer(&answer);
                info!(steps = step, "agent answered");
                return Ok(AgentAnswer { answer, steps: step, tool_calls });
            }

            let Some(tool) = self.tools.get(&tool_name) else {
                warn!(tool = %tool_name, "model asked for an unknown tool");
                let missing = Error::Tool(missing_message(&tool_name));
                self.observer.on_tool_error(&tool_name, &missing);
                user_msg = format!(
                    "Observation: {}. Available tools: {}, {}",
                    missing_message(&tool_name),
                    self.tools.tool_names().join(", "),
                    ANSWER_TOOL
                );
                continue;
            };

            self.observer.on_tool_call(&tool_name, &action.args);
            match tool.call(&action.args).await {
                Ok(output) => {
                    self.observer.on_tool_result(&tool_name, &output);
                    history.push(ChatMessage::user(
                        json!({"tool_call": {"tool": &tool_name, "args": &action.args}}).to_string(),
                    ));
                    history.push(ChatMessage::assistant(json!({"tool_output": &output}).to_string()));
                    user_msg = format!("Observation: {}", output);
                    tool_calls.push(ToolCall { tool: tool_name, args: action.args, output });
                }
                Err(e) => {
                    warn!(tool = %tool_name, error = %e, "tool execution failed");
                    self.observer.on_tool_error(&tool_name, &e);
                }
            }
        }

        Err(Error::Agent(format!(
            "Maximum number of steps reached without a final answer ({} steps)",
            self.config.max_steps
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_from_fenced_output() {
        let response = "<reasoning>\n```json\n{\"tool\": \"AnswerTool\",\n \"args\": {\"final_answer\": \"4\"}}\n```";
        assert_eq!(extract_json(response), "{\"tool\": \"AnswerTool\",\n \"args\": {\"final_answer\": \"4\"}}");
    }

    #[test]
    fn test_extract_json_falls_back_to_trimmed_text() {
        assert_eq!(extract_json("  null \n"), "null");
    }

    #[test]
    fn test_parse_action() {
        let action = parse_action(r#"{"tool": "CalculatorTool", "args": {"var1": 1}}"#).unwrap();
        assert_eq!(action.tool.as_deref(), Some("CalculatorTool"));
        assert_eq!(action.args, json!({"var1": 1}));

        let no_args = parse_action(r#"{"tool": "AnswerTool"}"#).unwrap();
        assert_eq!(no_args.args, json!({}));
    }

    #[test]
    fn test_parse_action_rejects_garbage_and_null() {
        assert!(matches!(parse_action("I think the answer is 4"), Err(Error::Agent(_))));
        assert!(matches!(parse_action("null"), Err(Error::Agent(_))));
    }

    #[test]
    fn test_agent_generation_sends_only_temperature() {
        let generation = AgentConfig::default().generation();
        assert_eq!(generation.model_id, "qwen3:1.7b");
        assert_eq!(generation.temperature, Some(0.1));
        assert!(generation.top_k.is_none());
        assert!(generation.num_ctx.is_none());
    }
}
