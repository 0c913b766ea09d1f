//! Colored agent trace

use colored::*;
use serde_json::Value;

use lmpipe_agent::AgentObserver;
use lmpipe_core::Error;

/// Prints each agent step to stdout
pub struct ConsoleObserver {
    show_raw: bool,
}

impl ConsoleObserver {
    pub fn new(show_raw: bool) -> Self {
        Self { show_raw }
    }
}

impl Default for ConsoleObserver {
    fn default() -> Self {
        Self::new(true)
    }
}

impl AgentObserver for ConsoleObserver {
    fn on_step(&self, step: usize) {
        let rule = "=".repeat(50);
        println!("{}\n{:^50}\n{}", rule.dimmed(), format!("Step-{}", step).bold(), rule.dimmed());
    }

    fn on_raw_output(&self, raw: &str) {
        if self.show_raw {
            println!("{} {}", "Raw output:".yellow(), raw.yellow());
        }
    }

    fn on_tool_call(&self, tool: &str, args: &Value) {
        println!("{} {} with args: {}", "Executing Tool:".blue(), tool.blue().bold(), args);
    }

    fn on_tool_result(&self, _tool: &str, output: &str) {
        println!("{} {}", "Tool result:".magenta(), output);
    }

    fn on_tool_error(&self, tool: &str, error: &Error) {
        println!("{} {} failed: {}", "❌".red(), tool, error.to_string().red());
    }

    fn on_final_answer(&self, answer: &str) {
        println!("{} {}", "Final Answer:".green().bold(), answer.green());
    }
}
