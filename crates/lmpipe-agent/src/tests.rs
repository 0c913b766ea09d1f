//! ReAct loop tests

#[cfg(test)]
mod agent_tests {
    use crate::{
        ReActAgent, AgentConfig, AgentObserver, ToolRegistry, CalculatorTool, Tool, ToolParameter,
        LLMProvider, ChatMessage, Error, Result,
    };
    use async_trait::async_trait;
    use lmpipe_core::{GenerationConfig, GenerationResult};
    use serde_json::{Value, json};
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Replays canned chat replies and records every conversation it sees
    struct ScriptedChat {
        replies: Mutex<VecDeque<String>>,
        conversations: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl ScriptedChat {
        fn new(replies: &[&str]) -> Self {
            Self {
                replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
                conversations: Mutex::new(Vec::new()),
            }
        }

        fn conversations(&self) -> Vec<Vec<ChatMessage>> {
            self.conversations.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LLMProvider for ScriptedChat {
        async fn generate(&self, _prompt: &str, _config: &GenerationConfig) -> Result<GenerationResult> {
            Err(Error::Other("generate is not scripted".to_string()))
        }

        async fn chat(&self, messages: &[ChatMessage], config: &GenerationConfig) -> Result<GenerationResult> {
            self.conversations.lock().unwrap().push(messages.to_vec());
            let text = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| Error::Other("script exhausted".to_string()))?;
            Ok(GenerationResult {
                text,
                model_id: config.model_id.clone(),
                prompt_tokens: None,
                completion_tokens: None,
            })
        }

        fn model_id(&self) -> &str {
            "scripted"
        }
    }

    #[derive(Default)]
    struct RecordingObserver {
        events: Mutex<Vec<String>>,
    }

    impl AgentObserver for RecordingObserver {
        fn on_step(&self, step: usize) {
            self.events.lock().unwrap().push(format!("step {}", step));
        }

        fn on_tool_call(&self, tool: &str, _args: &Value) {
            self.events.lock().unwrap().push(format!("call {}", tool));
        }

        fn on_tool_result(&self, tool: &str, output: &str) {
            self.events.lock().unwrap().push(format!("result {} {}", tool, output));
        }

        fn on_tool_error(&self, tool: &str, _error: &Error) {
            self.events.lock().unwrap().push(format!("error {}", tool));
        }

        fn on_final_answer(&self, answer: &str) {
            self.events.lock().unwrap().push(format!("answer {}", answer));
        }
    }

    /// Echoes its `text` argument
    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "EchoTool"
        }

        fn parameters(&self) -> Vec<ToolParameter> {
            vec![ToolParameter::new("text", "string", "Text to echo.")]
        }

        async fn call(&self, args: &Value) -> Result<String> {
            Ok(args["text"].as_str().unwrap_or_default().to_string())
        }
    }

    fn tools() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        registry.register(Arc::new(CalculatorTool));
        registry
    }

    fn agent(replies: &[&str]) -> ReActAgent<ScriptedChat> {
        ReActAgent::new(ScriptedChat::new(replies), tools(), AgentConfig::default())
    }

    const ADD: &str = r#"{"tool": "CalculatorTool", "args": {"var1": 2, "var2": 3, "operation": "addition"}}"#;
    const ANSWER: &str = r#"{"tool": "AnswerTool", "args": {"final_answer": "It is 5."}}"#;

    #[test]
    fn test_system_prompt() {
        assert_eq!(
            agent(&[]).system_prompt(),
            "You are a smart agent who answers user query using the tools provided below. Tools:\n\
            - EchoTool | (text: string) -> Text to echo. | \n\
            - CalculatorTool | (var1: float) -> Variable 1. | (var2: float) -> Variable 2. | \
            (operation: str) -> Choose one of the following operations: addition, multiplication, division or exponent | \n\
            - AnswerTool | (final_answer : string) -> If you have an answer and require no further tools.\n\n\
            Provide output in JSON format **only**:```json\n\
            {\"tool\": \"Name of the tool\", \"args\": {\"args1\": \"value1\", \"args2\": \"value2\"}}\n```"
        );
    }

    #[tokio::test]
    async fn test_answer_on_first_step() {
        let agent = agent(&[ANSWER]);
        let answer = agent.run("What is 2 + 3?").await.unwrap();

        assert_eq!(answer.answer, "It is 5.");
        assert_eq!(answer.steps, 1);
        assert!(answer.tool_calls.is_empty());

        let conversations = agent.llm().conversations();
        assert_eq!(conversations.len(), 1);
        assert_eq!(conversations[0].len(), 2);
        assert_eq!(conversations[0][1], ChatMessage::user("What is 2 + 3?"));
    }

    #[tokio::test]
    async fn test_missing_final_answer_is_empty() {
        let agent = agent(&[r#"{"tool": "AnswerTool", "args": {}}"#]);
        assert_eq!(agent.run("q").await.unwrap().answer, "");
    }

    #[tokio::test]
    async fn test_tool_call_then_answer() {
        let observer = Arc::new(RecordingObserver::default());
        let agent = agent(&[ADD, ANSWER]).with_observer(observer.clone());

        let answer = agent.run("What is 2 + 3?").await.unwrap();
        assert_eq!(answer.steps, 2);
        assert_eq!(answer.tool_calls.len(), 1);
        assert_eq!(answer.tool_calls[0].output, "5.0");

        let second = &agent.llm().conversations()[1];
        assert_eq!(second.len(), 4);
        let tool_call: Value = serde_json::from_str(&second[1].content).unwrap();
        assert_eq!(tool_call["tool_call"]["tool"], "CalculatorTool");
        assert_eq!(tool_call["tool_call"]["args"]["operation"], "addition");
        assert_eq!(second[2], ChatMessage::assistant(r#"{"tool_output":"5.0"}"#));
        assert_eq!(second[3], ChatMessage::user("Observation: 5.0"));

        assert_eq!(
            *observer.events.lock().unwrap(),
            vec![
                "step 1",
                "call CalculatorTool",
                "result CalculatorTool 5.0",
                "step 2",
                "answer It is 5.",
            ]
        );
    }

    #[tokio::test]
    async fn test_unknown_tool_is_reported_back() {
        let observer = Arc::new(RecordingObserver::default());
        let agent = agent(&[r#"{"tool": "WeatherTool", "args": {}}"#, ANSWER]).with_observer(observer.clone());
        let answer = agent.run("Weather?").await.unwrap();
        assert_eq!(answer.steps, 2);
        assert_eq!(
            *observer.events.lock().unwrap(),
            vec!["step 1", "error WeatherTool", "step 2", "answer It is 5."]
        );

        let second = &agent.llm().conversations()[1];
        assert_eq!(second.len(), 2);
        assert_eq!(
            second[1].content,
            "Observation: Tool 'WeatherTool' not found. Available tools: EchoTool, CalculatorTool, AnswerTool"
        );
    }

    #[tokio::test]
    async fn test_failed_tool_retries_with_same_messages() {
        let bad = r#"{"tool": "CalculatorTool", "args": {"var1": 1, "var2": 2, "operation": "modulo"}}"#;
        let observer = Arc::new(RecordingObserver::default());
        let agent = agent(&[bad, ANSWER]).with_observer(observer.clone());

        agent.run("1 mod 2").await.unwrap();

        let conversations = agent.llm().conversations();
        assert_eq!(conversations[0], conversations[1]);
        assert!(observer.events.lock().unwrap().contains(&"error CalculatorTool".to_string()));
    }

    #[tokio::test]
    async fn test_max_steps() {
        let echo = r#"{"tool": "EchoTool", "args": {"text": "again"}}"#;
        let config = AgentConfig { max_steps: 2, ..Default::default() };
        let agent = ReActAgent::new(ScriptedChat::new(&[echo, echo, ANSWER]), tools(), config);

        let err = agent.run("loop").await.unwrap_err();
        assert!(matches!(&err, Error::Agent(msg) if msg.starts_with("Maximum number of steps reached")));
        assert_eq!(agent.llm().conversations().len(), 2);
    }

    #[tokio::test]
    async fn test_unparseable_output() {
        let agent = agent(&["The answer is probably 5"]);
        assert!(matches!(agent.run("q").await, Err(Error::Agent(_))));
    }

    #[tokio::test]
    async fn test_missing_tool_name() {
        let agent = agent(&[r#"{"args": {"text": "hi"}}"#]);
        let err = agent.run("q").await.unwrap_err();
        assert!(matches!(err, Error::Agent(msg) if msg.contains("could not decide")));
    }

    #[tokio::test]
    async fn test_model_errors_propagate() {
        let agent = agent(&[]);
        assert!(matches!(agent.run("q").await, Err(Error::Other(_))));
    }

    #[tokio::test]
    async fn test_reply_wrapped_in_prose() {
        let reply = "Sure.\n```json\n{\"tool\": \"EchoTool\", \"args\": {\"text\": \"hi\"}}\n```\n";
        let agent = agent(&[reply, ANSWER]);
        let answer = agent.run("say hi").await.unwrap();
        assert_eq!(answer.tool_calls[0].output, "hi");
        assert_eq!(answer.tool_calls[0].args, json!({"text": "hi"}));
    }
}
