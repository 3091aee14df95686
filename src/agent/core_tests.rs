use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use async_trait::async_trait;
use serde_json::json;

use super::*;
use crate::backends::MockLlmCaller;
use crate::chat::{MessageContent, ResponseChoice, ToolDefinition};
use crate::clients::{
    ClientState, ExecutionConfig, StaticClientRegistry, TOOL_EXECUTE_TOOL_CODE, WILDCARD,
};

struct MockToolExecutor {
    outputs: HashMap<String, String>,
    failing: HashSet<String>,
    executed: Mutex<Vec<String>>,
}

impl MockToolExecutor {
    fn new() -> Self {
        Self {
            outputs: HashMap::new(),
            failing: HashSet::new(),
            executed: Mutex::new(Vec::new()),
        }
    }

    fn with_output(mut self, tool: &str, output: &str) -> Self {
        self.outputs.insert(tool.to_string(), output.to_string());
        self
    }

    fn with_failure(mut self, tool: &str) -> Self {
        self.failing.insert(tool.to_string());
        self
    }

    fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }
}

#[async_trait]
impl ToolExecutor for MockToolExecutor {
    async fn execute(
        &self,
        _ctx: &RequestContext,
        tool_call: &ToolCall,
    ) -> anyhow::Result<ChatMessage> {
        let name = tool_call.name().unwrap_or("unknown").to_string();
        self.executed.lock().unwrap().push(name.clone());
        if self.failing.contains(&name) {
            return Err(anyhow!("simulated failure"));
        }
        let output = self
            .outputs
            .get(&name)
            .cloned()
            .unwrap_or_else(|| format!("result of {}", name));
        Ok(ChatMessage::tool_result(tool_call.id.clone(), output))
    }
}

fn stop_response(text: &str) -> ChatResponse {
    ChatResponse {
        id: Some("resp_done".to_string()),
        object: Some("chat.completion".to_string()),
        created: Some(1_700_000_000),
        model: Some("gpt-4".to_string()),
        choices: vec![ResponseChoice {
            index: 0,
            finish_reason: Some(FINISH_REASON_STOP.to_string()),
            message: Some(ChatMessage::assistant(
                Some(MessageContent::text(text)),
                None,
            )),
        }],
    }
}

fn tool_call_response(calls: Vec<ToolCall>) -> ChatResponse {
    ChatResponse {
        id: Some("resp_tools".to_string()),
        object: Some("chat.completion".to_string()),
        created: Some(1_700_000_000),
        model: Some("gpt-4".to_string()),
        choices: vec![ResponseChoice {
            index: 0,
            finish_reason: Some(FINISH_REASON_TOOL_CALLS.to_string()),
            message: Some(ChatMessage::assistant(None, Some(calls))),
        }],
    }
}

fn test_registry() -> StaticClientRegistry {
    let files = ClientState::new(
        "files",
        ExecutionConfig {
            is_code_mode_client: false,
            tools_to_execute: vec![WILDCARD.to_string()],
            tools_to_auto_execute: vec!["lookup".to_string()],
        },
    )
    .with_tool(ToolDefinition::function(
        "lookup",
        "look something up",
        json!({"type": "object"}),
    ))
    .with_tool(ToolDefinition::function(
        "dangerous",
        "needs a human",
        json!({"type": "object"}),
    ));

    let sandbox = ClientState::new(
        "serverA",
        ExecutionConfig {
            is_code_mode_client: true,
            tools_to_execute: vec![WILDCARD.to_string()],
            tools_to_auto_execute: vec!["toolY".to_string()],
        },
    );

    StaticClientRegistry::new()
        .with_client(files)
        .with_client(sandbox)
}

fn agent_loop(
    llm: Arc<MockLlmCaller>,
    executor: Arc<MockToolExecutor>,
) -> AgentLoop {
    AgentLoop::new(llm, executor, Arc::new(test_registry()))
}

fn request() -> ChatRequest {
    ChatRequest::new("openai", "gpt-4", vec![ChatMessage::user("do the thing")])
}

#[tokio::test]
async fn response_without_tool_calls_passes_through() {
    let llm = Arc::new(MockLlmCaller::new(vec![]));
    let executor = Arc::new(MockToolExecutor::new());
    let agent = agent_loop(llm.clone(), executor.clone());

    let initial = stop_response("all done");
    let result = agent
        .run(RequestContext::new(), &request(), initial.clone())
        .await
        .unwrap();

    assert_eq!(result, initial);
    assert_eq!(llm.call_count(), 0);
    assert!(executor.executed().is_empty());
}

#[tokio::test]
async fn auto_executable_call_feeds_next_upstream_request() {
    let llm = Arc::new(MockLlmCaller::new(vec![stop_response("the answer is 42")]));
    let executor = Arc::new(MockToolExecutor::new().with_output("lookup", "42"));
    let agent = agent_loop(llm.clone(), executor.clone());

    let initial = tool_call_response(vec![ToolCall::new("call_1", "lookup", "{}")]);
    let result = agent
        .run(RequestContext::new(), &request(), initial)
        .await
        .unwrap();

    assert_eq!(
        result.leading_content().and_then(|c| c.as_text()),
        Some("the answer is 42")
    );
    assert_eq!(llm.call_count(), 1);
    assert_eq!(executor.executed(), vec!["lookup".to_string()]);

    // The follow-up request must carry the original turn, the assistant
    // turn with the call, and the tool answer.
    let seen = llm.seen_requests();
    let input = &seen[0].input;
    assert_eq!(input.len(), 3);
    assert_eq!(input[0].role, "user");
    assert_eq!(input[1].role, "assistant");
    assert_eq!(input[1].tool_calls.as_ref().unwrap().len(), 1);
    assert!(input[2].is_tool_result());
    assert_eq!(input[2].tool_call_id.as_deref(), Some("call_1"));
    assert_eq!(
        input[2].content.as_ref().and_then(|c| c.as_text()),
        Some("42")
    );
}

#[tokio::test]
async fn depth_budget_exhaustion_errors_without_partial_response() {
    // The upstream keeps asking for the same auto-approved tool forever.
    let looping = || tool_call_response(vec![ToolCall::new("call_n", "lookup", "{}")]);
    let llm = Arc::new(MockLlmCaller::new(vec![looping(), looping(), looping()]));
    let executor = Arc::new(MockToolExecutor::new());
    let agent = agent_loop(llm.clone(), executor.clone()).with_max_depth(2);

    let result = agent
        .run(RequestContext::new(), &request(), looping())
        .await;

    match result {
        Err(AgentError::DepthExceeded { max_depth }) => assert_eq!(max_depth, 2),
        other => panic!("expected DepthExceeded, got {:?}", other),
    }
    assert_eq!(llm.call_count(), 2, "one upstream call per iteration");
}

#[tokio::test]
async fn mixed_batch_suspends_with_executed_outputs_and_pending_calls() {
    let llm = Arc::new(MockLlmCaller::new(vec![]));
    let executor = Arc::new(MockToolExecutor::new().with_output("lookup", "42"));
    let agent = agent_loop(llm.clone(), executor.clone());

    let initial = tool_call_response(vec![
        ToolCall::new("call_1", "lookup", "{}"),
        ToolCall::new("call_2", "mystery", "{}"),
    ]);
    let result = agent
        .run(RequestContext::new(), &request(), initial)
        .await
        .unwrap();

    let choice = result.first_choice().unwrap();
    assert_eq!(choice.finish_reason.as_deref(), Some(FINISH_REASON_STOP));

    let message = choice.message.as_ref().unwrap();
    let pending = message.tool_calls.as_ref().unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].name(), Some("mystery"));

    let text = message.content.as_ref().and_then(|c| c.as_text()).unwrap();
    assert!(text.contains(r#""lookup":"42""#));
    assert!(text.contains("Now I shall call these tools next..."));

    assert_eq!(llm.call_count(), 0, "suspension happens before re-asking");
    assert_eq!(executor.executed(), vec!["lookup".to_string()]);
}

#[tokio::test]
async fn suspension_reports_outputs_from_earlier_iterations_too() {
    // Iteration 1 executes lookup; iteration 2 mixes an auto call with an
    // unrecognized one. The suspension text must carry both outputs.
    let second = tool_call_response(vec![
        ToolCall::new("call_2", "listToolFiles", "{}"),
        ToolCall::new("call_3", "mystery", "{}"),
    ]);
    let llm = Arc::new(MockLlmCaller::new(vec![second]));
    let executor = Arc::new(
        MockToolExecutor::new()
            .with_output("lookup", "42")
            .with_output("listToolFiles", "files.d.ts"),
    );
    let agent = agent_loop(llm.clone(), executor.clone());

    let initial = tool_call_response(vec![ToolCall::new("call_1", "lookup", "{}")]);
    let result = agent
        .run(RequestContext::new(), &request(), initial)
        .await
        .unwrap();

    let text = result
        .leading_content()
        .and_then(|c| c.as_text())
        .unwrap();
    assert!(text.contains(r#""lookup":"42""#));
    assert!(text.contains(r#""listToolFiles":"files.d.ts""#));
    assert_eq!(llm.call_count(), 1);
}

#[tokio::test]
async fn code_mode_call_outside_allow_list_needs_approval() {
    let llm = Arc::new(MockLlmCaller::new(vec![]));
    let executor = Arc::new(MockToolExecutor::new());
    let agent = agent_loop(llm.clone(), executor.clone());

    // serverA only pre-approves toolY; the program invokes toolX.
    let code_call = ToolCall::new(
        "call_1",
        TOOL_EXECUTE_TOOL_CODE,
        json!({"code": "serverA.toolX()"}).to_string(),
    );
    let result = agent
        .run(RequestContext::new(), &request(), tool_call_response(vec![code_call]))
        .await
        .unwrap();

    let choice = result.first_choice().unwrap();
    assert_eq!(choice.finish_reason.as_deref(), Some(FINISH_REASON_STOP));
    let pending = choice
        .message
        .as_ref()
        .and_then(|m| m.tool_calls.as_ref())
        .unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].name(), Some(TOOL_EXECUTE_TOOL_CODE));
    assert!(executor.executed().is_empty());
}

#[tokio::test]
async fn code_mode_call_inside_allow_list_executes() {
    let llm = Arc::new(MockLlmCaller::new(vec![stop_response("done")]));
    let executor = Arc::new(MockToolExecutor::new());
    let agent = agent_loop(llm.clone(), executor.clone());

    let code_call = ToolCall::new(
        "call_1",
        TOOL_EXECUTE_TOOL_CODE,
        json!({"code": "serverA.toolY()"}).to_string(),
    );
    let result = agent
        .run(RequestContext::new(), &request(), tool_call_response(vec![code_call]))
        .await
        .unwrap();

    assert_eq!(
        result.leading_content().and_then(|c| c.as_text()),
        Some("done")
    );
    assert_eq!(executor.executed(), vec![TOOL_EXECUTE_TOOL_CODE.to_string()]);
}

#[tokio::test]
async fn every_call_in_a_batch_gets_a_result_even_on_failure() {
    let llm = Arc::new(MockLlmCaller::new(vec![stop_response("summary")]));
    let executor = Arc::new(
        MockToolExecutor::new()
            .with_output("lookup", "42")
            .with_failure("listToolFiles"),
    );
    let agent = agent_loop(llm.clone(), executor.clone());

    let initial = tool_call_response(vec![
        ToolCall::new("call_1", "lookup", "{}"),
        ToolCall::new("call_2", "listToolFiles", "{}"),
        ToolCall::new("call_3", "readToolFile", json!({"file": "a"}).to_string()),
    ]);
    agent
        .run(RequestContext::new(), &request(), initial)
        .await
        .unwrap();

    let seen = llm.seen_requests();
    let tool_turns: Vec<&ChatMessage> = seen[0]
        .input
        .iter()
        .filter(|m| m.is_tool_result())
        .collect();
    assert_eq!(tool_turns.len(), 3);

    let failed = tool_turns
        .iter()
        .find(|m| m.tool_call_id.as_deref() == Some("call_2"))
        .unwrap();
    assert_eq!(
        failed.content.as_ref().and_then(|c| c.as_text()),
        Some("Error executing tool listToolFiles: simulated failure")
    );
}

#[tokio::test]
async fn upstream_error_aborts_the_run() {
    // Queue is empty, so the follow-up call fails.
    let llm = Arc::new(MockLlmCaller::new(vec![]));
    let executor = Arc::new(MockToolExecutor::new());
    let agent = agent_loop(llm.clone(), executor.clone());

    let initial = tool_call_response(vec![ToolCall::new("call_1", "lookup", "{}")]);
    let result = agent.run(RequestContext::new(), &request(), initial).await;

    assert!(matches!(result, Err(AgentError::Upstream(_))));
}

#[test]
fn stop_finish_reason_is_terminal_even_with_calls_attached() {
    let mut response = tool_call_response(vec![ToolCall::new("call_1", "lookup", "{}")]);
    response.choices[0].finish_reason = Some(FINISH_REASON_STOP.to_string());

    assert!(!has_tool_calls(&response));
    assert!(extract_tool_calls(&response).is_empty());
}

#[test]
fn missing_finish_reason_falls_back_to_message_inspection() {
    let mut response = tool_call_response(vec![ToolCall::new("call_1", "lookup", "{}")]);
    response.choices[0].finish_reason = None;

    assert!(has_tool_calls(&response));
    assert_eq!(extract_tool_calls(&response).len(), 1);
}

#[test]
fn extract_gathers_calls_across_choices() {
    let mut response = tool_call_response(vec![ToolCall::new("call_1", "lookup", "{}")]);
    response.choices.push(ResponseChoice {
        index: 1,
        finish_reason: Some(FINISH_REASON_TOOL_CALLS.to_string()),
        message: Some(ChatMessage::assistant(
            None,
            Some(vec![ToolCall::new("call_2", "other", "{}")]),
        )),
    });

    let calls = extract_tool_calls(&response);
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[1].id, "call_2");
}
