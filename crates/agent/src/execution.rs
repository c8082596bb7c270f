//! The execution step: run every invocation of one assistant message.
//!
//! Invocations run one at a time in issuance order. Whatever happens to an
//! individual invocation (unknown name, bad arguments, downstream failure)
//! ends up as a tool result message the model can read; the step itself
//! never fails.

use std::time::Instant;

use cartwright_core::error::ToolError;
use cartwright_core::message::{Message, MessageToolCall};
use cartwright_core::tool::{ToolCall, ToolRegistry};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Results of one batch, in invocation order.
#[derive(Debug, Default)]
pub struct ExecutionReport {
    pub results: Vec<Message>,
    /// Invocations that ran and succeeded.
    pub succeeded: usize,
    /// Set when the token fired before every invocation could run.
    pub cancelled: bool,
}

/// Text of the result message for a failed invocation.
pub fn error_text(tool_name: &str, error: &ToolError) -> String {
    format!("Error executing tool {tool_name}: {error}")
}

fn cancelled_text(tool_name: &str) -> String {
    format!("Error executing tool {tool_name}: cancelled before it ran")
}

/// Decode the model's argument string.
///
/// An empty string means "no arguments".
pub fn parse_arguments(call: &MessageToolCall) -> Result<Value, ToolError> {
    if call.arguments.trim().is_empty() {
        return Ok(Value::Object(serde_json::Map::new()));
    }
    serde_json::from_str(&call.arguments)
        .map_err(|e| ToolError::InvalidArguments(format!("{}: {e}", call.name)))
}

/// Run one invocation and produce its result message.
async fn run_one(registry: &ToolRegistry, call: &MessageToolCall) -> (Message, bool) {
    let arguments = match parse_arguments(call) {
        Ok(arguments) => arguments,
        Err(e) => {
            warn!(tool = %call.name, call_id = %call.id, error = %e, "Could not decode tool arguments");
            return (Message::tool_result(&call.id, error_text(&call.name, &e)), false);
        }
    };

    let invocation = ToolCall {
        id: call.id.clone(),
        name: call.name.clone(),
        arguments,
    };

    let start = Instant::now();
    let outcome = registry.execute(&invocation).await;
    let duration_ms = start.elapsed().as_millis() as u64;

    match outcome {
        Ok(result) => {
            info!(
                tool = %call.name,
                call_id = %call.id,
                success = result.success,
                duration_ms,
                "Tool executed"
            );
            (Message::tool_result(&call.id, result.output), result.success)
        }
        Err(e) => {
            warn!(tool = %call.name, call_id = %call.id, duration_ms, error = %e, "Tool execution failed");
            (Message::tool_result(&call.id, error_text(&call.name, &e)), false)
        }
    }
}

/// Execute a batch of invocations against the registry.
///
/// The token is checked before each invocation. Once it fires, the
/// remaining invocations are answered with a cancellation notice instead
/// of being run, so every invocation still gets exactly one result.
pub async fn execute_batch(
    registry: &ToolRegistry,
    calls: &[MessageToolCall],
    cancel: &CancellationToken,
) -> ExecutionReport {
    let mut report = ExecutionReport {
        results: Vec::with_capacity(calls.len()),
        ..ExecutionReport::default()
    };

    for call in calls {
        if report.cancelled || cancel.is_cancelled() {
            report.cancelled = true;
            report.results.push(Message::tool_result(&call.id, cancelled_text(&call.name)));
            continue;
        }

        let (message, success) = run_one(registry, call).await;
        if success {
            report.succeeded += 1;
        }
        report.results.push(message);
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use cartwright_core::message::Role;
    use cartwright_core::tool::{Tool, ToolResult};
    use serde_json::json;

    struct Echo;

    #[async_trait]
    impl Tool for Echo {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echo the text argument"
        }
        fn parameters_schema(&self) -> Value {
            json!({"type": "object", "properties": {"text": {"type": "string"}}, "required": ["text"]})
        }
        async fn execute(&self, arguments: Value) -> Result<ToolResult, ToolError> {
            let text = arguments["text"]
                .as_str()
                .ok_or_else(|| ToolError::InvalidArguments("echo: missing field `text`".into()))?;
            Ok(ToolResult::text(text))
        }
    }

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(Echo));
        registry
    }

    fn call(id: &str, name: &str, arguments: &str) -> MessageToolCall {
        MessageToolCall {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    #[tokio::test]
    async fn results_follow_issuance_order() {
        let calls = vec![
            call("c1", "echo", r#"{"text":"first"}"#),
            call("c2", "echo", r#"{"text":"second"}"#),
            call("c3", "echo", r#"{"text":"third"}"#),
        ];
        let report = execute_batch(&registry(), &calls, &CancellationToken::new()).await;

        assert_eq!(report.results.len(), 3);
        assert_eq!(report.succeeded, 3);
        for (message, expected) in report.results.iter().zip(&calls) {
            assert_eq!(message.role, Role::Tool);
            assert_eq!(message.tool_call_id.as_deref(), Some(expected.id.as_str()));
        }
        assert_eq!(report.results[1].content, "second");
    }

    #[tokio::test]
    async fn unknown_tool_does_not_stop_the_batch() {
        let calls = vec![
            call("c1", "nonexistent_op", "{}"),
            call("c2", "echo", r#"{"text":"still runs"}"#),
        ];
        let report = execute_batch(&registry(), &calls, &CancellationToken::new()).await;

        assert_eq!(report.results.len(), 2);
        assert_eq!(
            report.results[0].content,
            "Error executing tool nonexistent_op: Tool not found: nonexistent_op"
        );
        assert_eq!(report.results[1].content, "still runs");
        assert_eq!(report.succeeded, 1);
    }

    #[tokio::test]
    async fn malformed_arguments_become_error_result() {
        let calls = vec![call("c1", "echo", "{not json")];
        let report = execute_batch(&registry(), &calls, &CancellationToken::new()).await;

        assert_eq!(report.results.len(), 1);
        assert!(report.results[0].content.starts_with("Error executing tool echo: Invalid tool arguments"));
    }

    #[tokio::test]
    async fn tool_error_is_reported_to_the_model() {
        let calls = vec![call("c1", "echo", "")];
        let report = execute_batch(&registry(), &calls, &CancellationToken::new()).await;

        assert_eq!(
            report.results[0].content,
            "Error executing tool echo: Invalid tool arguments: echo: missing field `text`"
        );
    }

    #[tokio::test]
    async fn cancelled_batch_still_answers_every_call() {
        let token = CancellationToken::new();
        token.cancel();
        let calls = vec![call("c1", "echo", r#"{"text":"a"}"#), call("c2", "echo", r#"{"text":"b"}"#)];
        let report = execute_batch(&registry(), &calls, &token).await;

        assert!(report.cancelled);
        assert_eq!(report.succeeded, 0);
        assert_eq!(report.results.len(), 2);
        assert!(report.results.iter().all(|m| m.content.contains("cancelled")));
        assert_eq!(report.results[1].tool_call_id.as_deref(), Some("c2"));
    }

    #[test]
    fn empty_arguments_are_an_empty_object() {
        let parsed = parse_arguments(&call("c1", "get_user_cart_data", "  ")).unwrap();
        assert_eq!(parsed, json!({}));
    }
}
