//! Whether the loop should run another execution step.

use cartwright_core::error::AgentError;
use cartwright_core::message::{Conversation, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Continuation {
    /// The latest assistant message asks for invocations.
    Continue,
    /// The latest assistant message is the answer.
    Stop,
}

/// Inspect the most recent message.
///
/// Only an assistant message can be judged; anything else means the loop
/// was driven out of order.
pub fn next_step(conversation: &Conversation) -> Result<Continuation, AgentError> {
    let last = conversation
        .last()
        .ok_or_else(|| AgentError::InvalidState("conversation is empty".into()))?;

    if last.role != Role::Assistant {
        return Err(AgentError::InvalidState(format!(
            "last message is from {:?}, expected the assistant",
            last.role
        )));
    }

    Ok(if last.has_tool_calls() {
        Continuation::Continue
    } else {
        Continuation::Stop
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cartwright_core::message::{Message, MessageToolCall};

    #[test]
    fn plain_answer_stops() {
        let mut conv = Conversation::new();
        conv.push(Message::user("hi"));
        conv.push(Message::assistant("Hello! Looking for anything in particular?"));
        assert_eq!(next_step(&conv).unwrap(), Continuation::Stop);
    }

    #[test]
    fn invocations_continue() {
        let mut conv = Conversation::new();
        conv.push(Message::user("what's in my cart?"));
        conv.push(Message::assistant_with_tool_calls(
            "",
            vec![MessageToolCall {
                id: "c1".into(),
                name: "get_user_cart_data".into(),
                arguments: r#"{"user_id":"u1"}"#.into(),
            }],
        ));
        assert_eq!(next_step(&conv).unwrap(), Continuation::Continue);
    }

    #[test]
    fn non_assistant_tail_is_invalid() {
        let mut conv = Conversation::new();
        assert!(matches!(next_step(&conv), Err(AgentError::InvalidState(_))));

        conv.push(Message::user("hi"));
        assert!(matches!(next_step(&conv), Err(AgentError::InvalidState(_))));

        conv.push(Message::tool_result("c1", "{}"));
        assert!(matches!(next_step(&conv), Err(AgentError::InvalidState(_))));
    }
}
