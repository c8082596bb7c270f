//! The control loop: decide, execute, repeat until the model answers.

use std::sync::Arc;

use cartwright_config::AppConfig;
use cartwright_core::error::AgentError;
use cartwright_core::message::Conversation;
use cartwright_core::provider::{Provider, Usage};
use cartwright_core::tool::ToolRegistry;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::continuation::{Continuation, next_step};
use crate::decision::{DecisionStep, ModelSettings};
use crate::execution::execute_batch;

/// Default cap on decision steps per run.
pub const DEFAULT_MAX_ITERATIONS: u32 = 10;

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopOutcome {
    /// The model produced an answer without invocations.
    Completed,
    /// The decision cap was reached while the model still wanted to act.
    MaxIterationsExceeded,
    /// The cancellation token fired.
    Cancelled,
}

/// Summary of one run. The conversation itself holds the full record.
#[derive(Debug, Clone, Serialize)]
pub struct LoopResult {
    pub outcome: LoopOutcome,
    /// The final assistant text, present when the run completed.
    pub answer: Option<String>,
    /// Decision steps performed.
    pub iterations: u32,
    /// Token usage summed over every decision.
    pub usage: Usage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopState {
    AwaitingDecision,
    ExecutingOperations,
    Terminated(LoopOutcome),
}

/// The tool-calling control loop.
pub struct AgentLoop {
    decision: DecisionStep,
    tools: Arc<ToolRegistry>,
    max_iterations: u32,
}

impl AgentLoop {
    /// Create a new agent loop.
    pub fn new(
        provider: Arc<dyn Provider>,
        settings: ModelSettings,
        tools: Arc<ToolRegistry>,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            decision: DecisionStep::new(provider, settings, system_prompt),
            tools,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    /// Model settings and iteration cap taken from the loaded config.
    pub fn from_config(
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
        config: &AppConfig,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self::new(provider, ModelSettings::from_config(config), tools, system_prompt)
            .with_max_iterations(config.agent.max_iterations)
    }

    /// Set the maximum number of decision steps per run.
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max.max(1);
        self
    }

    /// Run the loop without external cancellation.
    pub async fn process(&self, conversation: &mut Conversation) -> Result<LoopResult, AgentError> {
        self.run(conversation, &CancellationToken::new()).await
    }

    /// Drive the conversation until the model answers, the cap is hit, or
    /// `cancel` fires.
    ///
    /// Messages are only ever appended. Model failures abort the run and
    /// leave everything appended so far in place.
    pub async fn run(
        &self,
        conversation: &mut Conversation,
        cancel: &CancellationToken,
    ) -> Result<LoopResult, AgentError> {
        if !conversation.has_user_message() {
            return Err(AgentError::InvalidState(
                "conversation has no user message".into(),
            ));
        }

        info!(
            conversation_id = %conversation.id,
            messages = conversation.messages.len(),
            model = %self.decision.settings().model,
            "Processing conversation"
        );

        let definitions = self.tools.definitions();
        let mut iterations = 0u32;
        let mut usage = Usage::default();
        let mut state = LoopState::AwaitingDecision;

        let outcome = loop {
            state = match state {
                LoopState::AwaitingDecision => {
                    if cancel.is_cancelled() {
                        info!(conversation_id = %conversation.id, iterations, "Agent loop cancelled");
                        LoopState::Terminated(LoopOutcome::Cancelled)
                    } else if iterations >= self.max_iterations {
                        warn!(
                            conversation_id = %conversation.id,
                            iterations,
                            max = self.max_iterations,
                            "Max iterations reached"
                        );
                        LoopState::Terminated(LoopOutcome::MaxIterationsExceeded)
                    } else {
                        iterations += 1;
                        debug!(conversation_id = %conversation.id, iteration = iterations, "Agent loop iteration");

                        let decision = self.decision.decide(conversation, &definitions).await?;
                        if let Some(reported) = &decision.usage {
                            usage.accumulate(reported);
                        }
                        conversation.push(decision.message);

                        match next_step(conversation)? {
                            Continuation::Continue => LoopState::ExecutingOperations,
                            Continuation::Stop => LoopState::Terminated(LoopOutcome::Completed),
                        }
                    }
                }
                LoopState::ExecutingOperations => {
                    let calls = conversation
                        .last()
                        .map(|m| m.tool_calls.clone())
                        .unwrap_or_default();
                    debug!(tool_count = calls.len(), "Executing tool calls");

                    let report = execute_batch(&self.tools, &calls, cancel).await;
                    conversation.extend(report.results);

                    if report.cancelled {
                        info!(conversation_id = %conversation.id, iterations, "Agent loop cancelled mid-batch");
                        LoopState::Terminated(LoopOutcome::Cancelled)
                    } else {
                        LoopState::AwaitingDecision
                    }
                }
                LoopState::Terminated(outcome) => break outcome,
            };
        };

        let answer = match outcome {
            LoopOutcome::Completed => conversation.last().map(|m| m.content.clone()),
            _ => None,
        };

        info!(
            conversation_id = %conversation.id,
            ?outcome,
            iterations,
            total_tokens = usage.total_tokens,
            "Agent loop finished"
        );

        Ok(LoopResult {
            outcome,
            answer,
            iterations,
            usage,
        })
    }
}
