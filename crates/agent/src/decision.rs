//! The decision step: one model call over the conversation so far.

use std::sync::Arc;

use cartwright_core::error::AgentError;
use cartwright_core::message::{Conversation, Message, Role};
use cartwright_core::provider::{Provider, ProviderRequest, ToolDefinition, Usage};
use tracing::debug;

/// Model settings for a decision.
#[derive(Debug, Clone)]
pub struct ModelSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

impl ModelSettings {
    pub fn from_config(config: &cartwright_config::AppConfig) -> Self {
        Self {
            model: config.effective_model().to_string(),
            temperature: config.default_temperature,
            max_tokens: Some(config.default_max_tokens),
        }
    }
}

/// The model's next move.
#[derive(Debug, Clone)]
pub struct Decision {
    /// The assistant message to append; it may carry invocations.
    pub message: Message,
    pub usage: Option<Usage>,
    /// Model that actually answered.
    pub model: String,
}

/// Calls the model with the system prompt in front of the conversation.
///
/// The system prompt is prepended to each request and never stored in the
/// conversation itself.
pub struct DecisionStep {
    provider: Arc<dyn Provider>,
    settings: ModelSettings,
    system_prompt: String,
}

impl DecisionStep {
    pub fn new(provider: Arc<dyn Provider>, settings: ModelSettings, system_prompt: impl Into<String>) -> Self {
        Self {
            provider,
            settings,
            system_prompt: system_prompt.into(),
        }
    }

    pub fn settings(&self) -> &ModelSettings {
        &self.settings
    }

    /// Build the request for the current conversation.
    pub fn request(&self, conversation: &Conversation, tools: &[ToolDefinition]) -> ProviderRequest {
        let mut messages = Vec::with_capacity(conversation.messages.len() + 1);
        if !self.system_prompt.is_empty() {
            messages.push(Message::system(&self.system_prompt));
        }
        messages.extend(conversation.messages.iter().filter(|m| m.role != Role::System).cloned());

        ProviderRequest {
            model: self.settings.model.clone(),
            messages,
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
            tools: tools.to_vec(),
            stop: vec![],
        }
    }

    /// Ask the model for the next assistant message.
    pub async fn decide(&self, conversation: &Conversation, tools: &[ToolDefinition]) -> Result<Decision, AgentError> {
        let request = self.request(conversation, tools);
        debug!(
            provider = self.provider.name(),
            model = %request.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Requesting decision"
        );

        let response = self.provider.complete(request).await?;
        if response.message.role != Role::Assistant {
            return Err(AgentError::ModelProtocolError(format!(
                "expected an assistant message, got {:?}",
                response.message.role
            )));
        }

        Ok(Decision {
            message: response.message,
            usage: response.usage,
            model: response.model,
        })
    }
}
