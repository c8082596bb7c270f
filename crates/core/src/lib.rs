//! # Cartwright Core
//!
//! Domain types, traits, and error definitions for the Cartwright shopping
//! assistant. This crate defines the model that every other crate
//! implements against: messages and conversations, the LLM provider
//! abstraction, the operation (tool) abstraction, and lazily connected
//! external resources.
//!
//! All crates depend inward on core; implementations live in their own
//! crates so they can be swapped or mocked in tests.

pub mod error;
pub mod identity;
pub mod message;
pub mod provider;
pub mod resource;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{AgentError, ProviderError, ResourceError, ToolError};
pub use identity::{Identity, PromptSources};
pub use message::{Conversation, ConversationId, Message, MessageToolCall, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition, Usage};
pub use resource::{Acquired, Connector, LazyResource};
pub use tool::{Tool, ToolCall, ToolRegistry, ToolResult};
