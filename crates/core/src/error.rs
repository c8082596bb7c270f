//! Error types for the Cartwright domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum.

use thiserror::Error;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    /// The provider answered, but the answer could not be understood.
    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Error)]
pub enum ToolError {
    /// The model asked for an operation that is not registered.
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}

/// Errors that abort a run of the agent loop.
///
/// Operation failures never show up here; they are turned into tool
/// result messages so the model can react to them.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Model unavailable: {0}")]
    ModelUnavailable(ProviderError),

    #[error("Model protocol error: {0}")]
    ModelProtocolError(String),

    #[error("Invalid conversation state: {0}")]
    InvalidState(String),
}

impl From<ProviderError> for AgentError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::InvalidResponse(reason) => Self::ModelProtocolError(reason),
            other => Self::ModelUnavailable(other),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum ResourceError {
    #[error("Failed to connect to {resource}: {reason}")]
    ConnectFailed { resource: String, reason: String },

    #[error("Resource {0} has been shut down")]
    Closed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = ProviderError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        };
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn unknown_tool_displays_name() {
        let err = ToolError::NotFound("checkout".into());
        assert_eq!(err.to_string(), "Tool not found: checkout");
    }

    #[test]
    fn network_failure_is_model_unavailable() {
        let err: AgentError = ProviderError::Network("connection reset".into()).into();
        assert!(matches!(err, AgentError::ModelUnavailable(_)));
    }

    #[test]
    fn malformed_response_is_protocol_error() {
        let err: AgentError = ProviderError::InvalidResponse("No choices in response".into()).into();
        assert!(matches!(err, AgentError::ModelProtocolError(ref m) if m.contains("No choices")));
    }
}
