//! Configuration loading, validation, and management for Cartwright.
//!
//! Loads configuration from `~/.cartwright/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.cartwright/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default LLM provider
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Default model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Default temperature
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Default max tokens per LLM response
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    /// Agent loop settings
    #[serde(default)]
    pub agent: AgentConfig,

    /// Store backend REST service
    #[serde(default)]
    pub backend: BackendConfig,

    /// Product catalog database
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Knowledge-base retrieval
    #[serde(default)]
    pub knowledge: KnowledgeConfig,

    /// System prompt loading
    #[serde(default)]
    pub identity: IdentityConfig,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

fn default_provider() -> String {
    "gemini".into()
}
fn default_model() -> String {
    "gemini-2.0-flash-lite".into()
}
fn default_temperature() -> f32 {
    0.5
}
fn default_max_tokens() -> u32 {
    800
}

fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_provider", &self.default_provider)
            .field("default_model", &self.default_model)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("agent", &self.agent)
            .field("backend", &self.backend)
            .field("catalog", &self.catalog)
            .field("knowledge", &self.knowledge)
            .field("identity", &self.identity)
            .field("providers", &self.providers)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum decision steps per user turn
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
}

fn default_max_iterations() -> u32 {
    10
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_backend_url")]
    pub base_url: String,

    /// Timeout for the session validation call
    #[serde(default = "default_auth_timeout")]
    pub auth_timeout_secs: u64,

    /// Timeout for profile and cart calls
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_backend_url() -> String {
    "http://localhost:8000".into()
}
fn default_auth_timeout() -> u64 {
    30
}
fn default_request_timeout() -> u64 {
    60
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_backend_url(),
            auth_timeout_secs: default_auth_timeout(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// PostgreSQL connection string
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,

    /// Connections older than this are recycled
    #[serde(default = "default_max_lifetime")]
    pub max_lifetime_secs: u64,

    /// Server-side `statement_timeout` applied to every connection
    #[serde(default = "default_statement_timeout")]
    pub statement_timeout_ms: u64,

    /// Tables a query must reference (at least one)
    #[serde(default = "default_allowed_tables")]
    pub allowed_tables: Vec<String>,

    /// Tables a query must never mention
    #[serde(default = "default_forbidden_tables")]
    pub forbidden_tables: Vec<String>,
}

fn default_max_connections() -> u32 {
    2
}
fn default_acquire_timeout() -> u64 {
    5
}
fn default_max_lifetime() -> u64 {
    1800
}
fn default_statement_timeout() -> u64 {
    10_000
}
fn default_allowed_tables() -> Vec<String> {
    vec!["products".into(), "featured_products".into()]
}
fn default_forbidden_tables() -> Vec<String> {
    ["users", "auth", "profiles", "orders", "payments", "admin"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            max_connections: default_max_connections(),
            acquire_timeout_secs: default_acquire_timeout(),
            max_lifetime_secs: default_max_lifetime(),
            statement_timeout_ms: default_statement_timeout(),
            allowed_tables: default_allowed_tables(),
            forbidden_tables: default_forbidden_tables(),
        }
    }
}

impl std::fmt::Debug for CatalogConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogConfig")
            .field("database_url", &redact(&self.database_url))
            .field("max_connections", &self.max_connections)
            .field("acquire_timeout_secs", &self.acquire_timeout_secs)
            .field("max_lifetime_secs", &self.max_lifetime_secs)
            .field("statement_timeout_ms", &self.statement_timeout_ms)
            .field("allowed_tables", &self.allowed_tables)
            .field("forbidden_tables", &self.forbidden_tables)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    /// Vector index host, e.g. `https://store-rag-abc123.svc.pinecone.io`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_host: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Vector size the index was built with. Requested from the embedding
    /// model and checked before every query.
    #[serde(default = "default_embedding_dimensions")]
    pub embedding_dimensions: usize,

    #[serde(default = "default_top_k")]
    pub top_k: u32,

    /// Retrieved text shorter than this counts as "nothing found"
    #[serde(default = "default_min_chars")]
    pub min_chars: usize,

    #[serde(default = "default_knowledge_timeout")]
    pub timeout_secs: u64,
}

fn default_embedding_model() -> String {
    "text-embedding-004".into()
}
fn default_embedding_dimensions() -> usize {
    384
}
fn default_top_k() -> u32 {
    5
}
fn default_min_chars() -> usize {
    20
}
fn default_knowledge_timeout() -> u64 {
    30
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            index_host: None,
            api_key: None,
            namespace: None,
            embedding_model: default_embedding_model(),
            embedding_dimensions: default_embedding_dimensions(),
            top_k: default_top_k(),
            min_chars: default_min_chars(),
            timeout_secs: default_knowledge_timeout(),
        }
    }
}

impl std::fmt::Debug for KnowledgeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnowledgeConfig")
            .field("index_host", &self.index_host)
            .field("api_key", &redact(&self.api_key))
            .field("namespace", &self.namespace)
            .field("embedding_model", &self.embedding_model)
            .field("embedding_dimensions", &self.embedding_dimensions)
            .field("top_k", &self.top_k)
            .field("min_chars", &self.min_chars)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Override the system prompt entirely (skips file loading)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt_override: Option<String>,

    /// Load the system prompt template from this file instead of the built-in one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt_file: Option<String>,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.cartwright/config.toml).
    ///
    /// Environment variables take precedence over the file; see
    /// [`AppConfig::apply_env_overrides`].
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides using `lookup` to read variables.
    ///
    /// - API key: `CARTWRIGHT_API_KEY`, `GOOGLE_API_KEY`, `OPENROUTER_API_KEY`,
    ///   `OPENAI_API_KEY` (first found, only when the file sets none)
    /// - `CARTWRIGHT_PROVIDER`, `CARTWRIGHT_MODEL`
    /// - `BACKEND_BASE_URL`
    /// - `DATABASE_URL`, falling back to `SUPABASE_URL`
    /// - `PINECONE_API_KEY`, `PINECONE_INDEX_HOST`
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.api_key.is_none() {
            self.api_key = ["CARTWRIGHT_API_KEY", "GOOGLE_API_KEY", "OPENROUTER_API_KEY", "OPENAI_API_KEY"]
                .iter()
                .find_map(|key| lookup(key));
        }

        if let Some(provider) = lookup("CARTWRIGHT_PROVIDER") {
            self.default_provider = provider;
        }
        if let Some(model) = lookup("CARTWRIGHT_MODEL") {
            self.default_model = model;
        }
        if let Some(url) = lookup("BACKEND_BASE_URL") {
            self.backend.base_url = url;
        }
        if let Some(url) = lookup("DATABASE_URL").or_else(|| lookup("SUPABASE_URL")) {
            self.catalog.database_url = Some(url);
        }
        if let Some(key) = lookup("PINECONE_API_KEY") {
            self.knowledge.api_key = Some(key);
        }
        if let Some(host) = lookup("PINECONE_INDEX_HOST") {
            self.knowledge.index_host = Some(host);
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".cartwright")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.default_temperature < 0.0 || self.default_temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.agent.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_iterations must be at least 1".into(),
            ));
        }

        if !self.backend.base_url.starts_with("http://") && !self.backend.base_url.starts_with("https://") {
            return Err(ConfigError::ValidationError(format!(
                "backend.base_url must be an http(s) URL, got '{}'",
                self.backend.base_url
            )));
        }

        if self.catalog.allowed_tables.is_empty() {
            return Err(ConfigError::ValidationError(
                "catalog.allowed_tables must not be empty".into(),
            ));
        }

        if self.knowledge.embedding_dimensions == 0 {
            return Err(ConfigError::ValidationError(
                "knowledge.embedding_dimensions must be at least 1".into(),
            ));
        }

        if self.knowledge.top_k == 0 || self.knowledge.top_k > 100 {
            return Err(ConfigError::ValidationError(
                "knowledge.top_k must be between 1 and 100".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// The model to ask for: the default provider's own `default_model`
    /// when its table sets one, else the top-level `default_model`.
    pub fn effective_model(&self) -> &str {
        self.providers
            .get(&self.default_provider)
            .and_then(|p| p.default_model.as_deref())
            .unwrap_or(&self.default_model)
    }

    /// A copy with every secret replaced, for display.
    pub fn redacted(&self) -> Self {
        let mask = |s: &Option<String>| s.as_ref().map(|_| "[REDACTED]".to_string());
        let mut copy = self.clone();
        copy.api_key = mask(&self.api_key);
        copy.catalog.database_url = mask(&self.catalog.database_url);
        copy.knowledge.api_key = mask(&self.knowledge.api_key);
        for provider in copy.providers.values_mut() {
            provider.api_key = mask(&provider.api_key);
        }
        copy
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            default_model: default_model(),
            default_temperature: default_temperature(),
            default_max_tokens: default_max_tokens(),
            agent: AgentConfig::default(),
            backend: BackendConfig::default(),
            catalog: CatalogConfig::default(),
            knowledge: KnowledgeConfig::default(),
            identity: IdentityConfig::default(),
            providers: HashMap::new(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
