//! Store knowledge-base lookup: `rag_tool`.
//!
//! The query is embedded through the configured provider and matched
//! against a Pinecone-compatible vector index. The index connection is a
//! [`LazyResource`]; when it cannot be set up, the tool keeps answering
//! with fallback text instead of failing the conversation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cartwright_config::KnowledgeConfig;
use cartwright_core::error::{ResourceError, ToolError};
use cartwright_core::provider::{EmbeddingRequest, Provider};
use cartwright_core::resource::{Connector, LazyResource};
use cartwright_core::tool::{Tool, ToolResult};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::args::parse_args;

/// Served once setup has failed, on every later call.
pub const UNAVAILABLE_TEXT: &str = "I'm sorry, but I cannot access our knowledge database right now due to a technical issue. However, I can still assist you with:

🛋️ **Product Information:**
- Browse our furniture collections by room (bedroom, living room, dining room, office)
- Search for specific items like beds, sofas, tables, chairs
- View product details and pricing

🛒 **Shopping Assistance:**
- Add items to your cart
- Manage your cart contents
- Navigate to different store sections

👤 **Account Management:**
- View and update your profile
- Check your cart status

📞 **For store policies, delivery info, warranties, or customization options:**
Please contact our customer support team directly - they'll have all the detailed information you need!

**How can I help you shop for furniture today?** Try asking \"show me bedroom furniture\" or \"find dining tables\".";

pub const NOT_FOUND_TEXT: &str =
    "I couldn't find specific information about that in our knowledge base, but I'd be happy to help you in other ways!";

pub const SEARCH_FAILED_TEXT: &str =
    "I encountered a technical issue while searching our knowledge base. But I'm still here to help you shop!";

fn setup_failed_text(error: &ResourceError) -> String {
    format!(
        "I'm sorry, but I cannot access our knowledge database right now. The system encountered an error: {error}. \
         I can still help you with product searches and navigation. Please ask about specific products or let me know how else I can assist you."
    )
}

/// A connected vector index.
pub struct KnowledgeIndex {
    client: reqwest::Client,
    host: String,
    api_key: String,
    namespace: Option<String>,
    top_k: u32,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<Match>,
}

#[derive(Debug, Deserialize)]
struct Match {
    #[serde(default)]
    metadata: Option<MatchMetadata>,
}

#[derive(Debug, Deserialize)]
struct MatchMetadata {
    #[serde(default)]
    text: Option<String>,
}

impl KnowledgeIndex {
    /// Nearest-neighbour search; returns the text of each match, best first.
    pub async fn query(&self, vector: Vec<f32>) -> Result<Vec<String>, reqwest::Error> {
        let mut body = json!({
            "vector": vector,
            "topK": self.top_k,
            "includeMetadata": true,
        });
        if let Some(namespace) = &self.namespace {
            body["namespace"] = json!(namespace);
        }

        let response: QueryResponse = self
            .client
            .post(format!("{}/query", self.host))
            .header("Api-Key", &self.api_key)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(response
            .matches
            .into_iter()
            .filter_map(|m| m.metadata.and_then(|md| md.text))
            .collect())
    }
}

/// Builds the index client once credentials and host are known.
pub struct KnowledgeConnector {
    config: KnowledgeConfig,
}

impl KnowledgeConnector {
    pub fn new(config: KnowledgeConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Connector for KnowledgeConnector {
    type Handle = KnowledgeIndex;

    fn resource_name(&self) -> &str {
        "knowledge index"
    }

    async fn connect(&self) -> Result<KnowledgeIndex, ResourceError> {
        let failed = |reason: &str| ResourceError::ConnectFailed {
            resource: "knowledge index".into(),
            reason: reason.into(),
        };

        let api_key = self
            .config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| failed("PINECONE_API_KEY is not set"))?;

        let host = self
            .config
            .index_host
            .as_deref()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| failed("PINECONE_INDEX_HOST is not set"))?;
        let host = if host.starts_with("http://") || host.starts_with("https://") {
            host.trim_end_matches('/').to_string()
        } else {
            format!("https://{}", host.trim_end_matches('/'))
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .build()
            .map_err(|e| failed(&e.to_string()))?;

        Ok(KnowledgeIndex {
            client,
            host,
            api_key,
            namespace: self.config.namespace.clone(),
            top_k: self.config.top_k,
        })
    }
}

#[derive(Debug, Deserialize)]
struct RagArgs {
    query: String,
}

/// `rag_tool`: answers store questions (history, policies, delivery,
/// warranty, customization) from the knowledge base.
pub struct RagTool {
    index: Arc<LazyResource<KnowledgeConnector>>,
    embedder: Arc<dyn Provider>,
    embedding_model: String,
    dimensions: usize,
    min_chars: usize,
}

impl RagTool {
    pub fn new(
        index: Arc<LazyResource<KnowledgeConnector>>,
        embedder: Arc<dyn Provider>,
        config: &KnowledgeConfig,
    ) -> Self {
        Self {
            index,
            embedder,
            embedding_model: config.embedding_model.clone(),
            dimensions: config.embedding_dimensions,
            min_chars: config.min_chars,
        }
    }

    async fn search(&self, index: &KnowledgeIndex, query: &str) -> Result<String, String> {
        let embedded = self
            .embedder
            .embed(EmbeddingRequest {
                model: self.embedding_model.clone(),
                inputs: vec![query.to_string()],
                dimensions: Some(self.dimensions),
            })
            .await
            .map_err(|e| e.to_string())?;

        let vector = embedded
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| "embedding response was empty".to_string())?;
        if vector.len() != self.dimensions {
            return Err(format!(
                "embedding has {} dimensions but the index expects {}",
                vector.len(),
                self.dimensions
            ));
        }

        let passages = index.query(vector).await.map_err(|e| e.to_string())?;
        debug!(matches = passages.len(), "Knowledge index answered");
        Ok(passages.join("\n\n"))
    }
}

#[async_trait]
impl Tool for RagTool {
    fn name(&self) -> &str {
        "rag_tool"
    }

    fn description(&self) -> &str {
        "Look up store knowledge: company history and founder, policies, delivery, warranty, \
         customization, furniture care and other FAQs. Always use this before saying you \
         don't know something about the store."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "The shopper's question" }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, arguments: Value) -> Result<ToolResult, ToolError> {
        let args: RagArgs = parse_args(self.name(), arguments)?;

        let acquired = self.index.acquire().await;
        let index = match acquired.handle {
            Ok(index) => index,
            Err(e) if acquired.attempted => {
                warn!(error = %e, "Knowledge index unavailable");
                return Ok(ToolResult::failure(setup_failed_text(&e)));
            }
            Err(_) => return Ok(ToolResult::failure(UNAVAILABLE_TEXT)),
        };

        match self.search(&index, &args.query).await {
            Ok(text) if text.trim().chars().count() < self.min_chars => Ok(ToolResult::text(NOT_FOUND_TEXT)),
            Ok(text) => Ok(ToolResult::text(text)),
            Err(reason) => {
                warn!(error = %reason, "Knowledge search failed");
                Ok(ToolResult::failure(SEARCH_FAILED_TEXT))
            }
        }
    }
}
