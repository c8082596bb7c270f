//! End-to-end tests: scripted model, real store operations, mocked backend.
//!
//! Each test drives the full loop from a tagged shopper message through
//! the registry and the REST adapters to the final answer.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use cartwright_agent::{AgentLoop, LoopOutcome};
use cartwright_config::AppConfig;
use cartwright_core::error::ProviderError;
use cartwright_core::identity::Identity;
use cartwright_core::message::{Conversation, Message, MessageToolCall, Role};
use cartwright_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use cartwright_tools::catalog::{CatalogError, Row};
use cartwright_tools::{CatalogQuery, StoreOperation, ToolContext, build_registry};
use serde_json::{Value, json};
use wiremock::matchers::{any, body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Mock Provider ────────────────────────────────────────────────────────

/// A mock provider that returns scripted responses in sequence.
struct ScriptedProvider {
    responses: Mutex<VecDeque<ProviderResponse>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    fn new(responses: Vec<ProviderResponse>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ProviderError::InvalidResponse("script exhausted".into()))
    }
}

fn text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: Some(Usage { prompt_tokens: 10, completion_tokens: 5, total_tokens: 15 }),
        model: "e2e-model".into(),
    }
}

fn tool_response(calls: &[(&str, &str, Value)]) -> ProviderResponse {
    let tool_calls = calls
        .iter()
        .map(|(id, name, args)| MessageToolCall {
            id: (*id).into(),
            name: (*name).into(),
            arguments: args.to_string(),
        })
        .collect();
    ProviderResponse {
        message: Message::assistant_with_tool_calls("", tool_calls),
        usage: Some(Usage { prompt_tokens: 30, completion_tokens: 8, total_tokens: 38 }),
        model: "e2e-model".into(),
    }
}

// ── Catalog stub ─────────────────────────────────────────────────────────

struct StubCatalog(Vec<Row>);

#[async_trait]
impl CatalogQuery for StubCatalog {
    async fn fetch_rows(&self, _sql: &str) -> Result<Vec<Row>, CatalogError> {
        Ok(self.0.clone())
    }
}

fn catalog_rows() -> Vec<Row> {
    vec![
        serde_json::from_str(
            r#"{"product_id": "7d3f0c2e-1b9a-4c55-9a51-3f6a2b8e4d10", "name": "King Size Bed", "price": 52000, "slug": "king-size-bed"}"#,
        )
        .unwrap(),
    ]
}

// ── Harness ──────────────────────────────────────────────────────────────

struct Harness {
    agent: AgentLoop,
    provider: Arc<ScriptedProvider>,
    ctx: ToolContext,
}

fn harness(backend: &MockServer, script: Vec<ProviderResponse>) -> Harness {
    let mut config = AppConfig::default();
    config.backend.base_url = backend.uri();

    let provider = ScriptedProvider::new(script);
    let ctx = ToolContext::from_config(&config, provider.clone())
        .with_catalog(Arc::new(StubCatalog(catalog_rows())));
    let tools = Arc::new(build_registry(&ctx));
    let agent = AgentLoop::from_config(provider.clone(), tools, &config, Identity::default().system_prompt);

    Harness { agent, provider, ctx }
}

fn tool_messages(conv: &Conversation) -> Vec<&Message> {
    conv.messages.iter().filter(|m| m.role == Role::Tool).collect()
}

// ── Scenarios ────────────────────────────────────────────────────────────

#[tokio::test]
async fn cart_read_without_session_is_narrated() {
    let backend = MockServer::start().await;
    Mock::given(any()).respond_with(ResponseTemplate::new(500)).expect(0).mount(&backend).await;

    let h = harness(
        &backend,
        vec![
            tool_response(&[("call_1", "get_user_cart_data", json!({"user_id": "null"}))]),
            text_response("🔐 Please log in to view your cart."),
        ],
    );

    let mut conv = Conversation::new();
    conv.push(Message::from_shopper(None, "what's in my cart?"));
    let result = h.agent.process(&mut conv).await.unwrap();

    assert_eq!(result.outcome, LoopOutcome::Completed);
    assert_eq!(result.answer.as_deref(), Some("🔐 Please log in to view your cart."));

    let tools = tool_messages(&conv);
    assert_eq!(tools.len(), 1);
    let payload: Value = serde_json::from_str(&tools[0].content).unwrap();
    assert_eq!(payload["success"], false);
    assert!(payload["message"].as_str().unwrap().starts_with("No user session found"));

    // The model saw the tagged message and the system prompt first
    let requests = h.provider.requests.lock().unwrap();
    assert_eq!(requests[0].messages[0].role, Role::System);
    assert!(requests[0].messages[1].content.starts_with("[User ID: null]"));
    assert_eq!(requests[0].tools.len(), StoreOperation::ALL.len());
}

#[tokio::test]
async fn add_to_cart_posts_and_returns_cart() {
    let backend = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/cart/user/u1/items"))
        .and(body_json(json!({"product_id": "p1", "quantity": 1})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{"cart_item_id": "ci-9", "product_id": "p1", "quantity": 1}]
        })))
        .expect(1)
        .mount(&backend)
        .await;

    let h = harness(
        &backend,
        vec![
            tool_response(&[(
                "call_1",
                "add_item_to_cart",
                json!({"user_id": "u1", "product_id": "p1", "quantity": 1}),
            )]),
            text_response("✅ Added to your cart."),
        ],
    );

    let mut conv = Conversation::new();
    conv.push(Message::from_shopper(Some("u1"), "add it to my cart"));
    let result = h.agent.process(&mut conv).await.unwrap();

    assert_eq!(result.outcome, LoopOutcome::Completed);
    assert_eq!(h.provider.calls(), 2);
    assert_eq!(result.usage.total_tokens, 38 + 15);

    let payload: Value = serde_json::from_str(&tool_messages(&conv)[0].content).unwrap();
    assert_eq!(payload["success"], true);
    assert_eq!(payload["message"], "Successfully added 1 item(s) to your cart.");
    assert_eq!(payload["cart_data"]["items"][0]["cart_item_id"], "ci-9");
}

#[tokio::test]
async fn unknown_operation_does_not_end_the_run() {
    let backend = MockServer::start().await;
    let h = harness(
        &backend,
        vec![
            tool_response(&[("call_1", "nonexistent_op", json!({}))]),
            text_response("Sorry, I can't do that, but I can help you browse."),
        ],
    );

    let mut conv = conversation("do the impossible");
    let result = h.agent.process(&mut conv).await.unwrap();

    assert_eq!(result.outcome, LoopOutcome::Completed);
    let tools = tool_messages(&conv);
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0].tool_call_id.as_deref(), Some("call_1"));
    assert!(tools[0].content.contains("nonexistent_op"));
    assert_eq!(h.provider.calls(), 2);
}

#[tokio::test]
async fn zero_quantity_update_makes_no_request() {
    let backend = MockServer::start().await;
    Mock::given(any()).respond_with(ResponseTemplate::new(200)).expect(0).mount(&backend).await;

    let h = harness(
        &backend,
        vec![
            tool_response(&[(
                "call_1",
                "update_cart_item",
                json!({"user_id": "u1", "cart_item_id": "ci-9", "quantity": 0}),
            )]),
            text_response("❌ Quantity must be at least 1."),
        ],
    );

    let mut conv = conversation("set it to zero");
    h.agent.process(&mut conv).await.unwrap();

    let payload: Value = serde_json::from_str(&tool_messages(&conv)[0].content).unwrap();
    assert_eq!(payload["success"], false);
    assert!(payload["message"].as_str().unwrap().starts_with("Quantity must be greater than 0"));
}

#[tokio::test]
async fn batch_results_keep_issuance_order() {
    let backend = MockServer::start().await;
    let h = harness(
        &backend,
        vec![
            tool_response(&[
                ("call_a", "query_db", json!({"query": "SELECT product_id, name, price, slug FROM products WHERE name ILIKE '%bed%'"})),
                ("call_b", "route_to_page", json!({"route_keyword": "shop", "category": "Beds"})),
            ]),
            text_response("🛏️ **King Size Bed**: Rs.52,000"),
        ],
    );

    let mut conv = conversation("show me beds");
    let result = h.agent.process(&mut conv).await.unwrap();
    assert_eq!(result.outcome, LoopOutcome::Completed);

    let tools = tool_messages(&conv);
    assert_eq!(tools.len(), 2);
    assert_eq!(tools[0].tool_call_id.as_deref(), Some("call_a"));
    assert!(tools[0].content.contains("King Size Bed"));
    assert!(tools[0].content.contains("[INTERNAL_PRODUCT_ID_DATA]"));
    assert_eq!(tools[1].tool_call_id.as_deref(), Some("call_b"));
    assert!(tools[1].content.ends_with("🌐 /shop?category=Beds"));
}

#[tokio::test]
async fn forbidden_query_is_reported_to_the_model() {
    let backend = MockServer::start().await;
    let h = harness(
        &backend,
        vec![
            tool_response(&[("call_1", "query_db", json!({"query": "SELECT email FROM users"}))]),
            text_response("I can only look up products."),
        ],
    );

    let mut conv = conversation("list every customer email");
    h.agent.process(&mut conv).await.unwrap();

    assert!(tool_messages(&conv)[0].content.contains("forbidden tables"));
}

#[tokio::test]
async fn knowledge_lookup_without_index_uses_fallback() {
    let backend = MockServer::start().await;
    let h = harness(
        &backend,
        vec![
            tool_response(&[("call_1", "rag_tool", json!({"query": "who founded the store?"}))]),
            text_response("I can't reach our knowledge base right now."),
            tool_response(&[("call_2", "rag_tool", json!({"query": "warranty?"}))]),
            text_response("Still unavailable, sorry."),
        ],
    );

    let mut conv = conversation("who founded the store?");
    h.agent.process(&mut conv).await.unwrap();
    conv.push(Message::from_shopper(None, "what about the warranty?"));
    h.agent.process(&mut conv).await.unwrap();

    let tools = tool_messages(&conv);
    assert!(tools[0].content.contains("The system encountered an error"));
    assert!(tools[1].content.starts_with("I'm sorry, but I cannot access our knowledge database right now due to a technical issue"));

    h.ctx.shutdown().await;
}

#[tokio::test]
async fn runaway_model_hits_iteration_cap() {
    let backend = MockServer::start().await;
    let script = (0..12)
        .map(|i| tool_response(&[(&*format!("call_{i}"), "route_to_page", json!({"route_keyword": "home"}))]))
        .collect();
    let h = harness(&backend, script);

    let mut conv = conversation("go home");
    let result = h.agent.process(&mut conv).await.unwrap();

    assert_eq!(result.outcome, LoopOutcome::MaxIterationsExceeded);
    assert_eq!(result.iterations, 10);
    assert_eq!(h.provider.calls(), 10);
    assert!(result.answer.is_none());
}

fn conversation(text: &str) -> Conversation {
    let mut conv = Conversation::new();
    conv.push(Message::from_shopper(Some("u1"), text));
    conv
}
