//! Store operations for the Cartwright assistant.
//!
//! Operations give the assistant the ability to act on the storefront:
//! check a session, read or edit a profile, search the catalog, change
//! the cart, send the shopper to a page, and look up store knowledge.
//!
//! The set is closed: [`StoreOperation`] lists every operation and
//! [`build_registry`] registers exactly those, in that order.

pub mod account;
pub mod args;
pub mod backend;
pub mod cart;
pub mod catalog;
pub mod knowledge;
pub mod routing;

use std::sync::Arc;

use cartwright_config::AppConfig;
use cartwright_core::provider::Provider;
use cartwright_core::resource::LazyResource;
use cartwright_core::tool::{Tool, ToolRegistry};

pub use backend::BackendClient;
pub use catalog::{CatalogQuery, PgCatalog};
pub use knowledge::KnowledgeConnector;
pub use routing::{match_query_to_route_keyword, normalize_product_name, resolve, slugify};

/// Every operation the assistant can invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOperation {
    ValidateUserAuthentication,
    GetUserProfileData,
    QueryDb,
    RouteToPage,
    GetUserCartData,
    AddItemToCart,
    UpdateCartItem,
    UpdateUserProfile,
    RagTool,
}

impl StoreOperation {
    /// All operations, in the order they are disclosed to the model.
    pub const ALL: [StoreOperation; 9] = [
        Self::ValidateUserAuthentication,
        Self::GetUserProfileData,
        Self::QueryDb,
        Self::RouteToPage,
        Self::GetUserCartData,
        Self::AddItemToCart,
        Self::UpdateCartItem,
        Self::UpdateUserProfile,
        Self::RagTool,
    ];

    /// The name the model calls this operation by.
    pub fn name(self) -> &'static str {
        match self {
            Self::ValidateUserAuthentication => "validate_user_authentication",
            Self::GetUserProfileData => "get_user_profile_data",
            Self::QueryDb => "query_db",
            Self::RouteToPage => "route_to_page",
            Self::GetUserCartData => "get_user_cart_data",
            Self::AddItemToCart => "add_item_to_cart",
            Self::UpdateCartItem => "update_cart_item",
            Self::UpdateUserProfile => "update_user_profile",
            Self::RagTool => "rag_tool",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.name() == name)
    }
}

impl std::fmt::Display for StoreOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Shared handles the operations are built from.
///
/// Built once at startup; the catalog pool and knowledge index connect
/// lazily on first use.
pub struct ToolContext {
    pub config: AppConfig,
    pub backend: Arc<BackendClient>,
    pub catalog: Arc<dyn CatalogQuery>,
    pub knowledge: Arc<LazyResource<KnowledgeConnector>>,
    pub embedder: Arc<dyn Provider>,
}

impl ToolContext {
    /// Production wiring: REST backend, PostgreSQL catalog, vector index.
    pub fn from_config(config: &AppConfig, embedder: Arc<dyn Provider>) -> Self {
        Self {
            config: config.clone(),
            backend: Arc::new(BackendClient::new(&config.backend)),
            catalog: Arc::new(PgCatalog::new(config.catalog.clone())),
            knowledge: Arc::new(LazyResource::new(KnowledgeConnector::new(config.knowledge.clone()))),
            embedder,
        }
    }

    /// Swap the catalog implementation (tests, alternative stores).
    pub fn with_catalog(mut self, catalog: Arc<dyn CatalogQuery>) -> Self {
        self.catalog = catalog;
        self
    }

    /// Release external resources. Safe to call more than once.
    pub async fn shutdown(&self) {
        self.catalog.shutdown().await;
        self.knowledge.shutdown().await;
    }
}

/// Construct the implementation for one operation.
pub fn build_operation(op: StoreOperation, ctx: &ToolContext) -> Box<dyn Tool> {
    match op {
        StoreOperation::ValidateUserAuthentication => {
            Box::new(account::ValidateUserAuthenticationTool::new(ctx.backend.clone()))
        }
        StoreOperation::GetUserProfileData => {
            Box::new(account::GetUserProfileDataTool::new(ctx.backend.clone()))
        }
        StoreOperation::UpdateUserProfile => {
            Box::new(account::UpdateUserProfileTool::new(ctx.backend.clone()))
        }
        StoreOperation::QueryDb => Box::new(catalog::QueryDbTool::new(
            ctx.catalog.clone(),
            ctx.config.catalog.clone(),
        )),
        StoreOperation::RouteToPage => Box::new(routing::RouteToPageTool),
        StoreOperation::GetUserCartData => Box::new(cart::GetUserCartDataTool::new(ctx.backend.clone())),
        StoreOperation::AddItemToCart => Box::new(cart::AddItemToCartTool::new(ctx.backend.clone())),
        StoreOperation::UpdateCartItem => Box::new(cart::UpdateCartItemTool::new(ctx.backend.clone())),
        StoreOperation::RagTool => Box::new(knowledge::RagTool::new(
            ctx.knowledge.clone(),
            ctx.embedder.clone(),
            &ctx.config.knowledge,
        )),
    }
}

/// Create the registry with every store operation.
pub fn build_registry(ctx: &ToolContext) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    for op in StoreOperation::ALL {
        registry.register(build_operation(op, ctx));
    }
    registry
}
