//! Storefront navigation: the static route table and `route_to_page`.
//!
//! Resolution is pure: a route key plus optional slug and filters maps to
//! a frontend path and a one-line status the chat UI shows above the link.

use std::sync::LazyLock;

use async_trait::async_trait;
use cartwright_core::error::ToolError;
use cartwright_core::tool::{Tool, ToolResult};
use regex_lite::Regex;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::args::{lenient_bool, lenient_opt_string, parse_args};

/// One page of the storefront.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub key: &'static str,
    pub path: &'static str,
    pub auth_required: bool,
    pub title: &'static str,
    pub description: &'static str,
    pub keywords: &'static [&'static str],
}

/// Every navigable page. Keyword matching walks this table in order.
pub static ROUTES: &[Route] = &[
    Route {
        key: "profile",
        path: "/profile-settings",
        auth_required: true,
        title: "Profile Settings",
        description: "View and manage your profile information",
        keywords: &[
            "profile", "my profile", "profile settings", "account settings", "my account",
            "user profile", "personal info", "account info", "who am i", "my info", "my details",
        ],
    },
    Route {
        key: "cart",
        path: "/cart",
        auth_required: true,
        title: "Shopping Cart",
        description: "View and manage items in your cart",
        keywords: &[
            "cart", "shopping cart", "my cart", "basket", "my basket", "cart items",
            "what's in my cart", "show my cart", "cart page", "shopping basket",
        ],
    },
    Route {
        key: "home",
        path: "/",
        auth_required: false,
        title: "Homepage",
        description: "Welcome to the store",
        keywords: &[
            "home", "homepage", "main page", "welcome", "start", "beginning", "dhurba",
            "furniture store",
        ],
    },
    Route {
        key: "shop",
        path: "/shop",
        auth_required: false,
        title: "All Products",
        description: "Browse our complete furniture catalog",
        keywords: &[
            "shop", "browse", "products", "all products", "catalog", "furniture",
            "what do you have", "show me products", "browse products", "store", "shopping",
        ],
    },
    Route {
        key: "products",
        path: "/shop",
        auth_required: false,
        title: "All Products",
        description: "Browse our complete furniture catalog",
        keywords: &[
            "products", "all products", "product catalog", "browse products", "show products",
            "furniture catalog", "items", "merchandise",
        ],
    },
    Route {
        key: "login",
        path: "/login",
        auth_required: false,
        title: "Login",
        description: "Sign in to your account",
        keywords: &[
            "login", "log in", "sign in", "signin", "authenticate", "enter account",
            "access account", "help me login",
        ],
    },
    Route {
        key: "signup",
        path: "/signup",
        auth_required: false,
        title: "Sign Up",
        description: "Create a new account",
        keywords: &[
            "signup", "sign up", "register", "registration", "create account", "new account",
            "join", "become member",
        ],
    },
    Route {
        key: "product-details",
        path: "/product/{slug}",
        auth_required: false,
        title: "Product Details",
        description: "View detailed product information",
        keywords: &[
            "product details", "more details", "specific product", "product page",
            "item details", "tell me more", "show details", "product info",
        ],
    },
];

/// Look up a route by its key (case-sensitive).
pub fn route(key: &str) -> Option<&'static Route> {
    ROUTES.iter().find(|r| r.key == key)
}

fn path_of(key: &str) -> &'static str {
    route(key).map_or("/", |r| r.path)
}

/// A navigation request, exactly as `route_to_page` receives it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NavigationRequest {
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub route_keyword: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub slug: Option<String>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub user_authenticated: bool,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub room: Option<String>,
}

/// Where to send the shopper, and what to tell them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigation {
    pub path: String,
    pub status: String,
}

impl std::fmt::Display for Navigation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}\n🌐 {}", self.status, self.path)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Resolve a navigation request against [`ROUTES`].
///
/// - missing route key → home
/// - unknown route key → shop
/// - auth-required route for an anonymous shopper → login
/// - `product-details` without a slug → shop
pub fn resolve(request: &NavigationRequest) -> Navigation {
    let key = non_empty(&request.route_keyword).unwrap_or("home");
    let target = route(key).or_else(|| route("shop")).unwrap_or(&ROUTES[0]);

    if target.auth_required && !request.user_authenticated {
        return Navigation {
            path: path_of("login").to_string(),
            status: "🔒 Authentication required! Taking you to login page".into(),
        };
    }

    match target.key {
        "product-details" => match non_empty(&request.slug) {
            Some(slug) => Navigation {
                path: format!("/product/{slug}"),
                status: format!("🛋️ Opening product details for {slug}"),
            },
            None => Navigation {
                path: path_of("shop").to_string(),
                status: "📦 No specific product provided, showing all products".into(),
            },
        },
        "shop" | "products" => {
            let category = non_empty(&request.category);
            let room = non_empty(&request.room);
            let params: Vec<String> = [("category", category), ("room", room)]
                .into_iter()
                .filter_map(|(name, value)| value.map(|v| format!("{name}={}", v.replace(' ', "+"))))
                .collect();

            if params.is_empty() {
                Navigation {
                    path: path_of("shop").to_string(),
                    status: "🏪 Opening product catalog".into(),
                }
            } else {
                Navigation {
                    path: format!("{}?{}", path_of("shop"), params.join("&")),
                    status: format!("🏪 Browsing {}", category.or(room).unwrap_or("products")),
                }
            }
        }
        _ => Navigation {
            path: target.path.to_string(),
            status: format!("📄 Opening {}", target.title),
        },
    }
}

/// Guess a route key from free text: first keyword hit in table order,
/// then a few catch-all phrases, else `"shop"`.
pub fn match_query_to_route_keyword(query: &str) -> &'static str {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return "shop";
    }

    if let Some(route) = ROUTES
        .iter()
        .find(|r| r.keywords.iter().any(|k| query.contains(&k.to_lowercase())))
    {
        return route.key;
    }

    const FALLBACKS: [(&str, &[&str]); 3] = [
        ("profile", &["who am i", "my info", "my details", "user info"]),
        ("cart", &["cart", "basket", "my items"]),
        ("login", &["login", "log in", "sign in"]),
    ];
    FALLBACKS
        .iter()
        .find(|(_, patterns)| patterns.iter().any(|p| query.contains(p)))
        .map_or("shop", |(key, _)| *key)
}

static NON_SLUG_CHARS: LazyLock<Regex> = LazyLock::new(|| compile(r"[^a-z0-9\s-]"));
static NON_WORD_CHARS: LazyLock<Regex> = LazyLock::new(|| compile(r"[^\w\s-]"));
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| compile(r"\s+"));
static DASH_RUNS: LazyLock<Regex> = LazyLock::new(|| compile(r"-+"));
static BED_SIZE: LazyLock<Regex> =
    LazyLock::new(|| compile(r"\b(king|queen|twin|full|double)\s*size\b"));

fn compile(pattern: &str) -> Regex {
    match Regex::new(pattern) {
        Ok(re) => re,
        Err(e) => panic!("invalid built-in pattern {pattern:?}: {e}"),
    }
}

/// URL-friendly slug: `"Accent Chair!"` → `"accent-chair"`.
pub fn slugify(text: &str) -> String {
    let lowered = text.to_lowercase();
    let cleaned = NON_SLUG_CHARS.replace_all(&lowered, "");
    let dashed = WHITESPACE.replace_all(&cleaned, "-");
    dashed.trim_matches('-').to_string()
}

/// Loose product-name normalization: `"King Size Bed"` → `"king-sized-bed"`.
pub fn normalize_product_name(text: &str) -> String {
    let lowered = text.trim().to_lowercase();
    let cleaned = NON_WORD_CHARS.replace_all(&lowered, "");
    let sized = BED_SIZE.replace_all(&cleaned, "${1}-sized");
    let dashed = WHITESPACE.replace_all(&sized, "-");
    let collapsed = DASH_RUNS.replace_all(&dashed, "-");
    collapsed.trim_matches('-').to_string()
}

/// `route_to_page`: turns a route key into a frontend link.
pub struct RouteToPageTool;

#[async_trait]
impl Tool for RouteToPageTool {
    fn name(&self) -> &str {
        "route_to_page"
    }

    fn description(&self) -> &str {
        "Navigate the shopper to a storefront page. route_keyword is one of: profile and cart \
         (need a logged-in shopper), home, shop, products, login, signup, product-details \
         (needs the product slug from [INTERNAL_SLUG_DATA]). shop accepts category and room \
         filters. Set user_authenticated from validate_user_authentication."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "route_keyword": {
                    "type": "string",
                    "enum": ROUTES.iter().map(|r| r.key).collect::<Vec<_>>(),
                    "description": "Page to open"
                },
                "slug": { "type": "string", "description": "Product slug for product-details" },
                "user_authenticated": {
                    "type": "boolean",
                    "description": "Whether the shopper is logged in",
                    "default": false
                },
                "category": { "type": "string", "description": "Category filter for shop" },
                "room": { "type": "string", "description": "Room filter for shop" }
            }
        })
    }

    async fn execute(&self, arguments: Value) -> Result<ToolResult, ToolError> {
        let request: NavigationRequest = parse_args(self.name(), arguments)?;
        let navigation = resolve(&request);
        debug!(route = ?request.route_keyword, path = %navigation.path, "Resolved navigation");
        Ok(ToolResult::text(navigation.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(key: Option<&str>) -> NavigationRequest {
        NavigationRequest {
            route_keyword: key.map(String::from),
            ..NavigationRequest::default()
        }
    }

    #[test]
    fn missing_key_goes_home() {
        let nav = resolve(&request(None));
        assert_eq!(nav.path, "/");
        assert_eq!(nav.status, "📄 Opening Homepage");
    }

    #[test]
    fn unknown_key_goes_to_shop() {
        let nav = resolve(&request(Some("wishlist")));
        assert_eq!(nav.path, "/shop");
        assert_eq!(nav.status, "🏪 Opening product catalog");
    }

    #[test]
    fn auth_required_redirects_anonymous_shopper() {
        let nav = resolve(&request(Some("cart")));
        assert_eq!(nav.path, "/login");
        assert!(nav.status.starts_with("🔒"));

        let nav = resolve(&NavigationRequest {
            user_authenticated: true,
            ..request(Some("profile"))
        });
        assert_eq!(nav.path, "/profile-settings");
        assert_eq!(nav.status, "📄 Opening Profile Settings");
    }

    #[test]
    fn product_details_needs_slug() {
        let nav = resolve(&request(Some("product-details")));
        assert_eq!(nav.path, "/shop");
        assert_eq!(nav.status, "📦 No specific product provided, showing all products");

        let nav = resolve(&NavigationRequest {
            slug: Some("accent-chair".into()),
            ..request(Some("product-details"))
        });
        assert_eq!(nav.path, "/product/accent-chair");
        assert_eq!(nav.status, "🛋️ Opening product details for accent-chair");
    }

    #[test]
    fn shop_filters_become_query_string() {
        let nav = resolve(&NavigationRequest {
            category: Some("Dining Tables".into()),
            room: Some("dining room".into()),
            ..request(Some("products"))
        });
        assert_eq!(nav.path, "/shop?category=Dining+Tables&room=dining+room");
        assert_eq!(nav.status, "🏪 Browsing Dining Tables");

        let nav = resolve(&NavigationRequest {
            room: Some("bedroom".into()),
            ..request(Some("shop"))
        });
        assert_eq!(nav.path, "/shop?room=bedroom");
        assert_eq!(nav.status, "🏪 Browsing bedroom");
    }

    #[test]
    fn display_joins_status_and_link() {
        let nav = resolve(&request(Some("signup")));
        assert_eq!(nav.to_string(), "📄 Opening Sign Up\n🌐 /signup");
    }

    #[test]
    fn keyword_matching_follows_table_order() {
        assert_eq!(match_query_to_route_keyword("take me to my profile"), "profile");
        assert_eq!(match_query_to_route_keyword("what's in my cart"), "cart");
        assert_eq!(match_query_to_route_keyword("I want to sign up"), "signup");
        assert_eq!(match_query_to_route_keyword("please log in"), "login");
        assert_eq!(match_query_to_route_keyword("tell me more about it"), "product-details");
        assert_eq!(match_query_to_route_keyword("xyz"), "shop");
        assert_eq!(match_query_to_route_keyword("   "), "shop");
    }

    #[test]
    fn slugify_examples() {
        assert_eq!(slugify("Accent Chair!"), "accent-chair");
        assert_eq!(slugify("  Oak  Dining Table "), "oak-dining-table");
    }

    #[test]
    fn normalize_examples() {
        assert_eq!(normalize_product_name("King Size Bed"), "king-sized-bed");
        assert_eq!(normalize_product_name("Queen size  bed -- frame!"), "queen-sized-bed-frame");
        assert_eq!(normalize_product_name(""), "");
    }

    #[tokio::test]
    async fn tool_returns_status_and_link() {
        let result = RouteToPageTool
            .execute(json!({"route_keyword": "cart", "user_authenticated": "true"}))
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.output, "📄 Opening Shopping Cart\n🌐 /cart");
    }

    #[test]
    fn schema_lists_every_route() {
        let schema = RouteToPageTool.parameters_schema();
        let keys = schema["properties"]["route_keyword"]["enum"].as_array().unwrap();
        assert_eq!(keys.len(), ROUTES.len());
    }
}
