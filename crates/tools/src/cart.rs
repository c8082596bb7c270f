//! Cart operations: read the cart, add a line, change or remove a line.
//!
//! Every operation checks its inputs before touching the backend, so an
//! invalid request never produces an HTTP call.

use std::sync::Arc;

use async_trait::async_trait;
use cartwright_core::error::ToolError;
use cartwright_core::tool::{Tool, ToolResult};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{error, info, warn};

use crate::args::{lenient_bool, lenient_int, lenient_opt_string, parse_args, session_user_id};
use crate::backend::{BackendClient, BackendError};

fn default_quantity() -> i64 {
    1
}

/// `{success, message, user_id, cart_data}`, the shape every cart reply has.
fn cart_payload(success: bool, message: impl Into<String>, user_id: Option<&str>, cart_data: Value) -> Value {
    json!({
        "success": success,
        "message": message.into(),
        "user_id": user_id,
        "cart_data": cart_data,
    })
}

#[derive(Debug, Deserialize)]
struct CartArgs {
    #[serde(default, deserialize_with = "lenient_opt_string")]
    user_id: Option<String>,
}

/// Reads the shopper's cart.
pub struct GetUserCartDataTool {
    backend: Arc<BackendClient>,
}

impl GetUserCartDataTool {
    pub fn new(backend: Arc<BackendClient>) -> Self {
        Self { backend }
    }

    async fn fetch(&self, user_id: &str) -> Result<Value, BackendError> {
        let reply = self
            .backend
            .get(&["api", "cart", "user", user_id], self.backend.request_timeout())
            .await?;

        Ok(match reply.status {
            200 => {
                info!(user_id, "Retrieved cart");
                cart_payload(true, "Cart data retrieved successfully", Some(user_id), reply.json()?)
            }
            404 => {
                info!(user_id, "Cart not found");
                cart_payload(
                    false,
                    "Cart not found. You don't have any items in your cart yet.",
                    Some(user_id),
                    Value::Null,
                )
            }
            status => {
                warn!(user_id, status, "Cart fetch failed");
                cart_payload(false, "Failed to retrieve cart data. Please try again.", Some(user_id), Value::Null)
            }
        })
    }
}

#[async_trait]
impl Tool for GetUserCartDataTool {
    fn name(&self) -> &str {
        "get_user_cart_data"
    }

    fn description(&self) -> &str {
        "Fetch the items in the logged-in shopper's cart, including each line's cart_item_id. \
         Take user_id from the [User ID: ...] prefix."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "user_id": { "type": "string", "description": "The shopper's user id" }
            },
            "required": ["user_id"]
        })
    }

    async fn execute(&self, arguments: Value) -> Result<ToolResult, ToolError> {
        let args: CartArgs = parse_args(self.name(), arguments)?;
        let Some(user_id) = session_user_id(args.user_id.as_deref()) else {
            info!("No user ID provided for cart data fetch");
            return Ok(ToolResult::from_payload(cart_payload(
                false,
                "No user session found. Please log in to view your cart.",
                None,
                Value::Null,
            )));
        };

        let payload = match self.fetch(user_id).await {
            Ok(payload) => payload,
            Err(e) => {
                error!(user_id, error = %e, "Error fetching user cart");
                cart_payload(false, format!("Error retrieving cart: {e}"), Some(user_id), Value::Null)
            }
        };
        Ok(ToolResult::from_payload(payload))
    }
}

#[derive(Debug, Deserialize)]
struct AddItemArgs {
    #[serde(default, deserialize_with = "lenient_opt_string")]
    user_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    product_id: Option<String>,
    #[serde(default = "default_quantity", deserialize_with = "lenient_int")]
    quantity: i64,
}

/// Adds a product to the shopper's cart.
pub struct AddItemToCartTool {
    backend: Arc<BackendClient>,
}

impl AddItemToCartTool {
    pub fn new(backend: Arc<BackendClient>) -> Self {
        Self { backend }
    }

    async fn add(&self, user_id: &str, product_id: &str, quantity: i64) -> Result<Value, BackendError> {
        let reply = self
            .backend
            .post(
                &["api", "cart", "user", user_id, "items"],
                &json!({ "product_id": product_id, "quantity": quantity }),
            )
            .await?;

        Ok(if reply.is_ok() {
            info!(user_id, product_id, quantity, "Added item to cart");
            cart_payload(
                true,
                format!("Successfully added {quantity} item(s) to your cart."),
                Some(user_id),
                reply.json()?,
            )
        } else {
            warn!(user_id, status = reply.status, "Add to cart failed");
            cart_payload(false, "Failed to add item to cart. Please try again.", Some(user_id), Value::Null)
        })
    }
}

#[async_trait]
impl Tool for AddItemToCartTool {
    fn name(&self) -> &str {
        "add_item_to_cart"
    }

    fn description(&self) -> &str {
        "Add a product to the logged-in shopper's cart. product_id comes from the \
         [INTERNAL_PRODUCT_ID_DATA] section of a query_db result; never invent one. \
         Take user_id from the [User ID: ...] prefix."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "user_id": { "type": "string", "description": "The shopper's user id" },
                "product_id": { "type": "string", "description": "Product id to add" },
                "quantity": { "type": "integer", "description": "How many to add (default 1)", "default": 1 }
            },
            "required": ["user_id", "product_id"]
        })
    }

    async fn execute(&self, arguments: Value) -> Result<ToolResult, ToolError> {
        let args: AddItemArgs = parse_args(self.name(), arguments)?;
        let Some(user_id) = session_user_id(args.user_id.as_deref()) else {
            return Ok(ToolResult::from_payload(cart_payload(
                false,
                "No user session found. Please log in to add items to your cart.",
                None,
                Value::Null,
            )));
        };

        let Some(product_id) = args.product_id.as_deref().map(str::trim).filter(|p| !p.is_empty()) else {
            return Ok(ToolResult::from_payload(cart_payload(
                false,
                "Product ID is required to add item to cart.",
                Some(user_id),
                Value::Null,
            )));
        };

        if args.quantity <= 0 {
            return Ok(ToolResult::from_payload(cart_payload(
                false,
                "Quantity must be greater than 0.",
                Some(user_id),
                Value::Null,
            )));
        }

        let payload = match self.add(user_id, product_id, args.quantity).await {
            Ok(payload) => payload,
            Err(e) => {
                error!(user_id, product_id, error = %e, "Error adding item to cart");
                cart_payload(false, format!("Error adding item to cart: {e}"), Some(user_id), Value::Null)
            }
        };
        Ok(ToolResult::from_payload(payload))
    }
}

#[derive(Debug, Deserialize)]
struct UpdateItemArgs {
    #[serde(default, deserialize_with = "lenient_opt_string")]
    user_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    cart_item_id: Option<String>,
    #[serde(default = "default_quantity", deserialize_with = "lenient_int")]
    quantity: i64,
    #[serde(default, deserialize_with = "lenient_bool")]
    to_be_deleted: bool,
}

/// Changes a cart line's quantity, or removes the line.
pub struct UpdateCartItemTool {
    backend: Arc<BackendClient>,
}

impl UpdateCartItemTool {
    pub fn new(backend: Arc<BackendClient>) -> Self {
        Self { backend }
    }

    async fn remove(&self, user_id: &str, cart_item_id: &str) -> Result<Value, BackendError> {
        info!(user_id, cart_item_id, "Removing cart item");
        let reply = self
            .backend
            .delete(&["api", "cart", "user", user_id, "items", cart_item_id])
            .await?;

        Ok(match reply.status {
            200 => cart_payload(
                true,
                "Successfully removed item from your cart.",
                Some(user_id),
                reply.json()?,
            ),
            404 => cart_payload(false, "Cart item not found or already removed.", Some(user_id), Value::Null),
            status => {
                warn!(user_id, status, "Remove cart item failed");
                cart_payload(false, "Failed to remove cart item. Please try again.", Some(user_id), Value::Null)
            }
        })
    }

    async fn set_quantity(&self, user_id: &str, cart_item_id: &str, quantity: i64) -> Result<Value, BackendError> {
        info!(user_id, cart_item_id, quantity, "Updating cart item");
        let reply = self
            .backend
            .put(
                &["api", "cart", "user", user_id, "items", cart_item_id],
                &json!({ "quantity": quantity }),
            )
            .await?;

        Ok(match reply.status {
            200 => cart_payload(
                true,
                format!("Successfully updated cart item quantity to {quantity}."),
                Some(user_id),
                reply.json()?,
            ),
            404 => cart_payload(
                false,
                "Cart item not found. It may have been removed already.",
                Some(user_id),
                Value::Null,
            ),
            status => {
                warn!(user_id, status, "Update cart item failed");
                cart_payload(false, "Failed to update cart item. Please try again.", Some(user_id), Value::Null)
            }
        })
    }
}

#[async_trait]
impl Tool for UpdateCartItemTool {
    fn name(&self) -> &str {
        "update_cart_item"
    }

    fn description(&self) -> &str {
        "Change the quantity of a line in the logged-in shopper's cart, or remove it with \
         to_be_deleted=true. cart_item_id comes from get_user_cart_data. Take user_id from \
         the [User ID: ...] prefix."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "user_id": { "type": "string", "description": "The shopper's user id" },
                "cart_item_id": { "type": "string", "description": "Cart line to change" },
                "quantity": { "type": "integer", "description": "New quantity (ignored when deleting)", "default": 1 },
                "to_be_deleted": { "type": "boolean", "description": "Remove the line entirely", "default": false }
            },
            "required": ["user_id", "cart_item_id"]
        })
    }

    async fn execute(&self, arguments: Value) -> Result<ToolResult, ToolError> {
        let args: UpdateItemArgs = parse_args(self.name(), arguments)?;
        let Some(user_id) = session_user_id(args.user_id.as_deref()) else {
            return Ok(ToolResult::from_payload(cart_payload(
                false,
                "No user session found. Please log in to update your cart.",
                None,
                Value::Null,
            )));
        };

        let Some(cart_item_id) = args.cart_item_id.as_deref().map(str::trim).filter(|c| !c.is_empty()) else {
            return Ok(ToolResult::from_payload(cart_payload(
                false,
                "Cart item ID is required to update cart item.",
                Some(user_id),
                Value::Null,
            )));
        };

        let outcome = if args.to_be_deleted {
            self.remove(user_id, cart_item_id).await
        } else if args.quantity <= 0 {
            return Ok(ToolResult::from_payload(cart_payload(
                false,
                "Quantity must be greater than 0. Set to_be_deleted=True to remove items.",
                Some(user_id),
                Value::Null,
            )));
        } else {
            self.set_quantity(user_id, cart_item_id, args.quantity).await
        };

        let payload = match outcome {
            Ok(payload) => payload,
            Err(e) => {
                error!(user_id, cart_item_id, error = %e, "Error updating cart item");
                cart_payload(false, format!("Error updating cart item: {e}"), Some(user_id), Value::Null)
            }
        };
        Ok(ToolResult::from_payload(payload))
    }
}
