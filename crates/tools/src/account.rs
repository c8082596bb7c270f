//! Account operations: session check, profile read, profile update.

use std::sync::Arc;

use async_trait::async_trait;
use cartwright_core::error::ToolError;
use cartwright_core::tool::{Tool, ToolResult};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{error, info, warn};

use crate::args::{lenient_opt_string, parse_args, session_user_id};
use crate::backend::{BackendClient, BackendError};

#[derive(Debug, Deserialize)]
struct UserArgs {
    #[serde(default, deserialize_with = "lenient_opt_string")]
    user_id: Option<String>,
}

/// Checks whether a user id belongs to a live session.
pub struct ValidateUserAuthenticationTool {
    backend: Arc<BackendClient>,
}

impl ValidateUserAuthenticationTool {
    pub fn new(backend: Arc<BackendClient>) -> Self {
        Self { backend }
    }

    async fn validate(&self, user_id: &str) -> Result<Value, BackendError> {
        let reply = self
            .backend
            .get(
                &["api", "auth", "validate-user", user_id],
                self.backend.auth_timeout(),
            )
            .await?;

        Ok(match reply.status {
            200 => {
                info!(user_id, "User is authenticated");
                json!({
                    "success": true,
                    "authenticated": true,
                    "message": "User is authenticated and session is active",
                    "user_id": user_id,
                    "auth_data": reply.json()?,
                })
            }
            401 => {
                info!(user_id, "User session rejected");
                json!({
                    "success": true,
                    "authenticated": false,
                    "message": "User session is invalid or expired. Please log in again.",
                    "user_id": user_id,
                    "auth_data": null,
                })
            }
            status => {
                warn!(user_id, status, "Auth validation failed");
                json!({
                    "success": false,
                    "authenticated": false,
                    "message": "Authentication validation failed. Please try again.",
                    "user_id": user_id,
                    "auth_data": null,
                })
            }
        })
    }
}

#[async_trait]
impl Tool for ValidateUserAuthenticationTool {
    fn name(&self) -> &str {
        "validate_user_authentication"
    }

    fn description(&self) -> &str {
        "Check whether the shopper is logged in with an active session. Use when they ask about \
         their login status or before touching protected data. Take user_id from the \
         [User ID: ...] prefix of their message; never ask for it."
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
        let args: UserArgs = parse_args(self.name(), arguments)?;
        let Some(user_id) = session_user_id(args.user_id.as_deref()) else {
            info!("No user ID provided for authentication validation");
            return Ok(ToolResult::from_payload(json!({
                "success": false,
                "authenticated": false,
                "message": "No user session found. Please log in.",
                "user_id": null,
            })));
        };

        let payload = match self.validate(user_id).await {
            Ok(payload) => payload,
            Err(e) => {
                error!(user_id, error = %e, "Error validating user authentication");
                json!({
                    "success": false,
                    "authenticated": false,
                    "message": format!("Error validating authentication: {e}"),
                    "user_id": user_id,
                    "auth_data": null,
                })
            }
        };
        Ok(ToolResult::from_payload(payload))
    }
}

/// Reads the shopper's profile (names, email, address).
pub struct GetUserProfileDataTool {
    backend: Arc<BackendClient>,
}

impl GetUserProfileDataTool {
    pub fn new(backend: Arc<BackendClient>) -> Self {
        Self { backend }
    }

    async fn fetch(&self, user_id: &str) -> Result<Value, BackendError> {
        let reply = self
            .backend
            .get(
                &["api", "profile", "user", user_id],
                self.backend.request_timeout(),
            )
            .await?;

        Ok(match reply.status {
            200 => {
                info!(user_id, "Retrieved profile");
                json!({
                    "success": true,
                    "message": "Profile data retrieved successfully",
                    "user_id": user_id,
                    "profile_data": reply.json()?,
                })
            }
            404 => {
                info!(user_id, "Profile not found");
                json!({
                    "success": false,
                    "message": "Profile not found. Please complete your profile setup through the frontend.",
                    "user_id": user_id,
                    "profile_data": null,
                })
            }
            status => {
                warn!(user_id, status, "Profile fetch failed");
                json!({
                    "success": false,
                    "message": "Failed to retrieve profile data. Please try again or contact support.",
                    "user_id": user_id,
                    "profile_data": null,
                })
            }
        })
    }
}

#[async_trait]
impl Tool for GetUserProfileDataTool {
    fn name(&self) -> &str {
        "get_user_profile_data"
    }

    fn description(&self) -> &str {
        "Fetch the logged-in shopper's profile: first and last name, email and address. \
         Use for questions like \"what's my name?\" or \"what address do you have for me?\". \
         Take user_id from the [User ID: ...] prefix; never ask for it."
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
        let args: UserArgs = parse_args(self.name(), arguments)?;
        let Some(user_id) = session_user_id(args.user_id.as_deref()) else {
            info!("No user ID provided for profile data fetch");
            return Ok(ToolResult::from_payload(json!({
                "success": false,
                "message": "No user session found. Please log in to view your profile.",
                "user_id": null,
                "profile_data": null,
            })));
        };

        let payload = match self.fetch(user_id).await {
            Ok(payload) => payload,
            Err(e) => {
                error!(user_id, error = %e, "Error fetching user profile");
                json!({
                    "success": false,
                    "message": format!("Error retrieving profile: {e}"),
                    "user_id": user_id,
                    "profile_data": null,
                })
            }
        };
        Ok(ToolResult::from_payload(payload))
    }
}

#[derive(Debug, Deserialize)]
struct UpdateProfileArgs {
    #[serde(default, deserialize_with = "lenient_opt_string")]
    user_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    first_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    last_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    address: Option<String>,
}

/// The editable profile fields, in the order they are reported back.
const EDITABLE_FIELDS: [(&str, &str); 3] = [
    ("first_name", "first name"),
    ("last_name", "last name"),
    ("address", "address"),
];

/// Updates first name, last name and/or address. Email and phone are read-only.
pub struct UpdateUserProfileTool {
    backend: Arc<BackendClient>,
}

impl UpdateUserProfileTool {
    pub fn new(backend: Arc<BackendClient>) -> Self {
        Self { backend }
    }

    async fn update(
        &self,
        user_id: &str,
        updates: &serde_json::Map<String, Value>,
    ) -> Result<Value, BackendError> {
        let reply = self
            .backend
            .patch(
                &["api", "profile", "user", user_id, "update"],
                &Value::Object(updates.clone()),
            )
            .await?;

        Ok(match reply.status {
            200 => {
                info!(user_id, "Profile updated");
                json!({
                    "success": true,
                    "message": update_summary(updates),
                    "user_id": user_id,
                    "updates_made": updates,
                    "profile_data": reply.json()?,
                })
            }
            404 => {
                warn!(user_id, "Profile not found for update");
                json!({
                    "success": false,
                    "message": "Profile not found. Please complete your profile setup through the profile settings page first.",
                    "user_id": user_id,
                    "updates_made": {},
                })
            }
            401 => {
                warn!(user_id, "Unauthorized profile update");
                json!({
                    "success": false,
                    "message": "Authentication failed. Please log in again to update your profile.",
                    "user_id": user_id,
                    "updates_made": {},
                })
            }
            status => {
                warn!(user_id, status, body = %reply.body, "Profile update failed");
                json!({
                    "success": false,
                    "message": "Failed to update profile. Please try again or contact support.",
                    "user_id": user_id,
                    "updates_made": {},
                })
            }
        })
    }
}

/// Trimmed, non-blank edits keyed by field name.
fn collect_updates(args: &UpdateProfileArgs) -> serde_json::Map<String, Value> {
    let values = [&args.first_name, &args.last_name, &args.address];
    EDITABLE_FIELDS
        .iter()
        .zip(values)
        .filter_map(|((key, _), value)| {
            let trimmed = value.as_deref()?.trim();
            (!trimmed.is_empty()).then(|| (key.to_string(), Value::String(trimmed.to_string())))
        })
        .collect()
}

/// "Successfully updated your first name to 'X', address to 'Y'."
fn update_summary(updates: &serde_json::Map<String, Value>) -> String {
    let parts: Vec<String> = EDITABLE_FIELDS
        .iter()
        .filter_map(|(key, label)| {
            updates
                .get(*key)
                .and_then(Value::as_str)
                .map(|v| format!("{label} to '{v}'"))
        })
        .collect();
    format!("Successfully updated your {}.", parts.join(", "))
}

#[async_trait]
impl Tool for UpdateUserProfileTool {
    fn name(&self) -> &str {
        "update_user_profile"
    }

    fn description(&self) -> &str {
        "Update the logged-in shopper's first name, last name and/or address. Only pass the \
         fields that change; split full names into first_name and last_name. Email, phone \
         number and profile picture cannot be changed here. Take user_id from the \
         [User ID: ...] prefix."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "user_id": { "type": "string", "description": "The shopper's user id" },
                "first_name": { "type": "string", "description": "New first name" },
                "last_name": { "type": "string", "description": "New last name" },
                "address": { "type": "string", "description": "New address" }
            },
            "required": ["user_id"]
        })
    }

    async fn execute(&self, arguments: Value) -> Result<ToolResult, ToolError> {
        let args: UpdateProfileArgs = parse_args(self.name(), arguments)?;
        let Some(user_id) = session_user_id(args.user_id.as_deref()) else {
            info!("No user ID provided for profile update");
            return Ok(ToolResult::from_payload(json!({
                "success": false,
                "message": "No user session found. Please log in to update your profile.",
                "user_id": null,
            })));
        };

        let updates = collect_updates(&args);
        if updates.is_empty() {
            info!(user_id, "No valid profile updates provided");
            return Ok(ToolResult::from_payload(json!({
                "success": true,
                "message": "No updates to be made. Your profile remains unchanged.",
                "user_id": user_id,
                "updates_made": {},
            })));
        }

        info!(user_id, fields = ?updates.keys().collect::<Vec<_>>(), "Updating profile");
        let payload = match self.update(user_id, &updates).await {
            Ok(payload) => payload,
            Err(e) => {
                error!(user_id, error = %e, "Error updating user profile");
                json!({
                    "success": false,
                    "message": format!("Error updating profile: {e}"),
                    "user_id": user_id,
                    "updates_made": {},
                })
            }
        };
        Ok(ToolResult::from_payload(payload))
    }
}
