//! `cartwright tools` — Print the operation definitions sent to the model.

use cartwright_config::AppConfig;
use cartwright_core::ToolDefinition;
use cartwright_tools::{StoreOperation, ToolContext, build_registry};

/// Keep only the named operation, or all of them when no name is given.
fn select(
    definitions: Vec<ToolDefinition>,
    name: Option<&str>,
) -> Result<Vec<ToolDefinition>, String> {
    let Some(name) = name else {
        return Ok(definitions);
    };
    let op = StoreOperation::from_name(name).ok_or_else(|| {
        let known: Vec<&str> = StoreOperation::ALL.iter().map(|op| op.name()).collect();
        format!("Unknown operation '{name}'. Known: {}", known.join(", "))
    })?;
    Ok(definitions.into_iter().filter(|d| d.name == op.name()).collect())
}

pub async fn run(name: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let provider = super::chat::default_provider(&config)?;
    let ctx = ToolContext::from_config(&config, provider);
    let registry = build_registry(&ctx);

    let selected = select(registry.definitions(), name);
    ctx.shutdown().await;

    println!("{}", serde_json::to_string_pretty(&selected?)?);
    Ok(())
}
