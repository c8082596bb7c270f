//! `cartwright config` — Configuration management commands.

use cartwright_config::AppConfig;
use cartwright_core::LazyResource;
use cartwright_tools::KnowledgeConnector;

fn warnings(config: &AppConfig) -> Vec<&'static str> {
    let mut warnings = Vec::new();

    if !config.has_api_key() {
        warnings.push("No API key set (set GOOGLE_API_KEY, OPENROUTER_API_KEY or CARTWRIGHT_API_KEY)");
    }

    if config.catalog.database_url.is_none() {
        warnings.push("No catalog database (set DATABASE_URL); query_db will report it as unavailable");
    }

    if config.knowledge.api_key.is_none() || config.knowledge.index_host.is_none() {
        warnings.push("Knowledge index not configured (PINECONE_API_KEY, PINECONE_INDEX_HOST); rag_tool will use fallback text");
    }

    warnings
}

/// Set up the knowledge index eagerly and report the outcome.
async fn knowledge_status(config: &AppConfig) -> String {
    let index = LazyResource::new(KnowledgeConnector::new(config.knowledge.clone()));
    let status = match index.init().await {
        Ok(()) => format!("ready ({} dims)", config.knowledge.embedding_dimensions),
        Err(e) => format!("unavailable: {e}"),
    };
    index.shutdown().await;
    status
}

pub async fn validate() -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Validating configuration...");

    match AppConfig::load() {
        Ok(config) => {
            println!("   ✅ Config parsed successfully");

            let warnings = warnings(&config);
            if warnings.is_empty() {
                println!("   ✅ All checks passed");
            } else {
                println!();
                for w in &warnings {
                    println!("   ⚠️  {w}");
                }
            }

            println!();
            println!("   Provider:  {}", config.default_provider);
            println!("   Model:     {}", config.effective_model());
            println!(
                "   Known:     {}",
                cartwright_providers::build_from_config(&config).list().join(", ")
            );
            println!("   Backend:   {}", config.backend.base_url);
            println!("   Knowledge: {}", knowledge_status(&config).await);
            println!("   Max steps: {}", config.agent.max_iterations);
        }
        Err(e) => {
            println!("   ❌ Config error: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

pub fn show() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let toml_str = toml::to_string_pretty(&config.redacted())?;
    println!("{toml_str}");
    Ok(())
}

pub fn path() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = AppConfig::config_dir().join("config.toml");
    println!("{}", config_path.display());
    Ok(())
}
