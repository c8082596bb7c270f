//! Cartwright CLI — the main entry point.
//!
//! Commands:
//! - `chat`    — Interactive chat or single-message mode
//! - `tools`   — Print the operation definitions sent to the model
//! - `route`   — Resolve a navigation request offline
//! - `config`  — Show, locate or validate the configuration

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "cartwright",
    about = "Cartwright — tool-calling shopping assistant for a furniture store",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with the shopping assistant
    Chat {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// The shopper's user id; omitted means not logged in
        #[arg(long, env = "CARTWRIGHT_USER_ID")]
        user_id: Option<String>,
    },

    /// Print the operation definitions as JSON
    Tools {
        /// Print only this operation, e.g. `query_db`
        name: Option<String>,
    },

    /// Resolve a free-text navigation query to a store path
    Route {
        /// What the shopper asked for, e.g. "show my cart"
        query: String,

        /// Treat the shopper as logged in
        #[arg(long)]
        authenticated: bool,

        /// Product name to open (implies the product-details route)
        #[arg(long)]
        product: Option<String>,

        /// Category filter for the shop page
        #[arg(long)]
        category: Option<String>,

        /// Room filter for the shop page
        #[arg(long)]
        room: Option<String>,
    },

    /// Show, locate or validate the configuration
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration with secrets redacted
    Show,
    /// Print the config file path
    Path,
    /// Load and validate the configuration
    Validate,
}

fn init_tracing(verbose: bool, json: bool) {
    let filter = if verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    match cli.command {
        Commands::Chat { message, user_id } => commands::chat::run(message, user_id).await?,
        Commands::Tools { name } => commands::tools::run(name.as_deref()).await?,
        Commands::Route {
            query,
            authenticated,
            product,
            category,
            room,
        } => commands::route::run(&query, authenticated, product, category, room)?,
        Commands::Config { action } => match action.unwrap_or(ConfigAction::Show) {
            ConfigAction::Show => commands::config_cmd::show()?,
            ConfigAction::Path => commands::config_cmd::path()?,
            ConfigAction::Validate => commands::config_cmd::validate().await?,
        },
    }

    Ok(())
}
