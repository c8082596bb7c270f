//! `cartwright chat` — Interactive or single-message chat mode.

use std::io::Write;
use std::sync::Arc;

use cartwright_agent::{AgentLoop, LoopOutcome, LoopResult};
use cartwright_config::AppConfig;
use cartwright_core::identity::{Identity, PromptOrigin, PromptSources};
use cartwright_core::message::{Conversation, Message};
use cartwright_core::provider::Provider;
use cartwright_tools::{ToolContext, build_registry};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

pub(crate) fn default_provider(config: &AppConfig) -> Result<Arc<dyn Provider>, Box<dyn std::error::Error>> {
    let router = cartwright_providers::build_from_config(config);
    Ok(router.default().ok_or("No default provider configured")?)
}

fn identity(config: &AppConfig) -> Identity {
    Identity::load(&PromptSources {
        system_prompt_override: config.identity.system_prompt_override.clone(),
        system_prompt_file: config.identity.system_prompt_file.as_ref().map(std::path::PathBuf::from),
    })
}

/// Ctrl-C presses for the whole session.
///
/// Installing tokio's handler replaces the default SIGINT exit for the
/// rest of the process, so it is installed once and every press is
/// routed here: it cancels the running turn, or ends the session when
/// the prompt is idle.
fn watch_interrupts() -> mpsc::UnboundedReceiver<()> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if tx.send(()).is_err() {
                break;
            }
        }
    });
    rx
}

/// Run one loop, cancelling it on the first interrupt.
///
/// The run is never dropped mid-flight; it observes the token and
/// finishes with every pending invocation answered.
async fn run_turn(
    agent: &AgentLoop,
    conversation: &mut Conversation,
    interrupts: &mut mpsc::UnboundedReceiver<()>,
) -> Result<LoopResult, cartwright_core::AgentError> {
    let token = CancellationToken::new();
    let run = agent.run(conversation, &token);
    tokio::pin!(run);

    loop {
        tokio::select! {
            result = &mut run => return result,
            Some(()) = interrupts.recv(), if !token.is_cancelled() => token.cancel(),
        }
    }
}

enum Input {
    Line(String),
    Eof,
    Interrupted,
}

/// Wait for the next line, or an interrupt while idle.
async fn next_input<R: AsyncBufRead + Unpin>(
    lines: &mut Lines<R>,
    interrupts: &mut mpsc::UnboundedReceiver<()>,
) -> std::io::Result<Input> {
    tokio::select! {
        line = lines.next_line() => Ok(line?.map_or(Input::Eof, Input::Line)),
        Some(()) = interrupts.recv() => Ok(Input::Interrupted),
    }
}

fn render(result: &LoopResult) -> String {
    match (result.outcome, &result.answer) {
        (LoopOutcome::Completed, Some(answer)) => answer.clone(),
        (LoopOutcome::Completed, None) => String::new(),
        (LoopOutcome::MaxIterationsExceeded, _) => {
            "I've reached the maximum number of steps for this request. Could you rephrase or narrow it down?".into()
        }
        (LoopOutcome::Cancelled, _) => "Cancelled.".into(),
    }
}

pub async fn run(message: Option<String>, user_id: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    // Check for API key early — give a clear error
    if !config.has_api_key() && config.default_provider != "ollama" {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    GOOGLE_API_KEY       (Gemini, the default provider)");
        eprintln!("    OPENROUTER_API_KEY   (with CARTWRIGHT_PROVIDER=openrouter)");
        eprintln!("    OPENAI_API_KEY       (with CARTWRIGHT_PROVIDER=openai)");
        eprintln!("    CARTWRIGHT_API_KEY   (generic)");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let provider = default_provider(&config)?;
    let ctx = ToolContext::from_config(&config, provider.clone());
    let tools = Arc::new(build_registry(&ctx));
    let identity = identity(&config);
    let prompt_source = match &identity.origin {
        PromptOrigin::Override => "config override".to_string(),
        PromptOrigin::File(path) => path.display().to_string(),
        PromptOrigin::Builtin => "built-in".to_string(),
    };
    let prompt_tokens = identity.estimated_tokens();
    let agent = AgentLoop::from_config(provider, tools.clone(), &config, identity.system_prompt);
    let user_id = user_id.as_deref();
    let mut interrupts = watch_interrupts();

    if let Some(msg) = message {
        // Single message mode
        let mut conv = Conversation::new();
        conv.push(Message::from_shopper(user_id, &msg));

        eprint!("  Thinking...");
        let outcome = run_turn(&agent, &mut conv, &mut interrupts).await;
        eprint!("\r              \r");
        ctx.shutdown().await;
        println!("{}", render(&outcome?));
        return Ok(());
    }

    // Interactive mode
    println!();
    println!("  ╔══════════════════════════════════════════════╗");
    println!("  ║      Cartwright Assistant — Interactive Mode  ║");
    println!("  ╚══════════════════════════════════════════════╝");
    println!();
    println!("  Provider:  {}", config.default_provider);
    println!("  Model:     {}", config.effective_model());
    println!("  Tools:     {}", tools.names().join(", "));
    println!("  Prompt:    {prompt_source} (~{prompt_tokens} tokens)");
    println!("  Session:   {}", user_id.unwrap_or("not logged in"));
    println!();
    println!("  Type your message and press Enter.");
    println!("  Type 'exit' or press Ctrl+C to quit; Ctrl+C during a request cancels it.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut conv = Conversation::new();

    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let line = match next_input(&mut lines, &mut interrupts).await? {
            Input::Line(line) => line,
            Input::Eof => break,
            Input::Interrupted => {
                println!();
                break;
            }
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "exit" | "quit") {
            break;
        }

        conv.push(Message::from_shopper(user_id, line));

        eprint!("  ...");
        match run_turn(&agent, &mut conv, &mut interrupts).await {
            Ok(result) => {
                eprint!("\r     \r");
                println!();
                for text_line in render(&result).lines() {
                    println!("  Assistant > {text_line}");
                }
                println!();
            }
            Err(e) => {
                eprint!("\r     \r");
                warn!(error = %e, "Turn failed");
                eprintln!("  [Error] {e}");
                println!();
            }
        }
    }

    ctx.shutdown().await;
    println!();
    println!("  Goodbye! 👋");
    println!();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use cartwright_agent::ModelSettings;
    use cartwright_core::error::ProviderError;
    use cartwright_core::message::MessageToolCall;
    use cartwright_core::provider::{ProviderRequest, ProviderResponse, Usage};
    use cartwright_core::tool::ToolRegistry;
    use std::time::Duration;

    /// Thinks for a while, then asks for one lookup.
    struct SlowProvider;

    #[async_trait]
    impl Provider for SlowProvider {
        fn name(&self) -> &str {
            "slow"
        }

        async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok(ProviderResponse {
                message: Message::assistant_with_tool_calls(
                    "",
                    vec![MessageToolCall {
                        id: "call_1".into(),
                        name: "get_user_cart_data".into(),
                        arguments: "{}".into(),
                    }],
                ),
                usage: None,
                model: "slow".into(),
            })
        }
    }

    fn slow_agent() -> AgentLoop {
        AgentLoop::new(
            Arc::new(SlowProvider),
            ModelSettings::from_config(&AppConfig::default()),
            Arc::new(ToolRegistry::new()),
            "You sell furniture.",
        )
    }

    #[tokio::test]
    async fn interrupt_cancels_running_turn() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut conv = Conversation::new();
        conv.push(Message::from_shopper(Some("u1"), "what's in my cart?"));

        tx.send(()).unwrap();
        let result = run_turn(&slow_agent(), &mut conv, &mut rx).await.unwrap();

        assert_eq!(result.outcome, LoopOutcome::Cancelled);
        // The requested invocation is still answered.
        assert_eq!(conv.last().unwrap().tool_call_id.as_deref(), Some("call_1"));
    }

    #[tokio::test]
    async fn idle_interrupt_ends_session() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (_writer, reader) = tokio::io::duplex(64);
        let mut lines = BufReader::new(reader).lines();

        tx.send(()).unwrap();
        let input = next_input(&mut lines, &mut rx).await.unwrap();
        assert!(matches!(input, Input::Interrupted));
    }

    #[tokio::test]
    async fn lines_and_eof_pass_through() {
        let (_tx, mut rx) = mpsc::unbounded_channel::<()>();
        let mut lines = BufReader::new(&b"show me sofas\n"[..]).lines();

        assert!(matches!(next_input(&mut lines, &mut rx).await.unwrap(), Input::Line(l) if l == "show me sofas"));
        assert!(matches!(next_input(&mut lines, &mut rx).await.unwrap(), Input::Eof));
    }

    fn result(outcome: LoopOutcome, answer: Option<&str>) -> LoopResult {
        LoopResult {
            outcome,
            answer: answer.map(String::from),
            iterations: 1,
            usage: Usage::default(),
        }
    }

    #[test]
    fn completed_run_prints_answer() {
        assert_eq!(render(&result(LoopOutcome::Completed, Some("**Hello!**"))), "**Hello!**");
    }

    #[test]
    fn other_outcomes_print_notices() {
        assert_eq!(render(&result(LoopOutcome::Cancelled, None)), "Cancelled.");
        assert!(render(&result(LoopOutcome::MaxIterationsExceeded, None)).contains("maximum number of steps"));
    }

    #[test]
    fn identity_follows_config_override() {
        let mut config = AppConfig::default();
        config.identity.system_prompt_override = Some("Sell only chairs.".into());
        let id = identity(&config);
        assert_eq!(id.system_prompt, "Sell only chairs.");
        assert_eq!(id.origin, PromptOrigin::Override);
    }
}
