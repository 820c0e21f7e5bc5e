mod config;
mod error;

use std::future::Future;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use runtime::{
    ChatBackend, ChatRequest, CompletionRequest, McpToolHost, Message, OpenAiBackend,
    Orchestrator, ToolHost,
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use config::Config;
use error::Result;

const CONFIG_FILE: &str = "toolchat.toml";
const DEFAULT_LOG_FILTER: &str = "toolchat=info,runtime=info,mcp=info";

type ChatOrchestrator = Orchestrator<OpenAiBackend, McpToolHost>;

#[derive(Parser)]
#[command(name = "toolchat")]
#[command(about = "Chat with a model that can call local tools", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the config file (default: ./toolchat.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer a single message and print the reply as JSON
    Ask {
        /// The user message
        message: String,
    },
    /// Start an interactive chat (each line is an independent turn)
    Chat,
    /// Print the tool schema offered to the model
    Tools,
    /// Check the tool provider and the chat service
    Check,
}

#[tokio::main]
async fn main() {
    init_tracing();

    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(e.exit_code());
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Some(Commands::Ask { message }) => cmd_ask(&config, message).await,
        Some(Commands::Chat) | None => cmd_chat(&config).await,
        Some(Commands::Tools) => cmd_tools(&config).await,
        Some(Commands::Check) => cmd_check(&config).await,
    }
}

async fn cmd_ask(config: &Config, message: String) -> Result<()> {
    let orchestrator = build_orchestrator(config)?;
    let cancel = CancellationToken::new();

    let reply = interruptible(
        runtime::handle_chat(&orchestrator, ChatRequest::new(message), &cancel),
        &cancel,
    )
    .await?;

    println!("{}", serde_json::to_string_pretty(&reply)?);
    Ok(())
}

async fn cmd_chat(config: &Config) -> Result<()> {
    let orchestrator = build_orchestrator(config)?;

    println!("toolchat v{}", env!("CARGO_PKG_VERSION"));
    println!("Model: {}", orchestrator.backend().model());
    println!(
        "Tool provider: {} {}",
        config.provider.interpreter,
        config.provider.entry_point.display()
    );
    println!("Type 'quit' or Ctrl+D to exit.\n");

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("> ");
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            // EOF
            break;
        }

        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input == "quit" || input == "exit" {
            break;
        }

        let cancel = CancellationToken::new();
        let reply = interruptible(orchestrator.respond(input, &cancel), &cancel).await;

        if reply.tool_used {
            println!("\n[used a tool]");
        }
        println!("\n{}\n", reply.response);
    }

    Ok(())
}

async fn cmd_tools(config: &Config) -> Result<()> {
    let tools = McpToolHost::new(config.provider_config());
    let cancel = CancellationToken::new();

    let catalog = interruptible(tools.catalog(&cancel), &cancel).await;
    let schema = runtime::schema::adapt(&catalog);

    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}

async fn cmd_check(config: &Config) -> Result<()> {
    let orchestrator = build_orchestrator(config)?;
    let cancel = CancellationToken::new();

    println!("Tool provider:");
    match interruptible(orchestrator.tools().try_catalog(&cancel), &cancel).await {
        Ok(catalog) => {
            println!("  status: reachable");
            println!("  tools: {}", catalog.len());
            for tool in &catalog {
                println!("    - {}: {}", tool.name, tool.description);
            }
        }
        Err(e) => {
            println!("  status: unavailable");
            println!("  error: {e}");
        }
    }

    println!("Chat service:");
    println!("  model: {}", orchestrator.backend().model());
    let ping = [Message::user("Hello")];
    let request = CompletionRequest {
        messages: &ping,
        tools: &[],
    };
    match interruptible(orchestrator.backend().complete(request), &cancel).await {
        Ok(completion) => {
            println!("  status: reachable");
            println!("  reply: {}", completion.message.content);
            Ok(())
        }
        Err(e) => {
            println!("  status: unavailable");
            Err(runtime::Error::from(e).into())
        }
    }
}

/// Load the config file, falling back to defaults when none is present.
fn load_config(path: Option<&Path>) -> Result<Config> {
    let mut config = match path {
        Some(path) => Config::load(path)?,
        None if Path::new(CONFIG_FILE).exists() => Config::load(CONFIG_FILE)?,
        None => Config::default(),
    };
    config.apply_overrides(|name| std::env::var(name).ok());
    Ok(config)
}

fn build_orchestrator(config: &Config) -> Result<ChatOrchestrator> {
    let api_key = config.credential(|name| std::env::var(name).ok())?;

    let mut builder = OpenAiBackend::builder(api_key, &config.backend.model)
        .base_url(&config.backend.base_url)
        .timeout(config.backend_timeout());
    if let Some(max_tokens) = config.backend.max_tokens {
        builder = builder.max_tokens(max_tokens);
    }
    let backend = builder.build();
    tracing::info!(%backend, "chat service configured");

    let provider = config.provider_config();
    if let Err(e) = provider.check_entry_point() {
        tracing::warn!(error = %e, "tool provider not found; turns will run without tools");
    }

    Ok(Orchestrator::new(backend, McpToolHost::new(provider))
        .with_system_prompt(&config.chat.system_prompt)
        .with_completion_timeout(config.backend_timeout()))
}

/// Drive `work` to completion, cancelling it on Ctrl+C.
///
/// The cancelled work still runs to its own end so that provider processes
/// are released and a degraded result comes back.
async fn interruptible<F: Future>(work: F, cancel: &CancellationToken) -> F::Output {
    tokio::pin!(work);
    tokio::select! {
        output = &mut work => output,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("interrupted; cancelling");
            cancel.cancel();
            work.await
        }
    }
}
