//! Action Agent CLI
//!
//! Command-line host for the reward, Polymarket and web-search plugins.

use agent_action_plugins::actions::{ActionResponse, HandlerCallback};
use agent_action_plugins::plugins::{initialize_all, Plugin};
use agent_action_plugins::runtime::{Character, LlmRuntime, Memory};
use agent_action_plugins::{AgentRunner, Config, EnvSettings, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "action-agent")]
#[command(about = "Conversational agent with token reward, Polymarket and web search actions")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Path to a character file (name, bio, lore, knowledge)
    #[arg(long, global = true)]
    character: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List plugins, their status and actions
    Plugins,

    /// Run one action against one message
    Dispatch {
        /// Action name (e.g. SEND_TOKEN, SEARCH_WEB)
        #[arg(short, long)]
        action: String,

        /// Message text
        #[arg(short, long)]
        message: String,

        /// Sender id
        #[arg(short, long, default_value = "user")]
        user: String,
    },

    /// Chat on stdin, one message per line
    Chat {
        /// Always dispatch this action instead of letting the model choose
        #[arg(short, long)]
        action: Option<String>,

        /// Sender id
        #[arg(short, long, default_value = "user")]
        user: String,
    },

    /// Show current configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (ignore if not found)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });
    let registry = tracing_subscriber::registry().with(filter);
    if cli.json_logs {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().with_writer(std::io::stderr)).init();
    }

    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    match cli.command {
        Commands::Plugins => {
            let plugins = initialize_all(&config, &EnvSettings).await;
            print_plugins(&plugins);
        }
        Commands::Dispatch {
            action,
            message,
            user,
        } => {
            let (llm, runner) = build_runner(&config, cli.character).await?;
            let message = Memory::new(&user, &llm.character().name, "cli", message);
            let (callback, _) = printing_callback();
            let ok = runner
                .handle_message(&message, Some(&action), Some(&callback))
                .await?;
            if !ok {
                tracing::warn!(action = action, "Action did not complete");
            }
        }
        Commands::Chat { action, user } => {
            let (llm, runner) = build_runner(&config, cli.character).await?;
            run_chat(&llm, &runner, action.as_deref(), &user).await?;
        }
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

async fn build_runner(
    config: &Config,
    character: Option<PathBuf>,
) -> Result<(Arc<LlmRuntime>, AgentRunner)> {
    let character = match character {
        Some(path) => Character::load(&path)?,
        None => Character::default(),
    };

    let llm = Arc::new(LlmRuntime::from_settings(
        &EnvSettings,
        config.llm.clone(),
        character,
    )?);
    let plugins = initialize_all(config, &EnvSettings).await;
    let dispatcher = AgentRunner::build_dispatcher(config).await?;

    tracing::info!(
        agent = %llm.character().name,
        enabled = plugins.iter().filter(|p| p.is_enabled()).count(),
        "Starting agent"
    );

    let runner = AgentRunner::new(llm.clone(), dispatcher, plugins)?;
    Ok((llm, runner))
}

async fn run_chat(
    llm: &LlmRuntime,
    runner: &AgentRunner,
    action: Option<&str>,
    user: &str,
) -> Result<()> {
    let agent = llm.character().name.clone();
    let (callback, replies) = printing_callback();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        if matches!(text, "exit" | "quit") {
            break;
        }

        let message = Memory::new(user, &agent, "cli", text);
        if let Err(e) = runner.handle_message(&message, action, Some(&callback)).await {
            eprintln!("error: {}", e);
        }

        llm.remember(message).await;
        let answered: Vec<String> = match replies.lock() {
            Ok(mut replies) => replies.drain(..).collect(),
            Err(_) => Vec::new(),
        };
        for text in answered {
            llm.remember(Memory::new(&agent, &agent, "cli", text)).await;
        }
    }

    Ok(())
}

/// Callback that prints each reply and keeps its text for the history
fn printing_callback() -> (HandlerCallback, Arc<Mutex<Vec<String>>>) {
    let replies = Arc::new(Mutex::new(Vec::new()));
    let sink = replies.clone();
    let callback: HandlerCallback = Arc::new(move |response: ActionResponse| {
        if let Some(error) = response.error() {
            tracing::warn!(error = error, "Action failed");
        }
        println!("{}", response.text);
        if let Ok(mut replies) = sink.lock() {
            replies.push(response.text);
        }
    });
    (callback, replies)
}

fn print_plugins(plugins: &[Plugin]) {
    for plugin in plugins {
        let status = if plugin.is_enabled() {
            "enabled"
        } else {
            "disabled"
        };
        println!("{} [{}]", plugin.name, status);
        println!("  {}", plugin.description);
        for descriptor in &plugin.documented {
            println!("  - {}: {}", descriptor.name, descriptor.description);
        }
    }
}
