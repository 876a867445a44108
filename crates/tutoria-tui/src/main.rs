use std::fs::OpenOptions;
use std::sync::Mutex;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::*;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tutoria_core::{ChatSession, ChatView, Config, ConversationClient, TranscriptEntry};

mod app;
mod handler;
mod input;
mod tui;
mod ui;

use app::App;
use tui::{EventHandler, Tui};

#[derive(Parser)]
#[command(name = "tutoria")]
#[command(version, about = "Terminal chat client for the Tutor.ia study assistant")]
struct Cli {
    /// Base URL of the conversation backend (overrides TUTORIA_BASE_URL and the config file)
    #[arg(long, global = true)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the interactive chat (default)
    Chat,
    /// Ask a single question and print the answer
    Ask {
        /// Your question
        question: String,
    },
    /// Check that the backend is up
    Health,
    /// Show or update the saved configuration
    Config {
        /// Backend URL to save
        #[arg(long)]
        url: Option<String>,
        /// Default log level (error, warn, info, debug, trace)
        #[arg(long)]
        log_level: Option<String>,
        /// Whether the input box is emptied after sending
        #[arg(long)]
        clear_on_send: Option<bool>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load().unwrap_or_else(|_| Config::new());
    let base_url = cli
        .base_url
        .clone()
        .unwrap_or_else(|| config.resolve_base_url());
    let client = ConversationClient::new(&base_url);

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Chat => {
            init_file_logging(&config)?;
            info!(%base_url, "starting chat");
            run_chat(client, &config).await?
        }
        Commands::Ask { question } => {
            init_stderr_logging(&config);
            ask_once(&client, &question).await?
        }
        Commands::Health => {
            init_stderr_logging(&config);
            check_health(&client).await?
        }
        Commands::Config { url, log_level, clear_on_send } => {
            update_config(config, url, log_level, clear_on_send)?
        }
    }

    Ok(())
}

fn env_filter(config: &Config) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = config.log_level();
        EnvFilter::new(format!("tutoria_core={level},tutoria_tui={level}"))
    })
}

/// The TUI owns the terminal, so interactive sessions log to a file
fn init_file_logging(config: &Config) -> Result<()> {
    let dir = Config::config_dir()?;
    std::fs::create_dir_all(&dir)?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join("tutoria.log"))?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter(config))
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(true)
        .init();

    Ok(())
}

fn init_stderr_logging(config: &Config) {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(config))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run_chat(client: ConversationClient, config: &Config) -> Result<()> {
    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = EventHandler::new();
    let mut app = App::new(client, config, events.sender());

    let result = run_app(&mut terminal, &mut app, &mut events).await;

    tui::restore()?;
    result
}

async fn run_app(terminal: &mut Tui, app: &mut App, events: &mut EventHandler) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event)?,
            None => break,
        }
    }

    // Nothing left to render the answers into
    if app.session.is_loading() {
        app.stop_generating();
    }

    Ok(())
}

async fn ask_once(client: &ConversationClient, question: &str) -> Result<()> {
    if question.trim().is_empty() {
        println!("{}", "Nothing to ask: the question is empty".yellow());
        return Ok(());
    }

    println!("🤖 Asking {}...\n", client.base_url().bold().magenta());

    let mut session = ChatSession::new();
    session.ask(client, question).await;

    let ChatView::Transcript { entries, .. } = session.view() else {
        return Ok(());
    };

    for entry in entries {
        match entry {
            TranscriptEntry::User { .. } => {}
            TranscriptEntry::Answer { text, citations, .. } => {
                println!("{}", "Tutor.ia:".bold().green());
                println!("{}", text);

                if !citations.is_empty() {
                    println!("\n{}", "Citations:".bold().blue());
                    for (i, citation) in citations.iter().enumerate() {
                        println!("  [{}] {}", i + 1, citation.display_title().yellow());
                    }
                }
            }
            TranscriptEntry::Error { text, .. } => {
                println!("{}", text.red());
            }
        }
    }

    Ok(())
}

async fn check_health(client: &ConversationClient) -> Result<()> {
    match client.health().await {
        Ok(true) => println!("{} {}", "✓".green().bold(), client.base_url()),
        Ok(false) => println!("{} {} is not healthy", "✗".red().bold(), client.base_url()),
        Err(e) => {
            println!("{}: {}", "Error connecting to backend".red(), e);
            println!("Make sure the backend is running at {}", client.base_url().bold());
        }
    }

    Ok(())
}

fn update_config(
    mut config: Config,
    url: Option<String>,
    log_level: Option<String>,
    clear_on_send: Option<bool>,
) -> Result<()> {
    let changed = url.is_some() || log_level.is_some() || clear_on_send.is_some();

    if let Some(url) = url {
        config.base_url = Some(url);
    }
    if let Some(level) = log_level {
        config.log_level = Some(level);
    }
    if let Some(clear) = clear_on_send {
        config.clear_on_send = clear;
    }

    if changed {
        config.save()?;
        println!("{}", "✓ Configuration saved".green());
    }

    println!("{} {}", "Base URL:".bold(), config.resolve_base_url());
    println!("{} {}", "Log level:".bold(), config.log_level());
    println!("{} {}", "Clear on send:".bold(), config.clear_on_send);
    Ok(())
}
