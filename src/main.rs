mod chat;
mod common;
mod debug;
mod http_client;
mod model;
mod render;
mod tools;
mod transcript;
mod turn;
mod upstream;

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use futures::StreamExt;
use tokio::io::{AsyncBufReadExt, BufReader};

use model::arg::{Args, Command};
use model::config::Config;
use render::{PanelRenderer, TerminalOptions, TerminalRenderer};
use tools::ToolRegistry;
use transcript::{Message, SourceItem, Transcript, TranscriptBuilder, driver};
use turn::{TurnRunner, TurnSettings};
use upstream::ChatProvider;

#[tokio::main]
async fn main() {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging; stderr keeps stdout for the answer
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(args.command.default_log_level())
            }),
        )
        .init();

    // Load configuration
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| Config::default_config_path().to_string());
    let mut config = Config::load(&config_path).unwrap_or_else(|e| {
        tracing::error!("Failed to load config: {:#}", e);
        std::process::exit(1);
    });
    config.apply_env();

    let runner = build_runner(&config).unwrap_or_else(|e| {
        tracing::error!("{:#}", e);
        std::process::exit(1);
    });

    let result = match args.command {
        Command::Serve => serve(&config, runner).await,
        Command::Ask {
            prompt,
            no_reasoning,
            panels,
            debug_events,
            system,
        } => {
            let mut terminal = TerminalOptions::from_config(&config);
            if no_reasoning {
                terminal.show_reasoning = false;
            }
            let options = TurnOptions {
                terminal,
                panels,
                debug_events,
                system,
            };
            ask(&runner, prompt, &options).await
        }
        Command::Chat => {
            let options = TurnOptions {
                terminal: TerminalOptions::from_config(&config),
                panels: false,
                debug_events: false,
                system: None,
            };
            chat_loop(&runner, &options).await
        }
    };

    if let Err(e) = result {
        tracing::error!("{:#}", e);
        std::process::exit(1);
    }
}

fn build_runner(config: &Config) -> anyhow::Result<TurnRunner> {
    let proxy_config = config.proxy_config();
    if let Some(proxy) = &proxy_config {
        tracing::info!("HTTP proxy configured: {}", proxy.url);
    }

    let provider = ChatProvider::new(config, proxy_config)?;
    let tools = ToolRegistry::from_names(&config.tools)
        .with_timeout(Duration::from_secs(config.tool_timeout_secs.max(1)));
    if !tools.is_empty() {
        tracing::info!("Tools enabled: {}", tools.names().collect::<Vec<_>>().join(", "));
    }

    Ok(TurnRunner::new(
        Arc::new(provider),
        Arc::new(tools),
        TurnSettings::from_config(config),
    ))
}

async fn serve(config: &Config, runner: TurnRunner) -> anyhow::Result<()> {
    let state = chat::AppState::new(runner).with_api_key(config.api_key.clone());
    let auth_enabled = state.api_key.is_some();
    let app = chat::create_router(state, config.max_request_body_bytes);

    // Start server
    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("Starting chat API endpoint: {}", addr);
    tracing::info!("Backend: {} (model {})", config.backend_url, config.upstream_model);
    if !auth_enabled {
        tracing::warn!("apiKey not set, /api/chat is open to anyone who can reach it");
    }
    tracing::info!("Available APIs:");
    tracing::info!("  POST /api/chat");
    tracing::info!("  GET  /health");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}

/// Presentation choices for one terminal turn
struct TurnOptions {
    terminal: TerminalOptions,
    panels: bool,
    debug_events: bool,
    system: Option<String>,
}

async fn ask(runner: &TurnRunner, prompt: String, options: &TurnOptions) -> anyhow::Result<()> {
    let history = vec![Message::user(prompt)];
    let message = run_turn(runner, &history, options).await?;
    if message.is_incomplete() {
        std::process::exit(2);
    }
    Ok(())
}

async fn chat_loop(runner: &TurnRunner, options: &TurnOptions) -> anyhow::Result<()> {
    let mut transcript = Transcript::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    eprintln!("Type a message, /reset to clear the history, /exit to quit.");
    loop {
        print!("> ");
        std::io::stdout().flush().context("Failed to write prompt")?;

        let line = tokio::select! {
            line = lines.next_line() => line.context("Failed to read stdin")?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            println!();
            return Ok(());
        };

        match line.trim() {
            "" => continue,
            "/exit" | "/quit" => return Ok(()),
            "/reset" => {
                transcript = Transcript::new();
                eprintln!("[history cleared]");
                continue;
            }
            _ => {}
        }

        transcript.push(Message::user(line));
        let message = run_turn(runner, transcript.messages(), options).await?;
        transcript.push(message);
    }
}

/// Stream one assistant turn to the terminal; Ctrl-C cancels it
async fn run_turn(
    runner: &TurnRunner,
    history: &[Message],
    options: &TurnOptions,
) -> anyhow::Result<Message> {
    let request = runner.request(history, options.system.as_deref());
    let debug_events = options.debug_events;
    let events = runner.start(request).inspect(move |item| {
        if let (true, Ok(SourceItem::Event(event))) = (debug_events, item) {
            debug::print_event_verbose(event);
        }
    });

    let cancel = async {
        if tokio::signal::ctrl_c().await.is_err() {
            futures::future::pending::<()>().await;
        }
    };

    let mut terminal = (!options.panels).then(|| TerminalRenderer::stdio(options.terminal.clone()));
    let mut panels = options.panels.then(PanelRenderer::new);
    let mut io_error = None;

    let message = driver::drive(TranscriptBuilder::new(), events, cancel, |update| {
        if debug_events {
            debug::print_update_verbose(update);
        }
        if let Some(panels) = panels.as_mut() {
            panels.on_update(update);
        }
        if let Some(terminal) = terminal.as_mut() {
            if let Err(e) = terminal.on_update(update) {
                io_error.get_or_insert(e);
            }
        }
    })
    .await;

    if let Some(e) = io_error {
        return Err(e).context("Failed to write to the terminal");
    }
    if let Some(panels) = panels {
        print!("{}", panels.to_text(options.terminal.show_reasoning));
        std::io::stdout().flush().context("Failed to write panels")?;
    }
    Ok(message)
}
