use anyhow::Result;
use clap::Parser;
use invchat::cli::{Cli, Commands, SourceArgs};
use invchat::utils::display::{self, ConsoleSink};
use invchat::web::{app_router, AppState};
use invchat::{build_chat_service, ChatError, ChatService, Settings};
use std::io::Write;
use std::sync::Arc;
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::new()?;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.logging.level.clone()));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();
    let chat = build_chat_service(&settings).await?;

    match cli.command {
        Commands::Serve { addr } => {
            let addr = addr.unwrap_or_else(|| settings.server.listen_addr.clone());
            handle_serve(chat, &addr).await
        }
        Commands::Chat { source, session_id } => handle_chat(chat, source, session_id).await,
        Commands::Ask { question, source } => handle_ask(chat, source, question).await,
    }
}

async fn handle_serve(chat: Arc<ChatService>, addr: &str) -> Result<()> {
    let app = app_router(AppState::new(chat));
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("HTTP server listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("Server has shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}

fn report(err: &ChatError) {
    display::print_error(&err.to_string());
}

async fn handle_ask(chat: Arc<ChatService>, source: SourceArgs, question: String) -> Result<()> {
    let source = source.data_source();
    let session_id = format!("ask-{}", uuid::Uuid::new_v4());

    match chat.submit(&session_id, &source, &question, &ConsoleSink).await {
        Ok(Some(outcome)) => {
            println!("\n{}", outcome.reply);
            Ok(())
        }
        Ok(None) => {
            report(&ChatError::EmptyMessage);
            Ok(())
        }
        Err(e) => {
            report(&e);
            Err(e.into())
        }
    }
}

async fn handle_chat(chat: Arc<ChatService>, source: SourceArgs, session_id: String) -> Result<()> {
    let source = source.data_source();

    display::print_header("Chat with your inventory");
    display::print_info(&format!("Database: {}", source.label()));
    display::print_info("Type your questions (/help for commands, Ctrl+C to exit)\n");

    for turn in chat.transcript(&session_id).await? {
        display::print_turn(&format!("{:?}", turn.role), &turn.content);
    }

    let stdin = io::stdin();
    let mut reader = BufReader::new(stdin);

    loop {
        display::print_prompt("\nYou: ");
        std::io::stdout().flush()?;

        let mut input = String::new();
        if reader.read_line(&mut input).await? == 0 {
            break;
        }

        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        match input {
            "/clear" => {
                for turn in chat.clear(&session_id).await? {
                    display::print_turn("Assistant", &turn.content);
                }
                display::print_success("Message history cleared");
                continue;
            }
            "/history" => {
                for turn in chat.transcript(&session_id).await? {
                    display::print_turn(&format!("{:?}", turn.role), &turn.content);
                }
                continue;
            }
            "/help" => {
                println!("Special commands:");
                println!("  /clear    - Clear message history");
                println!("  /history  - Show the transcript");
                println!("  /help     - Show this help");
                println!("  Ctrl+C    - Exit");
                continue;
            }
            _ => {}
        }

        match chat.submit(&session_id, &source, input, &ConsoleSink).await {
            Ok(Some(outcome)) => display::print_turn("Assistant", &outcome.reply),
            Ok(None) => {}
            Err(e) => report(&e),
        }
    }

    Ok(())
}
