/// Chatlink interactive client - Main entry point
use chatlink_core::session::SessionController;
use chatlink_core::types::MessageRole;
use chatlink_core::{ClientConfig, HttpGateway, SledSessionStore};
use colored::*;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let config = ClientConfig::from_env()
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;

    let data_dir = config.data_dir();
    std::fs::create_dir_all(&data_dir)?;

    let gateway = Arc::new(
        HttpGateway::new(&config).map_err(|e| anyhow::anyhow!("Gateway error: {}", e))?,
    );
    let store = Arc::new(
        SledSessionStore::new(&data_dir).map_err(|e| anyhow::anyhow!("Storage error: {}", e))?,
    );
    let controller = SessionController::new(gateway, store);

    println!("{}", "Chatlink support client".bold());
    println!("Backend: {}", config.api_base_url);
    println!("Commands: /retry  /reset  /quit");
    println!("{:-<60}", "");

    if !controller.initialize().await {
        eprintln!(
            "{}",
            "✗ Could not create a session. Is the backend running?".red()
        );
        anyhow::bail!("session creation failed");
    }

    let mut printed = 0;
    printed = print_new_messages(&controller, printed).await;

    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    while let Some(line) = lines.next_line().await? {
        match line.trim() {
            "" => continue,
            "/quit" => break,
            "/reset" => {
                controller.reset().await;
                if !controller.initialize().await {
                    eprintln!("{}", "✗ Could not create a new session".red());
                    break;
                }
                printed = 0;
                printed = print_new_messages(&controller, printed).await;
                continue;
            }
            "/retry" => controller.retry_last_message().await,
            text => controller.send_message(text).await,
        }

        printed = print_new_messages(&controller, printed).await;

        let snapshot = controller.snapshot().await;
        if snapshot.has_error {
            if let Some(err) = snapshot.recent_errors.last() {
                eprintln!("{}", format!("✗ {} (use /retry to resend)", err).red());
            }
        } else if snapshot.last_latency_ms > 0 {
            println!("{}", format!("  ({} ms)", snapshot.last_latency_ms).dimmed());
        }
    }

    Ok(())
}

/// Print messages appended since the last call, returning the new count.
async fn print_new_messages(controller: &SessionController, printed: usize) -> usize {
    let snapshot = controller.snapshot().await;
    for msg in snapshot.messages.iter().skip(printed) {
        match msg.role {
            MessageRole::Assistant => println!("{} {}", "assistant>".cyan(), msg.text),
            MessageRole::User => {
                if msg.error {
                    println!("{} {} {}", "you>".green(), msg.text, "✗ failed".red());
                }
                // Successful user messages were just typed; don't echo them
            }
        }
    }
    snapshot.messages.len()
}
