//! Henry HQ CLI
//!
//! Command-line access to the Clawdbot gateway: status probe, chat history,
//! sending messages, and configuration inspection.

use clap::{Parser, Subcommand};
use console::style;
use dialoguer::{theme::ColorfulTheme, Input};
use henry_hq::config::{config_path, read_config_snapshot, validate_config, Config};
use henry_hq::gateway::{redact_token, GatewayClient};
use henry_hq::{Error, Result, VERSION};
use secrecy::ExposeSecret;

#[derive(Parser)]
#[command(
    name = "henry-hq",
    version = VERSION,
    about = "Henry HQ - talk to the Clawdbot gateway from the terminal",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Probe the gateway and report agent/model info
    Status,

    /// Fetch recent chat history
    History {
        /// Session to read
        #[arg(long, default_value = "main")]
        session_key: String,

        /// Maximum number of messages
        #[arg(long, short, default_value_t = 100)]
        limit: u32,
    },

    /// Send a message to Henry and print the reply
    Send {
        /// Message text (prompts interactively when omitted)
        message: Option<String>,
    },

    /// Show resolved configuration and validation findings
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Status => check_status().await,
        Commands::History { session_key, limit } => show_history(&session_key, limit).await,
        Commands::Send { message } => send_message(message).await,
        Commands::Config => show_config(),
    }
}

/// Print a section header
fn print_section(title: &str) {
    println!("\n{}", "─".repeat(50));
    println!("  {}", title);
    println!("{}", "─".repeat(50));
}

// ============================================================================
// Status
// ============================================================================

async fn check_status() -> Result<()> {
    let config = Config::from_env()?;

    print_section("Gateway Status");
    println!(
        "  Endpoint: {}",
        style(redact_token(&config.gateway.url)).cyan()
    );

    let client = GatewayClient::new(config.gateway.clone());
    match client.check_status().await {
        Ok(status) => {
            println!("  Status:   {}", style("online").green());
            println!("  Model:    {}", style(&status.model).cyan());
            if let Some(name) = status.agent.get("name").and_then(|v| v.as_str()) {
                println!("  Agent:    {}", name);
            }
            println!("  Since:    {}", status.connected_at.to_rfc3339());
        }
        Err(err) => {
            println!("  Status:   {}", style("offline").red());
            println!("  Reason:   {}", err);
        }
    }
    println!();

    Ok(())
}

// ============================================================================
// History
// ============================================================================

async fn show_history(session_key: &str, limit: u32) -> Result<()> {
    let config = Config::from_env()?;
    let client = GatewayClient::new(config.gateway.clone());
    let messages = client.fetch_history(session_key, limit).await?;

    print_section(&format!("Chat History ({})", session_key));

    if messages.is_empty() {
        println!("  {}", style("no messages").dim());
        println!();
        return Ok(());
    }

    for message in &messages {
        let label = match message.role.as_str() {
            "assistant" => style("henry").cyan().bold(),
            "user" => style("you  ").bold(),
            other => style(other).dim(),
        };
        println!("  {} {}", label, message.text());
    }
    println!();

    Ok(())
}

// ============================================================================
// Send
// ============================================================================

async fn send_message(message: Option<String>) -> Result<()> {
    let config = Config::from_env()?;

    let text = match message {
        Some(text) => text,
        None => Input::<String>::with_theme(&ColorfulTheme::default())
            .with_prompt("Message for Henry")
            .interact_text()
            .map_err(|e| Error::Config(format!("Input error: {}", e)))?,
    };

    let text = text.trim().to_string();
    if text.is_empty() {
        return Err(Error::InvalidInput("message must not be empty".to_string()));
    }

    let client = GatewayClient::new(config.gateway.clone());
    println!("{}", style("Sending...").dim());

    let reply = client.send_message(&text).await?;

    println!();
    println!("{} {}", style("Henry:").cyan().bold(), reply);
    println!();

    Ok(())
}

// ============================================================================
// Config
// ============================================================================

fn show_config() -> Result<()> {
    let path = config_path();
    let snapshot = read_config_snapshot(&path);

    print_section("Configuration");
    println!("  File:      {}", snapshot.path.display());
    if !snapshot.exists {
        println!(
            "             {}",
            style("(not present; defaults + environment)").dim()
        );
    } else {
        for issue in &snapshot.issues {
            println!("  {} {}", style("⚠").yellow(), issue);
        }
    }

    // Resolved view: defaults, then the file, then environment overrides.
    let config = Config::from_env()?;

    println!(
        "  Gateway:   {}",
        style(redact_token(&config.gateway.url)).cyan()
    );
    let token = config.gateway.token.expose_secret();
    if token.is_empty() {
        println!("  Token:     {}", style("not set").yellow());
    } else {
        println!("  Token:     {} chars", token.len());
    }
    println!(
        "  Timeouts:  status {:?} / history {:?} / send {:?}",
        config.gateway.status_timeout, config.gateway.history_timeout, config.gateway.send_timeout
    );
    println!(
        "  Dashboard: {}:{}",
        config.dashboard.bind, config.dashboard.port
    );

    let validation = validate_config(&config);
    println!();
    for issue in &validation.errors {
        print!("  {} {}: {}", style("✗").red(), issue.path, issue.message);
        match &issue.suggestion {
            Some(hint) => println!(" ({})", style(hint).dim()),
            None => println!(),
        }
    }
    for issue in &validation.warnings {
        print!("  {} {}: {}", style("⚠").yellow(), issue.path, issue.message);
        match &issue.suggestion {
            Some(hint) => println!(" ({})", style(hint).dim()),
            None => println!(),
        }
    }
    if validation.valid && validation.warnings.is_empty() {
        println!("  {} configuration looks good", style("✓").green());
    }
    println!();

    Ok(())
}
