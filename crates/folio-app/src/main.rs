//! Folio client binary - composition root.
//!
//! 1. Parse CLI args and load configuration from TOML
//! 2. Build the HTTP gateway with a shared bearer token
//! 3. Create the session and log its events in the background
//! 4. Run the interactive shell on stdin until `/quit` or EOF

mod cli;
mod shell;

use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;

use folio_core::{FolioConfig, SessionEvent};
use folio_gateway::{HttpGateway, SharedToken};
use folio_session::Session;

use cli::CliArgs;
use shell::{execute, Command};

/// Forward session events to the log until the session goes away.
async fn event_logger(mut events: broadcast::Receiver<SessionEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => tracing::debug!(kind = event.kind(), event = ?event, "Session event"),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Event logger fell behind");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config is read before tracing starts so the configured level applies.
    let config_file = args.resolve_config_path();
    let config_found = config_file.exists();
    let mut config = if config_found {
        FolioConfig::load(&config_file)?
    } else {
        FolioConfig::default()
    };
    args.apply(&mut config);

    // Tracing. Logs go to stderr; stdout belongs to the shell.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.general.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting Folio v{}", env!("CARGO_PKG_VERSION"));
    if config_found {
        tracing::info!(path = %config_file.display(), "Configuration loaded");
    } else {
        tracing::info!(path = %config_file.display(), "No configuration file; using defaults");
    }

    // Gateway.
    let token = Arc::new(SharedToken::new(args.resolve_token(&config)));
    if !token.is_signed_in() {
        tracing::warn!(
            env = %config.auth.token_env,
            "No bearer token configured; requests will be rejected"
        );
    }
    let gateway = Arc::new(HttpGateway::new(&config.gateway, token.clone())?);
    tracing::info!(base_url = %gateway.base_url(), "Gateway ready");

    // Session.
    let session = Session::new(gateway, &config);
    tokio::spawn(event_logger(session.subscribe()));

    match session.refresh_documents().await {
        Ok(count) => println!("{} document(s). Type /help for commands.", count),
        Err(e) => {
            tracing::warn!(error = %e, "Initial document listing failed");
            println!("Could not list documents ({}). Type /help for commands.", e);
        }
    }

    // Shell.
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut signed_in = token.is_signed_in();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else { break };

        let command = match Command::parse(&line) {
            Ok(Command::Quit) => break,
            Ok(command) => command,
            Err(e) => {
                println!("{}", e);
                continue;
            }
        };
        match execute(&session, command).await {
            Ok(out) if out.is_empty() => {}
            Ok(out) => println!("{}", out),
            Err(e) => println!("error: {}", e),
        }

        if signed_in && !token.is_signed_in() {
            println!("The server rejected the bearer token. Restart with a fresh --token.");
        }
        signed_in = token.is_signed_in();
    }

    tracing::info!("Folio shutting down");
    Ok(())
}
