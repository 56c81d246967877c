//! cachewatch - keeps an eye on the geocaches you own.
//!
//! Polls the geocaching service for new "didn't find it" and maintenance
//! logs on your caches and emails a digest when new ones show up, or sends
//! a one-off overview of every cache's latest logs.

use std::collections::HashMap;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Local;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cachewatch_core::auth::CredentialStore;
use cachewatch_core::config;
use cachewatch_core::{ApiClient, Config, SmtpMailer, StateStore, Watcher};

// ============================================================================
// Constants
// ============================================================================

/// Directory for a rolling log file in addition to stderr
const LOG_DIR_VAR: &str = "CACHEWATCH_LOG_DIR";

const LOG_FILE_NAME: &str = "cachewatch.log";

const USAGE: &str = "\
Usage: cachewatch [--snapshot | --watch | --forget-credentials]

  --snapshot             email the last 10 log types of every cache once
  --watch                poll for new problem logs until killed
  --forget-credentials   remove stored passwords from the keychain

Without a flag you are asked which mode to start.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Snapshot,
    Watch,
}

impl Mode {
    fn from_choice(input: &str) -> Option<Self> {
        match input.trim() {
            "1" => Some(Mode::Snapshot),
            "2" => Some(Mode::Watch),
            _ => None,
        }
    }
}

/// Initialize the tracing subscriber for logging.
/// RUST_LOG controls the level (default info); the guard must outlive main.
fn init_tracing() -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let (file_layer, guard) = match std::env::var_os(LOG_DIR_VAR).map(PathBuf::from) {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_NAME);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_ansi(false).with_writer(writer)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

fn prompt_mode() -> Result<Option<Mode>> {
    println!("Which mode do you want to start?");
    println!("1. Show all caches once");
    println!("2. Every configured interval (e.g. 3 days), report caches with new problem logs from the last 30 days");
    print!("Enter a number (1 or 2): ");
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(Mode::from_choice(&line))
}

/// Ask for passwords that are neither in the environment nor in the keychain,
/// storing each in the keychain for the next start.
fn collect_missing_passwords() -> Result<HashMap<&'static str, String>> {
    let mut entered = HashMap::new();
    for (key, account) in config::missing_passwords() {
        let password = rpassword::prompt_password(format!("Password for {}: ", account))
            .context("Failed to read password")?;
        if let Err(e) = CredentialStore::store(&account, &password) {
            warn!(account = %account, error = %e, "Could not store password in keychain");
        }
        entered.insert(key, password);
    }
    Ok(entered)
}

fn forget_credentials() -> Result<()> {
    for account in config::keychain_accounts() {
        if CredentialStore::has_credentials(&account) {
            CredentialStore::delete(&account)?;
            println!("Removed stored password for {}", account);
        }
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let _guard = init_tracing();

    let args: Vec<String> = std::env::args().collect();
    let mode = match args.get(1).map(String::as_str) {
        Some("--snapshot") => Mode::Snapshot,
        Some("--watch") => Mode::Watch,
        Some("--forget-credentials") => return forget_credentials(),
        Some("-h") | Some("--help") => {
            println!("{}", USAGE);
            return Ok(());
        }
        Some(other) => {
            eprintln!("Unknown argument: {}\n\n{}", other, USAGE);
            return Ok(());
        }
        None => match prompt_mode()? {
            Some(mode) => mode,
            None => {
                println!("Invalid input");
                return Ok(());
            }
        },
    };

    let entered = collect_missing_passwords()?;
    let config = Config::from_env_with(&entered).context("Invalid configuration")?;
    info!(owner = %config.geocaching.owner, mode = ?mode, "cachewatch starting");

    let client = ApiClient::new(config.geocaching.clone())?;
    let mailer = SmtpMailer::new(&config.smtp)?;
    let store = StateStore::new(config.state_file.clone());
    let mut watcher = Watcher::new(client, mailer, store, config.poll_interval);

    match mode {
        Mode::Snapshot => {
            watcher.snapshot(Local::now().date_naive()).await?;
            println!("Finished");
            Ok(())
        }
        Mode::Watch => watcher.run().await,
    }
}
