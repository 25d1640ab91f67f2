//! Coinledger - command-line client for the coin ledger dashboard API

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde_json::{Value, json};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod config;
mod navigator;

use coinledger_auth::{HttpAuthority, RouteGuard, SessionManager};
use coinledger_client::{AuthTransport, ClientError, LedgerApi};
use coinledger_store::CredentialStore;
use config::Config;
use navigator::ConsoleNavigator;

/// Coinledger - coin ledger dashboard client
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/default.toml")]
    config: String,

    /// Ledger API base URL
    #[arg(long, env = "COINLEDGER_API_URL")]
    api_url: Option<String>,

    /// Session file path
    #[arg(long, env = "COINLEDGER_SESSION")]
    session: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in and store the session
    Login {
        #[arg(short, long)]
        email: String,
        #[arg(short, long, env = "COINLEDGER_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// End the session
    Logout,
    /// Show the current session
    Whoami,
    /// Renew the access token
    Refresh,
    /// Check whether a dashboard view may be opened
    Visit { path: String },
    /// GET an API path
    Get { path: String },
    /// POST JSON to an API path
    Post {
        path: String,
        #[arg(short, long, default_value = "{}")]
        data: String,
    },
    /// DELETE an API path
    Delete { path: String },
    /// Show balances
    Balance,
    /// List transactions
    Transactions,
    /// List token owners
    Owners,
    /// Show aggregate statistics
    Stats,
    /// Register a wallet address
    RegisterWallet { address: String },
    /// Mint new supply
    Mint {
        amount: String,
        #[arg(long)]
        to: Option<String>,
    },
    /// Burn supply
    Burn { amount: String },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let mut config = Config::load(&args.config)?;
    if let Some(url) = args.api_url {
        config.api.base_url = url;
    }
    if let Some(path) = args.session {
        config.storage.session_path = path;
    }

    init_logging(&config.logging.level, &config.logging.format);

    info!("Coinledger v{}", env!("CARGO_PKG_VERSION"));

    // Initialize session
    let store = CredentialStore::file(&config.storage.session_path);
    let authority = Arc::new(HttpAuthority::new(config.api.authority())?);
    let session = Arc::new(SessionManager::new(store, authority));

    // Initialize transport
    let navigator = Arc::new(ConsoleNavigator);
    let transport = Arc::new(AuthTransport::new(
        config.api.transport(),
        session.clone(),
        navigator.clone(),
    )?);
    let ledger = LedgerApi::new(transport.clone());

    let result = match args.command {
        Command::Login { email, password } => {
            let current = session
                .login(&email, &password)
                .await
                .context("Login failed")?;
            print_json(&json!({
                "email": current.email,
                "role": current.role.as_ref().map(|r| r.as_str()),
                "permissions": current.permissions,
            }))
        }
        Command::Logout => {
            session.logout().await?;
            println!("Logged out");
            Ok(())
        }
        Command::Whoami => match session.current_user() {
            Some(current) => print_json(&json!({
                "email": current.email,
                "user_id": current.user_id,
                "role": current.role.as_ref().map(|r| r.as_str()),
                "permissions": current.permissions,
                "issued_at": current.issued_at,
                "refreshed_at": current.refreshed_at,
            })),
            None => {
                println!("Not logged in");
                return Ok(ExitCode::FAILURE);
            }
        },
        Command::Refresh => match session.refresh().await {
            Ok(_) => {
                println!("Session refreshed");
                Ok(())
            }
            Err(e) => {
                session.logout().await?;
                Err(e).context("Session expired")
            }
        },
        Command::Visit { path } => {
            let guard = RouteGuard::new(session.clone());
            let renders = guard.enforce_route(&config.route_table(), &path, navigator.as_ref());
            return Ok(if renders {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            });
        }
        Command::Get { path } => api_call(transport.get_json::<Value>(&path).await),
        Command::Post { path, data } => {
            let body: Value = serde_json::from_str(&data).context("--data is not valid JSON")?;
            api_call(transport.post_json::<Value, Value>(&path, &body).await)
        }
        Command::Delete { path } => {
            api_call(transport.delete(&path).await.map(|()| Value::Null))
        }
        Command::Balance => api_call(ledger.balance().await),
        Command::Transactions => api_call(ledger.transactions().await),
        Command::Owners => api_call(ledger.owners().await),
        Command::Stats => api_call(ledger.stats().await),
        Command::RegisterWallet { address } => api_call(ledger.register_wallet(&address).await),
        Command::Mint { amount, to } => api_call(ledger.mint(&amount, to.as_deref()).await),
        Command::Burn { amount } => api_call(ledger.burn(&amount).await),
    };

    result.map(|_| ExitCode::SUCCESS)
}

/// Print an API reply, or explain why the call failed
fn api_call(result: Result<Value, ClientError>) -> Result<()> {
    match result {
        Ok(value) => print_json(&value),
        Err(e) if e.is_terminal() => bail!("Session expired, please log in again ({})", e),
        Err(e) => Err(e.into()),
    }
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Initialize logging
fn init_logging(level: &str, format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if format == "json" {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(filter)
            .init();
    }
}
