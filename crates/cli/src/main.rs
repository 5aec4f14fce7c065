//! Cartbridge CLI - cart inspection and sync tools.
//!
//! # Usage
//!
//! ```bash
//! # Add 2 units of a product to the guest cart
//! cartbridge cart add -p X123 -q 2 --price 19.99
//!
//! # Show the guest cart
//! cartbridge cart show
//!
//! # Reconcile the guest cart with the server cart for CARTBRIDGE_USER_ID
//! cartbridge cart sync
//! ```
//!
//! # Commands
//!
//! - `cart show` - Print the guest cart
//! - `cart add` - Add a line to the guest cart
//! - `cart remove` - Remove a line from the guest cart
//! - `cart sync` - Load the server cart, merge, and push the result back

#![cfg_attr(not(test), forbid(unsafe_code))]
// CLI output goes to stdout on purpose
#![allow(clippy::print_stdout)]

use clap::{Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;

use commands::cart::CartCommandError;
use config::{CliConfig, ConfigError};

#[derive(Parser)]
#[command(name = "cartbridge")]
#[command(author, version, about = "Cartbridge cart tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect and sync carts
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
}

#[derive(Subcommand)]
enum CartAction {
    /// Print the guest cart
    Show,
    /// Add a line to the guest cart
    Add {
        /// Product identifier
        #[arg(short, long)]
        product: String,

        /// Units to add
        #[arg(short, long, default_value_t = 1)]
        quantity: u32,

        /// Unit price (decimal string, e.g. 19.99)
        #[arg(long)]
        price: String,
    },
    /// Remove a line from the guest cart
    Remove {
        /// Product identifier
        #[arg(short, long)]
        product: String,
    },
    /// Reconcile the guest cart with the server cart
    Sync,
}

/// Errors surfaced by the CLI.
#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Command(#[from] CartCommandError),
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &CliConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    // Load .env if present; real environments set variables directly
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = CliConfig::from_env()?;

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(&config);

    // Defaults to info level for our crates if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "cartbridge_cli=info,cartbridge_sync=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    match cli.command {
        Commands::Cart { action } => match action {
            CartAction::Show => commands::cart::show(&config)?,
            CartAction::Add {
                product,
                quantity,
                price,
            } => commands::cart::add(&config, &product, quantity, &price)?,
            CartAction::Remove { product } => commands::cart::remove(&config, &product)?,
            CartAction::Sync => commands::cart::sync(&config).await?,
        },
    }

    Ok(())
}
