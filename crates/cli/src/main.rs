//! Veloure CLI - Catalog migrations, stock management, and cart operations.
//!
//! # Usage
//!
//! ```bash
//! # Run catalog database migrations
//! veloure migrate
//!
//! # Inspect or restock a product
//! veloure stock show 42
//! veloure stock set 42 10
//! veloure stock untrack 42
//!
//! # Work with the local cart
//! veloure cart add 42 --qty 2 --source quick_add
//! veloure cart update 42 5
//! veloure cart remove 42
//! veloure cart show
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `stock` - Read and overwrite the shared stock counter
//! - `cart` - Mutate the cart through the reservation protocol

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use veloure_cart::CartConfig;
use veloure_core::ProductId;

mod commands;

use commands::CliError;

#[derive(Parser)]
#[command(name = "veloure")]
#[command(author, version, about = "Veloure cart and catalog tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run catalog database migrations
    Migrate,
    /// Manage product stock counters
    Stock {
        #[command(subcommand)]
        action: StockAction,
    },
    /// Operate on the local cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
}

#[derive(Subcommand)]
enum StockAction {
    /// Show a product and its current stock
    Show {
        /// Product ID
        id: ProductId,
    },
    /// Overwrite a product's stock counter
    Set {
        /// Product ID
        id: ProductId,
        /// New stock level
        qty: u32,
    },
    /// Stop tracking stock for a product
    Untrack {
        /// Product ID
        id: ProductId,
    },
}

#[derive(Subcommand)]
enum CartAction {
    /// Show the cart
    Show,
    /// Add a product to the cart
    Add {
        /// Product ID
        id: ProductId,

        /// Units to add (values below 1 add one unit)
        #[arg(short, long, default_value_t = 1, allow_negative_numbers = true)]
        qty: i64,

        /// Provenance tag attached to the "line added" event
        #[arg(short, long)]
        source: Option<String>,
    },
    /// Change a line's quantity (values below 1 become 1)
    Update {
        /// Product ID
        id: ProductId,
        /// Desired quantity
        #[arg(allow_negative_numbers = true)]
        qty: i64,
    },
    /// Remove a line from the cart
    Remove {
        /// Product ID
        id: ProductId,
    },
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &CartConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
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
async fn main() {
    let cli = Cli::parse();

    let config = match CartConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            #[allow(clippy::print_stderr)]
            {
                eprintln!("Failed to load configuration: {e}");
            }
            std::process::exit(2);
        }
    };

    // Initialize Sentry (must be done before tracing subscriber)
    let sentry_guard = init_sentry(&config);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "veloure_cart=info,veloure_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    if let Err(e) = run(cli, &config).await {
        sentry::capture_error(&e);
        tracing::error!("Command failed: {e}");
        // process::exit skips destructors; flush pending Sentry events first.
        drop(sentry_guard);
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: &CartConfig) -> Result<(), CliError> {
    match cli.command {
        Commands::Migrate => commands::migrate::run(config).await?,
        Commands::Stock { action } => match action {
            StockAction::Show { id } => commands::stock::show(config, id).await?,
            StockAction::Set { id, qty } => commands::stock::set(config, id, Some(qty)).await?,
            StockAction::Untrack { id } => commands::stock::set(config, id, None).await?,
        },
        Commands::Cart { action } => match action {
            CartAction::Show => commands::cart::show(config)?,
            CartAction::Add { id, qty, source } => {
                commands::cart::add(config, id, qty, source).await?;
            }
            CartAction::Update { id, qty } => commands::cart::update(config, id, qty).await?,
            CartAction::Remove { id } => commands::cart::remove(config, id).await?,
        },
    }
    Ok(())
}
