//! Shopfront CLI - drive the session and cart layer from a terminal.
//!
//! # Usage
//!
//! ```bash
//! # Log in; the guest cart is merged into the user's cart
//! shopfront login -e ana@example.com -p hunter2
//!
//! # Manage the active cart
//! shopfront cart add product 7 "Canvas Tote" 19.99 -q 2 -v Red
//! shopfront cart update product-7-red 3
//! shopfront cart show
//!
//! # Call any API endpoint with the session attached
//! shopfront request GET /api/orders
//! shopfront request POST /api/orders --body '{"note": "gift"}'
//! ```
//!
//! # Commands
//!
//! - `login` / `register` / `logout` - Session management
//! - `cart` - Inspect and edit the active cart
//! - `request` - Raw authenticated API call
//!
//! Session and cart state persist under `SHOPFRONT_STORAGE_DIR`.

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use sentry::integrations::tracing as sentry_tracing;
use shopfront_client::ClientConfig;
use shopfront_core::CartItemKind;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "shopfront")]
#[command(author, version, about = "Shopfront session and cart tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and merge the guest cart into the account's cart
    Login {
        /// Account email address
        #[arg(short, long)]
        email: String,

        /// Account password
        #[arg(short, long)]
        password: String,
    },
    /// Create an account
    Register {
        /// Display name
        #[arg(short, long)]
        name: String,

        /// Account email address
        #[arg(short, long)]
        email: String,

        /// Account password
        #[arg(short, long)]
        password: String,
    },
    /// Log out and switch back to the guest cart
    Logout,
    /// Inspect and edit the active cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Send a request to the API with the session attached
    Request {
        /// HTTP method (GET, POST, PUT, PATCH, DELETE)
        method: String,

        /// Endpoint path, e.g. `/api/orders`
        path: String,

        /// JSON request body
        #[arg(short, long)]
        body: Option<String>,
    },
}

#[derive(Subcommand)]
enum CartAction {
    /// Print the active cart
    Show,
    /// Add a catalog item
    Add {
        /// `product` or `pack`
        kind: CartItemKind,

        /// Catalog id
        id: i64,

        /// Display name
        name: String,

        /// Unit price
        price: Decimal,

        /// Number of units
        #[arg(short, long, default_value_t = 1)]
        quantity: u32,

        /// Variant selector (size, color, ...)
        #[arg(short, long)]
        variant: Option<String>,
    },
    /// Remove a line by key
    Remove {
        /// Line key, e.g. `product-7-red`
        key: String,
    },
    /// Set the quantity of a line; zero or less removes it
    Update {
        /// Line key, e.g. `product-7-red`
        key: String,

        /// New quantity
        #[arg(allow_negative_numbers = true)]
        quantity: i64,
    },
    /// Remove every line
    Clear,
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &ClientConfig) -> Option<sentry::ClientInitGuard> {
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

    // Sentry needs the configuration, so load it before tracing is set up
    let config = ClientConfig::from_env();
    let _sentry_guard = config.as_ref().ok().and_then(init_sentry);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "shopfront_client=info,shopfront_cli=info".into());

    // stdout carries command output; logs go to stderr
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let result = match config {
        Ok(config) => run(cli, config).await,
        Err(e) => Err(e.into()),
    };

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: ClientConfig) -> Result<(), commands::CliError> {
    let shop = commands::open(config)?;

    let result = match cli.command {
        Commands::Login { email, password } => {
            commands::auth::login(&shop, &email, password).await
        }
        Commands::Register {
            name,
            email,
            password,
        } => commands::auth::register(&shop, &name, &email, password).await,
        Commands::Logout => {
            commands::auth::logout(&shop).await;
            Ok(())
        }
        Commands::Cart { action } => {
            match action {
                CartAction::Show => commands::cart::show(&shop),
                CartAction::Add {
                    kind,
                    id,
                    name,
                    price,
                    quantity,
                    variant,
                } => commands::cart::add(&shop, kind, id, name, price, quantity, variant.as_deref()),
                CartAction::Remove { key } => commands::cart::remove(&shop, &key),
                CartAction::Update { key, quantity } => {
                    commands::cart::update(&shop, &key, quantity);
                }
                CartAction::Clear => commands::cart::clear(&shop),
            }
            Ok(())
        }
        Commands::Request { method, path, body } => {
            commands::request::send(&shop, &method, &path, body.as_deref()).await
        }
    };

    // A failed refresh surfaces as an error, so report it before returning
    commands::report_session_expiry(&shop);
    result
}
