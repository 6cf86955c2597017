mod account_commands;
mod config_commands;
mod terminal;

use std::path::PathBuf;

use {
    clap::{Parser, Subcommand},
    portal_config::PortalConfig,
    tracing::{debug, info},
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "portal", about = "Portal: account selection and context for the customer portal")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (default: ./portal.toml, then ~/.config/portal/).
    #[arg(long, global = true, env = "PORTAL_CONFIG")]
    config: Option<PathBuf>,

    /// Store file (overrides `storage.path`).
    #[arg(long, global = true, env = "PORTAL_STORE")]
    store: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the account context, asking which account to use when there are several.
    Accounts,
    /// Switch to another account by its composite id.
    Select {
        /// `{CustomerNumber}-{AccountId}*{AccessToken}`
        account: String,
    },
    /// Publish the stored selection again.
    Reload,
    /// Clear local state and end the server session.
    Logout,
    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: config_commands::ConfigAction,
    },
    /// Remove everything from the store, for every brand.
    Clear,
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    // Logs go to stderr; stdout carries the published contexts.
    if cli.json_logs {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<PortalConfig> {
    let mut config = match &cli.config {
        Some(path) => portal_config::load_config(path)?,
        None => portal_config::discover_and_load(),
    };
    config = portal_config::apply_env_overrides(config);
    if let Some(store) = &cli.store {
        config.storage.path = Some(store.clone());
    }
    debug!(brand = %config.brand, details = config.load_account_details, "config loaded");
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "portal starting");

    match &cli.command {
        Commands::Config { action } => config_commands::handle_config(action, cli.config.as_deref()),
        Commands::Accounts => account_commands::accounts(&load_config(&cli)?).await,
        Commands::Select { account } => {
            account_commands::select(&load_config(&cli)?, account).await
        },
        Commands::Reload => account_commands::reload(&load_config(&cli)?).await,
        Commands::Logout => account_commands::logout(&load_config(&cli)?).await,
        Commands::Clear => account_commands::clear(&load_config(&cli)?),
    }
}
