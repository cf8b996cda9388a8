//! CLI tool for managing account records
//!
//! Works directly on the database, so it can be used while the gateway is
//! stopped or from a shell on the host.
//!
//! # Usage
//!
//! ```bash
//! # Activate or renew an account for 30 days
//! account-admin add wxid_42 30 --name Alice --remark "paid by transfer"
//!
//! # Delete an account
//! account-admin del wxid_42
//!
//! # List all accounts
//! account-admin list
//!
//! # Show one account
//! account-admin info wxid_42
//!
//! # Write a default configuration file
//! account-admin init-config
//! ```

use account_rs::admin::{AdminCommand, AdminCommandHandler, MAX_DAYS};
use account_rs::config::AccountConfig;
use account_rs::storage::StoreRegistry;
use account_rs::{logging, AccountError};
use chrono::Local;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "account-admin")]
#[command(about = "Manage subscription accounts", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = "account.toml")]
    config: PathBuf,

    /// Database path, overrides the configuration file
    #[arg(short, long)]
    db: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add or renew an account
    Add {
        /// User or group id
        identity: String,
        /// Days of access starting now
        #[arg(value_parser = clap::value_parser!(i64).range(1..=MAX_DAYS))]
        days: i64,
        /// Display name
        #[arg(long)]
        name: Option<String>,
        /// Free-text remark
        #[arg(long)]
        remark: Option<String>,
    },
    /// Delete an account
    Del {
        /// User or group id
        identity: String,
    },
    /// List all accounts
    List,
    /// Show one account
    Info {
        /// User or group id
        identity: String,
    },
    /// Write the default configuration to the config path
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let command = match cli.command {
        Commands::InitConfig { force } => return init_config(&cli.config, force),
        Commands::Add {
            identity,
            days,
            name,
            remark,
        } => AdminCommand::Add {
            identity,
            days,
            display_name: name,
            remark,
        },
        Commands::Del { identity } => AdminCommand::Delete { identity },
        Commands::List => AdminCommand::List,
        Commands::Info { identity } => AdminCommand::Info { identity },
    };

    let mut config = logging::with_bootstrap(|| AccountConfig::load(&cli.config))?;
    if let Some(db) = cli.db {
        config.storage.database_path = db;
    }
    logging::init(&config.logging);

    let registry = StoreRegistry::new();
    let store = registry.open(&config.storage).await?;
    let handler = AdminCommandHandler::new(store, &config.access.command_prefix);

    let result = handler.execute(&command, Local::now()).await;
    registry.close_all().await;

    match result {
        Ok(output) => {
            println!("{}", output);
            Ok(())
        }
        Err(e @ AccountError::NotFound(_)) | Err(e @ AccountError::Validation(_)) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
        Err(e) => Err(e.into()),
    }
}

fn init_config(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        eprintln!(
            "Error: {} already exists, use --force to overwrite",
            path.display()
        );
        std::process::exit(1);
    }

    AccountConfig::default().write_to(path)?;
    println!("✓ Wrote default configuration to {}", path.display());
    Ok(())
}
