//! Marketstall CLI - database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run schema and session store migrations
//! ms-cli migrate
//!
//! # Create an admin account
//! ms-cli admin create -e admin@example.com -p 'long passphrase' -n "Admin Name"
//!
//! # Grant or revoke admin on an existing account
//! ms-cli admin promote -e someone@example.com
//! ms-cli admin demote -e someone@example.com
//!
//! # Upsert catalog products from YAML
//! ms-cli seed products catalog.yaml
//! ```
//!
//! Every command reads `DATABASE_URL` (a `.env` file is honoured).

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "ms-cli")]
#[command(author, version, about = "Marketstall CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database and session store migrations
    Migrate,
    /// Manage admin accounts
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
    /// Load data from files
    Seed {
        #[command(subcommand)]
        target: SeedTarget,
    },
}

#[derive(Subcommand)]
enum AdminAction {
    /// Create a new account with the admin flag set
    Create {
        /// Email address
        #[arg(short, long)]
        email: String,

        /// Password
        #[arg(short, long)]
        password: String,

        /// Display name
        #[arg(short, long)]
        name: Option<String>,
    },
    /// Grant admin to an existing account
    Promote {
        /// Email address
        #[arg(short, long)]
        email: String,
    },
    /// Revoke admin from an account
    Demote {
        /// Email address
        #[arg(short, long)]
        email: String,
    },
}

#[derive(Subcommand)]
enum SeedTarget {
    /// Upsert products by name from a YAML file
    Products {
        /// Path to the YAML file
        file: String,
    },
}

#[tokio::main]
async fn main() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Admin { action } => match action {
            AdminAction::Create {
                email,
                password,
                name,
            } => {
                commands::admin::create_user(&email, &password, name.as_deref()).await?;
            }
            AdminAction::Promote { email } => commands::admin::set_admin(&email, true).await?,
            AdminAction::Demote { email } => commands::admin::set_admin(&email, false).await?,
        },
        Commands::Seed { target } => match target {
            SeedTarget::Products { file } => {
                commands::seed::products(&file).await?;
            }
        },
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_admin_create() {
        let cli = Cli::try_parse_from([
            "ms-cli", "admin", "create", "-e", "a@b.co", "-p", "secret-pass",
        ])
        .unwrap();
        match cli.command {
            Commands::Admin {
                action: AdminAction::Create { email, name, .. },
            } => {
                assert_eq!(email, "a@b.co");
                assert!(name.is_none());
            }
            _ => panic!("wrong command"),
        }
    }

    #[test]
    fn test_parse_seed_products() {
        let cli = Cli::try_parse_from(["ms-cli", "seed", "products", "catalog.yaml"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Seed {
                target: SeedTarget::Products { file }
            } if file == "catalog.yaml"
        ));
    }
}
