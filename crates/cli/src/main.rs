//! Marketplace CLI - Database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! mp-cli migrate
//!
//! # Create an admin account
//! mp-cli user create-admin --phone 09120000000 --first-name Sara --last-name Karimi
//!
//! # Approve a seller
//! mp-cli user seller-status --id 42 --status approved
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `user create-admin` - Create an admin account
//! - `user promote` - Grant admin to an existing account
//! - `user seller-status` - Approve, suspend or hold a seller

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "mp-cli")]
#[command(author, version, about = "Marketplace CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage users
    User {
        #[command(subcommand)]
        action: UserAction,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Create a new admin account
    CreateAdmin {
        /// Mobile number, 11 digits starting with 09
        #[arg(short, long)]
        phone: String,

        #[arg(long)]
        first_name: String,

        #[arg(long)]
        last_name: String,

        /// Account password
        #[arg(long, env = "MP_ADMIN_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Grant the admin role to an existing account
    Promote {
        #[arg(short, long)]
        phone: String,
    },
    /// Set a store owner's seller status (`pending`, `approved`, `suspended`)
    SellerStatus {
        /// Store owner's user ID
        #[arg(long)]
        id: i64,

        #[arg(short, long)]
        status: String,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CommandError> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::User { action } => match action {
            UserAction::CreateAdmin {
                phone,
                first_name,
                last_name,
                password,
            } => {
                commands::users::create_admin(&phone, &first_name, &last_name, &password).await?;
            }
            UserAction::Promote { phone } => {
                commands::users::promote(&phone).await?;
            }
            UserAction::SellerStatus { id, status } => {
                commands::users::set_seller_status(id, &status).await?;
            }
        },
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_seller_status() {
        let cli = Cli::try_parse_from([
            "mp-cli",
            "user",
            "seller-status",
            "--id",
            "7",
            "--status",
            "suspended",
        ]);
        assert!(matches!(
            cli.map(|c| c.command),
            Ok(Commands::User {
                action: UserAction::SellerStatus { id: 7, .. }
            })
        ));
    }
}
