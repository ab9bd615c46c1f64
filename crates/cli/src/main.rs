//! Counsel CLI — the main entry point.
//!
//! Commands:
//! - `onboard`  — Write a default counsel.toml
//! - `migrate`  — Create/upgrade the database schema
//! - `add-user` — Create an account
//! - `serve`    — Start the HTTP API server

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "counsel",
    about = "Counsel — LLM chat backend for micro-business assistants",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Onboard,

    /// Create or upgrade the database schema
    Migrate,

    /// Create a user account
    AddUser {
        /// Login email
        #[arg(long)]
        email: String,

        /// Display name
        #[arg(long)]
        name: String,

        /// Password (plaintext; hashed before storage)
        #[arg(long)]
        password: String,
    },

    /// Start the HTTP API server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Onboard => commands::onboard::run()?,
        Commands::Migrate => commands::migrate::run().await?,
        Commands::AddUser {
            email,
            name,
            password,
        } => commands::add_user::run(&email, &name, &password).await?,
        Commands::Serve { port } => commands::serve::run(port).await?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }
}
