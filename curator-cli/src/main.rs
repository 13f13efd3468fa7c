//! Main entry point for the Curator CLI.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use dotenv::dotenv;
use shared::config::ClientConfig;
use std::path::PathBuf;

mod commands;
mod logging;

use commands::account::{PasswordCommand, ProfileArgs, RegisterArgs};

/// Curator CLI
#[derive(Debug, Parser)]
#[command(name = "curator")]
#[command(about = "Command-line client for the Curator content-management API", long_about = None)]
struct Cli {
    /// Path to the configuration file (yaml, json or toml)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Subcommands for the Curator CLI
#[derive(Debug, Subcommand)]
enum Commands {
    /// Sign in and store the issued tokens
    Login {
        /// Account email; prompted for when omitted
        #[arg(long, short)]
        email: Option<String>,
    },
    /// Show the signed-in profile
    Me,
    /// Sign out and remove the stored tokens
    Logout,
    /// Exchange the stored refresh token for a new access token
    Refresh,
    /// Create a new account
    Register(RegisterArgs),
    /// Update fields of the signed-in profile
    Profile(ProfileArgs),
    /// Change or reset the account password
    Password {
        #[command(subcommand)]
        command: PasswordCommand,
    },
    /// Upload a new avatar image
    Avatar {
        /// Image file to upload
        path: PathBuf,
    },
    /// Generate a configuration file with default values
    Config {
        /// Format of the configuration file to generate (yaml, json or toml). Defaults to yaml.
        #[arg(long, short)]
        format: Option<String>,

        /// Where to write the file. Defaults to `curator.<format>` in the current directory.
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Generate shell completion scripts for the CLI
    Completion {
        /// The shell type for which to generate the completion script
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Commands::Config { format, output } => {
            let format = format.unwrap_or_else(|| "yaml".to_string());
            commands::config::generate_config(&format, output)?;
            return Ok(());
        }
        Commands::Completion { shell } => {
            commands::completion::generate_completion(shell);
            return Ok(());
        }
        _ => {}
    }

    let config = ClientConfig::load_config(cli.config).context("failed to load configuration")?;
    logging::initialize_tracing(&config);
    let manager = commands::session::build_manager(&config)?;
    let token_path = config.resolved_token_path();

    match cli.command {
        Commands::Login { email } => commands::session::login(&manager, &token_path, email).await,
        Commands::Me => commands::session::me(&manager).await,
        Commands::Logout => {
            commands::session::logout(&manager, &token_path);
            Ok(())
        }
        Commands::Refresh => commands::session::refresh(&manager).await,
        Commands::Register(args) => commands::account::register(&manager, args).await,
        Commands::Profile(args) => commands::account::update_profile(&manager, args).await,
        Commands::Password { command } => commands::account::password(&manager, command).await,
        Commands::Avatar { path } => commands::account::upload_avatar(&manager, &path).await,
        Commands::Config { .. } | Commands::Completion { .. } => Ok(()),
    }
}
