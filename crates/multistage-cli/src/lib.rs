//! Multi-stage CLI library

pub mod commands;
pub mod config;
pub mod error;

pub use error::{Error, Result};

use clap::{Parser, Subcommand};

/// multistage - compile multi-stage test steps into pods
#[derive(Parser, Debug)]
#[command(name = "multistage")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true, env = "MULTISTAGE_LOG_JSON")]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Render the pods of every phase and observer of a test
    Render(commands::render::RenderArgs),
    /// Render the SecretProviderClasses backing CSI-mounted credentials
    SecretProviderClasses(commands::spc::SpcArgs),
    /// Print the volume and provider class names of a credential group
    Name(commands::name::NameArgs),
    /// Print the JSON schema of test definition files
    Schema,
}

impl Cli {
    /// Run the CLI command
    pub async fn run(self) -> Result<()> {
        match self.command {
            Commands::Render(args) => commands::render::run(args).await,
            Commands::SecretProviderClasses(args) => commands::spc::run(args).await,
            Commands::Name(args) => commands::name::run(args).await,
            Commands::Schema => commands::schema::run().await,
        }
    }
}
