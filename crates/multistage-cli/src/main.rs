//! multistage CLI
//!
//! Compiles multi-stage test definitions into pod and SecretProviderClass
//! manifests.

use clap::Parser;

use multistage_cli::{Cli, Result};
use multistage_common::telemetry::{init_telemetry, TelemetryConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_telemetry(&TelemetryConfig {
        json: cli.log_json,
        ..Default::default()
    })?;

    cli.run().await
}
