mod commands;
pub mod core;

use clap::Parser;
use tracing_subscriber::EnvFilter;

pub use commands::{exit_code, Cli};

/// Parse the command line, install, and return the process exit code.
pub fn run() -> i32 {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,installer_lib=debug")),
        )
        .init();

    let cli = Cli::parse();
    tracing::info!("Installer starting...");

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!("Failed to start async runtime: {}", e);
            return 1;
        }
    };
    runtime.block_on(commands::execute(cli))
}
