//! admission-gateway
//!
//! ```text
//!     Client Request
//!     ──────────────▶ request id ─▶ logging ─▶ timeout
//!                                                │
//!                      ┌─────────────────────────┘
//!                      ▼
//!                 rate limit ─▶ CORS ─▶ CSRF ─▶ authentication ─▶ handler
//!                      │                                │
//!                      ▼                                ▼
//!               counter store                    token service
//!            (Redis, shared by all             (HS256, cookie pair,
//!             gateway instances)                refresh fallback)
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use admission_gateway::lifecycle::startup;

#[derive(Parser)]
#[command(name = "admission-gateway")]
#[command(about = "Session control and request admission gateway", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match startup::run(&cli.config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // Logging may not be up yet, so report on stderr as well.
            eprintln!("admission-gateway: {}", e);
            tracing::error!(error = %e, "Fatal startup error");
            ExitCode::FAILURE
        }
    }
}
