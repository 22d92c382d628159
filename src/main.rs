//! Process entry point: parse arguments, load the dataset, serve HTTP.
//!
//! The dataset must load and clean successfully before the listener binds; a
//! missing or corrupt source file aborts startup.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use enrollment_api::server::{run_server, ServerConfig};
use enrollment_api::store::EnrollmentStore;

/// Read-only HTTP API over DKI Jakarta school-enrollment counts
#[derive(Parser, Debug)]
#[command(name = "enrollment-api")]
#[command(about = "Serve aggregated school-enrollment views over HTTP")]
#[command(version)]
struct Args {
    /// Path to the source CSV
    #[arg(
        short,
        long,
        env = "ENROLLMENT_DATA",
        default_value = "data-dki-menurut-pendidikan-tahun-2014.csv"
    )]
    data: PathBuf,

    /// Port for the HTTP server
    #[arg(short, long, env = "ENROLLMENT_PORT", default_value = "8000")]
    port: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing - RUST_LOG takes precedence, fallback to info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let store = EnrollmentStore::load(&args.data)
        .with_context(|| format!("loading enrollment data from {}", args.data.display()))?;

    run_server(store, ServerConfig { port: args.port }).await
}
