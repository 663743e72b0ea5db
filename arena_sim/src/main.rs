//! Arena environment CLI
//!
//! Boots a disposable matchmaking environment from a fleet dataset and
//! prints its summary. Useful for smoke-testing a dataset outside the test
//! suite.

use arena_env::ServerParams;
use arena_sim::create_environment;
use clap::Parser;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

/// Boot a disposable matchmaking test environment
#[derive(Parser, Debug)]
#[command(name = "arena-sim")]
#[command(about = "Boot a disposable matchmaking test environment", long_about = None)]
struct Args {
    /// Path to the fleet dataset file
    #[arg(short, long)]
    dataset: PathBuf,

    /// Maximum number of backing servers
    #[arg(long, default_value = "16")]
    max_servers: usize,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON summary for CI parsing
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    let cancel = CancellationToken::new();
    let params = ServerParams {
        max_servers: args.max_servers,
    };

    let mut env = match create_environment(&cancel, &args.dataset, params).await {
        Ok(env) => env,
        Err(e) => {
            error!("Failed to create environment: {}", e);
            std::process::exit(1);
        }
    };

    if args.json {
        let summary = serde_json::json!({
            "port": env.port,
            "servers": env.conns().iter().map(|(id, clients)| {
                serde_json::json!({
                    "id": id.to_string(),
                    "clients": clients.len(),
                })
            }).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&summary).unwrap());
    } else {
        info!("Environment ready on port {}", env.port);
        println!("{}", env.describe().await);
    }

    if let Err(e) = env.close().await {
        error!("Failed to close environment: {}", e);
        std::process::exit(1);
    }
}
