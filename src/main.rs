//! Nimbus - synchronized todo list with generative-AI surfaces
//!
//! A terminal client that keeps a todo collection live-synchronized
//! (snapshots plus optimistic overlays), streams assistant replies, and
//! generates recipes and haikus. Runs entirely against the in-process
//! sandbox backend.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

use nimbus::auth::AuthProvider;
use nimbus::config::Config;
use nimbus::repl::{colors, Repl};
use nimbus::sandbox::{self, SandboxAuth};
use nimbus::Client;

#[derive(Parser)]
#[command(name = "nimbus")]
#[command(about = "Synchronized todo list with generative-AI surfaces")]
struct Args {
    /// Login name for the sandbox identity
    #[arg(long, env = "NIMBUS_USERNAME")]
    username: Option<String>,

    /// Data directory for sandbox storage
    #[arg(long, env = "NIMBUS_DATA_DIR")]
    data_dir: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (from ~/.nimbus/.env or current dir)
    let env_path = dirs::home_dir()
        .map(|h| h.join(".nimbus").join(".env"))
        .filter(|p| p.exists());
    if let Some(path) = env_path {
        let _ = dotenvy::from_path(&path);
    } else {
        let _ = dotenvy::dotenv(); // fallback to current dir
    }

    // Initialize logging
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    // Load config file (~/.nimbus/config.toml)
    let config = Config::load();

    // Resolve values: CLI args > env vars (handled by clap) > config file > defaults
    let username = args
        .username
        .or(config.username)
        .unwrap_or_else(|| "guest".to_string());

    let data_dir = args
        .data_dir
        .or(config.data_dir)
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_default()
                .join(".nimbus")
                .join("data")
        });

    use colors::ansi::*;

    // Pretty startup banner
    println!();
    println!(
        "{}",
        colors::banner_accent(&format!("  Nimbus {}", env!("CARGO_PKG_VERSION")))
    );
    println!("{}", colors::separator(50));
    println!("{}User{}        {}", DIM, RESET, username);
    println!("{}Data dir{}    {}", DIM, RESET, data_dir.display());
    println!("{}Backend{}     sandbox (in-process)", DIM, RESET);

    let auth = SandboxAuth::new(&username);
    let services = sandbox::bundle(&data_dir);

    let client = match Client::connect(auth.current_session(), services).await {
        Ok(client) => {
            println!("{}Sync{}        {}connected{}", DIM, RESET, GREEN, RESET);
            client
        }
        Err(e) => {
            println!("{}Sync{}        {}failed{} ({})", DIM, RESET, RED, RESET, e);
            return Err(e.into());
        }
    };

    // Warm the file listing; an empty data dir is fine.
    if let Err(e) = client.files().refresh().await {
        println!("{}Files{}       {}unavailable{} ({})", DIM, RESET, YELLOW, RESET, e);
    } else {
        let n = client.files().entries().len();
        println!("{}Files{}       {} cached", DIM, RESET, n);
    }

    println!("{}", colors::separator(50));
    println!();

    let mut repl = Repl::new(Arc::clone(&client))?;
    let outcome = repl.run().await;

    client.shutdown();
    outcome
}
