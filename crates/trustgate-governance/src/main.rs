//! trustgate hook process
//!
//! - Config: `$TRUSTGATE_CONFIG` (default `trustgate.yaml`), built-in defaults when absent
//! - Input: newline-delimited JSON hook events on stdin
//! - Output: one JSON response line per event on stdout
//! - Logs: stderr, filtered by `RUST_LOG`

use std::path::Path;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::{fmt, EnvFilter};

use trustgate_core::error::{GovernanceError, Result};
use trustgate_core::policy::PolicyRegistry;
use trustgate_governance::accel::{AcceleratorSlot, NoAccelerator};
use trustgate_governance::config::{self, GovernanceConfig};
use trustgate_governance::governance::Governance;
use trustgate_governance::hook::HookServer;

const DEFAULT_CONFIG: &str = "trustgate.yaml";

#[tokio::main]
async fn main() {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run().await {
        tracing::error!(code = e.code().as_str(), error = %e, "trustgate-hook stopped");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let path = std::env::var("TRUSTGATE_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG.to_string());
    let cfg = if Path::new(&path).exists() {
        config::load_from_file(&path)?
    } else {
        tracing::info!(%path, "config not found, using defaults");
        GovernanceConfig::default()
    };

    let slot = if cfg.acceleration.enabled {
        AcceleratorSlot::new(NoAccelerator::default())
    } else {
        AcceleratorSlot::disabled()
    };
    let backend = slot.select().await;

    let mut registry = PolicyRegistry::new();
    let governance =
        Governance::from_config(&cfg, Path::new(&path).parent(), &mut registry)?.with_backend(backend)?;

    tracing::info!(
        policy_id = %governance.policy().id(),
        backend = governance.backend().name(),
        "trustgate-hook starting"
    );
    let mut server = HookServer::new(governance);

    let io_err = |e: std::io::Error| GovernanceError::Internal(format!("stdio: {e}"));
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await.map_err(io_err)? {
        if line.trim().is_empty() {
            continue;
        }
        let mut response = server.handle_line(&line);
        response.push('\n');
        stdout.write_all(response.as_bytes()).await.map_err(io_err)?;
        stdout.flush().await.map_err(io_err)?;
    }

    tracing::info!("stdin closed, exiting");
    Ok(())
}
