use std::io::{BufRead, Read};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use blackswan_agents::Orchestrator;
use blackswan_models::AnalysisRequest;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "blackswan", about = "Black swan event analysis")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/blackswan.toml")]
    config: String,

    /// Read AnalysisRequest JSON from a file instead of stdin
    #[arg(short, long)]
    input: Option<String>,

    /// Pretty-print the output JSON
    #[arg(long)]
    pretty: bool,

    /// Read one AnalysisRequest per line and emit one JSON line per request
    #[arg(long)]
    batch: bool,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays pure JSON (respects RUST_LOG)
    if cli.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .init();
    }

    let config = blackswan::load_config(&cli.config)?;
    let orchestrator =
        blackswan::build_orchestrator(&config).context("Failed to build orchestrator")?;

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling");
            ctrl_c.cancel();
        }
    });

    if cli.batch {
        let sweeper = tokio::spawn(blackswan_cache::sweep_loop(
            Arc::clone(orchestrator.cache()),
            Duration::from_secs(config.cache.cleanup_interval_seconds.max(1)),
            cancel.child_token(),
        ));
        let outcome = run_batch(&orchestrator, &cancel).await;
        cancel.cancel();
        let _ = sweeper.await;
        return outcome;
    }

    // Read request
    let request_json = if let Some(input_path) = &cli.input {
        std::fs::read_to_string(input_path)
            .with_context(|| format!("Failed to read input: {input_path}"))?
    } else {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read from stdin")?;
        buf
    };

    let request: AnalysisRequest =
        serde_json::from_str(&request_json).context("Failed to parse AnalysisRequest JSON")?;

    let result = orchestrator
        .analyze_until_cancelled(&request, &cancel)
        .await
        .map_err(|e| anyhow::anyhow!("Analysis failed: {e}"))?;

    // Output result as JSON to stdout
    let output = if cli.pretty {
        serde_json::to_string_pretty(&result)?
    } else {
        serde_json::to_string(&result)?
    };
    println!("{output}");

    Ok(())
}

/// One request per stdin line, one `{"ok": ..}` or `{"error": ..}` line out.
async fn run_batch(orchestrator: &Orchestrator, cancel: &CancellationToken) -> Result<()> {
    let (tx, mut rx) = tokio::sync::mpsc::channel::<std::io::Result<String>>(16);
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            if tx.blocking_send(line).is_err() {
                break;
            }
        }
    });

    let mut processed = 0usize;
    loop {
        let line = tokio::select! {
            line = rx.recv() => line,
            _ = cancel.cancelled() => break,
        };
        let Some(line) = line else { break };
        let line = line.context("Failed to read from stdin")?;
        if line.trim().is_empty() {
            continue;
        }

        let output = match serde_json::from_str::<AnalysisRequest>(&line) {
            Ok(request) => match orchestrator.analyze_until_cancelled(&request, cancel).await {
                Ok(result) => serde_json::json!({ "ok": result }),
                Err(e) => serde_json::json!({ "error": e.to_string() }),
            },
            Err(e) => serde_json::json!({ "error": format!("Invalid AnalysisRequest: {e}") }),
        };
        println!("{output}");
        processed += 1;

        if cancel.is_cancelled() {
            break;
        }
    }

    info!(processed, "Batch complete");
    Ok(())
}
