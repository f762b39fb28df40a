use std::env;

use log::{info, warn};
use tokio_util::sync::CancellationToken;

use status_snapshot_collector::{
    collector::runner::CollectionOrchestrator,
    config::load_config,
    metrics::METRICS,
    sources,
};

// ------------------------------------------------------------
// Application entry point
// ------------------------------------------------------------
//
// Runs exactly one collection cycle and prints the snapshot as
// JSON on stdout. Scheduling (cron / systemd timer) and storage of
// the snapshot are left to the caller.
//
// Exit status:
// - 0 once a snapshot was produced, even if every source failed
// - non-zero only for configuration / startup errors
//
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let path = env::args().nth(1).unwrap_or_else(|| "config.json".to_string());
    let config = load_config(&path)?;

    init_logging(config.debug_log());
    info!("loaded configuration from {}", path);

    let units = sources::build_units(&config)?;
    if units.is_empty() {
        warn!("every configured source is disabled");
    }

    let mut orchestrator = CollectionOrchestrator::new(config.retry.policy()?);
    if let Some(deadline) = config.deadline() {
        orchestrator = orchestrator.with_deadline(deadline);
    }

    // --------------------------------------------------------
    // Ctrl-C aborts pending backoff sleeps; the run still
    // settles and a (partially cancelled) snapshot is printed.
    // --------------------------------------------------------
    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, cancelling collection");
                cancel.cancel();
            }
        }
    });

    let result = orchestrator.run_all_with_cancel(units, &cancel).await;

    info!("[METRICS] {}", METRICS.summary());
    println!("{}", serde_json::to_string_pretty(&result)?);

    Ok(())
}

fn init_logging(debug: bool) {
    let default_filter = if debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
}
