use std::sync::Arc;

use anyhow::Result;
use home_energy_grid::events::{EventSink, FileEventLog, TracingEventSink};
use home_energy_grid::{config, controller, telemetry};
use config::Config;
use telemetry::init_tracing;
use tracing::{info, warn};

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cfg = Config::load()?;
    init_tracing(&cfg.telemetry);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(cfg.coordinator.worker_threads.max(1))
        .enable_all()
        .build()?;

    runtime.block_on(run(cfg))
}

async fn run(cfg: Config) -> Result<()> {
    let file_log = match &cfg.event_log.dir {
        Some(dir) => {
            let log = FileEventLog::open(dir.clone()).await?;
            info!(dir = %log.dir().display(), "writing event log files");
            Some(Arc::new(log))
        }
        None => None,
    };
    let events: Arc<dyn EventSink> = match &file_log {
        Some(log) => log.clone(),
        None => Arc::new(TracingEventSink),
    };

    let grid = controller::GridContext::new(cfg.clone(), events);

    if let Some(path) = &cfg.house.path {
        if let Err(e) = grid.load_house(path) {
            warn!(error = %e, path = %path.display(), "house configuration not loaded");
        }
    }

    grid.spawn_background_tasks();
    info!(
        tick_ms = cfg.coordinator.tick_ms,
        worker_threads = cfg.coordinator.worker_threads,
        "household energy grid running"
    );

    let signal = telemetry::shutdown_signal().await;

    info!(%signal, "stopping household energy grid");
    grid.shutdown().await;
    if let Some(log) = &file_log {
        log.flush().await;
    }

    warn!("shutdown complete");
    Ok(())
}
