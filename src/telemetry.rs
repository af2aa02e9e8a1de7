//! Log output for the grid process and the signals that stop it.

use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, TelemetryConfig};

/// Installs the global subscriber. `RUST_LOG` overrides the configured filter.
pub fn init_tracing(cfg: &TelemetryConfig) {
    let registry = tracing_subscriber::registry().with(filter(cfg));
    match cfg.format {
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(fmt::layer().pretty()).init(),
    }
}

fn filter(cfg: &TelemetryConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.filter))
}

/// Which signal ended the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum ShutdownSignal {
    #[strum(serialize = "ctrl-c")]
    CtrlC,
    #[strum(serialize = "SIGTERM")]
    Terminate,
}

/// Resolves on the first Ctrl+C or SIGTERM.
///
/// A handler that cannot be installed is logged and never fires, so the other
/// one still works.
pub async fn shutdown_signal() -> ShutdownSignal {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    let signal = tokio::select! {
        _ = ctrl_c => ShutdownSignal::CtrlC,
        _ = terminate() => ShutdownSignal::Terminate,
    };
    info!(%signal, "shutdown requested");
    signal
}

#[cfg(unix)]
async fn terminate() {
    match signal::unix::signal(signal::unix::SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            error!(error = %e, "cannot install SIGTERM handler");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}
