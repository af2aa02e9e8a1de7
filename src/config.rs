use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use figment::{providers::{Env, Format, Toml}, Figment};
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub coordinator: CoordinatorConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub event_log: EventLogConfig,
    #[serde(default)]
    pub house: HouseFileConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Interval at which supervisors reconcile and workers re-evaluate.
    pub tick_ms: u64,
    /// Upper bound on how long `shutdown` waits before aborting tasks.
    pub shutdown_grace_ms: u64,
    /// Runtime worker threads shared by all supervisors and workers.
    pub worker_threads: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            tick_ms: 3_000,
            shutdown_grace_ms: 5_000,
            worker_threads: 10,
        }
    }
}

impl CoordinatorConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    /// Same settings with a different tick; handy for tests and demos.
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick_ms = tick.as_millis() as u64;
        self
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace_ms = grace.as_millis() as u64;
        self
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub enabled: bool,
    pub interval_ms: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self { enabled: true, interval_ms: 5_000 }
    }
}

impl MonitorConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(1))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EventLogConfig {
    /// Root of the on-disk event log. `None` routes events to tracing only.
    pub dir: Option<PathBuf>,
}

impl Default for EventLogConfig {
    fn default() -> Self {
        Self { dir: Some(PathBuf::from("logs")) }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HouseFileConfig {
    /// YAML house description loaded at startup.
    pub path: Option<PathBuf>,
}

/// Log line encoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub format: LogFormat,
    /// `EnvFilter` directives used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Json,
            filter: "info,home_energy_grid=info".into(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let figment = Figment::new()
            .merge(Toml::file("config/default.toml"))
            .merge(Env::prefixed("GRID__").split("__"));
        Ok(figment.extract()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_timing() {
        let cfg = Config::default();
        assert_eq!(cfg.coordinator.tick(), Duration::from_secs(3));
        assert_eq!(cfg.coordinator.shutdown_grace(), Duration::from_secs(5));
        assert_eq!(cfg.coordinator.worker_threads, 10);
        assert_eq!(cfg.monitor.interval(), Duration::from_secs(5));
        assert!(cfg.house.path.is_none());
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let cfg: Config = Figment::new()
            .merge(Toml::string("[coordinator]\ntick_ms = 250\n\n[monitor]\nenabled = false\n"))
            .extract()
            .unwrap();
        assert_eq!(cfg.coordinator.tick(), Duration::from_millis(250));
        assert_eq!(cfg.coordinator.shutdown_grace_ms, 5_000);
        assert!(!cfg.monitor.enabled);
        assert_eq!(cfg.event_log.dir, Some(PathBuf::from("logs")));
        assert_eq!(cfg.telemetry.format, LogFormat::Json);
    }

    #[test]
    fn log_format_reads_lowercase_names() {
        let cfg: Config = Figment::new()
            .merge(Toml::string("[telemetry]\nformat = \"pretty\"\n"))
            .extract()
            .unwrap();
        assert_eq!(cfg.telemetry.format, LogFormat::Pretty);
        assert_eq!(cfg.telemetry.filter, TelemetryConfig::default().filter);
    }

    #[test]
    fn zero_tick_is_clamped() {
        let cfg = CoordinatorConfig::default().with_tick(Duration::ZERO);
        assert_eq!(cfg.tick(), Duration::from_millis(1));
    }
}
