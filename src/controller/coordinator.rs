//! # Coordinator
//!
//! Facade over the charging and powering supervisors. It validates start and
//! stop requests against the registries, keeps one session per battery
//! (charging) and per device (powering), and owns the shutdown protocol.
//!
//! Lock order: session table, then battery lock, then registry lock.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use super::charging::ChargingSupervisor;
use super::powering::PowerWorker;
use super::session::{ChargingSession, Drain, PoweringSession, Session, SessionTable};
use super::{BatteryLocks, FlowContext};
use crate::config::CoordinatorConfig;
use crate::domain::{Device, Entity};
use crate::error::GridError;
use crate::events::journal::{self, PowerAction};
use crate::events::{EventCategory, EventSink};
use crate::registry::Registries;

/// What a start request did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum StartOutcome {
    Started,
    /// A session for this battery or device is already running.
    AlreadyActive,
    /// No energy source is active, so there is nothing to charge from.
    NoActiveSource,
    /// `shutdown` has been called; no new sessions are accepted.
    ShuttingDown,
}

pub struct Coordinator {
    ctx: FlowContext,
    root: CancellationToken,
    shutdown_grace: Duration,
    charging: Arc<SessionTable<ChargingSession>>,
    powering: Arc<SessionTable<PoweringSession>>,
    background: Mutex<Vec<(String, JoinHandle<()>)>>,
    shut_down: AtomicBool,
}

impl Coordinator {
    pub fn new(registries: Arc<Registries>, events: Arc<dyn EventSink>, cfg: &CoordinatorConfig) -> Self {
        Self {
            ctx: FlowContext {
                registries,
                events,
                locks: Arc::new(BatteryLocks::new()),
                tick: cfg.tick(),
            },
            root: CancellationToken::new(),
            shutdown_grace: cfg.shutdown_grace(),
            charging: Arc::default(),
            powering: Arc::default(),
            background: Mutex::new(Vec::new()),
            shut_down: AtomicBool::new(false),
        }
    }

    pub fn tick(&self) -> Duration {
        self.ctx.tick
    }

    /// Starts a charging supervisor for `battery_id`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start_charging(&self, battery_id: Uuid) -> Result<StartOutcome, GridError> {
        let registries = &self.ctx.registries;
        let battery = registries.batteries.get_by_id(battery_id)?;

        let mut sessions = self.charging.lock();
        if self.is_shut_down() {
            return Ok(StartOutcome::ShuttingDown);
        }
        if sessions.contains_key(&battery_id) || battery.is_charging {
            info!(battery = %battery.name, "battery is already charging");
            return Ok(StartOutcome::AlreadyActive);
        }
        if registries.active_sources().is_empty() {
            info!(battery = %battery.name, "no active energy source, not charging");
            return Ok(StartOutcome::NoActiveSource);
        }

        {
            let lock = self.ctx.locks.lock_for(battery_id);
            let _guard = lock.lock();
            registries.batteries.update(battery_id, |b| b.is_charging = true)?;
        }

        let session_id = Uuid::new_v4();
        info!(battery = %battery.name, %session_id, "charging started");
        journal::battery_event(self.ctx.events.as_ref(), "Started charging", &battery.name);

        let token = self.root.child_token();
        let supervisor = ChargingSupervisor::new(battery_id, session_id, self.ctx.clone(), self.charging.clone());
        let handle = tokio::spawn(supervisor.run(token.clone()));
        sessions.insert(
            battery_id,
            ChargingSession {
                session_id,
                battery_id,
                token,
                handle,
            },
        );
        Ok(StartOutcome::Started)
    }

    /// Ends charging for `battery_id`. Returns whether a session was running.
    pub fn stop_charging(&self, battery_id: Uuid) -> Result<bool, GridError> {
        let registries = &self.ctx.registries;
        let battery = registries.batteries.get_by_id(battery_id)?;

        let stopped = {
            let mut sessions = self.charging.lock();
            let session = sessions.remove(&battery_id);
            if let Some(session) = &session {
                session.token.cancel();
            }
            let lock = self.ctx.locks.lock_for(battery_id);
            let _guard = lock.lock();
            registries.batteries.update(battery_id, |b| b.is_charging = false)?;
            session.is_some()
        };
        if stopped {
            info!(battery = %battery.name, "charging stopped");
            journal::battery_event(self.ctx.events.as_ref(), "Stopped charging", &battery.name);
        } else {
            self.ctx.locks.forget(battery_id);
        }
        Ok(stopped)
    }

    /// Powers `device_id` from `battery_id` until stopped or the battery runs dry.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start_power(&self, device_id: Uuid, battery_id: Uuid) -> Result<StartOutcome, GridError> {
        let registries = &self.ctx.registries;
        let device = registries.devices.get_by_id(device_id)?;
        let battery = registries.batteries.get_by_id(battery_id)?;

        let mut sessions = self.powering.lock();
        if self.is_shut_down() {
            return Ok(StartOutcome::ShuttingDown);
        }
        if sessions.contains_key(&device_id) || device.is_active {
            info!(device = %device.name, "device is already powered");
            return Ok(StartOutcome::AlreadyActive);
        }
        registries.devices.update(device_id, |d| d.is_active = true)?;
        info!(device = %device.name, battery = %battery.name, "device powered on");
        journal::device_power_event(self.ctx.events.as_ref(), PowerAction::PoweredOn, &device.name, &battery.name);

        let session_id = Uuid::new_v4();
        let token = self.root.child_token();
        let worker = PowerWorker::new(device_id, battery_id, session_id, self.ctx.clone(), self.powering.clone());
        let handle = tokio::spawn(worker.run(token.clone()));
        sessions.insert(
            device_id,
            PoweringSession {
                session_id,
                device_id,
                battery_id,
                battery_name: battery.name,
                token,
                handle,
            },
        );
        Ok(StartOutcome::Started)
    }

    /// Switches `device_id` off. Returns whether a powering session was running.
    pub fn stop_power_device(&self, device_id: Uuid) -> Result<bool, GridError> {
        let registries = &self.ctx.registries;
        let device = registries.devices.get_by_id(device_id)?;

        let session = {
            let mut sessions = self.powering.lock();
            let session = sessions.remove(&device_id);
            if let Some(session) = &session {
                session.token.cancel();
            }
            registries.devices.update(device_id, |d| d.is_active = false)?;
            session
        };

        let events = self.ctx.events.as_ref();
        match session {
            Some(session) => {
                let battery = session.battery_name;
                info!(device = %device.name, %battery, "device powered off");
                journal::device_power_event(events, PowerAction::PoweredOff, &device.name, &battery);
                Ok(true)
            }
            None => {
                if device.is_active {
                    journal::toggle_event(events, Device::KIND, &device.name, false);
                }
                Ok(false)
            }
        }
    }

    /// Spawns a long-running task that is cancelled and joined on shutdown.
    pub fn spawn_background<F, Fut>(&self, name: &str, task: F) -> bool
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut background = self.background.lock();
        if self.is_shut_down() {
            return false;
        }
        let handle = tokio::spawn(task(self.root.child_token()));
        background.push((name.to_owned(), handle));
        true
    }

    pub fn is_charging_session_active(&self, battery_id: Uuid) -> bool {
        self.charging.contains(battery_id)
    }

    /// Batteries with a running charging supervisor.
    pub fn active_charging_sessions(&self) -> Vec<Uuid> {
        self.charging.keys()
    }

    /// Powered devices, each with the battery it draws from.
    pub fn active_power_sessions(&self) -> Vec<(Uuid, Uuid)> {
        self.powering
            .lock()
            .values()
            .map(|s| (s.device_id, s.battery_id))
            .collect()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    /// Stops every session and background task.
    ///
    /// Waits up to the configured grace period, then aborts whatever is left.
    /// Calling it again is a no-op.
    pub async fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        let registries = &self.ctx.registries;
        info!("coordinator shutting down");

        registries.sources.update_all(|s| s.is_active = false);
        registries.batteries.update_all(|b| b.is_charging = false);
        registries.devices.update_all(|d| d.is_active = false);

        let charging = self.charging.drain();
        let powering = self.powering.drain();
        let background = std::mem::take(&mut *self.background.lock());
        self.root.cancel();

        journal::log_event(
            self.ctx.events.as_ref(),
            EventCategory::System,
            "Shutdown",
            "Coordinator",
            Some(&format!(
                "Stopped {} charging and {} powering sessions",
                charging.len(),
                powering.len()
            )),
        );

        let mut handles = Vec::with_capacity(charging.len() + powering.len() + background.len());
        handles.extend(charging.into_iter().map(Session::into_handle));
        handles.extend(powering.into_iter().map(Session::into_handle));
        handles.extend(background.into_iter().map(|(_, handle)| handle));

        let Drain { handles, aborts } = Drain::new(handles);
        let pending = handles.len();
        match tokio::time::timeout(self.shutdown_grace, futures::future::join_all(handles)).await {
            Ok(results) => {
                for e in results.into_iter().filter_map(Result::err) {
                    warn!(error = %e, "session task failed during shutdown");
                }
                info!(tasks = pending, battery_locks = self.ctx.locks.len(), "coordinator stopped");
            }
            Err(_) => {
                warn!(
                    tasks = pending,
                    grace_ms = self.shutdown_grace.as_millis() as u64,
                    "shutdown grace elapsed, aborting remaining tasks"
                );
                for abort in aborts {
                    abort.abort();
                }
            }
        }
    }
}
