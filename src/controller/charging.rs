//! # Charging supervisor
//!
//! One supervisor runs per charging battery. It owns a pool of charge
//! workers, one per active energy source, and reconciles that pool against
//! the registry every tick:
//!
//! ```text
//! tick ─► battery still charging? ─► reap finished workers
//!      ─► cancel workers of sources that went inactive
//!      ─► spawn workers for sources that became active
//!      ─► every worker done? ─► "Charging complete"
//! ```
//!
//! ## Rules
//! - A finished worker keeps its slot so the same source is not restarted
//!   while it stays active; only a source that went inactive frees its slot.
//! - The pool's drop guard cancels every remaining worker and clears
//!   `is_charging`, whatever way the supervisor exits (abort and panic
//!   included).

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures::FutureExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::charge_worker::{ChargeStop, ChargeWorker};
use super::session::{ChargingSession, SessionTable};
use super::FlowContext;
use crate::events::{journal, EventCategory};

enum Slot {
    Running {
        token: CancellationToken,
        handle: JoinHandle<Option<ChargeStop>>,
    },
    Finished,
}

/// Why a supervisor left its loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
enum Exit {
    Complete,
    NoActiveSource,
    Stopped,
    BatteryRemoved,
    Cancelled,
}

/// Worker slots keyed by source id.
///
/// Dropping the pool is the supervisor's cleanup path.
struct WorkerPool {
    battery_id: Uuid,
    session_id: Uuid,
    ctx: FlowContext,
    sessions: Arc<SessionTable<ChargingSession>>,
    slots: HashMap<Uuid, Slot>,
}

impl WorkerPool {
    /// Collects workers that returned since the last tick.
    fn reap(&mut self) {
        let mut freed = Vec::new();
        for (source_id, slot) in self.slots.iter_mut() {
            let Slot::Running { handle, .. } = slot else {
                continue;
            };
            if !handle.is_finished() {
                continue;
            }
            match handle.now_or_never() {
                // The source was off when the worker looked; let reconcile decide again.
                Some(Ok(Some(ChargeStop::SourceInactive))) => freed.push(*source_id),
                Some(Ok(reason)) => {
                    debug!(battery_id = %self.battery_id, %source_id, ?reason, "charge worker pruned");
                    *slot = Slot::Finished;
                }
                Some(Err(e)) => {
                    warn!(battery_id = %self.battery_id, %source_id, error = %e, "charge worker failed");
                    *slot = Slot::Finished;
                }
                None => {}
            }
        }
        for source_id in freed {
            self.slots.remove(&source_id);
        }
    }

    fn reconcile(&mut self, active: &HashSet<Uuid>, session: &CancellationToken) {
        let gone: Vec<Uuid> = self
            .slots
            .keys()
            .filter(|id| !active.contains(id))
            .copied()
            .collect();
        for source_id in gone {
            if let Some(Slot::Running { token, .. }) = self.slots.remove(&source_id) {
                token.cancel();
                debug!(battery_id = %self.battery_id, %source_id, "source inactive, worker cancelled");
            }
        }

        for &source_id in active {
            if self.slots.contains_key(&source_id) {
                continue;
            }
            let token = session.child_token();
            let worker = ChargeWorker::new(self.battery_id, source_id, self.ctx.clone());
            let handle = tokio::spawn(worker.run(token.clone()));
            debug!(battery_id = %self.battery_id, %source_id, "charge worker spawned");
            self.slots.insert(source_id, Slot::Running { token, handle });
        }
    }

    fn all_finished(&self) -> bool {
        self.slots.values().all(|slot| matches!(slot, Slot::Finished))
    }

    /// Cancels every running worker and waits for it to return.
    async fn stop_workers(&mut self) {
        let running: Vec<JoinHandle<Option<ChargeStop>>> = self
            .slots
            .drain()
            .filter_map(|(_, slot)| match slot {
                Slot::Running { token, handle } => {
                    token.cancel();
                    Some(handle)
                }
                Slot::Finished => None,
            })
            .collect();
        for result in futures::future::join_all(running).await {
            if let Err(e) = result {
                warn!(battery_id = %self.battery_id, error = %e, "charge worker failed during teardown");
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        for slot in self.slots.values() {
            if let Slot::Running { token, .. } = slot {
                token.cancel();
            }
        }

        let registries = &self.ctx.registries;
        let lock = self.ctx.locks.lock_for(self.battery_id);
        self.sessions.release_then(self.battery_id, self.session_id, || {
            let _guard = lock.lock();
            let _ = registries.batteries.update(self.battery_id, |b| b.is_charging = false);
        });
        drop(lock);
        self.ctx.locks.forget(self.battery_id);
    }
}

pub(crate) struct ChargingSupervisor {
    battery_id: Uuid,
    session_id: Uuid,
    ctx: FlowContext,
    sessions: Arc<SessionTable<ChargingSession>>,
}

impl ChargingSupervisor {
    pub fn new(
        battery_id: Uuid,
        session_id: Uuid,
        ctx: FlowContext,
        sessions: Arc<SessionTable<ChargingSession>>,
    ) -> Self {
        Self {
            battery_id,
            session_id,
            ctx,
            sessions,
        }
    }

    pub async fn run(self, token: CancellationToken) {
        let mut pool = WorkerPool {
            battery_id: self.battery_id,
            session_id: self.session_id,
            ctx: self.ctx.clone(),
            sessions: self.sessions,
            slots: HashMap::new(),
        };
        let registries = &self.ctx.registries;

        let exit = loop {
            if token.is_cancelled() {
                break Exit::Cancelled;
            }
            match registries.batteries.get_by_id(self.battery_id) {
                Err(_) => break Exit::BatteryRemoved,
                Ok(battery) if !battery.is_charging => break Exit::Stopped,
                Ok(_) => {}
            }

            pool.reap();
            let active: HashSet<Uuid> = registries.sources.ids_by(|s| s.is_active).into_iter().collect();
            pool.reconcile(&active, &token);

            if pool.slots.is_empty() {
                break Exit::NoActiveSource;
            }
            if pool.all_finished() {
                break Exit::Complete;
            }

            tokio::select! {
                _ = token.cancelled() => break Exit::Cancelled,
                _ = tokio::time::sleep(self.ctx.tick) => {}
            }
        };

        pool.stop_workers().await;

        let name = registries
            .batteries
            .get_by_id(self.battery_id)
            .map(|b| b.name)
            .unwrap_or_default();
        match exit {
            Exit::Complete => {
                info!(battery = %name, "charging complete");
                journal::battery_event(self.ctx.events.as_ref(), "Charging complete", &name);
            }
            Exit::NoActiveSource => {
                info!(battery = %name, "no active energy source left, charging stopped");
                journal::log_event(
                    self.ctx.events.as_ref(),
                    EventCategory::Battery,
                    "Stopped charging",
                    &name,
                    Some("No active energy source"),
                );
            }
            _ => debug!(battery_id = %self.battery_id, %exit, "charging supervisor exited"),
        }
    }
}
