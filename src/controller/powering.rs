use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use super::session::{PoweringSession, SessionTable};
use super::FlowContext;
use crate::events::journal::{self, PowerAction};

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum PowerStop {
    DeviceInactive,
    DeviceRemoved,
    BatteryRemoved,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PowerStep {
    Consumed {
        amount: f64,
        device: String,
        battery: String,
    },
    LowBattery {
        available: f64,
        required: f64,
        device: String,
        battery: String,
    },
    Stop(PowerStop),
}

/// Releases the session and switches the device off when the worker ends.
struct PowerGuard {
    device_id: Uuid,
    battery_id: Uuid,
    session_id: Uuid,
    ctx: FlowContext,
    sessions: Arc<SessionTable<PoweringSession>>,
}

impl Drop for PowerGuard {
    fn drop(&mut self) {
        let devices = &self.ctx.registries.devices;
        self.sessions.release_then(self.device_id, self.session_id, || {
            let _ = devices.update(self.device_id, |d| d.is_active = false);
        });
        self.ctx.locks.forget(self.battery_id);
    }
}

/// Draws one device's power from one battery every tick.
pub(crate) struct PowerWorker {
    device_id: Uuid,
    battery_id: Uuid,
    session_id: Uuid,
    ctx: FlowContext,
    sessions: Arc<SessionTable<PoweringSession>>,
}

impl PowerWorker {
    pub fn new(
        device_id: Uuid,
        battery_id: Uuid,
        session_id: Uuid,
        ctx: FlowContext,
        sessions: Arc<SessionTable<PoweringSession>>,
    ) -> Self {
        Self {
            device_id,
            battery_id,
            session_id,
            ctx,
            sessions,
        }
    }

    pub async fn run(self, token: CancellationToken) {
        let _guard = PowerGuard {
            device_id: self.device_id,
            battery_id: self.battery_id,
            session_id: self.session_id,
            ctx: self.ctx.clone(),
            sessions: self.sessions.clone(),
        };
        let lock = self.ctx.locks.lock_for(self.battery_id);
        let events = self.ctx.events.as_ref();

        loop {
            if token.is_cancelled() {
                break;
            }

            match self.step(&lock) {
                PowerStep::Consumed { amount, device, battery } => {
                    journal::device_power_event(events, PowerAction::Consuming(amount), &device, &battery);
                }
                PowerStep::LowBattery {
                    available,
                    required,
                    device,
                    battery,
                } => {
                    info!(%device, %battery, available, required, "battery too low, device powered off");
                    journal::device_power_event(
                        events,
                        PowerAction::LowBattery { available, required },
                        &device,
                        &battery,
                    );
                    return;
                }
                PowerStep::Stop(reason) => {
                    debug!(device_id = %self.device_id, battery_id = %self.battery_id, %reason, "power worker finished");
                    return;
                }
            }

            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(self.ctx.tick) => {}
            }
        }
        debug!(device_id = %self.device_id, battery_id = %self.battery_id, "power worker cancelled");
    }

    /// One draw from the battery under its lock.
    pub(crate) fn step(&self, lock: &Mutex<()>) -> PowerStep {
        let _guard = lock.lock();
        let registries = &self.ctx.registries;

        let Ok(device) = registries.devices.get_by_id(self.device_id) else {
            return PowerStep::Stop(PowerStop::DeviceRemoved);
        };
        if !device.is_active {
            return PowerStep::Stop(PowerStop::DeviceInactive);
        }
        let Ok(battery) = registries.batteries.get_by_id(self.battery_id) else {
            return PowerStep::Stop(PowerStop::BatteryRemoved);
        };

        if battery.current_charge >= device.power {
            let drawn = registries.batteries.update(self.battery_id, |b| {
                b.current_charge = (b.current_charge - device.power).max(0.0);
            });
            if drawn.is_err() {
                return PowerStep::Stop(PowerStop::BatteryRemoved);
            }
            PowerStep::Consumed {
                amount: device.power,
                device: device.name,
                battery: battery.name,
            }
        } else {
            let _ = registries.devices.update(self.device_id, |d| d.is_active = false);
            PowerStep::LowBattery {
                available: battery.current_charge,
                required: device.power,
                device: device.name,
                battery: battery.name,
            }
        }
    }
}
