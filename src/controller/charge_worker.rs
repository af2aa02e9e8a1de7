use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use super::FlowContext;
use crate::events::journal::{self, ChargeFlow};

/// Why a charge worker stopped on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ChargeStop {
    /// Battery full and nothing is drawing from it.
    Satisfied,
    NotCharging,
    SourceInactive,
    BatteryRemoved,
    SourceRemoved,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ChargeStep {
    Flow {
        flow: ChargeFlow,
        battery: String,
        source: String,
    },
    Stop(ChargeStop),
}

/// Moves charge from one source into one battery, once per tick.
pub(crate) struct ChargeWorker {
    battery_id: Uuid,
    source_id: Uuid,
    ctx: FlowContext,
}

impl ChargeWorker {
    pub fn new(battery_id: Uuid, source_id: Uuid, ctx: FlowContext) -> Self {
        Self {
            battery_id,
            source_id,
            ctx,
        }
    }

    /// Runs until the battery stops needing this source or `token` fires.
    ///
    /// Returns the reason the worker stopped on its own, `None` when cancelled.
    pub async fn run(self, token: CancellationToken) -> Option<ChargeStop> {
        let lock = self.ctx.locks.lock_for(self.battery_id);
        loop {
            if token.is_cancelled() {
                break;
            }

            match self.step(&lock) {
                ChargeStep::Flow { flow, battery, source } => {
                    journal::charge_event(self.ctx.events.as_ref(), &battery, &source, flow);
                }
                ChargeStep::Stop(reason) => {
                    debug!(battery_id = %self.battery_id, source_id = %self.source_id, %reason, "charge worker finished");
                    return Some(reason);
                }
            }

            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(self.ctx.tick) => {}
            }
        }
        debug!(battery_id = %self.battery_id, source_id = %self.source_id, "charge worker cancelled");
        None
    }

    /// One read-modify-write of the battery charge under the battery's lock.
    pub(crate) fn step(&self, lock: &Mutex<()>) -> ChargeStep {
        let _guard = lock.lock();
        let registries = &self.ctx.registries;

        let Ok(battery) = registries.batteries.get_by_id(self.battery_id) else {
            return ChargeStep::Stop(ChargeStop::BatteryRemoved);
        };
        if !battery.is_charging {
            return ChargeStep::Stop(ChargeStop::NotCharging);
        }
        let Ok(source) = registries.sources.get_by_id(self.source_id) else {
            return ChargeStep::Stop(ChargeStop::SourceRemoved);
        };
        if !source.is_active {
            return ChargeStep::Stop(ChargeStop::SourceInactive);
        }

        let device_draw = registries.total_device_draw();
        let deficit = battery.deficit();
        let charge_power = battery.max_charge_rate.min(source.output);

        if battery.is_full() && device_draw <= 0.0 {
            return ChargeStep::Stop(ChargeStop::Satisfied);
        }

        // Device draw competes for the same instantaneous supply.
        let net_charge = charge_power - device_draw;
        let (new_charge, flow) = if net_charge > 0.0 {
            let amount = net_charge.min(deficit).max(0.0);
            (battery.current_charge + amount, ChargeFlow::Charged(amount))
        } else {
            let drained = (battery.current_charge + net_charge).max(0.0);
            (drained, ChargeFlow::Drained(battery.current_charge - drained))
        };

        let applied = registries.batteries.update(self.battery_id, |b| {
            b.current_charge = new_charge.clamp(0.0, b.capacity);
        });
        if applied.is_err() {
            return ChargeStep::Stop(ChargeStop::BatteryRemoved);
        }

        ChargeStep::Flow {
            flow,
            battery: battery.name,
            source: source.name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Battery, Device, DeviceKind, EnergySource, SourceKind};
    use crate::events::EventCategory;
    use crate::test_support::flow_context;
    use rstest::rstest;

    fn charging(battery: Battery) -> Battery {
        Battery { is_charging: true, ..battery }
    }

    #[test]
    fn charges_by_rate_bounded_by_output() {
        let (ctx, _) = flow_context();
        let battery = ctx.registries.batteries.add(charging(Battery::new("B", 1000.0, 100.0).with_charge(500.0))).unwrap();
        let source = ctx.registries.sources.add(EnergySource::new("S", SourceKind::Solar, 1000.0).active()).unwrap();

        let worker = ChargeWorker::new(battery, source, ctx.clone());
        let lock = ctx.locks.lock_for(battery);
        let step = worker.step(&lock);

        assert!(matches!(step, ChargeStep::Flow { flow: ChargeFlow::Charged(a), .. } if a == 100.0));
        assert_eq!(ctx.registries.batteries.get_by_id(battery).unwrap().current_charge, 600.0);
    }

    #[rstest]
    #[case::weak_source(1000.0, 500.0, 100.0, 30.0, 530.0)]
    #[case::near_full(1000.0, 950.0, 100.0, 1000.0, 1000.0)]
    #[case::zero_output(1000.0, 500.0, 100.0, 0.0, 500.0)]
    fn charge_amount(
        #[case] capacity: f64,
        #[case] charge: f64,
        #[case] rate: f64,
        #[case] output: f64,
        #[case] expected: f64,
    ) {
        let (ctx, _) = flow_context();
        let battery = ctx.registries.batteries.add(charging(Battery::new("B", capacity, rate).with_charge(charge))).unwrap();
        let source = ctx.registries.sources.add(EnergySource::new("S", SourceKind::Grid, output).active()).unwrap();

        let worker = ChargeWorker::new(battery, source, ctx.clone());
        worker.step(&ctx.locks.lock_for(battery));

        assert_eq!(ctx.registries.batteries.get_by_id(battery).unwrap().current_charge, expected);
    }

    #[test]
    fn device_draw_beyond_supply_drains_battery_but_not_below_zero() {
        let (ctx, _) = flow_context();
        let battery = ctx.registries.batteries.add(charging(Battery::new("B", 1000.0, 100.0).with_charge(30.0))).unwrap();
        let source = ctx.registries.sources.add(EnergySource::new("S", SourceKind::Solar, 1000.0).active()).unwrap();
        ctx.registries.devices.add(Device::new("Heater", DeviceKind::Heating, 150.0).active()).unwrap();

        let worker = ChargeWorker::new(battery, source, ctx.clone());
        let step = worker.step(&ctx.locks.lock_for(battery));

        assert!(matches!(step, ChargeStep::Flow { flow: ChargeFlow::Drained(a), .. } if a == 30.0));
        assert_eq!(ctx.registries.batteries.get_by_id(battery).unwrap().current_charge, 0.0);
    }

    #[test]
    fn full_battery_without_draw_is_satisfied() {
        let (ctx, _) = flow_context();
        let battery = ctx.registries.batteries.add(charging(Battery::new("B", 100.0, 10.0).with_charge(100.0))).unwrap();
        let source = ctx.registries.sources.add(EnergySource::new("S", SourceKind::Solar, 50.0).active()).unwrap();

        let worker = ChargeWorker::new(battery, source, ctx.clone());
        assert_eq!(worker.step(&ctx.locks.lock_for(battery)), ChargeStep::Stop(ChargeStop::Satisfied));
        assert_eq!(ctx.registries.batteries.get_by_id(battery).unwrap().current_charge, 100.0);
    }

    #[test]
    fn full_battery_with_draw_keeps_working() {
        let (ctx, _) = flow_context();
        let battery = ctx.registries.batteries.add(charging(Battery::new("B", 100.0, 10.0).with_charge(100.0))).unwrap();
        let source = ctx.registries.sources.add(EnergySource::new("S", SourceKind::Grid, 50.0).active()).unwrap();
        ctx.registries.devices.add(Device::new("Lamp", DeviceKind::Lighting, 4.0).active()).unwrap();

        let worker = ChargeWorker::new(battery, source, ctx.clone());
        let step = worker.step(&ctx.locks.lock_for(battery));

        assert!(matches!(step, ChargeStep::Flow { flow: ChargeFlow::Charged(a), .. } if a == 0.0));
        assert_eq!(ctx.registries.batteries.get_by_id(battery).unwrap().current_charge, 100.0);
    }

    #[rstest]
    #[case::not_charging(false, true, ChargeStop::NotCharging)]
    #[case::source_off(true, false, ChargeStop::SourceInactive)]
    fn stops_without_mutation(#[case] is_charging: bool, #[case] active: bool, #[case] reason: ChargeStop) {
        let (ctx, _) = flow_context();
        let mut battery = Battery::new("B", 100.0, 10.0).with_charge(10.0);
        battery.is_charging = is_charging;
        let battery = ctx.registries.batteries.add(battery).unwrap();
        let mut source = EnergySource::new("S", SourceKind::Solar, 50.0);
        source.is_active = active;
        let source = ctx.registries.sources.add(source).unwrap();

        let worker = ChargeWorker::new(battery, source, ctx.clone());
        assert_eq!(worker.step(&ctx.locks.lock_for(battery)), ChargeStep::Stop(reason));
        assert_eq!(ctx.registries.batteries.get_by_id(battery).unwrap().current_charge, 10.0);
    }

    #[test]
    fn removed_records_end_the_worker() {
        let (ctx, _) = flow_context();
        let battery = ctx.registries.batteries.add(charging(Battery::new("B", 100.0, 10.0))).unwrap();
        let source = ctx.registries.sources.add(EnergySource::new("S", SourceKind::Solar, 50.0).active()).unwrap();
        let worker = ChargeWorker::new(battery, source, ctx.clone());
        let lock = ctx.locks.lock_for(battery);

        ctx.registries.sources.remove_by_id(source);
        assert_eq!(worker.step(&lock), ChargeStep::Stop(ChargeStop::SourceRemoved));
        ctx.registries.batteries.remove_by_id(battery);
        assert_eq!(worker.step(&lock), ChargeStep::Stop(ChargeStop::BatteryRemoved));
    }

    #[tokio::test(start_paused = true)]
    async fn run_exits_promptly_on_cancel() {
        let (ctx, log) = flow_context();
        let battery = ctx.registries.batteries.add(charging(Battery::new("B", 10_000.0, 10.0))).unwrap();
        let source = ctx.registries.sources.add(EnergySource::new("S", SourceKind::Solar, 50.0).active()).unwrap();
        log.clear();

        let token = CancellationToken::new();
        let handle = tokio::spawn(ChargeWorker::new(battery, source, ctx.clone()).run(token.clone()));
        tokio::time::sleep(ctx.tick / 2).await;
        token.cancel();
        assert_eq!(handle.await.unwrap(), None);

        // One step at spawn: a battery event plus an energy event.
        assert_eq!(log.len(), 2);
        assert_eq!(
            log.by_category(EventCategory::Battery)[0].message,
            "Charging: B - Charged 10.00 from S"
        );
        assert_eq!(ctx.registries.batteries.get_by_id(battery).unwrap().current_charge, 10.0);
    }
}
