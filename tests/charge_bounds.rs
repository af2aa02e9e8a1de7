//! Charge and power workers contending for one battery never push its
//! charge outside `0..=capacity`.

use std::sync::Arc;
use std::time::Duration;

use home_energy_grid::config::CoordinatorConfig;
use home_energy_grid::domain::{Battery, Device, DeviceKind, EnergySource, SourceKind};
use home_energy_grid::events::MemoryEventLog;
use home_energy_grid::registry::Registries;
use home_energy_grid::Coordinator;
use proptest::prelude::*;

#[derive(Debug, Clone)]
struct Case {
    capacity: f64,
    initial: f64,
    rate: f64,
    outputs: Vec<f64>,
    draws: Vec<f64>,
    tick_ms: u64,
}

fn case() -> impl Strategy<Value = Case> {
    (1.0f64..500.0)
        .prop_flat_map(|capacity| {
            (
                Just(capacity),
                0.0..=capacity,
                0.0f64..200.0,
                prop::collection::vec(0.0f64..200.0, 1..4),
                prop::collection::vec(0.0f64..150.0, 1..4),
                1u64..4,
            )
        })
        .prop_map(|(capacity, initial, rate, outputs, draws, tick_ms)| Case {
            capacity,
            initial,
            rate,
            outputs,
            draws,
            tick_ms,
        })
}

fn run_case(case: &Case) -> Vec<f64> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .enable_all()
        .build()
        .unwrap();

    runtime.block_on(async {
        let log = Arc::new(MemoryEventLog::with_capacity(256));
        let registries = Registries::new(log.clone());
        let cfg = CoordinatorConfig::default()
            .with_tick(Duration::from_millis(case.tick_ms))
            .with_shutdown_grace(Duration::from_secs(2));
        let coordinator = Coordinator::new(registries.clone(), log, &cfg);

        let battery = registries
            .batteries
            .add(Battery::new("Shared", case.capacity, case.rate).with_charge(case.initial))
            .unwrap();
        for (i, output) in case.outputs.iter().enumerate() {
            registries
                .sources
                .add(EnergySource::new(format!("Source {i}"), SourceKind::Grid, *output).active())
                .unwrap();
        }
        let devices: Vec<_> = case
            .draws
            .iter()
            .enumerate()
            .map(|(i, power)| {
                registries
                    .devices
                    .add(Device::new(format!("Device {i}"), DeviceKind::Appliance, *power))
                    .unwrap()
            })
            .collect();

        coordinator.start_charging(battery).unwrap();
        for device in devices {
            coordinator.start_power(device, battery).unwrap();
        }

        let mut samples = Vec::new();
        for _ in 0..20 {
            tokio::time::sleep(Duration::from_micros(700)).await;
            samples.push(registries.batteries.get_by_id(battery).unwrap().current_charge);
        }
        coordinator.shutdown().await;
        samples.push(registries.batteries.get_by_id(battery).unwrap().current_charge);
        samples
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn charge_stays_within_capacity(case in case()) {
        for charge in run_case(&case) {
            prop_assert!(charge >= 0.0, "charge {} below zero", charge);
            prop_assert!(charge <= case.capacity, "charge {} above capacity {}", charge, case.capacity);
        }
    }
}
