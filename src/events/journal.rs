//! Message formats for coordinator events.
//!
//! A message reads `"<action>: <name>"`, optionally followed by `" - <detail>"`.
//! Flows between two parties (a source charging a battery, a battery feeding
//! a device) are recorded once for each party.

use super::{EventCategory, EventSink};
use crate::domain::EntityKind;

pub fn log_event(
    sink: &dyn EventSink,
    category: EventCategory,
    action: &str,
    name: &str,
    detail: Option<&str>,
) {
    let message = match detail {
        Some(detail) if !detail.is_empty() => format!("{action}: {name} - {detail}"),
        _ => format!("{action}: {name}"),
    };
    sink.record(category, name, &message);
}

/// Registry bookkeeping: "Added new battery", "Removed device", ...
pub fn registry_event(sink: &dyn EventSink, kind: EntityKind, action: &str, name: &str) {
    log_event(sink, kind.category(), &format!("{action} {kind}"), name, None);
}

pub fn toggle_event(sink: &dyn EventSink, kind: EntityKind, name: &str, active: bool) {
    let action = if active { "Activated" } else { "Deactivated" };
    log_event(sink, kind.category(), &format!("{action} {kind}"), name, None);
}

pub fn battery_event(sink: &dyn EventSink, action: &str, battery: &str) {
    log_event(sink, EventCategory::Battery, action, battery, None);
}

/// Outcome of one charge-worker tick, as reported to the event log.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChargeFlow {
    /// Net positive inflow stored in the battery.
    Charged(f64),
    /// Device draw exceeded the source contribution; the battery lost this much.
    Drained(f64),
}

pub fn charge_event(sink: &dyn EventSink, battery: &str, source: &str, flow: ChargeFlow) {
    match flow {
        ChargeFlow::Charged(amount) => {
            log_event(
                sink,
                EventCategory::Battery,
                "Charging",
                battery,
                Some(&format!("Charged {amount:.2} from {source}")),
            );
            log_event(
                sink,
                EventCategory::Energy,
                "Discharging",
                source,
                Some(&format!("Discharged {amount:.2} to {battery}")),
            );
        }
        ChargeFlow::Drained(amount) => {
            log_event(
                sink,
                EventCategory::Battery,
                "Draining",
                battery,
                Some(&format!("Lost {amount:.2} to device draw while charging from {source}")),
            );
            log_event(
                sink,
                EventCategory::Energy,
                "Overdrawn",
                source,
                Some(&format!("Device draw exceeds supply to {battery} by {amount:.2}")),
            );
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PowerAction {
    PoweredOn,
    Consuming(f64),
    PoweredOff,
    LowBattery { available: f64, required: f64 },
}

impl PowerAction {
    fn device_action(&self) -> &'static str {
        match self {
            PowerAction::PoweredOn => "Powered on",
            PowerAction::Consuming(_) => "Consuming power",
            PowerAction::PoweredOff => "Powered off",
            PowerAction::LowBattery { .. } => "Powered off due to low battery",
        }
    }
}

pub fn device_power_event(sink: &dyn EventSink, action: PowerAction, device: &str, battery: &str) {
    let (device_detail, battery_action, battery_detail) = match action {
        PowerAction::PoweredOn => (
            format!("Is now powered by battery {battery}"),
            "Discharging",
            format!("Is now powering device {device}"),
        ),
        PowerAction::Consuming(amount) => (
            format!("Drew {amount:.2} from battery {battery}"),
            "Discharging",
            format!("Supplied {amount:.2} to device {device}"),
        ),
        PowerAction::PoweredOff => (
            format!("Is now shut down from battery {battery}"),
            "Released",
            format!("No longer powering device {device}"),
        ),
        PowerAction::LowBattery { available, required } => (
            format!("Battery {battery} holds {available:.2}, needs {required:.2}"),
            "Depleted",
            format!("Cannot power device {device}"),
        ),
    };
    log_event(
        sink,
        EventCategory::Device,
        action.device_action(),
        device,
        Some(&device_detail),
    );
    log_event(
        sink,
        EventCategory::Battery,
        battery_action,
        battery,
        Some(&battery_detail),
    );
}
