// src/discovery.rs - Zone discovery over the signal bus

use crate::{config::ZoneRef, mode::IndividualMode, signal::SignalBus};
use std::time::Duration;
use tracing::debug;

/// Default pause between discovery chunks
pub const DISCOVERY_PACE: Duration = Duration::from_millis(100);

/// Signals inspected per chunk before pausing
const CHUNK_SIZE: usize = 25;

/// Scan the signal bus for zone state signals and propose zone references
///
/// Every `<name>.state` entry on the bus is offered as a disabled zone
/// reference for the operator to enable. Iteration over large buses is
/// paced with a fixed pause per chunk so downstream consumers of the bus
/// are not saturated; the pause is not a correctness requirement.
pub async fn discover_zones(bus: &SignalBus, pace: Duration) -> Vec<ZoneRef> {
    let mut names = bus.signal_names();
    names.sort();

    let mut refs = Vec::new();
    for (index, chunk) in names.chunks(CHUNK_SIZE).enumerate() {
        if index > 0 {
            tokio::time::sleep(pace).await;
        }
        for name in chunk {
            if let Some(zone) = name.strip_suffix(".state") {
                debug!("Discovered zone candidate '{}'", zone);
                refs.push(ZoneRef {
                    enabled: false,
                    zone: zone.to_string(),
                    designation: zone.to_string(),
                    individual_mode: IndividualMode::NoFunction,
                });
            }
        }
    }
    refs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[tokio::test]
    async fn test_discover_zones_finds_state_signals() {
        let bus = SignalBus::new();
        bus.set("upstairs.state", Value::Int(0)).unwrap();
        bus.set("upstairs.mode", Value::Int(0)).unwrap();
        bus.set("downstairs.state", Value::Int(0)).unwrap();
        bus.set("unrelated", Value::Bool(false)).unwrap();

        let refs = discover_zones(&bus, Duration::ZERO).await;
        let zones: Vec<_> = refs.iter().map(|r| r.zone.as_str()).collect();
        assert_eq!(zones, vec!["downstairs", "upstairs"]);
        assert!(refs.iter().all(|r| !r.enabled));
    }

    #[tokio::test]
    async fn test_discover_zones_empty_bus() {
        let bus = SignalBus::new();
        let refs = discover_zones(&bus, Duration::ZERO).await;
        assert!(refs.is_empty());
    }
}
