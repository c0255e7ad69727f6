// src/aggregate.rs - State aggregation over configured member lists
//
// Every published status of the controller is a fold over one member list:
// a logical OR for the binary states, a uniformity fold for the protection
// mode, and sequential overrides for the system states. Disabled members
// and members whose signal is not on the bus are skipped everywhere. An
// aggregate is only written when at least one enabled member resolves to a
// live signal; otherwise the previous published value is retained and the
// caller is told "no effect" through the boolean result.

use crate::{
    config::{AggregateMembers, MemberRef},
    mode::{ArmState, ProtectionMode, SystemState},
    signal::SignalBus,
    value::Value,
};
use tracing::debug;

/// Signal name suffixes of the published aggregates
#[allow(missing_docs)]
pub mod signals {
    pub const MODE: &str = "mode";
    pub const FULL_PROTECTION_CONTROL: &str = "full_protection_control";
    pub const HULL_PROTECTION_CONTROL: &str = "hull_protection_control";
    pub const PARTIAL_PROTECTION_CONTROL: &str = "partial_protection_control";
    pub const SYSTEM_STATE: &str = "system_state";
    pub const SYSTEM_DETAILED_STATE: &str = "system_detailed_state";
    pub const DOOR_WINDOW: &str = "door_window";
    pub const MOTION: &str = "motion";
    pub const GLASS_BREAKAGE: &str = "glass_breakage";
    pub const SMOKE: &str = "smoke";
    pub const WATER: &str = "water";
    pub const SIREN: &str = "siren";
    pub const LIGHT: &str = "light";
    pub const ALARM_CALL: &str = "alarm_call";
    pub const PANIC: &str = "panic";
    pub const GLASS_BREAKAGE_CONTROL: &str = "glass_breakage_control";
    pub const ALARM: &str = "alarm";
    pub const ALARM_SWITCH: &str = "alarm_switch";
    pub const ALERTING_SENSOR: &str = "alerting_sensor";
}

/// State aggregator over the controller's member lists
///
/// Borrowed fresh for each recomputation; holds no state of its own, so
/// every `update_*` is idempotent given unchanged member values.
pub struct Aggregator<'a> {
    bus: &'a SignalBus,
    members: &'a AggregateMembers,
    namespace: &'a str,
}

impl<'a> Aggregator<'a> {
    /// Aggregator over `members`, publishing under `namespace`
    pub fn new(bus: &'a SignalBus, members: &'a AggregateMembers, namespace: &'a str) -> Self {
        Self {
            bus,
            members,
            namespace,
        }
    }

    fn publish(&self, suffix: &str, value: Value) {
        // Writes to our own namespace cannot fail
        let _ = self.bus.set(format!("{}.{}", self.namespace, suffix), value);
    }

    /// Values of all enabled members whose signal is live on the bus
    fn live_values(&self, list: &[MemberRef]) -> Vec<Value> {
        list.iter()
            .filter(|m| m.enabled)
            .filter_map(|m| self.bus.get(&m.signal))
            .collect()
    }

    /// OR-fold over one member list, writing the result under `suffix`
    ///
    /// Returns the folded value; false with zero live members means "no
    /// data" and nothing is written.
    fn update_or(&self, list: &[MemberRef], suffix: &str) -> bool {
        let values = self.live_values(list);
        if values.is_empty() {
            debug!("No live members for {}.{}, keeping last value", self.namespace, suffix);
            return false;
        }
        let result = values.iter().any(|v| v.as_bool().unwrap_or(false));
        self.publish(suffix, Value::Bool(result));
        result
    }

    // ------------------------------------------------------------------
    // Protection mode
    // ------------------------------------------------------------------

    /// Recompute the protection-mode aggregate and its control switches
    ///
    /// A uniform member set yields that mode; any mix yields
    /// [`ProtectionMode::IndividualProtection`]. The control switch of the
    /// winning armed mode is set exclusively; a disarmed or mixed result
    /// clears all of them. Returns true when a write happened.
    pub fn update_protection_mode(&self) -> bool {
        let codes: Vec<i64> = self
            .live_values(&self.members.mode)
            .iter()
            .filter_map(|v| v.as_int())
            // Individual never appears as a raw member value
            .filter(|c| (0..=3).contains(c))
            .collect();

        let total = codes.len();
        if total == 0 {
            debug!("No live members for {}.mode, keeping last value", self.namespace);
            return false;
        }

        let count =
            |mode: ProtectionMode| codes.iter().filter(|&&c| c == mode.code()).count();

        let winner = if count(ProtectionMode::Disarmed) == total {
            ProtectionMode::Disarmed
        } else if count(ProtectionMode::FullProtection) == total {
            ProtectionMode::FullProtection
        } else if count(ProtectionMode::HullProtection) == total {
            ProtectionMode::HullProtection
        } else if count(ProtectionMode::PartialProtection) == total {
            ProtectionMode::PartialProtection
        } else {
            ProtectionMode::IndividualProtection
        };

        self.publish(signals::MODE, Value::Int(winner.code()));
        self.publish(
            signals::FULL_PROTECTION_CONTROL,
            Value::Bool(winner == ProtectionMode::FullProtection),
        );
        self.publish(
            signals::HULL_PROTECTION_CONTROL,
            Value::Bool(winner == ProtectionMode::HullProtection),
        );
        self.publish(
            signals::PARTIAL_PROTECTION_CONTROL,
            Value::Bool(winner == ProtectionMode::PartialProtection),
        );
        true
    }

    // ------------------------------------------------------------------
    // System states
    // ------------------------------------------------------------------

    /// Recompute the coarse system state
    ///
    /// Disarmed by default; Armed when any member is armed; DelayedArmed
    /// takes priority over Armed. Returns true when a write happened.
    pub fn update_system_state(&self) -> bool {
        let codes: Vec<i64> = self
            .live_values(&self.members.system_state)
            .iter()
            .filter_map(|v| v.as_int())
            .collect();
        if codes.is_empty() {
            return false;
        }

        let mut result = SystemState::Disarmed;
        if codes.iter().any(|&c| c == ArmState::Armed.code()) {
            result = SystemState::Armed;
        }
        if codes.iter().any(|&c| c == ArmState::DelayedArmed.code()) {
            result = SystemState::DelayedArmed;
        }

        self.publish(signals::SYSTEM_STATE, Value::Int(result.code()));
        true
    }

    /// Recompute the detailed system state
    ///
    /// The override sequence is deliberate and must stay in this order:
    /// armed (full or partial depending on uniformity), then delayed
    /// armed, then partially armed, then delayed partially armed. Later
    /// checks win over earlier ones. Returns true when a write happened.
    pub fn update_system_detailed_state(&self) -> bool {
        let codes: Vec<i64> = self
            .live_values(&self.members.system_state)
            .iter()
            .filter_map(|v| v.as_int())
            .collect();
        if codes.is_empty() {
            return false;
        }

        let any = |state: ArmState| codes.iter().any(|&c| c == state.code());
        let all = |state: ArmState| codes.iter().all(|&c| c == state.code());

        let mut result = ArmState::Disarmed;
        if any(ArmState::Armed) {
            result = if all(ArmState::Armed) {
                ArmState::Armed
            } else {
                ArmState::PartialArmed
            };
        }
        if any(ArmState::DelayedArmed) {
            result = ArmState::DelayedArmed;
        }
        if any(ArmState::PartialArmed) {
            result = ArmState::PartialArmed;
        }
        if any(ArmState::DelayedPartialArmed) {
            result = ArmState::DelayedPartialArmed;
        }

        self.publish(signals::SYSTEM_DETAILED_STATE, Value::Int(result.code()));
        true
    }

    // ------------------------------------------------------------------
    // Binary OR aggregates
    // ------------------------------------------------------------------

    /// Any door or window open
    pub fn update_door_window_state(&self) -> bool {
        self.update_or(&self.members.door_window, signals::DOOR_WINDOW)
    }

    /// Any motion detected
    pub fn update_motion_detected(&self) -> bool {
        self.update_or(&self.members.motion, signals::MOTION)
    }

    /// Any glass breakage detected
    pub fn update_glass_breakage(&self) -> bool {
        self.update_or(&self.members.glass_breakage, signals::GLASS_BREAKAGE)
    }

    /// Any smoke detected
    pub fn update_smoke_detected(&self) -> bool {
        self.update_or(&self.members.smoke, signals::SMOKE)
    }

    /// Any water detected
    pub fn update_water_detected(&self) -> bool {
        self.update_or(&self.members.water, signals::WATER)
    }

    /// Any siren active
    pub fn update_siren_state(&self) -> bool {
        self.update_or(&self.members.siren, signals::SIREN)
    }

    /// Any light output active
    pub fn update_light_state(&self) -> bool {
        self.update_or(&self.members.light, signals::LIGHT)
    }

    /// Any alarm call active
    pub fn update_alarm_call_state(&self) -> bool {
        self.update_or(&self.members.alarm_call, signals::ALARM_CALL)
    }

    /// Any panic alarm active
    pub fn update_panic_state(&self) -> bool {
        self.update_or(&self.members.panic, signals::PANIC)
    }

    /// Any glass breakage detector control enabled
    pub fn update_glass_breakage_control(&self) -> bool {
        self.update_or(
            &self.members.glass_breakage_control,
            signals::GLASS_BREAKAGE_CONTROL,
        )
    }

    // ------------------------------------------------------------------
    // Alarm state and alerting sensor
    // ------------------------------------------------------------------

    /// Any alarm raised
    ///
    /// Writing this aggregate also synchronizes the derived alarm switch:
    /// on while any alarm is raised, off otherwise. Not a pure read.
    pub fn update_alarm_state(&self) -> bool {
        let values = self.live_values(&self.members.alarm);
        if values.is_empty() {
            return false;
        }
        let raised = values.iter().any(|v| v.as_bool().unwrap_or(false));
        self.publish(signals::ALARM, Value::Bool(raised));
        self.publish(signals::ALARM_SWITCH, Value::Bool(raised));
        raised
    }

    /// Name of the alerting sensor
    ///
    /// Last non-empty member string wins, in configured list order.
    /// Returns true when a write happened.
    pub fn update_alerting_sensor(&self) -> bool {
        let values = self.live_values(&self.members.alerting_sensor);
        if values.is_empty() {
            return false;
        }
        let mut result = String::new();
        for value in &values {
            let text = value.as_string();
            if !text.is_empty() {
                result = text;
            }
        }
        self.publish(signals::ALERTING_SENSOR, Value::String(result));
        true
    }

    /// Recompute every aggregate
    pub fn update_all(&self) {
        self.update_protection_mode();
        self.update_system_state();
        self.update_system_detailed_state();
        self.update_door_window_state();
        self.update_motion_detected();
        self.update_glass_breakage();
        self.update_smoke_detected();
        self.update_water_detected();
        self.update_siren_state();
        self.update_light_state();
        self.update_alarm_call_state();
        self.update_panic_state();
        self.update_glass_breakage_control();
        self.update_alarm_state();
        self.update_alerting_sensor();
    }
}
