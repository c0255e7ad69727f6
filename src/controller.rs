// src/controller.rs - Zone controller: mode selection and event dispatch
//
// The controller commands all registered zones, folds their published
// signals into system-wide aggregates and fires the side effects it owns
// per the gate decision. Everything runs single-threaded: the run loop
// processes one member change at a time to completion.

use crate::{
    config::{AggregateMembers, Config, ControllerConfig, MemberRef},
    aggregate::Aggregator,
    effects::EffectSender,
    error::{AlarmError, Result},
    gate::{GateDecision, SideEffectGate},
    mode::ProtectionMode,
    signal::SignalBus,
    value::Value,
    zone::Zone,
};
use chrono::Utc;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Context token controlling which aggregates a dispatch may recompute
///
/// During an arming sweep the zones confirm their new states one by one;
/// folding those confirmations immediately would publish transient mixed
/// readings. The sweep dispatches with [`UpdateScope::ArmingSweep`] and
/// recomputes the suppressed aggregates exactly once when every zone has
/// been processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateScope {
    /// Recompute everything the changed signal feeds
    Full,
    /// Arming sweep in progress: skip the protection-mode, system-state
    /// and glass-control aggregates
    ArmingSweep,
}

/// The zone controller
pub struct Controller {
    config: ControllerConfig,
    members: AggregateMembers,
    subscriptions: HashSet<String>,
    bus: SignalBus,
    zones: Vec<Zone>,
    effects: EffectSender,
    changes: Option<mpsc::UnboundedReceiver<(String, Value)>>,
    running: Arc<AtomicBool>,
    tick_interval: std::time::Duration,
}

impl Controller {
    /// Build the controller and its zones from a validated configuration
    ///
    /// Zones publish their initial state, the member subscription set is
    /// derived from the configuration, and every aggregate is computed
    /// once so the published statuses start out consistent.
    pub fn new(config: Config, bus: SignalBus, effects: EffectSender) -> Result<Self> {
        config.validate()?;
        let Config {
            controller: controller_config,
            zones: zone_configs,
        } = config;

        let members = if controller_config.members.is_empty() {
            AggregateMembers::for_zones(&controller_config.zones)
        } else {
            controller_config.members.clone()
        };

        let mut zones = Vec::with_capacity(zone_configs.len());
        for zone_config in zone_configs {
            info!("Registering zone '{}'", zone_config.name);
            zones.push(Zone::new(zone_config, bus.clone(), effects.clone())?);
        }

        let subscriptions = members.subscribed_signals();

        // Subscribe after the initial zone publications so the channel
        // starts clean
        let changes = bus.subscribe_changes();

        let controller = Self {
            config: controller_config,
            members,
            subscriptions,
            bus,
            zones,
            effects,
            changes: Some(changes),
            running: Arc::new(AtomicBool::new(false)),
            tick_interval: std::time::Duration::from_millis(500),
        };

        controller.aggregator().update_all();
        Ok(controller)
    }

    /// The signal bus this controller reads and publishes on
    pub fn bus(&self) -> &SignalBus {
        &self.bus
    }

    /// Controller designation (also its publish namespace)
    pub fn designation(&self) -> &str {
        &self.config.designation
    }

    /// Registered zones
    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    /// Look up a registered zone by name
    pub fn zone(&self, name: &str) -> Option<&Zone> {
        self.zones.iter().find(|z| z.name() == name)
    }

    /// Signal that requests a mode selection when written
    pub fn mode_request_signal(&self) -> String {
        format!("{}.mode_request", self.config.designation)
    }

    fn aggregator(&self) -> Aggregator<'_> {
        Aggregator::new(&self.bus, &self.members, &self.config.designation)
    }

    /// A mode may only be selected when its use flag is enabled
    pub fn check_operation_mode(&self, mode: ProtectionMode) -> bool {
        self.config.mode_options(mode).enabled
    }

    // ------------------------------------------------------------------
    // Mode selection
    // ------------------------------------------------------------------

    /// Select a protection mode across all member zones
    ///
    /// Best effort: a failing zone is recorded and the sweep continues
    /// with the remaining zones; the result is false if any zone failed.
    /// Never panics and never raises an error across this boundary;
    /// rejected requests are logged warnings.
    pub fn select_protection_mode(&mut self, mode: ProtectionMode, origin: &str) -> bool {
        if !self.config.active {
            debug!(
                "Controller '{}' is in maintenance mode, ignoring {}",
                self.config.designation, mode
            );
            return false;
        }
        if !self.check_operation_mode(mode) {
            warn!(
                "Mode '{}' is disabled, request from '{}' rejected",
                mode, origin
            );
            return false;
        }

        let zone_refs: Vec<_> = self
            .config
            .zones
            .iter()
            .filter(|z| z.enabled)
            .cloned()
            .collect();
        if zone_refs.is_empty() {
            warn!("No enabled member zones, cannot select '{}'", mode);
            return false;
        }

        // Side-effect ownership is decided once, before any zone is
        // touched; zones get the inverse as their permits
        let decision = SideEffectGate::new(&self.config).decide(mode);
        let permits = decision.zone_permits();
        let now = Utc::now();

        info!(
            "Selecting '{}' across {} zones (origin '{}')",
            mode,
            zone_refs.len(),
            origin
        );

        let mut failed = false;
        let mut delayed = false;
        for zone_ref in &zone_refs {
            let target = match mode {
                ProtectionMode::IndividualProtection => {
                    match zone_ref.individual_mode.as_mode() {
                        Some(individual) => individual,
                        None => continue,
                    }
                }
                uniform => uniform,
            };

            match self.zones.iter_mut().find(|z| z.name() == zone_ref.zone) {
                Some(zone) => match zone.apply_mode(target, permits, now) {
                    Ok(state) => delayed |= state.is_delayed(),
                    Err(e) => {
                        warn!("Zone '{}' failed to apply '{}': {}", zone_ref.zone, target, e);
                        failed = true;
                    }
                },
                None => {
                    warn!("Zone '{}' is not registered, skipping", zone_ref.zone);
                    failed = true;
                }
            }

            // Confirmations arriving mid-sweep must not fold into the
            // mode aggregates; those are recomputed once below
            self.drain_pending(UpdateScope::ArmingSweep);
        }

        let aggregator = self.aggregator();
        aggregator.update_protection_mode();
        aggregator.update_system_state();
        aggregator.update_system_detailed_state();

        self.fire_controller_effects(mode, decision, delayed);

        !failed
    }

    fn fire_controller_effects(
        &self,
        mode: ProtectionMode,
        decision: GateDecision,
        delayed: bool,
    ) {
        let owner = &self.config.designation;

        if decision.notification {
            let template = self.config.notification_template(mode);
            let text = if delayed {
                template
                    .delayed_text
                    .clone()
                    .unwrap_or_else(|| template.text.clone())
            } else {
                template.text.clone()
            };
            if let Err(e) = self.effects.notification(owner, &template.title, &text) {
                warn!("Notification failed: {}", e);
            }
        }
        if decision.status_indicator {
            if let Err(e) = self.effects.status_indicator(owner, mode) {
                warn!("Status indicator failed: {}", e);
            }
        }
        if decision.acknowledgement_tone {
            if let Err(e) = self.effects.acknowledgement_tone(owner, mode.is_armed()) {
                warn!("Acknowledgement tone failed: {}", e);
            }
        }
        if decision.action {
            let command = if mode.is_armed() {
                &self.config.action.armed_command
            } else {
                &self.config.action.disarmed_command
            };
            if let Some(command) = command {
                if let Err(e) = self.effects.action(owner, command) {
                    warn!("Action failed: {}", e);
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Event dispatch
    // ------------------------------------------------------------------

    /// Process one member-change event
    ///
    /// The maintenance short-circuit lives here, once, at the public
    /// façade; the internal operations do not re-check it.
    pub fn handle_member_change(&mut self, signal: &str) -> Result<()> {
        if !self.config.active {
            return Ok(());
        }
        self.dispatch(signal, UpdateScope::Full)
    }

    fn dispatch(&mut self, signal: &str, scope: UpdateScope) -> Result<()> {
        let now = Utc::now();
        for zone in &mut self.zones {
            zone.on_sensor_change(signal, now)?;
        }

        if scope == UpdateScope::Full && signal == self.mode_request_signal() {
            match self.bus.get(signal).and_then(|v| v.as_int()) {
                Some(code) => match ProtectionMode::from_code(code) {
                    Ok(mode) => {
                        self.select_protection_mode(mode, "signal");
                    }
                    Err(e) => warn!("Invalid mode request: {}", e),
                },
                None => warn!("Mode request signal has no integer value"),
            }
            return Ok(());
        }

        if self.subscriptions.contains(signal) {
            self.update_for(signal, scope);
        }
        Ok(())
    }

    /// Recompute the aggregates a changed member signal feeds
    fn update_for(&self, signal: &str, scope: UpdateScope) {
        let aggregator = self.aggregator();
        let in_list =
            |list: &[MemberRef]| list.iter().any(|m| m.enabled && m.signal == signal);

        if scope == UpdateScope::Full {
            if in_list(&self.members.mode) {
                aggregator.update_protection_mode();
            }
            if in_list(&self.members.system_state) {
                aggregator.update_system_state();
                aggregator.update_system_detailed_state();
            }
            if in_list(&self.members.glass_breakage_control) {
                aggregator.update_glass_breakage_control();
            }
        }
        if in_list(&self.members.door_window) {
            aggregator.update_door_window_state();
        }
        if in_list(&self.members.motion) {
            aggregator.update_motion_detected();
        }
        if in_list(&self.members.glass_breakage) {
            aggregator.update_glass_breakage();
        }
        if in_list(&self.members.smoke) {
            aggregator.update_smoke_detected();
        }
        if in_list(&self.members.water) {
            aggregator.update_water_detected();
        }
        if in_list(&self.members.siren) {
            aggregator.update_siren_state();
        }
        if in_list(&self.members.light) {
            aggregator.update_light_state();
        }
        if in_list(&self.members.alarm_call) {
            aggregator.update_alarm_call_state();
        }
        if in_list(&self.members.panic) {
            aggregator.update_panic_state();
        }
        if in_list(&self.members.alarm) {
            aggregator.update_alarm_state();
        }
        if in_list(&self.members.alerting_sensor) {
            aggregator.update_alerting_sensor();
        }
    }

    /// Dispatch all queued member changes under the given scope
    fn drain_pending(&mut self, scope: UpdateScope) {
        let mut pending = Vec::new();
        if let Some(rx) = self.changes.as_mut() {
            while let Ok((signal, _)) = rx.try_recv() {
                pending.push(signal);
            }
        }
        for signal in pending {
            if let Err(e) = self.dispatch(&signal, scope) {
                warn!("Dispatch for '{}' failed: {}", signal, e);
            }
        }
    }

    // ------------------------------------------------------------------
    // Timer handling
    // ------------------------------------------------------------------

    /// Drive zone delay promotion and fold the resulting changes
    pub fn tick(&mut self) -> Result<()> {
        if !self.config.active {
            return Ok(());
        }
        let now = Utc::now();
        for zone in &mut self.zones {
            zone.tick(now)?;
        }
        self.drain_pending(UpdateScope::Full);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Run loop
    // ------------------------------------------------------------------

    /// Event loop: member changes and periodic ticks, one at a time
    pub async fn run(&mut self) -> Result<()> {
        let mut rx = self.changes.take().ok_or_else(|| {
            AlarmError::Runtime("Change receiver already taken".to_string())
        })?;
        let mut ticker = tokio::time::interval(self.tick_interval);
        self.running.store(true, Ordering::SeqCst);
        info!("Controller '{}' running", self.config.designation);

        while self.running.load(Ordering::SeqCst) {
            tokio::select! {
                maybe = rx.recv() => match maybe {
                    Some((signal, _)) => {
                        if let Err(e) = self.handle_member_change(&signal) {
                            warn!("Handler for '{}' failed: {}", signal, e);
                        }
                    }
                    None => break,
                },
                _ = ticker.tick() => {
                    if let Err(e) = self.tick() {
                        warn!("Tick failed: {}", e);
                    }
                }
            }
        }

        self.changes = Some(rx);
        info!("Controller '{}' stopped", self.config.designation);
        Ok(())
    }

    /// Ask the run loop to exit after the current event
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::EffectEvent;
    use crate::mode::ArmState;
    use tokio::sync::mpsc::UnboundedReceiver;

    const TWO_ZONES: &str = r#"
controller:
  designation: "house"
  zones:
    - zone: "upstairs"
      individual_mode: full-protection
    - zone: "downstairs"
      individual_mode: disarmed
  notification:
    disarmed:
      enabled: true
      text: "System disarmed"
    full_protection:
      enabled: true
      text: "Full protection active"
  status_indicator:
    use_disarmed: true
    use_armed: true
zones:
  - name: "upstairs"
    sensors:
      - signal: "upstairs.front_door"
        designation: "Front door"
        category: door-window
        hull_protection: true
  - name: "downstairs"
    sensors:
      - signal: "downstairs.motion"
        designation: "Living room motion"
        category: motion
"#;

    fn build(yaml: &str) -> (Controller, SignalBus, UnboundedReceiver<EffectEvent>) {
        let bus = SignalBus::new();
        let (effects, rx) = EffectSender::channel();
        let config = Config::from_yaml(yaml).unwrap();
        let controller = Controller::new(config, bus.clone(), effects).unwrap();
        (controller, bus, rx)
    }

    fn drain(rx: &mut UnboundedReceiver<EffectEvent>) -> Vec<EffectEvent> {
        std::iter::from_fn(|| rx.try_recv().ok()).collect()
    }

    #[test]
    fn test_select_full_protection_arms_all_zones() {
        let (mut controller, bus, _rx) = build(TWO_ZONES);

        assert!(controller.select_protection_mode(ProtectionMode::FullProtection, "test"));

        assert_eq!(bus.get_int("upstairs.mode").unwrap(), 1);
        assert_eq!(bus.get_int("downstairs.mode").unwrap(), 1);
        assert_eq!(bus.get_int("house.mode").unwrap(), 1);
        assert_eq!(bus.get_bool("house.full_protection_control").unwrap(), true);
        assert_eq!(bus.get_bool("house.hull_protection_control").unwrap(), false);
        assert_eq!(bus.get_int("house.system_state").unwrap(), 1);
        assert_eq!(
            bus.get_int("house.system_detailed_state").unwrap(),
            ArmState::Armed.code()
        );
    }

    #[test]
    fn test_select_disabled_mode_rejected_without_side_effects() {
        let (mut controller, bus, mut rx) = build(TWO_ZONES);
        controller.config.modes.hull_protection.enabled = false;
        drain(&mut rx);

        let before = bus.snapshot();
        assert!(!controller.select_protection_mode(ProtectionMode::HullProtection, "test"));
        assert_eq!(bus.snapshot(), before);
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_maintenance_mode_is_noop() {
        let (mut controller, bus, _rx) = build(TWO_ZONES);
        controller.config.active = false;

        let before = bus.snapshot();
        assert!(!controller.select_protection_mode(ProtectionMode::FullProtection, "test"));
        assert_eq!(bus.snapshot(), before);
    }

    #[test]
    fn test_empty_zone_list_rejected() {
        let yaml = r#"
controller:
  designation: "house"
"#;
        let (mut controller, _bus, _rx) = build(yaml);
        assert!(!controller.select_protection_mode(ProtectionMode::Disarmed, "test"));
    }

    #[test]
    fn test_individual_protection_mixes_modes() {
        let (mut controller, bus, _rx) = build(TWO_ZONES);

        assert!(controller.select_protection_mode(ProtectionMode::IndividualProtection, "test"));

        // upstairs follows full protection, downstairs stays disarmed
        assert_eq!(bus.get_int("upstairs.mode").unwrap(), 1);
        assert_eq!(bus.get_int("downstairs.mode").unwrap(), 0);

        // Mixed member modes aggregate to individual with no switch set
        assert_eq!(
            bus.get_int("house.mode").unwrap(),
            ProtectionMode::IndividualProtection.code()
        );
        assert_eq!(bus.get_bool("house.full_protection_control").unwrap(), false);
        assert_eq!(bus.get_bool("house.hull_protection_control").unwrap(), false);
        assert_eq!(
            bus.get_bool("house.partial_protection_control").unwrap(),
            false
        );

        // One armed, one disarmed: detailed state is partially armed
        assert_eq!(
            bus.get_int("house.system_detailed_state").unwrap(),
            ArmState::PartialArmed.code()
        );
    }

    #[test]
    fn test_sweep_is_best_effort() {
        let (mut controller, bus, _rx) = build(TWO_ZONES);
        // Put one zone into maintenance; the sweep must still arm the rest
        let yaml = r#"
name: "upstairs"
active: false
"#;
        controller.zones[0] =
            Zone::new(serde_yaml::from_str(yaml).unwrap(), bus.clone(), controller.effects.clone())
                .unwrap();

        assert!(!controller.select_protection_mode(ProtectionMode::FullProtection, "test"));
        assert_eq!(bus.get_int("downstairs.mode").unwrap(), 1);
    }

    #[test]
    fn test_missing_zone_is_recorded_failure() {
        let yaml = r#"
controller:
  designation: "house"
  zones:
    - zone: "upstairs"
    - zone: "ghost"
zones:
  - name: "upstairs"
"#;
        let (mut controller, bus, _rx) = build(yaml);
        assert!(!controller.select_protection_mode(ProtectionMode::FullProtection, "test"));
        assert_eq!(bus.get_int("upstairs.mode").unwrap(), 1);
    }

    #[test]
    fn test_disarm_is_idempotent() {
        let (mut controller, bus, _rx) = build(TWO_ZONES);
        controller.select_protection_mode(ProtectionMode::FullProtection, "test");

        assert!(controller.select_protection_mode(ProtectionMode::Disarmed, "test"));
        let first = bus.snapshot();
        assert!(controller.select_protection_mode(ProtectionMode::Disarmed, "test"));
        assert_eq!(bus.snapshot(), first);
        assert_eq!(bus.get_int("house.mode").unwrap(), 0);
        assert_eq!(bus.get_int("house.system_state").unwrap(), 0);
    }

    #[test]
    fn test_controller_owns_effects_without_check_or_delay() {
        let (mut controller, _bus, mut rx) = build(TWO_ZONES);
        drain(&mut rx);

        controller.select_protection_mode(ProtectionMode::FullProtection, "test");

        let events = drain(&mut rx);
        let notifications: Vec<_> = events
            .iter()
            .filter(|e| matches!(e, EffectEvent::Notification { .. }))
            .collect();
        // Exactly one notification, owned by the controller
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].owner(), "house");
    }

    #[test]
    fn test_zone_owns_effects_with_activation_check() {
        let yaml = r#"
controller:
  designation: "house"
  modes:
    full_protection:
      activation_check: true
  zones:
    - zone: "upstairs"
  notification:
    full_protection:
      enabled: true
      text: "armed"
zones:
  - name: "upstairs"
    full_protection:
      activation_check: true
    notification:
      armed:
        enabled: true
        text: "zone armed"
"#;
        let (mut controller, _bus, mut rx) = build(yaml);
        drain(&mut rx);

        assert!(controller.select_protection_mode(ProtectionMode::FullProtection, "test"));

        let events = drain(&mut rx);
        let notifications: Vec<_> = events
            .iter()
            .filter(|e| matches!(e, EffectEvent::Notification { .. }))
            .collect();
        // The gate hands ownership to the zone
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].owner(), "upstairs");
    }

    #[test]
    fn test_sensor_trip_updates_alarm_aggregates() {
        let (mut controller, bus, _rx) = build(TWO_ZONES);
        controller.select_protection_mode(ProtectionMode::FullProtection, "test");
        controller.drain_pending(UpdateScope::Full);

        bus.set("upstairs.front_door", Value::Bool(true)).unwrap();
        controller.handle_member_change("upstairs.front_door").unwrap();
        controller.drain_pending(UpdateScope::Full);

        assert_eq!(bus.get_bool("house.alarm").unwrap(), true);
        assert_eq!(bus.get_bool("house.alarm_switch").unwrap(), true);
        assert_eq!(bus.get_bool("house.siren").unwrap(), true);
        assert_eq!(
            bus.get_string("house.alerting_sensor").unwrap(),
            "Front door"
        );
    }

    #[test]
    fn test_door_window_aggregate_follows_members() {
        let (mut controller, bus, _rx) = build(TWO_ZONES);

        bus.set("upstairs.front_door", Value::Bool(true)).unwrap();
        controller.handle_member_change("upstairs.front_door").unwrap();
        controller.drain_pending(UpdateScope::Full);

        assert_eq!(bus.get_bool("house.door_window").unwrap(), true);
    }

    #[test]
    fn test_mode_request_signal_selects_mode() {
        let (mut controller, bus, _rx) = build(TWO_ZONES);

        bus.set("house.mode_request", Value::Int(1)).unwrap();
        controller.handle_member_change("house.mode_request").unwrap();

        assert_eq!(bus.get_int("upstairs.mode").unwrap(), 1);
        assert_eq!(bus.get_int("house.mode").unwrap(), 1);
    }

    #[test]
    fn test_delayed_arming_sets_delayed_system_state() {
        let yaml = r#"
controller:
  designation: "house"
  modes:
    full_protection:
      activation_delay: true
  zones:
    - zone: "upstairs"
zones:
  - name: "upstairs"
    full_protection:
      activation_delay_secs: 0
"#;
        // Zero-second delay promotes on the first tick
        let mut config = Config::from_yaml(yaml).unwrap();
        config.zones[0].full_protection.activation_delay_secs = 1;
        let bus = SignalBus::new();
        let (effects, _rx) = EffectSender::channel();
        let mut controller = Controller::new(config, bus.clone(), effects).unwrap();

        controller.select_protection_mode(ProtectionMode::FullProtection, "test");
        assert_eq!(
            bus.get_int("house.system_state").unwrap(),
            crate::mode::SystemState::DelayedArmed.code()
        );
        assert_eq!(
            controller.zone("upstairs").unwrap().state(),
            ArmState::DelayedArmed
        );
    }
}
