// src/zone.rs - Single alarm zone: arming, activation check/delay, alarms
//
// A zone owns a set of sensors and publishes its whole observable state to
// the signal bus under its own namespace. The controller commands zones
// through apply_mode and aggregates their published signals; sensors feed
// the zone through on_sensor_change. Delay handling is deadline based and
// driven by tick, so nothing here blocks.

use crate::{
    config::{OpenSensorPolicy, SensorCategory, ZoneConfig},
    effects::EffectSender,
    error::{AlarmError, Result},
    gate::FxPermits,
    mode::{ArmState, ProtectionMode},
    signal::SignalBus,
    value::Value,
};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// An alarm pending its configured delay
#[derive(Debug, Clone)]
struct PendingAlarm {
    designation: String,
    category: SensorCategory,
    deadline: DateTime<Utc>,
}

/// A single alarm zone
pub struct Zone {
    config: ZoneConfig,
    bus: SignalBus,
    effects: EffectSender,
    mode: ProtectionMode,
    state: ArmState,
    alarm: bool,
    /// Sensors blocked because they were open on activation
    blocked: HashSet<String>,
    activation_deadline: Option<DateTime<Utc>>,
    /// Permits to use once a running activation delay resolves
    pending_fx: Option<FxPermits>,
    pending_alarm: Option<PendingAlarm>,
}

impl Zone {
    /// Create a zone and publish its initial state
    pub fn new(config: ZoneConfig, bus: SignalBus, effects: EffectSender) -> Result<Self> {
        let mut zone = Self {
            config,
            bus,
            effects,
            mode: ProtectionMode::Disarmed,
            state: ArmState::Disarmed,
            alarm: false,
            blocked: HashSet::new(),
            activation_deadline: None,
            pending_fx: None,
            pending_alarm: None,
        };
        zone.publish_all()?;
        Ok(zone)
    }

    /// Zone name (also its signal namespace)
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Current commanded protection mode
    pub fn mode(&self) -> ProtectionMode {
        self.mode
    }

    /// Current arm state
    pub fn state(&self) -> ArmState {
        self.state
    }

    /// True while an alarm is raised
    pub fn alarm_raised(&self) -> bool {
        self.alarm
    }

    fn signal(&self, suffix: &str) -> String {
        format!("{}.{}", self.config.name, suffix)
    }

    fn publish(&self, suffix: &str, value: Value) -> Result<()> {
        self.bus.set(self.signal(suffix), value)
    }

    fn publish_all(&mut self) -> Result<()> {
        self.publish("mode", Value::Int(self.mode.code()))?;
        self.publish("state", Value::Int(self.state.code()))?;
        self.publish("alarm", Value::Bool(self.alarm))?;
        self.publish("alarm_switch", Value::Bool(self.alarm))?;
        self.publish("siren", Value::Bool(false))?;
        self.publish("light", Value::Bool(false))?;
        self.publish("alarm_call", Value::Bool(false))?;
        self.publish("panic", Value::Bool(false))?;
        self.publish("alerting_sensor", Value::String(String::new()))?;
        self.publish(
            "glass_breakage_control",
            Value::Bool(self.config.glass_breakage_control),
        )?;
        for category in [
            SensorCategory::DoorWindow,
            SensorCategory::Motion,
            SensorCategory::GlassBreakage,
            SensorCategory::Smoke,
            SensorCategory::Water,
        ] {
            self.publish_category_state(category)?;
        }
        Ok(())
    }

    /// Republish the OR of all live sensors of one category
    fn publish_category_state(&self, category: SensorCategory) -> Result<()> {
        let suffix = match category {
            SensorCategory::DoorWindow => "door_window",
            SensorCategory::Motion => "motion",
            SensorCategory::GlassBreakage => "glass_breakage",
            SensorCategory::Smoke => "smoke",
            SensorCategory::Water => "water",
            // Panic buttons have no raw published state, only the alarm
            SensorCategory::Panic => return Ok(()),
        };
        let tripped = self
            .config
            .sensors
            .iter()
            .filter(|s| s.enabled && s.category == category)
            .filter_map(|s| self.bus.get(&s.signal))
            .any(|v| v.as_bool().unwrap_or(false));
        self.publish(suffix, Value::Bool(tripped))
    }

    // ------------------------------------------------------------------
    // Mode application
    // ------------------------------------------------------------------

    /// Apply a protection mode to this zone
    ///
    /// Returns the arm state the zone ended up in; a delayed state means
    /// the activation delay is still running and tick will finish the job.
    /// `permits` says which side-effect categories this zone fires itself.
    pub fn apply_mode(
        &mut self,
        mode: ProtectionMode,
        permits: FxPermits,
        now: DateTime<Utc>,
    ) -> Result<ArmState> {
        if !self.config.active {
            return Err(AlarmError::Runtime(format!(
                "Zone '{}' is in maintenance mode",
                self.config.name
            )));
        }
        match mode {
            ProtectionMode::IndividualProtection => Err(AlarmError::Config(format!(
                "Zone '{}' cannot be armed in individual protection directly",
                self.config.name
            ))),
            ProtectionMode::Disarmed => self.disarm(permits),
            armed => self.arm(armed, permits, now),
        }
    }

    fn disarm(&mut self, permits: FxPermits) -> Result<ArmState> {
        self.clear_alarm_outputs()?;
        self.blocked.clear();
        self.activation_deadline = None;
        self.pending_fx = None;
        self.mode = ProtectionMode::Disarmed;
        self.state = ArmState::Disarmed;
        self.publish("mode", Value::Int(self.mode.code()))?;
        self.publish("state", Value::Int(self.state.code()))?;

        info!("Zone '{}' disarmed", self.config.name);

        if permits.notification && self.config.notification.disarmed.enabled {
            let template = &self.config.notification.disarmed;
            self.effects
                .notification(self.config.display_name(), &template.title, &template.text)?;
        }
        if permits.status_indicator && self.config.status_indicator.use_disarmed {
            self.effects
                .status_indicator(self.config.display_name(), ProtectionMode::Disarmed)?;
        }
        if permits.acknowledgement_tone && self.config.acknowledgement_tone.use_disarmed {
            self.effects
                .acknowledgement_tone(self.config.display_name(), false)?;
        }
        if permits.action && self.config.action.use_disarmed {
            if let Some(command) = &self.config.action.disarmed_command {
                self.effects.action(self.config.display_name(), command)?;
            }
        }

        Ok(self.state)
    }

    fn arm(
        &mut self,
        mode: ProtectionMode,
        permits: FxPermits,
        now: DateTime<Utc>,
    ) -> Result<ArmState> {
        let options = self.config.arming_options(mode).clone();

        // Activation check: door/window sensors of the armed set must be
        // closed, or the configured policy decides what happens
        let mut partial = false;
        if options.activation_check {
            let open: Vec<String> = self
                .config
                .sensors
                .iter()
                .filter(|s| {
                    s.enabled
                        && s.category == SensorCategory::DoorWindow
                        && s.armed_in(mode)
                })
                .filter(|s| {
                    self.bus
                        .get(&s.signal)
                        .and_then(|v| v.as_bool())
                        .unwrap_or(false)
                })
                .map(|s| s.display_name().to_string())
                .collect();

            if !open.is_empty() {
                match self.config.open_sensor_policy {
                    OpenSensorPolicy::Abort => {
                        warn!(
                            "Zone '{}': activation aborted, open sensors: {}",
                            self.config.name,
                            open.join(", ")
                        );
                        return Err(AlarmError::Runtime(format!(
                            "Zone '{}' has open sensors",
                            self.config.name
                        )));
                    }
                    OpenSensorPolicy::Partial => {
                        self.blocked = self
                            .config
                            .sensors
                            .iter()
                            .filter(|s| {
                                s.enabled
                                    && s.category == SensorCategory::DoorWindow
                                    && s.armed_in(mode)
                            })
                            .filter(|s| {
                                self.bus
                                    .get(&s.signal)
                                    .and_then(|v| v.as_bool())
                                    .unwrap_or(false)
                            })
                            .map(|s| s.signal.clone())
                            .collect();
                        partial = true;
                        debug!(
                            "Zone '{}': arming partially, blocked sensors: {}",
                            self.config.name,
                            open.join(", ")
                        );
                    }
                }
            }
        }

        // A fresh arming starts from a clean alarm state
        self.clear_alarm_outputs()?;
        self.mode = mode;

        if options.activation_delay_secs > 0 {
            self.state = if partial {
                ArmState::DelayedPartialArmed
            } else {
                ArmState::DelayedArmed
            };
            self.activation_deadline =
                Some(now + Duration::seconds(options.activation_delay_secs as i64));
            self.pending_fx = Some(permits);

            info!(
                "Zone '{}' arming in {} ({}s delay)",
                self.config.name, mode, options.activation_delay_secs
            );

            if permits.notification {
                let template = &self.config.notification.armed;
                if template.enabled {
                    if let Some(text) = &template.delayed_text {
                        self.effects.notification(
                            self.config.display_name(),
                            &template.title,
                            text,
                        )?;
                    }
                }
            }
        } else {
            self.state = if partial {
                ArmState::PartialArmed
            } else {
                ArmState::Armed
            };
            self.activation_deadline = None;
            info!("Zone '{}' armed in {}", self.config.name, mode);
            self.fire_armed_effects(permits)?;
        }

        self.publish("mode", Value::Int(self.mode.code()))?;
        self.publish("state", Value::Int(self.state.code()))?;
        Ok(self.state)
    }

    fn fire_armed_effects(&self, permits: FxPermits) -> Result<()> {
        if permits.notification && self.config.notification.armed.enabled {
            let template = &self.config.notification.armed;
            self.effects
                .notification(self.config.display_name(), &template.title, &template.text)?;
        }
        if permits.status_indicator && self.config.status_indicator.use_armed {
            self.effects
                .status_indicator(self.config.display_name(), self.mode)?;
        }
        if permits.acknowledgement_tone && self.config.acknowledgement_tone.use_armed {
            self.effects
                .acknowledgement_tone(self.config.display_name(), true)?;
        }
        if permits.action && self.config.action.use_armed {
            if let Some(command) = &self.config.action.armed_command {
                self.effects.action(self.config.display_name(), command)?;
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Sensor handling
    // ------------------------------------------------------------------

    /// React to a changed sensor signal
    ///
    /// Signals that are not an enabled sensor of this zone are ignored, so
    /// the controller can forward every bus change without filtering.
    pub fn on_sensor_change(&mut self, signal: &str, now: DateTime<Utc>) -> Result<()> {
        let sensor = match self
            .config
            .sensors
            .iter()
            .find(|s| s.enabled && s.signal == signal)
        {
            Some(sensor) => sensor.clone(),
            None => return Ok(()),
        };

        if !self.config.active {
            return Ok(());
        }

        self.publish_category_state(sensor.category)?;

        let tripped = match self.bus.get(signal) {
            Some(value) => value.as_bool().unwrap_or(false),
            None => {
                warn!(
                    "Zone '{}': sensor '{}' disappeared from the bus",
                    self.config.name, signal
                );
                return Ok(());
            }
        };
        if !tripped {
            return Ok(());
        }

        // Panic buttons trip regardless of arming state
        if sensor.category == SensorCategory::Panic {
            return self.raise_alarm(sensor.display_name(), sensor.category);
        }

        if !self.state.is_armed() {
            return Ok(());
        }
        if !sensor.armed_in(self.mode) {
            return Ok(());
        }
        if self.blocked.contains(signal) {
            debug!(
                "Zone '{}': blocked sensor '{}' tripped, ignoring",
                self.config.name, signal
            );
            return Ok(());
        }
        if sensor.category == SensorCategory::GlassBreakage && !self.config.glass_breakage_control {
            return Ok(());
        }

        if self.config.alarm_delay_secs > 0 {
            // An earlier pending alarm keeps its deadline
            if self.pending_alarm.is_none() {
                self.pending_alarm = Some(PendingAlarm {
                    designation: sensor.display_name().to_string(),
                    category: sensor.category,
                    deadline: now + Duration::seconds(self.config.alarm_delay_secs as i64),
                });
                debug!(
                    "Zone '{}': alarm pending for '{}' ({}s delay)",
                    self.config.name,
                    sensor.display_name(),
                    self.config.alarm_delay_secs
                );
            }
            Ok(())
        } else {
            self.raise_alarm(sensor.display_name(), sensor.category)
        }
    }

    fn raise_alarm(&mut self, designation: &str, category: SensorCategory) -> Result<()> {
        self.alarm = true;
        self.pending_alarm = None;
        self.publish("alarm", Value::Bool(true))?;
        self.publish("alarm_switch", Value::Bool(true))?;
        self.publish("siren", Value::Bool(self.config.use_siren))?;
        self.publish("light", Value::Bool(self.config.use_light))?;
        self.publish("alarm_call", Value::Bool(self.config.use_alarm_call))?;
        if category == SensorCategory::Panic {
            self.publish("panic", Value::Bool(true))?;
        }
        self.publish("alerting_sensor", Value::String(designation.to_string()))?;

        warn!(
            "Zone '{}': alarm raised by '{}'",
            self.config.name, designation
        );

        // Alarm notifications are always zone-owned
        let template = &self.config.notification.alarm;
        if template.enabled {
            let text = template.text.replace("{sensor}", designation);
            self.effects
                .notification(self.config.display_name(), &template.title, &text)?;
        }
        Ok(())
    }

    fn clear_alarm_outputs(&mut self) -> Result<()> {
        self.alarm = false;
        self.pending_alarm = None;
        self.publish("alarm", Value::Bool(false))?;
        self.publish("alarm_switch", Value::Bool(false))?;
        self.publish("siren", Value::Bool(false))?;
        self.publish("light", Value::Bool(false))?;
        self.publish("alarm_call", Value::Bool(false))?;
        self.publish("panic", Value::Bool(false))?;
        self.publish("alerting_sensor", Value::String(String::new()))?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Timer handling
    // ------------------------------------------------------------------

    /// Promote elapsed activation delays and fire elapsed alarm delays
    pub fn tick(&mut self, now: DateTime<Utc>) -> Result<()> {
        if let Some(deadline) = self.activation_deadline {
            if now >= deadline {
                self.activation_deadline = None;
                self.state = match self.state {
                    ArmState::DelayedArmed => ArmState::Armed,
                    ArmState::DelayedPartialArmed => ArmState::PartialArmed,
                    other => other,
                };
                self.publish("state", Value::Int(self.state.code()))?;
                info!(
                    "Zone '{}' activation delay elapsed, now {}",
                    self.config.name, self.state
                );
                if let Some(permits) = self.pending_fx.take() {
                    self.fire_armed_effects(permits)?;
                }
            }
        }

        if let Some(pending) = self.pending_alarm.clone() {
            if now >= pending.deadline {
                self.raise_alarm(&pending.designation, pending.category)?;
            }
        }

        Ok(())
    }
}
