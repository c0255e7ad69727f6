// src/gate.rs - Side-effect ownership decisions per mode transition
//
// For every mode selection exactly one party fires each side-effect
// category: the controller, or the individual zones. When a mode runs with
// an activation check or an activation delay, the outcome is only known
// after the zone resolves it, so ownership moves to the zone regardless of
// the controller's own use flags.

use crate::{config::ControllerConfig, mode::ProtectionMode};

/// Gate decisions for one mode transition, computed once before any zone
/// is touched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateDecision {
    /// Controller fires the notification
    pub notification: bool,
    /// Controller fires the status indicator
    pub status_indicator: bool,
    /// Controller fires the acknowledgement tone
    pub acknowledgement_tone: bool,
    /// Controller fires the custom action
    pub action: bool,
}

impl GateDecision {
    /// Inverse of this decision: what the zones are permitted to fire
    pub fn zone_permits(&self) -> FxPermits {
        FxPermits {
            notification: !self.notification,
            status_indicator: !self.status_indicator,
            acknowledgement_tone: !self.acknowledgement_tone,
            action: !self.action,
        }
    }
}

/// Per-category permission handed to a zone during a mode sweep
///
/// A zone only fires a side effect when the controller is not going to
/// fire the same category itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FxPermits {
    /// Zone may fire its notification
    pub notification: bool,
    /// Zone may fire its status indicator
    pub status_indicator: bool,
    /// Zone may fire its acknowledgement tone
    pub acknowledgement_tone: bool,
    /// Zone may fire its custom action
    pub action: bool,
}

impl FxPermits {
    /// Permit everything; used when a zone is operated on its own
    pub fn all() -> Self {
        Self {
            notification: true,
            status_indicator: true,
            acknowledgement_tone: true,
            action: true,
        }
    }
}

/// The side-effect gate over a controller configuration
pub struct SideEffectGate<'a> {
    config: &'a ControllerConfig,
}

impl<'a> SideEffectGate<'a> {
    /// Gate over the controller's configuration
    pub fn new(config: &'a ControllerConfig) -> Self {
        Self { config }
    }

    /// Compute all four category decisions for a mode transition
    ///
    /// The categories are independent; none short-circuits another.
    pub fn decide(&self, mode: ProtectionMode) -> GateDecision {
        GateDecision {
            notification: self.check_notification(mode),
            status_indicator: self.check_status_indicator(mode),
            acknowledgement_tone: self.check_acknowledgement_tone(mode),
            action: self.check_action(mode),
        }
    }

    /// Should the controller fire the notification for this mode?
    ///
    /// Notification carries per-mode use flags.
    pub fn check_notification(&self, mode: ProtectionMode) -> bool {
        if self.zone_owns(mode) {
            return false;
        }
        self.config.notification_template(mode).enabled
    }

    /// Should the controller fire the status indicator for this mode?
    pub fn check_status_indicator(&self, mode: ProtectionMode) -> bool {
        if self.zone_owns(mode) {
            return false;
        }
        match mode {
            ProtectionMode::Disarmed => self.config.status_indicator.use_disarmed,
            _ => self.config.status_indicator.use_armed,
        }
    }

    /// Should the controller fire the acknowledgement tone for this mode?
    pub fn check_acknowledgement_tone(&self, mode: ProtectionMode) -> bool {
        if self.zone_owns(mode) {
            return false;
        }
        match mode {
            ProtectionMode::Disarmed => self.config.acknowledgement_tone.use_disarmed,
            _ => self.config.acknowledgement_tone.use_armed,
        }
    }

    /// Should the controller fire the custom action for this mode?
    pub fn check_action(&self, mode: ProtectionMode) -> bool {
        if self.zone_owns(mode) {
            return false;
        }
        match mode {
            ProtectionMode::Disarmed => self.config.action.use_disarmed,
            _ => self.config.action.use_armed,
        }
    }

    /// Ownership moves to the zone for armed modes with a pending
    /// activation check or delay; disarm transitions always resolve
    /// immediately.
    fn zone_owns(&self, mode: ProtectionMode) -> bool {
        if !mode.is_armed() {
            return false;
        }
        let options = self.config.mode_options(mode);
        options.activation_check || options.activation_delay
    }
}
