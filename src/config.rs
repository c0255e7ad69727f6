// src/config.rs - Configuration structures for zones and the controller

use crate::{
    error::{AlarmError, Result},
    mode::{IndividualMode, ProtectionMode},
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

// ============================================================================
// MAIN CONFIGURATION
// ============================================================================

/// Main VESTA configuration
///
/// One document describes the whole installation: the controller and the
/// zones it supervises. Loaded from YAML and validated before anything is
/// built from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Controller configuration
    pub controller: ControllerConfig,

    /// Zone definitions
    #[serde(default)]
    pub zones: Vec<ZoneConfig>,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml(&text)
    }

    /// Parse configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    ///
    /// Structural problems (empty names, duplicates) are rejected here so
    /// the runtime never has to re-check them ad hoc. References to zones
    /// or signals that do not exist yet are allowed; absence at runtime is
    /// handled by the liveness guards.
    pub fn validate(&self) -> Result<()> {
        if self.controller.designation.is_empty() {
            return Err(AlarmError::Config(
                "Controller designation cannot be empty".to_string(),
            ));
        }

        let mut names = HashSet::new();
        for zone in &self.zones {
            if zone.name.is_empty() {
                return Err(AlarmError::Config("Zone name cannot be empty".to_string()));
            }
            if !names.insert(zone.name.as_str()) {
                return Err(AlarmError::Config(format!(
                    "Duplicate zone name: {}",
                    zone.name
                )));
            }
            zone.validate()?;
        }

        for zone_ref in &self.controller.zones {
            if zone_ref.zone.is_empty() {
                return Err(AlarmError::Config(
                    "Zone reference with empty zone name".to_string(),
                ));
            }
        }

        self.controller.members.validate()?;

        Ok(())
    }
}

// ============================================================================
// CONTROLLER CONFIGURATION
// ============================================================================

/// Configuration of the zone controller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Designation, also the namespace for published aggregate signals
    pub designation: String,

    /// Controller is operational; false means maintenance mode and every
    /// public operation becomes a no-op
    #[serde(default = "default_true")]
    pub active: bool,

    /// Per-mode availability and activation options
    #[serde(default)]
    pub modes: ModesConfig,

    /// Member zones commanded by mode selection
    #[serde(default)]
    pub zones: Vec<ZoneRef>,

    /// Member lists feeding the aggregates; when every list is empty the
    /// standard lists are derived from the zone references
    #[serde(default)]
    pub members: AggregateMembers,

    /// Notification configuration, per mode
    #[serde(default)]
    pub notification: NotificationConfig,

    /// Status indicator use flags
    #[serde(default)]
    pub status_indicator: CategoryFlags,

    /// Acknowledgement tone use flags
    #[serde(default)]
    pub acknowledgement_tone: CategoryFlags,

    /// Custom action configuration
    #[serde(default)]
    pub action: ActionConfig,
}

impl ControllerConfig {
    /// Activation options for a mode
    pub fn mode_options(&self, mode: ProtectionMode) -> &ModeOptions {
        match mode {
            ProtectionMode::Disarmed => &self.modes.disarmed,
            ProtectionMode::FullProtection => &self.modes.full_protection,
            ProtectionMode::HullProtection => &self.modes.hull_protection,
            ProtectionMode::PartialProtection => &self.modes.partial_protection,
            ProtectionMode::IndividualProtection => &self.modes.individual_protection,
        }
    }

    /// Notification template for a mode
    pub fn notification_template(&self, mode: ProtectionMode) -> &NotificationTemplate {
        match mode {
            ProtectionMode::Disarmed => &self.notification.disarmed,
            ProtectionMode::FullProtection => &self.notification.full_protection,
            ProtectionMode::HullProtection => &self.notification.hull_protection,
            ProtectionMode::PartialProtection => &self.notification.partial_protection,
            ProtectionMode::IndividualProtection => &self.notification.individual_protection,
        }
    }
}

/// Per-mode availability and activation options
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ModesConfig {
    /// Disarmed mode options
    #[serde(default)]
    pub disarmed: ModeOptions,
    /// Full protection options
    #[serde(default)]
    pub full_protection: ModeOptions,
    /// Hull protection options
    #[serde(default)]
    pub hull_protection: ModeOptions,
    /// Partial protection options
    #[serde(default)]
    pub partial_protection: ModeOptions,
    /// Individual protection options
    #[serde(default)]
    pub individual_protection: ModeOptions,
}

/// Availability and activation options of one protection mode
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModeOptions {
    /// Mode may be selected at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Zones verify their door/window sensors before arming in this mode
    #[serde(default)]
    pub activation_check: bool,

    /// Zones run an activation delay before arming in this mode
    #[serde(default)]
    pub activation_delay: bool,
}

impl Default for ModeOptions {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            activation_check: false,
            activation_delay: false,
        }
    }
}

/// Reference to a member zone
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneRef {
    /// Disabled references are ignored everywhere
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Zone name as registered with the controller
    pub zone: String,

    /// Human-readable designation
    #[serde(default)]
    pub designation: String,

    /// Mode this zone follows under individual protection
    #[serde(default)]
    pub individual_mode: IndividualMode,
}

/// Reference to a member signal feeding an aggregate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberRef {
    /// Disabled references are ignored everywhere
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Signal name on the bus
    pub signal: String,

    /// Human-readable designation
    #[serde(default)]
    pub designation: String,
}

impl MemberRef {
    fn new(signal: String) -> Self {
        Self {
            enabled: true,
            signal,
            designation: String::new(),
        }
    }
}

/// Member lists for every aggregate the controller publishes
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AggregateMembers {
    /// Zone protection-mode signals
    #[serde(default)]
    pub mode: Vec<MemberRef>,

    /// Zone detailed-state signals
    #[serde(default)]
    pub system_state: Vec<MemberRef>,

    /// Door/window open states
    #[serde(default)]
    pub door_window: Vec<MemberRef>,

    /// Motion detected states
    #[serde(default)]
    pub motion: Vec<MemberRef>,

    /// Glass breakage detected states
    #[serde(default)]
    pub glass_breakage: Vec<MemberRef>,

    /// Smoke detected states
    #[serde(default)]
    pub smoke: Vec<MemberRef>,

    /// Water detected states
    #[serde(default)]
    pub water: Vec<MemberRef>,

    /// Siren output states
    #[serde(default)]
    pub siren: Vec<MemberRef>,

    /// Light output states
    #[serde(default)]
    pub light: Vec<MemberRef>,

    /// Alarm call output states
    #[serde(default)]
    pub alarm_call: Vec<MemberRef>,

    /// Panic states
    #[serde(default)]
    pub panic: Vec<MemberRef>,

    /// Glass breakage detector control switches
    #[serde(default)]
    pub glass_breakage_control: Vec<MemberRef>,

    /// Zone alarm states
    #[serde(default)]
    pub alarm: Vec<MemberRef>,

    /// Alerting sensor designations
    #[serde(default)]
    pub alerting_sensor: Vec<MemberRef>,
}

impl AggregateMembers {
    /// True when no list has any entries
    pub fn is_empty(&self) -> bool {
        self.all_lists().iter().all(|list| list.is_empty())
    }

    /// Derive the standard member lists from zone references
    ///
    /// Each zone publishes a fixed set of signals under its own namespace;
    /// this builds one member entry per zone for every aggregate.
    pub fn for_zones(zones: &[ZoneRef]) -> Self {
        let refs = |suffix: &str| -> Vec<MemberRef> {
            zones
                .iter()
                .map(|z| {
                    let mut member = MemberRef::new(format!("{}.{}", z.zone, suffix));
                    member.enabled = z.enabled;
                    member.designation = if z.designation.is_empty() {
                        z.zone.clone()
                    } else {
                        z.designation.clone()
                    };
                    member
                })
                .collect()
        };
        Self {
            mode: refs("mode"),
            system_state: refs("state"),
            door_window: refs("door_window"),
            motion: refs("motion"),
            glass_breakage: refs("glass_breakage"),
            smoke: refs("smoke"),
            water: refs("water"),
            siren: refs("siren"),
            light: refs("light"),
            alarm_call: refs("alarm_call"),
            panic: refs("panic"),
            glass_breakage_control: refs("glass_breakage_control"),
            alarm: refs("alarm"),
            alerting_sensor: refs("alerting_sensor"),
        }
    }

    /// All signal names across all lists (for change subscription)
    pub fn subscribed_signals(&self) -> HashSet<String> {
        self.all_lists()
            .iter()
            .flat_map(|list| list.iter())
            .filter(|m| m.enabled)
            .map(|m| m.signal.clone())
            .collect()
    }

    fn all_lists(&self) -> [&Vec<MemberRef>; 14] {
        [
            &self.mode,
            &self.system_state,
            &self.door_window,
            &self.motion,
            &self.glass_breakage,
            &self.smoke,
            &self.water,
            &self.siren,
            &self.light,
            &self.alarm_call,
            &self.panic,
            &self.glass_breakage_control,
            &self.alarm,
            &self.alerting_sensor,
        ]
    }

    fn validate(&self) -> Result<()> {
        for list in self.all_lists() {
            for member in list {
                if member.signal.is_empty() {
                    return Err(AlarmError::Config(
                        "Member reference with empty signal name".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Notification templates, one per protection mode
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NotificationConfig {
    /// Disarm transition
    #[serde(default)]
    pub disarmed: NotificationTemplate,
    /// Full protection transition
    #[serde(default)]
    pub full_protection: NotificationTemplate,
    /// Hull protection transition
    #[serde(default)]
    pub hull_protection: NotificationTemplate,
    /// Partial protection transition
    #[serde(default)]
    pub partial_protection: NotificationTemplate,
    /// Individual protection transition
    #[serde(default)]
    pub individual_protection: NotificationTemplate,
}

/// One notification template
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationTemplate {
    /// Fire a notification for this transition at all
    #[serde(default)]
    pub enabled: bool,

    /// Notification title
    #[serde(default = "default_notification_title")]
    pub title: String,

    /// Notification text
    #[serde(default)]
    pub text: String,

    /// Alternative text when the transition ended in a delayed state
    #[serde(default)]
    pub delayed_text: Option<String>,
}

impl Default for NotificationTemplate {
    fn default() -> Self {
        Self {
            enabled: false,
            title: default_notification_title(),
            text: String::new(),
            delayed_text: None,
        }
    }
}

/// Use flags shared by status indicator and acknowledgement tone
///
/// Disarmed has its own flag; all armed modes share one.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CategoryFlags {
    /// Fire on disarm transitions
    #[serde(default)]
    pub use_disarmed: bool,
    /// Fire on armed transitions
    #[serde(default)]
    pub use_armed: bool,
}

/// Custom action configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ActionConfig {
    /// Dispatch on disarm transitions
    #[serde(default)]
    pub use_disarmed: bool,
    /// Dispatch on armed transitions
    #[serde(default)]
    pub use_armed: bool,

    /// Command dispatched on disarm transitions
    #[serde(default)]
    pub disarmed_command: Option<String>,

    /// Command dispatched on armed transitions
    #[serde(default)]
    pub armed_command: Option<String>,
}

// ============================================================================
// ZONE CONFIGURATION
// ============================================================================

/// Configuration of a single alarm zone
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneConfig {
    /// Zone name, also the namespace for its published signals
    pub name: String,

    /// Human-readable designation (defaults to the name)
    #[serde(default)]
    pub designation: String,

    /// Zone is operational; false means maintenance mode
    #[serde(default = "default_true")]
    pub active: bool,

    /// Sensors assigned to this zone
    #[serde(default)]
    pub sensors: Vec<SensorRef>,

    /// Arming options for full protection
    #[serde(default)]
    pub full_protection: ArmingOptions,

    /// Arming options for hull protection
    #[serde(default)]
    pub hull_protection: ArmingOptions,

    /// Arming options for partial protection
    #[serde(default)]
    pub partial_protection: ArmingOptions,

    /// What to do when door/window sensors are open during the activation
    /// check
    #[serde(default)]
    pub open_sensor_policy: OpenSensorPolicy,

    /// Seconds between a sensor trip and the alarm being raised (0 = raise
    /// immediately)
    #[serde(default)]
    pub alarm_delay_secs: u64,

    /// Drive the siren output when an alarm is raised
    #[serde(default = "default_true")]
    pub use_siren: bool,

    /// Drive the light output when an alarm is raised
    #[serde(default = "default_true")]
    pub use_light: bool,

    /// Drive the alarm call output when an alarm is raised
    #[serde(default)]
    pub use_alarm_call: bool,

    /// Glass breakage sensors are actively monitored
    #[serde(default = "default_true")]
    pub glass_breakage_control: bool,

    /// Zone-owned notification templates
    #[serde(default)]
    pub notification: ZoneNotificationConfig,

    /// Zone-owned status indicator flags
    #[serde(default)]
    pub status_indicator: CategoryFlags,

    /// Zone-owned acknowledgement tone flags
    #[serde(default)]
    pub acknowledgement_tone: CategoryFlags,

    /// Zone-owned custom action
    #[serde(default)]
    pub action: ActionConfig,
}

impl ZoneConfig {
    /// Human-readable designation, falling back to the zone name
    pub fn display_name(&self) -> &str {
        if self.designation.is_empty() {
            &self.name
        } else {
            &self.designation
        }
    }

    /// Arming options for a concrete (non-individual) protection mode
    pub fn arming_options(&self, mode: ProtectionMode) -> &ArmingOptions {
        match mode {
            ProtectionMode::FullProtection => &self.full_protection,
            ProtectionMode::HullProtection => &self.hull_protection,
            _ => &self.partial_protection,
        }
    }

    fn validate(&self) -> Result<()> {
        let mut signals = HashSet::new();
        for sensor in &self.sensors {
            if sensor.signal.is_empty() {
                return Err(AlarmError::Config(format!(
                    "Zone '{}' has a sensor with an empty signal name",
                    self.name
                )));
            }
            if !signals.insert(sensor.signal.as_str()) {
                return Err(AlarmError::Config(format!(
                    "Zone '{}' references sensor '{}' twice",
                    self.name, sensor.signal
                )));
            }
        }
        Ok(())
    }
}

/// Arming options of one protection mode within a zone
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ArmingOptions {
    /// Verify door/window sensors before arming
    #[serde(default)]
    pub activation_check: bool,

    /// Seconds of activation delay before the zone becomes armed
    /// (0 = arm immediately)
    #[serde(default)]
    pub activation_delay_secs: u64,
}

/// What a zone does when door/window sensors are open during the
/// activation check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum OpenSensorPolicy {
    /// Refuse to arm
    #[default]
    Abort,

    /// Block the open sensors and arm partially
    Partial,
}

/// Reference to a sensor assigned to a zone
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorRef {
    /// Disabled sensors are ignored everywhere
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Signal name on the bus
    pub signal: String,

    /// Human-readable designation
    #[serde(default)]
    pub designation: String,

    /// Sensor category, selects the published per-category state
    pub category: SensorCategory,

    /// Armed under full protection
    #[serde(default = "default_true")]
    pub full_protection: bool,

    /// Armed under hull protection
    #[serde(default)]
    pub hull_protection: bool,

    /// Armed under partial protection
    #[serde(default)]
    pub partial_protection: bool,
}

impl SensorRef {
    /// Human-readable designation, falling back to the signal name
    pub fn display_name(&self) -> &str {
        if self.designation.is_empty() {
            &self.signal
        } else {
            &self.designation
        }
    }

    /// True when this sensor is part of the armed set for `mode`
    pub fn armed_in(&self, mode: ProtectionMode) -> bool {
        match mode {
            ProtectionMode::FullProtection => self.full_protection,
            ProtectionMode::HullProtection => self.hull_protection,
            ProtectionMode::PartialProtection => self.partial_protection,
            _ => false,
        }
    }
}

/// Sensor categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SensorCategory {
    /// Door or window contact, relevant for the activation check
    DoorWindow,
    /// Motion detector
    Motion,
    /// Glass breakage detector
    GlassBreakage,
    /// Smoke detector
    Smoke,
    /// Water detector
    Water,
    /// Panic button, trips regardless of arming state
    Panic,
}

/// Zone-owned notification templates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneNotificationConfig {
    /// Disarm transition
    #[serde(default)]
    pub disarmed: NotificationTemplate,

    /// Arm transition (any armed mode)
    #[serde(default)]
    pub armed: NotificationTemplate,

    /// Alarm raised
    #[serde(default = "default_alarm_template")]
    pub alarm: NotificationTemplate,
}

impl Default for ZoneNotificationConfig {
    fn default() -> Self {
        Self {
            disarmed: NotificationTemplate::default(),
            armed: NotificationTemplate::default(),
            alarm: default_alarm_template(),
        }
    }
}

// ============================================================================
// DEFAULTS
// ============================================================================

fn default_true() -> bool {
    true
}

fn default_notification_title() -> String {
    "Alarm system".to_string()
}

fn default_alarm_template() -> NotificationTemplate {
    NotificationTemplate {
        enabled: true,
        title: default_notification_title(),
        text: "Alarm triggered".to_string(),
        delayed_text: None,
    }
}
