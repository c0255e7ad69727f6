// src/mode.rs - Protection mode and arm state enumerations
use crate::error::{AlarmError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Protection modes selectable on a zone or across the whole system
///
/// The integer representation is what flows over the signal bus; the
/// kebab-case names are what appears in configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProtectionMode {
    /// All zones disarmed
    Disarmed = 0,

    /// Full protection - every assigned sensor armed
    FullProtection = 1,

    /// Hull protection - shell sensors only (doors, windows, glass)
    HullProtection = 2,

    /// Partial protection - the configured subset of sensors
    PartialProtection = 3,

    /// Individual protection - each zone follows its own configured mode
    IndividualProtection = 4,
}

impl ProtectionMode {
    /// Integer code as published on the signal bus
    pub fn code(self) -> i64 {
        self as i64
    }

    /// Decode a bus value back into a mode
    pub fn from_code(code: i64) -> Result<Self> {
        match code {
            0 => Ok(ProtectionMode::Disarmed),
            1 => Ok(ProtectionMode::FullProtection),
            2 => Ok(ProtectionMode::HullProtection),
            3 => Ok(ProtectionMode::PartialProtection),
            4 => Ok(ProtectionMode::IndividualProtection),
            other => Err(AlarmError::Config(format!(
                "Unknown protection mode code: {}",
                other
            ))),
        }
    }

    /// True for every mode except [`ProtectionMode::Disarmed`]
    pub fn is_armed(self) -> bool {
        !matches!(self, ProtectionMode::Disarmed)
    }
}

impl fmt::Display for ProtectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProtectionMode::Disarmed => "disarmed",
            ProtectionMode::FullProtection => "full protection",
            ProtectionMode::HullProtection => "hull protection",
            ProtectionMode::PartialProtection => "partial protection",
            ProtectionMode::IndividualProtection => "individual protection",
        };
        write!(f, "{}", name)
    }
}

/// Per-zone mode override used by [`ProtectionMode::IndividualProtection`]
///
/// `NoFunction` marks a zone that an individual sweep skips entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum IndividualMode {
    /// Zone is skipped by individual protection sweeps
    #[default]
    NoFunction,
    /// Disarm the zone
    Disarmed,
    /// Arm the zone in full protection
    FullProtection,
    /// Arm the zone in hull protection
    HullProtection,
    /// Arm the zone in partial protection
    PartialProtection,
}

impl IndividualMode {
    /// The concrete mode to apply to the zone, or `None` to skip it
    pub fn as_mode(self) -> Option<ProtectionMode> {
        match self {
            IndividualMode::NoFunction => None,
            IndividualMode::Disarmed => Some(ProtectionMode::Disarmed),
            IndividualMode::FullProtection => Some(ProtectionMode::FullProtection),
            IndividualMode::HullProtection => Some(ProtectionMode::HullProtection),
            IndividualMode::PartialProtection => Some(ProtectionMode::PartialProtection),
        }
    }
}

/// Detailed arming state of a zone, and of the system as a whole
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ArmState {
    /// Not armed
    #[default]
    Disarmed = 0,

    /// Armed with the full sensor set for the selected mode
    Armed = 1,

    /// Activation delay running, will become armed when it elapses
    DelayedArmed = 2,

    /// Armed with some sensors blocked (open on activation)
    PartialArmed = 3,

    /// Activation delay running towards a partially armed state
    DelayedPartialArmed = 4,
}

impl ArmState {
    /// Integer code as published on the signal bus
    pub fn code(self) -> i64 {
        self as i64
    }

    /// Decode a bus value back into an arm state
    pub fn from_code(code: i64) -> Result<Self> {
        match code {
            0 => Ok(ArmState::Disarmed),
            1 => Ok(ArmState::Armed),
            2 => Ok(ArmState::DelayedArmed),
            3 => Ok(ArmState::PartialArmed),
            4 => Ok(ArmState::DelayedPartialArmed),
            other => Err(AlarmError::Config(format!(
                "Unknown arm state code: {}",
                other
            ))),
        }
    }

    /// True while an activation delay is still running
    pub fn is_delayed(self) -> bool {
        matches!(self, ArmState::DelayedArmed | ArmState::DelayedPartialArmed)
    }

    /// True once the zone actively monitors its sensors
    pub fn is_armed(self) -> bool {
        matches!(self, ArmState::Armed | ArmState::PartialArmed)
    }
}

impl fmt::Display for ArmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ArmState::Disarmed => "disarmed",
            ArmState::Armed => "armed",
            ArmState::DelayedArmed => "delayed armed",
            ArmState::PartialArmed => "partially armed",
            ArmState::DelayedPartialArmed => "delayed partially armed",
        };
        write!(f, "{}", name)
    }
}

/// Coarse system state derived from all member zones
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SystemState {
    /// Every zone disarmed
    #[default]
    Disarmed = 0,

    /// At least one zone armed
    Armed = 1,

    /// At least one zone still in its activation delay
    DelayedArmed = 2,
}

impl SystemState {
    /// Integer code as published on the signal bus
    pub fn code(self) -> i64 {
        self as i64
    }
}

impl fmt::Display for SystemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SystemState::Disarmed => "disarmed",
            SystemState::Armed => "armed",
            SystemState::DelayedArmed => "delayed armed",
        };
        write!(f, "{}", name)
    }
}
