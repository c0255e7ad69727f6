// src/effects.rs - Side-effect events emitted by zones and the controller
//
// Notification, status indicator, acknowledgement tone and custom action
// are not executed in-process; they are emitted as events on a channel and
// consumed by whatever the installation wires up (the binary logs them,
// tests record them).

use crate::{
    error::{AlarmError, Result},
    mode::ProtectionMode,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;

/// Side-effect events
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum EffectEvent {
    /// Push notification
    Notification {
        owner: String,
        title: String,
        text: String,
        timestamp: DateTime<Utc>,
    },

    /// Status indicator (e.g. an LED showing the armed state)
    StatusIndicator {
        owner: String,
        mode: ProtectionMode,
        armed: bool,
        timestamp: DateTime<Utc>,
    },

    /// Acknowledgement tone on mode confirmation
    AcknowledgementTone {
        owner: String,
        armed: bool,
        timestamp: DateTime<Utc>,
    },

    /// Externally configured custom action
    Action {
        owner: String,
        command: String,
        timestamp: DateTime<Utc>,
    },
}

impl EffectEvent {
    /// Who fired the event (zone designation or controller designation)
    pub fn owner(&self) -> &str {
        match self {
            EffectEvent::Notification { owner, .. } => owner,
            EffectEvent::StatusIndicator { owner, .. } => owner,
            EffectEvent::AcknowledgementTone { owner, .. } => owner,
            EffectEvent::Action { owner, .. } => owner,
        }
    }
}

/// Sending half of the side-effect channel
///
/// Clones share the same channel, so zones and the controller all feed one
/// consumer.
#[derive(Debug, Clone)]
pub struct EffectSender {
    tx: mpsc::UnboundedSender<EffectEvent>,
}

impl EffectSender {
    /// Create a new side-effect channel
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<EffectEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Emit a side-effect event
    pub fn emit(&self, event: EffectEvent) -> Result<()> {
        self.tx
            .send(event)
            .map_err(|_| AlarmError::Runtime("Failed to send effect event".to_string()))
    }

    /// Emit a notification
    pub fn notification(&self, owner: &str, title: &str, text: &str) -> Result<()> {
        self.emit(EffectEvent::Notification {
            owner: owner.to_string(),
            title: title.to_string(),
            text: text.to_string(),
            timestamp: Utc::now(),
        })
    }

    /// Emit a status indicator update
    pub fn status_indicator(&self, owner: &str, mode: ProtectionMode) -> Result<()> {
        self.emit(EffectEvent::StatusIndicator {
            owner: owner.to_string(),
            mode,
            armed: mode.is_armed(),
            timestamp: Utc::now(),
        })
    }

    /// Emit an acknowledgement tone
    pub fn acknowledgement_tone(&self, owner: &str, armed: bool) -> Result<()> {
        self.emit(EffectEvent::AcknowledgementTone {
            owner: owner.to_string(),
            armed,
            timestamp: Utc::now(),
        })
    }

    /// Emit a custom action
    pub fn action(&self, owner: &str, command: &str) -> Result<()> {
        self.emit(EffectEvent::Action {
            owner: owner.to_string(),
            command: command.to_string(),
            timestamp: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effect_channel() {
        let (sender, mut rx) = EffectSender::channel();

        sender
            .notification("house", "Alarm system", "armed")
            .unwrap();
        sender
            .status_indicator("house", ProtectionMode::FullProtection)
            .unwrap();

        match rx.try_recv().unwrap() {
            EffectEvent::Notification { owner, text, .. } => {
                assert_eq!(owner, "house");
                assert_eq!(text, "armed");
            }
            other => panic!("unexpected event: {:?}", other),
        }

        match rx.try_recv().unwrap() {
            EffectEvent::StatusIndicator { armed, mode, .. } => {
                assert!(armed);
                assert_eq!(mode, ProtectionMode::FullProtection);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_emit_after_receiver_dropped() {
        let (sender, rx) = EffectSender::channel();
        drop(rx);
        assert!(sender.notification("house", "t", "x").is_err());
    }
}
