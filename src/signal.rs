// src/signal.rs - Signal bus implementation
use crate::{
    error::{AlarmError, Result},
    value::Value,
};
use dashmap::DashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;
use tracing::trace;

/// Thread-safe signal bus carrying member values and published statuses
///
/// The signal bus is the central data exchange mechanism in VESTA. Sensors
/// and zones publish their values here; the controller reads member values
/// and writes derived aggregates back. Entries may appear and disappear at
/// runtime, so readers guard every access with [`SignalBus::exists`].
///
/// # Examples
///
/// ```rust
/// use vesta::{SignalBus, Value};
///
/// let bus = SignalBus::new();
///
/// // Set a signal value
/// bus.set("hallway.front_door", Value::Bool(false))?;
///
/// // Get a signal value
/// let open = bus.get_bool("hallway.front_door")?;
/// assert_eq!(open, false);
/// # Ok::<(), vesta::AlarmError>(())
/// ```
#[derive(Debug, Clone)]
pub struct SignalBus {
    signals: Arc<DashMap<String, Value>>,
    listener: Arc<RwLock<Option<mpsc::UnboundedSender<(String, Value)>>>>,
}

impl SignalBus {
    /// Create a new signal bus
    pub fn new() -> Self {
        Self {
            signals: Arc::new(DashMap::new()),
            listener: Arc::new(RwLock::new(None)),
        }
    }

    /// Open the member-change channel
    ///
    /// Every write that actually changes a signal's value is reported on the
    /// returned receiver as `(name, new_value)`. Only one listener is active
    /// at a time; opening the channel again replaces the previous one.
    pub fn subscribe_changes(&self) -> mpsc::UnboundedReceiver<(String, Value)> {
        let (tx, rx) = mpsc::unbounded_channel();
        if let Ok(mut listener) = self.listener.write() {
            *listener = Some(tx);
        }
        rx
    }

    /// Set a signal value
    ///
    /// A change notification is emitted only when the stored value actually
    /// changed, so repeated writes of the same value do not generate event
    /// storms.
    pub fn set(&self, name: impl AsRef<str>, value: Value) -> Result<()> {
        let name = name.as_ref();
        trace!("Setting signal {} = {:?}", name, value);
        let previous = self.signals.insert(name.to_string(), value.clone());
        if previous.as_ref() != Some(&value) {
            self.notify(name, value);
        }
        Ok(())
    }

    fn notify(&self, name: &str, value: Value) {
        if let Ok(listener) = self.listener.read() {
            if let Some(tx) = listener.as_ref() {
                // Receiver may be gone during shutdown; that is not an error.
                let _ = tx.send((name.to_string(), value));
            }
        }
    }

    /// Get a signal value
    ///
    /// Returns `None` if the signal doesn't exist.
    pub fn get(&self, name: impl AsRef<str>) -> Option<Value> {
        let name = name.as_ref();
        self.signals.get(name).map(|entry| entry.value().clone())
    }

    /// Get a boolean signal value
    ///
    /// Performs type conversion where appropriate.
    pub fn get_bool(&self, name: &str) -> Result<bool> {
        match self.get(name) {
            Some(v) => v.as_bool().ok_or_else(|| AlarmError::TypeMismatch {
                expected: "bool".to_string(),
                actual: v.type_name().to_string(),
            }),
            None => Err(AlarmError::SignalNotFound(name.to_string())),
        }
    }

    /// Get an integer signal value
    ///
    /// Performs type conversion where appropriate.
    pub fn get_int(&self, name: &str) -> Result<i64> {
        match self.get(name) {
            Some(v) => v.as_int().ok_or_else(|| AlarmError::TypeMismatch {
                expected: "int".to_string(),
                actual: v.type_name().to_string(),
            }),
            None => Err(AlarmError::SignalNotFound(name.to_string())),
        }
    }

    /// Get a string signal value
    pub fn get_string(&self, name: &str) -> Result<String> {
        match self.get(name) {
            Some(v) => Ok(v.as_string()),
            None => Err(AlarmError::SignalNotFound(name.to_string())),
        }
    }

    /// Check if a signal exists
    pub fn exists(&self, name: &str) -> bool {
        self.signals.contains_key(name)
    }

    /// Remove a signal from the bus
    pub fn remove(&self, name: &str) -> Option<Value> {
        self.signals.remove(name).map(|(_, v)| v)
    }

    /// Get the number of signals
    pub fn len(&self) -> usize {
        self.signals.len()
    }

    /// Check if the bus is empty
    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    /// Get all signal names
    pub fn signal_names(&self) -> Vec<String> {
        self.signals.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Create a snapshot of all signals
    pub fn snapshot(&self) -> std::collections::HashMap<String, Value> {
        self.signals
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }
}

impl Default for SignalBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_bus_basic() {
        let bus = SignalBus::new();

        // Test set and get
        bus.set("test", Value::Int(42)).unwrap();
        assert_eq!(bus.get("test"), Some(Value::Int(42)));

        // Test get_int
        assert_eq!(bus.get_int("test").unwrap(), 42);

        // Test exists
        assert!(bus.exists("test"));
        assert!(!bus.exists("nonexistent"));

        // Test remove
        assert_eq!(bus.remove("test"), Some(Value::Int(42)));
        assert!(!bus.exists("test"));
    }

    #[test]
    fn test_signal_bus_type_conversion() {
        let bus = SignalBus::new();

        // Int to float semantics via as_int/as_bool conversions
        bus.set("int_val", Value::Int(10)).unwrap();
        assert_eq!(bus.get_int("int_val").unwrap(), 10);

        // Bool to int
        bus.set("bool_val", Value::Bool(true)).unwrap();
        assert_eq!(bus.get_int("bool_val").unwrap(), 1);

        // Int to bool
        bus.set("flag", Value::Int(0)).unwrap();
        assert_eq!(bus.get_bool("flag").unwrap(), false);
    }

    #[test]
    fn test_signal_bus_errors() {
        let bus = SignalBus::new();

        // Signal not found
        assert!(matches!(
            bus.get_int("nonexistent"),
            Err(AlarmError::SignalNotFound(_))
        ));

        // Unparseable string is a type mismatch
        bus.set("oddball", Value::String("not a number".to_string()))
            .unwrap();
        assert!(matches!(
            bus.get_int("oddball"),
            Err(AlarmError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_change_notification_only_on_change() {
        let bus = SignalBus::new();
        let mut rx = bus.subscribe_changes();

        bus.set("door", Value::Bool(false)).unwrap();
        bus.set("door", Value::Bool(false)).unwrap(); // no change, no event
        bus.set("door", Value::Bool(true)).unwrap();

        let (name, value) = rx.try_recv().unwrap();
        assert_eq!(name, "door");
        assert_eq!(value, Value::Bool(false));

        let (name, value) = rx.try_recv().unwrap();
        assert_eq!(name, "door");
        assert_eq!(value, Value::Bool(true));

        assert!(rx.try_recv().is_err());
    }
}
