// src/value.rs - Value system for the signal bus
use serde::{Deserialize, Serialize};
use std::fmt;

/// Core value type enumeration for VESTA
///
/// This enum represents all data types that can flow through the signal
/// bus: boolean sensor states, integer mode/state codes, numeric readings
/// and sensor designations.
///
/// # Examples
///
/// ```rust
/// use vesta::Value;
///
/// let bool_val = Value::Bool(true);
/// let int_val = Value::Int(42);
///
/// // Type conversion
/// assert_eq!(int_val.as_float(), Some(42.0));
/// assert_eq!(bool_val.as_int(), Some(1));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Value {
    /// Boolean value
    Bool(bool),
    /// Integer value (64-bit)
    Int(i64),
    /// Floating-point value (64-bit)
    Float(f64),
    /// String value
    String(String),
}

impl Value {
    /// Convert to boolean if possible
    ///
    /// # Examples
    ///
    /// ```rust
    /// use vesta::Value;
    ///
    /// assert_eq!(Value::Bool(true).as_bool(), Some(true));
    /// assert_eq!(Value::Int(0).as_bool(), Some(false));
    /// assert_eq!(Value::Float(1.0).as_bool(), Some(true));
    /// ```
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Int(i) => Some(*i != 0),
            Value::Float(f) => Some(*f != 0.0 && !f.is_nan()),
            Value::String(s) => match s.to_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Some(true),
                "false" | "no" | "off" | "0" => Some(false),
                _ => None,
            },
        }
    }

    /// Convert to integer if possible
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Bool(b) => Some(if *b { 1 } else { 0 }),
            Value::Float(f) => {
                if f.is_finite() && *f >= i64::MIN as f64 && *f <= i64::MAX as f64 {
                    Some(*f as i64)
                } else {
                    None
                }
            }
            Value::String(s) => s.parse().ok(),
        }
    }

    /// Convert to float if possible
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::String(s) => s.parse().ok(),
        }
    }

    /// Convert to string representation
    pub fn as_string(&self) -> String {
        match self {
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::String(s) => s.clone(),
        }
    }

    /// Get the type name of this value
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_string())
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Int(0)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_conversions() {
        // Bool conversions
        assert_eq!(Value::Bool(true).as_bool(), Some(true));
        assert_eq!(Value::Bool(true).as_int(), Some(1));
        assert_eq!(Value::Bool(false).as_int(), Some(0));
        assert_eq!(Value::Bool(true).as_float(), Some(1.0));

        // Int conversions
        assert_eq!(Value::Int(42).as_int(), Some(42));
        assert_eq!(Value::Int(0).as_bool(), Some(false));
        assert_eq!(Value::Int(1).as_bool(), Some(true));
        assert_eq!(Value::Int(42).as_float(), Some(42.0));

        // Float conversions
        assert_eq!(Value::Float(3.14).as_float(), Some(3.14));
        assert_eq!(Value::Float(0.0).as_bool(), Some(false));
        assert_eq!(Value::Float(1.0).as_bool(), Some(true));
        assert_eq!(Value::Float(42.0).as_int(), Some(42));
    }

    #[test]
    fn test_string_conversions() {
        let str_val = Value::String("hello".to_string());
        assert_eq!(str_val.as_string(), "hello");
        assert_eq!(str_val.type_name(), "string");

        assert_eq!(Value::String("true".to_string()).as_bool(), Some(true));
        assert_eq!(Value::String("off".to_string()).as_bool(), Some(false));
        assert_eq!(Value::String("42".to_string()).as_int(), Some(42));
        assert_eq!(Value::String("3.14".to_string()).as_float(), Some(3.14));
        assert_eq!(Value::String("garbage".to_string()).as_bool(), None);
    }

    #[test]
    fn test_value_type_names() {
        assert_eq!(Value::Bool(true).type_name(), "bool");
        assert_eq!(Value::Int(42).type_name(), "int");
        assert_eq!(Value::Float(3.14).type_name(), "float");
    }
}
