//! Value type definitions for Tessera.
//!
//! This module defines the `Value` enum which represents any scalar that can be
//! stored in a row cell, and `ValueKind`, its type tag.

use crate::error::{Error, Result};
use core::cmp::Ordering;
use core::fmt;
use core::hash::{Hash, Hasher};
use serde::{Deserialize, Serialize};

/// The type tag of a `Value`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    /// 64-bit signed integer
    Int,
    /// 64-bit floating point
    Float,
    /// UTF-8 text
    Text,
    /// Boolean
    Bool,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Int => "int",
            ValueKind::Float => "float",
            ValueKind::Text => "text",
            ValueKind::Bool => "bool",
        };
        f.write_str(name)
    }
}

/// A value that can be stored in a row cell.
///
/// Equality is same-variant only: `Int(1)` and `Float(1.0)` are different
/// values. Ordering is likewise restricted to same-variant pairs, see
/// [`Value::compare`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Value {
    /// 64-bit signed integer
    Int(i64),
    /// 64-bit floating point
    Float(f64),
    /// UTF-8 text
    Text(String),
    /// Boolean
    Bool(bool),
}

impl Value {
    /// Returns the type tag of this value.
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Int(_) => ValueKind::Int,
            Value::Float(_) => ValueKind::Float,
            Value::Text(_) => ValueKind::Text,
            Value::Bool(_) => ValueKind::Bool,
        }
    }

    /// Returns the i64 value if this is an Int, None otherwise.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the f64 value if this is a Float, None otherwise.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns a reference to the text if this is Text, None otherwise.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(v) => Some(v.as_str()),
            _ => None,
        }
    }

    /// Returns the boolean value if this is a Bool, None otherwise.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Compares two values of the same variant.
    ///
    /// Returns `None` when the variants differ. Floats are totally ordered
    /// with NaN greater than every other float.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Float(a), Value::Float(b)) => Some(match (a.is_nan(), b.is_nan()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                (false, false) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
            }),
            (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Parses persisted text back into a value of the given kind.
    pub fn parse_as(kind: ValueKind, text: &str) -> Result<Value> {
        let invalid = || Error::invalid_value(kind, text);
        match kind {
            ValueKind::Text => Ok(Value::Text(text.to_string())),
            ValueKind::Int => text.trim().parse().map(Value::Int).map_err(|_| invalid()),
            ValueKind::Float => text.trim().parse().map(Value::Float).map_err(|_| invalid()),
            ValueKind::Bool => match text.trim() {
                t if t.eq_ignore_ascii_case("true") => Ok(Value::Bool(true)),
                t if t.eq_ignore_ascii_case("false") => Ok(Value::Bool(false)),
                _ => Err(invalid()),
            },
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => {
                // Handle NaN comparison
                if a.is_nan() && b.is_nan() {
                    true
                } else {
                    a == b
                }
            }
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        core::mem::discriminant(self).hash(state);
        match self {
            Value::Int(i) => i.hash(state),
            Value::Float(f) => {
                // 0.0 == -0.0 and NaN == NaN must hash alike
                let bits = if *f == 0.0 {
                    0u64
                } else if f.is_nan() {
                    f64::NAN.to_bits()
                } else {
                    f.to_bits()
                };
                bits.hash(state)
            }
            Value::Text(s) => s.hash(state),
            Value::Bool(b) => b.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Text(v) => f.write_str(v),
            Value::Bool(v) => write!(f, "{}", v),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of(v: &Value) -> u64 {
        let mut h = DefaultHasher::new();
        v.hash(&mut h);
        h.finish()
    }

    #[test]
    fn test_value_kind() {
        assert_eq!(Value::Int(42).kind(), ValueKind::Int);
        assert_eq!(Value::from("x").kind(), ValueKind::Text);
        assert_eq!(Value::from(true).kind(), ValueKind::Bool);
        assert_eq!(Value::from(1.5).kind(), ValueKind::Float);
    }

    #[test]
    fn test_value_accessors() {
        assert_eq!(Value::Int(100).as_int(), Some(100));
        assert_eq!(Value::Float(3.5).as_float(), Some(3.5));
        assert_eq!(Value::Text("hello".into()).as_str(), Some("hello"));
        assert_eq!(Value::Bool(true).as_bool(), Some(true));
        assert_eq!(Value::Bool(true).as_int(), None);
    }

    #[test]
    fn test_value_equality_is_same_variant() {
        assert_eq!(Value::Int(42), Value::Int(42));
        assert_ne!(Value::Int(1), Value::Float(1.0));
        assert_ne!(Value::Text("1".into()), Value::Int(1));
        assert_eq!(Value::Float(f64::NAN), Value::Float(f64::NAN));
        assert_eq!(Value::Float(0.0), Value::Float(-0.0));
    }

    #[test]
    fn test_hash_consistent_with_eq() {
        assert_eq!(hash_of(&Value::Float(0.0)), hash_of(&Value::Float(-0.0)));
        assert_eq!(hash_of(&Value::Float(f64::NAN)), hash_of(&Value::Float(-f64::NAN)));
        assert_eq!(hash_of(&Value::from("a")), hash_of(&Value::from("a")));
    }

    #[test]
    fn test_compare_same_variant() {
        assert_eq!(Value::Int(1).compare(&Value::Int(2)), Some(Ordering::Less));
        assert_eq!(
            Value::from("b").compare(&Value::from("a")),
            Some(Ordering::Greater)
        );
        assert_eq!(Value::Bool(false).compare(&Value::Bool(true)), Some(Ordering::Less));
        assert_eq!(
            Value::Float(f64::NAN).compare(&Value::Float(1.0)),
            Some(Ordering::Greater)
        );
    }

    #[test]
    fn test_compare_cross_variant_is_unordered() {
        assert_eq!(Value::Int(1).compare(&Value::Float(2.0)), None);
        assert_eq!(Value::from("30").compare(&Value::Int(30)), None);
    }

    #[test]
    fn test_parse_as() {
        assert_eq!(Value::parse_as(ValueKind::Int, "30").unwrap(), Value::Int(30));
        assert_eq!(Value::parse_as(ValueKind::Float, "2.5").unwrap(), Value::Float(2.5));
        assert_eq!(Value::parse_as(ValueKind::Bool, "TRUE").unwrap(), Value::Bool(true));
        assert_eq!(
            Value::parse_as(ValueKind::Text, " x ").unwrap(),
            Value::Text(" x ".into())
        );
        assert!(matches!(
            Value::parse_as(ValueKind::Int, "thirty"),
            Err(Error::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        for v in [Value::Int(-7), Value::Float(0.1), Value::Bool(false)] {
            let text = v.to_string();
            assert_eq!(Value::parse_as(v.kind(), &text).unwrap(), v);
        }
    }
}
