//! Native values and submitted form data
//!
//! Three representations meet here:
//! - `SubmittedData`: the flat key -> string map a form post produces
//! - `NativeValue`: the typed in-memory value blocks work with
//! - `serde_json::Value`: the storage form (plain scalars, maps and sequences)

use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

use super::struct_value::StructValue;

/// In-memory value of a block
#[derive(Debug, Clone, PartialEq)]
pub enum NativeValue {
    /// No value
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<NativeValue>),
    /// Value of a struct block
    Struct(StructValue),
}

impl NativeValue {
    pub fn is_null(&self) -> bool {
        matches!(self, NativeValue::Null)
    }

    /// Empty in the form-field sense: null, empty text or empty list
    pub fn is_empty(&self) -> bool {
        match self {
            NativeValue::Null => true,
            NativeValue::Text(s) => s.is_empty(),
            NativeValue::List(items) => items.is_empty(),
            _ => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            NativeValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            NativeValue::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Integers widen to floats
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            NativeValue::Float(n) => Some(*n),
            NativeValue::Int(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            NativeValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&StructValue> {
        match self {
            NativeValue::Struct(v) => Some(v),
            _ => None,
        }
    }

    /// Untyped conversion from storage form.
    ///
    /// Objects have no owning block at this level and become `Null`; struct
    /// blocks do their own conversion.
    pub fn from_storage(value: &Value) -> Self {
        match value {
            Value::Null => NativeValue::Null,
            Value::Bool(b) => NativeValue::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => NativeValue::Int(i),
                None => n.as_f64().map_or(NativeValue::Null, NativeValue::Float),
            },
            Value::String(s) => NativeValue::Text(s.clone()),
            Value::Array(items) => NativeValue::List(items.iter().map(Self::from_storage).collect()),
            Value::Object(_) => NativeValue::Null,
        }
    }

    /// Untyped conversion to storage form
    pub fn to_storage(&self) -> Value {
        match self {
            NativeValue::Null => Value::Null,
            NativeValue::Bool(b) => Value::Bool(*b),
            NativeValue::Int(n) => Value::from(*n),
            NativeValue::Float(n) => serde_json::Number::from_f64(*n).map_or(Value::Null, Value::Number),
            NativeValue::Text(s) => Value::String(s.clone()),
            NativeValue::List(items) => Value::Array(items.iter().map(Self::to_storage).collect()),
            NativeValue::Struct(v) => v.to_storage(),
        }
    }
}

impl Default for NativeValue {
    fn default() -> Self {
        NativeValue::Null
    }
}

impl fmt::Display for NativeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NativeValue::Null => Ok(()),
            NativeValue::Bool(b) => write!(f, "{}", b),
            NativeValue::Int(n) => write!(f, "{}", n),
            NativeValue::Float(n) => write!(f, "{}", n),
            NativeValue::Text(s) => write!(f, "{}", s),
            NativeValue::List(items) => {
                let parts: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            NativeValue::Struct(v) => write!(f, "{}", v),
        }
    }
}

impl From<&str> for NativeValue {
    fn from(s: &str) -> Self {
        NativeValue::Text(s.to_string())
    }
}

impl From<String> for NativeValue {
    fn from(s: String) -> Self {
        NativeValue::Text(s)
    }
}

impl From<i64> for NativeValue {
    fn from(n: i64) -> Self {
        NativeValue::Int(n)
    }
}

impl From<f64> for NativeValue {
    fn from(n: f64) -> Self {
        NativeValue::Float(n)
    }
}

impl From<bool> for NativeValue {
    fn from(b: bool) -> Self {
        NativeValue::Bool(b)
    }
}

impl From<StructValue> for NativeValue {
    fn from(v: StructValue) -> Self {
        NativeValue::Struct(v)
    }
}

/// Flat submitted form data, keyed by prefixed field name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmittedData {
    fields: BTreeMap<String, String>,
}

impl SubmittedData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for SubmittedData {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}
