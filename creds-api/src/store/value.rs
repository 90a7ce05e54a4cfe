//! Document values as the storage collaborator holds them, and their JSON
//! rendering.

use serde_json::{Map, Number, Value};
use std::collections::HashMap;

/// A single attribute value. Numbers keep the decimal text the store uses,
/// so no precision is lost until the value is rendered as JSON.
#[derive(Clone, Debug, PartialEq)]
pub enum AttrValue {
    S(String),
    N(String),
    Bool(bool),
    Null,
    M(HashMap<String, AttrValue>),
    L(Vec<AttrValue>),
}

impl AttrValue {
    pub fn empty_map() -> Self {
        AttrValue::M(HashMap::new())
    }

    pub fn as_s(&self) -> Option<&str> {
        match self {
            AttrValue::S(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_m(&self) -> Option<&HashMap<String, AttrValue>> {
        match self {
            AttrValue::M(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_m_mut(&mut self) -> Option<&mut HashMap<String, AttrValue>> {
        match self {
            AttrValue::M(m) => Some(m),
            _ => None,
        }
    }

    /// Parses an `N` value as a whole number of seconds, e.g. a timestamp.
    pub fn as_epoch(&self) -> Option<u64> {
        match self {
            AttrValue::N(n) => n.trim().parse().ok(),
            _ => None,
        }
    }

    /// Renders the value as JSON. Whole numbers become integers and anything
    /// with a fractional part becomes a float.
    pub fn to_json(&self) -> Value {
        match self {
            AttrValue::S(s) => Value::String(s.clone()),
            AttrValue::N(n) => number_to_json(n),
            AttrValue::Bool(b) => Value::Bool(*b),
            AttrValue::Null => Value::Null,
            AttrValue::M(m) => Value::Object(
                m.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect::<Map<String, Value>>(),
            ),
            AttrValue::L(l) => Value::Array(l.iter().map(AttrValue::to_json).collect()),
        }
    }
}

impl From<u64> for AttrValue {
    fn from(n: u64) -> Self {
        AttrValue::N(n.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        AttrValue::S(s)
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        AttrValue::S(s.to_string())
    }
}

impl From<HashMap<String, AttrValue>> for AttrValue {
    fn from(m: HashMap<String, AttrValue>) -> Self {
        AttrValue::M(m)
    }
}

/// Converts a decimal string to a JSON number. Unparseable or non-finite
/// input renders as null.
pub fn number_to_json(text: &str) -> Value {
    let text = text.trim();

    if let Ok(i) = text.parse::<i64>() {
        return Value::from(i);
    }
    if let Ok(u) = text.parse::<u64>() {
        return Value::from(u);
    }

    match text.parse::<f64>() {
        Ok(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
            Value::from(f as i64)
        }
        // u64::MAX as f64 rounds up to 2^64, so the bound is exclusive
        Ok(f) if f.fract() == 0.0 && f >= 0.0 && f < u64::MAX as f64 => Value::from(f as u64),
        Ok(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        Err(_) => Value::Null,
    }
}
