//! Log record model.
//!
//! A record is an ordered list of key/value fields. The logger's fixed
//! context fields come first, followed by the fields passed to a single call.
//! Records are borrowed views: sinks read them and never keep them.

use std::borrow::Cow;
use std::fmt;
use std::time::Duration;

use axum::http::{Method, StatusCode};
use serde::ser::{Serialize, Serializer};

/// A single key/value pair.
pub type Field = (&'static str, Value);

/// A field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(Cow<'static, str>),
    Int(i64),
    Uint(u64),
    Bool(bool),
    Duration(Duration),
}

impl Value {
    /// Borrow the string content, if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric content as `u64`, if this is a non-negative integer.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Uint(n) => Some(*n),
            Value::Int(n) => u64::try_from(*n).ok(),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => f.write_str(s),
            Value::Int(n) => write!(f, "{}", n),
            Value::Uint(n) => write!(f, "{}", n),
            Value::Bool(b) => write!(f, "{}", b),
            // Debug formatting gives the unit suffix, e.g. `1.52ms`
            Value::Duration(d) => write!(f, "{:?}", d),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Str(s) => serializer.serialize_str(s),
            Value::Int(n) => serializer.serialize_i64(*n),
            Value::Uint(n) => serializer.serialize_u64(*n),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Duration(d) => serializer.collect_str(&format_args!("{:?}", d)),
        }
    }
}

impl From<&'static str> for Value {
    fn from(s: &'static str) -> Self {
        Value::Str(Cow::Borrowed(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Cow::Owned(s))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(i64::from(n))
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::Uint(n)
    }
}

impl From<u16> for Value {
    fn from(n: u16) -> Self {
        Value::Uint(u64::from(n))
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Uint(n as u64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Duration> for Value {
    fn from(d: Duration) -> Self {
        Value::Duration(d)
    }
}

impl From<StatusCode> for Value {
    fn from(status: StatusCode) -> Self {
        Value::Uint(u64::from(status.as_u16()))
    }
}

impl From<&Method> for Value {
    fn from(method: &Method) -> Self {
        Value::Str(Cow::Owned(method.as_str().to_owned()))
    }
}

/// A borrowed view over the fields of one log call.
#[derive(Debug, Clone, Copy)]
pub struct LogRecord<'a> {
    context: &'a [Field],
    fields: &'a [Field],
}

impl<'a> LogRecord<'a> {
    pub fn new(context: &'a [Field], fields: &'a [Field]) -> Self {
        Self { context, fields }
    }

    /// Iterate context fields, then call fields.
    pub fn iter(&self) -> impl Iterator<Item = &'a Field> + 'a {
        self.context.iter().chain(self.fields.iter())
    }

    /// Look up a field. When a key repeats, the last occurrence wins.
    pub fn get(&self, key: &str) -> Option<&'a Value> {
        self.context
            .iter()
            .chain(self.fields.iter())
            .rev()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.context.len() + self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy the fields out of the record.
    pub fn to_vec(&self) -> Vec<Field> {
        self.iter().cloned().collect()
    }
}
