use std::fmt;
use std::sync::Arc;

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use smallvec::SmallVec;

/// Maximum number of path captures before heap allocation.
/// Most routes have <= 4 captures (e.g., /users/<id:int>/posts/<post>).
pub const MAX_INLINE_PARAMS: usize = 8;

/// Native value of a path capture.
#[derive(Debug, Clone, PartialEq)]
pub enum PathValue {
    Int(i64),
    Float(f64),
    Str(String),
}

impl PathValue {
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            PathValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            PathValue::Float(v) => Some(*v),
            PathValue::Int(v) => Some(*v as f64),
            PathValue::Str(_) => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PathValue::Str(s) => Some(s),
            _ => None,
        }
    }

    fn to_json(&self) -> Value {
        match self {
            PathValue::Int(v) => Value::from(*v),
            PathValue::Float(v) => Value::from(*v),
            PathValue::Str(s) => Value::from(s.as_str()),
        }
    }
}

/// Canonical string form, used when building paths in reverse.
///
/// Floats always carry a fractional part so `10.0` stays `10.0`.
impl fmt::Display for PathValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathValue::Int(v) => write!(f, "{v}"),
            PathValue::Float(v) if v.is_finite() && v.fract() == 0.0 => write!(f, "{v:.1}"),
            PathValue::Float(v) => write!(f, "{v}"),
            PathValue::Str(s) => f.write_str(s),
        }
    }
}

impl Serialize for PathValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl From<i64> for PathValue {
    fn from(v: i64) -> Self {
        PathValue::Int(v)
    }
}

impl From<i32> for PathValue {
    fn from(v: i32) -> Self {
        PathValue::Int(i64::from(v))
    }
}

impl From<u32> for PathValue {
    fn from(v: u32) -> Self {
        PathValue::Int(i64::from(v))
    }
}

impl From<f64> for PathValue {
    fn from(v: f64) -> Self {
        PathValue::Float(v)
    }
}

impl From<&str> for PathValue {
    fn from(v: &str) -> Self {
        PathValue::Str(v.to_string())
    }
}

impl From<String> for PathValue {
    fn from(v: String) -> Self {
        PathValue::Str(v)
    }
}

/// Captures extracted from a concrete path, already converted to native values.
///
/// Names are `Arc<str>` shared with the compiled pattern, so building this
/// per request only copies the values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathParams(SmallVec<[(Arc<str>, PathValue); MAX_INLINE_PARAMS]>);

impl PathParams {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, name: Arc<str>, value: PathValue) {
        self.0.push((name, value));
    }

    /// Get a capture by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&PathValue> {
        self.0
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v)
    }

    #[must_use]
    pub fn get_int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(PathValue::as_int)
    }

    #[must_use]
    pub fn get_float(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(PathValue::as_float)
    }

    #[must_use]
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(PathValue::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PathValue)> {
        self.0.iter().map(|(k, v)| (k.as_ref(), v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Captures as a JSON object, handy for echo handlers and logging.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let map: Map<String, Value> = self
            .0
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_json()))
            .collect();
        Value::Object(map)
    }
}

/// Values supplied to a reverse lookup, keyed by capture name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathArgs(SmallVec<[(String, PathValue); MAX_INLINE_PARAMS]>);

impl PathArgs {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a value.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<PathValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<PathValue>) {
        let name = name.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.0.push((name, value)),
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&PathValue> {
        self.0.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }
}

impl<K, V> FromIterator<(K, V)> for PathArgs
where
    K: Into<String>,
    V: Into<PathValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut args = PathArgs::new();
        for (k, v) in iter {
            args.insert(k, v);
        }
        args
    }
}

impl<K, V, const N: usize> From<[(K, V); N]> for PathArgs
where
    K: Into<String>,
    V: Into<PathValue>,
{
    fn from(pairs: [(K, V); N]) -> Self {
        pairs.into_iter().collect()
    }
}

impl From<&PathParams> for PathArgs {
    fn from(params: &PathParams) -> Self {
        params.iter().map(|(k, v)| (k, v.clone())).collect()
    }
}
