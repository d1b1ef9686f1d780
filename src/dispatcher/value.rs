use serde::Serialize;
use serde_json::Value;

use crate::error::DispatchError;

/// Anything a handler or callback may hand back.
///
/// Only a two-element [`ReturnValue::Tuple`] means `(status, payload)`.
/// Tuples of any other length are encoded as a JSON array with status 200.
#[derive(Debug, Clone, PartialEq)]
pub enum ReturnValue {
    Bytes(Vec<u8>),
    Text(String),
    Json(Value),
    Tuple(Vec<ReturnValue>),
}

impl ReturnValue {
    /// Serialize `value` into a structured payload.
    pub fn json<T: Serialize>(value: &T) -> Result<Self, DispatchError> {
        serde_json::to_value(value)
            .map(ReturnValue::Json)
            .map_err(|e| DispatchError::unparsable("structured", e.to_string()))
    }

    /// `(status, payload)`.
    pub fn with_status(status: u16, payload: impl Into<ReturnValue>) -> Self {
        ReturnValue::Tuple(vec![ReturnValue::Json(Value::from(status)), payload.into()])
    }

    /// Kind name used in normalization errors.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            ReturnValue::Bytes(_) => "bytes",
            ReturnValue::Text(_) => "text",
            ReturnValue::Tuple(_) => "tuple",
            ReturnValue::Json(Value::Null) => "null",
            ReturnValue::Json(Value::Bool(_)) => "bool",
            ReturnValue::Json(Value::Number(_)) => "number",
            ReturnValue::Json(Value::String(_)) => "json string",
            ReturnValue::Json(Value::Array(_)) => "array",
            ReturnValue::Json(Value::Object(_)) => "object",
        }
    }

    /// Turn this value into `(status, bytes)` plus the payload kind.
    pub fn normalize(&self) -> Result<Normalized, DispatchError> {
        let (status, payload) = match self {
            ReturnValue::Tuple(items) if items.len() == 2 => (coerce_status(&items[0])?, &items[1]),
            other => (200, other),
        };
        let (body, kind) = encode(payload)?;
        Ok(Normalized { status, body, kind })
    }
}

/// How a normalized body was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyKind {
    Bytes,
    Text,
    Structured,
}

impl BodyKind {
    #[must_use]
    pub fn content_type(&self) -> &'static str {
        match self {
            BodyKind::Bytes => "application/octet-stream",
            BodyKind::Text => "text/plain; charset=utf-8",
            BodyKind::Structured => "application/json",
        }
    }
}

/// `(status, bytes)` ready for the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized {
    pub status: u16,
    pub body: Vec<u8>,
    pub kind: BodyKind,
}

/// Integer-like values in `100..=999`. Anything else is unparsable.
fn coerce_status(value: &ReturnValue) -> Result<u16, DispatchError> {
    let not_integer = || DispatchError::unparsable(value.type_name(), "status is not coercible to an integer");
    let code: i64 = match value {
        ReturnValue::Json(Value::Number(n)) => match n.as_i64() {
            Some(i) => i,
            // 404.0 -> 404, truncating like an integer cast
            None => n.as_f64().filter(|f| f.is_finite()).ok_or_else(not_integer)?.trunc() as i64,
        },
        ReturnValue::Json(Value::String(s)) | ReturnValue::Text(s) => s.trim().parse().map_err(|_| not_integer())?,
        ReturnValue::Bytes(b) => std::str::from_utf8(b)
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .ok_or_else(not_integer)?,
        _ => return Err(not_integer()),
    };
    u16::try_from(code)
        .ok()
        .and_then(|c| http::StatusCode::from_u16(c).ok())
        .map(|s| s.as_u16())
        .ok_or_else(|| DispatchError::unparsable(value.type_name(), format!("status {code} is out of range")))
}

fn encode(payload: &ReturnValue) -> Result<(Vec<u8>, BodyKind), DispatchError> {
    match payload {
        ReturnValue::Bytes(b) => Ok((b.clone(), BodyKind::Bytes)),
        ReturnValue::Text(s) => Ok((s.clone().into_bytes(), BodyKind::Text)),
        ReturnValue::Json(Value::Null) => Err(DispatchError::unparsable("null", "payload is empty")),
        other => {
            let value = to_json(other)?;
            serde_json::to_vec(&value)
                .map(|body| (body, BodyKind::Structured))
                .map_err(|e| DispatchError::unparsable(other.type_name(), e.to_string()))
        }
    }
}

fn to_json(value: &ReturnValue) -> Result<Value, DispatchError> {
    match value {
        ReturnValue::Json(v) => Ok(v.clone()),
        ReturnValue::Text(s) => Ok(Value::String(s.clone())),
        ReturnValue::Tuple(items) => items.iter().map(to_json).collect::<Result<Vec<_>, _>>().map(Value::Array),
        ReturnValue::Bytes(_) => Err(DispatchError::unparsable("bytes", "raw bytes can't be nested in a structured payload")),
    }
}

impl From<&str> for ReturnValue {
    fn from(v: &str) -> Self {
        ReturnValue::Text(v.to_string())
    }
}

impl From<String> for ReturnValue {
    fn from(v: String) -> Self {
        ReturnValue::Text(v)
    }
}

impl From<Vec<u8>> for ReturnValue {
    fn from(v: Vec<u8>) -> Self {
        ReturnValue::Bytes(v)
    }
}

impl From<&[u8]> for ReturnValue {
    fn from(v: &[u8]) -> Self {
        ReturnValue::Bytes(v.to_vec())
    }
}

impl From<Value> for ReturnValue {
    fn from(v: Value) -> Self {
        ReturnValue::Json(v)
    }
}

impl<T: Into<ReturnValue>> From<(u16, T)> for ReturnValue {
    fn from((status, payload): (u16, T)) -> Self {
        ReturnValue::with_status(status, payload)
    }
}
