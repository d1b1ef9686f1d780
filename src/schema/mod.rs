//! # Schema Module
//!
//! Typed declarations for request arguments.
//!
//! A [`Schema`] is an ordered set of [`Field`]s. It serves three purposes:
//!
//! 1. [`Schema::as_params`] turns the fields into the [`ParamRules`] a route
//!    carries, so both the host transport and
//!    [`DispatchContext::populate_get`] / [`DispatchContext::populate_post`]
//!    validate arguments the same way.
//! 2. [`Schema::validate`] checks a set of raw values and reports every
//!    failing field at once.
//! 3. [`Schema::load`], [`Schema::dump`] and [`populate_from_request`] convert
//!    raw values into native ones (integers, floats, booleans, strings).
//!
//! ## Example
//!
//! ```rust
//! use routeweave::schema::{Field, Schema};
//!
//! # fn main() -> Result<(), routeweave::schema::SchemaError> {
//! let schema = Schema::new()
//!     .field(Field::int("page").default("1"))?
//!     .field(Field::one_of("sort", ["asc", "desc"]).required())?;
//!
//! assert!(schema.validate([("sort", Some("asc"))]).is_ok());
//! let err = schema.validate([("page", Some("two"))]).unwrap_err();
//! assert_eq!(err.errors().map(|e| e.len()), Some(2));
//! # Ok(())
//! # }
//! ```

mod field;

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use crate::dispatcher::DispatchContext;
use crate::router::{ParamRule, ParamRules};

pub use field::{Field, FieldKind};

/// Errors raised while declaring a schema or checking data against it.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// One or more fields are missing or malformed (field name -> message).
    #[error("validation failed for {}", .0.keys().cloned().collect::<Vec<_>>().join(", "))]
    Invalid(BTreeMap<String, String>),

    /// A field's expression does not compile.
    #[error("field `{field}` has an invalid expression: {reason}")]
    Expression { field: String, reason: String },

    /// A field name was declared twice.
    #[error("field `{0}` is declared more than once")]
    DuplicateField(String),

    /// A raw value could not be turned into the field's native type.
    #[error("can't convert `{value}` for field `{field}`: {reason}")]
    Conversion { field: String, value: String, reason: String },

    /// Converted values could not be mapped to or from the target type.
    #[error("schema data mapping failed: {0}")]
    Mapping(#[from] serde_json::Error),
}

impl SchemaError {
    /// Per-field messages of a validation failure.
    #[must_use]
    pub fn errors(&self) -> Option<&BTreeMap<String, String>> {
        match self {
            SchemaError::Invalid(errors) => Some(errors),
            _ => None,
        }
    }
}

/// Ordered field declarations with their compiled rules.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    fields: Vec<(Field, ParamRule)>,
}

impl Schema {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field. Its expression is compiled here.
    pub fn field(mut self, field: Field) -> Result<Self, SchemaError> {
        if self.get(field.name()).is_some() {
            return Err(SchemaError::DuplicateField(field.name().to_string()));
        }
        let rule = field.rule()?;
        self.fields.push((field, rule));
        Ok(self)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.iter().map(|(f, _)| f).find(|f| f.name() == name)
    }

    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().map(|(f, _)| f)
    }

    /// Param rules for a route taking these arguments.
    #[must_use]
    pub fn as_params(&self) -> ParamRules {
        self.fields
            .iter()
            .fold(ParamRules::new(), |rules, (field, rule)| rules.with_rule(field.name(), rule.clone()))
    }

    /// Check raw values. `None` stands for a value that was sent empty.
    ///
    /// Unknown names are ignored. Required fields must be present with a
    /// value, and every present value must match its field's expression.
    pub fn validate<'a, I>(&self, data: I) -> Result<(), SchemaError>
    where
        I: IntoIterator<Item = (&'a str, Option<&'a str>)>,
    {
        let mut errors = BTreeMap::new();
        let mut present = Vec::new();
        for (name, value) in data {
            present.push(name);
            let Some((field, rule)) = self.fields.iter().find(|(f, _)| f.name() == name) else {
                continue;
            };
            match value {
                None if field.is_required() => {
                    errors.insert(name.to_string(), format!("field `{name}` is required"));
                }
                None => {}
                Some(value) if !rule.accepts(value) => {
                    errors.insert(name.to_string(), format!("invalid value for field `{name}`"));
                }
                Some(_) => {}
            }
        }
        for (field, _) in &self.fields {
            if field.is_required() && !present.iter().any(|p| *p == field.name()) {
                errors.insert(field.name().to_string(), format!("field `{}` is required", field.name()));
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            debug!(fields = ?errors.keys().collect::<Vec<_>>(), "Schema validation failed");
            Err(SchemaError::Invalid(errors))
        }
    }

    /// Validate raw values and convert the present ones.
    fn convert<'a, I>(&self, data: I) -> Result<Map<String, Value>, SchemaError>
    where
        I: IntoIterator<Item = (&'a str, Option<&'a str>)> + Clone,
    {
        self.validate(data.clone())?;
        let mut out = Map::new();
        for (name, value) in data {
            if let (Some(field), Some(value)) = (self.get(name), value) {
                out.insert(name.to_string(), field.convert(value)?);
            }
        }
        Ok(out)
    }

    /// Validate raw values and deserialize the converted ones into `T`.
    ///
    /// Absent optional fields are left to `T`'s own defaults.
    pub fn load<'a, T, I>(&self, data: I) -> Result<T, SchemaError>
    where
        T: DeserializeOwned,
        I: IntoIterator<Item = (&'a str, Option<&'a str>)> + Clone,
    {
        let converted = self.convert(data)?;
        Ok(serde_json::from_value(Value::Object(converted))?)
    }

    /// Serialize `value`, check its fields as raw text and return them converted.
    ///
    /// Fields `value` does not carry fall back to their defaults.
    pub fn dump<T: Serialize>(&self, value: &T) -> Result<Map<String, Value>, SchemaError> {
        let object = match serde_json::to_value(value)? {
            Value::Object(object) => object,
            other => {
                return Err(SchemaError::Conversion {
                    field: String::new(),
                    value: other.to_string(),
                    reason: "expected a structure with named fields".into(),
                })
            }
        };
        let raw: Vec<(String, Option<String>)> = self
            .fields()
            .map(|field| {
                let value = match object.get(field.name()) {
                    None | Some(Value::Null) => field.default_value().map(str::to_string),
                    Some(Value::String(s)) => Some(s.clone()),
                    Some(other) => Some(other.to_string()),
                };
                (field.name().to_string(), value)
            })
            .collect();
        self.convert(raw.iter().map(|(name, value)| (name.as_str(), value.as_deref())))
    }
}

/// Collect every schema field from the arguments kept on `ctx`.
///
/// Call [`DispatchContext::populate_get`] or
/// [`DispatchContext::populate_post`] first. Absent arguments take the
/// field's default, or `null` when there is none.
pub fn populate_from_request(ctx: &DispatchContext<'_>, schema: &Schema) -> Result<Map<String, Value>, SchemaError> {
    let mut out = Map::new();
    for field in schema.fields() {
        let value = match ctx.argument(field.name()).or(field.default_value()) {
            Some(raw) => field.convert(raw)?,
            None => Value::Null,
        };
        out.insert(field.name().to_string(), value);
    }
    Ok(out)
}
