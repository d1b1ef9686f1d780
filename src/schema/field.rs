use regex::escape;
use serde_json::Value;

use super::SchemaError;
use crate::router::ParamRule;

const TRUTHY: &[&str] = &["y", "yes", "on", "true", "t", "1"];
const FALSY: &[&str] = &["n", "no", "off", "false", "f", "0"];

const EMAIL: &str = r"[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*";
const IPV4: &str = r"((25[0-5]|(2[0-4]|1[0-9]|[1-9]|)[0-9])\.){3}(25[0-5]|(2[0-4]|1[0-9]|[1-9]|)[0-9])";
const IPV6: &str = concat!(
    r"(([0-9a-fA-F]{1,4}:){7}[0-9a-fA-F]{1,4}",
    r"|([0-9a-fA-F]{1,4}:){1,7}:",
    r"|([0-9a-fA-F]{1,4}:){1,6}:[0-9a-fA-F]{1,4}",
    r"|([0-9a-fA-F]{1,4}:){1,5}(:[0-9a-fA-F]{1,4}){1,2}",
    r"|([0-9a-fA-F]{1,4}:){1,4}(:[0-9a-fA-F]{1,4}){1,3}",
    r"|([0-9a-fA-F]{1,4}:){1,3}(:[0-9a-fA-F]{1,4}){1,4}",
    r"|([0-9a-fA-F]{1,4}:){1,2}(:[0-9a-fA-F]{1,4}){1,5}",
    r"|[0-9a-fA-F]{1,4}:(:[0-9a-fA-F]{1,4}){1,6}",
    r"|:((:[0-9a-fA-F]{1,4}){1,7}|:)",
    r"|fe80:(:[0-9a-fA-F]{0,4}){0,4}%[0-9a-zA-Z]+",
    r"|::(ffff(:0{1,4})?:)?((25[0-5]|(2[0-4]|1?[0-9])?[0-9])\.){3}(25[0-5]|(2[0-4]|1?[0-9])?[0-9])",
    r"|([0-9a-fA-F]{1,4}:){1,4}:((25[0-5]|(2[0-4]|1?[0-9])?[0-9])\.){3}(25[0-5]|(2[0-4]|1?[0-9])?[0-9]))",
);

/// What a field accepts and the native value it produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    /// Non-whitespace characters. Native string.
    String,
    /// Free text without control characters other than whitespace. Native string.
    Text,
    /// Optionally signed digits. Native integer.
    Int,
    /// Decimal number with optional sign and fraction. Native float.
    Float,
    /// `yes`/`no`, `on`/`off`, `true`/`false`, `t`/`f`, `y`/`n`, `1`/`0`, any case.
    Bool,
    /// One of a fixed set of values. Native string.
    OneOf(Vec<String>),
    /// Exactly this value. Native string.
    Constant(String),
    Email,
    Ipv4,
    Ipv6,
}

impl FieldKind {
    /// Whether length bounds apply to this kind.
    fn sized(&self) -> bool {
        matches!(self, FieldKind::String | FieldKind::Text | FieldKind::Int)
    }
}

/// A named, typed request argument.
///
/// ```rust
/// use routeweave::schema::Field;
///
/// let code = Field::string("code").prefix("ID-").length(Some(2), Some(4)).required();
/// assert_eq!(code.expression(), r"^ID\-([^\s]{2,4})$");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    name: String,
    kind: FieldKind,
    required: bool,
    default: Option<String>,
    prefix: String,
    min: Option<usize>,
    max: Option<usize>,
}

impl Field {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
            default: None,
            prefix: String::new(),
            min: None,
            max: None,
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::String)
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Text)
    }

    pub fn int(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Int)
    }

    pub fn float(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Float)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Bool)
    }

    pub fn one_of<I, S>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(name, FieldKind::OneOf(values.into_iter().map(Into::into).collect()))
    }

    pub fn constant(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Constant(value.into()))
    }

    pub fn email(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Email)
    }

    pub fn ipv4(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Ipv4)
    }

    pub fn ipv6(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Ipv6)
    }

    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Raw value used by [`super::populate_from_request`] when the argument is absent.
    #[must_use]
    pub fn default(mut self, value: impl Into<String>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Literal text the value must start with. Ignored by email and IP fields.
    #[must_use]
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Bounds on the number of characters after the prefix. A missing
    /// minimum is 0, a missing maximum is unbounded. Only string, text and
    /// int fields are sized.
    #[must_use]
    pub fn length(mut self, min: Option<usize>, max: Option<usize>) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    #[must_use]
    pub fn is_required(&self) -> bool {
        self.required
    }

    #[must_use]
    pub fn default_value(&self) -> Option<&str> {
        self.default.as_deref()
    }

    /// Anchored expression a raw value must match.
    #[must_use]
    pub fn expression(&self) -> String {
        let prefix = match self.kind {
            FieldKind::Email | FieldKind::Ipv4 | FieldKind::Ipv6 => String::new(),
            _ => escape(&self.prefix),
        };
        let body = match &self.kind {
            FieldKind::String => format!(r"[^\s]{}", self.repeat("+")),
            FieldKind::Text => format!(r"[^\x00-\x08\x0B\x0C\x0E-\x1F\x7F]{}", self.repeat("+")),
            FieldKind::Int => format!("[+-]?[0-9]{}", self.repeat("+")),
            FieldKind::Float => r"[+-]?([0-9]+(\.[0-9]*)?|\.[0-9]+)".to_string(),
            FieldKind::Bool => format!("(?i:{})", TRUTHY.iter().chain(FALSY).copied().collect::<Vec<_>>().join("|")),
            FieldKind::OneOf(values) => values.iter().map(|v| escape(v)).collect::<Vec<_>>().join("|"),
            FieldKind::Constant(value) => escape(value),
            FieldKind::Email => EMAIL.to_string(),
            FieldKind::Ipv4 => IPV4.to_string(),
            FieldKind::Ipv6 => IPV6.to_string(),
        };
        format!("^{prefix}({body})$")
    }

    fn repeat(&self, unbounded: &str) -> String {
        if !self.kind.sized() {
            return unbounded.to_string();
        }
        match (self.min, self.max) {
            (None, None) => unbounded.to_string(),
            (min, Some(max)) => format!("{{{},{max}}}", min.unwrap_or(0)),
            (Some(min), None) => format!("{{{min},}}"),
        }
    }

    pub(crate) fn rule(&self) -> Result<ParamRule, SchemaError> {
        ParamRule::new(&self.name, self.expression()).map_err(|e| SchemaError::Expression {
            field: self.name.clone(),
            reason: e.to_string(),
        })
    }

    /// Convert a raw value into its native JSON form.
    ///
    /// The value is not checked against [`Field::expression`] first.
    pub fn convert(&self, raw: &str) -> Result<Value, SchemaError> {
        let failed = |reason: String| SchemaError::Conversion {
            field: self.name.clone(),
            value: raw.to_string(),
            reason,
        };
        let bare = raw.strip_prefix(self.prefix.as_str()).unwrap_or(raw);
        match &self.kind {
            FieldKind::Int => bare
                .parse::<i64>()
                .map(Value::from)
                .map_err(|e| failed(e.to_string())),
            FieldKind::Float => {
                let f = bare.parse::<f64>().map_err(|e| failed(e.to_string()))?;
                serde_json::Number::from_f64(f)
                    .map(Value::Number)
                    .ok_or_else(|| failed("not a finite number".into()))
            }
            FieldKind::Bool => Ok(Value::Bool(TRUTHY.iter().any(|t| t.eq_ignore_ascii_case(bare)))),
            _ => Ok(Value::String(raw.to_string())),
        }
    }
}
