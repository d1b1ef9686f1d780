use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;

use super::params::PathValue;
use crate::error::RouterError;

/// Reserved converter name that introduces an inline expression (`<name:re:EXPR>`).
pub const INLINE_CONVERTER: &str = "re";

/// Converter used when a capture declares no type (`<name>`).
pub const DEFAULT_CONVERTER: &str = "string";

type ParseFn = Arc<dyn Fn(&str) -> Option<PathValue> + Send + Sync>;

/// A (matching expression, string -> native value) pair bound to a capture's declared type.
#[derive(Clone)]
pub struct Converter {
    name: Arc<str>,
    expression: Arc<str>,
    parse: ParseFn,
}

impl Converter {
    /// Create a converter from a name, a regular expression fragment and a parser.
    ///
    /// The parser receives text that already matched `expression`; returning
    /// `None` makes the path a non-match.
    pub fn new<F>(name: &str, expression: &str, parse: F) -> Self
    where
        F: Fn(&str) -> Option<PathValue> + Send + Sync + 'static,
    {
        Self {
            name: Arc::from(name),
            expression: Arc::from(expression),
            parse: Arc::new(parse),
        }
    }

    /// Pass-through converter for an inline `re` expression.
    #[must_use]
    pub fn inline(expression: &str) -> Self {
        Self::new(INLINE_CONVERTER, expression, |s| Some(PathValue::Str(s.to_string())))
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Convert matched text into its native value.
    #[must_use]
    pub fn convert(&self, raw: &str) -> Option<PathValue> {
        (self.parse)(raw)
    }
}

impl fmt::Debug for Converter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Converter")
            .field("name", &self.name)
            .field("expression", &self.expression)
            .finish()
    }
}

/// Named set of converters available to path templates.
///
/// Insertion order is kept so error messages list converters the way they
/// were declared. `re` is always accepted and never stored.
#[derive(Debug, Clone)]
pub struct ConverterRegistry {
    converters: Vec<Converter>,
}

static BUILTIN: Lazy<ConverterRegistry> = Lazy::new(|| ConverterRegistry {
    converters: vec![
        Converter::new("int", "[0-9]+", |s| s.parse().ok().map(PathValue::Int)),
        Converter::new("float", r"[0-9]+\.[0-9]+", |s| {
            s.parse().ok().map(PathValue::Float)
        }),
        Converter::new(DEFAULT_CONVERTER, "[^/]+", |s| {
            Some(PathValue::Str(s.to_string()))
        }),
    ],
});

impl Default for ConverterRegistry {
    fn default() -> Self {
        BUILTIN.clone()
    }
}

impl ConverterRegistry {
    /// Registry holding `int`, `float` and `string`.
    #[must_use]
    pub fn builtin() -> Self {
        Self::default()
    }

    /// Add or replace a converter by name.
    ///
    /// `re` is reserved for inline expressions and cannot be replaced.
    pub fn register(&mut self, converter: Converter) -> Result<(), RouterError> {
        if converter.name() == INLINE_CONVERTER {
            return Err(RouterError::MalformedSegment {
                segment: converter.name().to_string(),
                reason: "`re` is reserved for inline expressions",
            });
        }
        self.converters.retain(|c| c.name() != converter.name());
        self.converters.push(converter);
        Ok(())
    }

    /// Builder form of [`ConverterRegistry::register`].
    pub fn with(mut self, converter: Converter) -> Result<Self, RouterError> {
        self.register(converter)?;
        Ok(self)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Converter> {
        self.converters.iter().find(|c| c.name() == name)
    }

    /// Look a converter up, failing with the accepted names when absent.
    pub fn lookup(&self, name: &str) -> Result<&Converter, RouterError> {
        self.get(name).ok_or_else(|| RouterError::UnknownConverter {
            converter: name.to_string(),
            allowed: self.allowed(),
        })
    }

    /// Comma separated accepted names, including `re`.
    #[must_use]
    pub fn allowed(&self) -> String {
        self.converters
            .iter()
            .map(Converter::name)
            .chain(std::iter::once(INLINE_CONVERTER))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_names() {
        let registry = ConverterRegistry::builtin();
        assert_eq!(registry.allowed(), "int, float, string, re");
    }

    #[test]
    fn test_int_converter_parses_native() {
        let registry = ConverterRegistry::builtin();
        let int = registry.get("int").unwrap();
        assert_eq!(int.convert("42"), Some(PathValue::Int(42)));
        // overflow is a non-match rather than a panic
        assert_eq!(int.convert("99999999999999999999999"), None);
    }

    #[test]
    fn test_custom_converter_replaces_by_name() {
        let registry = ConverterRegistry::builtin()
            .with(Converter::new("int", "-?[0-9]+", |s| s.parse().ok().map(PathValue::Int)))
            .unwrap();
        assert_eq!(registry.get("int").unwrap().expression(), "-?[0-9]+");
        assert_eq!(registry.allowed(), "float, string, int, re");
    }

    #[test]
    fn test_re_is_reserved() {
        let mut registry = ConverterRegistry::builtin();
        let err = registry.register(Converter::inline(".*")).unwrap_err();
        assert!(matches!(err, RouterError::MalformedSegment { .. }));
    }
}
