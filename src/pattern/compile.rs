use std::collections::HashMap;
use std::sync::Arc;

use regex::Regex;
use tracing::debug;

use super::converter::{Converter, ConverterRegistry, DEFAULT_CONVERTER, INLINE_CONVERTER};
use super::params::{PathArgs, PathParams};
use crate::error::RouterError;

const SLASH: char = '/';
const START: char = '<';
const END: char = '>';

/// One `/`-delimited piece of a path template.
#[derive(Debug, Clone)]
pub enum PathSegment {
    /// Text matched exactly.
    Literal(String),
    /// Named, typed capture.
    Capture {
        name: Arc<str>,
        expression: String,
        converter: Converter,
        /// `^(?:expression)$`, used to validate reverse-built values.
        full_match: Regex,
    },
}

impl PathSegment {
    #[must_use]
    pub fn is_capture(&self) -> bool {
        matches!(self, PathSegment::Capture { .. })
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match self {
            PathSegment::Capture { name, .. } => Some(name),
            PathSegment::Literal(_) => None,
        }
    }
}

/// A compiled path template: segments, the transport expression, a matcher
/// and the capture-name -> converter map used for reverse building.
///
/// Immutable once built. Compiling the same template with the same
/// converters always yields an equal `pattern()`.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    template: String,
    segments: Vec<PathSegment>,
    pattern: String,
    matcher: Regex,
    /// Matcher group names (`p0`, `p1`, ...) in capture order.
    groups: Vec<String>,
    converters: HashMap<String, Converter>,
}

impl CompiledPattern {
    /// Compile `template` using the built-in converters.
    pub fn parse(template: &str) -> Result<Self, RouterError> {
        Self::compile(template, &ConverterRegistry::builtin())
    }

    /// Compile `template` against `registry`.
    ///
    /// Segments wrapped in `<` `>` are captures: `<name>`, `<name:type>` or
    /// `<name:re:EXPR>`. Everything else is literal.
    pub fn compile(template: &str, registry: &ConverterRegistry) -> Result<Self, RouterError> {
        let mut segments = Vec::new();
        if !template.is_empty() {
            for part in template.split(SLASH) {
                segments.push(parse_segment(part, registry)?);
            }
        }

        let mut converters = HashMap::new();
        for segment in &segments {
            if let PathSegment::Capture {
                name, converter, ..
            } = segment
            {
                if converters
                    .insert(name.to_string(), converter.clone())
                    .is_some()
                {
                    return Err(RouterError::DuplicateCapture {
                        name: name.to_string(),
                        template: template.to_string(),
                    });
                }
            }
        }

        let pattern = segments
            .iter()
            .map(|s| match s {
                PathSegment::Literal(text) => regex::escape(text),
                PathSegment::Capture { expression, .. } => format!("({expression})"),
            })
            .collect::<Vec<_>>()
            .join("/");

        let mut groups = Vec::with_capacity(converters.len());
        let body = segments
            .iter()
            .map(|s| match s {
                PathSegment::Literal(text) => regex::escape(text),
                PathSegment::Capture { expression, .. } => {
                    let group = format!("p{}", groups.len());
                    let piece = format!("(?P<{group}>{expression})");
                    groups.push(group);
                    piece
                }
            })
            .collect::<Vec<_>>()
            .join("/");
        let matcher = Regex::new(&format!("^{body}$")).map_err(|e| invalid(template, &e))?;

        debug!(template = %template, pattern = %pattern, captures = groups.len(), "Path template compiled");

        Ok(Self {
            template: template.to_string(),
            segments,
            pattern,
            matcher,
            groups,
            converters,
        })
    }

    /// The template this pattern was compiled from.
    #[must_use]
    pub fn template(&self) -> &str {
        &self.template
    }

    #[must_use]
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Expression handed to the host transport: escaped literals and
    /// `(expr)` captures joined with `/`, unanchored.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Anchored matcher used by [`CompiledPattern::match_path`].
    #[must_use]
    pub fn captures(&self) -> &Regex {
        &self.matcher
    }

    #[must_use]
    pub fn converters(&self) -> &HashMap<String, Converter> {
        &self.converters
    }

    /// Capture names in template order.
    pub fn capture_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(PathSegment::name)
    }

    /// Match a concrete path and convert every capture to its native value.
    ///
    /// Returns `None` when the path does not match or a converter rejects
    /// the captured text.
    #[must_use]
    pub fn match_path(&self, path: &str) -> Option<PathParams> {
        let caps = self.matcher.captures(path)?;
        let mut params = PathParams::new();
        let captures = self.segments.iter().filter_map(|s| match s {
            PathSegment::Capture {
                name, converter, ..
            } => Some((name, converter)),
            PathSegment::Literal(_) => None,
        });
        for ((name, converter), group) in captures.zip(&self.groups) {
            let raw = caps.name(group)?.as_str();
            let Some(value) = converter.convert(raw) else {
                debug!(
                    template = %self.template,
                    capture = %name,
                    raw = %raw,
                    converter = converter.name(),
                    "Converter rejected captured value"
                );
                return None;
            };
            params.push(Arc::clone(name), value);
        }
        Some(params)
    }

    /// Build a concrete path from capture values.
    ///
    /// Every capture needs a value. Each value is stringified, must fully
    /// match its capture expression, and is written in its converter's
    /// canonical form.
    pub fn build_path(&self, args: &PathArgs) -> Result<String, RouterError> {
        if let Some(missing) = self.capture_names().find(|name| !args.contains(name)) {
            return Err(RouterError::MissingPathArgument(missing.to_string()));
        }

        let mut out = Vec::with_capacity(self.segments.len());
        for segment in &self.segments {
            match segment {
                PathSegment::Literal(text) => out.push(text.clone()),
                PathSegment::Capture {
                    name,
                    expression,
                    converter,
                    full_match,
                } => {
                    let value = args
                        .get(name)
                        .map(ToString::to_string)
                        .ok_or_else(|| RouterError::MissingPathArgument(name.to_string()))?;
                    let mismatch = || RouterError::PathArgumentMismatch {
                        name: name.to_string(),
                        value: value.clone(),
                        expression: expression.clone(),
                    };
                    if !full_match.is_match(&value) {
                        return Err(mismatch());
                    }
                    let canonical = converter.convert(&value).ok_or_else(mismatch)?;
                    out.push(canonical.to_string());
                }
            }
        }
        Ok(out.join("/"))
    }
}

fn invalid(template: &str, err: &regex::Error) -> RouterError {
    RouterError::InvalidPattern {
        template: template.to_string(),
        reason: err.to_string(),
    }
}

fn parse_segment(part: &str, registry: &ConverterRegistry) -> Result<PathSegment, RouterError> {
    let inner = match part
        .strip_prefix(START)
        .and_then(|rest| rest.strip_suffix(END))
    {
        Some(inner) => inner,
        None => return Ok(PathSegment::Literal(part.to_string())),
    };

    let (name, converter) = analyze_part(inner, registry)?;
    let expression = converter.expression().to_string();
    let full_match =
        Regex::new(&format!("^(?:{expression})$")).map_err(|e| invalid(part, &e))?;

    Ok(PathSegment::Capture {
        name: Arc::from(name),
        expression,
        converter,
        full_match,
    })
}

/// Split `name[:type]` / `name:re:EXPR` into the capture name and its converter.
fn analyze_part<'a>(
    inner: &'a str,
    registry: &ConverterRegistry,
) -> Result<(&'a str, Converter), RouterError> {
    let malformed = |reason| RouterError::MalformedSegment {
        segment: inner.to_string(),
        reason,
    };

    let (name, converter) = match inner.split_once(':') {
        None => (inner, registry.lookup(DEFAULT_CONVERTER)?.clone()),
        Some((_, INLINE_CONVERTER)) => {
            return Err(malformed("`re` needs an expression: <name:re:EXPR>"));
        }
        Some((name, rest)) => match rest.strip_prefix("re:") {
            Some("") => return Err(malformed("`re` expression is empty")),
            Some(expression) => (name, Converter::inline(expression)),
            None if rest.contains(':') => {
                return Err(malformed("too many `:` separators"));
            }
            None => (name, registry.lookup(rest)?.clone()),
        },
    };

    if name.is_empty() {
        return Err(malformed("capture name is empty"));
    }
    Ok((name, converter))
}
