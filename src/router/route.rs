use std::collections::BTreeMap;
use std::fmt;

use regex::Regex;
use serde::Serialize;

use super::method::Method;
use crate::dispatcher::{DispatchContext, Endpoint, HandlerResult};
use crate::error::RouterError;
use crate::pattern::CompiledPattern;
use crate::security::AuthBinding;

/// One argument rule: the expression as written plus its compiled form.
#[derive(Debug, Clone)]
pub struct ParamRule {
    expression: String,
    matcher: Regex,
}

impl ParamRule {
    /// Compile `expression` as the rule for the argument `name`.
    pub fn new(name: &str, expression: impl Into<String>) -> Result<Self, RouterError> {
        let expression = expression.into();
        let matcher = Regex::new(&expression).map_err(|e| RouterError::InvalidPattern {
            template: format!("{name}={expression}"),
            reason: e.to_string(),
        })?;
        Ok(Self { expression, matcher })
    }

    #[must_use]
    pub fn expression(&self) -> &str {
        &self.expression
    }

    #[must_use]
    pub fn accepts(&self, value: &str) -> bool {
        self.matcher.is_match(value)
    }
}

impl PartialEq for ParamRule {
    fn eq(&self, other: &Self) -> bool {
        self.expression == other.expression
    }
}

impl Eq for ParamRule {}

impl Serialize for ParamRule {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.expression)
    }
}

/// Per-argument validation rules (argument name -> expression).
///
/// Forwarded to the host transport with every registration and applied
/// in-process by [`DispatchContext::populate_get`] and
/// [`DispatchContext::populate_post`]. An expression matches anywhere in the
/// value unless it is anchored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParamRules(BTreeMap<String, ParamRule>);

impl ParamRules {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule. The expression must compile.
    pub fn rule(mut self, name: impl Into<String>, expression: impl Into<String>) -> Result<Self, RouterError> {
        let name = name.into();
        let rule = ParamRule::new(&name, expression)?;
        self.0.insert(name, rule);
        Ok(self)
    }

    /// Add an already compiled rule.
    #[must_use]
    pub fn with_rule(mut self, name: impl Into<String>, rule: ParamRule) -> Self {
        self.0.insert(name.into(), rule);
        self
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(ParamRule::expression)
    }

    /// Whether `value` is a valid `name` argument. Undeclared names never are.
    #[must_use]
    pub fn accepts(&self, name: &str, value: &str) -> bool {
        self.0.get(name).is_some_and(|rule| rule.accepts(value))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.expression()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Everything needed to register a route, before method expansion.
///
/// Methods are kept as given and only checked against the vocabulary when
/// the `RouteSpec` is registered.
#[derive(Debug, Clone)]
pub struct RouteSpec {
    pub(crate) path: String,
    pub(crate) handler: Endpoint,
    pub(crate) name: Option<String>,
    pub(crate) domain: Option<String>,
    pub(crate) methods: Vec<String>,
    pub(crate) params: ParamRules,
    pub(crate) auth_name: Option<String>,
    pub(crate) auth: Option<AuthBinding>,
    pub(crate) key: Option<String>,
}

impl RouteSpec {
    /// A `get` route for `path` served by a function or closure.
    pub fn new<F>(path: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&mut DispatchContext<'_>) -> HandlerResult + Send + Sync + 'static,
    {
        Self::endpoint(path, Endpoint::from_fn(handler))
    }

    /// A `get` route for `path` served by an already wrapped endpoint.
    pub fn endpoint(path: impl Into<String>, handler: Endpoint) -> Self {
        Self {
            path: path.into(),
            handler,
            name: None,
            domain: None,
            methods: vec![Method::Get.as_str().to_string()],
            params: ParamRules::default(),
            auth_name: None,
            auth: None,
            key: None,
        }
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Replace the method list. Names are matched case-insensitively.
    #[must_use]
    pub fn methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.methods = methods.into_iter().map(|m| m.as_ref().to_string()).collect();
        self
    }

    #[must_use]
    pub fn params(mut self, params: ParamRules) -> Self {
        self.params = params;
        self
    }

    /// Reference a binding registered in the application's auth registry.
    #[must_use]
    pub fn auth_name(mut self, name: impl Into<String>) -> Self {
        self.auth_name = Some(name.into());
        self
    }

    /// Attach a binding to this route only. Takes precedence over `auth_name`.
    #[must_use]
    pub fn auth(mut self, binding: AuthBinding) -> Self {
        self.auth = Some(binding);
        self
    }

    #[must_use]
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// One pending route per declared method, in declaration order.
    pub(crate) fn expand(self) -> Result<Vec<PendingRoute>, RouterError> {
        let methods = self
            .methods
            .iter()
            .map(|m| m.parse::<Method>())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(methods
            .into_iter()
            .map(|method| PendingRoute {
                name: self.name.clone(),
                raw_path: self.path.clone(),
                handler: self.handler.clone(),
                method,
                domain: self.domain.clone(),
                params: self.params.clone(),
                auth_name: self.auth_name.clone(),
                auth: self.auth.clone(),
                key: self.key.clone(),
            })
            .collect())
    }
}

/// A single-method route whose template has not been compiled yet.
#[derive(Debug, Clone)]
pub(crate) struct PendingRoute {
    pub(crate) name: Option<String>,
    pub(crate) raw_path: String,
    pub(crate) handler: Endpoint,
    pub(crate) method: Method,
    pub(crate) domain: Option<String>,
    pub(crate) params: ParamRules,
    pub(crate) auth_name: Option<String>,
    pub(crate) auth: Option<AuthBinding>,
    pub(crate) key: Option<String>,
}

impl PendingRoute {
    pub(crate) fn same_identity(&self, other: &PendingRoute) -> bool {
        self.method == other.method && self.domain == other.domain && self.raw_path == other.raw_path
    }

    pub(crate) fn duplicate_error(&self) -> RouterError {
        RouterError::DuplicateRoute {
            domain: self.domain.clone().unwrap_or_else(|| "*".into()),
            path: self.raw_path.clone(),
            method: self.method,
        }
    }
}

/// Identity of a built route: two routes collide when their keys are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct RouteKey {
    pub domain: Option<String>,
    pub path: String,
    pub method: Method,
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} [{}]",
            self.domain.as_deref().unwrap_or("*"),
            self.path,
            self.method
        )
    }
}

/// A built route: one method, one compiled pattern. Immutable.
#[derive(Debug, Clone)]
pub struct Route {
    name: Option<String>,
    raw_path: String,
    handler: Endpoint,
    method: Method,
    domain: Option<String>,
    params: ParamRules,
    auth_name: Option<String>,
    auth: Option<AuthBinding>,
    key: Option<String>,
    pattern: CompiledPattern,
}

impl Route {
    pub(crate) fn compile(pending: PendingRoute, pattern: CompiledPattern) -> Self {
        Self {
            name: pending.name,
            raw_path: pending.raw_path,
            handler: pending.handler,
            method: pending.method,
            domain: pending.domain,
            params: pending.params,
            auth_name: pending.auth_name,
            auth: pending.auth,
            key: pending.key,
            pattern,
        }
    }

    /// Copy of this route with its effective auth binding set.
    pub(crate) fn with_auth(&self, binding: AuthBinding) -> Self {
        let mut route = self.clone();
        route.auth = Some(binding);
        route
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The template as registered, after mount prefixes were applied.
    #[must_use]
    pub fn raw_path(&self) -> &str {
        &self.raw_path
    }

    /// The normalized path expression (see [`CompiledPattern::pattern`]).
    #[must_use]
    pub fn path(&self) -> &str {
        self.pattern.pattern()
    }

    #[must_use]
    pub fn handler(&self) -> &Endpoint {
        &self.handler
    }

    #[must_use]
    pub fn method(&self) -> Method {
        self.method
    }

    #[must_use]
    pub fn domain(&self) -> Option<&str> {
        self.domain.as_deref()
    }

    #[must_use]
    pub fn params(&self) -> &ParamRules {
        &self.params
    }

    #[must_use]
    pub fn auth_name(&self) -> Option<&str> {
        self.auth_name.as_deref()
    }

    /// Effective auth binding. Named bindings are only filled in once the
    /// application is finalized.
    #[must_use]
    pub fn auth(&self) -> Option<&AuthBinding> {
        self.auth.as_ref()
    }

    #[must_use]
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    #[must_use]
    pub fn pattern(&self) -> &CompiledPattern {
        &self.pattern
    }

    #[must_use]
    pub fn route_key(&self) -> RouteKey {
        RouteKey {
            domain: self.domain.clone(),
            path: self.path().to_string(),
            method: self.method,
        }
    }

    /// Name if set, otherwise the raw path. Used in log lines and errors.
    #[must_use]
    pub fn label(&self) -> &str {
        self.name().unwrap_or(&self.raw_path)
    }

    #[must_use]
    pub fn listing(&self) -> RouteListing {
        RouteListing {
            name: self.name.clone(),
            handler: self.handler.name().to_string(),
            raw_path: self.raw_path.clone(),
            methods: vec![self.method],
            domain: self.domain.clone(),
            auth: self.auth_name.clone().or_else(|| self.auth.as_ref().map(|_| "inline".into())),
        }
    }
}

/// One line of the diagnostic route dump.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteListing {
    pub name: Option<String>,
    pub handler: String,
    pub raw_path: String,
    pub methods: Vec<Method>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth: Option<String>,
}

impl fmt::Display for RouteListing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let methods = self
            .methods
            .iter()
            .map(Method::as_str)
            .collect::<Vec<_>>()
            .join(",");
        write!(
            f,
            "{} {} {} [{}]",
            self.name.as_deref().unwrap_or("-"),
            self.handler,
            self.raw_path,
            methods
        )?;
        if let Some(domain) = &self.domain {
            write!(f, " @{domain}")?;
        }
        if let Some(auth) = &self.auth {
            write!(f, " auth={auth}")?;
        }
        Ok(())
    }
}
