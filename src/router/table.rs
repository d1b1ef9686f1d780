use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use super::method::Method;
use super::route::{PendingRoute, Route, RouteKey, RouteListing, RouteSpec};
use crate::error::RouterError;
use crate::pattern::{CompiledPattern, ConverterRegistry, PathArgs, PathParams};
use crate::security::AuthRegistry;

/// Result of resolving a concrete request to a built route.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    /// The matched route (Arc to avoid cloning per request)
    pub route: Arc<Route>,
    /// Captures converted to native values
    pub params: PathParams,
}

/// Flat, ordered route table.
///
/// Registration appends pending routes. [`RouteTable::build`] compiles all
/// of them and swaps the built list in only when every route compiled and,
/// unless overrides are allowed, no two routes share a [`RouteKey`]. A route
/// name is bound to a single template: the routes sharing it must all come
/// from the same path and domain. A failed build leaves the previous built
/// state untouched. Resolution is first-match, so with overrides the
/// earliest duplicate still answers.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    allow_override: bool,
    converters: ConverterRegistry,
    default_domain: Option<String>,
    pending: Vec<PendingRoute>,
    routes: Vec<Arc<Route>>,
}

impl RouteTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// When set, a route with an existing identity is appended after the
    /// earlier one instead of failing.
    #[must_use]
    pub fn with_override(mut self, allow: bool) -> Self {
        self.allow_override = allow;
        self
    }

    #[must_use]
    pub fn with_converters(mut self, converters: ConverterRegistry) -> Self {
        self.converters = converters;
        self
    }

    #[must_use]
    pub fn allow_override(&self) -> bool {
        self.allow_override
    }

    #[must_use]
    pub fn converters(&self) -> &ConverterRegistry {
        &self.converters
    }

    /// Expand `spec` into one pending route per method and append them.
    ///
    /// Either every method is registered or none is. With overrides allowed
    /// a repeated identity is appended as well.
    pub fn register(&mut self, spec: RouteSpec) -> Result<(), RouterError> {
        let expanded = spec.expand()?;
        if let Some(dup) = expanded
            .iter()
            .find(|route| self.pending.iter().any(|r| r.same_identity(route)))
        {
            if !self.allow_override {
                let err = dup.duplicate_error();
                error!(error = %err, "Route registration rejected");
                return Err(err);
            }
            warn!(path = %dup.raw_path, method = %dup.method, "Registering a route with an existing identity");
        }
        for route in &expanded {
            debug!(path = %route.raw_path, method = %route.method, name = ?route.name, "Route registered");
        }
        self.pending.extend(expanded);
        Ok(())
    }

    /// Compile this table's own pending routes.
    pub fn build(&mut self) -> Result<(), RouterError> {
        let pending = self.pending.clone();
        self.install(pending)
    }

    pub(crate) fn pending(&self) -> &[PendingRoute] {
        &self.pending
    }

    /// Domain assumed for requests that carry no host.
    #[must_use]
    pub fn default_domain(&self) -> Option<&str> {
        self.default_domain.as_deref()
    }

    pub(crate) fn set_default_domain(&mut self, domain: Option<&str>) {
        self.default_domain = domain.map(str::to_string);
    }

    /// Compile `pending` and replace the built list on success.
    pub(crate) fn install(&mut self, pending: Vec<PendingRoute>) -> Result<(), RouterError> {
        let mut built: Vec<Arc<Route>> = Vec::with_capacity(pending.len());
        let mut seen: HashSet<RouteKey> = HashSet::with_capacity(pending.len());
        let mut names: HashMap<String, (Option<String>, String)> = HashMap::new();

        for route in pending {
            let pattern = CompiledPattern::compile(&route.raw_path, &self.converters)
                .inspect_err(|e| error!(path = %route.raw_path, error = %e, "Route template failed to compile"))?;
            let route = Route::compile(route, pattern);
            let key = route.route_key();
            if !seen.insert(key.clone()) {
                if !self.allow_override {
                    let err = RouterError::DuplicateRoute {
                        domain: key.domain.clone().unwrap_or_else(|| "*".into()),
                        path: key.path.clone(),
                        method: key.method,
                    };
                    error!(error = %err, "Route table build rejected");
                    return Err(err);
                }
                warn!(route = %key, "Route identity appears more than once");
            }
            if let Some(name) = route.name() {
                let target = (route.domain().map(str::to_string), route.raw_path().to_string());
                match names.get(name) {
                    Some(existing) if *existing != target => {
                        let err = RouterError::DuplicateName {
                            name: name.to_string(),
                            existing: describe_target(existing),
                            path: describe_target(&target),
                        };
                        error!(error = %err, "Route table build rejected");
                        return Err(err);
                    }
                    Some(_) => {}
                    None => {
                        names.insert(name.to_string(), target);
                    }
                }
            }
            built.push(Arc::new(route));
        }

        info!(routes_count = built.len(), "Route table built");
        self.routes = built;
        Ok(())
    }

    /// Fill in named auth bindings. Inline bindings are left as they are.
    pub(crate) fn resolve_auth(&mut self, registry: &AuthRegistry) -> Result<(), RouterError> {
        let mut resolved = Vec::with_capacity(self.routes.len());
        for route in &self.routes {
            match (route.auth(), route.auth_name()) {
                (None, Some(name)) => {
                    let binding = registry.get(name).ok_or_else(|| RouterError::UnknownAuth {
                        route: route.label().to_string(),
                        auth: name.to_string(),
                    })?;
                    resolved.push(Arc::new(route.with_auth(binding.clone())));
                }
                _ => resolved.push(Arc::clone(route)),
            }
        }
        self.routes = resolved;
        Ok(())
    }

    /// Built routes in resolution order.
    #[must_use]
    pub fn routes(&self) -> &[Arc<Route>] {
        &self.routes
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Look a built route up by its identity.
    #[must_use]
    pub fn find_key(&self, key: &RouteKey) -> Option<&Arc<Route>> {
        self.routes.iter().find(|r| r.route_key() == *key)
    }

    /// Look a built route up by domain, path and method.
    ///
    /// `path` may be a template or an already normalized expression; both
    /// are normalized with this table's converters before comparing.
    #[must_use]
    pub fn find(&self, domain: Option<&str>, path: &str, method: Method) -> Option<&Arc<Route>> {
        let normalized = CompiledPattern::compile(path, &self.converters).ok();
        self.routes.iter().find(|r| {
            r.method() == method
                && r.domain() == domain
                && (r.path() == path || normalized.as_ref().is_some_and(|p| r.path() == p.pattern()))
        })
    }

    /// First built route carrying `name`.
    #[must_use]
    pub fn find_by_name(&self, name: &str) -> Option<&Arc<Route>> {
        self.routes.iter().find(|r| r.name() == Some(name))
    }

    /// Build a concrete path for the route called `name`.
    pub fn reverse(&self, name: &str, args: impl Into<PathArgs>) -> Result<String, RouterError> {
        let route = self
            .find_by_name(name)
            .ok_or_else(|| RouterError::NotFound(name.to_string()))?;
        route.pattern().build_path(&args.into())
    }

    /// First route matching `method` and `path` whose domain accepts `host`.
    ///
    /// Routes without a domain accept any host. The host's port is ignored.
    /// A request without a host is taken to be for the default domain.
    #[must_use]
    pub fn resolve(&self, host: Option<&str>, method: Method, path: &str) -> Option<RouteMatch> {
        let host = host.map(strip_port).or(self.default_domain.as_deref());
        self.routes
            .iter()
            .filter(|r| r.method() == method && domain_accepts(r.domain(), host))
            .find_map(|r| {
                r.pattern().match_path(path).map(|params| RouteMatch {
                    route: Arc::clone(r),
                    params,
                })
            })
    }

    /// Diagnostic dump of every built route.
    #[must_use]
    pub fn listing(&self) -> Vec<RouteListing> {
        self.routes.iter().map(|r| r.listing()).collect()
    }
}

fn strip_port(host: &str) -> &str {
    match host.rsplit_once(':') {
        Some((name, port)) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => name,
        _ => host,
    }
}

fn describe_target((domain, path): &(Option<String>, String)) -> String {
    match domain {
        Some(domain) => format!("{domain}:{path}"),
        None => path.clone(),
    }
}

fn domain_accepts(domain: Option<&str>, host: Option<&str>) -> bool {
    match domain {
        None | Some("*") => true,
        Some(domain) => host.is_some_and(|h| h.eq_ignore_ascii_case(domain)),
    }
}
