use std::sync::Arc;

use tracing::{debug, info, warn};

use super::method::Method;
use super::route::{PendingRoute, Route, RouteKey, RouteListing, RouteSpec};
use super::table::{RouteMatch, RouteTable};
use crate::error::RouterError;
use crate::pattern::{ConverterRegistry, PathArgs};

const NAME_SEPARATOR: &str = ":";

/// A named set of routes plus child routers mounted under path prefixes.
///
/// Building flattens the tree pre-order: this router's own routes first,
/// then each mount in mount order, recursively. Mounted routes get the
/// joined prefix path and a `parent:child:route` name; the root router's
/// own name is never part of a route name.
#[derive(Debug, Clone)]
pub struct Router {
    name: String,
    table: RouteTable,
    mounts: Vec<(String, Router)>,
}

impl Default for Router {
    fn default() -> Self {
        Self::new("")
    }
}

impl Router {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: RouteTable::new(),
            mounts: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_override(mut self, allow: bool) -> Self {
        self.table = self.table.with_override(allow);
        self
    }

    #[must_use]
    pub fn with_converters(mut self, converters: ConverterRegistry) -> Self {
        self.table = self.table.with_converters(converters);
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register a route on this router.
    pub fn add_route(&mut self, spec: RouteSpec) -> Result<(), RouterError> {
        self.table.register(spec)
    }

    /// Builder form of [`Router::add_route`].
    pub fn route(mut self, spec: RouteSpec) -> Result<Self, RouterError> {
        self.add_route(spec)?;
        Ok(self)
    }

    /// Mount `child` under `prefix`. Mounting again at the same prefix
    /// replaces the earlier child.
    pub fn mount(&mut self, prefix: &str, child: Router) {
        let prefix = prefix.trim_matches('/').to_string();
        match self.mounts.iter_mut().find(|(p, _)| *p == prefix) {
            Some(slot) => {
                warn!(prefix = %prefix, child = %child.name, "Replacing router mounted at prefix");
                slot.1 = child;
            }
            None => {
                debug!(prefix = %prefix, child = %child.name, "Router mounted");
                self.mounts.push((prefix, child));
            }
        }
    }

    /// Flatten this router and its mounts and compile the result.
    ///
    /// On failure the previously built routes stay in place.
    pub fn build(&mut self) -> Result<(), RouterError> {
        self.build_with_domain(None)
    }

    /// Like [`Router::build`], giving `default_domain` to routes that have none.
    ///
    /// Requests without a host are then resolved as if sent to `default_domain`.
    pub fn build_with_domain(&mut self, default_domain: Option<&str>) -> Result<(), RouterError> {
        let mut flat = Vec::new();
        self.collect(&[], &[], &mut flat);
        if let Some(domain) = default_domain {
            for route in flat.iter_mut().filter(|r| r.domain.is_none()) {
                route.domain = Some(domain.to_string());
            }
        }
        info!(router = %self.name, routes = flat.len(), mounts = self.mounts.len(), "Building router");
        self.table.install(flat)?;
        self.table.set_default_domain(default_domain);
        Ok(())
    }

    fn collect(&self, names: &[&str], prefixes: &[&str], out: &mut Vec<PendingRoute>) {
        for route in self.table.pending() {
            let mut route = route.clone();
            route.raw_path = join_path(prefixes, &route.raw_path);
            route.name = route.name.map(|n| join_name(names, &n));
            out.push(route);
        }
        for (prefix, child) in &self.mounts {
            let mut child_names = names.to_vec();
            child_names.push(&child.name);
            let mut child_prefixes = prefixes.to_vec();
            child_prefixes.push(prefix);
            child.collect(&child_names, &child_prefixes, out);
        }
    }

    /// The built table.
    #[must_use]
    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    pub(crate) fn table_mut(&mut self) -> &mut RouteTable {
        &mut self.table
    }

    #[must_use]
    pub fn routes(&self) -> &[Arc<Route>] {
        self.table.routes()
    }

    #[must_use]
    pub fn find(&self, domain: Option<&str>, path: &str, method: Method) -> Option<&Arc<Route>> {
        self.table.find(domain, path, method)
    }

    #[must_use]
    pub fn find_key(&self, key: &RouteKey) -> Option<&Arc<Route>> {
        self.table.find_key(key)
    }

    #[must_use]
    pub fn find_by_name(&self, name: &str) -> Option<&Arc<Route>> {
        self.table.find_by_name(name)
    }

    pub fn reverse(&self, name: &str, args: impl Into<PathArgs>) -> Result<String, RouterError> {
        self.table.reverse(name, args)
    }

    #[must_use]
    pub fn resolve(&self, host: Option<&str>, method: Method, path: &str) -> Option<RouteMatch> {
        self.table.resolve(host, method, path)
    }

    #[must_use]
    pub fn listing(&self) -> Vec<RouteListing> {
        self.table.listing()
    }
}

/// Join mount prefixes and a route template under the root `/`.
///
/// Each part loses exactly one leading `/`, then parts are joined with `/`.
/// Extra slashes inside a template are kept.
pub(crate) fn join_path(prefixes: &[&str], raw: &str) -> String {
    std::iter::once("/")
        .chain(prefixes.iter().copied())
        .chain(std::iter::once(raw))
        .map(|part| part.strip_prefix('/').unwrap_or(part))
        .collect::<Vec<_>>()
        .join("/")
}

/// Namespace a route name with its mount chain, skipping unnamed routers.
pub(crate) fn join_name(names: &[&str], name: &str) -> String {
    names
        .iter()
        .copied()
        .filter(|n| !n.is_empty())
        .chain(std::iter::once(name))
        .collect::<Vec<_>>()
        .join(NAME_SEPARATOR)
}
