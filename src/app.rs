//! # Application
//!
//! [`App`] is where routes, auth bindings and callbacks are registered. It
//! has two phases:
//!
//! 1. **Setup**: every registration method is available.
//! 2. **Finalized**: [`App::finalize`] builds the router tree, resolves
//!    named auth bindings, freezes the callback chains into a
//!    [`Dispatcher`] and runs the on-ready hooks. From then on every
//!    registration method fails with [`RouterError::AlreadyFinalized`].
//!
//! ```rust
//! use routeweave::dispatcher::{DispatchContext, HandlerResult};
//! use routeweave::router::RouteSpec;
//! use routeweave::server::MemoryRequest;
//! use routeweave::App;
//!
//! fn hello(_ctx: &mut DispatchContext<'_>) -> HandlerResult {
//!     Ok("hello".into())
//! }
//!
//! # fn main() -> anyhow::Result<()> {
//! let mut app = App::new("demo");
//! app.add_route(RouteSpec::new("/", hello).name("index"))?;
//! let dispatcher = app.finalize()?;
//!
//! let mut req = MemoryRequest::get("/");
//! dispatcher.dispatch(&mut req)?;
//! assert_eq!(req.response().map(|r| r.status), Some(200));
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use tracing::{debug, info};

use crate::dispatcher::{
    AfterHandler, BeforeHandler, DispatchContext, Dispatcher, ErrorCause, ErrorHandler, ErrorMatcher,
    ReturnValue,
};
use crate::error::RouterError;
use crate::pattern::{ConverterRegistry, PathArgs};
use crate::router::{RouteListing, RouteSpec, Router};
use crate::runtime_config::RuntimeConfig;
use crate::security::{AuthBinding, AuthRegistry};
use crate::server::RouteInstaller;

type ReadyHook = Box<dyn FnOnce(&Dispatcher) + Send>;

/// Routing application in setup or finalized state.
pub struct App {
    config: RuntimeConfig,
    router: Router,
    auth: AuthRegistry,
    before: Vec<BeforeHandler>,
    after: Vec<AfterHandler>,
    errors: Vec<(ErrorMatcher, ErrorHandler)>,
    ready: Vec<ReadyHook>,
    dispatcher: Option<Arc<Dispatcher>>,
}

impl App {
    /// Application with default settings and a root router called `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(RuntimeConfig {
            name: name.into(),
            ..RuntimeConfig::default()
        })
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        let router = Router::new(config.name.clone()).with_override(config.allow_override);
        Self {
            config,
            router,
            auth: AuthRegistry::new(),
            before: Vec::new(),
            after: Vec::new(),
            errors: Vec::new(),
            ready: Vec::new(),
            dispatcher: None,
        }
    }

    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// The root router. Routes are only built once the app is finalized.
    #[must_use]
    pub fn router(&self) -> &Router {
        &self.router
    }

    #[must_use]
    pub fn is_finalized(&self) -> bool {
        self.dispatcher.is_some()
    }

    /// The frozen dispatcher, once finalized.
    #[must_use]
    pub fn dispatcher(&self) -> Option<&Arc<Dispatcher>> {
        self.dispatcher.as_ref()
    }

    fn ensure_open(&self, operation: &'static str) -> Result<(), RouterError> {
        if self.is_finalized() {
            return Err(RouterError::AlreadyFinalized(operation));
        }
        Ok(())
    }

    /// Replace the converters available to route templates.
    pub fn set_converters(&mut self, converters: ConverterRegistry) -> Result<(), RouterError> {
        self.ensure_open("set_converters")?;
        self.router = std::mem::take(&mut self.router).with_converters(converters);
        Ok(())
    }

    pub fn add_route(&mut self, spec: RouteSpec) -> Result<(), RouterError> {
        self.ensure_open("add_route")?;
        self.router.add_route(spec)
    }

    /// Mount a child router under `prefix`.
    pub fn mount(&mut self, prefix: &str, router: Router) -> Result<(), RouterError> {
        self.ensure_open("mount")?;
        self.router.mount(prefix, router);
        Ok(())
    }

    /// Register a named auth binding for routes to reference.
    pub fn auth(&mut self, name: impl Into<String>, binding: AuthBinding) -> Result<(), RouterError> {
        self.ensure_open("auth")?;
        self.auth.register(name, binding);
        Ok(())
    }

    /// Runs before every handler, in registration order.
    pub fn before_handler<F>(&mut self, callback: F) -> Result<(), RouterError>
    where
        F: Fn(&mut DispatchContext<'_>) -> Option<ReturnValue> + Send + Sync + 'static,
    {
        self.ensure_open("before_handler")?;
        self.before.push(Arc::new(callback));
        Ok(())
    }

    /// Runs after every successful response, in reverse registration order.
    pub fn after_handler<F>(&mut self, callback: F) -> Result<(), RouterError>
    where
        F: Fn(&mut DispatchContext<'_>) -> Option<ReturnValue> + Send + Sync + 'static,
    {
        self.ensure_open("after_handler")?;
        self.after.push(Arc::new(callback));
        Ok(())
    }

    /// Runs for matching error statuses or handler errors, in registration order.
    ///
    /// Handler errors are offered to type matchers first, then to `500`
    /// status matchers.
    pub fn error_handler<F>(&mut self, matcher: impl Into<ErrorMatcher>, callback: F) -> Result<(), RouterError>
    where
        F: Fn(&mut DispatchContext<'_>, &ErrorCause<'_>) -> Option<ReturnValue> + Send + Sync + 'static,
    {
        self.ensure_open("error_handler")?;
        self.errors.push((matcher.into(), Arc::new(callback)));
        Ok(())
    }

    /// Runs once, at the end of [`App::finalize`].
    pub fn on_ready<F>(&mut self, hook: F) -> Result<(), RouterError>
    where
        F: FnOnce(&Dispatcher) + Send + 'static,
    {
        self.ensure_open("on_ready")?;
        self.ready.push(Box::new(hook));
        Ok(())
    }

    /// Build routes, resolve auth and freeze the callback chains.
    ///
    /// A failed finalize leaves the app in setup state.
    pub fn finalize(&mut self) -> Result<Arc<Dispatcher>, RouterError> {
        self.ensure_open("finalize")?;
        self.router.build_with_domain(self.config.default_domain.as_deref())?;
        self.router.table_mut().resolve_auth(&self.auth)?;

        let after: Vec<AfterHandler> = self.after.iter().rev().cloned().collect();
        let dispatcher = Arc::new(Dispatcher::new(
            self.router.table().clone(),
            self.before.clone(),
            after,
            self.errors.clone(),
            self.config.error_status_threshold,
            self.config.body_chunk_limit,
        ));
        self.dispatcher = Some(Arc::clone(&dispatcher));

        info!(
            app = %self.config.name,
            routes_count = dispatcher.routes().len(),
            before = self.before.len(),
            after = self.after.len(),
            error_handlers = self.errors.len(),
            "Application finalized"
        );

        for hook in self.ready.drain(..) {
            hook(&dispatcher);
        }
        debug!("Ready hooks completed");
        Ok(dispatcher)
    }

    /// Hand every built route to a host transport. Needs a finalized app.
    pub fn install(&self, installer: &mut dyn RouteInstaller) -> anyhow::Result<()> {
        let dispatcher = self
            .dispatcher
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("application must be finalized before installing routes"))?;
        dispatcher.install(installer)
    }

    /// Build a path for the route called `name`. Needs a finalized app.
    pub fn url_for(&self, name: &str, args: impl Into<PathArgs>) -> Result<String, RouterError> {
        self.router.reverse(name, args)
    }

    /// Diagnostic dump of the built routes.
    #[must_use]
    pub fn listing(&self) -> Vec<RouteListing> {
        self.router.listing()
    }
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("config", &self.config)
            .field("router", &self.router.name())
            .field("auth", &self.auth.len())
            .field("before", &self.before.len())
            .field("after", &self.after.len())
            .field("errors", &self.errors.len())
            .field("finalized", &self.is_finalized())
            .finish()
    }
}
