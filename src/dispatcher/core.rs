//! Dispatcher core: the per-request state machine.
//!
//! ```text
//! resolve ──none──▶ 404
//!    │
//!  auth ──denied──▶ 302 / 403 (no callbacks)
//!    │
//!  before* ──value──┐
//!    │              │
//!  handler ──error──┼──▶ typed, then 500 handlers ──none──▶ propagate
//!    │              │          │
//!  normalize ◀──────┘          │
//!    │                         │
//!  status < threshold ─▶ after*│
//!  status ≥ threshold ─▶ error handlers
//!    │                         │
//!  respond ◀───────────────────┘
//! ```

use std::any::type_name;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, info, info_span, warn};

use super::context::DispatchContext;
use super::value::{BodyKind, ReturnValue};
use crate::error::DispatchError;
use crate::ids::{RequestId, REQUEST_ID_HEADER};
use crate::pattern::PathParams;
use crate::router::{Method, Route, RouteTable};
use crate::security::{AuthGate, AuthOutcome, Denial};
use crate::server::{Registration, RouteInstaller, TransportRequest};

/// Runs before the handler. Returning a value skips the handler.
pub type BeforeHandler = Arc<dyn Fn(&mut DispatchContext<'_>) -> Option<ReturnValue> + Send + Sync>;

/// Runs after a successful value was normalized. Returning a value replaces it.
pub type AfterHandler = Arc<dyn Fn(&mut DispatchContext<'_>) -> Option<ReturnValue> + Send + Sync>;

/// Runs for error statuses and handler errors. Returning a value resolves the error.
pub type ErrorHandler =
    Arc<dyn Fn(&mut DispatchContext<'_>, &ErrorCause<'_>) -> Option<ReturnValue> + Send + Sync>;

/// What an error handler is reacting to.
#[derive(Debug, Clone, Copy)]
pub struct ErrorCause<'e> {
    /// Normalized status, or 500 for a handler error.
    pub status: u16,
    /// The handler error, when there was one.
    pub error: Option<&'e anyhow::Error>,
}

/// Selects which failures an error handler sees.
#[derive(Clone)]
pub enum ErrorMatcher {
    /// Exact status code. Handler errors count as 500.
    Status(u16),
    /// Handler errors accepted by `matches`.
    Error {
        type_name: &'static str,
        matches: fn(&anyhow::Error) -> bool,
    },
}

impl ErrorMatcher {
    #[must_use]
    pub fn status(code: u16) -> Self {
        ErrorMatcher::Status(code)
    }

    /// Handler errors of type `E` anywhere in the error's source chain.
    #[must_use]
    pub fn of<E: StdError + Send + Sync + 'static>() -> Self {
        ErrorMatcher::Error {
            type_name: type_name::<E>(),
            matches: chain_contains::<E>,
        }
    }

    /// Every handler error.
    #[must_use]
    pub fn any() -> Self {
        ErrorMatcher::Error {
            type_name: "any",
            matches: |_| true,
        }
    }

    fn is_typed(&self) -> bool {
        matches!(self, ErrorMatcher::Error { .. })
    }

    fn accepts(&self, cause: &ErrorCause<'_>) -> bool {
        match self {
            ErrorMatcher::Status(code) => *code == cause.status,
            ErrorMatcher::Error { matches, .. } => cause.error.is_some_and(|err| matches(err)),
        }
    }
}

impl fmt::Debug for ErrorMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorMatcher::Status(code) => f.debug_tuple("Status").field(code).finish(),
            ErrorMatcher::Error { type_name, .. } => f.debug_tuple("Error").field(type_name).finish(),
        }
    }
}

impl From<u16> for ErrorMatcher {
    fn from(code: u16) -> Self {
        ErrorMatcher::Status(code)
    }
}

fn chain_contains<E: StdError + Send + Sync + 'static>(err: &anyhow::Error) -> bool {
    err.downcast_ref::<E>().is_some() || err.chain().any(|cause| cause.is::<E>())
}

/// Which branch of the pipeline produced the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    NotFound,
    MethodNotAllowed,
    AuthDenied,
    ShortCircuited,
    Handled,
    ErrorHandled,
}

/// Summary of one dispatch, returned after the response was sent.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchOutcome {
    pub request_id: RequestId,
    pub status: u16,
    pub stage: Stage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<BodyKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route: Option<String>,
}

/// Frozen callback chains plus the built route table.
///
/// Produced by [`crate::App::finalize`]. Cheap to share: every chain is an
/// `Arc<[_]>` and nothing is mutated after construction.
pub struct Dispatcher {
    routes: Arc<RouteTable>,
    before: Arc<[BeforeHandler]>,
    after: Arc<[AfterHandler]>,
    errors: Arc<[(ErrorMatcher, ErrorHandler)]>,
    error_threshold: u16,
    body_chunk_limit: usize,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("routes", &self.routes.len())
            .field("before", &self.before.len())
            .field("after", &self.after.len())
            .field("errors", &self.errors.iter().map(|(m, _)| m).collect::<Vec<_>>())
            .field("error_threshold", &self.error_threshold)
            .field("body_chunk_limit", &self.body_chunk_limit)
            .finish()
    }
}

impl Dispatcher {
    /// `after` is expected in execution order (reverse of registration).
    pub(crate) fn new(
        routes: RouteTable,
        before: Vec<BeforeHandler>,
        after: Vec<AfterHandler>,
        errors: Vec<(ErrorMatcher, ErrorHandler)>,
        error_threshold: u16,
        body_chunk_limit: usize,
    ) -> Self {
        Self {
            routes: Arc::new(routes),
            before: before.into(),
            after: after.into(),
            errors: errors.into(),
            error_threshold,
            body_chunk_limit,
        }
    }

    #[must_use]
    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    #[must_use]
    pub fn error_threshold(&self) -> u16 {
        self.error_threshold
    }

    /// Resolve and dispatch a raw request.
    ///
    /// Unknown methods get 405 and unmatched paths 404, both without
    /// running any callback.
    pub fn dispatch(&self, req: &mut dyn TransportRequest) -> Result<DispatchOutcome, DispatchError> {
        let request_id = RequestId::from_header_or_new(req.header(REQUEST_ID_HEADER));
        let Ok(method) = req.method().parse::<Method>() else {
            warn!(request_id = %request_id, method = %req.method(), "Method outside the routing vocabulary");
            return Ok(plain(req, request_id, 405, Stage::MethodNotAllowed));
        };
        let Some(found) = self.routes.resolve(req.host(), method, req.path()) else {
            debug!(request_id = %request_id, method = %method, path = %req.path(), "No route matched");
            return Ok(plain(req, request_id, 404, Stage::NotFound));
        };
        self.run(found.route, found.params, req, request_id)
    }

    /// Dispatch a request already matched to `route` by the transport.
    pub fn dispatch_route(
        &self,
        route: Arc<Route>,
        params: PathParams,
        req: &mut dyn TransportRequest,
    ) -> Result<DispatchOutcome, DispatchError> {
        let request_id = RequestId::from_header_or_new(req.header(REQUEST_ID_HEADER));
        self.run(route, params, req, request_id)
    }

    /// Hand every built route to `installer`, in resolution order.
    pub fn install(self: &Arc<Self>, installer: &mut dyn RouteInstaller) -> anyhow::Result<()> {
        for route in self.routes.routes() {
            installer.install(Registration {
                domain: route.domain().map(str::to_string),
                pattern: route.path().to_string(),
                handler: BoundHandler {
                    dispatcher: Arc::clone(self),
                    route: Arc::clone(route),
                },
                methods: vec![route.method()],
                params: route.params().clone(),
                auth: route.auth().map(|a| a.descriptor()),
                key: route.key().map(str::to_string),
            })?;
        }
        info!(routes = self.routes.len(), "Routes installed on transport");
        Ok(())
    }

    fn run(
        &self,
        route: Arc<Route>,
        params: PathParams,
        req: &mut dyn TransportRequest,
        request_id: RequestId,
    ) -> Result<DispatchOutcome, DispatchError> {
        let _span = info_span!("dispatch", request_id = %request_id, route = %route.label(), method = %route.method())
            .entered();

        if let Some(binding) = route.auth() {
            if let AuthOutcome::Denied(denial) = AuthGate::check(binding, &*req) {
                warn!(status = denial.status(), source = %binding.source(), "Auth denied");
                if let Denial::Redirect(location) = &denial {
                    req.set_response_header("location", location);
                }
                req.respond(denial.status(), Vec::new());
                return Ok(DispatchOutcome {
                    request_id,
                    status: denial.status(),
                    stage: Stage::AuthDenied,
                    kind: None,
                    route: Some(route.label().to_string()),
                });
            }
        }

        let label = route.label().to_string();
        let mut ctx = DispatchContext::new(
            req,
            Arc::clone(&route),
            params,
            request_id,
            Arc::clone(&self.routes),
            self.body_chunk_limit,
        );

        for before in self.before.iter() {
            if let Some(value) = before(&mut ctx) {
                debug!("Before callback short-circuited the handler");
                ctx.return_value = Some(value);
                return self.complete(ctx, Stage::ShortCircuited, label);
            }
        }

        match route.handler().handle(&mut ctx) {
            Ok(value) => {
                ctx.return_value = Some(value);
                self.complete(ctx, Stage::Handled, label)
            }
            Err(err) => self.recover(ctx, err, label),
        }
    }

    /// Normalize the current value, then run after-callbacks or status
    /// error handlers depending on the status.
    fn complete(
        &self,
        mut ctx: DispatchContext<'_>,
        mut stage: Stage,
        label: String,
    ) -> Result<DispatchOutcome, DispatchError> {
        let status = refresh_response(&mut ctx)?;

        if status < self.error_threshold {
            for after in self.after.iter() {
                if let Some(value) = after(&mut ctx) {
                    ctx.return_value = Some(value);
                    refresh_response(&mut ctx)?;
                }
            }
        } else {
            let cause = ErrorCause { status, error: None };
            if self.handle_error(&mut ctx, &cause, false)? {
                stage = Stage::ErrorHandled;
            }
        }
        self.send(ctx, stage, label)
    }

    fn recover(
        &self,
        mut ctx: DispatchContext<'_>,
        err: anyhow::Error,
        label: String,
    ) -> Result<DispatchOutcome, DispatchError> {
        error!(error = %format!("{err:#}"), "Handler failed");
        let cause = ErrorCause {
            status: 500,
            error: Some(&err),
        };
        if self.handle_error(&mut ctx, &cause, true)? || self.handle_error(&mut ctx, &cause, false)? {
            return self.send(ctx, Stage::ErrorHandled, label);
        }
        if ctx.return_value.is_some() {
            return self.send(ctx, Stage::Handled, label);
        }
        error!(route = %label, "No error handler resolved the failure, propagating");
        Err(DispatchError::Handler(err))
    }

    /// First matching error handler that returns a value wins.
    ///
    /// `typed` selects error-type matchers, otherwise status matchers.
    fn handle_error(
        &self,
        ctx: &mut DispatchContext<'_>,
        cause: &ErrorCause<'_>,
        typed: bool,
    ) -> Result<bool, DispatchError> {
        for (matcher, handler) in self.errors.iter() {
            if matcher.is_typed() != typed || !matcher.accepts(cause) {
                continue;
            }
            if let Some(value) = handler(&mut *ctx, cause) {
                debug!(matcher = ?matcher, status = cause.status, "Error handler resolved the failure");
                ctx.return_value = Some(value);
                refresh_response(ctx)?;
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn send(
        &self,
        mut ctx: DispatchContext<'_>,
        stage: Stage,
        label: String,
    ) -> Result<DispatchOutcome, DispatchError> {
        let normalized = current_value(&ctx)?.normalize()?;
        if !ctx.has_header("content-type") {
            ctx.request_mut()
                .set_response_header("content-type", normalized.kind.content_type());
        }
        let request_id = ctx.request_id();
        let (status, kind) = (normalized.status, normalized.kind);
        ctx.request_mut().respond(status, normalized.body);
        info!(status, stage = ?stage, kind = ?kind, "Request dispatched");
        Ok(DispatchOutcome {
            request_id,
            status,
            stage,
            kind: Some(kind),
            route: Some(label),
        })
    }
}

fn current_value<'a>(ctx: &'a DispatchContext<'_>) -> Result<&'a ReturnValue, DispatchError> {
    ctx.return_value
        .as_ref()
        .ok_or_else(|| DispatchError::unparsable("null", "no return value was produced"))
}

/// Re-normalize the current value into `response_status` / `response_body`.
fn refresh_response(ctx: &mut DispatchContext<'_>) -> Result<u16, DispatchError> {
    let normalized = current_value(ctx)?.normalize()?;
    ctx.response_status = Some(normalized.status);
    ctx.response_body = Some(normalized.body);
    Ok(normalized.status)
}

fn plain(req: &mut dyn TransportRequest, request_id: RequestId, status: u16, stage: Stage) -> DispatchOutcome {
    let reason = crate::server::status_reason(status);
    req.set_response_header("content-type", BodyKind::Text.content_type());
    req.respond(status, reason.as_bytes().to_vec());
    DispatchOutcome {
        request_id,
        status,
        stage,
        kind: Some(BodyKind::Text),
        route: None,
    }
}

/// A built route bound to its dispatcher, ready to be called by a transport.
#[derive(Clone)]
pub struct BoundHandler {
    dispatcher: Arc<Dispatcher>,
    route: Arc<Route>,
}

impl BoundHandler {
    #[must_use]
    pub fn route(&self) -> &Route {
        &self.route
    }

    /// Dispatch `req` to this route with captures taken from its path.
    ///
    /// A path that does not match the route's pattern gets a 404.
    pub fn call(&self, req: &mut dyn TransportRequest) -> Result<DispatchOutcome, DispatchError> {
        let request_id = RequestId::from_header_or_new(req.header(REQUEST_ID_HEADER));
        match self.route.pattern().match_path(req.path()) {
            Some(params) => self
                .dispatcher
                .run(Arc::clone(&self.route), params, req, request_id),
            None => Ok(plain(req, request_id, 404, Stage::NotFound)),
        }
    }
}

impl fmt::Debug for BoundHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundHandler")
            .field("route", &self.route.route_key())
            .finish_non_exhaustive()
    }
}
