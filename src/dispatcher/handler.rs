use std::fmt;
use std::sync::Arc;

use super::context::DispatchContext;
use super::value::ReturnValue;

/// What a handler hands back: a return value to normalize, or an error for
/// the error-handler chain.
pub type HandlerResult = anyhow::Result<ReturnValue>;

/// A request handler.
///
/// Implemented for every `Fn(&mut DispatchContext<'_>) -> HandlerResult`, so
/// plain functions and closures can be registered directly.
pub trait Handler: Send + Sync + 'static {
    fn handle(&self, ctx: &mut DispatchContext<'_>) -> HandlerResult;
}

/// Wraps a closure so its higher-ranked signature is fixed at registration.
pub(crate) struct FnHandler<F>(pub(crate) F);

impl<F> Handler for FnHandler<F>
where
    F: Fn(&mut DispatchContext<'_>) -> HandlerResult + Send + Sync + 'static,
{
    fn handle(&self, ctx: &mut DispatchContext<'_>) -> HandlerResult {
        (self.0)(ctx)
    }
}

/// A type-erased handler plus a stable identity used in route listings.
#[derive(Clone)]
pub struct Endpoint {
    name: Arc<str>,
    handler: Arc<dyn Handler>,
}

impl Endpoint {
    /// Wrap a function or closure. The identity is the function's type path.
    pub fn from_fn<F>(handler: F) -> Self
    where
        F: Fn(&mut DispatchContext<'_>) -> HandlerResult + Send + Sync + 'static,
    {
        Self::named(std::any::type_name::<F>(), FnHandler(handler))
    }

    /// Wrap any [`Handler`] under an explicit identity.
    pub fn named(name: &str, handler: impl Handler) -> Self {
        Self {
            name: Arc::from(name),
            handler: Arc::new(handler),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn handle(&self, ctx: &mut DispatchContext<'_>) -> HandlerResult {
        self.handler.handle(ctx)
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Endpoint").field(&self.name).finish()
    }
}
