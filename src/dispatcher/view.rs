use super::context::DispatchContext;
use super::handler::{Endpoint, Handler, HandlerResult};
use super::value::ReturnValue;
use crate::router::Method;

/// Class-style handler: one method per HTTP verb.
///
/// A fresh view is built for every request, so fields can hold per-request
/// state. Verbs that are not overridden answer `405 Method not allowed`.
/// They never answer `403`; refusing access is left to auth bindings.
///
/// ```rust
/// use routeweave::dispatcher::{as_view, DispatchContext, HandlerResult, MethodView};
/// use routeweave::router::RouteSpec;
///
/// #[derive(Default)]
/// struct Profile;
///
/// impl MethodView for Profile {
///     fn get(&mut self, _ctx: &mut DispatchContext<'_>) -> HandlerResult {
///         Ok("profile".into())
///     }
/// }
///
/// let spec = RouteSpec::endpoint("/profile", as_view("profile", Profile::default))
///     .methods(["get", "post"]);
/// assert_eq!(spec.path(), "/profile");
/// ```
pub trait MethodView: Send + 'static {
    /// Runs before the verb method.
    fn before_handler(&mut self, _ctx: &mut DispatchContext<'_>) {}

    /// Runs after the verb method returned a value.
    fn after_response(&mut self, _ctx: &mut DispatchContext<'_>, _value: &ReturnValue) {}

    fn get(&mut self, ctx: &mut DispatchContext<'_>) -> HandlerResult {
        self.method_not_allowed(ctx)
    }

    fn put(&mut self, ctx: &mut DispatchContext<'_>) -> HandlerResult {
        self.method_not_allowed(ctx)
    }

    fn patch(&mut self, ctx: &mut DispatchContext<'_>) -> HandlerResult {
        self.method_not_allowed(ctx)
    }

    fn post(&mut self, ctx: &mut DispatchContext<'_>) -> HandlerResult {
        self.method_not_allowed(ctx)
    }

    fn delete(&mut self, ctx: &mut DispatchContext<'_>) -> HandlerResult {
        self.method_not_allowed(ctx)
    }

    fn options(&mut self, ctx: &mut DispatchContext<'_>) -> HandlerResult {
        self.method_not_allowed(ctx)
    }

    fn head(&mut self, ctx: &mut DispatchContext<'_>) -> HandlerResult {
        self.method_not_allowed(ctx)
    }

    fn method_not_allowed(&mut self, _ctx: &mut DispatchContext<'_>) -> HandlerResult {
        Ok(ReturnValue::with_status(405, "Method not allowed"))
    }
}

struct ViewHandler<F>(F);

impl<F, V> Handler for ViewHandler<F>
where
    F: Fn() -> V + Send + Sync + 'static,
    V: MethodView,
{
    fn handle(&self, ctx: &mut DispatchContext<'_>) -> HandlerResult {
        let mut view = (self.0)();
        view.before_handler(ctx);
        let value = match ctx.method() {
            Method::Get => view.get(ctx),
            Method::Put => view.put(ctx),
            Method::Patch => view.patch(ctx),
            Method::Post => view.post(ctx),
            Method::Delete => view.delete(ctx),
            Method::Options => view.options(ctx),
            Method::Head => view.head(ctx),
        }?;
        view.after_response(ctx, &value);
        Ok(value)
    }
}

/// Wrap a view factory as an endpoint named `name`.
pub fn as_view<F, V>(name: &str, factory: F) -> Endpoint
where
    F: Fn() -> V + Send + Sync + 'static,
    V: MethodView,
{
    Endpoint::named(name, ViewHandler(factory))
}
