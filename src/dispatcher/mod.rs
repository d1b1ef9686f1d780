//! # Dispatcher Module
//!
//! Per-request pipeline for routeweave: auth gate, before-callbacks,
//! handler, return-value normalization, after-callbacks and error handlers.
//!
//! ## Overview
//!
//! The dispatcher is what a host transport calls for every request. It:
//! - Resolves the request to a built route (or answers 404 / 405)
//! - Applies the route's auth binding; a denial answers 302 or 403 and stops
//! - Runs before-callbacks in registration order; the first value wins and
//!   skips the handler
//! - Calls the handler and normalizes its [`ReturnValue`] into `(status, bytes)`
//! - Runs after-callbacks in reverse registration order for statuses below
//!   the error threshold, or error handlers otherwise
//! - Routes handler errors to error handlers matched by type or by status 500
//! - Sends exactly one response
//!
//! ## Return values
//!
//! | Value | Status | Body |
//! |---|---|---|
//! | `Bytes` | 200 | as is |
//! | `Text` | 200 | UTF-8 |
//! | `Json` | 200 | serialized JSON |
//! | `Tuple` of two | first element, coerced to an integer | second element |
//! | `Tuple` of any other length | 200 | JSON array |
//!
//! A value that can't be normalized is a [`crate::DispatchError`] and is never
//! downgraded to a 500 response.
//!
//! ## Handlers
//!
//! Any `Fn(&mut DispatchContext<'_>) -> HandlerResult` is a handler. Handler
//! errors are `anyhow::Error`, so any error type can be returned with `?`
//! and matched later with [`ErrorMatcher::of`].
//!
//! ```rust
//! use routeweave::dispatcher::{DispatchContext, HandlerResult, ReturnValue};
//!
//! fn show(ctx: &mut DispatchContext<'_>) -> HandlerResult {
//!     let id = ctx.params().get_int("id").unwrap_or_default();
//!     Ok(ReturnValue::json(&serde_json::json!({ "id": id }))?)
//! }
//! ```

mod context;
mod core;
mod handler;
mod value;
mod view;

pub use context::DispatchContext;
pub use core::{
    AfterHandler, BeforeHandler, BoundHandler, DispatchOutcome, Dispatcher, ErrorCause, ErrorHandler,
    ErrorMatcher, Stage,
};
pub use handler::{Endpoint, Handler, HandlerResult};
pub use value::{BodyKind, Normalized, ReturnValue};
pub use view::{as_view, MethodView};
