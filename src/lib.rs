//! # routeweave
//!
//! **routeweave** is the request routing and dispatch core of a web
//! framework. It sits in front of a host HTTP transport and owns everything
//! between "a request arrived" and "exactly one response was sent".
//!
//! ## Overview
//!
//! - **Typed path patterns**: templates such as `/user/<id:int>` compile to
//!   anchored regexes whose captures convert to native values, and the same
//!   pattern builds paths back from values (reverse routing).
//! - **Nested routers**: child routers mount under path prefixes and their
//!   route names are namespaced (`blog:post`).
//! - **Callback chains**: before-handlers can short-circuit, after-handlers
//!   can rewrite successful responses, and error handlers match a status
//!   code or an error type.
//! - **Auth gating**: routes can demand a header or cookie credential and
//!   answer denials with a redirect or a `403`.
//!
//! ## Architecture
//!
//! - **[`pattern`]** - Template parsing, converters, path matching and building
//! - **[`router`]** - Route registration, nested routers, lookup and reverse routing
//! - **[`dispatcher`]** - The per-request pipeline and return value normalization
//! - **[`schema`]** - Typed argument declarations, param rules and conversion
//! - **[`security`]** - Header and cookie credential checks
//! - **[`server`]** - The transport seam, plus an in-memory transport
//! - **[`app`]** - Registration surface with a setup and a finalized phase
//! - **[`runtime_config`]** - File and environment configuration
//! - **[`otel`]** - Structured logging setup
//! - **[`cli`]** - Operational commands for built applications
//!
//! ### Request Handling Flow
//!
//! ```text
//! request ─> resolve ─> auth gate ─> before* ─> handler ─> normalize
//!              │            │           │                     │
//!             404/405     302/403   short-circuit     status < threshold ?
//!                                                       after*  :  error handlers
//!                                                             │
//!                                                           send
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use routeweave::dispatcher::{DispatchContext, HandlerResult};
//! use routeweave::router::{RouteSpec, Router};
//! use routeweave::server::MemoryRequest;
//! use routeweave::App;
//!
//! fn post(ctx: &mut DispatchContext<'_>) -> HandlerResult {
//!     let slug = ctx.params().get_str("slug").unwrap_or_default().to_string();
//!     Ok(slug.into())
//! }
//!
//! # fn main() -> anyhow::Result<()> {
//! let mut app = App::new("site");
//! app.mount("/blog", Router::new("blog").route(RouteSpec::new("/<slug>", post).name("post"))?)?;
//! let dispatcher = app.finalize()?;
//!
//! assert_eq!(app.url_for("blog:post", [("slug", "hello")])?, "/blog/hello");
//!
//! let mut req = MemoryRequest::get("/blog/hello");
//! dispatcher.dispatch(&mut req)?;
//! assert_eq!(req.response().map(|r| r.text()), Some("hello".to_string()));
//! # Ok(())
//! # }
//! ```
//!
//! ## Runtime Considerations
//!
//! Dispatch is synchronous and runs on the transport's thread. The built
//! route table and callback chains are immutable after finalize and shared
//! through `Arc`, so one dispatcher can serve any number of threads.

pub mod app;
pub mod cli;
pub mod dispatcher;
pub mod error;
pub mod ids;
pub mod otel;
pub mod pattern;
pub mod router;
pub mod runtime_config;
pub mod schema;
pub mod security;
pub mod server;

pub use app::App;
pub use dispatcher::{DispatchContext, Dispatcher, ErrorMatcher, HandlerResult, MethodView, ReturnValue};
pub use error::{DispatchError, RouterError};
pub use pattern::{PathArgs, PathParams, PathValue};
pub use router::{Method, RouteSpec, Router};
pub use runtime_config::RuntimeConfig;
pub use schema::{Field, Schema};
pub use security::AuthBinding;
pub use server::{MemoryRequest, TransportRequest};
