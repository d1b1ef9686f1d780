//! # Router Module
//!
//! Route registration, composition and lookup for routeweave.
//!
//! ## Overview
//!
//! The router is responsible for:
//! - Expanding a [`RouteSpec`] into one single-method route per declared method
//! - Rejecting duplicate (domain, path, method) identities unless overriding is allowed
//! - Mounting child routers under path prefixes with namespaced route names
//! - Compiling every template into a [`crate::pattern::CompiledPattern`] at build time
//! - Resolving requests, finding routes by identity or name, and building URLs in reverse
//!
//! ## Architecture
//!
//! Routing is two-phase:
//!
//! 1. **Build**: pending routes from the router tree are flattened pre-order,
//!    compiled and checked for collisions. The built list is swapped in only
//!    when the whole build succeeds.
//!
//! 2. **Resolve**: the built list is scanned in order and the first route whose
//!    method, domain and pattern match wins.
//!
//! ## Example
//!
//! ```rust
//! use routeweave::dispatcher::{DispatchContext, HandlerResult};
//! use routeweave::pattern::PathArgs;
//! use routeweave::router::{Method, RouteSpec, Router};
//!
//! fn show(_ctx: &mut DispatchContext<'_>) -> HandlerResult {
//!     Ok("user".into())
//! }
//!
//! # fn main() -> Result<(), routeweave::RouterError> {
//! let mut child = Router::new("users");
//! child.add_route(RouteSpec::new("/<id:int>", show).name("show"))?;
//!
//! let mut root = Router::new("app");
//! root.mount("/users", child);
//! root.build()?;
//!
//! let m = root.resolve(None, Method::Get, "/users/5").expect("route");
//! assert_eq!(m.params.get_int("id"), Some(5));
//! assert_eq!(root.reverse("users:show", PathArgs::new().with("id", 5))?, "/users/5");
//! # Ok(())
//! # }
//! ```

mod core;
mod method;
mod route;
mod table;
#[cfg(test)]
mod tests;

pub use core::Router;
pub use method::Method;
pub use route::{ParamRule, ParamRules, Route, RouteKey, RouteListing, RouteSpec};
pub use table::{RouteMatch, RouteTable};
