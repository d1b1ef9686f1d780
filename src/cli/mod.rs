//! # CLI Module
//!
//! Operational command line for a routeweave application.
//!
//! The binary builds its application through a factory, finalizes it, then
//! runs one command against it. Nothing here opens a socket: requests are
//! dispatched through the in-memory transport.
//!
//! ## Commands
//!
//! ### `routes`
//!
//! Print every built route (name, handler, raw path, methods) and exit:
//!
//! ```bash
//! routeweave routes
//! routeweave routes --json
//! ```
//!
//! ### `dispatch`
//!
//! Run one request through the full pipeline and print the response:
//!
//! ```bash
//! routeweave dispatch /user/5
//! routeweave dispatch -X POST /echo -H 'X-Api-Key: secret' -d '{"a":1}'
//! routeweave dispatch /admin --cookie session=abc --json
//! ```
//!
//! ### `url-for`
//!
//! Build the path of a named route:
//!
//! ```bash
//! routeweave url-for blog:post slug=hello
//! ```
//!
//! ### `check`
//!
//! Load the configuration and finalize the application, reporting any
//! configuration error.
//!
//! ## Configuration
//!
//! `--config <FILE>` (or `ROUTEWEAVE_CONFIG`) points at a YAML or TOML file;
//! `ROUTEWEAVE_*` variables override it.

mod commands;

#[cfg(test)]
mod tests;

pub use commands::{run_cli, Cli, Commands};
