//! # Server Module
//!
//! The boundary between routeweave and whatever HTTP server carries requests.
//!
//! - [`TransportRequest`] is the narrow request/response surface the
//!   dispatcher needs from a host transport.
//! - [`MemoryRequest`] implements it in memory for the CLI and for tests.
//! - [`RouteInstaller`] receives one [`Registration`] per built route when a
//!   finalized application is handed to a transport.

pub mod install;
pub mod request;
pub mod response;

pub use install::{Registration, RouteInstaller};
pub use request::{parse_cookies, parse_query_params, MemoryRequest, TransportRequest};
pub use response::{status_reason, RecordedResponse};
