use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use super::value::ReturnValue;
use crate::error::{DispatchError, RouterError};
use crate::ids::RequestId;
use crate::pattern::{PathArgs, PathParams};
use crate::router::{Method, Route, RouteTable};
use crate::server::TransportRequest;

/// Per-request state shared by callbacks and the handler.
///
/// Lives for exactly one dispatch. `return_value` holds the latest value
/// produced by a handler or callback; `response_status` and `response_body`
/// are filled in once that value has been normalized.
pub struct DispatchContext<'r> {
    request: &'r mut dyn TransportRequest,
    route: Arc<Route>,
    params: PathParams,
    request_id: RequestId,
    routes: Arc<RouteTable>,
    body_chunk_limit: usize,
    scratch: HashMap<String, Value>,
    arguments: HashMap<String, String>,
    header_names: Vec<String>,
    pub return_value: Option<ReturnValue>,
    pub response_status: Option<u16>,
    pub response_body: Option<Vec<u8>>,
}

impl<'r> DispatchContext<'r> {
    pub(crate) fn new(
        request: &'r mut dyn TransportRequest,
        route: Arc<Route>,
        params: PathParams,
        request_id: RequestId,
        routes: Arc<RouteTable>,
        body_chunk_limit: usize,
    ) -> Self {
        Self {
            request,
            route,
            params,
            request_id,
            routes,
            body_chunk_limit,
            scratch: HashMap::new(),
            arguments: HashMap::new(),
            header_names: Vec::new(),
            return_value: None,
            response_status: None,
            response_body: None,
        }
    }

    #[must_use]
    pub fn request(&self) -> &(dyn TransportRequest + 'r) {
        &*self.request
    }

    pub fn request_mut(&mut self) -> &mut (dyn TransportRequest + 'r) {
        &mut *self.request
    }

    #[must_use]
    pub fn route(&self) -> &Route {
        &self.route
    }

    /// Method of the matched route.
    #[must_use]
    pub fn method(&self) -> Method {
        self.route.method()
    }

    #[must_use]
    pub fn path(&self) -> &str {
        self.request.path()
    }

    #[must_use]
    pub fn params(&self) -> &PathParams {
        &self.params
    }

    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.request.header(name)
    }

    #[must_use]
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.request.cookie(name)
    }

    #[must_use]
    pub fn query(&self, name: &str) -> Option<&str> {
        self.request.query(name)
    }

    #[must_use]
    pub fn body(&self) -> &[u8] {
        self.request.body()
    }

    /// Validate query string arguments against the route's param rules.
    ///
    /// Arguments without a rule, or whose value the rule rejects, are
    /// dropped. Returns how many arguments were kept.
    pub fn populate_get(&mut self) -> usize {
        let query = self.request.query_string().to_string();
        self.populate("query", query.as_bytes())
    }

    /// Like [`DispatchContext::populate_get`], for an
    /// `application/x-www-form-urlencoded` body.
    pub fn populate_post(&mut self) -> usize {
        let body = self.request.body().to_vec();
        self.populate("form", &body)
    }

    fn populate(&mut self, source: &'static str, input: &[u8]) -> usize {
        let rules = self.route.params();
        let mut kept = 0;
        for (name, value) in url::form_urlencoded::parse(input) {
            if rules.accepts(&name, &value) {
                self.arguments.insert(name.into_owned(), value.into_owned());
                kept += 1;
            } else {
                debug!(request_id = %self.request_id, source, argument = %name, "Argument dropped by param rules");
            }
        }
        kept
    }

    /// An argument kept by [`DispatchContext::populate_get`] or
    /// [`DispatchContext::populate_post`].
    #[must_use]
    pub fn argument(&self, name: &str) -> Option<&str> {
        self.arguments.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn arguments(&self) -> &HashMap<String, String> {
        &self.arguments
    }

    /// Parse the whole body as JSON.
    pub fn json_body<T: serde::de::DeserializeOwned>(&self) -> anyhow::Result<T> {
        Ok(serde_json::from_slice(self.request.body())?)
    }

    /// Read the next body chunk of at most `len` bytes.
    ///
    /// `len` above the configured chunk limit fails without touching the body.
    pub fn body_read(&mut self, len: usize) -> Result<Vec<u8>, DispatchError> {
        if len > self.body_chunk_limit {
            return Err(DispatchError::BodyReadTooLarge {
                requested: len,
                limit: self.body_chunk_limit,
            });
        }
        self.request.read_body(len)
    }

    /// Set a response header. The dispatcher won't override a `content-type`
    /// set here.
    pub fn set_header(&mut self, name: &str, value: &str) {
        self.header_names.push(name.to_ascii_lowercase());
        self.request.set_response_header(name, value);
    }

    pub(crate) fn has_header(&self, name: &str) -> bool {
        self.header_names.iter().any(|n| n == name)
    }

    /// Scratch value stored by an earlier callback.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.scratch.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.scratch.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.scratch.remove(key)
    }

    /// Build a path for a named route.
    pub fn url_for(&self, name: &str, args: impl Into<PathArgs>) -> Result<String, RouterError> {
        self.routes.reverse(name, args)
    }

    /// Set `location` and return a `302` with an empty body.
    pub fn redirect(&mut self, location: &str) -> ReturnValue {
        debug!(request_id = %self.request_id, location = %location, "Redirecting");
        self.set_header("location", location);
        ReturnValue::with_status(302, "")
    }
}
