use std::collections::HashMap;

use crate::error::DispatchError;
use crate::server::response::RecordedResponse;

/// What the dispatcher needs from a host transport's request object.
///
/// Header lookups are case-insensitive. `respond` is called exactly once
/// per dispatched request.
pub trait TransportRequest {
    fn method(&self) -> &str;

    /// Request path without the query string.
    fn path(&self) -> &str;

    fn host(&self) -> Option<&str> {
        self.header("host")
    }

    fn header(&self, name: &str) -> Option<&str>;

    fn cookie(&self, name: &str) -> Option<&str>;

    fn query(&self, name: &str) -> Option<&str>;

    /// Raw query string, without the leading `?`. Empty when there is none.
    fn query_string(&self) -> &str;

    /// Full request body.
    fn body(&self) -> &[u8];

    /// Read the next chunk of at most `max` bytes. An empty chunk means the
    /// body is exhausted.
    fn read_body(&mut self, max: usize) -> Result<Vec<u8>, DispatchError>;

    fn set_response_header(&mut self, name: &str, value: &str);

    fn respond(&mut self, status: u16, body: Vec<u8>);
}

/// Parse the `Cookie` header value into name/value pairs.
#[must_use]
pub fn parse_cookies(header: &str) -> HashMap<String, String> {
    header
        .split(';')
        .filter_map(|pair| {
            let (name, value) = pair.trim().split_once('=').unwrap_or((pair.trim(), ""));
            let name = name.trim();
            (!name.is_empty()).then(|| (name.to_string(), value.trim().to_string()))
        })
        .collect()
}

/// Split a raw target into its path and decoded query parameters.
#[must_use]
pub fn parse_query_params(target: &str) -> (&str, HashMap<String, String>) {
    match target.split_once('?') {
        Some((path, query)) => (
            path,
            url::form_urlencoded::parse(query.as_bytes())
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect(),
        ),
        None => (target, HashMap::new()),
    }
}

/// In-memory request that records whatever the dispatcher sends back.
#[derive(Debug, Clone, Default)]
pub struct MemoryRequest {
    method: String,
    path: String,
    raw_query: String,
    query: HashMap<String, String>,
    headers: Vec<(String, String)>,
    cookies: HashMap<String, String>,
    body: Vec<u8>,
    cursor: usize,
    pending_headers: Vec<(String, String)>,
    responses: Vec<RecordedResponse>,
}

impl MemoryRequest {
    /// `target` may carry a query string.
    pub fn new(method: impl Into<String>, target: &str) -> Self {
        let (path, query) = parse_query_params(target);
        Self {
            method: method.into(),
            path: path.to_string(),
            raw_query: target.split_once('?').map(|(_, q)| q.to_string()).unwrap_or_default(),
            query,
            ..Self::default()
        }
    }

    pub fn get(target: &str) -> Self {
        Self::new("GET", target)
    }

    pub fn post(target: &str) -> Self {
        Self::new("POST", target)
    }

    /// Add a header. `Cookie` headers are parsed and merged into the cookie jar.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        let name = name.to_ascii_lowercase();
        if name == "cookie" {
            self.cookies.extend(parse_cookies(value));
        }
        self.headers.push((name, value.to_string()));
        self
    }

    #[must_use]
    pub fn with_cookie(self, name: &str, value: &str) -> Self {
        self.with_header("cookie", &format!("{name}={value}"))
    }

    #[must_use]
    pub fn with_host(self, host: &str) -> Self {
        self.with_header("host", host)
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Every response sent for this request, in order.
    #[must_use]
    pub fn responses(&self) -> &[RecordedResponse] {
        &self.responses
    }

    /// The first response, if any was sent.
    #[must_use]
    pub fn response(&self) -> Option<&RecordedResponse> {
        self.responses.first()
    }
}

impl TransportRequest for MemoryRequest {
    fn method(&self) -> &str {
        &self.method
    }

    fn path(&self) -> &str {
        &self.path
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .rfind(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    fn query(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    fn query_string(&self) -> &str {
        &self.raw_query
    }

    fn body(&self) -> &[u8] {
        &self.body
    }

    fn read_body(&mut self, max: usize) -> Result<Vec<u8>, DispatchError> {
        let end = self.body.len().min(self.cursor.saturating_add(max));
        let chunk = self.body.get(self.cursor..end).unwrap_or_default().to_vec();
        self.cursor = end;
        Ok(chunk)
    }

    fn set_response_header(&mut self, name: &str, value: &str) {
        self.pending_headers.push((name.to_ascii_lowercase(), value.to_string()));
    }

    fn respond(&mut self, status: u16, body: Vec<u8>) {
        let headers = std::mem::take(&mut self.pending_headers);
        self.responses.push(RecordedResponse {
            status,
            headers,
            body,
        });
    }
}
