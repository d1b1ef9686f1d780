//! # Security Module
//!
//! Per-route authentication for routeweave.
//!
//! ## Overview
//!
//! An [`AuthBinding`] says where a credential lives on the request (a header
//! or a cookie), how to verify it, and where to send a caller that fails
//! verification. Bindings are registered once under a name in an
//! [`AuthRegistry`] and referenced from routes by that name, or attached to
//! a single route inline.
//!
//! ## Flow
//!
//! 1. The route is resolved and its effective binding looked up
//! 2. [`AuthGate::check`] extracts the credential from the request
//! 3. A missing credential is denied without calling the verifier
//! 4. The verifier decides; `true` lets the request continue
//! 5. A denial becomes a 302 to the redirect target, or a bare 403
//!
//! A denied request never reaches before-callbacks, the handler,
//! after-callbacks or error handlers.
//!
//! ## Example
//!
//! ```rust
//! use routeweave::security::{AuthBinding, AuthRegistry};
//! use routeweave::server::TransportRequest;
//!
//! let mut registry = AuthRegistry::new();
//! registry.register(
//!     "api",
//!     AuthBinding::header("x-api-key", |_req: &dyn TransportRequest, key: &str| key == "secret")
//!         .with_redirect("/login"),
//! );
//! assert!(registry.get("api").is_some());
//! ```

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::server::TransportRequest;

/// Where an auth credential is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthKind {
    Header,
    Cookie,
}

impl AuthKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthKind::Header => "header",
            AuthKind::Cookie => "cookie",
        }
    }
}

impl fmt::Display for AuthKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "header" => Ok(AuthKind::Header),
            "cookie" => Ok(AuthKind::Cookie),
            other => Err(format!("unknown auth kind `{other}`, expected header or cookie")),
        }
    }
}

/// Decides whether an extracted credential is acceptable.
///
/// Implemented for any `Fn(&dyn TransportRequest, &str) -> bool`.
pub trait AuthVerifier: Send + Sync {
    fn verify(&self, req: &dyn TransportRequest, credential: &str) -> bool;
}

impl<F> AuthVerifier for F
where
    F: Fn(&dyn TransportRequest, &str) -> bool + Send + Sync,
{
    fn verify(&self, req: &dyn TransportRequest, credential: &str) -> bool {
        self(req, credential)
    }
}

/// Credential location, verifier and optional redirect target.
#[derive(Clone)]
pub struct AuthBinding {
    kind: AuthKind,
    source: String,
    verify: Arc<dyn AuthVerifier>,
    redirect: Option<String>,
}

impl AuthBinding {
    pub fn new(kind: AuthKind, source: impl Into<String>, verify: impl AuthVerifier + 'static) -> Self {
        Self {
            kind,
            source: source.into(),
            verify: Arc::new(verify),
            redirect: None,
        }
    }

    /// Read the credential from the named request header.
    pub fn header(name: impl Into<String>, verify: impl AuthVerifier + 'static) -> Self {
        Self::new(AuthKind::Header, name, verify)
    }

    /// Read the credential from the named cookie.
    pub fn cookie(name: impl Into<String>, verify: impl AuthVerifier + 'static) -> Self {
        Self::new(AuthKind::Cookie, name, verify)
    }

    /// Send denied callers to `location` with a 302 instead of a 403.
    #[must_use]
    pub fn with_redirect(mut self, location: impl Into<String>) -> Self {
        self.redirect = Some(location.into());
        self
    }

    #[must_use]
    pub fn kind(&self) -> AuthKind {
        self.kind
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    #[must_use]
    pub fn redirect(&self) -> Option<&str> {
        self.redirect.as_deref()
    }

    /// Shared handle on the verifier, for transports that enforce auth themselves.
    #[must_use]
    pub fn verifier(&self) -> Arc<dyn AuthVerifier> {
        Arc::clone(&self.verify)
    }

    /// Serializable view of the binding (everything but the verifier).
    #[must_use]
    pub fn descriptor(&self) -> AuthDescriptor {
        AuthDescriptor {
            kind: self.kind,
            source: self.source.clone(),
            redirect: self.redirect.clone(),
        }
    }

    fn extract<'r>(&self, req: &'r dyn TransportRequest) -> Option<&'r str> {
        match self.kind {
            AuthKind::Header => req.header(&self.source),
            AuthKind::Cookie => req.cookie(&self.source),
        }
    }
}

impl fmt::Debug for AuthBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthBinding")
            .field("kind", &self.kind)
            .field("source", &self.source)
            .field("redirect", &self.redirect)
            .finish_non_exhaustive()
    }
}

/// The parts of an [`AuthBinding`] a host transport can print or forward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthDescriptor {
    pub kind: AuthKind,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect: Option<String>,
}

/// Named auth bindings shared by routes.
#[derive(Debug, Clone, Default)]
pub struct AuthRegistry {
    entries: HashMap<String, AuthBinding>,
}

impl AuthRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `binding` under `name`, replacing any previous entry.
    pub fn register(&mut self, name: impl Into<String>, binding: AuthBinding) {
        let name = name.into();
        if self.entries.contains_key(&name) {
            warn!(auth = %name, "Replacing previously registered auth binding");
        }
        self.entries.insert(name, binding);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&AuthBinding> {
        self.entries.get(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Why a request was turned away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Denial {
    /// 302 with a `location` header.
    Redirect(String),
    /// Bare 403.
    Forbidden,
}

impl Denial {
    #[must_use]
    pub fn status(&self) -> u16 {
        match self {
            Denial::Redirect(_) => 302,
            Denial::Forbidden => 403,
        }
    }
}

/// Result of an auth check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    Allowed,
    Denied(Denial),
}

/// Applies an [`AuthBinding`] to a request.
pub struct AuthGate;

impl AuthGate {
    /// Extract the credential and run the verifier.
    ///
    /// A missing credential is denied before the verifier runs.
    pub fn check(binding: &AuthBinding, req: &dyn TransportRequest) -> AuthOutcome {
        let allowed = match binding.extract(req) {
            Some(credential) => binding.verify.verify(req, credential),
            None => {
                debug!(kind = %binding.kind, source = %binding.source, "Auth credential missing");
                false
            }
        };
        if allowed {
            return AuthOutcome::Allowed;
        }
        AuthOutcome::Denied(match &binding.redirect {
            Some(location) => Denial::Redirect(location.clone()),
            None => Denial::Forbidden,
        })
    }
}
