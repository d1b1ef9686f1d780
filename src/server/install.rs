use std::fmt;

use crate::dispatcher::BoundHandler;
use crate::router::{Method, ParamRules};
use crate::security::AuthDescriptor;

/// One built route as handed to a host transport.
///
/// `handler` runs the full dispatch pipeline for this route (auth gate,
/// callbacks, handler, normalization); the transport only has to call it.
#[derive(Clone)]
pub struct Registration {
    pub domain: Option<String>,
    /// Normalized path expression, unanchored.
    pub pattern: String,
    pub handler: BoundHandler,
    pub methods: Vec<Method>,
    pub params: ParamRules,
    pub auth: Option<AuthDescriptor>,
    pub key: Option<String>,
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("domain", &self.domain)
            .field("pattern", &self.pattern)
            .field("methods", &self.methods)
            .field("params", &self.params)
            .field("auth", &self.auth)
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

/// Receives built routes from [`crate::dispatcher::Dispatcher::install`].
pub trait RouteInstaller {
    fn install(&mut self, registration: Registration) -> anyhow::Result<()>;
}

/// Collects registrations, mostly useful in tests and for dumping.
impl RouteInstaller for Vec<Registration> {
    fn install(&mut self, registration: Registration) -> anyhow::Result<()> {
        self.push(registration);
        Ok(())
    }
}
