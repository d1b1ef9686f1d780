//! # Error Module
//!
//! Error taxonomy for routeweave.
//!
//! - [`RouterError`] covers everything raised while configuring routes
//!   (pattern compilation, registration, build, finalize) and while building
//!   URLs in reverse. Configuration errors are always fatal and synchronous.
//! - [`DispatchError`] covers request-time failures that escape the callback
//!   chains: unmatched handler errors, return values that cannot be turned
//!   into a response, and transport failures.
//!
//! Auth denial is not an error. It is a designed dispatch outcome and never
//! surfaces through these types.

use thiserror::Error;

use crate::router::Method;

/// Configuration-time and reverse-lookup errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouterError {
    /// A capture segment named a converter that is not registered.
    #[error("the converter `{converter}` is not a registered path converter, accepted values are: {allowed}")]
    UnknownConverter {
        /// Converter name used in the template
        converter: String,
        /// Comma separated list of registered converter names
        allowed: String,
    },

    /// A capture segment could not be split into name / converter / expression.
    #[error("the path segment `{segment}` could not be analyzed: {reason}")]
    MalformedSegment {
        /// The raw segment text between `<` and `>`
        segment: String,
        /// Why the segment was rejected
        reason: &'static str,
    },

    /// The same capture name appears twice in one template.
    #[error("capture `{name}` appears more than once in `{template}`")]
    DuplicateCapture {
        /// Repeated capture name
        name: String,
        /// Template being compiled
        template: String,
    },

    /// The assembled expression (usually an inline `re` capture) does not compile.
    #[error("path template `{template}` produced an invalid expression: {reason}")]
    InvalidPattern {
        /// Template being compiled
        template: String,
        /// Message from the regex engine
        reason: String,
    },

    /// A method outside the allowed vocabulary was requested.
    #[error("method `{0}` not allowed, expected one of: get, put, patch, post, delete, options, head")]
    UnknownMethod(String),

    /// Two routes share the same (domain, path, method) identity.
    #[error("a route with the same domain, path and method is already registered: {domain}:{path} [{method}]")]
    DuplicateRoute {
        /// Domain of the colliding route (`*` when unset)
        domain: String,
        /// Raw or compiled path of the colliding route
        path: String,
        /// Method of the colliding route
        method: Method,
    },

    /// One route name was given to two different templates.
    #[error("route name `{name}` is already bound to `{existing}`, can't also bind it to `{path}`")]
    DuplicateName {
        /// The shared route name
        name: String,
        /// Template (and domain, when set) the name was first bound to
        existing: String,
        /// Template (and domain, when set) of the rejected route
        path: String,
    },

    /// Registration attempted after the application was finalized.
    #[error("can't call `{0}` after finishing the application setup")]
    AlreadyFinalized(&'static str),

    /// A route references an auth entry that was never registered.
    #[error("route `{route}` references unknown auth `{auth}`")]
    UnknownAuth {
        /// Route name or raw path
        route: String,
        /// Missing auth registry name
        auth: String,
    },

    /// No route carries the requested name.
    #[error("can't find route for `{0}`")]
    NotFound(String),

    /// Reverse building was missing a value for a capture.
    #[error("can't build path, `{0}` is required")]
    MissingPathArgument(String),

    /// Reverse building got a value that does not satisfy the capture expression.
    #[error("can't build path as `{value}` does not match `{expression}` for `{name}`")]
    PathArgumentMismatch {
        /// Capture name
        name: String,
        /// Stringified value
        value: String,
        /// Capture expression
        expression: String,
    },
}

/// Request-time failures that leave the dispatch pipeline.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// A handler error no error handler resolved.
    #[error("unhandled handler error: {0:#}")]
    Handler(anyhow::Error),

    /// A return value could not be converted to (status, bytes).
    #[error("can't parse return value of type `{type_name}`: {reason}")]
    UnparsableReturnValue {
        /// Name of the offending value's kind
        type_name: &'static str,
        /// What went wrong
        reason: String,
    },

    /// Incremental body read above the fixed chunk bound.
    #[error("length can't be more than {limit}, requested {requested}")]
    BodyReadTooLarge {
        /// Requested chunk size
        requested: usize,
        /// Allowed chunk size
        limit: usize,
    },

    /// The transport reported a failure.
    #[error("transport error: {0}")]
    Transport(String),
}

impl DispatchError {
    pub(crate) fn unparsable(type_name: &'static str, reason: impl Into<String>) -> Self {
        DispatchError::UnparsableReturnValue {
            type_name,
            reason: reason.into(),
        }
    }
}
