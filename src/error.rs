//! Error types for the ingress layer.
//!
//! Configuration problems (`RouteError`) are raised while compiling a site and
//! are fatal at startup. `IpResolutionError` and `RequestError` are per-request.

use thiserror::Error;

/// Errors raised while compiling path templates or entry-point prefixes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    /// A template was empty.
    #[error("route template is empty")]
    EmptyTemplate,

    /// A template did not begin with `/`.
    #[error("route template '{0}' must begin with a slash")]
    MissingLeadingSlash(String),

    /// A `$` was not followed by a placeholder name.
    #[error("route template '{template}' has a '$' without a name at offset {offset}")]
    DanglingPlaceholder { template: String, offset: usize },

    /// Two placeholders with no literal text between them.
    #[error("route template '{0}' has adjacent placeholders")]
    AdjacentPlaceholders(String),

    /// A parameter value or constraint names a placeholder the template lacks.
    #[error("route template '{template}' has no placeholder '${name}'")]
    UnknownPlaceholder { template: String, name: String },

    /// A regex constraint failed to compile.
    #[error("invalid constraint for '${name}': {reason}")]
    InvalidConstraint { name: String, reason: String },

    /// An article-style path setting lacks the `$1` title placeholder.
    #[error("{setting} must contain '$1' (got '{template}')")]
    MissingTitlePlaceholder { setting: String, template: String },

    /// A non-default entry point was configured with an empty path.
    #[error("entry point '{0}' has an empty path; only the default entry point's path can be empty")]
    EmptyEntryPointPrefix(String),
}

/// Errors raised while resolving the client address of a request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IpResolutionError {
    /// No usable remote address was provided by the transport.
    #[error("unable to determine IP: no remote address")]
    Missing,

    /// The transport's remote address held more than one value.
    #[error("could not determine the remote IP address due to multiple values: '{0}'")]
    MultipleRemoteAddresses(String),

    /// The forwarded-for chain broke while still inside our own proxies.
    #[error("invalid IP given in XFF '{0}'")]
    InvalidForwardedFor(String),

    /// Traversal ended without a usable address.
    #[error("unable to determine IP")]
    Unresolvable,
}

impl IpResolutionError {
    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Missing => "missing",
            Self::MultipleRemoteAddresses(_) => "multiple_remote_addresses",
            Self::InvalidForwardedFor(_) => "invalid_forwarded_for",
            Self::Unresolvable => "unresolvable",
        }
    }
}

/// Errors raised by `WebRequest` operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    /// The transport carried neither REQUEST_URI, X-Original-URL nor SCRIPT_NAME.
    #[error("web server doesn't provide either REQUEST_URI, X-Original-URL or SCRIPT_NAME")]
    NoRequestUrl,

    #[error(transparent)]
    Ip(#[from] IpResolutionError),
}

/// Errors raised when handing a request to an entry point.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// No handler is registered under the detected entry-point name.
    #[error("no handler registered for entry point '{0}'")]
    UnknownEntryPoint(String),

    #[error(transparent)]
    Request(#[from] RequestError),
}
