//! Startup error types.
//!
//! Everything here is fatal: a [`StartupError`] means the configuration
//! could not be turned into a running gateway, and the process exits with a
//! single diagnostic before the listener binds. Request-time failures never
//! surface here — filters and terminals convert them into HTTP responses.

use gatehouse_core::LoadError;
use thiserror::Error;

/// Failure while assembling the gateway from a validated configuration.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Load(#[from] LoadError),

    /// A route references a filter name that is in no catalog.
    #[error("unknown or unsupported middleware '{0}'")]
    UnknownMiddleware(String),

    /// A route references a middleware group that is not declared.
    #[error("unknown middleware group '{0}'")]
    UnknownMiddlewareGroup(String),

    /// Validated configs never carry these, so hitting either means the
    /// config was built programmatically and skipped validation.
    #[error("invalid http method '{0}' in compiled route")]
    InvalidMethod(String),
    #[error("invalid redirect code {0} in compiled route")]
    InvalidRedirectCode(u16),

    #[error("could not read CA certificate '{path}': {source}")]
    CaCertRead {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid CA certificate '{path}': {reason}")]
    CaCertInvalid { path: String, reason: String },

    #[error("failed to build http client for forward auth '{name}': {source}")]
    AuthClient {
        name: String,
        source: reqwest::Error,
    },

    #[error("failed to build upstream http client: {0}")]
    ProxyClient(#[source] reqwest::Error),

    #[error("invalid bind address '{0}'")]
    InvalidBindAddress(String),

    #[error("failed to load TLS certificate/key: {0}")]
    Tls(#[source] std::io::Error),

    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Convenience alias for startup paths.
pub type StartupResult<T> = Result<T, StartupError>;
