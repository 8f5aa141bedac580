//! Cross-field validation for the configuration model.
//!
//! Validation walks routes, domain routes, rate limiters, forward-auth
//! entries, and the env block in that order and stops at the *first*
//! failure. The diagnostic strings are part of the user-visible contract:
//! operators grep for them, so they are fixed here and asserted verbatim by
//! the tests below.

use super::{
    DomainRouteConfig, ForwardAuthConfig, GatewayConfig, PathConfig, RateLimitConfig, RouteConfig,
    VALID_METHODS, VALID_REDIRECT_CODES,
};
use std::fmt;
use thiserror::Error;

/// Which level of a route declaration a diagnostic refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteScope {
    Base,
    Path,
}

impl fmt::Display for RouteScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteScope::Base => f.write_str("base"),
            RouteScope::Path => f.write_str("path"),
        }
    }
}

/// First validation failure found in a configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("prefix is missing for base route")]
    MissingPrefix,

    #[error("{0} route with both 'proxy_target' and 'redirect_target' defined is not allowed")]
    BothTargets(RouteScope),

    #[error("{0} route with 'proxy_target' and 'redirect_code' defined is not allowed")]
    ProxyWithRedirectCode(RouteScope),

    #[error("'redirect_code' defined without a corresponding 'redirect_target' in {0} route")]
    CodeWithoutTarget(RouteScope),

    #[error("defining 'redirect_target' in {0} route without defining 'redirect_code' is not allowed")]
    TargetWithoutCode(RouteScope),

    #[error("invalid 'redirect_code' {1} for {0} route")]
    InvalidRedirectCode(RouteScope, u16),

    #[error("found invalid http method '{0}' in a route")]
    InvalidRouteMethod(String),

    #[error("found invalid http method '{0}' in a route path")]
    InvalidPathMethod(String),

    #[error("path route under prefix '{0}' is missing a 'path'")]
    MissingPath(String),

    #[error("base route with defined 'proxy_target' url is not allowed to have paths")]
    ProxyRouteWithPaths,

    #[error("base route with defined 'redirect_target' url is not allowed to have paths")]
    RedirectRouteWithPaths,

    #[error("'proxy_target' or 'redirect_target' url is missing for route with no paths")]
    MissingTarget,

    #[error(
        "found base route with path route that have both no 'proxy_target' or 'redirect_target' defined"
    )]
    PathMissingTarget,

    #[error("http method is missing for a route with no paths")]
    MissingMethod,

    #[error("http method should not be specified both at route and path level")]
    MethodAtBothLevels,

    #[error("path '{0}' has no http method and its base route also has no method")]
    PathMissingMethod(String),

    #[error("field 'domain' is missing for domain route")]
    MissingDomain,

    #[error("field 'proxy_target' is missing for domain route")]
    MissingDomainTarget,

    #[error("'algorithm' field is not specified for rate limiter")]
    MissingAlgorithm,

    #[error("unknown rate limit algorithm '{0}' specified")]
    UnknownAlgorithm(String),

    #[error("wrong option '{option}' is specified for rate limiter '{algorithm}'")]
    WrongOption {
        algorithm: &'static str,
        option: &'static str,
    },

    #[error("'{0}' must be a positive integer")]
    NonPositiveInteger(&'static str),

    #[error("'{0}' must be a positive duration")]
    NonPositiveDuration(&'static str),

    #[error("required field 'url' is missing for forward auth middleware")]
    MissingAuthUrl,
}

fn is_set(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|s| !s.is_empty())
}

fn valid_method(method: &str) -> bool {
    VALID_METHODS.contains(&method)
}

fn valid_redirect_code(code: u16) -> bool {
    VALID_REDIRECT_CODES.contains(&code)
}

impl GatewayConfig {
    /// Validate every route, domain route, rate limiter, forward-auth entry,
    /// and the env block, returning the first failure.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for route in &self.routes {
            route.validate()?;
        }
        for domain in &self.domain_routes {
            domain.validate()?;
        }
        for limiter in self.rate_limiters.values() {
            limiter.validate()?;
        }
        for auth in self.forward_auth.values() {
            auth.validate()?;
        }
        Ok(())
    }
}

impl RouteConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !is_set(&self.prefix) {
            return Err(ValidationError::MissingPrefix);
        }

        let proxy = is_set(&self.proxy_target);
        let redirect = is_set(&self.redirect_target);

        if proxy && redirect {
            return Err(ValidationError::BothTargets(RouteScope::Base));
        }
        if proxy && self.redirect_code.is_some() {
            return Err(ValidationError::ProxyWithRedirectCode(RouteScope::Base));
        }
        if self.redirect_code.is_some() && !redirect {
            return Err(ValidationError::CodeWithoutTarget(RouteScope::Base));
        }
        if redirect && self.redirect_code.is_none() {
            return Err(ValidationError::TargetWithoutCode(RouteScope::Base));
        }
        if let Some(code) = self.redirect_code {
            if !valid_redirect_code(code) {
                return Err(ValidationError::InvalidRedirectCode(RouteScope::Base, code));
            }
        }
        if let Some(method) = &self.method {
            if !valid_method(method) {
                return Err(ValidationError::InvalidRouteMethod(method.clone()));
            }
        }

        if self.paths.is_empty() {
            if !proxy && !redirect {
                return Err(ValidationError::MissingTarget);
            }
            if self.method.is_none() {
                return Err(ValidationError::MissingMethod);
            }
            return Ok(());
        }

        if proxy {
            return Err(ValidationError::ProxyRouteWithPaths);
        }
        if redirect {
            return Err(ValidationError::RedirectRouteWithPaths);
        }

        let prefix = self.prefix.as_deref().unwrap_or_default();
        for path in &self.paths {
            path.validate(prefix, self.method.as_deref())?;
        }
        Ok(())
    }
}

impl PathConfig {
    fn validate(&self, prefix: &str, route_method: Option<&str>) -> Result<(), ValidationError> {
        if !is_set(&self.path) {
            return Err(ValidationError::MissingPath(prefix.to_string()));
        }

        let proxy = is_set(&self.proxy_target);
        let redirect = is_set(&self.redirect_target);

        if proxy && redirect {
            return Err(ValidationError::BothTargets(RouteScope::Path));
        }
        if !proxy && !redirect {
            return Err(ValidationError::PathMissingTarget);
        }
        if proxy && self.redirect_code.is_some() {
            return Err(ValidationError::ProxyWithRedirectCode(RouteScope::Path));
        }
        if redirect && self.redirect_code.is_none() {
            return Err(ValidationError::TargetWithoutCode(RouteScope::Path));
        }
        if let Some(code) = self.redirect_code {
            if !valid_redirect_code(code) {
                return Err(ValidationError::InvalidRedirectCode(RouteScope::Path, code));
            }
        }

        match (&self.method, route_method) {
            (Some(_), Some(_)) => return Err(ValidationError::MethodAtBothLevels),
            (Some(method), None) => {
                if !valid_method(method) {
                    return Err(ValidationError::InvalidPathMethod(method.clone()));
                }
            }
            (None, None) => {
                return Err(ValidationError::PathMissingMethod(
                    self.path.clone().unwrap_or_default(),
                ));
            }
            (None, Some(_)) => {}
        }
        Ok(())
    }
}

impl DomainRouteConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !is_set(&self.domain) {
            return Err(ValidationError::MissingDomain);
        }
        if !is_set(&self.proxy_target) {
            return Err(ValidationError::MissingDomainTarget);
        }
        for path in &self.paths {
            if let Some(method) = &path.method {
                if !valid_method(method) {
                    return Err(ValidationError::InvalidPathMethod(method.clone()));
                }
            }
        }
        Ok(())
    }
}

impl RateLimitConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let algorithm = match self.algorithm.as_deref() {
            None | Some("") => return Err(ValidationError::MissingAlgorithm),
            Some(a) => a,
        };

        match algorithm {
            "fixed_window_counter" => {
                if self.capacity.is_some() {
                    return Err(ValidationError::WrongOption {
                        algorithm: "fixed_window_counter",
                        option: "capacity",
                    });
                }
                if self.refill_tokens.is_some() {
                    return Err(ValidationError::WrongOption {
                        algorithm: "fixed_window_counter",
                        option: "refill_tokens",
                    });
                }
                if self.refill_interval.is_some() {
                    return Err(ValidationError::WrongOption {
                        algorithm: "fixed_window_counter",
                        option: "refill_interval",
                    });
                }
                if self.limit.unwrap_or(0) <= 0 {
                    return Err(ValidationError::NonPositiveInteger("limit"));
                }
                if self.window_size.unwrap_or_default().is_zero() {
                    return Err(ValidationError::NonPositiveDuration("window_size"));
                }
            }
            "token_bucket" => {
                if self.limit.is_some() {
                    return Err(ValidationError::WrongOption {
                        algorithm: "token_bucket",
                        option: "limit",
                    });
                }
                if self.window_size.is_some() {
                    return Err(ValidationError::WrongOption {
                        algorithm: "token_bucket",
                        option: "window_size",
                    });
                }
                if self.capacity.unwrap_or(0) <= 0 {
                    return Err(ValidationError::NonPositiveInteger("capacity"));
                }
                if self.refill_tokens.unwrap_or(0) <= 0 {
                    return Err(ValidationError::NonPositiveInteger("refill_tokens"));
                }
                if self.refill_interval.unwrap_or_default().is_zero() {
                    return Err(ValidationError::NonPositiveDuration("refill_interval"));
                }
            }
            other => return Err(ValidationError::UnknownAlgorithm(other.to_string())),
        }
        Ok(())
    }
}

impl ForwardAuthConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !is_set(&self.url) {
            return Err(ValidationError::MissingAuthUrl);
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
