//! Compiled route records.
//!
//! A [`CompiledRoute`] is the executable form of a route declaration after
//! validation, filter resolution, and pattern synthesis: built once at
//! startup, registered with the router, never mutated afterward.

mod compile;

pub use compile::compile;

use crate::filter::FilterChain;
use axum::http::{Method, StatusCode};

/// What runs after the filter chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteAction {
    /// Forward to an upstream origin. `fixed_path` is the literal path
    /// segment a path-under-prefix route contributes to the outgoing path.
    Proxy { target: String, fixed_path: String },
    /// Answer with `code` and a `Location` header.
    Redirect { target: String, code: StatusCode },
}

/// A prefix route bound to a method, a registration pattern, a filter chain,
/// and a terminal action.
#[derive(Debug)]
pub struct CompiledRoute {
    pub method: Method,
    pub prefix: String,
    /// Pattern registered with the router (`/{*path}` wildcard syntax). For
    /// the root-fallback case this is just the declared prefix.
    pub pattern: String,
    pub chain: FilterChain,
    pub action: RouteAction,
}

impl CompiledRoute {
    /// Proxy routes whose prefix is `/` (or empty) are not registered under
    /// a pattern — they take the router's no-match slot instead.
    pub fn is_root_fallback(&self) -> bool {
        matches!(self.action, RouteAction::Proxy { .. })
            && (self.prefix.is_empty() || self.prefix == "/")
    }

    /// The fixed path segment this route contributes to outgoing paths.
    pub fn fixed_path(&self) -> &str {
        match &self.action {
            RouteAction::Proxy { fixed_path, .. } => fixed_path,
            RouteAction::Redirect { .. } => "",
        }
    }
}

/// A Host-selected route scanned by the no-match fallback.
#[derive(Debug)]
pub struct CompiledDomainRoute {
    pub domain: String,
    pub proxy_target: String,
    pub chain: FilterChain,
    pub paths: Vec<CompiledDomainPath>,
}

/// Per-path filter refinement inside a domain route. `method: None` matches
/// any method.
#[derive(Debug)]
pub struct CompiledDomainPath {
    pub path: String,
    pub method: Option<Method>,
    pub chain: FilterChain,
}

/// Everything the dispatcher binds to the HTTP router.
#[derive(Debug)]
pub struct RouteTable {
    pub routes: Vec<CompiledRoute>,
    pub domains: Vec<CompiledDomainRoute>,
}
