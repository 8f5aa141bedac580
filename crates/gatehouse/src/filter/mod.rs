//! Policy filter contract and chain composition.
//!
//! A [`PolicyFilter`] inspects the in-flight request and either lets it
//! continue or halts the chain with a response of its own. Filters run in
//! strict declaration order (group members before standalone members, route
//! filters before path filters); the terminal action only runs when every
//! filter continued.
//!
//! Filters that need to decorate the *final* response — whichever handler
//! produces it — record headers and cookies on the [`ResponseOverlay`]; the
//! dispatcher applies the overlay exactly once, to halted responses and
//! terminal responses alike.

mod forward_auth;
mod no_cache;
mod rate_limit;
mod registry;

pub use forward_auth::ForwardAuthFilter;
pub use no_cache::NoCacheFilter;
pub use rate_limit::RateLimitFilter;
pub use registry::FilterRegistry;

use async_trait::async_trait;
use axum::extract::{ConnectInfo, Request};
use axum::http::header::{HeaderName, HeaderValue, HOST, SET_COOKIE};
use axum::response::Response;
use std::net::SocketAddr;
use std::sync::Arc;

// ─────────────────────────────────────────────────────────────────────────────
// Request context
// ─────────────────────────────────────────────────────────────────────────────

/// Mutable state that flows through the filter chain for a single request.
pub struct RequestContext {
    /// The in-flight request. Filters may replace the body (forward-auth
    /// buffers and restores it) but must leave the request usable for the
    /// terminal action.
    pub request: Request,
    /// Client address, derived from forwarding headers or the socket peer.
    pub client_ip: String,
    /// The inbound `Host` value, captured before any rewrite.
    pub host: String,
    /// `"http"` or `"https"`, depending on whether the listener terminates TLS.
    pub scheme: &'static str,
    /// Headers and cookies stamped onto the final response.
    pub overlay: ResponseOverlay,
}

impl RequestContext {
    pub fn new(request: Request, tls: bool) -> Self {
        let host = request
            .headers()
            .get(HOST)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .or_else(|| request.uri().authority().map(|a| a.to_string()))
            .unwrap_or_default();
        let client_ip = client_ip(&request);
        Self {
            request,
            client_ip,
            host,
            scheme: if tls { "https" } else { "http" },
            overlay: ResponseOverlay::default(),
        }
    }
}

/// Best-effort client address: first `X-Forwarded-For` hop, then
/// `X-Real-Ip`, then the socket peer recorded by the listener.
fn client_ip(request: &Request) -> String {
    for header in ["x-forwarded-for", "x-real-ip"] {
        if let Some(value) = request.headers().get(header).and_then(|v| v.to_str().ok()) {
            let first = value.split(',').next().unwrap_or_default().trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }
    if let Some(ConnectInfo(addr)) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        return addr.ip().to_string();
    }
    "unknown".to_string()
}

// ─────────────────────────────────────────────────────────────────────────────
// Response overlay
// ─────────────────────────────────────────────────────────────────────────────

/// Headers and `Set-Cookie` values applied to whatever response ultimately
/// leaves the gateway for this request.
#[derive(Debug, Default)]
pub struct ResponseOverlay {
    headers: Vec<(HeaderName, HeaderValue)>,
    cookies: Vec<HeaderValue>,
}

impl ResponseOverlay {
    /// Record a header; applied with set semantics (last write wins).
    pub fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.push((name, value));
    }

    /// Record a `Set-Cookie` value; cookies accumulate.
    pub fn add_cookie(&mut self, value: HeaderValue) {
        self.cookies.push(value);
    }

    /// Stamp the recorded headers and cookies onto `response`.
    pub fn apply(&self, response: &mut Response) {
        for (name, value) in &self.headers {
            response.headers_mut().insert(name.clone(), value.clone());
        }
        for cookie in &self.cookies {
            response.headers_mut().append(SET_COOKIE, cookie.clone());
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Filter contract
// ─────────────────────────────────────────────────────────────────────────────

/// Outcome of a single filter.
pub enum FilterDecision {
    /// Pass control to the next filter (or the terminal action).
    Continue,
    /// Short-circuit the chain with this response. The overlay is still
    /// applied to it.
    Halt(Response),
}

/// A single policy filter in a route's chain.
///
/// Implementations are shared across routes and requests via `Arc`, so all
/// per-request state lives in the [`RequestContext`].
#[async_trait]
pub trait PolicyFilter: Send + Sync + std::fmt::Debug {
    /// Stable identifier used in logs.
    fn name(&self) -> &str;

    /// Inspect (and possibly mutate) the request.
    async fn apply(&self, ctx: &mut RequestContext) -> FilterDecision;
}

// ─────────────────────────────────────────────────────────────────────────────
// Filter chain
// ─────────────────────────────────────────────────────────────────────────────

/// Ordered list of filters executed front to back.
#[derive(Clone, Default, Debug)]
pub struct FilterChain {
    filters: Vec<Arc<dyn PolicyFilter>>,
}

impl FilterChain {
    pub fn new(filters: Vec<Arc<dyn PolicyFilter>>) -> Self {
        Self { filters }
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Name of the filter at `index`.
    pub fn filter_name(&self, index: usize) -> Option<&str> {
        self.filters.get(index).map(|filter| filter.name())
    }

    /// A new chain running `self` first, then `tail` — how a path's chain is
    /// appended to its route's chain.
    pub fn concat(&self, tail: &FilterChain) -> FilterChain {
        let mut filters = self.filters.clone();
        filters.extend(tail.filters.iter().cloned());
        FilterChain { filters }
    }

    /// Run every filter in order; the first halt wins.
    pub async fn run(&self, ctx: &mut RequestContext) -> Option<Response> {
        for filter in &self.filters {
            if let FilterDecision::Halt(response) = filter.apply(ctx).await {
                tracing::debug!(filter = filter.name(), "filter halted request");
                return Some(response);
            }
        }
        None
    }
}

// =============================================================================
// Tests
// =============================================================================
