//! Dispatcher: binds compiled routes to the HTTP router.
//!
//! Each compiled route becomes an axum route under its method and pattern;
//! the handler runs the filter chain, then the terminal action, then applies
//! the response overlay. A single fallback handler owns the router's
//! no-match slot: it scans domain routes (Host-based selection) first, then
//! the root-prefix proxy route, and finally answers 404.

use crate::error::{StartupError, StartupResult};
use crate::filter::RequestContext;
use crate::proxy;
use crate::response::json_error;
use crate::route::{CompiledDomainRoute, CompiledRoute, RouteAction, RouteTable};
use axum::Json;
use axum::Router;
use axum::body::Body;
use axum::extract::Request;
use axum::http::header::{HOST, HeaderValue, LOCATION};
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{MethodFilter, on};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

/// Shared state available to every dispatched request.
#[derive(Clone)]
pub struct GatewayState {
    /// Long-lived upstream client. Redirects are never followed — 3xx from
    /// an upstream belongs to the caller.
    pub upstream: reqwest::Client,
    /// Whether the inbound listener terminates TLS.
    pub tls: bool,
}

impl GatewayState {
    pub fn new(tls: bool) -> StartupResult<Self> {
        let upstream = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(StartupError::ProxyClient)?;
        Ok(Self { upstream, tls })
    }
}

fn method_filter(method: &Method) -> StartupResult<MethodFilter> {
    MethodFilter::try_from(method.clone())
        .map_err(|_| StartupError::InvalidMethod(method.to_string()))
}

/// Build the axum router for a compiled route table.
pub fn build_router(table: RouteTable, state: GatewayState) -> StartupResult<Router> {
    let mut router = Router::new();
    let mut roots: Vec<Arc<CompiledRoute>> = Vec::new();

    for route in table.routes {
        let route = Arc::new(route);
        if route.is_root_fallback() {
            roots.push(route);
            continue;
        }
        info!(method = %route.method, pattern = %route.pattern, "registering route");
        let filter = method_filter(&route.method)?;
        let handler_state = state.clone();
        let handler_route = Arc::clone(&route);
        router = router.route(
            &route.pattern,
            on(filter, move |request: Request| {
                dispatch(handler_state.clone(), Arc::clone(&handler_route), request)
            }),
        );
    }

    if !table.domains.is_empty() {
        info!(domains = table.domains.len(), "registering domain fallback");
    }
    let domains = Arc::new(table.domains);
    let roots = Arc::new(roots);
    router = router.fallback(move |request: Request| {
        fallback(state.clone(), Arc::clone(&domains), Arc::clone(&roots), request)
    });
    Ok(router)
}

/// Run one compiled route: filters, then the terminal action, then the
/// overlay.
async fn dispatch(state: GatewayState, route: Arc<CompiledRoute>, request: Request) -> Response {
    info!(
        method = %request.method(),
        path = request.uri().path(),
        prefix = %route.prefix,
        "dispatching request"
    );

    let mut ctx = RequestContext::new(request, state.tls);
    if let Some(mut response) = route.chain.run(&mut ctx).await {
        ctx.overlay.apply(&mut response);
        return response;
    }

    let wildcard = wildcard_segment(
        &route.prefix,
        route.fixed_path(),
        ctx.request.uri().path(),
    );
    let RequestContext {
        request,
        host,
        overlay,
        ..
    } = ctx;

    let mut response = match &route.action {
        RouteAction::Proxy { target, fixed_path } => {
            proxy::forward(&state.upstream, target, fixed_path, &wildcard, request, &host).await
        }
        RouteAction::Redirect { target, code } => redirect(*code, target),
    };
    overlay.apply(&mut response);
    response
}

/// The `{*path}` capture: whatever follows the registered prefix and fixed
/// path. Root-fallback routes see the full inbound path.
fn wildcard_segment(prefix: &str, fixed_path: &str, path: &str) -> String {
    let base = match prefix {
        "" | "/" => fixed_path.to_string(),
        _ => format!("{prefix}{fixed_path}"),
    };
    if base.is_empty() {
        return path.to_string();
    }
    path.strip_prefix(&base).unwrap_or(path).to_string()
}

fn redirect(code: StatusCode, target: &str) -> Response {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = code;
    if let Ok(value) = HeaderValue::from_str(target) {
        response.headers_mut().insert(LOCATION, value);
    }
    response
}

/// No-match handler: domain routes in declaration order, then the
/// root-prefix proxy route, then 404.
async fn fallback(
    state: GatewayState,
    domains: Arc<Vec<CompiledDomainRoute>>,
    roots: Arc<Vec<Arc<CompiledRoute>>>,
    request: Request,
) -> Response {
    let host = request
        .headers()
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let domain = host.split(':').next().unwrap_or_default().to_string();

    if let Some(route) = domains.iter().find(|route| route.domain == domain) {
        return dispatch_domain(state, route, request).await;
    }

    if let Some(route) = roots.iter().find(|route| route.method == *request.method()) {
        return dispatch(state, Arc::clone(route), request).await;
    }

    if domains.is_empty() {
        (StatusCode::NOT_FOUND, Json(json!({ "message": "Page Not Found" }))).into_response()
    } else {
        json_error(StatusCode::NOT_FOUND, "no backend found for domain")
    }
}

/// Run a domain route: domain chain, matching per-path chain, then proxy
/// with the original URL path.
async fn dispatch_domain(
    state: GatewayState,
    route: &CompiledDomainRoute,
    request: Request,
) -> Response {
    info!(
        method = %request.method(),
        path = request.uri().path(),
        domain = %route.domain,
        "dispatching domain request"
    );

    let mut ctx = RequestContext::new(request, state.tls);
    if let Some(mut response) = route.chain.run(&mut ctx).await {
        ctx.overlay.apply(&mut response);
        return response;
    }

    let path = ctx.request.uri().path().to_string();
    let method = ctx.request.method().clone();
    let matched_path = route
        .paths
        .iter()
        .find(|p| p.path == path && p.method.as_ref().is_none_or(|m| *m == method));
    if let Some(domain_path) = matched_path {
        if let Some(mut response) = domain_path.chain.run(&mut ctx).await {
            ctx.overlay.apply(&mut response);
            return response;
        }
    }

    let RequestContext {
        request,
        host,
        overlay,
        ..
    } = ctx;
    let mut response =
        proxy::forward(&state.upstream, &route.proxy_target, "", &path, request, &host).await;
    overlay.apply(&mut response);
    response
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_strips_prefix_and_fixed_path() {
        assert_eq!(wildcard_segment("/foo", "", "/foo/a/b"), "/a/b");
        assert_eq!(
            wildcard_segment("/foo", "/docs/todos", "/foo/docs/todos/123"),
            "/123"
        );
        assert_eq!(wildcard_segment("/", "", "/anything/here"), "/anything/here");
        assert_eq!(wildcard_segment("", "", "/anything"), "/anything");
    }
}
