//! Forward-auth filter.
//!
//! Delegates the authorization decision to an external HTTP endpoint: a
//! subrequest carries selected headers, cookies, and (optionally) the
//! buffered inbound body; the auth response decides whether the chain
//! continues. Selected auth response headers and cookies are copied onto the
//! outbound response *whether or not* the request is authorized.

use super::{FilterDecision, PolicyFilter, RequestContext};
use crate::error::{StartupError, StartupResult};
use crate::response::json_error;
use axum::body::Body;
use axum::http::header::{COOKIE, HeaderName, SET_COOKIE};
use axum::http::{Method, StatusCode};
use axum::response::Response;
use async_trait::async_trait;
use cookie::Cookie;
use gatehouse_core::ForwardAuthConfig;
use http_body_util::BodyExt;
use std::time::Duration;
use tracing::debug;

/// Authorization filter backed by an external auth endpoint.
///
/// The `reqwest` client is built once per configured filter and reused for
/// every subrequest. When `cert_filepath` is set, that PEM root is added to
/// the client's trust store.
#[derive(Debug)]
pub struct ForwardAuthFilter {
    url: String,
    method: Method,
    timeout: Duration,
    trust_forward_header: bool,
    forward_body: bool,
    request_headers: Vec<String>,
    response_headers: Vec<String>,
    cookies_to_request: Vec<String>,
    cookies_to_response: Vec<String>,
    client: reqwest::Client,
}

impl ForwardAuthFilter {
    /// Build from a validated [`ForwardAuthConfig`]. Reading or parsing the
    /// optional CA certificate fails startup.
    pub fn from_config(name: &str, cfg: &ForwardAuthConfig) -> StartupResult<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(path) = &cfg.cert_filepath {
            let pem = std::fs::read(path).map_err(|source| StartupError::CaCertRead {
                path: path.clone(),
                source,
            })?;
            let cert =
                reqwest::Certificate::from_pem(&pem).map_err(|e| StartupError::CaCertInvalid {
                    path: path.clone(),
                    reason: e.to_string(),
                })?;
            builder = builder.add_root_certificate(cert);
        }
        let client = builder.build().map_err(|source| StartupError::AuthClient {
            name: name.to_string(),
            source,
        })?;

        let method = cfg
            .method
            .as_deref()
            .unwrap_or(ForwardAuthConfig::DEFAULT_METHOD);
        let method = Method::from_bytes(method.as_bytes())
            .map_err(|_| StartupError::InvalidMethod(method.to_string()))?;

        Ok(Self {
            url: cfg.url.clone().unwrap_or_default(),
            method,
            timeout: cfg.timeout.unwrap_or(ForwardAuthConfig::DEFAULT_TIMEOUT),
            trust_forward_header: cfg.trust_forward_header,
            forward_body: cfg.forward_body,
            request_headers: cfg.request_headers.clone(),
            response_headers: cfg.response_headers.clone(),
            cookies_to_request: cfg.add_cookies_to_request.clone(),
            cookies_to_response: cfg.add_cookies_to_response.clone(),
            client,
        })
    }

    /// `name=value` pairs for the configured request cookies present on the
    /// inbound request; missing cookies are skipped silently.
    fn request_cookies(&self, ctx: &RequestContext) -> Vec<String> {
        let mut pairs = Vec::new();
        for wanted in &self.cookies_to_request {
            'headers: for header in ctx.request.headers().get_all(COOKIE) {
                let Ok(raw) = header.to_str() else { continue };
                for cookie in Cookie::split_parse(raw).flatten() {
                    if cookie.name() == wanted {
                        pairs.push(format!("{}={}", cookie.name(), cookie.value()));
                        break 'headers;
                    }
                }
            }
        }
        pairs
    }
}

#[async_trait]
impl PolicyFilter for ForwardAuthFilter {
    fn name(&self) -> &str {
        "forward-auth"
    }

    async fn apply(&self, ctx: &mut RequestContext) -> FilterDecision {
        // CORS preflight never carries credentials worth checking.
        if ctx.request.method() == Method::OPTIONS {
            return FilterDecision::Continue;
        }

        // Buffer the inbound body and restore it so the terminal action still
        // sees it. The buffered copy becomes the subrequest body.
        let body = if self.forward_body {
            let inbound = std::mem::replace(ctx.request.body_mut(), Body::empty());
            match inbound.collect().await {
                Ok(collected) => {
                    let bytes = collected.to_bytes();
                    *ctx.request.body_mut() = Body::from(bytes.clone());
                    Some(bytes)
                }
                Err(_) => {
                    return FilterDecision::Halt(json_error(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "failed to read request body",
                    ));
                }
            }
        } else {
            None
        };

        let mut subrequest = self
            .client
            .request(self.method.clone(), self.url.as_str())
            .timeout(self.timeout);
        if let Some(bytes) = body {
            subrequest = subrequest.body(bytes);
        }

        let cookie_pairs = self.request_cookies(ctx);
        if !cookie_pairs.is_empty() {
            subrequest = subrequest.header(COOKIE, cookie_pairs.join("; "));
        }

        for header in &self.request_headers {
            if let Some(value) = ctx.request.headers().get(header.as_str()) {
                if !value.is_empty() {
                    subrequest = subrequest.header(header.as_str(), value.clone());
                }
            }
        }

        if self.trust_forward_header {
            let uri = ctx
                .request
                .uri()
                .path_and_query()
                .map(|pq| pq.as_str())
                .unwrap_or("/");
            subrequest = subrequest
                .header("X-Forwarded-Host", ctx.host.as_str())
                .header("X-Forwarded-Method", ctx.request.method().as_str())
                .header("X-Forwarded-Uri", uri)
                .header("X-Forwarded-For", ctx.client_ip.as_str())
                .header("X-Forwarded-Proto", ctx.scheme);
        }

        let auth_response = match subrequest.send().await {
            Ok(response) => response,
            Err(e) => {
                return FilterDecision::Halt(json_error(
                    StatusCode::SERVICE_UNAVAILABLE,
                    format!("auth service unreachable: {e}"),
                ));
            }
        };

        // Header/cookie propagation happens for authorized and unauthorized
        // responses alike.
        for header in &self.response_headers {
            let Ok(name) = HeaderName::try_from(header.as_str()) else {
                continue;
            };
            if let Some(value) = auth_response.headers().get(&name) {
                if !value.is_empty() {
                    ctx.overlay.set_header(name, value.clone());
                }
            }
        }
        for wanted in &self.cookies_to_response {
            for value in auth_response.headers().get_all(SET_COOKIE) {
                let Ok(raw) = value.to_str() else { continue };
                if Cookie::parse(raw).is_ok_and(|c| c.name() == wanted) {
                    ctx.overlay.add_cookie(value.clone());
                }
            }
        }

        let status = auth_response.status();
        if status.is_success() {
            debug!(url = %self.url, "auth service authorized request");
            return FilterDecision::Continue;
        }

        // Unauthorized: relay the auth service's status and body verbatim.
        debug!(url = %self.url, status = status.as_u16(), "auth service rejected request");
        let mut response = Response::new(Body::from_stream(auth_response.bytes_stream()));
        *response.status_mut() = status;
        FilterDecision::Halt(response)
    }
}
