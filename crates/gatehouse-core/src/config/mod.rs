//! Configuration model for the gateway.
//!
//! The structures here mirror the configuration file one-to-one. Optional
//! fields are `Option<T>` — presence matters for validation (for example a
//! `redirect_code` without a `redirect_target` is rejected), so nothing is
//! modelled with empty-string sentinels. Durations accept the human-readable
//! form (`5s`, `2h`, `250ms`).

mod load;
mod validate;

pub use load::{EnvFile, FileType, LoadError, load_config, load_env};
pub use validate::{RouteScope, ValidationError};

use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// HTTP methods a route or path may declare.
pub(crate) const VALID_METHODS: [&str; 5] = ["GET", "POST", "PUT", "DELETE", "PATCH"];

/// Redirect status codes the gateway will emit.
pub(crate) const VALID_REDIRECT_CODES: [u16; 4] = [302, 303, 307, 308];

// ─────────────────────────────────────────────────────────────────────────────
// Top-level config
// ─────────────────────────────────────────────────────────────────────────────

/// Process-wide gateway configuration, immutable after [`load_config`].
///
/// The four name→spec maps are the *filter catalogs*; routes reference
/// catalog entries by name. Maps are ordered (`BTreeMap`) so validation and
/// catalog construction walk entries deterministically.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub rate_limiters: BTreeMap<String, RateLimitConfig>,
    #[serde(default)]
    pub forward_auth: BTreeMap<String, ForwardAuthConfig>,
    #[serde(default)]
    pub no_cache_policies: BTreeMap<String, NoCachePolicyConfig>,
    #[serde(default)]
    pub middleware_groups: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
    #[serde(default)]
    pub domain_routes: Vec<DomainRouteConfig>,
    #[serde(default)]
    pub env: EnvConfig,
}

impl GatewayConfig {
    /// Fill decode-time defaults that validation and the runtime rely on:
    /// forward-auth method and timeout. The `env` defaults are handled by
    /// serde directly.
    pub(crate) fn fill_defaults(&mut self) {
        for auth in self.forward_auth.values_mut() {
            auth.fill_defaults();
        }
    }

    /// Copy a route-level method down to each of its paths that lacks one.
    ///
    /// Runs *after* validation: the "method at both levels" rule compares the
    /// declared configuration, not the filled one.
    pub(crate) fn inherit_path_methods(&mut self) {
        for route in &mut self.routes {
            let Some(method) = route.method.clone() else {
                continue;
            };
            for path in &mut route.paths {
                if path.method.is_none() {
                    path.method = Some(method.clone());
                }
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Routes
// ─────────────────────────────────────────────────────────────────────────────

/// A prefix-selected route declaration.
///
/// Exactly one of three shapes survives validation:
/// - `proxy_target` set, no paths: proxy everything under the prefix;
/// - `redirect_target` + `redirect_code` set, no paths: redirect the prefix;
/// - `paths` set: each path carries its own terminal action.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RouteConfig {
    pub prefix: Option<String>,
    pub method: Option<String>,
    #[serde(default)]
    pub middleware: Vec<String>,
    pub middleware_group: Option<String>,
    pub proxy_target: Option<String>,
    pub redirect_target: Option<String>,
    pub redirect_code: Option<u16>,
    #[serde(default)]
    pub paths: Vec<PathConfig>,
}

/// A sub-path declaration under a route prefix.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathConfig {
    pub path: Option<String>,
    pub method: Option<String>,
    #[serde(default)]
    pub middleware: Vec<String>,
    pub middleware_group: Option<String>,
    pub proxy_target: Option<String>,
    pub redirect_target: Option<String>,
    pub redirect_code: Option<u16>,
}

/// A route selected by the inbound `Host` header instead of the URL prefix.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DomainRouteConfig {
    pub domain: Option<String>,
    pub proxy_target: Option<String>,
    #[serde(default)]
    pub middleware: Vec<String>,
    pub middleware_group: Option<String>,
    #[serde(default)]
    pub paths: Vec<DomainPathConfig>,
}

/// A per-path filter refinement inside a domain route.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DomainPathConfig {
    pub path: Option<String>,
    pub method: Option<String>,
    #[serde(default)]
    pub middleware: Vec<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Filter specs
// ─────────────────────────────────────────────────────────────────────────────

/// Parameters for a named rate limiter.
///
/// `algorithm` selects between `fixed_window_counter` (`limit` +
/// `window_size`) and `token_bucket` (`capacity` + `refill_tokens` +
/// `refill_interval`); a parameter belonging to the other algorithm is a
/// validation error. `ttl` and `cleanup_interval` govern the keyed store.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RateLimitConfig {
    pub algorithm: Option<String>,
    #[serde(default, with = "humantime_serde")]
    pub ttl: Option<Duration>,
    #[serde(default, with = "humantime_serde")]
    pub cleanup_interval: Option<Duration>,
    pub limit: Option<i64>,
    #[serde(default, with = "humantime_serde")]
    pub window_size: Option<Duration>,
    pub capacity: Option<i64>,
    pub refill_tokens: Option<i64>,
    #[serde(default, with = "humantime_serde")]
    pub refill_interval: Option<Duration>,
}

/// Parameters for a named forward-auth filter.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ForwardAuthConfig {
    pub url: Option<String>,
    pub method: Option<String>,
    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,
    #[serde(default)]
    pub trust_forward_header: bool,
    #[serde(default)]
    pub forward_body: bool,
    /// Inbound request headers copied onto the auth subrequest.
    #[serde(default)]
    pub request_headers: Vec<String>,
    /// Auth response headers copied onto the outbound response.
    #[serde(default)]
    pub response_headers: Vec<String>,
    /// Inbound cookies copied onto the auth subrequest.
    #[serde(default)]
    pub add_cookies_to_request: Vec<String>,
    /// Auth `Set-Cookie` values copied onto the outbound response.
    #[serde(default)]
    pub add_cookies_to_response: Vec<String>,
    /// Optional PEM root certificate trusted when calling the auth endpoint.
    pub cert_filepath: Option<String>,
}

impl ForwardAuthConfig {
    pub const DEFAULT_METHOD: &'static str = "GET";
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

    fn fill_defaults(&mut self) {
        if self.method.as_deref().is_none_or(str::is_empty) {
            self.method = Some(Self::DEFAULT_METHOD.to_string());
        }
        if self.timeout.is_none_or(|t| t.is_zero()) {
            self.timeout = Some(Self::DEFAULT_TIMEOUT);
        }
    }
}

/// A named cache-suppression policy. Carries no parameters; the entry exists
/// so routes can reference the policy by name.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NoCachePolicyConfig {}

// ─────────────────────────────────────────────────────────────────────────────
// Env
// ─────────────────────────────────────────────────────────────────────────────

/// Listener settings. Keys are uppercase in the file, as authored.
#[derive(Debug, Clone, Deserialize)]
pub struct EnvConfig {
    #[serde(default = "EnvConfig::default_host", rename = "HOST")]
    pub host: String,
    #[serde(default = "EnvConfig::default_port", rename = "PORT")]
    pub port: u16,
    #[serde(default, rename = "CERT_FILEPATH")]
    pub cert_filepath: Option<String>,
    #[serde(default, rename = "KEY_FILEPATH")]
    pub key_filepath: Option<String>,
}

impl EnvConfig {
    fn default_host() -> String {
        "0.0.0.0".to_string()
    }

    fn default_port() -> u16 {
        8080
    }

    /// Whether the listener should terminate TLS.
    pub fn tls_enabled(&self) -> bool {
        self.cert_filepath.is_some() && self.key_filepath.is_some()
    }
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
            cert_filepath: None,
            key_filepath: None,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
