//! Route compilation.
//!
//! Flattens validated route declarations into [`CompiledRoute`]s:
//!
//! - proxy prefix route → `{prefix}/{*path}` (root prefixes compile to the
//!   no-match fallback instead);
//! - redirect route → `{prefix}`;
//! - each path under a prefix → `{prefix}{path}/{*path}` (proxy) or
//!   `{prefix}{path}` (redirect), with the effective filter chain being the
//!   route's chain followed by the path's chain.

use super::{CompiledDomainPath, CompiledDomainRoute, CompiledRoute, RouteAction, RouteTable};
use crate::error::{StartupError, StartupResult};
use crate::filter::FilterRegistry;
use axum::http::{Method, StatusCode};
use gatehouse_core::GatewayConfig;

fn parse_method(method: Option<&str>) -> StartupResult<Method> {
    let method = method.unwrap_or_default();
    if method.is_empty() {
        return Err(StartupError::InvalidMethod(method.to_string()));
    }
    Method::from_bytes(method.as_bytes())
        .map_err(|_| StartupError::InvalidMethod(method.to_string()))
}

fn redirect_code(code: Option<u16>) -> StartupResult<StatusCode> {
    let code = code.unwrap_or_default();
    StatusCode::from_u16(code).map_err(|_| StartupError::InvalidRedirectCode(code))
}

fn target_of(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|t| !t.is_empty())
}

/// Turn a validated configuration into the compiled route table.
pub fn compile(cfg: &GatewayConfig, registry: &FilterRegistry) -> StartupResult<RouteTable> {
    let mut routes = Vec::new();

    for route in &cfg.routes {
        let prefix = route.prefix.clone().unwrap_or_default();
        let chain = registry.chain(route.middleware_group.as_deref(), &route.middleware)?;

        if let Some(target) = target_of(&route.proxy_target) {
            // Validation guarantees no paths here.
            let pattern = if prefix.is_empty() || prefix == "/" {
                prefix.clone()
            } else {
                format!("{prefix}/{{*path}}")
            };
            routes.push(CompiledRoute {
                method: parse_method(route.method.as_deref())?,
                prefix,
                pattern,
                chain,
                action: RouteAction::Proxy {
                    target: target.to_string(),
                    fixed_path: String::new(),
                },
            });
            continue;
        }

        if let Some(target) = target_of(&route.redirect_target) {
            routes.push(CompiledRoute {
                method: parse_method(route.method.as_deref())?,
                pattern: prefix.clone(),
                prefix,
                chain,
                action: RouteAction::Redirect {
                    target: target.to_string(),
                    code: redirect_code(route.redirect_code)?,
                },
            });
            continue;
        }

        for path in &route.paths {
            let fixed_path = path.path.clone().unwrap_or_default();
            let path_chain = registry.chain(path.middleware_group.as_deref(), &path.middleware)?;
            let chain = chain.concat(&path_chain);
            let method = parse_method(path.method.as_deref())?;

            if let Some(target) = target_of(&path.proxy_target) {
                routes.push(CompiledRoute {
                    method,
                    prefix: prefix.clone(),
                    pattern: format!("{prefix}{fixed_path}/{{*path}}"),
                    chain,
                    action: RouteAction::Proxy {
                        target: target.to_string(),
                        fixed_path,
                    },
                });
            } else if let Some(target) = target_of(&path.redirect_target) {
                routes.push(CompiledRoute {
                    method,
                    prefix: prefix.clone(),
                    pattern: format!("{prefix}{fixed_path}"),
                    chain,
                    action: RouteAction::Redirect {
                        target: target.to_string(),
                        code: redirect_code(path.redirect_code)?,
                    },
                });
            }
        }
    }

    let mut domains = Vec::new();
    for domain in &cfg.domain_routes {
        let chain = registry.chain(domain.middleware_group.as_deref(), &domain.middleware)?;
        let mut paths = Vec::new();
        for path in &domain.paths {
            let method = match path.method.as_deref() {
                Some(method) => Some(parse_method(Some(method))?),
                None => None,
            };
            paths.push(CompiledDomainPath {
                path: path.path.clone().unwrap_or_default(),
                method,
                chain: registry.chain(None, &path.middleware)?,
            });
        }
        domains.push(CompiledDomainRoute {
            domain: domain.domain.clone().unwrap_or_default(),
            proxy_target: domain.proxy_target.clone().unwrap_or_default(),
            chain,
            paths,
        });
    }

    Ok(RouteTable { routes, domains })
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const ROUTE_CONFIG: &str = r#"
rate_limiters:
  limiter_a:
    algorithm: fixed_window_counter
    limit: 5
    window_size: 10s
forward_auth:
  auth_a:
    url: https://auth.example.com/verify
no_cache_policies:
  no_store: {}
middleware_groups:
  grp:
    - limiter_a
    - auth_a
routes:
  - prefix: /foo
    method: POST
    middleware: [limiter_a]
    proxy_target: https://bar.com
  - prefix: /foo
    paths:
      - path: /docs/todos
        method: GET
        middleware: [limiter_a, auth_a]
        proxy_target: https://bar.com
      - path: /docs/templates
        method: PUT
        middleware: [no_store]
        proxy_target: https://bar.com
  - prefix: /foobar
    method: GET
    redirect_target: https://xyzzy.com
    redirect_code: 308
  - prefix: /thud
    paths:
      - path: /foo
        method: GET
        redirect_target: https://foo.com
        redirect_code: 302
      - path: /bar
        method: GET
        redirect_target: https://bar.com
        redirect_code: 307
domain_routes:
  - domain: www.example.com
    proxy_target: https://dummy.com
    middleware: [limiter_a]
  - domain: www.test.com
    proxy_target: https://tower.com
    middleware_group: grp
"#;

    fn compiled() -> RouteTable {
        let cfg: GatewayConfig = serde_yaml::from_str(ROUTE_CONFIG).unwrap();
        cfg.validate().unwrap();
        let registry = FilterRegistry::from_config(&cfg).unwrap();
        compile(&cfg, &registry).unwrap()
    }

    #[tokio::test]
    async fn compiles_expected_routes() {
        let table = compiled();
        assert_eq!(table.routes.len(), 6);

        let expected: Vec<(&str, &str, &str, RouteAction)> = vec![
            (
                "POST",
                "/foo",
                "/foo/{*path}",
                RouteAction::Proxy {
                    target: "https://bar.com".into(),
                    fixed_path: "".into(),
                },
            ),
            (
                "GET",
                "/foo",
                "/foo/docs/todos/{*path}",
                RouteAction::Proxy {
                    target: "https://bar.com".into(),
                    fixed_path: "/docs/todos".into(),
                },
            ),
            (
                "PUT",
                "/foo",
                "/foo/docs/templates/{*path}",
                RouteAction::Proxy {
                    target: "https://bar.com".into(),
                    fixed_path: "/docs/templates".into(),
                },
            ),
            (
                "GET",
                "/foobar",
                "/foobar",
                RouteAction::Redirect {
                    target: "https://xyzzy.com".into(),
                    code: StatusCode::PERMANENT_REDIRECT,
                },
            ),
            (
                "GET",
                "/thud",
                "/thud/foo",
                RouteAction::Redirect {
                    target: "https://foo.com".into(),
                    code: StatusCode::FOUND,
                },
            ),
            (
                "GET",
                "/thud",
                "/thud/bar",
                RouteAction::Redirect {
                    target: "https://bar.com".into(),
                    code: StatusCode::TEMPORARY_REDIRECT,
                },
            ),
        ];

        for (idx, (method, prefix, pattern, action)) in expected.into_iter().enumerate() {
            let route = &table.routes[idx];
            assert_eq!(route.method.as_str(), method, "route {idx} method");
            assert_eq!(route.prefix, prefix, "route {idx} prefix");
            assert_eq!(route.pattern, pattern, "route {idx} pattern");
            assert_eq!(route.action, action, "route {idx} action");
        }
    }

    #[tokio::test]
    async fn compiles_expected_filter_chains() {
        let table = compiled();

        let route_chain_lens: Vec<usize> =
            table.routes.iter().map(|r| r.chain.len()).collect();
        assert_eq!(route_chain_lens, [1, 2, 1, 0, 0, 0]);

        let domain_chain_lens: Vec<usize> =
            table.domains.iter().map(|d| d.chain.len()).collect();
        assert_eq!(domain_chain_lens, [1, 2]);
    }

    #[tokio::test]
    async fn compiles_domain_routes_in_declaration_order() {
        let table = compiled();
        assert_eq!(table.domains.len(), 2);
        assert_eq!(table.domains[0].domain, "www.example.com");
        assert_eq!(table.domains[0].proxy_target, "https://dummy.com");
        assert_eq!(table.domains[1].domain, "www.test.com");
        assert_eq!(table.domains[1].proxy_target, "https://tower.com");
    }

    #[tokio::test]
    async fn root_prefix_proxy_compiles_to_fallback() {
        let yaml = r#"
routes:
  - prefix: /
    method: GET
    proxy_target: https://fallback.example.com
"#;
        let cfg: GatewayConfig = serde_yaml::from_str(yaml).unwrap();
        cfg.validate().unwrap();
        let registry = FilterRegistry::from_config(&cfg).unwrap();
        let table = compile(&cfg, &registry).unwrap();

        assert_eq!(table.routes.len(), 1);
        assert!(table.routes[0].is_root_fallback());
        assert_eq!(table.routes[0].pattern, "/");
    }

    #[tokio::test]
    async fn unknown_middleware_fails_compilation() {
        let yaml = r#"
routes:
  - prefix: /foo
    method: GET
    middleware: [ghost]
    proxy_target: https://bar.com
"#;
        let cfg: GatewayConfig = serde_yaml::from_str(yaml).unwrap();
        cfg.validate().unwrap();
        let registry = FilterRegistry::from_config(&cfg).unwrap();
        let err = compile(&cfg, &registry).unwrap_err();
        assert_eq!(err.to_string(), "unknown or unsupported middleware 'ghost'");
    }

    #[tokio::test]
    async fn path_chain_follows_route_chain() {
        let yaml = r#"
rate_limiters:
  limiter_a:
    algorithm: fixed_window_counter
    limit: 5
    window_size: 10s
no_cache_policies:
  no_store: {}
routes:
  - prefix: /api
    middleware: [limiter_a]
    paths:
      - path: /v1
        method: GET
        middleware: [no_store]
        proxy_target: https://api.example.com
"#;
        let cfg: GatewayConfig = serde_yaml::from_str(yaml).unwrap();
        cfg.validate().unwrap();
        let registry = FilterRegistry::from_config(&cfg).unwrap();
        let table = compile(&cfg, &registry).unwrap();

        let chain = &table.routes[0].chain;
        assert_eq!(chain.len(), 2);
        assert_eq!(chain.filter_name(0), Some("rate-limit"));
        assert_eq!(chain.filter_name(1), Some("no-cache"));
    }
}
