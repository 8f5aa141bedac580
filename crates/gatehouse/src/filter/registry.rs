//! Filter catalog and name resolution.
//!
//! Every filter name in the configuration becomes exactly one
//! [`PolicyFilter`] instance, built here at startup and shared (via `Arc`)
//! by every route that references it. Names live in a single registry;
//! when a name appears in more than one catalog section, precedence is
//! `rate_limiters` > `forward_auth` > `no_cache_policies`.

use super::{FilterChain, ForwardAuthFilter, NoCacheFilter, PolicyFilter, RateLimitFilter};
use crate::error::{StartupError, StartupResult};
use gatehouse_core::GatewayConfig;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Name → filter instance registry plus the declared middleware groups.
pub struct FilterRegistry {
    filters: HashMap<String, Arc<dyn PolicyFilter>>,
    groups: BTreeMap<String, Vec<String>>,
}

impl FilterRegistry {
    /// Build one filter per configured name. Fails on an unreadable or
    /// invalid forward-auth CA certificate. Requires a tokio runtime (rate
    /// limiters may spawn their cleanup task).
    pub fn from_config(cfg: &GatewayConfig) -> StartupResult<Self> {
        let mut filters: HashMap<String, Arc<dyn PolicyFilter>> = HashMap::new();

        // Insertion follows catalog precedence; earlier catalogs win.
        for (name, spec) in &cfg.rate_limiters {
            filters.insert(name.clone(), Arc::new(RateLimitFilter::from_config(spec)));
        }
        for (name, spec) in &cfg.forward_auth {
            if filters.contains_key(name) {
                continue;
            }
            filters.insert(
                name.clone(),
                Arc::new(ForwardAuthFilter::from_config(name, spec)?),
            );
        }
        for name in cfg.no_cache_policies.keys() {
            if filters.contains_key(name) {
                continue;
            }
            filters.insert(name.clone(), Arc::new(NoCacheFilter));
        }

        Ok(Self {
            filters,
            groups: cfg.middleware_groups.clone(),
        })
    }

    /// Look a filter up by name. Unknown names are fatal — they mean the
    /// configuration references a filter no catalog declares.
    pub fn resolve(&self, name: &str) -> StartupResult<Arc<dyn PolicyFilter>> {
        self.filters
            .get(name)
            .cloned()
            .ok_or_else(|| StartupError::UnknownMiddleware(name.to_string()))
    }

    fn resolve_list(&self, names: &[String]) -> StartupResult<Vec<Arc<dyn PolicyFilter>>> {
        names.iter().map(|name| self.resolve(name)).collect()
    }

    /// Expand a group to its ordered members and resolve each.
    pub fn resolve_group(&self, group: &str) -> StartupResult<Vec<Arc<dyn PolicyFilter>>> {
        let members = self
            .groups
            .get(group)
            .ok_or_else(|| StartupError::UnknownMiddlewareGroup(group.to_string()))?;
        self.resolve_list(members)
    }

    /// The chain for one declaration level: group members first, then the
    /// standalone middleware list.
    pub fn chain(&self, group: Option<&str>, middleware: &[String]) -> StartupResult<FilterChain> {
        let mut filters = match group {
            Some(group) => self.resolve_group(group)?,
            None => Vec::new(),
        };
        filters.extend(self.resolve_list(middleware)?);
        Ok(FilterChain::new(filters))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use gatehouse_core::{ForwardAuthConfig, NoCachePolicyConfig, RateLimitConfig};
    use std::time::Duration;

    fn limiter_spec() -> RateLimitConfig {
        RateLimitConfig {
            algorithm: Some("fixed_window_counter".into()),
            limit: Some(10),
            window_size: Some(Duration::from_secs(1)),
            ..Default::default()
        }
    }

    fn auth_spec() -> ForwardAuthConfig {
        ForwardAuthConfig {
            url: Some("http://auth.internal/verify".into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn rate_limiter_catalog_wins_over_others() {
        let mut cfg = GatewayConfig::default();
        cfg.rate_limiters.insert("shared".into(), limiter_spec());
        cfg.forward_auth.insert("shared".into(), auth_spec());
        cfg.no_cache_policies
            .insert("shared".into(), NoCachePolicyConfig::default());

        let registry = FilterRegistry::from_config(&cfg).unwrap();
        assert_eq!(registry.resolve("shared").unwrap().name(), "rate-limit");
    }

    #[tokio::test]
    async fn forward_auth_wins_over_no_cache() {
        let mut cfg = GatewayConfig::default();
        cfg.forward_auth.insert("shared".into(), auth_spec());
        cfg.no_cache_policies
            .insert("shared".into(), NoCachePolicyConfig::default());

        let registry = FilterRegistry::from_config(&cfg).unwrap();
        assert_eq!(registry.resolve("shared").unwrap().name(), "forward-auth");
    }

    #[tokio::test]
    async fn unknown_name_is_fatal() {
        let registry = FilterRegistry::from_config(&GatewayConfig::default()).unwrap();
        let err = registry.resolve("ghost").unwrap_err();
        assert_eq!(
            err.to_string(),
            "unknown or unsupported middleware 'ghost'"
        );
    }

    #[tokio::test]
    async fn unknown_group_is_fatal() {
        let registry = FilterRegistry::from_config(&GatewayConfig::default()).unwrap();
        let err = registry.chain(Some("ghosts"), &[]).unwrap_err();
        assert_eq!(err.to_string(), "unknown middleware group 'ghosts'");
    }

    #[tokio::test]
    async fn chain_orders_group_before_list() {
        let mut cfg = GatewayConfig::default();
        cfg.rate_limiters.insert("limiter".into(), limiter_spec());
        cfg.forward_auth.insert("auth".into(), auth_spec());
        cfg.no_cache_policies
            .insert("no_store".into(), NoCachePolicyConfig::default());
        cfg.middleware_groups.insert(
            "protected".into(),
            vec!["limiter".into(), "auth".into()],
        );

        let registry = FilterRegistry::from_config(&cfg).unwrap();
        let chain = registry
            .chain(Some("protected"), &["no_store".into()])
            .unwrap();
        assert_eq!(chain.len(), 3);

        let names: Vec<_> = (0..chain.len())
            .map(|i| chain.filter_name(i).unwrap())
            .collect();
        assert_eq!(names, ["rate-limit", "forward-auth", "no-cache"]);
    }
}
