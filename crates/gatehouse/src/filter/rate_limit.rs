//! Client-IP rate-limit filter.

use super::{FilterDecision, PolicyFilter, RequestContext};
use crate::limit::{KeyedLimiter, LimiterAlgo};
use crate::response::json_error;
use async_trait::async_trait;
use axum::http::StatusCode;
use gatehouse_core::RateLimitConfig;
use tracing::warn;

/// Rejects requests from clients that exhaust their keyed quota with
/// `429 {"error":"rate limit exceeded"}`.
///
/// One instance exists per configured limiter name; routes referencing the
/// same name share its counters.
#[derive(Debug)]
pub struct RateLimitFilter {
    limiter: KeyedLimiter,
}

impl RateLimitFilter {
    /// Build from a validated [`RateLimitConfig`]. Must be called within a
    /// tokio runtime when TTL cleanup is configured.
    pub fn from_config(cfg: &RateLimitConfig) -> Self {
        // Validated configs carry exactly one of the two algorithms.
        let algo = if cfg.algorithm.as_deref() == Some("token_bucket") {
            LimiterAlgo::TokenBucket {
                capacity: cfg.capacity.unwrap_or(0).max(0) as u64,
                refill_tokens: cfg.refill_tokens.unwrap_or(0).max(0) as u64,
                refill_interval: cfg.refill_interval.unwrap_or_default(),
            }
        } else {
            LimiterAlgo::FixedWindowCounter {
                limit: cfg.limit.unwrap_or(0).max(0) as u64,
                window_size: cfg.window_size.unwrap_or_default(),
            }
        };
        Self {
            limiter: KeyedLimiter::new(algo, cfg.ttl, cfg.cleanup_interval),
        }
    }
}

#[async_trait]
impl PolicyFilter for RateLimitFilter {
    fn name(&self) -> &str {
        "rate-limit"
    }

    async fn apply(&self, ctx: &mut RequestContext) -> FilterDecision {
        if self.limiter.allow(&ctx.client_ip).await {
            FilterDecision::Continue
        } else {
            warn!(client = %ctx.client_ip, "rate limit exceeded");
            FilterDecision::Halt(json_error(
                StatusCode::TOO_MANY_REQUESTS,
                "rate limit exceeded",
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::extract::Request;
    use std::time::Duration;

    fn ctx(ip: &str) -> RequestContext {
        let request = Request::builder()
            .uri("/limited")
            .header("x-forwarded-for", ip)
            .body(Body::empty())
            .unwrap();
        RequestContext::new(request, false)
    }

    #[tokio::test]
    async fn rejects_with_429_after_quota() {
        let filter = RateLimitFilter::from_config(&RateLimitConfig {
            algorithm: Some("fixed_window_counter".into()),
            limit: Some(2),
            window_size: Some(Duration::from_secs(60)),
            ..Default::default()
        });

        assert!(matches!(
            filter.apply(&mut ctx("192.0.2.1")).await,
            FilterDecision::Continue
        ));
        assert!(matches!(
            filter.apply(&mut ctx("192.0.2.1")).await,
            FilterDecision::Continue
        ));
        match filter.apply(&mut ctx("192.0.2.1")).await {
            FilterDecision::Halt(response) => {
                assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
            }
            FilterDecision::Continue => panic!("third request should be limited"),
        }
        // A different client is unaffected.
        assert!(matches!(
            filter.apply(&mut ctx("192.0.2.2")).await,
            FilterDecision::Continue
        ));
    }
}
