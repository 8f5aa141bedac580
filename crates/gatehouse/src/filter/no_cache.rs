//! Cache-suppression filter.

use super::{FilterDecision, PolicyFilter, RequestContext};
use async_trait::async_trait;
use axum::http::HeaderValue;
use axum::http::header::{CACHE_CONTROL, EXPIRES, PRAGMA};

const CACHE_CONTROL_VALUE: &str =
    "no-store, no-cache, must-revalidate, proxy-revalidate, max-age=0, s-maxage=0";

/// Stamps cache-defeating headers on the outgoing response and continues.
///
/// Routes attach this to endpoints whose responses must never be stored by
/// browsers or intermediaries (session state, tokens, per-user data).
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCacheFilter;

#[async_trait]
impl PolicyFilter for NoCacheFilter {
    fn name(&self) -> &str {
        "no-cache"
    }

    async fn apply(&self, ctx: &mut RequestContext) -> FilterDecision {
        ctx.overlay
            .set_header(CACHE_CONTROL, HeaderValue::from_static(CACHE_CONTROL_VALUE));
        ctx.overlay
            .set_header(PRAGMA, HeaderValue::from_static("no-cache"));
        ctx.overlay.set_header(EXPIRES, HeaderValue::from_static("0"));
        FilterDecision::Continue
    }
}
