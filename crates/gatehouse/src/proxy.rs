//! Proxy terminal action.
//!
//! Forwards the (post-filter) request to the configured upstream, rewriting
//! the path and authority while streaming both bodies — nothing is
//! re-buffered on the proxy hop. The original inbound host is preserved in
//! `X-Forwarded-Host`.

use crate::response::json_error;
use axum::body::Body;
use axum::extract::Request;
use axum::http::header::{
    CONNECTION, CONTENT_LENGTH, HOST, HeaderName, HeaderValue, TE, TRAILER, TRANSFER_ENCODING,
    UPGRADE,
};
use axum::http::StatusCode;
use axum::response::Response;
use tracing::debug;
use url::Url;

/// Join path fragments into a single clean path: duplicate slashes collapse,
/// `.` segments drop, and `..` cannot climb past the root.
pub fn clean_join(parts: &[&str]) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for part in parts {
        for segment in part.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    segments.pop();
                }
                segment => segments.push(segment),
            }
        }
    }
    let mut joined = String::from("/");
    joined.push_str(&segments.join("/"));
    joined
}

fn is_hop_by_hop(name: &HeaderName) -> bool {
    *name == CONNECTION
        || *name == TE
        || *name == TRAILER
        || *name == TRANSFER_ENCODING
        || *name == UPGRADE
        || name.as_str() == "keep-alive"
        || name.as_str() == "proxy-connection"
}

/// Forward `request` to `target`, with the outgoing path computed as
/// `clean_join(target.path, wildcard, fixed_path)` and the inbound query
/// string preserved.
pub async fn forward(
    client: &reqwest::Client,
    target: &str,
    fixed_path: &str,
    wildcard: &str,
    request: Request,
    original_host: &str,
) -> Response {
    let Ok(mut url) = Url::parse(target) else {
        return json_error(StatusCode::INTERNAL_SERVER_ERROR, "invalid proxy target");
    };

    let path = clean_join(&[url.path(), wildcard, fixed_path]);
    url.set_path(&path);
    url.set_query(request.uri().query());

    debug!(upstream = %url, "forwarding request upstream");

    let (parts, body) = request.into_parts();
    let mut headers = parts.headers;
    headers.remove(HOST);
    headers.remove(CONTENT_LENGTH);
    let hop_by_hop: Vec<HeaderName> = headers
        .keys()
        .filter(|name| is_hop_by_hop(name))
        .cloned()
        .collect();
    for name in hop_by_hop {
        headers.remove(name);
    }
    if let Ok(value) = HeaderValue::from_str(original_host) {
        headers.insert("x-forwarded-host", value);
    }

    let sent = client
        .request(parts.method, url)
        .headers(headers)
        .body(reqwest::Body::wrap_stream(body.into_data_stream()))
        .send()
        .await;

    match sent {
        Ok(upstream) => {
            let mut response = Response::new(Body::empty());
            *response.status_mut() = upstream.status();
            for (name, value) in upstream.headers() {
                if is_hop_by_hop(name) {
                    continue;
                }
                response.headers_mut().append(name.clone(), value.clone());
            }
            *response.body_mut() = Body::from_stream(upstream.bytes_stream());
            response
        }
        Err(e) => json_error(StatusCode::BAD_GATEWAY, format!("upstream unreachable: {e}")),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_join_concatenates_fragments() {
        assert_eq!(clean_join(&["/api", "/a/b", ""]), "/api/a/b");
        assert_eq!(clean_join(&["", "/a/b", "/docs"]), "/a/b/docs");
        assert_eq!(clean_join(&["/", "", ""]), "/");
    }

    #[test]
    fn clean_join_collapses_duplicate_slashes() {
        assert_eq!(clean_join(&["/api/", "/a//b/", "//c"]), "/api/a/b/c");
    }

    #[test]
    fn clean_join_never_escapes_the_root() {
        assert_eq!(clean_join(&["/base", "/../../../etc/passwd", ""]), "/etc/passwd");
        assert_eq!(clean_join(&["/", "/..", ""]), "/");
        assert_eq!(clean_join(&["/a", "/b/../c", ""]), "/a/c");
    }

    #[test]
    fn clean_join_drops_current_dir_segments() {
        assert_eq!(clean_join(&["/a", "/./b/.", ""]), "/a/b");
    }
}
