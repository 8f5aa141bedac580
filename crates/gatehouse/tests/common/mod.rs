//! Shared helpers for integration tests: ephemeral mock servers and an
//! in-process gateway router built from a YAML snippet.

use axum::Router;
use axum::body::Body;
use axum::extract::Request;
use axum::http::StatusCode;
use axum::response::Response;
use gatehouse::GatewayServer;
use gatehouse_core::GatewayConfig;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// One request observed by a mock server.
#[derive(Clone, Debug, Default)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl Recorded {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }
}

pub type RequestLog = Arc<Mutex<Vec<Recorded>>>;

async fn record(request: Request, log: &RequestLog) -> Recorded {
    let (parts, body) = request.into_parts();
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .unwrap_or_default();
    let mut headers = HashMap::new();
    for (name, value) in &parts.headers {
        if let Ok(value) = value.to_str() {
            headers.insert(name.as_str().to_lowercase(), value.to_string());
        }
    }
    let recorded = Recorded {
        method: parts.method.to_string(),
        path: parts.uri.path().to_string(),
        query: parts.uri.query().map(String::from),
        headers,
        body: bytes.to_vec(),
    };
    log.lock().unwrap().push(recorded.clone());
    recorded
}

/// Serve `app` on an ephemeral port; returns its base URL.
pub async fn spawn(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

/// An upstream that records every request and answers `200 upstream-ok`.
pub async fn spawn_recording_upstream() -> (String, RequestLog) {
    let log: RequestLog = Arc::new(Mutex::new(Vec::new()));
    let handler_log = Arc::clone(&log);
    let app = Router::new().fallback(move |request: Request| {
        let log = Arc::clone(&handler_log);
        async move {
            record(request, &log).await;
            (StatusCode::OK, "upstream-ok")
        }
    });
    (spawn(app).await, log)
}

/// A mock server that records every request and answers with a canned
/// response produced by `respond`.
pub async fn spawn_mock<F>(respond: F) -> (String, RequestLog)
where
    F: Fn(&Recorded) -> Response + Clone + Send + Sync + 'static,
{
    let log: RequestLog = Arc::new(Mutex::new(Vec::new()));
    let handler_log = Arc::clone(&log);
    let app = Router::new().fallback(move |request: Request| {
        let log = Arc::clone(&handler_log);
        let respond = respond.clone();
        async move {
            let recorded = record(request, &log).await;
            respond(&recorded)
        }
    });
    (spawn(app).await, log)
}

/// Build the gateway router from a YAML configuration snippet.
pub fn gateway(yaml: &str) -> Router {
    let config: GatewayConfig = serde_yaml::from_str(yaml).expect("parse gateway config");
    config.validate().expect("valid gateway config");
    GatewayServer::new(config).router().expect("build router")
}

/// Collect a response body into a string.
pub async fn body_string(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap_or_default();
    String::from_utf8_lossy(&bytes).to_string()
}

/// Shorthand for a request builder.
pub fn request(method: &str, uri: &str) -> axum::http::request::Builder {
    Request::builder().method(method).uri(uri)
}

/// An empty request body.
pub fn empty() -> Body {
    Body::empty()
}
