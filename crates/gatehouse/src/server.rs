//! HTTP(S) server assembly.

use crate::dispatch::{GatewayState, build_router};
use crate::error::{StartupError, StartupResult};
use crate::filter::FilterRegistry;
use crate::route::compile;
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use gatehouse_core::GatewayConfig;
use std::net::SocketAddr;
use tracing::info;

/// Wires a validated configuration into a bound, serving gateway.
pub struct GatewayServer {
    config: GatewayConfig,
}

impl GatewayServer {
    pub fn new(config: GatewayConfig) -> Self {
        Self { config }
    }

    /// Build the axum router: filter catalog → compiled routes → dispatcher.
    ///
    /// Exposed separately from [`run`](Self::run) so tests can drive the
    /// router in-process.
    pub fn router(&self) -> StartupResult<Router> {
        let registry = FilterRegistry::from_config(&self.config)?;
        let table = compile(&self.config, &registry)?;
        let state = GatewayState::new(self.config.env.tls_enabled())?;
        build_router(table, state)
    }

    /// Bind `HOST:PORT` and serve until the process exits. Serves HTTPS when
    /// both certificate and key paths are configured (read once, here),
    /// plain HTTP otherwise.
    pub async fn run(self) -> StartupResult<()> {
        let router = self.router()?;
        let env = &self.config.env;

        let addr: SocketAddr = format!("{}:{}", env.host, env.port)
            .parse()
            .map_err(|_| StartupError::InvalidBindAddress(format!("{}:{}", env.host, env.port)))?;
        let app = router.into_make_service_with_connect_info::<SocketAddr>();

        match (&env.cert_filepath, &env.key_filepath) {
            (Some(cert), Some(key)) => {
                let tls = RustlsConfig::from_pem_file(cert, key)
                    .await
                    .map_err(StartupError::Tls)?;
                info!(%addr, "gateway listening (https)");
                axum_server::bind_rustls(addr, tls)
                    .serve(app)
                    .await
                    .map_err(StartupError::Serve)
            }
            _ => {
                let listener = tokio::net::TcpListener::bind(addr)
                    .await
                    .map_err(StartupError::Serve)?;
                info!(%addr, "gateway listening (http)");
                axum::serve(listener, app).await.map_err(StartupError::Serve)
            }
        }
    }
}
