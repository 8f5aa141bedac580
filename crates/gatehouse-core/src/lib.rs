//! Configuration contract for the Gatehouse reverse proxy.
//!
//! This crate defines the *declarative* side of the gateway: the
//! configuration model decoded from a YAML or JSON file, the loader that
//! fills defaults, and the cross-field validation that rejects mis-authored
//! route tables before any runtime resource is allocated. No HTTP types live
//! here — the runtime crate (`gatehouse`) turns a validated
//! [`GatewayConfig`] into filters, compiled routes, and an axum router.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use gatehouse_core::config::{load_config, FileType};
//!
//! let cfg = load_config("gateway.yaml", FileType::Yaml)?;
//! assert!(!cfg.routes.is_empty());
//! # Ok::<(), gatehouse_core::config::LoadError>(())
//! ```

pub mod config;

pub use config::{
    DomainPathConfig, DomainRouteConfig, EnvConfig, EnvFile, FileType, ForwardAuthConfig,
    GatewayConfig, LoadError, NoCachePolicyConfig, PathConfig, RateLimitConfig, RouteConfig,
    RouteScope, ValidationError, load_config, load_env,
};
