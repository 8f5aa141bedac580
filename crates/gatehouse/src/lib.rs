//! Gatehouse — configuration-driven HTTP reverse proxy and policy gateway.
//!
//! A declarative routing table (see `gatehouse-core`) is compiled at startup
//! into executable routes: each pairs an axum registration pattern with an
//! ordered chain of policy filters and a terminal action that either proxies
//! to an upstream origin or answers with a redirect. Domain routes act as a
//! Host-based catch-all when no prefix route matches.
//!
//! ```text
//! config file ──► GatewayConfig (validated)
//!                     │
//!                     ▼
//!              FilterRegistry ── one instance per configured filter name
//!                     │
//!                     ▼
//!              compile() ──► RouteTable (compiled routes + domain routes)
//!                     │
//!                     ▼
//!              build_router() ──► axum Router ──► GatewayServer::run()
//! ```
//!
//! At request time the matched route runs its filters in declaration order;
//! the first filter to halt wins, otherwise the terminal action runs. Either
//! way, the response overlay (headers/cookies recorded by filters) is
//! applied to the outgoing response.

pub mod dispatch;
pub mod error;
pub mod filter;
pub mod limit;
pub mod proxy;
mod response;
pub mod route;
pub mod server;

pub use dispatch::GatewayState;
pub use error::{StartupError, StartupResult};
pub use filter::{FilterChain, FilterDecision, FilterRegistry, PolicyFilter, RequestContext};
pub use route::{CompiledRoute, RouteAction, RouteTable};
pub use server::GatewayServer;
