//! Signature verification service
//!
//! ```text
//! GET  /health            liveness
//! GET  /verify-signature  usage payload
//! POST /verify-signature  {message, signature, publicKey, origin?} → {valid, message, verifiedAt}
//! ```

mod routes;
mod verify;

pub use routes::{create_router, AppState};
pub use verify::{verify_request, VerifyError, VerifyRequest, VerifyResponse};

use anyhow::Context;
use std::net::SocketAddr;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_ORIGIN: &str = "http://localhost:3000";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
    /// Origin assumed when neither the body nor the `Origin` header names one.
    pub default_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: DEFAULT_PORT, default_origin: DEFAULT_ORIGIN.into() }
    }
}

impl ServerConfig {
    /// Read `MONKEYMASK_PORT` and `MONKEYMASK_ORIGIN`; unset or invalid values keep defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(port) = std::env::var("MONKEYMASK_PORT").ok().and_then(|p| p.trim().parse().ok()) {
            config.port = port;
        }
        if let Some(origin) = std::env::var("MONKEYMASK_ORIGIN").ok().filter(|o| !o.trim().is_empty()) {
            config.default_origin = origin.trim().to_string();
        }
        config
    }

    pub fn with_port(mut self, port: u16) -> Self { self.port = port; self }
    pub fn with_default_origin(mut self, origin: impl Into<String>) -> Self { self.default_origin = origin.into(); self }
}

/// Bind and serve until SIGINT/SIGTERM.
pub async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, default_origin = %config.default_origin, "verification server listening");

    axum::serve(listener, create_router(config))
        .with_graceful_shutdown(crate::runtime::shutdown_signal())
        .await
        .context("server error")?;
    tracing::info!("server stopped");
    Ok(())
}
