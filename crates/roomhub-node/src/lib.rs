//! # Roomhub Node
//!
//! WebSocket server for the roomhub real-time chat backend.
//!
//! The node adapts axum WebSockets to the transport-agnostic connection
//! handler in `roomhub-realtime`, and adds configuration, logging and a
//! couple of plain HTTP routes.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────┐
//! │                   Roomhub Node                    │
//! ├───────────────────────────────────────────────────┤
//! │  ┌─────────────────────────────────────────────┐  │
//! │  │               HTTP API Layer                │  │
//! │  │  • GET /ws?room_id=&token=  (upgrade)       │  │
//! │  │  • GET /health                              │  │
//! │  │  • GET /api/realtime/stats                  │  │
//! │  └─────────────────────────────────────────────┘  │
//! │                        │                          │
//! │  ┌─────────────────────────────────────────────┐  │
//! │  │          roomhub-realtime hub               │  │
//! │  │  • JWT handshake, room membership           │  │
//! │  │  • Session registry, broadcaster            │  │
//! │  └─────────────────────────────────────────────┘  │
//! │                        │                          │
//! │  ┌─────────────────────────────────────────────┐  │
//! │  │               ChatStore                     │  │
//! │  └─────────────────────────────────────────────┘  │
//! └───────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! ROOMHUB_JWT_SECRET=dev-secret cargo run --bin roomhub-node -- --config roomhub.yaml
//! ```
//!
//! ## Example: Serving on an ephemeral port
//!
//! ```rust,no_run
//! use roomhub_node::{api::AppState, config::Config, serve};
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let config = Config {
//!     jwt_secret: "dev-secret".to_string(),
//!     ..Config::default()
//! };
//! let store = Arc::new(config.directory.build_store());
//! let state = AppState::new(&config, store);
//!
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
//! serve(listener, state).await?;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod config;
pub mod observability;
pub mod realtime_api;

use tokio::net::TcpListener;

/// Serves the API on an already bound listener until the process stops.
pub async fn serve(listener: TcpListener, state: api::AppState) -> std::io::Result<()> {
    let app = api::create_router(state);
    axum::serve(listener, app).await
}
