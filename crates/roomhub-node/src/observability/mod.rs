//! # Observability Module
//!
//! Structured logging for the roomhub node. Request tracing comes from the
//! `tower-http` trace layer installed by [`crate::api::create_router`].
//!
//! ## Usage
//!
//! ```rust,no_run
//! use roomhub_node::observability::{init_logging, LogFormat};
//!
//! init_logging("info", LogFormat::Json).expect("subscriber already set");
//! ```

mod logging;

pub use logging::{init_logging, LogFormat};
