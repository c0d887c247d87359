//! Tabwarden: session and resource lifecycle manager for remote browser
//! automation
//!
//! This library owns the hard part of a browser automation server: admission
//! control for session creation, registry bookkeeping for sessions and pages,
//! bounded-time resolution of native dialogs, network-route tracking, and
//! idle-session reaping. Actual page rendering, DOM traversal, and
//! actionability waiting are delegated to an external browser engine behind
//! the traits in [`engine`].

pub mod config;
pub mod error;

pub mod engine;
pub mod session;

// Re-exports
pub use config::Config;
pub use error::{Error, Result};
pub use session::LifecycleManager;

/// Tabwarden library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
