//! Session and resource lifecycle layer
//!
//! Creates, tracks, rate-limits, and reclaims browser sessions, their pages,
//! and their transient per-page state. Everything else a browser automation
//! server does is delegation to the engine; this layer is what keeps resource
//! growth bounded when callers abandon sessions or dialogs.
//!
//! ## Module structure
//! - `registry`: session/page bookkeeping with identity validation
//! - `admission`: creation rate limiting and the concurrency ceiling
//! - `dialogs`: the per-page dialog state machine with auto-dismiss
//! - `routes`: network-intercept registration tracking
//! - `manager`: the facade consumed by the tool/action layer, including the
//!   idle reaper

pub mod admission;
pub mod dialogs;
pub mod manager;
pub mod registry;
pub mod routes;


pub use admission::AdmissionController;
pub use dialogs::{DialogGuard, DialogState};
pub use manager::{LifecycleManager, ServerStatus, SessionSummary};
pub use registry::{Session, SessionMeta, SessionRegistry};
pub use routes::{RouteAction, RouteRegistration, RouteTable};
