//! Browser engine abstraction layer
//!
//! Everything the lifecycle manager needs from the external browser
//! automation engine, expressed as object-safe traits, plus mock
//! implementations for testing.

pub mod mock;
pub mod traits;

pub use traits::{
    BrowserEngine, BrowserHandle, ContextHandle, DialogHandle, DialogKind, EngineKind,
    LaunchOptions, LaunchResult, PageEvent, PageHandle,
};

pub use mock::{MockBrowserHandle, MockContextHandle, MockDialogHandle, MockEngine, MockPageHandle};
