//! Browser engine layer traits
//!
//! This module defines the abstract interfaces for the external browser
//! automation engine. The engine owns actionability waiting, DOM querying,
//! and rendering; this crate only drives launch, page creation, teardown,
//! network-route primitives, and consumes push-style page events.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Browser engine kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    Chromium,
    Firefox,
    Webkit,
}

impl std::fmt::Display for EngineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineKind::Chromium => write!(f, "chromium"),
            EngineKind::Firefox => write!(f, "firefox"),
            EngineKind::Webkit => write!(f, "webkit"),
        }
    }
}

/// Options for launching a browser
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    /// Headless mode (no GUI)
    pub headless: bool,
    /// Window width
    pub window_width: u32,
    /// Window height
    pub window_height: u32,
    /// User agent string
    pub user_agent: Option<String>,
    /// Proxy server
    pub proxy: Option<String>,
    /// Additional arguments to pass to the browser
    pub args: Vec<String>,
    /// Browser executable path
    pub executable_path: Option<String>,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            headless: true,
            window_width: 1920,
            window_height: 1080,
            user_agent: None,
            proxy: None,
            args: vec![],
            executable_path: None,
        }
    }
}

/// Result of launching a browser: the process handle and its isolated
/// browsing context (cookies/storage/permissions scope).
#[derive(Debug, Clone)]
pub struct LaunchResult {
    pub browser: Arc<dyn BrowserHandle>,
    pub context: Arc<dyn ContextHandle>,
}

/// Native dialog kind (alert/confirm/prompt/beforeunload)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogKind {
    Alert,
    Confirm,
    Prompt,
    BeforeUnload,
}

impl std::fmt::Display for DialogKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DialogKind::Alert => write!(f, "alert"),
            DialogKind::Confirm => write!(f, "confirm"),
            DialogKind::Prompt => write!(f, "prompt"),
            DialogKind::BeforeUnload => write!(f, "beforeunload"),
        }
    }
}

/// Push-style page notification from the engine
#[derive(Debug, Clone)]
pub enum PageEvent {
    /// A native dialog opened on the page. The engine serializes dialog
    /// presentation per page, so at most one is open at a time.
    DialogOpened(Arc<dyn DialogHandle>),
    /// The page closed (navigated away, crashed, or closed by script)
    Closed,
}

/// Browser engine trait
///
/// The entry point of the external collaborator: launches browser processes.
#[async_trait]
pub trait BrowserEngine: Send + Sync {
    /// Launch a browser of the given kind with an isolated context
    async fn launch(
        &self,
        kind: EngineKind,
        options: LaunchOptions,
    ) -> Result<LaunchResult, crate::Error>;
}

/// Handle to a running browser process
#[async_trait]
pub trait BrowserHandle: Send + Sync + std::fmt::Debug {
    /// Close the browser
    async fn close(&self) -> Result<(), crate::Error>;

    /// Check if the browser is still running
    fn is_active(&self) -> bool;
}

/// Handle to an isolated browsing context
#[async_trait]
pub trait ContextHandle: Send + Sync + std::fmt::Debug {
    /// Open a new page/tab in this context
    async fn new_page(&self) -> Result<Arc<dyn PageHandle>, crate::Error>;
}

/// Handle to a page/tab
#[async_trait]
pub trait PageHandle: Send + Sync + std::fmt::Debug {
    /// Subscribe to page events (dialog-opened, page-closed)
    async fn subscribe_events(&self) -> Result<mpsc::Receiver<PageEvent>, crate::Error>;

    /// Register a network-intercept route for the given URL pattern
    async fn add_route(&self, pattern: &str) -> Result<(), crate::Error>;

    /// Remove a previously registered route for the given URL pattern
    async fn remove_route(&self, pattern: &str) -> Result<(), crate::Error>;

    /// Close the page
    async fn close(&self) -> Result<(), crate::Error>;

    /// Check if the page is still open
    fn is_active(&self) -> bool;
}

/// Handle to a currently-open native dialog
#[async_trait]
pub trait DialogHandle: Send + Sync + std::fmt::Debug {
    /// Dialog kind
    fn kind(&self) -> DialogKind;

    /// Dialog message text
    fn message(&self) -> &str;

    /// Accept the dialog, optionally filling in prompt text
    async fn accept(&self, prompt_text: Option<&str>) -> Result<(), crate::Error>;

    /// Dismiss the dialog
    async fn dismiss(&self) -> Result<(), crate::Error>;
}
