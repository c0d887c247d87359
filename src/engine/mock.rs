//! Mock browser engine for testing
//!
//! This module provides mock implementations of the engine traits for
//! development and testing. The mock browser counts close calls so teardown
//! races are observable, and mock pages let tests push dialog-opened and
//! page-closed events as the real engine would.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use crate::engine::traits::*;
use crate::Error;

/// Mock browser engine
#[derive(Default)]
pub struct MockEngine {
    fail_launch: AtomicBool,
    launched: Mutex<Vec<(Arc<MockBrowserHandle>, Arc<MockContextHandle>)>>,
}

impl MockEngine {
    /// Create a new mock engine
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent launches fail
    pub fn set_fail_launch(&self, fail: bool) {
        self.fail_launch.store(fail, Ordering::Relaxed);
    }

    /// Browsers launched so far, in launch order
    pub fn launched(&self) -> Vec<Arc<MockBrowserHandle>> {
        self.launched
            .lock()
            .map(|l| l.iter().map(|(b, _)| b.clone()).collect())
            .unwrap_or_default()
    }

    /// Contexts launched so far, in launch order
    pub fn contexts(&self) -> Vec<Arc<MockContextHandle>> {
        self.launched
            .lock()
            .map(|l| l.iter().map(|(_, c)| c.clone()).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl BrowserEngine for MockEngine {
    async fn launch(
        &self,
        kind: EngineKind,
        _options: LaunchOptions,
    ) -> Result<LaunchResult, Error> {
        if self.fail_launch.load(Ordering::Relaxed) {
            return Err(Error::launch_failed(format!(
                "mock engine refused to launch {}",
                kind
            )));
        }

        let browser = Arc::new(MockBrowserHandle::new());
        let context = Arc::new(MockContextHandle::new());

        self.launched
            .lock()
            .map_err(|e| Error::internal(format!("Lock error: {}", e)))?
            .push((browser.clone(), context.clone()));

        Ok(LaunchResult { browser, context })
    }
}

/// Mock browser process handle
#[derive(Debug)]
pub struct MockBrowserHandle {
    id: String,
    is_active: AtomicBool,
    close_calls: AtomicUsize,
    fail_close: AtomicBool,
}

impl MockBrowserHandle {
    pub fn new() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            is_active: AtomicBool::new(true),
            close_calls: AtomicUsize::new(0),
            fail_close: AtomicBool::new(false),
        }
    }

    /// Mock browser id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// How many times close() was invoked
    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::Relaxed)
    }

    /// Make the next close() fail
    pub fn set_fail_close(&self, fail: bool) {
        self.fail_close.store(fail, Ordering::Relaxed);
    }
}

impl Default for MockBrowserHandle {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BrowserHandle for MockBrowserHandle {
    async fn close(&self) -> Result<(), Error> {
        self.close_calls.fetch_add(1, Ordering::Relaxed);
        if self.fail_close.load(Ordering::Relaxed) {
            return Err(Error::close_failed("mock browser close failure"));
        }
        self.is_active.store(false, Ordering::Relaxed);
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.is_active.load(Ordering::Relaxed)
    }
}

/// Mock browsing context
#[derive(Debug, Default)]
pub struct MockContextHandle {
    pages: Mutex<Vec<Arc<MockPageHandle>>>,
}

impl MockContextHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pages opened in this context, in creation order
    pub fn pages(&self) -> Vec<Arc<MockPageHandle>> {
        self.pages.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ContextHandle for MockContextHandle {
    async fn new_page(&self) -> Result<Arc<dyn PageHandle>, Error> {
        let page = Arc::new(MockPageHandle::new());
        self.pages
            .lock()
            .map_err(|e| Error::internal(format!("Lock error: {}", e)))?
            .push(page.clone());
        Ok(page)
    }
}

/// Mock page/tab handle
#[derive(Debug)]
pub struct MockPageHandle {
    id: String,
    is_active: AtomicBool,
    events_tx: Mutex<Option<mpsc::Sender<PageEvent>>>,
    routes: Mutex<Vec<String>>,
}

impl MockPageHandle {
    pub fn new() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            is_active: AtomicBool::new(true),
            events_tx: Mutex::new(None),
            routes: Mutex::new(Vec::new()),
        }
    }

    /// Mock page id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// URL patterns currently routed on this page
    pub fn routed_patterns(&self) -> Vec<String> {
        self.routes.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn sender(&self) -> Option<mpsc::Sender<PageEvent>> {
        self.events_tx.lock().ok().and_then(|tx| tx.clone())
    }

    /// Push a dialog-opened event, as the engine would when a page shows a
    /// native dialog. Returns the dialog handle for assertions.
    pub async fn emit_dialog(&self, kind: DialogKind, message: &str) -> Arc<MockDialogHandle> {
        let dialog = Arc::new(MockDialogHandle::new(kind, message));
        if let Some(tx) = self.sender() {
            let _ = tx.send(PageEvent::DialogOpened(dialog.clone())).await;
        }
        dialog
    }

    /// Push a page-closed event without going through close()
    pub async fn emit_closed(&self) {
        self.is_active.store(false, Ordering::Relaxed);
        if let Some(tx) = self.sender() {
            let _ = tx.send(PageEvent::Closed).await;
        }
    }
}

impl Default for MockPageHandle {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PageHandle for MockPageHandle {
    async fn subscribe_events(&self) -> Result<mpsc::Receiver<PageEvent>, Error> {
        let (tx, rx) = mpsc::channel(100);
        *self
            .events_tx
            .lock()
            .map_err(|e| Error::internal(format!("Lock error: {}", e)))? = Some(tx);
        Ok(rx)
    }

    async fn add_route(&self, pattern: &str) -> Result<(), Error> {
        self.routes
            .lock()
            .map_err(|e| Error::internal(format!("Lock error: {}", e)))?
            .push(pattern.to_string());
        Ok(())
    }

    async fn remove_route(&self, pattern: &str) -> Result<(), Error> {
        self.routes
            .lock()
            .map_err(|e| Error::internal(format!("Lock error: {}", e)))?
            .retain(|p| p != pattern);
        Ok(())
    }

    async fn close(&self) -> Result<(), Error> {
        self.is_active.store(false, Ordering::Relaxed);
        if let Some(tx) = self.sender() {
            let _ = tx.send(PageEvent::Closed).await;
        }
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.is_active.load(Ordering::Relaxed)
    }
}

/// Mock native dialog handle
#[derive(Debug)]
pub struct MockDialogHandle {
    kind: DialogKind,
    message: String,
    accepted: AtomicBool,
    dismissed: AtomicBool,
    prompt_text: Mutex<Option<String>>,
}

impl MockDialogHandle {
    pub fn new(kind: DialogKind, message: &str) -> Self {
        Self {
            kind,
            message: message.to_string(),
            accepted: AtomicBool::new(false),
            dismissed: AtomicBool::new(false),
            prompt_text: Mutex::new(None),
        }
    }

    pub fn was_accepted(&self) -> bool {
        self.accepted.load(Ordering::Relaxed)
    }

    pub fn was_dismissed(&self) -> bool {
        self.dismissed.load(Ordering::Relaxed)
    }

    pub fn prompt_text(&self) -> Option<String> {
        self.prompt_text.lock().ok().and_then(|t| t.clone())
    }
}

#[async_trait]
impl DialogHandle for MockDialogHandle {
    fn kind(&self) -> DialogKind {
        self.kind
    }

    fn message(&self) -> &str {
        &self.message
    }

    async fn accept(&self, prompt_text: Option<&str>) -> Result<(), Error> {
        self.accepted.store(true, Ordering::Relaxed);
        if let Some(text) = prompt_text {
            *self
                .prompt_text
                .lock()
                .map_err(|e| Error::internal(format!("Lock error: {}", e)))? =
                Some(text.to_string());
        }
        Ok(())
    }

    async fn dismiss(&self) -> Result<(), Error> {
        self.dismissed.store(true, Ordering::Relaxed);
        Ok(())
    }
}
