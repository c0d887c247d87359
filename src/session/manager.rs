//! Lifecycle manager implementation
//!
//! The facade consumed by the tool/action layer. Wires admission control,
//! the resource registry, the dialog guard, and route tracking together, and
//! owns the idle reaper and the race-safe teardown path shared between
//! explicit close and reaping.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::engine::{BrowserEngine, EngineKind, LaunchOptions, PageEvent, PageHandle};
use crate::session::admission::AdmissionController;
use crate::session::dialogs::{DialogGuard, DialogState};
use crate::session::registry::{Session, SessionMeta, SessionRegistry};
use crate::session::routes::{RouteRegistration, RouteTable};
use crate::{Error, Result};

/// Summary of one live session, as reported by [`LifecycleManager::server_status`]
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub kind: EngineKind,
    pub created_at: DateTime<Utc>,
    pub headless: bool,
    pub page_count: usize,
    pub active_page: Option<String>,
    pub idle_ms: u64,
}

/// Snapshot of manager state
#[derive(Debug, Clone, Serialize)]
pub struct ServerStatus {
    pub active_sessions: usize,
    pub max_sessions: usize,
    pub available_slots: usize,
    pub sessions: Vec<SessionSummary>,
}

impl ServerStatus {
    /// JSON rendering for the tool layer
    pub fn to_json(&self) -> Result<serde_json::Value> {
        serde_json::to_value(self).map_err(|e| Error::internal(format!("Serialize error: {}", e)))
    }
}

/// Session and resource lifecycle manager
pub struct LifecycleManager {
    config: Config,
    engine: Arc<dyn BrowserEngine>,
    registry: Arc<SessionRegistry>,
    admission: AdmissionController,
    dialogs: Arc<DialogGuard>,
    routes: Arc<RouteTable>,
    /// Session ids with a teardown in progress. Check-and-set under the lock
    /// arbitrates the reap-vs-explicit-close race.
    in_progress: Mutex<HashSet<String>>,
}

impl LifecycleManager {
    /// Create a manager driving the given browser engine
    pub fn new(config: Config, engine: Arc<dyn BrowserEngine>) -> Self {
        let admission =
            AdmissionController::new(config.max_sessions, config.max_sessions_per_minute);
        let dialogs = Arc::new(DialogGuard::new(config.dialog_auto_dismiss()));
        Self {
            config,
            engine,
            registry: Arc::new(SessionRegistry::new()),
            admission,
            dialogs,
            routes: Arc::new(RouteTable::new()),
            in_progress: Mutex::new(HashSet::new()),
        }
    }

    /// Create a manager with a mock engine for testing
    pub fn mock(config: Config) -> Self {
        Self::new(config, Arc::new(crate::engine::MockEngine::new()))
    }

    /// Manager configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Check whether a new session may be created right now
    pub fn admit(&self) -> Result<()> {
        self.admission.admit(self.registry.session_count())
    }

    /// Create a new session: admission check, engine launch, registration.
    ///
    /// Admission failure is fatal to the call; a launch failure after a
    /// successful admission still consumed rate budget.
    pub async fn create_session(
        &self,
        kind: EngineKind,
        options: LaunchOptions,
    ) -> Result<String> {
        self.admit()?;

        let headless = options.headless;
        let launch = self.engine.launch(kind, options).await?;
        let meta = SessionMeta {
            kind,
            created_at: Utc::now(),
            headless,
        };
        let session_id = self.registry.create_session(launch, meta)?;

        info!(session_id = %session_id, kind = %kind, headless, "Session created");
        Ok(session_id)
    }

    /// Resolve a session by id
    pub fn get_session(&self, session_id: &str) -> Result<Arc<Session>> {
        self.registry.get_session(session_id)
    }

    /// Resolve a page handle within a session
    pub fn get_page(&self, session_id: &str, page_id: &str) -> Result<Arc<dyn PageHandle>> {
        self.registry.get_page(session_id, page_id)
    }

    /// Record activity on a session.
    ///
    /// Must be called by every successful operation that touches the session;
    /// this is what makes the idle reaper's measurement meaningful.
    pub fn update_activity(&self, session_id: &str) -> Result<()> {
        self.registry.update_activity(session_id)
    }

    /// Ids of all live sessions
    pub fn list_sessions(&self) -> Result<Vec<String>> {
        self.registry.list_sessions()
    }

    /// Whether a session is currently live
    pub fn has_session(&self, session_id: &str) -> bool {
        self.registry.has_session(session_id)
    }

    /// Ids of all live pages in a session
    pub fn page_ids(&self, session_id: &str) -> Result<Vec<String>> {
        self.registry.page_ids(session_id)
    }

    /// Open a new page in a session and install its dialog guard watcher
    pub async fn new_page(&self, session_id: &str) -> Result<String> {
        let session = self.registry.get_session(session_id)?;
        let page = session.context().new_page().await?;
        let page_id = session.add_page(page.clone())?;

        self.setup_dialog_handler(session_id, &page_id, page).await?;
        session.touch()?;

        debug!(session_id = %session_id, page_id = %page_id, "Page opened");
        Ok(page_id)
    }

    /// Register an already-open page with a session and install its dialog
    /// guard watcher
    pub async fn add_page(
        &self,
        session_id: &str,
        page: Arc<dyn PageHandle>,
    ) -> Result<String> {
        let session = self.registry.get_session(session_id)?;
        let page_id = session.add_page(page.clone())?;
        self.setup_dialog_handler(session_id, &page_id, page).await?;
        session.touch()?;
        Ok(page_id)
    }

    /// Remove a page from a session's bookkeeping without closing it
    pub fn remove_page(&self, session_id: &str, page_id: &str) -> Result<()> {
        let session = self.registry.get_session(session_id)?;
        session.remove_page(page_id)?;
        self.dialogs.clear_page(session_id, page_id);
        self.routes.clear_page(session_id, page_id);
        Ok(())
    }

    /// Subscribe to a page's engine events and keep dialog, route, and
    /// registry state in sync with them.
    pub async fn setup_dialog_handler(
        &self,
        session_id: &str,
        page_id: &str,
        page: Arc<dyn PageHandle>,
    ) -> Result<()> {
        let mut events = page.subscribe_events().await?;

        let session_id = session_id.to_string();
        let page_id = page_id.to_string();
        let dialogs = self.dialogs.clone();
        let routes = self.routes.clone();
        let registry = self.registry.clone();

        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                match event {
                    PageEvent::DialogOpened(dialog) => {
                        if let Err(e) = dialogs.on_dialog_opened(&session_id, &page_id, dialog) {
                            warn!(
                                session_id = %session_id,
                                page_id = %page_id,
                                error = %e,
                                "Failed to track opened dialog"
                            );
                        }
                    }
                    PageEvent::Closed => {
                        // Mirror the close everywhere the page is tracked
                        dialogs.clear_page(&session_id, &page_id);
                        routes.clear_page(&session_id, &page_id);
                        if let Ok(session) = registry.get_session(&session_id) {
                            let _ = session.remove_page(&page_id);
                        }
                        debug!(
                            session_id = %session_id,
                            page_id = %page_id,
                            "Page closed"
                        );
                        break;
                    }
                }
            }
        });

        Ok(())
    }

    /// Resolve the pending dialog on a page
    pub async fn handle_dialog(
        &self,
        session_id: &str,
        page_id: &str,
        accept: bool,
        prompt_text: Option<&str>,
    ) -> Result<()> {
        // Validates both ids and confirms the page is live
        self.registry.get_page(session_id, page_id)?;
        self.dialogs
            .handle_dialog(session_id, page_id, accept, prompt_text)
            .await?;
        self.registry.update_activity(session_id)
    }

    /// Observable dialog state for a page
    pub fn dialog_state(&self, session_id: &str, page_id: &str) -> DialogState {
        self.dialogs.state(session_id, page_id)
    }

    /// Close a page and clear its transient state
    pub async fn close_page(&self, session_id: &str, page_id: &str) -> Result<()> {
        let session = self.registry.get_session(session_id)?;
        let page = self.registry.get_page(session_id, page_id)?;

        page.close().await?;

        self.dialogs.clear_page(session_id, page_id);
        self.routes.clear_page(session_id, page_id);
        session.remove_page(page_id)?;
        session.touch()
    }

    /// Register a network-intercept route on a page
    pub async fn add_network_route(
        &self,
        session_id: &str,
        page_id: &str,
        registration: RouteRegistration,
    ) -> Result<String> {
        let page = self.registry.get_page(session_id, page_id)?;
        page.add_route(&registration.pattern).await?;
        let route_id = self.routes.add(session_id, page_id, registration)?;
        self.registry.update_activity(session_id)?;
        Ok(route_id)
    }

    /// Remove network-intercept routes from a page. With `route_ids` absent,
    /// removes all of them. Returns the number removed.
    pub async fn remove_network_routes(
        &self,
        session_id: &str,
        page_id: &str,
        route_ids: Option<&[String]>,
    ) -> Result<usize> {
        let page = self.registry.get_page(session_id, page_id)?;
        let removed = self.routes.remove(session_id, page_id, route_ids)?;

        for registration in &removed {
            if let Err(e) = page.remove_route(&registration.pattern).await {
                warn!(
                    session_id = %session_id,
                    page_id = %page_id,
                    pattern = %registration.pattern,
                    error = %e,
                    "Failed to remove engine route"
                );
            }
        }

        self.registry.update_activity(session_id)?;
        Ok(removed.len())
    }

    /// Network routes currently registered on a page, as (id, pattern) pairs
    pub fn list_network_routes(&self, session_id: &str, page_id: &str) -> Vec<(String, String)> {
        self.routes.list(session_id, page_id)
    }

    /// Clear dialog and route state for the given pages of a session
    pub fn cleanup_session(&self, session_id: &str, page_ids: &[String]) -> Result<()> {
        crate::session::registry::validate_id(session_id, "session id")?;
        for page_id in page_ids {
            self.dialogs.clear_page(session_id, page_id);
            self.routes.clear_page(session_id, page_id);
            if let Ok(session) = self.registry.get_session(session_id) {
                let _ = session.remove_page(page_id);
            }
        }
        Ok(())
    }

    /// Close a session and tear down all its state.
    ///
    /// If a reap (or another close) already has the teardown in progress,
    /// this observes it and returns Ok without touching the browser.
    pub async fn close_session(&self, session_id: &str) -> Result<()> {
        let session = self.registry.get_session(session_id)?;

        if !self.try_begin_cleanup(session_id)? {
            debug!(session_id = %session_id, "Teardown already in progress");
            return Ok(());
        }

        // The session may have been fully torn down between the lookup and
        // the marker acquisition
        if !self.registry.has_session(session_id) {
            self.finish_cleanup(session_id);
            return Ok(());
        }

        self.teardown(&session).await;
        self.finish_cleanup(session_id);
        Ok(())
    }

    /// Tear down sessions idle longer than `max_age`. Returns how many were
    /// cleaned. Safe to call concurrently with itself and with explicit
    /// session operations.
    pub async fn reap(&self, max_age: Duration) -> Result<usize> {
        let mut cleaned = 0;

        for session in self.registry.sessions_snapshot()? {
            if session.idle_for() <= max_age {
                continue;
            }
            let session_id = session.id().to_string();

            if !self.try_begin_cleanup(&session_id)? {
                continue;
            }
            // Re-check under the marker: an explicit close may have finished,
            // or activity may have arrived since the snapshot
            if !self.registry.has_session(&session_id) || session.idle_for() <= max_age {
                self.finish_cleanup(&session_id);
                continue;
            }

            info!(
                session_id = %session_id,
                idle_secs = session.idle_for().as_secs(),
                "Reaping idle session"
            );
            self.teardown(&session).await;
            self.finish_cleanup(&session_id);
            cleaned += 1;
        }

        if cleaned > 0 {
            info!(cleaned, "Idle reap complete");
        }
        Ok(cleaned)
    }

    /// Current manager state
    pub fn server_status(&self) -> Result<ServerStatus> {
        let sessions: Vec<SessionSummary> = self
            .registry
            .sessions_snapshot()?
            .iter()
            .map(|s| SessionSummary {
                session_id: s.id().to_string(),
                kind: s.meta().kind,
                created_at: s.meta().created_at,
                headless: s.meta().headless,
                page_count: s.page_count(),
                active_page: s.active_page(),
                idle_ms: s.idle_for().as_millis() as u64,
            })
            .collect();

        let active_sessions = sessions.len();
        let max_sessions = self.admission.max_sessions();
        Ok(ServerStatus {
            active_sessions,
            max_sessions,
            available_slots: max_sessions.saturating_sub(active_sessions),
            sessions,
        })
    }

    /// Shared teardown path for explicit close and reaping. The caller must
    /// hold the in-progress marker for this session.
    async fn teardown(&self, session: &Arc<Session>) {
        let session_id = session.id();

        // A session whose browser fails to close is still removed; retaining
        // it would wedge future reap cycles on the same entry forever
        if let Err(e) = session.browser().close().await {
            warn!(session_id = %session_id, error = %e, "Browser close failed, removing session anyway");
        }

        self.dialogs.clear_session(session_id);
        self.routes.clear_session(session_id);

        if let Err(e) = self.registry.delete_session(session_id) {
            warn!(session_id = %session_id, error = %e, "Failed to remove session from registry");
        }

        info!(session_id = %session_id, "Session torn down");
    }

    fn try_begin_cleanup(&self, session_id: &str) -> Result<bool> {
        Ok(self
            .in_progress
            .lock()
            .map_err(|e| Error::internal(format!("Lock error: {}", e)))?
            .insert(session_id.to_string()))
    }

    fn finish_cleanup(&self, session_id: &str) {
        if let Ok(mut guard) = self.in_progress.lock() {
            guard.remove(session_id);
        }
    }
}

#[cfg(test)]
impl Default for LifecycleManager {
    fn default() -> Self {
        Self::mock(Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::MockEngine;

    fn mock_manager(config: Config) -> (Arc<LifecycleManager>, Arc<MockEngine>) {
        let engine = Arc::new(MockEngine::new());
        let manager = Arc::new(LifecycleManager::new(config, engine.clone()));
        (manager, engine)
    }

    #[tokio::test]
    async fn test_create_and_get_session() {
        let (manager, _) = mock_manager(Config::default());
        let session_id = manager
            .create_session(EngineKind::Chromium, LaunchOptions::default())
            .await
            .unwrap();

        let session = manager.get_session(&session_id).unwrap();
        assert_eq!(session.id(), session_id);
        assert_eq!(session.meta().kind, EngineKind::Chromium);
        assert!(manager.has_session(&session_id));
    }

    #[tokio::test]
    async fn test_close_session() {
        let (manager, engine) = mock_manager(Config::default());
        let session_id = manager
            .create_session(EngineKind::Chromium, LaunchOptions::default())
            .await
            .unwrap();

        manager.close_session(&session_id).await.unwrap();
        assert!(!manager.has_session(&session_id));
        assert_eq!(engine.launched()[0].close_calls(), 1);

        let result = manager.get_session(&session_id);
        assert!(matches!(result.unwrap_err(), Error::SessionNotFound(_)));
    }

    #[tokio::test]
    async fn test_launch_failure_surfaces_and_leaks_nothing() {
        let (manager, engine) = mock_manager(Config::default());
        engine.set_fail_launch(true);

        let result = manager
            .create_session(EngineKind::Firefox, LaunchOptions::default())
            .await;
        assert!(matches!(result.unwrap_err(), Error::LaunchFailed(_)));
        assert_eq!(manager.list_sessions().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_capacity_frees_on_close() {
        let config = Config {
            max_sessions: 1,
            max_sessions_per_minute: 100,
            ..Default::default()
        };
        let (manager, _) = mock_manager(config);

        let first = manager
            .create_session(EngineKind::Chromium, LaunchOptions::default())
            .await
            .unwrap();

        let result = manager
            .create_session(EngineKind::Chromium, LaunchOptions::default())
            .await;
        assert!(matches!(result.unwrap_err(), Error::CapacityExceeded(_)));

        manager.close_session(&first).await.unwrap();
        assert!(manager
            .create_session(EngineKind::Chromium, LaunchOptions::default())
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_new_page_and_close_page() {
        let (manager, _) = mock_manager(Config::default());
        let session_id = manager
            .create_session(EngineKind::Chromium, LaunchOptions::default())
            .await
            .unwrap();

        let page_id = manager.new_page(&session_id).await.unwrap();
        assert_eq!(manager.page_ids(&session_id).unwrap().len(), 1);
        assert!(manager.get_page(&session_id, &page_id).is_ok());

        manager.close_page(&session_id, &page_id).await.unwrap();
        assert_eq!(manager.page_ids(&session_id).unwrap().len(), 0);
        let result = manager.get_page(&session_id, &page_id);
        assert!(matches!(result.unwrap_err(), Error::PageNotFound(_)));
    }

    #[tokio::test]
    async fn test_server_status() {
        let config = Config {
            max_sessions: 5,
            ..Default::default()
        };
        let (manager, _) = mock_manager(config);

        let session_id = manager
            .create_session(EngineKind::Webkit, LaunchOptions::default())
            .await
            .unwrap();
        manager.new_page(&session_id).await.unwrap();

        let status = manager.server_status().unwrap();
        assert_eq!(status.active_sessions, 1);
        assert_eq!(status.max_sessions, 5);
        assert_eq!(status.available_slots, 4);
        assert_eq!(status.sessions[0].page_count, 1);
        assert_eq!(status.sessions[0].kind, EngineKind::Webkit);

        // Status snapshots must serialize for the tool layer
        let json = status.to_json().unwrap();
        assert_eq!(json["sessions"][0]["kind"], "webkit");
    }

    #[tokio::test]
    async fn test_close_failure_still_removes_session() {
        let (manager, engine) = mock_manager(Config::default());
        let session_id = manager
            .create_session(EngineKind::Chromium, LaunchOptions::default())
            .await
            .unwrap();
        engine.launched()[0].set_fail_close(true);

        manager.close_session(&session_id).await.unwrap();
        assert!(!manager.has_session(&session_id));

        // The in-progress marker was released: a later close of a fresh
        // session must still work
        let next = manager
            .create_session(EngineKind::Chromium, LaunchOptions::default())
            .await
            .unwrap();
        manager.close_session(&next).await.unwrap();
    }

    #[tokio::test]
    async fn test_network_routes() {
        use crate::session::routes::RouteAction;

        let (manager, _) = mock_manager(Config::default());
        let session_id = manager
            .create_session(EngineKind::Chromium, LaunchOptions::default())
            .await
            .unwrap();
        let page_id = manager.new_page(&session_id).await.unwrap();

        let route_id = manager
            .add_network_route(
                &session_id,
                &page_id,
                RouteRegistration {
                    pattern: "**/*.png".to_string(),
                    action: RouteAction::Abort,
                },
            )
            .await
            .unwrap();

        assert_eq!(manager.list_network_routes(&session_id, &page_id).len(), 1);

        let removed = manager
            .remove_network_routes(&session_id, &page_id, Some(&[route_id]))
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert!(manager.list_network_routes(&session_id, &page_id).is_empty());
    }
}
