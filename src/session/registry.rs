//! Resource registry
//!
//! Owns the map of live sessions and, within each session, the map of live
//! pages. Pure bookkeeping with identity validation: malformed identifiers
//! are rejected before any lookup, so a bad request is always distinguishable
//! from a legitimately expired or unknown identifier.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

use crate::engine::{BrowserHandle, ContextHandle, EngineKind, LaunchResult, PageHandle};
use crate::{Error, Result};

/// Validate that an identifier is syntactically a UUID.
///
/// Always called before any map lookup.
pub fn validate_id(id: &str, what: &str) -> Result<()> {
    Uuid::parse_str(id)
        .map(|_| ())
        .map_err(|_| Error::validation(format!("{} is not a valid UUID: {}", what, id)))
}

/// Session metadata
#[derive(Debug, Clone)]
pub struct SessionMeta {
    /// Engine kind the session was launched with
    pub kind: EngineKind,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Whether the browser runs headless
    pub headless: bool,
}

/// One isolated browser + browsing-context instance
pub struct Session {
    id: String,
    browser: Arc<dyn BrowserHandle>,
    context: Arc<dyn ContextHandle>,
    meta: SessionMeta,
    pages: RwLock<HashMap<String, Arc<dyn PageHandle>>>,
    last_activity: RwLock<Instant>,
    active_page: RwLock<Option<String>>,
}

impl Session {
    fn new(launch: LaunchResult, meta: SessionMeta) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            browser: launch.browser,
            context: launch.context,
            meta,
            pages: RwLock::new(HashMap::new()),
            last_activity: RwLock::new(Instant::now()),
            active_page: RwLock::new(None),
        }
    }

    /// Session id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Handle to the underlying browser process
    pub fn browser(&self) -> Arc<dyn BrowserHandle> {
        self.browser.clone()
    }

    /// Handle to the isolated browsing context
    pub fn context(&self) -> Arc<dyn ContextHandle> {
        self.context.clone()
    }

    /// Session metadata
    pub fn meta(&self) -> &SessionMeta {
        &self.meta
    }

    /// Look up a page handle by id
    pub fn page(&self, page_id: &str) -> Result<Option<Arc<dyn PageHandle>>> {
        Ok(self
            .pages
            .read()
            .map_err(|e| Error::internal(format!("Lock error: {}", e)))?
            .get(page_id)
            .cloned())
    }

    /// Register a freshly opened page, returning its generated id
    pub fn add_page(&self, handle: Arc<dyn PageHandle>) -> Result<String> {
        let page_id = Uuid::new_v4().to_string();
        self.pages
            .write()
            .map_err(|e| Error::internal(format!("Lock error: {}", e)))?
            .insert(page_id.clone(), handle);
        *self
            .active_page
            .write()
            .map_err(|e| Error::internal(format!("Lock error: {}", e)))? = Some(page_id.clone());
        Ok(page_id)
    }

    /// Remove a page from the map. Returns true if it was present.
    pub fn remove_page(&self, page_id: &str) -> Result<bool> {
        let removed = self
            .pages
            .write()
            .map_err(|e| Error::internal(format!("Lock error: {}", e)))?
            .remove(page_id)
            .is_some();
        if removed {
            let mut active = self
                .active_page
                .write()
                .map_err(|e| Error::internal(format!("Lock error: {}", e)))?;
            if active.as_deref() == Some(page_id) {
                *active = None;
            }
        }
        Ok(removed)
    }

    /// Ids of all live pages
    pub fn page_ids(&self) -> Result<Vec<String>> {
        Ok(self
            .pages
            .read()
            .map_err(|e| Error::internal(format!("Lock error: {}", e)))?
            .keys()
            .cloned()
            .collect())
    }

    /// Number of live pages
    pub fn page_count(&self) -> usize {
        self.pages.read().map(|p| p.len()).unwrap_or(0)
    }

    /// Currently active page id, if any
    pub fn active_page(&self) -> Option<String> {
        self.active_page.read().ok().and_then(|p| p.clone())
    }

    /// Mark a page as the active one
    pub fn set_active_page(&self, page_id: &str) -> Result<()> {
        *self
            .active_page
            .write()
            .map_err(|e| Error::internal(format!("Lock error: {}", e)))? =
            Some(page_id.to_string());
        Ok(())
    }

    /// Record activity now
    pub fn touch(&self) -> Result<()> {
        *self
            .last_activity
            .write()
            .map_err(|e| Error::internal(format!("Lock error: {}", e)))? = Instant::now();
        Ok(())
    }

    /// Time elapsed since the last recorded activity
    pub fn idle_for(&self) -> Duration {
        self.last_activity
            .read()
            .map(|t| Instant::now().duration_since(*t))
            .unwrap_or(Duration::ZERO)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("meta", &self.meta)
            .field("pages", &self.page_count())
            .finish()
    }
}

/// Registry of live sessions
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
}

impl SessionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a freshly launched session, returning its generated id.
    ///
    /// UUID v4 generation makes collision with a live id negligible; no
    /// explicit collision check is performed.
    pub fn create_session(&self, launch: LaunchResult, meta: SessionMeta) -> Result<String> {
        let session = Arc::new(Session::new(launch, meta));
        let session_id = session.id().to_string();
        self.sessions
            .write()
            .map_err(|e| Error::internal(format!("Lock error: {}", e)))?
            .insert(session_id.clone(), session);
        Ok(session_id)
    }

    /// Resolve a session by id
    pub fn get_session(&self, session_id: &str) -> Result<Arc<Session>> {
        validate_id(session_id, "session id")?;
        self.sessions
            .read()
            .map_err(|e| Error::internal(format!("Lock error: {}", e)))?
            .get(session_id)
            .cloned()
            .ok_or_else(|| Error::session_not_found(session_id))
    }

    /// Resolve a page handle within a session
    pub fn get_page(&self, session_id: &str, page_id: &str) -> Result<Arc<dyn PageHandle>> {
        validate_id(page_id, "page id")?;
        let session = self.get_session(session_id)?;
        session
            .page(page_id)?
            .ok_or_else(|| Error::page_not_found(page_id))
    }

    /// Record activity on a session
    pub fn update_activity(&self, session_id: &str) -> Result<()> {
        self.get_session(session_id)?.touch()
    }

    /// Remove a session from the map, returning it if it was present
    pub fn delete_session(&self, session_id: &str) -> Result<Option<Arc<Session>>> {
        validate_id(session_id, "session id")?;
        Ok(self
            .sessions
            .write()
            .map_err(|e| Error::internal(format!("Lock error: {}", e)))?
            .remove(session_id))
    }

    /// Whether a session is currently live
    pub fn has_session(&self, session_id: &str) -> bool {
        self.sessions
            .read()
            .map(|s| s.contains_key(session_id))
            .unwrap_or(false)
    }

    /// Ids of all live sessions
    pub fn list_sessions(&self) -> Result<Vec<String>> {
        Ok(self
            .sessions
            .read()
            .map_err(|e| Error::internal(format!("Lock error: {}", e)))?
            .keys()
            .cloned()
            .collect())
    }

    /// Ids of all live pages in a session
    pub fn page_ids(&self, session_id: &str) -> Result<Vec<String>> {
        self.get_session(session_id)?.page_ids()
    }

    /// Snapshot of all live sessions
    pub fn sessions_snapshot(&self) -> Result<Vec<Arc<Session>>> {
        Ok(self
            .sessions
            .read()
            .map_err(|e| Error::internal(format!("Lock error: {}", e)))?
            .values()
            .cloned()
            .collect())
    }

    /// Number of live sessions
    pub fn session_count(&self) -> usize {
        self.sessions.read().map(|s| s.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{BrowserEngine, LaunchOptions, MockEngine};

    async fn launch() -> LaunchResult {
        MockEngine::new()
            .launch(EngineKind::Chromium, LaunchOptions::default())
            .await
            .unwrap()
    }

    fn meta() -> SessionMeta {
        SessionMeta {
            kind: EngineKind::Chromium,
            created_at: Utc::now(),
            headless: true,
        }
    }

    #[tokio::test]
    async fn test_create_and_get_session() {
        let registry = SessionRegistry::new();
        let session_id = registry.create_session(launch().await, meta()).unwrap();

        let session = registry.get_session(&session_id).unwrap();
        assert_eq!(session.id(), session_id);
        assert_eq!(registry.session_count(), 1);
    }

    #[tokio::test]
    async fn test_malformed_id_is_validation_not_not_found() {
        let registry = SessionRegistry::new();

        // No sessions exist at all; malformed input must still be Validation
        let result = registry.get_session("not-a-uuid");
        assert!(matches!(result.unwrap_err(), Error::Validation(_)));

        let session_id = registry.create_session(launch().await, meta()).unwrap();
        let result = registry.get_page(&session_id, "also-not-a-uuid");
        assert!(matches!(result.unwrap_err(), Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_unknown_id_is_not_found() {
        let registry = SessionRegistry::new();
        let ghost = Uuid::new_v4().to_string();

        let result = registry.get_session(&ghost);
        assert!(matches!(result.unwrap_err(), Error::SessionNotFound(_)));
    }

    #[tokio::test]
    async fn test_page_bookkeeping() {
        let registry = SessionRegistry::new();
        let session_id = registry.create_session(launch().await, meta()).unwrap();
        let session = registry.get_session(&session_id).unwrap();

        let page = session.context().new_page().await.unwrap();
        let page_id = session.add_page(page).unwrap();

        assert_eq!(session.active_page().as_deref(), Some(page_id.as_str()));
        assert!(registry.get_page(&session_id, &page_id).is_ok());
        assert_eq!(registry.page_ids(&session_id).unwrap().len(), 1);

        assert!(session.remove_page(&page_id).unwrap());
        assert_eq!(session.active_page(), None);
        let result = registry.get_page(&session_id, &page_id);
        assert!(matches!(result.unwrap_err(), Error::PageNotFound(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_activity_tracking() {
        let registry = SessionRegistry::new();
        let session_id = registry.create_session(launch().await, meta()).unwrap();
        let session = registry.get_session(&session_id).unwrap();

        tokio::time::advance(Duration::from_secs(30)).await;
        assert!(session.idle_for() >= Duration::from_secs(30));

        registry.update_activity(&session_id).unwrap();
        assert!(session.idle_for() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_delete_session() {
        let registry = SessionRegistry::new();
        let session_id = registry.create_session(launch().await, meta()).unwrap();

        let removed = registry.delete_session(&session_id).unwrap();
        assert!(removed.is_some());
        assert!(!registry.has_session(&session_id));

        // Second delete observes the session already gone
        let removed = registry.delete_session(&session_id).unwrap();
        assert!(removed.is_none());
    }
}
