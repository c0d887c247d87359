//! Dialog lifecycle guard
//!
//! A native dialog blocks all further interaction with its page until it is
//! resolved, so every dialog reported by the engine must reach a terminal
//! state within bounded time. Each page is a small state machine: Idle until
//! a dialog-opened notification arrives, Pending while the dialog is open,
//! and back to Idle once the dialog is accepted, dismissed, auto-dismissed,
//! or orphaned by its page closing.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::engine::{DialogHandle, DialogKind};
use crate::{Error, Result};

/// Observable per-page dialog state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogState {
    /// No dialog open on the page
    Idle,
    /// A dialog is open and awaiting resolution
    Pending,
}

struct PendingDialog {
    dialog: Arc<dyn DialogHandle>,
    kind: DialogKind,
    message: String,
    timer: JoinHandle<()>,
}

type PendingMap = HashMap<(String, String), PendingDialog>;

/// Tracks at most one pending dialog per page and guarantees bounded-time
/// resolution via an auto-dismiss timer.
pub struct DialogGuard {
    auto_dismiss: Duration,
    pending: Arc<Mutex<PendingMap>>,
}

impl DialogGuard {
    /// Create a guard with the given auto-dismiss duration
    pub fn new(auto_dismiss: Duration) -> Self {
        Self {
            auto_dismiss,
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Record a dialog-opened notification and arm the auto-dismiss timer.
    ///
    /// The engine serializes dialog presentation per page, so a second
    /// notification while one is pending indicates a missed resolution; the
    /// stale entry is replaced and its timer cancelled.
    pub fn on_dialog_opened(
        &self,
        session_id: &str,
        page_id: &str,
        dialog: Arc<dyn DialogHandle>,
    ) -> Result<()> {
        let key = (session_id.to_string(), page_id.to_string());
        let kind = dialog.kind();
        let message = dialog.message().to_string();

        debug!(
            session_id = %session_id,
            page_id = %page_id,
            kind = %kind,
            "Dialog opened, page Idle -> Pending"
        );

        let timer = self.spawn_auto_dismiss(key.clone());
        let entry = PendingDialog {
            dialog,
            kind,
            message,
            timer,
        };

        let stale = self
            .pending
            .lock()
            .map_err(|e| Error::internal(format!("Lock error: {}", e)))?
            .insert(key.clone(), entry);

        if let Some(stale) = stale {
            stale.timer.abort();
            warn!(
                session_id = %key.0,
                page_id = %key.1,
                "Replacing unresolved pending dialog"
            );
        }

        Ok(())
    }

    fn spawn_auto_dismiss(&self, key: (String, String)) -> JoinHandle<()> {
        let pending = self.pending.clone();
        let auto_dismiss = self.auto_dismiss;
        tokio::spawn(async move {
            tokio::time::sleep(auto_dismiss).await;

            let entry = match pending.lock() {
                Ok(mut map) => map.remove(&key),
                Err(_) => None,
            };

            // Already resolved by the time the timer fired
            let Some(entry) = entry else { return };

            // Safety net, not a bug: the caller abandoned the dialog
            warn!(
                session_id = %key.0,
                page_id = %key.1,
                kind = %entry.kind,
                "Auto-dismissing unhandled dialog, page Pending -> Idle"
            );
            if let Err(e) = entry.dialog.dismiss().await {
                warn!(
                    session_id = %key.0,
                    page_id = %key.1,
                    error = %e,
                    "Failed to auto-dismiss dialog"
                );
            }
        })
    }

    /// Explicitly resolve the pending dialog on a page.
    ///
    /// Cancels the auto-dismiss timer, then accepts or dismisses the
    /// underlying dialog. Fails with [`Error::NoPendingDialog`] if the page
    /// has nothing pending — a caller logic error, not a transient failure.
    pub async fn handle_dialog(
        &self,
        session_id: &str,
        page_id: &str,
        accept: bool,
        prompt_text: Option<&str>,
    ) -> Result<()> {
        let key = (session_id.to_string(), page_id.to_string());
        let entry = self
            .pending
            .lock()
            .map_err(|e| Error::internal(format!("Lock error: {}", e)))?
            .remove(&key)
            .ok_or_else(|| {
                Error::no_pending_dialog(format!("page {} has no open dialog", page_id))
            })?;

        entry.timer.abort();

        debug!(
            session_id = %session_id,
            page_id = %page_id,
            kind = %entry.kind,
            accept,
            "Resolving dialog, page Pending -> Idle"
        );

        if accept {
            entry.dialog.accept(prompt_text).await
        } else {
            entry.dialog.dismiss().await
        }
    }

    /// Observable dialog state for a page
    pub fn state(&self, session_id: &str, page_id: &str) -> DialogState {
        let key = (session_id.to_string(), page_id.to_string());
        match self.pending.lock() {
            Ok(map) if map.contains_key(&key) => DialogState::Pending,
            _ => DialogState::Idle,
        }
    }

    /// Kind and message of the pending dialog on a page, if any
    pub fn pending_info(&self, session_id: &str, page_id: &str) -> Option<(DialogKind, String)> {
        let key = (session_id.to_string(), page_id.to_string());
        self.pending
            .lock()
            .ok()
            .and_then(|map| map.get(&key).map(|p| (p.kind, p.message.clone())))
    }

    /// Clear any pending dialog for a closed page.
    ///
    /// The underlying page is already gone, so the dialog handle is dropped
    /// without interaction.
    pub fn clear_page(&self, session_id: &str, page_id: &str) {
        let key = (session_id.to_string(), page_id.to_string());
        if let Ok(mut map) = self.pending.lock() {
            if let Some(entry) = map.remove(&key) {
                entry.timer.abort();
                debug!(
                    session_id = %session_id,
                    page_id = %page_id,
                    "Page closed with dialog pending, Pending -> Idle"
                );
            }
        }
    }

    /// Clear all pending dialogs for a torn-down session
    pub fn clear_session(&self, session_id: &str) {
        if let Ok(mut map) = self.pending.lock() {
            map.retain(|(sid, _), entry| {
                if sid == session_id {
                    entry.timer.abort();
                    false
                } else {
                    true
                }
            });
        }
    }

    /// Number of dialogs currently pending across all pages
    pub fn pending_count(&self) -> usize {
        self.pending.lock().map(|m| m.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::MockDialogHandle;

    const AUTO_DISMISS: Duration = Duration::from_millis(200);

    fn open_dialog(guard: &DialogGuard, sid: &str, pid: &str) -> Arc<MockDialogHandle> {
        let dialog = Arc::new(MockDialogHandle::new(DialogKind::Confirm, "are you sure?"));
        guard.on_dialog_opened(sid, pid, dialog.clone()).unwrap();
        dialog
    }

    async fn let_timers_run() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_explicit_accept() {
        let guard = DialogGuard::new(AUTO_DISMISS);
        let dialog = open_dialog(&guard, "s1", "p1");

        assert_eq!(guard.state("s1", "p1"), DialogState::Pending);
        guard
            .handle_dialog("s1", "p1", true, Some("hello"))
            .await
            .unwrap();

        assert!(dialog.was_accepted());
        assert_eq!(dialog.prompt_text().as_deref(), Some("hello"));
        assert_eq!(guard.state("s1", "p1"), DialogState::Idle);
    }

    #[tokio::test]
    async fn test_explicit_dismiss() {
        let guard = DialogGuard::new(AUTO_DISMISS);
        let dialog = open_dialog(&guard, "s1", "p1");

        guard.handle_dialog("s1", "p1", false, None).await.unwrap();
        assert!(dialog.was_dismissed());
        assert!(!dialog.was_accepted());
    }

    #[tokio::test]
    async fn test_no_pending_dialog() {
        let guard = DialogGuard::new(AUTO_DISMISS);
        let result = guard.handle_dialog("s1", "p1", true, None).await;
        assert!(matches!(result.unwrap_err(), Error::NoPendingDialog(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_dismiss_after_timeout() {
        let guard = DialogGuard::new(AUTO_DISMISS);
        let dialog = open_dialog(&guard, "s1", "p1");

        tokio::time::advance(AUTO_DISMISS + Duration::from_millis(10)).await;
        let_timers_run().await;

        assert!(dialog.was_dismissed());
        assert_eq!(guard.state("s1", "p1"), DialogState::Idle);

        // Resolution after the safety net fired is a caller error
        let result = guard.handle_dialog("s1", "p1", true, None).await;
        assert!(matches!(result.unwrap_err(), Error::NoPendingDialog(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_resolution_cancels_timer() {
        let guard = DialogGuard::new(AUTO_DISMISS);
        let dialog = open_dialog(&guard, "s1", "p1");

        guard.handle_dialog("s1", "p1", true, None).await.unwrap();

        tokio::time::advance(AUTO_DISMISS * 2).await;
        let_timers_run().await;

        // The cancelled timer must not dismiss an accepted dialog
        assert!(dialog.was_accepted());
        assert!(!dialog.was_dismissed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_page_close_clears_without_touching_dialog() {
        let guard = DialogGuard::new(AUTO_DISMISS);
        let dialog = open_dialog(&guard, "s1", "p1");

        guard.clear_page("s1", "p1");
        assert_eq!(guard.state("s1", "p1"), DialogState::Idle);

        tokio::time::advance(AUTO_DISMISS * 2).await;
        let_timers_run().await;

        // The page was already gone; the dialog is never interacted with
        assert!(!dialog.was_dismissed());
        assert!(!dialog.was_accepted());
    }

    #[tokio::test]
    async fn test_clear_session_cascades() {
        let guard = DialogGuard::new(AUTO_DISMISS);
        open_dialog(&guard, "s1", "p1");
        open_dialog(&guard, "s1", "p2");
        open_dialog(&guard, "s2", "p3");

        guard.clear_session("s1");
        assert_eq!(guard.pending_count(), 1);
        assert_eq!(guard.state("s2", "p3"), DialogState::Pending);
    }

    #[tokio::test]
    async fn test_pending_info() {
        let guard = DialogGuard::new(AUTO_DISMISS);
        open_dialog(&guard, "s1", "p1");

        let (kind, message) = guard.pending_info("s1", "p1").unwrap();
        assert_eq!(kind, DialogKind::Confirm);
        assert_eq!(message, "are you sure?");
        assert!(guard.pending_info("s1", "p2").is_none());
    }
}
