//! Network route tracking
//!
//! Bookkeeping for network-intercept registrations per page, so they can be
//! removed individually or bulk-cleared on page/session teardown. The engine
//! owns the actual interception; this table only remembers what was
//! registered and under which id.

use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

use crate::{Error, Result};

/// What to do with an intercepted request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteAction {
    /// Let the request through
    Continue,
    /// Abort the request
    Abort,
    /// Answer with a canned response
    Fulfill {
        status: u16,
        content_type: String,
        body: String,
    },
}

/// One registered network-intercept rule
#[derive(Debug, Clone)]
pub struct RouteRegistration {
    /// URL pattern the rule matches
    pub pattern: String,
    /// Action applied to matching requests
    pub action: RouteAction,
}

type PageRoutes = HashMap<String, RouteRegistration>;

/// Per-page route registration table
#[derive(Default)]
pub struct RouteTable {
    routes: RwLock<HashMap<(String, String), PageRoutes>>,
}

impl RouteTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a registration, returning its generated id
    pub fn add(
        &self,
        session_id: &str,
        page_id: &str,
        registration: RouteRegistration,
    ) -> Result<String> {
        let route_id = Uuid::new_v4().to_string();
        self.routes
            .write()
            .map_err(|e| Error::internal(format!("Lock error: {}", e)))?
            .entry((session_id.to_string(), page_id.to_string()))
            .or_default()
            .insert(route_id.clone(), registration);
        Ok(route_id)
    }

    /// Remove registrations for a page, returning the removed entries.
    ///
    /// With `route_ids` absent, removes every registration for the page.
    /// Unknown ids are skipped.
    pub fn remove(
        &self,
        session_id: &str,
        page_id: &str,
        route_ids: Option<&[String]>,
    ) -> Result<Vec<RouteRegistration>> {
        let key = (session_id.to_string(), page_id.to_string());
        let mut routes = self
            .routes
            .write()
            .map_err(|e| Error::internal(format!("Lock error: {}", e)))?;

        let Some(page_routes) = routes.get_mut(&key) else {
            return Ok(Vec::new());
        };

        let removed = match route_ids {
            Some(ids) => ids
                .iter()
                .filter_map(|id| page_routes.remove(id))
                .collect(),
            None => page_routes.drain().map(|(_, r)| r).collect(),
        };

        if page_routes.is_empty() {
            routes.remove(&key);
        }
        Ok(removed)
    }

    /// All registration ids and patterns for a page
    pub fn list(&self, session_id: &str, page_id: &str) -> Vec<(String, String)> {
        let key = (session_id.to_string(), page_id.to_string());
        self.routes
            .read()
            .map(|routes| {
                routes
                    .get(&key)
                    .map(|page_routes| {
                        page_routes
                            .iter()
                            .map(|(id, r)| (id.clone(), r.pattern.clone()))
                            .collect()
                    })
                    .unwrap_or_default()
            })
            .unwrap_or_default()
    }

    /// Drop all registrations for a closed page
    pub fn clear_page(&self, session_id: &str, page_id: &str) {
        let key = (session_id.to_string(), page_id.to_string());
        if let Ok(mut routes) = self.routes.write() {
            routes.remove(&key);
        }
    }

    /// Drop all registrations for a torn-down session
    pub fn clear_session(&self, session_id: &str) {
        if let Ok(mut routes) = self.routes.write() {
            routes.retain(|(sid, _), _| sid != session_id);
        }
    }

    /// Number of registrations across all pages
    pub fn route_count(&self) -> usize {
        self.routes
            .read()
            .map(|r| r.values().map(|p| p.len()).sum())
            .unwrap_or(0)
    }
}
