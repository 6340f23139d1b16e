//! In-memory session store
//!
//! Tracks voice development conversations: each session carries a role/content
//! history plus free-form context. The store is bounded; creating a session
//! past the cap evicts the oldest one by creation time. No persistence, state
//! is lost on restart.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

/// One conversation entry within a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionEntry {
    pub role: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// A voice development session with its conversation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub history: Vec<SessionEntry>,
    #[serde(default)]
    pub context: HashMap<String, String>,
}

impl Session {
    fn new(context: HashMap<String, String>) -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            history: Vec::new(),
            context,
        }
    }

    pub fn add_entry(&mut self, role: impl Into<String>, content: impl Into<String>) {
        self.history.push(SessionEntry {
            role: role.into(),
            content: content.into(),
            timestamp: Utc::now(),
        });
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            session_id: self.session_id.clone(),
            created_at: self.created_at,
            entries: self.history.len(),
            context: self.context.clone(),
        }
    }
}

/// Listing view of a session, history elided.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub entries: usize,
    pub context: HashMap<String, String>,
}

/// Thread-safe bounded session store.
pub struct SessionManager {
    sessions: RwLock<HashMap<String, Session>>,
    max_sessions: usize,
}

impl SessionManager {
    pub fn new(max_sessions: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_sessions,
        }
    }

    /// Create a session, evicting the oldest (by creation time) while the
    /// store is over capacity. Returns the new session.
    pub fn create_session(&self, context: HashMap<String, String>) -> Session {
        let session = Session::new(context);
        let mut sessions = self.sessions.write().unwrap();
        sessions.insert(session.session_id.clone(), session.clone());

        while sessions.len() > self.max_sessions {
            let oldest = sessions
                .values()
                .min_by_key(|s| s.created_at)
                .map(|s| s.session_id.clone());
            match oldest {
                Some(id) => {
                    debug!(session_id = %id, "evicting oldest session");
                    sessions.remove(&id);
                }
                None => break,
            }
        }

        session
    }

    pub fn get_session(&self, id: &str) -> Option<Session> {
        self.sessions.read().unwrap().get(id).cloned()
    }

    /// Summaries of all sessions, oldest first.
    pub fn list_sessions(&self) -> Vec<SessionSummary> {
        let mut summaries: Vec<SessionSummary> = self
            .sessions
            .read()
            .unwrap()
            .values()
            .map(Session::summary)
            .collect();
        summaries.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        summaries
    }

    /// Delete a session. Returns false when it does not exist.
    pub fn delete_session(&self, id: &str) -> bool {
        self.sessions.write().unwrap().remove(id).is_some()
    }

    /// Append a conversation entry. Returns false when the session does not
    /// exist.
    pub fn add_to_session(&self, id: &str, role: &str, content: &str) -> bool {
        let mut sessions = self.sessions.write().unwrap();
        match sessions.get_mut(id) {
            Some(session) => {
                session.add_entry(role, content);
                true
            }
            None => false,
        }
    }

    pub fn session_count(&self) -> usize {
        self.sessions.read().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_get() {
        let manager = SessionManager::new(10);
        let mut context = HashMap::new();
        context.insert("project".to_string(), "demo".to_string());
        let session = manager.create_session(context);

        let fetched = manager.get_session(&session.session_id).unwrap();
        assert_eq!(fetched.session_id, session.session_id);
        assert_eq!(fetched.context.get("project").unwrap(), "demo");
        assert!(fetched.history.is_empty());
        assert!(manager.get_session("missing").is_none());
    }

    #[test]
    fn test_add_to_session() {
        let manager = SessionManager::new(10);
        let session = manager.create_session(HashMap::new());

        assert!(manager.add_to_session(&session.session_id, "user", "build a rest api"));
        assert!(manager.add_to_session(&session.session_id, "assistant", "fn main() {}"));

        let fetched = manager.get_session(&session.session_id).unwrap();
        assert_eq!(fetched.history.len(), 2);
        assert_eq!(fetched.history[0].role, "user");
        assert_eq!(fetched.history[0].content, "build a rest api");
        assert_eq!(fetched.history[1].role, "assistant");

        assert!(!manager.add_to_session("missing", "user", "x"));
    }

    #[test]
    fn test_delete() {
        let manager = SessionManager::new(10);
        let session = manager.create_session(HashMap::new());
        assert!(manager.delete_session(&session.session_id));
        assert!(!manager.delete_session(&session.session_id));
        assert_eq!(manager.session_count(), 0);
    }

    #[test]
    fn test_eviction_removes_oldest() {
        let manager = SessionManager::new(2);
        let first = manager.create_session(HashMap::new());
        std::thread::sleep(std::time::Duration::from_millis(5));
        let second = manager.create_session(HashMap::new());
        std::thread::sleep(std::time::Duration::from_millis(5));
        let third = manager.create_session(HashMap::new());

        assert_eq!(manager.session_count(), 2);
        assert!(manager.get_session(&first.session_id).is_none());
        assert!(manager.get_session(&second.session_id).is_some());
        assert!(manager.get_session(&third.session_id).is_some());
    }

    #[test]
    fn test_summary_counts_entries() {
        let manager = SessionManager::new(10);
        let session = manager.create_session(HashMap::new());
        manager.add_to_session(&session.session_id, "user", "hello");

        let summaries = manager.list_sessions();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].session_id, session.session_id);
        assert_eq!(summaries[0].entries, 1);
    }

    #[test]
    fn test_list_sorted_by_creation() {
        let manager = SessionManager::new(10);
        let a = manager.create_session(HashMap::new());
        std::thread::sleep(std::time::Duration::from_millis(5));
        let b = manager.create_session(HashMap::new());

        let listed = manager.list_sessions();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].session_id, a.session_id);
        assert_eq!(listed[1].session_id, b.session_id);
    }
}
