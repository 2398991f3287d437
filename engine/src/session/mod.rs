//! Session Memory Store
//!
//! Process-wide store of conversations keyed by session id. Each session holds
//! the chronological message log and a free-form context bag (stored GPS
//! coordinate, last looked-up outlet, ...).
//!
//! Sessions are created lazily on first reference and emptied only by an
//! explicit `clear`. There is no eviction; bounding the number of live
//! sessions is the embedding application's job.
//!
//! # Concurrency
//!
//! Every session sits behind its own `tokio::sync::Mutex`. The planner locks a
//! session for the whole turn, so two turns for the same id never interleave,
//! while turns for different ids only share the brief read lock on the map.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use crate::llm::{Message, MessageRole};
use crate::location::Coordinate;

mod window;

pub use window::{estimate_tokens, history_window};

/// Context key for the out-of-band GPS coordinate
pub const USER_LOCATION_KEY: &str = "user_location";

/// Context key for the most recently looked-up outlet
pub const CURRENT_OUTLET_KEY: &str = "current_outlet";

/// Free-form key/value context attached to a session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionContext(Map<String, Value>);

impl SessionContext {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Stored GPS coordinate, if one was supplied and is well-formed
    pub fn user_location(&self) -> Option<Coordinate> {
        self.get(USER_LOCATION_KEY).and_then(Coordinate::from_value)
    }

    pub fn set_user_location(&mut self, coordinate: Coordinate) {
        self.insert(USER_LOCATION_KEY, coordinate.to_value());
    }

    pub fn current_outlet(&self) -> Option<&Value> {
        self.get(CURRENT_OUTLET_KEY)
    }
}

/// One conversation
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub messages: Vec<Message>,
    pub context: SessionContext,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            messages: Vec::new(),
            context: SessionContext::default(),
            created_at: Utc::now(),
        }
    }

    /// Append a message at the end of the log.
    ///
    /// Only user and assistant messages belong in a session; system text is
    /// rebuilt on every turn.
    pub fn append(&mut self, message: Message) {
        if message.role == MessageRole::System {
            debug!(session_id = %self.id, "ignoring system message append");
            return;
        }
        self.messages.push(message);
    }

    /// Empty both the message log and the context
    pub fn clear(&mut self) {
        self.messages.clear();
        self.context.clear();
    }
}

/// Shared session store
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Arc<Mutex<Session>>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the session for `id`, creating an empty one on first reference
    pub async fn get_or_create(&self, id: &str) -> Arc<Mutex<Session>> {
        if let Some(session) = self.sessions.read().await.get(id) {
            return Arc::clone(session);
        }

        let mut sessions = self.sessions.write().await;
        Arc::clone(sessions.entry(id.to_string()).or_insert_with(|| {
            debug!(session_id = %id, "creating session");
            Arc::new(Mutex::new(Session::new(id)))
        }))
    }

    /// Append a message to the session's log
    pub async fn append(&self, id: &str, message: Message) {
        let session = self.get_or_create(id).await;
        session.lock().await.append(message);
    }

    /// Empty the session's log and context.
    ///
    /// The session entry itself is kept so that a handle obtained earlier
    /// still refers to the live session.
    pub async fn clear(&self, id: &str) {
        let session = self.sessions.read().await.get(id).cloned();
        if let Some(session) = session {
            session.lock().await.clear();
            debug!(session_id = %id, "session cleared");
        }
    }

    /// Snapshot of the session's messages in chronological order
    pub async fn history(&self, id: &str) -> Vec<Message> {
        let session = self.sessions.read().await.get(id).cloned();
        match session {
            Some(session) => session.lock().await.messages.clone(),
            None => Vec::new(),
        }
    }

    /// Snapshot of the session's context
    pub async fn context(&self, id: &str) -> SessionContext {
        let session = self.sessions.read().await.get(id).cloned();
        match session {
            Some(session) => session.lock().await.context.clone(),
            None => SessionContext::default(),
        }
    }

    /// Number of live sessions
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_get_or_create_is_lazy_and_stable() {
        let store = SessionStore::new();
        assert!(store.is_empty().await);

        let a = store.get_or_create("s1").await;
        let b = store.get_or_create("s1").await;
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(store.len().await, 1);
        assert!(a.lock().await.messages.is_empty());
    }

    #[tokio::test]
    async fn test_append_keeps_order() {
        let store = SessionStore::new();
        store.append("s1", Message::user("first")).await;
        store.append("s1", Message::assistant("second")).await;
        store.append("s1", Message::user("third")).await;

        let history = store.history("s1").await;
        let contents: Vec<&str> = history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_system_messages_are_not_stored() {
        let store = SessionStore::new();
        store.append("s1", Message::system("rules")).await;
        assert!(store.history("s1").await.is_empty());
    }

    #[tokio::test]
    async fn test_clear_empties_log_and_context() {
        let store = SessionStore::new();
        store.append("s1", Message::user("hi")).await;
        store
            .get_or_create("s1")
            .await
            .lock()
            .await
            .context
            .insert(CURRENT_OUTLET_KEY, json!({"name": "SS 2"}));

        let handle = store.get_or_create("s1").await;
        store.clear("s1").await;

        assert!(store.history("s1").await.is_empty());
        assert!(store.context("s1").await.is_empty());
        assert!(handle.lock().await.messages.is_empty());
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let store = SessionStore::new();
        store.append("a", Message::user("from a")).await;
        store
            .get_or_create("a")
            .await
            .lock()
            .await
            .context
            .insert(USER_LOCATION_KEY, json!({"latitude": 3.1, "longitude": 101.6}));

        assert!(store.history("b").await.is_empty());
        assert!(store.context("b").await.user_location().is_none());
        assert!(store.context("a").await.user_location().is_some());
    }

    #[tokio::test]
    async fn test_clear_unknown_session_is_noop() {
        let store = SessionStore::new();
        store.clear("ghost").await;
        assert_eq!(store.len().await, 0);
    }

    #[test]
    fn test_context_location_round_trip() {
        let mut context = SessionContext::default();
        let coordinate = Coordinate::new(3.0738, 101.5183).unwrap();
        context.set_user_location(coordinate);

        assert_eq!(context.user_location(), Some(coordinate));
    }

    #[test]
    fn test_malformed_location_is_ignored() {
        let mut context = SessionContext::default();
        context.insert(USER_LOCATION_KEY, json!({"latitude": "north"}));
        assert!(context.user_location().is_none());
    }
}
