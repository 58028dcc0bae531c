//! Per-session conversation memory.

use crate::error::{DocentError, Result};
use crate::llm::ChatMessage;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::debug;

/// Session used when a caller does not supply one.
pub const DEFAULT_SESSION: &str = "default";

/// Shared map from session id to transcript.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, Vec<ChatMessage>>>>,
    max_messages: usize,
}

impl SessionStore {
    /// Create a store keeping at most `max_messages` per session (0 = unbounded).
    pub fn new(max_messages: usize) -> Self {
        Self {
            sessions: Arc::default(),
            max_messages,
        }
    }

    /// Transcript for a session, created empty on first use.
    pub fn history(&self, session_id: &str) -> Result<Vec<ChatMessage>> {
        if let Some(history) = self.read()?.get(session_id) {
            return Ok(history.clone());
        }

        let mut sessions = self.write()?;
        Ok(sessions.entry(session_id.to_string()).or_default().clone())
    }

    /// Whether a session is known, without creating it.
    pub fn contains(&self, session_id: &str) -> Result<bool> {
        Ok(self.read()?.contains_key(session_id))
    }

    /// Start an empty session if it does not exist yet.
    pub fn register(&self, session_id: &str) -> Result<()> {
        self.write()?.entry(session_id.to_string()).or_default();
        Ok(())
    }

    /// Record a finished exchange.
    pub fn append_turn(&self, session_id: &str, input: &str, output: &str) -> Result<()> {
        let mut sessions = self.write()?;
        let history = sessions.entry(session_id.to_string()).or_default();
        history.push(ChatMessage::user(input));
        history.push(ChatMessage::assistant(output));

        if self.max_messages > 0 && history.len() > self.max_messages {
            // Whole turns only, so the transcript still starts with a user message
            let mut excess = history.len() - self.max_messages;
            excess += excess % 2;
            history.drain(..excess.min(history.len()));
            debug!("Trimmed {} messages from session {}", excess, session_id);
        }

        Ok(())
    }

    /// Forget a session. Returns whether it existed.
    pub fn clear(&self, session_id: &str) -> Result<bool> {
        Ok(self.write()?.remove(session_id).is_some())
    }

    /// Number of known sessions.
    pub fn len(&self) -> usize {
        self.sessions.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, HashMap<String, Vec<ChatMessage>>>> {
        self.sessions
            .read()
            .map_err(|e| DocentError::Session(format!("Failed to acquire lock: {}", e)))
    }

    fn write(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<String, Vec<ChatMessage>>>> {
        self.sessions
            .write()
            .map_err(|e| DocentError::Session(format!("Failed to acquire lock: {}", e)))
    }
}
