//! Session lifecycle.
//!
//! One `ProfileSession` at a time, constructed on navigation and owned here
//! rather than living as ambient global state. Navigation re-runs extraction
//! (with its retry loop), re-evaluates the persona match against the stored
//! config, and reloads the persisted history — the same refresh the original
//! page watcher performed on URL changes. The session sits behind an async
//! mutex, so overlapping sends are served one at a time.

use std::sync::Arc;

use anyhow::{bail, Result};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::extractor::{self, PageFetcher, ProfileRecord};
use crate::persona::{self, MergedPersona, PersonaConfig};
use crate::responder::Responder;
use crate::session::{profile_key, ChatMessage, ChatSession, Sender};
use crate::store::{JsonStore, KEY_PERSONALITY};

pub struct ProfileSession {
    pub id: Uuid,
    pub persona: MergedPersona,
    pub chat: ChatSession,
}

/// Snapshot handed to the API layer.
#[derive(Debug, Clone)]
pub struct SessionView {
    pub id: Uuid,
    pub profile: ProfileRecord,
    pub is_own_profile: bool,
    pub welcome_message: String,
    pub history: Vec<ChatMessage>,
}

pub struct Runtime {
    store: Arc<JsonStore>,
    fetcher: PageFetcher,
    responder: Responder,
    active: Mutex<Option<ProfileSession>>,
}

impl Runtime {
    pub fn new(store: Arc<JsonStore>, fetcher: PageFetcher, responder: Responder) -> Self {
        Self { store, fetcher, responder, active: Mutex::new(None) }
    }

    pub fn store(&self) -> &JsonStore {
        &self.store
    }

    /// Open a session for a profile page: scrape (retrying while the page
    /// settles), apply the persona match, and replay the stored history.
    /// Replaces any previously active session.
    pub async fn navigate(&self, url: &str) -> Result<SessionView> {
        if !extractor::is_profile_url(url) {
            bail!("not a profile page: {}", url);
        }

        let record = extractor::extract_with_retry(&self.fetcher, url).await;
        let config: Option<PersonaConfig> = self.store.get(KEY_PERSONALITY).await;
        let merged = persona::merge(record, config.as_ref());
        let chat = ChatSession::load(&self.store, profile_key(url)).await;

        let session = ProfileSession { id: Uuid::new_v4(), persona: merged, chat };
        tracing::info!(
            session = %session.id,
            profile = %session.persona.record.name,
            own = session.persona.is_own_profile,
            "session opened"
        );

        let view = view_of(&session, &self.responder);
        *self.active.lock().await = Some(session);
        Ok(view)
    }

    pub async fn current(&self) -> Option<SessionView> {
        let guard = self.active.lock().await;
        guard.as_ref().map(|s| view_of(s, &self.responder))
    }

    /// Append the user message, generate the reply, append and return it.
    /// Holding the session lock across generation keeps one request in
    /// flight per session.
    pub async fn send_message(&self, text: &str) -> Result<String> {
        let text = text.trim();
        if text.is_empty() {
            bail!("empty message");
        }

        let mut guard = self.active.lock().await;
        let Some(session) = guard.as_mut() else {
            bail!("no active session; navigate to a profile first");
        };

        session.chat.append(&self.store, text.to_string(), Sender::User).await;
        let history = session.chat.recent_before_last(10).to_vec();
        let reply = self
            .responder
            .generate(&self.store, &session.persona.record, &history, text)
            .await;
        session.chat.append(&self.store, reply.clone(), Sender::Bot).await;
        Ok(reply)
    }

    /// Check the stored credential against the completion endpoint.
    pub async fn test_credential(&self) -> (bool, String) {
        self.responder.test_credential(&self.store).await
    }

    pub async fn history(&self) -> Result<Vec<ChatMessage>> {
        let guard = self.active.lock().await;
        let Some(session) = guard.as_ref() else {
            bail!("no active session");
        };
        Ok(session.chat.messages().to_vec())
    }

    pub async fn clear_history(&self) -> Result<()> {
        let mut guard = self.active.lock().await;
        let Some(session) = guard.as_mut() else {
            bail!("no active session");
        };
        session.chat.clear(&self.store).await;
        tracing::info!(session = %session.id, "chat history cleared");
        Ok(())
    }
}

fn view_of(session: &ProfileSession, responder: &Responder) -> SessionView {
    SessionView {
        id: session.id,
        profile: session.persona.record.clone(),
        is_own_profile: session.persona.is_own_profile,
        welcome_message: responder.welcome_message(&session.persona),
        history: session.chat.messages().to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::CompletionClient;
    use crate::extractor::FetchMode;
    use crate::responder::ResponseTables;

    fn test_runtime(dir: &tempfile::TempDir) -> Runtime {
        let store = Arc::new(JsonStore::new(dir.path().join("state.json")));
        let responder = Responder::new(
            ResponseTables::default(),
            CompletionClient::new("http://127.0.0.1:9".to_string(), "gpt-4o".to_string()),
        );
        Runtime::new(store, PageFetcher::new(FetchMode::Static).unwrap(), responder)
    }

    #[tokio::test]
    async fn test_send_without_session_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = test_runtime(&dir);
        assert!(runtime.send_message("hello").await.is_err());
        assert!(runtime.history().await.is_err());
    }

    #[tokio::test]
    async fn test_navigate_rejects_non_profile_urls() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = test_runtime(&dir);
        assert!(runtime.navigate("https://example.com/whatever").await.is_err());
        assert!(runtime.navigate("https://www.linkedin.com/feed/").await.is_err());
    }

    #[tokio::test]
    async fn test_empty_message_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = test_runtime(&dir);
        assert!(runtime.send_message("   ").await.is_err());
    }
}
