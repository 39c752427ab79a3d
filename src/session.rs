//! Append-only chat log, persisted per profile key.
//!
//! Load replays the stored list without re-persisting; every append re-writes
//! the full list. Persistence failures are logged and swallowed — the message
//! is still returned to the caller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::store::{history_key, JsonStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Bot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ChatMessage {
    pub text: String,
    pub sender: Sender,
    pub timestamp: DateTime<Utc>,
}

/// Storage identifier derived from the profile URL: the percent-decoded path
/// segment after `/in/`. URLs without that shape fall back to a sanitized
/// form of the whole URL so every page still gets a stable key.
pub fn profile_key(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(rest) = parsed.path().strip_prefix("/in/") {
            let segment = rest.trim_end_matches('/');
            if !segment.is_empty() {
                return urlencoding::decode(segment)
                    .map(|c| c.into_owned())
                    .unwrap_or_else(|_| segment.to_string());
            }
        }
    }
    url.chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect()
}

pub struct ChatSession {
    profile_key: String,
    messages: Vec<ChatMessage>,
}

impl ChatSession {
    /// Read the persisted history for `profile_key` and replay it. A missing
    /// or undecodable list starts the session empty.
    pub async fn load(store: &JsonStore, profile_key: String) -> Self {
        let messages: Vec<ChatMessage> =
            store.get(&history_key(&profile_key)).await.unwrap_or_default();
        if !messages.is_empty() {
            tracing::info!(key = %profile_key, count = messages.len(), "loaded chat history");
        }
        Self { profile_key, messages }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// The last `n` messages before the most recent one. Used to bound the
    /// conversation context sent to the completion endpoint.
    pub fn recent_before_last(&self, n: usize) -> &[ChatMessage] {
        let prior = &self.messages[..self.messages.len().saturating_sub(1)];
        &prior[prior.len().saturating_sub(n)..]
    }

    /// Append one message and re-persist the full list.
    pub async fn append(&mut self, store: &JsonStore, text: String, sender: Sender) -> ChatMessage {
        let message = ChatMessage { text, sender, timestamp: Utc::now() };
        self.messages.push(message.clone());
        self.persist(store).await;
        message
    }

    /// Wipe the history and re-persist the empty list.
    pub async fn clear(&mut self, store: &JsonStore) {
        self.messages.clear();
        self.persist(store).await;
    }

    async fn persist(&self, store: &JsonStore) {
        if let Err(e) = store.set(&history_key(&self.profile_key), &self.messages).await {
            tracing::error!(key = %self.profile_key, "failed to persist chat history: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (tempfile::TempDir, JsonStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path().join("state.json"));
        (dir, store)
    }

    #[test]
    fn test_profile_key_from_path_segment() {
        assert_eq!(profile_key("https://www.linkedin.com/in/jane-doe/"), "jane-doe");
        assert_eq!(profile_key("https://www.linkedin.com/in/jane-doe"), "jane-doe");
    }

    #[test]
    fn test_profile_key_percent_decoded() {
        assert_eq!(profile_key("https://www.linkedin.com/in/j%C3%A4ne"), "jäne");
    }

    #[test]
    fn test_profile_key_fallback_is_sanitized() {
        let key = profile_key("https://example.com/people/42");
        assert!(key.chars().all(|c| c.is_alphanumeric() || c == '_'));
    }

    #[tokio::test]
    async fn test_history_roundtrip_preserves_order_and_senders() {
        let (_dir, store) = temp_store();
        let mut session = ChatSession::load(&store, "jane-doe".to_string()).await;

        session.append(&store, "hi".to_string(), Sender::User).await;
        session.append(&store, "hello!".to_string(), Sender::Bot).await;
        session.append(&store, "what do you do?".to_string(), Sender::User).await;

        let reloaded = ChatSession::load(&store, "jane-doe".to_string()).await;
        assert_eq!(reloaded.messages().len(), 3);
        assert_eq!(reloaded.messages()[0].text, "hi");
        assert_eq!(reloaded.messages()[0].sender, Sender::User);
        assert_eq!(reloaded.messages()[1].sender, Sender::Bot);
        assert_eq!(reloaded.messages()[2].text, "what do you do?");
    }

    #[tokio::test]
    async fn test_clear_then_append_leaves_single_message() {
        let (_dir, store) = temp_store();
        let mut session = ChatSession::load(&store, "jane-doe".to_string()).await;
        session.append(&store, "old".to_string(), Sender::User).await;
        session.append(&store, "older".to_string(), Sender::Bot).await;

        session.clear(&store).await;
        session.append(&store, "fresh start".to_string(), Sender::User).await;

        let reloaded = ChatSession::load(&store, "jane-doe".to_string()).await;
        assert_eq!(reloaded.messages().len(), 1);
        assert_eq!(reloaded.messages()[0].text, "fresh start");
    }

    #[tokio::test]
    async fn test_histories_are_isolated_per_profile() {
        let (_dir, store) = temp_store();
        let mut a = ChatSession::load(&store, "jane-doe".to_string()).await;
        let mut b = ChatSession::load(&store, "john-smith".to_string()).await;
        a.append(&store, "for jane".to_string(), Sender::User).await;
        b.append(&store, "for john".to_string(), Sender::User).await;

        let a2 = ChatSession::load(&store, "jane-doe".to_string()).await;
        assert_eq!(a2.messages().len(), 1);
        assert_eq!(a2.messages()[0].text, "for jane");
    }

    #[test]
    fn test_recent_before_last_excludes_newest() {
        let mut messages = Vec::new();
        for i in 0..15 {
            messages.push(ChatMessage {
                text: format!("m{}", i),
                sender: Sender::User,
                timestamp: Utc::now(),
            });
        }
        let session = ChatSession { profile_key: "k".to_string(), messages };
        let recent = session.recent_before_last(10);
        assert_eq!(recent.len(), 10);
        assert_eq!(recent.first().unwrap().text, "m4");
        assert_eq!(recent.last().unwrap().text, "m13");
    }
}
