//! JSON-file-backed store for chat sessions and the saved API credential.
//!
//! A single file holds the whole state; every mutation rewrites it
//! atomically (temp file + rename). The render pipeline never touches this
//! store.

use std::io::Write;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::chat::{ChatMessage, ChatSession};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("store file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error("session `{id}` not found")]
    UnknownSession { id: Uuid },
    #[error("store write task failed")]
    Background,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreState {
    api_key: Option<String>,
    sessions: Vec<ChatSession>,
}

/// Local persisted state, guarded by a single lock. All flows are
/// serialized by the caller's request handling; the lock only protects
/// against concurrent handler invocations.
pub struct SessionStore {
    path: PathBuf,
    state: RwLock<StoreState>,
}

impl SessionStore {
    /// Open the store, creating parent directories on demand. A missing
    /// file yields an empty store; a corrupt file is an error rather than
    /// silent data loss.
    pub async fn open(path: PathBuf) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let state = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => StoreState::default(),
            Err(err) => return Err(err.into()),
        };

        Ok(Self {
            path,
            state: RwLock::new(state),
        })
    }

    pub async fn api_key(&self) -> Option<String> {
        self.state.read().await.api_key.clone()
    }

    pub async fn set_api_key(&self, api_key: Option<String>) -> Result<(), StoreError> {
        {
            let mut state = self.state.write().await;
            state.api_key = api_key.filter(|key| !key.trim().is_empty());
        }
        self.persist().await
    }

    /// All sessions, newest first.
    pub async fn sessions(&self) -> Vec<ChatSession> {
        let mut sessions = self.state.read().await.sessions.clone();
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        sessions
    }

    pub async fn session(&self, id: Uuid) -> Option<ChatSession> {
        self.state
            .read()
            .await
            .sessions
            .iter()
            .find(|session| session.id == id)
            .cloned()
    }

    pub async fn insert_session(&self, session: ChatSession) -> Result<(), StoreError> {
        self.state.write().await.sessions.push(session);
        self.persist().await
    }

    pub async fn append_message(
        &self,
        id: Uuid,
        message: ChatMessage,
    ) -> Result<ChatSession, StoreError> {
        let updated = {
            let mut state = self.state.write().await;
            let session = state
                .sessions
                .iter_mut()
                .find(|session| session.id == id)
                .ok_or(StoreError::UnknownSession { id })?;
            session.messages.push(message);
            session.clone()
        };
        self.persist().await?;
        Ok(updated)
    }

    pub async fn set_title(&self, id: Uuid, title: String) -> Result<(), StoreError> {
        {
            let mut state = self.state.write().await;
            let session = state
                .sessions
                .iter_mut()
                .find(|session| session.id == id)
                .ok_or(StoreError::UnknownSession { id })?;
            session.title = title;
        }
        self.persist().await
    }

    async fn persist(&self) -> Result<(), StoreError> {
        let snapshot = {
            let state = self.state.read().await;
            serde_json::to_vec_pretty(&*state)?
        };
        let path = self.path.clone();

        tokio::task::spawn_blocking(move || -> Result<(), StoreError> {
            let parent = path
                .parent()
                .filter(|parent| !parent.as_os_str().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("."));
            let mut file = NamedTempFile::new_in(parent)?;
            file.write_all(&snapshot)?;
            file.persist(&path).map_err(|err| StoreError::Io(err.error))?;
            Ok(())
        })
        .await
        .map_err(|_| StoreError::Background)??;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use time::OffsetDateTime;

    use super::*;

    fn session(title: &str) -> ChatSession {
        ChatSession::new(title, OffsetDateTime::now_utc())
    }

    #[tokio::test]
    async fn missing_file_opens_an_empty_store() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SessionStore::open(dir.path().join("sessions.json"))
            .await
            .expect("open");
        assert!(store.sessions().await.is_empty());
        assert!(store.api_key().await.is_none());
    }

    #[tokio::test]
    async fn sessions_survive_a_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("sessions.json");

        let store = SessionStore::open(path.clone()).await.expect("open");
        let mut created = session("Program Supervisi");
        created.messages.push(ChatMessage::model("Selamat datang"));
        store
            .insert_session(created.clone())
            .await
            .expect("insert");

        let reopened = SessionStore::open(path).await.expect("reopen");
        assert_eq!(reopened.sessions().await, vec![created]);
    }

    #[tokio::test]
    async fn append_targets_the_right_session() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SessionStore::open(dir.path().join("sessions.json"))
            .await
            .expect("open");

        let first = session("a");
        let second = session("b");
        store.insert_session(first.clone()).await.expect("insert");
        store.insert_session(second.clone()).await.expect("insert");

        let updated = store
            .append_message(second.id, ChatMessage::user("halo", Vec::new()))
            .await
            .expect("append");
        assert_eq!(updated.messages.len(), 1);

        let untouched = store.session(first.id).await.expect("still present");
        assert!(untouched.messages.is_empty());
    }

    #[tokio::test]
    async fn appending_to_an_unknown_session_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SessionStore::open(dir.path().join("sessions.json"))
            .await
            .expect("open");

        let result = store
            .append_message(Uuid::new_v4(), ChatMessage::user("halo", Vec::new()))
            .await;
        assert!(matches!(result, Err(StoreError::UnknownSession { .. })));
    }

    #[tokio::test]
    async fn blank_api_key_clears_the_saved_credential() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SessionStore::open(dir.path().join("sessions.json"))
            .await
            .expect("open");

        store
            .set_api_key(Some("rahasia".into()))
            .await
            .expect("set");
        assert_eq!(store.api_key().await.as_deref(), Some("rahasia"));

        store.set_api_key(Some("   ".into())).await.expect("clear");
        assert!(store.api_key().await.is_none());
    }
}
