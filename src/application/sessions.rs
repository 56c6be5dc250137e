//! Session lifecycle: creation with the welcome turn, listing, lookup.

use std::sync::Arc;

use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::chat::{ChatMessage, ChatSession};
use crate::domain::error::DomainError;
use crate::domain::school::SchoolProfile;
use crate::infra::store::SessionStore;

use super::chat::NEW_SESSION_TITLE;
use super::error::AppError;

pub struct SessionService {
    store: Arc<SessionStore>,
    profile: Arc<SchoolProfile>,
}

impl SessionService {
    pub fn new(store: Arc<SessionStore>, profile: Arc<SchoolProfile>) -> Self {
        Self { store, profile }
    }

    /// Create a session seeded with the assistant's welcome turn.
    pub async fn create(&self) -> Result<ChatSession, AppError> {
        let mut session = ChatSession::new(NEW_SESSION_TITLE, OffsetDateTime::now_utc());
        session
            .messages
            .push(ChatMessage::model(welcome_message(&self.profile)));
        self.store.insert_session(session.clone()).await?;
        Ok(session)
    }

    /// The most recent session, or a fresh one when none exist yet.
    pub async fn current_or_create(&self) -> Result<ChatSession, AppError> {
        match self.store.sessions().await.into_iter().next() {
            Some(session) => Ok(session),
            None => self.create().await,
        }
    }

    pub async fn list(&self) -> Vec<ChatSession> {
        self.store.sessions().await
    }

    pub async fn get(&self, id: Uuid) -> Result<ChatSession, AppError> {
        self.store
            .session(id)
            .await
            .ok_or_else(|| DomainError::not_found("session").into())
    }
}

/// Opening message of every new conversation, naming the active
/// configuration so the user can spot a stale profile immediately.
pub fn welcome_message(profile: &SchoolProfile) -> String {
    format!(
        "Selamat datang! Saya Asisten Kurikulum Digital {name}.\n\n\
         Konfigurasi Tahun Pelajaran {year} aktif.\n\
         Data Kepala Sekolah: {principal} (NIP. {nip}) telah dimuat.\n\n\
         Silakan ketik instruksi atau unggah dokumen. Tekan Enter untuk baris baru, dan tombol kirim untuk memproses.",
        name = profile.name,
        year = profile.school_year,
        principal = profile.principal_name,
        nip = profile.principal_nip,
    )
}
