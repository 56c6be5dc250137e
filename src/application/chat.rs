//! Chat orchestration: prompt assembly, generation calls, and the
//! mapping from classified failures to user-facing notices.
//!
//! A failed generation never fails the request. The notice text is
//! appended to the session as a model turn so the conversation keeps its
//! shape and the user sees what went wrong in plain language.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::config::{AiSettings, UploadSettings};
use crate::domain::chat::{Attachment, ChatMessage, ChatSession};
use crate::domain::error::DomainError;
use crate::domain::school::SchoolProfile;
use crate::infra::gemini::{GeminiClient, GeminiError};
use crate::infra::store::SessionStore;

use super::error::AppError;

/// Prompt used when a message carries attachments but no typed text.
const ATTACHMENT_ONLY_PROMPT: &str = "Analisis gambar/dokumen yang saya lampirkan ini.";

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("no API key configured")]
    MissingApiKey,
    #[error(transparent)]
    Api(#[from] GeminiError),
}

pub struct ChatService {
    client: GeminiClient,
    store: Arc<SessionStore>,
    profile: Arc<SchoolProfile>,
    fallback_api_key: Option<String>,
    max_attachment_bytes: usize,
}

impl ChatService {
    pub fn new(
        client: GeminiClient,
        store: Arc<SessionStore>,
        profile: Arc<SchoolProfile>,
        ai: &AiSettings,
        uploads: &UploadSettings,
    ) -> Self {
        Self {
            client,
            store,
            profile,
            fallback_api_key: ai.api_key.clone(),
            max_attachment_bytes: uploads.max_attachment_bytes,
        }
    }

    /// Record the user turn, run generation over the whole conversation,
    /// and record the model turn. Generation failures become a notice
    /// turn; only storage failures propagate as errors.
    pub async fn send(
        &self,
        session_id: Uuid,
        text: String,
        attachments: Vec<Attachment>,
    ) -> Result<ChatExchange, AppError> {
        let attachments = self.validate_attachments(attachments)?;
        let text = if text.trim().is_empty() {
            if attachments.is_empty() {
                return Err(DomainError::validation("message is empty").into());
            }
            ATTACHMENT_ONLY_PROMPT.to_string()
        } else {
            text
        };

        let user_message = ChatMessage::user(text, attachments);
        let session = self
            .store
            .append_message(session_id, user_message.clone())
            .await?;
        self.title_from_first_prompt(&session).await?;

        let reply = match self.generate(&session.messages).await {
            Ok(reply) => reply,
            Err(error) => {
                info!(
                    target = "naskah::chat",
                    session = %session_id,
                    error = %error,
                    "generation failed, answering with a notice"
                );
                failure_notice(&error, self.client.model())
            }
        };

        let model_message = ChatMessage::model(reply);
        self.store
            .append_message(session_id, model_message.clone())
            .await?;

        Ok(ChatExchange {
            user: user_message,
            model: model_message,
        })
    }

    async fn generate(&self, turns: &[ChatMessage]) -> Result<String, ChatError> {
        let saved = self.store.api_key().await;
        let api_key = saved
            .as_deref()
            .or(self.fallback_api_key.as_deref())
            .ok_or(ChatError::MissingApiKey)?;

        let instruction = system_instruction(&self.profile);
        let text = self.client.generate(api_key, &instruction, turns).await?;
        Ok(text)
    }

    /// Normalise and bound incoming attachments. Browser clients send
    /// data URLs; only the base64 payload is kept.
    fn validate_attachments(
        &self,
        attachments: Vec<Attachment>,
    ) -> Result<Vec<Attachment>, AppError> {
        attachments
            .into_iter()
            .map(|mut attachment| {
                if let Some((_, payload)) = attachment.data.split_once("base64,") {
                    attachment.data = payload.to_string();
                }
                let decoded = BASE64.decode(attachment.data.as_bytes()).map_err(|_| {
                    AppError::from(DomainError::validation("attachment is not valid base64"))
                })?;
                if decoded.len() > self.max_attachment_bytes {
                    return Err(DomainError::validation(format!(
                        "attachment `{}` exceeds the {} byte limit",
                        attachment.name, self.max_attachment_bytes
                    ))
                    .into());
                }
                Ok(attachment)
            })
            .collect()
    }

    /// A fresh session keeps the placeholder title until the first user
    /// prompt arrives, which then names the conversation.
    async fn title_from_first_prompt(&self, session: &ChatSession) -> Result<(), AppError> {
        if session.title != NEW_SESSION_TITLE {
            return Ok(());
        }
        let Some(first_user) = session
            .messages
            .iter()
            .find(|message| message.role == crate::domain::chat::Role::User)
        else {
            return Ok(());
        };
        let title: String = first_user.text.chars().take(40).collect();
        if !title.trim().is_empty() {
            self.store.set_title(session.id, title).await?;
        }
        Ok(())
    }
}

/// One completed request/reply round.
pub struct ChatExchange {
    pub user: ChatMessage,
    pub model: ChatMessage,
}

pub const NEW_SESSION_TITLE: &str = "Percakapan Baru";

/// Assistant persona, school identity, and output formatting rules,
/// interpolated from the configured school profile.
pub fn system_instruction(profile: &SchoolProfile) -> String {
    format!(
        "Anda adalah Asisten Kurikulum Digital {name}.\n\
         Peran Anda adalah membantu Wakil Kepala Sekolah Bidang Kurikulum, Kepala Sekolah, dan Tim Kurikulum {name}.\n\
         \n\
         === IDENTITAS & KARAKTER ===\n\
         - Staf kurikulum profesional, berpengalaman, dan bijaksana.\n\
         - Bahasa: Indonesia formal (EYD), jelas, dan santun.\n\
         - Konteks: Sekolah Menengah Pertama (SMP) dengan Kurikulum Merdeka.\n\
         - Fokus: Ketepatan administrasi, efisiensi kerja, dan solusi praktis.\n\
         \n\
         === DATA SEKOLAH (KONFIGURASI SAAT INI) ===\n\
         1. Nama Sekolah: {name}\n\
         2. Kepala Sekolah: {principal}\n\
         3. NIP Kepala Sekolah: {nip}\n\
         4. Tahun Pelajaran: {year}\n\
         *Instruksi: Gunakan data di atas secara OTOMATIS untuk mengisi KOP (jika teks) dan TANDA TANGAN pada setiap draft dokumen resmi (SK, Surat Tugas, Laporan, dll).*\n\
         \n\
         === ATURAN FORMATTING (PENTING) ===\n\
         1. JANGAN gunakan format cetak tebal (bintang dua/ **). Gunakan teks biasa saja untuk semua kata.\n\
         2. Gunakan penomoran bertingkat yang rapi dan resmi untuk struktur dokumen:\n\
         \x20  - Level 1: 1., 2., 3.\n\
         \x20  - Level 2: a., b., c.\n\
         \x20  - Level 3: 1), 2), 3)\n\
         3. Gunakan Tabel untuk data yang bersifat rekapitulasi atau perbandingan.\n\
         4. Gunakan Header (# atau ##) hanya untuk Judul Utama Dokumen atau Judul BAB.\n\
         \n\
         === KEMAMPUAN UTAMA ===\n\
         1. Administrasi: Program supervisi, kalender pendidikan, jadwal pelajaran.\n\
         2. Pembelajaran: Modul Ajar, ATP, CP, TP, Analisis CP.\n\
         3. Supervisi: Analisis instrumen, rekap hasil, rekomendasi tindak lanjut.\n\
         4. Manajerial: Draft SK, Surat Tugas, Notulen Rapat, Laporan Pengawas.\n\
         \n\
         === ATURAN KERJA ===\n\
         - Selalu berikan dokumen yang \"siap pakai\" dan \"siap cetak\".\n\
         - Analisis data Excel/Gambar secara mendalam dan berikan rekomendasi strategis.\n\
         - Prioritas: Membantu pekerjaan kurikulum agar cepat, rapi, dan profesional.",
        name = profile.name,
        principal = profile.principal_name,
        nip = profile.principal_nip,
        year = profile.school_year,
    )
}

/// User-facing notice for a failed generation, in the language of the
/// rest of the interface.
pub fn failure_notice(error: &ChatError, model: &str) -> String {
    match error {
        ChatError::MissingApiKey => "\u{26a0}\u{fe0f} API Key belum diatur.\n\n\
             Silakan buka menu Pengaturan, lalu masukkan Google Gemini API Key Anda pada kolom yang tersedia.\n\n\
             Anda bisa mendapatkannya gratis di: aistudio.google.com"
            .to_string(),
        ChatError::Api(GeminiError::InvalidApiKey) => "\u{26a0}\u{fe0f} API Key Tidak Valid\n\
             Mohon periksa kembali API Key yang Anda masukkan di menu Pengaturan. Pastikan tidak ada spasi tambahan."
            .to_string(),
        ChatError::Api(GeminiError::ModelUnavailable { .. }) => format!(
            "\u{26a0}\u{fe0f} Model Tidak Ditemukan\n\
             Model '{model}' mungkin sedang tidak tersedia atau API Key Anda tidak memiliki akses ke model ini."
        ),
        ChatError::Api(GeminiError::QuotaExceeded) => "\u{26a0}\u{fe0f} Batas Kuota Tercapai\n\
             Anda telah mencapai batas penggunaan API gratis. Mohon tunggu beberapa saat sebelum mencoba lagi."
            .to_string(),
        ChatError::Api(GeminiError::Network(_)) => "\u{26a0}\u{fe0f} Koneksi Gagal\n\
             Tidak dapat menghubungi server Google. Periksa koneksi internet Anda."
            .to_string(),
        ChatError::Api(GeminiError::EmptyResponse) => {
            "Maaf, saya tidak dapat menghasilkan respon saat ini.".to_string()
        }
        ChatError::Api(GeminiError::Upstream { message, .. }) => format!(
            "Terjadi kesalahan saat menghubungi server.\n\nDetail: {message}\n\nSilakan coba lagi."
        ),
    }
}
