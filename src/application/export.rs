//! Export drivers: downloadable word-processor file and print document.
//!
//! Both are one-shot, purely local operations over an assembled document;
//! there is no retry and no server round-trip beyond serving the bytes.

use std::sync::Arc;

use bytes::Bytes;
use metrics::counter;
use time::OffsetDateTime;

use crate::application::render::{DocumentRenderService, DocumentVariant};
use crate::domain::school::Letterhead;

/// Media type understood by word processors for HTML-bodied documents.
pub const WORD_MEDIA_TYPE: &str = "application/msword";

const UTF8_BOM: &str = "\u{feff}";

/// A downloadable document artifact.
#[derive(Debug, Clone)]
pub struct WordExport {
    pub filename: String,
    pub media_type: &'static str,
    pub bytes: Bytes,
}

/// Produces export artifacts from raw model output.
#[derive(Clone)]
pub struct ExportService {
    renderer: Arc<DocumentRenderService>,
}

impl ExportService {
    pub fn new(renderer: Arc<DocumentRenderService>) -> Self {
        Self { renderer }
    }

    /// Serialize the Download-variant document as BOM-prefixed UTF-8 with a
    /// timestamped filename. The timestamp is caller-supplied so filename
    /// uniqueness is testable.
    pub fn word_document(
        &self,
        raw: &str,
        letterhead: &Letterhead,
        school_tag: &str,
        exported_at: OffsetDateTime,
    ) -> WordExport {
        let document = self
            .renderer
            .assemble(raw, DocumentVariant::Download, letterhead);

        let mut payload = String::with_capacity(UTF8_BOM.len() + document.html.len());
        payload.push_str(UTF8_BOM);
        payload.push_str(&document.html);

        counter!("naskah_documents_exported_total", "kind" => "word").increment(1);

        WordExport {
            filename: word_filename(school_tag, exported_at),
            media_type: WORD_MEDIA_TYPE,
            bytes: Bytes::from(payload),
        }
    }

    /// Assemble the Print-variant document, ready to be written into a
    /// fresh browsing context where it invokes the print dialog on load.
    pub fn print_document(&self, raw: &str, letterhead: &Letterhead) -> String {
        counter!("naskah_documents_exported_total", "kind" => "print").increment(1);
        self.renderer
            .assemble(raw, DocumentVariant::Print, letterhead)
            .html
    }
}

/// `Dokumen_<school-tag>_<timestamp>.doc`, timestamp in Unix milliseconds.
pub fn word_filename(school_tag: &str, exported_at: OffsetDateTime) -> String {
    let millis = exported_at.unix_timestamp_nanos() / 1_000_000;
    let tag: String = school_tag
        .chars()
        .filter(|ch| ch.is_ascii_alphanumeric())
        .collect();
    format!("Dokumen_{tag}_{millis}.doc")
}
