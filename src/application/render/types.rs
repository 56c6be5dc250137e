use serde::{Deserialize, Serialize};

/// Output context for an assembled document. All variants render the same
/// ordered fragment sequence; only the wrapper differs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentVariant {
    /// Chat-bubble body, no letterhead, styled by the surrounding page.
    Inline,
    /// Word-processor compatible document with letterhead and page styles.
    Download,
    /// Full document that invokes the platform print dialog on load.
    Print,
}

impl DocumentVariant {
    pub fn as_str(self) -> &'static str {
        match self {
            DocumentVariant::Inline => "inline",
            DocumentVariant::Download => "download",
            DocumentVariant::Print => "print",
        }
    }
}

/// Markup produced for one classified line or one flushed table group.
/// Fragment order always matches the order of appearance in the raw text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedFragment {
    pub html: String,
}

impl RenderedFragment {
    pub fn new(html: impl Into<String>) -> Self {
        Self { html: html.into() }
    }
}

/// Final document for one variant. Built fresh per render request, never
/// cached or mutated in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledDocument {
    pub variant: DocumentVariant,
    pub html: String,
}
