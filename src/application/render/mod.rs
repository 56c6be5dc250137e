//! Line-oriented render pipeline for model output.
//!
//! Raw response text flows one way: line classification, table grouping,
//! block rendering, then document assembly for one of three output
//! variants. The pipeline is pure and total over any text input; a line
//! that matches no structural pattern degrades to a paragraph, never to an
//! error.

mod blocks;
mod classify;
mod table;
mod types;

use std::collections::HashSet;
use std::sync::Arc;

use ammonia::Builder as AmmoniaBuilder;
use metrics::counter;
use once_cell::sync::Lazy;

use crate::domain::school::Letterhead;

pub use classify::{LineClass, classify, strip_bold_markers};
pub use table::{TableAccumulator, TableGroup};
pub use types::{AssembledDocument, DocumentVariant, RenderedFragment};

/// Stylesheet shared by the Download and Print variants: A4 page, serif
/// body, justified paragraphs, bordered table cells, letterhead rules.
const DOCUMENT_STYLES: &str = r#"
@page { size: A4; margin: 2.54cm; }
body { font-family: 'Times New Roman', serif; font-size: 12pt; line-height: 1.5; color: #000000; }
h1, h2, h3 { font-weight: bold; color: #000000; margin-top: 12pt; margin-bottom: 6pt; text-align: center; text-transform: uppercase; }
h1 { font-size: 14pt; }
h2 { font-size: 13pt; }
h3 { font-size: 12pt; }
p, .outline { text-align: justify; margin-bottom: 6pt; }
.outline { display: flex; }
.outline-marker { min-width: 24pt; }
.outline-2 { margin-left: 18pt; }
.outline-3 { margin-left: 36pt; }
.spacer { height: 8pt; }
table { width: 100%; border-collapse: collapse; margin: 12pt 0; border: 1px solid #000; }
th, td { border: 1px solid #000; padding: 4pt 6pt; vertical-align: top; text-align: left; }
th { background-color: #f2f2f2; text-align: center; font-weight: bold; }
.letterhead { text-align: center; border-bottom: 3px double #000; padding-bottom: 10px; margin-bottom: 20px; }
.letterhead .line1, .letterhead .line2 { margin: 0; font-size: 14pt; font-weight: bold; text-transform: uppercase; }
.letterhead .school-name { margin: 0; font-size: 18pt; font-weight: bold; text-transform: uppercase; }
.letterhead .address { margin: 0; font-size: 11pt; font-style: italic; font-weight: normal; text-transform: none; }
"#;

/// Legacy word-processor namespaces kept for `.doc` compatibility.
const WORD_DOCUMENT_OPEN: &str = "<html xmlns:o='urn:schemas-microsoft-com:office:office' \
     xmlns:w='urn:schemas-microsoft-com:office:word' \
     xmlns='http://www.w3.org/TR/REC-html40'>";

/// Line-oriented document renderer with an HTML sanitation pass over the
/// assembled body.
pub struct DocumentRenderService {
    sanitizer: AmmoniaBuilder<'static>,
}

static RENDER_SERVICE: Lazy<Arc<DocumentRenderService>> =
    Lazy::new(|| Arc::new(DocumentRenderService::new()));

/// Access the shared render service instance, initialised on first use.
pub fn render_service() -> Arc<DocumentRenderService> {
    Arc::clone(&RENDER_SERVICE)
}

impl Default for DocumentRenderService {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentRenderService {
    fn new() -> Self {
        Self {
            sanitizer: build_sanitizer(),
        }
    }

    /// Run the classification pipeline over the raw response text and
    /// return the ordered fragment sequence. Table rows are grouped with
    /// adjacent table rows only; any other line closes an open group, as
    /// does end of input.
    pub fn render_fragments(&self, raw: &str) -> Vec<RenderedFragment> {
        let text = strip_bold_markers(raw);
        let mut fragments = Vec::new();
        let mut accumulator = TableAccumulator::default();

        for line in text.lines() {
            match classify(line) {
                LineClass::TableRow {
                    separator: true, ..
                } => accumulator.push_separator(),
                LineClass::TableRow { cells, .. } => accumulator.push_row(cells),
                other => {
                    if let Some(group) = accumulator.flush() {
                        fragments.push(blocks::table_fragment(&group));
                    }
                    fragments.push(blocks::line_fragment(&other));
                }
            }
        }
        if let Some(group) = accumulator.flush() {
            fragments.push(blocks::table_fragment(&group));
        }

        fragments
    }

    /// Join the fragments in insertion order and sanitize the result. The
    /// same body string is embedded unchanged in every variant wrapper.
    pub fn body_html(&self, raw: &str) -> String {
        let joined = self
            .render_fragments(raw)
            .into_iter()
            .map(|fragment| fragment.html)
            .collect::<Vec<_>>()
            .join("\n");
        self.sanitizer.clean(&joined).to_string()
    }

    /// Assemble the final document for the requested variant. The wrapper
    /// is additive: letterhead and styles surround the body but never
    /// transform it.
    pub fn assemble(
        &self,
        raw: &str,
        variant: DocumentVariant,
        letterhead: &Letterhead,
    ) -> AssembledDocument {
        let body = self.body_html(raw);
        let html = match variant {
            DocumentVariant::Inline => body,
            DocumentVariant::Download => wrap_document(&body, letterhead, false),
            DocumentVariant::Print => wrap_document(&body, letterhead, true),
        };

        counter!("naskah_documents_rendered_total", "variant" => variant.as_str()).increment(1);

        AssembledDocument { variant, html }
    }

    /// Inline assembly for chat bubbles; the letterhead is not part of
    /// this variant.
    pub fn assemble_inline(&self, raw: &str) -> AssembledDocument {
        static NO_LETTERHEAD: Lazy<Letterhead> = Lazy::new(|| Letterhead {
            government_line: String::new(),
            office_line: String::new(),
            school_name: String::new(),
            address: String::new(),
        });
        self.assemble(raw, DocumentVariant::Inline, &NO_LETTERHEAD)
    }
}

fn build_sanitizer() -> AmmoniaBuilder<'static> {
    let mut builder = AmmoniaBuilder::default();

    let tags: HashSet<&'static str> = HashSet::from([
        "h1", "h2", "h3", "p", "div", "span", "table", "thead", "tbody", "tr", "th", "td",
    ]);
    builder.tags(tags);
    builder.generic_attributes(HashSet::from(["class"]));
    builder
}

fn letterhead_html(letterhead: &Letterhead) -> String {
    format!(
        concat!(
            "<div class=\"letterhead\">\n",
            "<p class=\"line1\">{}</p>\n",
            "<p class=\"line2\">{}</p>\n",
            "<p class=\"school-name\">{}</p>\n",
            "<p class=\"address\">Alamat: {}</p>\n",
            "</div>"
        ),
        blocks::escape(&letterhead.government_line),
        blocks::escape(&letterhead.office_line),
        blocks::escape(&letterhead.school_name),
        blocks::escape(&letterhead.address),
    )
}

fn wrap_document(body: &str, letterhead: &Letterhead, auto_print: bool) -> String {
    let print_script = if auto_print {
        "<script>window.addEventListener('load', () => window.print());</script>"
    } else {
        ""
    };

    format!(
        concat!(
            "{open}\n<head>\n<meta charset=\"utf-8\">\n<title>Dokumen {title}</title>\n",
            "<style>{styles}</style>\n</head>\n<body>\n{letterhead}\n{body}\n{script}</body>\n</html>"
        ),
        open = WORD_DOCUMENT_OPEN,
        title = blocks::escape(&letterhead.school_name),
        styles = DOCUMENT_STYLES,
        letterhead = letterhead_html(letterhead),
        body = body,
        script = print_script,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn letterhead() -> Letterhead {
        Letterhead {
            government_line: "PEMERINTAH KABUPATEN MOJOKERTO".into(),
            office_line: "DINAS PENDIDIKAN KABUPATEN MOJOKERTO".into(),
            school_name: "SMPN 3 PACET".into(),
            address: "Jl. Tirtawening Desa Kembangbelor Kec. Pacet Kab. Mojokerto".into(),
        }
    }

    #[test]
    fn heading_blank_paragraph_keep_input_order() {
        let service = DocumentRenderService::default();
        let fragments = service.render_fragments("# Title\n\nisi");

        assert_eq!(fragments.len(), 3);
        assert_eq!(fragments[0].html, "<h1>Title</h1>");
        assert_eq!(fragments[1].html, r#"<div class="spacer"></div>"#);
        assert_eq!(fragments[2].html, "<p>isi</p>");
    }

    #[test]
    fn separator_row_never_renders() {
        let service = DocumentRenderService::default();
        let fragments = service.render_fragments("|A|B|\n|---|---|\n|1|2|");

        assert_eq!(fragments.len(), 1);
        let html = &fragments[0].html;
        assert!(html.contains("<th>A</th><th>B</th>"));
        assert!(html.contains("<td>1</td><td>2</td>"));
        assert!(!html.contains("---"));
    }

    #[test]
    fn data_row_with_dash_text_is_not_dropped() {
        let service = DocumentRenderService::default();
        let fragments = service.render_fragments(
            "|Agenda|Status|\n|---|---|\n|Upacara|selesai|\n|Rapat --- lanjutan|hadir|",
        );

        assert_eq!(fragments.len(), 1);
        let html = &fragments[0].html;
        assert!(html.contains("<td>Upacara</td>"));
        assert!(html.contains("<td>Rapat --- lanjutan</td>"));
    }

    #[test]
    fn paragraph_after_table_closes_the_group() {
        let service = DocumentRenderService::default();
        let fragments = service.render_fragments("|A|\n|1|\npenutup");

        assert_eq!(fragments.len(), 2);
        assert!(fragments[0].html.starts_with(r#"<div class="table-wrap">"#));
        assert_eq!(fragments[1].html, "<p>penutup</p>");
    }

    #[test]
    fn table_at_end_of_input_still_flushes() {
        let service = DocumentRenderService::default();
        let fragments = service.render_fragments("pembuka\n|A|B|\n|1|2|");

        assert_eq!(fragments.len(), 2);
        assert!(fragments[1].html.contains("<td>1</td>"));
    }

    #[test]
    fn inline_variant_has_no_letterhead() {
        let service = DocumentRenderService::default();
        let inline = service.assemble("# SK", DocumentVariant::Inline, &letterhead());
        assert!(!inline.html.contains("letterhead"));
        assert!(!inline.html.contains("SMPN 3 PACET"));
    }

    #[test]
    fn wrapper_is_additive_never_transformative() {
        let service = DocumentRenderService::default();
        let raw = "# SK\n\n1. satu\n|A|B|\n|1|2|";
        let inline = service.assemble(raw, DocumentVariant::Inline, &letterhead());
        let download = service.assemble(raw, DocumentVariant::Download, &letterhead());
        let print = service.assemble(raw, DocumentVariant::Print, &letterhead());

        assert!(download.html.contains(&inline.html));
        assert!(print.html.contains(&inline.html));
        assert!(download.html.contains("class=\"letterhead\""));
    }

    #[test]
    fn print_variant_invokes_the_print_dialog() {
        let service = DocumentRenderService::default();
        let print = service.assemble("isi", DocumentVariant::Print, &letterhead());
        assert!(print.html.contains("window.print()"));

        let download = service.assemble("isi", DocumentVariant::Download, &letterhead());
        assert!(!download.html.contains("window.print()"));
    }

    #[test]
    fn script_injection_in_model_output_is_neutralised() {
        let service = DocumentRenderService::default();
        let body = service.body_html("<script>alert(1)</script>");
        assert!(!body.contains("<script>"));
    }

    #[test]
    fn rendering_is_idempotent_for_identical_input() {
        let service = DocumentRenderService::default();
        let raw = "## Bab\n1. satu\na. dua";
        assert_eq!(service.body_html(raw), service.body_html(raw));
    }
}
