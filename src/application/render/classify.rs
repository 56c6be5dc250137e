//! Per-line classification of model output.
//!
//! The generation prompt instructs the model to structure documents with
//! `#`/`##`/`###` titles, three fixed outline levels (`1.`, `a.`, `1)`) and
//! pipe tables. Each trimmed line maps to exactly one class; rules are
//! applied in priority order and the first match wins.

use once_cell::sync::Lazy;
use regex::Regex;

static ORDERED_ITEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+\.)\s(.*)$").expect("ordered item pattern is valid"));
static LETTERED_ITEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([a-z]\.)\s(.*)$").expect("lettered item pattern is valid"));
static PAREN_ITEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+\))\s(.*)$").expect("parenthesized item pattern is valid"));

/// Classification of one trimmed line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineClass {
    Heading { level: u8, text: String },
    /// Outline level 1: `1.`, `2.`, ...
    OrderedItem { marker: String, body: String },
    /// Outline level 2: `a.`, `b.`, ...
    LetteredItem { marker: String, body: String },
    /// Outline level 3: `1)`, `2)`, ...
    ParenItem { marker: String, body: String },
    /// Pipe-delimited row. `separator` marks a markdown header separator
    /// (`|---|---|`, alignment colons allowed), which is recognized but
    /// never stored.
    TableRow { cells: Vec<String>, separator: bool },
    Blank,
    Paragraph { text: String },
}

/// Strip literal bold markers from the raw response. The system prompt
/// forbids `**` emphasis; the renderer enforces the rule defensively before
/// any line is classified.
pub fn strip_bold_markers(raw: &str) -> String {
    raw.replace("**", "")
}

/// Classify a single line. The input is trimmed internally; classification
/// is deterministic and carries no cross-line state.
pub fn classify(line: &str) -> LineClass {
    let line = line.trim();

    if let Some(text) = line.strip_prefix("# ") {
        return LineClass::Heading {
            level: 1,
            text: text.to_string(),
        };
    }
    if let Some(text) = line.strip_prefix("## ") {
        return LineClass::Heading {
            level: 2,
            text: text.to_string(),
        };
    }
    if let Some(text) = line.strip_prefix("### ") {
        return LineClass::Heading {
            level: 3,
            text: text.to_string(),
        };
    }

    if let Some(captures) = ORDERED_ITEM.captures(line) {
        return LineClass::OrderedItem {
            marker: captures[1].to_string(),
            body: captures[2].to_string(),
        };
    }
    if let Some(captures) = LETTERED_ITEM.captures(line) {
        return LineClass::LetteredItem {
            marker: captures[1].to_string(),
            body: captures[2].to_string(),
        };
    }
    if let Some(captures) = PAREN_ITEM.captures(line) {
        return LineClass::ParenItem {
            marker: captures[1].to_string(),
            body: captures[2].to_string(),
        };
    }

    if line.len() >= 2 && line.starts_with('|') && line.ends_with('|') {
        let cells = split_cells(line);
        let separator = is_separator_row(&cells);
        return LineClass::TableRow { cells, separator };
    }

    if line.is_empty() {
        return LineClass::Blank;
    }

    LineClass::Paragraph {
        text: line.to_string(),
    }
}

/// A separator row has every cell made of dashes, optionally with markdown
/// alignment colons. A data cell that merely contains dashes in its text
/// stays data.
fn is_separator_row(cells: &[String]) -> bool {
    !cells.is_empty()
        && cells
            .iter()
            .all(|cell| cell.contains('-') && cell.chars().all(|ch| ch == '-' || ch == ':'))
}

/// Split a pipe row into trimmed cells, dropping the empty edge cells
/// produced by the leading and trailing pipes. Interior empty cells are
/// kept so column positions survive.
fn split_cells(row: &str) -> Vec<String> {
    let mut cells: Vec<&str> = row.split('|').collect();
    if cells.first().is_some_and(|cell| cell.trim().is_empty()) {
        cells.remove(0);
    }
    if cells.last().is_some_and(|cell| cell.trim().is_empty()) {
        cells.pop();
    }
    cells.into_iter().map(|cell| cell.trim().to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headings_match_in_priority_order() {
        assert_eq!(
            classify("# Judul"),
            LineClass::Heading {
                level: 1,
                text: "Judul".into()
            }
        );
        assert_eq!(
            classify("## Bab I"),
            LineClass::Heading {
                level: 2,
                text: "Bab I".into()
            }
        );
        assert_eq!(
            classify("### Pasal 1"),
            LineClass::Heading {
                level: 3,
                text: "Pasal 1".into()
            }
        );
    }

    #[test]
    fn outline_markers_are_preserved_verbatim() {
        assert_eq!(
            classify("1. satu"),
            LineClass::OrderedItem {
                marker: "1.".into(),
                body: "satu".into()
            }
        );
        assert_eq!(
            classify("a. sub"),
            LineClass::LetteredItem {
                marker: "a.".into(),
                body: "sub".into()
            }
        );
        assert_eq!(
            classify("12) detail"),
            LineClass::ParenItem {
                marker: "12)".into(),
                body: "detail".into()
            }
        );
    }

    #[test]
    fn numbered_heading_without_space_is_a_paragraph() {
        assert_eq!(
            classify("#Judul"),
            LineClass::Paragraph {
                text: "#Judul".into()
            }
        );
        assert_eq!(
            classify("1.satu"),
            LineClass::Paragraph {
                text: "1.satu".into()
            }
        );
    }

    #[test]
    fn table_rows_split_and_trim_cells() {
        assert_eq!(
            classify("| No | Nama |"),
            LineClass::TableRow {
                cells: vec!["No".into(), "Nama".into()],
                separator: false,
            }
        );
    }

    #[test]
    fn interior_empty_cells_are_kept() {
        assert_eq!(
            classify("|A||C|"),
            LineClass::TableRow {
                cells: vec!["A".into(), "".into(), "C".into()],
                separator: false,
            }
        );
    }

    #[test]
    fn dash_rows_are_marked_as_separators() {
        assert_eq!(
            classify("|---|---|"),
            LineClass::TableRow {
                cells: vec!["---".into(), "---".into()],
                separator: true,
            }
        );
        assert_eq!(
            classify("|:---:|---|"),
            LineClass::TableRow {
                cells: vec![":---:".into(), "---".into()],
                separator: true,
            }
        );
    }

    #[test]
    fn dashes_inside_cell_text_stay_data_rows() {
        assert_eq!(
            classify("|Rapat --- lanjutan|hadir|"),
            LineClass::TableRow {
                cells: vec!["Rapat --- lanjutan".into(), "hadir".into()],
                separator: false,
            }
        );
    }

    #[test]
    fn blank_and_paragraph_fallbacks() {
        assert_eq!(classify("   "), LineClass::Blank);
        assert_eq!(
            classify("isi"),
            LineClass::Paragraph { text: "isi".into() }
        );
    }

    #[test]
    fn classification_is_idempotent() {
        for line in ["# A", "1. b", "| x |", "", "teks biasa"] {
            assert_eq!(classify(line), classify(line));
        }
    }

    #[test]
    fn bold_markers_are_stripped_not_converted() {
        assert_eq!(strip_bold_markers("**SK** Kepala **Sekolah**"), "SK Kepala Sekolah");
    }
}
