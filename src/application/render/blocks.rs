//! Markup generation for classified lines and flushed table groups.
//!
//! This is a flat, single-pass transform: no inline emphasis, no links, no
//! nesting beyond the three fixed outline levels. Text content is escaped
//! before interpolation because model output is untrusted.

use super::classify::LineClass;
use super::table::TableGroup;
use super::types::RenderedFragment;

/// Render one non-table classification into a markup fragment.
pub fn line_fragment(class: &LineClass) -> RenderedFragment {
    let html = match class {
        LineClass::Heading { level, text } => {
            format!("<h{level}>{}</h{level}>", escape(text))
        }
        LineClass::OrderedItem { marker, body } => outline_row(1, marker, body),
        LineClass::LetteredItem { marker, body } => outline_row(2, marker, body),
        LineClass::ParenItem { marker, body } => outline_row(3, marker, body),
        LineClass::Blank => r#"<div class="spacer"></div>"#.to_string(),
        LineClass::Paragraph { text } => format!("<p>{}</p>", escape(text)),
        // Table rows never reach the block renderer individually; they are
        // grouped by the accumulator and rendered via `table_fragment`.
        LineClass::TableRow { cells, .. } => format!("<p>{}</p>", escape(&cells.join(" | "))),
    };
    RenderedFragment::new(html)
}

/// Render a flushed table group. The header row defines the column count;
/// short body rows are padded with empty cells and long rows are truncated
/// so every rendered row has the same width.
pub fn table_fragment(group: &TableGroup) -> RenderedFragment {
    let columns = group.header.len();
    let mut html = String::from(r#"<div class="table-wrap"><table><thead><tr>"#);
    for cell in &group.header {
        html.push_str("<th>");
        html.push_str(&escape(cell));
        html.push_str("</th>");
    }
    html.push_str("</tr></thead><tbody>");
    for row in &group.body {
        html.push_str("<tr>");
        for index in 0..columns {
            html.push_str("<td>");
            if let Some(cell) = row.get(index) {
                html.push_str(&escape(cell));
            }
            html.push_str("</td>");
        }
        html.push_str("</tr>");
    }
    html.push_str("</tbody></table></div>");
    RenderedFragment::new(html)
}

fn outline_row(depth: u8, marker: &str, body: &str) -> String {
    format!(
        r#"<div class="outline outline-{depth}"><span class="outline-marker">{}</span><span class="outline-body">{}</span></div>"#,
        escape(marker),
        escape(body),
    )
}

pub(super) fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headings_escape_content() {
        let fragment = line_fragment(&LineClass::Heading {
            level: 1,
            text: "A < B".into(),
        });
        assert_eq!(fragment.html, "<h1>A &lt; B</h1>");
    }

    #[test]
    fn outline_levels_map_to_three_indent_classes() {
        let ordered = line_fragment(&LineClass::OrderedItem {
            marker: "1.".into(),
            body: "satu".into(),
        });
        let lettered = line_fragment(&LineClass::LetteredItem {
            marker: "a.".into(),
            body: "sub".into(),
        });
        let paren = line_fragment(&LineClass::ParenItem {
            marker: "1)".into(),
            body: "detail".into(),
        });

        assert!(ordered.html.contains(r#"class="outline outline-1""#));
        assert!(lettered.html.contains(r#"class="outline outline-2""#));
        assert!(paren.html.contains(r#"class="outline outline-3""#));
        assert!(ordered.html.contains(">1.</span>"));
        assert!(paren.html.contains(">1)</span>"));
    }

    #[test]
    fn blank_lines_become_spacers_not_nothing() {
        let fragment = line_fragment(&LineClass::Blank);
        assert_eq!(fragment.html, r#"<div class="spacer"></div>"#);
    }

    #[test]
    fn short_body_rows_are_padded_to_header_width() {
        let group = TableGroup {
            header: vec!["A".into(), "B".into(), "C".into()],
            body: vec![vec!["1".into()]],
        };
        let fragment = table_fragment(&group);
        assert_eq!(fragment.html.matches("<td>").count(), 3);
    }

    #[test]
    fn long_body_rows_are_truncated_to_header_width() {
        let group = TableGroup {
            header: vec!["A".into()],
            body: vec![vec!["1".into(), "2".into()]],
        };
        let fragment = table_fragment(&group);
        assert_eq!(fragment.html.matches("<td>").count(), 1);
        assert!(!fragment.html.contains("<td>2</td>"));
    }

    #[test]
    fn header_only_table_renders_without_body_rows() {
        let group = TableGroup {
            header: vec!["A".into(), "B".into()],
            body: Vec::new(),
        };
        let fragment = table_fragment(&group);
        assert!(fragment.html.contains("<th>A</th><th>B</th>"));
        assert!(!fragment.html.contains("<td>"));
    }
}
