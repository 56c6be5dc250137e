//! End-to-end checks over the document pipeline using a realistic
//! assistant reply.

use naskah::application::export::{ExportService, word_filename};
use naskah::application::render::{DocumentVariant, render_service};
use naskah::domain::school::Letterhead;
use time::OffsetDateTime;

const REPLY: &str = include_str!("fixtures/sk_pembagian_tugas.txt");

fn letterhead() -> Letterhead {
    Letterhead {
        government_line: "PEMERINTAH KABUPATEN MOJOKERTO".into(),
        office_line: "DINAS PENDIDIKAN KABUPATEN MOJOKERTO".into(),
        school_name: "SMPN 3 PACET".into(),
        address: "Jl. Tirtawening Desa Kembangbelor Kec. Pacet Kab. Mojokerto".into(),
    }
}

#[test]
fn structural_lines_render_in_input_order() {
    let body = render_service().body_html(REPLY);

    let h1 = body.find("<h1>SURAT KEPUTUSAN KEPALA SEKOLAH</h1>");
    let h2 = body.find("<h2>Nomor: 800/012/SMPN3PACET/2025</h2>");
    let ordered = body.find(r#"<span class="outline-marker">1.</span>"#);
    let lettered = body.find(r#"<span class="outline-marker">a.</span>"#);
    let paren = body.find(r#"<span class="outline-marker">1)</span>"#);
    let table = body.find("<thead>");
    let closing = body.find("<p>Ditetapkan di Pacet pada tanggal 14 Juli 2025.</p>");

    let positions = [h1, h2, ordered, lettered, paren, table, closing];
    assert!(positions.iter().all(Option::is_some), "body: {body}");
    for pair in positions.windows(2) {
        assert!(pair[0] < pair[1]);
    }
}

#[test]
fn bold_markers_never_reach_the_document() {
    let body = render_service().body_html(REPLY);
    assert!(!body.contains("**"));
    assert!(body.contains("kelancaran proses pembelajaran"));
}

#[test]
fn separator_row_is_dropped_and_short_rows_are_padded() {
    let body = render_service().body_html(REPLY);

    assert!(!body.contains("---"));
    assert!(body.contains("<th>No</th><th>Nama Guru</th><th>Mata Pelajaran</th><th>Jam</th>"));
    // The third body row has three cells against four header columns.
    assert!(body.contains("<td>Rina Wati, S.Pd</td><td>Bahasa Indonesia</td><td></td>"));
}

#[test]
fn outline_depths_follow_the_marker_kind() {
    let body = render_service().body_html(REPLY);
    assert!(body.contains(r#"<div class="outline outline-1">"#));
    assert!(body.contains(r#"<div class="outline outline-2">"#));
    assert!(body.contains(r#"<div class="outline outline-3">"#));
}

#[test]
fn download_and_print_wrap_the_same_inline_body() {
    let service = render_service();
    let inline = service.assemble(REPLY, DocumentVariant::Inline, &letterhead());
    let download = service.assemble(REPLY, DocumentVariant::Download, &letterhead());
    let print = service.assemble(REPLY, DocumentVariant::Print, &letterhead());

    assert!(download.html.contains(&inline.html));
    assert!(print.html.contains(&inline.html));

    assert!(download.html.contains("PEMERINTAH KABUPATEN MOJOKERTO"));
    assert!(download.html.contains("size: A4"));
    assert!(!download.html.contains("window.print()"));
    assert!(print.html.contains("window.print()"));
}

#[test]
fn word_export_serialises_the_download_document() {
    let export = ExportService::new(render_service()).word_document(
        REPLY,
        &letterhead(),
        "SMPN3Pacet",
        OffsetDateTime::from_unix_timestamp(1_735_689_600).expect("valid timestamp"),
    );

    assert_eq!(export.media_type, "application/msword");
    assert_eq!(export.filename, "Dokumen_SMPN3Pacet_1735689600000.doc");
    assert!(export.bytes.starts_with("\u{feff}".as_bytes()));

    let html = std::str::from_utf8(&export.bytes).expect("utf-8 payload");
    assert!(html.contains("schemas-microsoft-com:office:word"));
    assert!(html.contains("class=\"letterhead\""));
}

#[test]
fn filename_stamp_tracks_the_export_time() {
    let at = OffsetDateTime::from_unix_timestamp(1_700_000_000).expect("valid timestamp");
    assert_eq!(word_filename("SMPN3Pacet", at), "Dokumen_SMPN3Pacet_1700000000000.doc");
}
