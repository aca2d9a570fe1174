//! Multi-format ingestion over a real documents folder.
//!
//! PDF, Word, slides, spreadsheets and CSV files are written into a temp
//! directory and run through the ingestor; corrupt and unsupported files must
//! be skipped without stopping the walk.

use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use docqa::config::DocumentsConfig;
use docqa::ingest::{ingest_directory, IngestOutcome};
use docqa::models::RawRecord;

/// Minimal one-page PDF showing `phrase`, with exact xref offsets.
fn minimal_pdf_with_text(phrase: &str) -> Vec<u8> {
    let stream = format!("BT /F1 12 Tf 100 700 Td ({}) Tj ET", phrase);
    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");
    let o1 = out.len();
    out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");
    let o2 = out.len();
    out.extend_from_slice(b"2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj\n");
    let o3 = out.len();
    out.extend_from_slice(b"3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >> endobj\n");
    let o4 = out.len();
    out.extend_from_slice(
        format!(
            "4 0 obj << /Length {} >> stream\n{}\nendstream endobj\n",
            stream.len(),
            stream
        )
        .as_bytes(),
    );
    let o5 = out.len();
    out.extend_from_slice(
        b"5 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >> endobj\n",
    );
    let xref_start = out.len();
    out.extend_from_slice(b"xref\n0 6\n");
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    for off in [o1, o2, o3, o4, o5] {
        out.extend_from_slice(format!("{:010} 00000 n \n", off).as_bytes());
    }
    out.extend_from_slice(b"trailer << /Size 6 /Root 1 0 R >>\nstartxref\n");
    out.extend_from_slice(format!("{}\n", xref_start).as_bytes());
    out.extend_from_slice(b"%%EOF\n");
    out
}

fn zip_with(entries: &[(&str, String)]) -> Vec<u8> {
    let mut buf = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
        for (name, body) in entries {
            zip.start_file(*name, zip::write::SimpleFileOptions::default())
                .unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }
    buf
}

fn minimal_docx_with_text(phrase: &str) -> Vec<u8> {
    zip_with(&[(
        "word/document.xml",
        format!(
            "<?xml version=\"1.0\"?><w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body><w:p><w:r><w:t>{}</w:t></w:r></w:p></w:body></w:document>",
            phrase
        ),
    )])
}

fn minimal_pptx_with_text(phrase: &str) -> Vec<u8> {
    zip_with(&[(
        "ppt/slides/slide1.xml",
        format!(
            "<p:sld xmlns:p=\"p\" xmlns:a=\"a\"><p:cSld><p:spTree><p:sp><p:txBody><a:p><a:r><a:t>{}</a:t></a:r></a:p></p:txBody></p:sp></p:spTree></p:cSld></p:sld>",
            phrase
        ),
    )])
}

fn minimal_xlsx_with_text(phrase: &str) -> Vec<u8> {
    zip_with(&[
        (
            "xl/sharedStrings.xml",
            format!("<sst><si><t>{}</t></si></sst>", phrase),
        ),
        (
            "xl/worksheets/sheet1.xml",
            "<worksheet><sheetData><row><c t=\"s\"><v>0</v></c><c><v>7</v></c></row></sheetData></worksheet>".to_string(),
        ),
    ])
}

fn setup_documents(files: &[(&str, Vec<u8>)]) -> TempDir {
    let tmp = TempDir::new().unwrap();
    for (name, bytes) in files {
        fs::write(tmp.path().join(name), bytes).unwrap();
    }
    tmp
}

fn ingest(dir: &Path) -> IngestOutcome {
    ingest_directory(dir, &HashSet::new(), &DocumentsConfig::default()).unwrap()
}

fn records_for<'a>(outcome: &'a IngestOutcome, name: &str) -> Vec<&'a RawRecord> {
    outcome
        .records
        .iter()
        .filter(|r| r.source.file_name().unwrap() == name)
        .collect()
}

fn file_names(paths: &[PathBuf]) -> Vec<String> {
    paths
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
        .collect()
}

#[test]
fn file_support_pdf_page_records() {
    let tmp = setup_documents(&[("spec.pdf", minimal_pdf_with_text("spec test phrase"))]);
    let out = ingest(tmp.path());

    assert!(out.failed.is_empty(), "failed: {:?}", out.failed);
    let records = records_for(&out, "spec.pdf");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].page, Some(1));
    assert!(records[0].text.contains("spec test phrase"), "{:?}", records[0].text);
}

#[test]
fn file_support_office_formats() {
    let tmp = setup_documents(&[
        ("memo.docx", minimal_docx_with_text("office test phrase")),
        ("deck.pptx", minimal_pptx_with_text("slide test phrase")),
        ("book.xlsx", minimal_xlsx_with_text("sheet test phrase")),
    ]);
    let out = ingest(tmp.path());

    assert!(out.failed.is_empty(), "failed: {:?}", out.failed);
    assert_eq!(out.loaded.len(), 3);
    assert!(records_for(&out, "memo.docx")[0].text.contains("office test phrase"));
    assert!(records_for(&out, "deck.pptx")[0].text.contains("slide test phrase"));
    let sheet = &records_for(&out, "book.xlsx")[0].text;
    assert!(sheet.contains("sheet test phrase") && sheet.contains('7'), "{}", sheet);
}

#[test]
fn file_support_renamed_ooxml_doc_parses() {
    let tmp = setup_documents(&[("old-name.doc", minimal_docx_with_text("renamed phrase"))]);
    let out = ingest(tmp.path());

    assert!(out.failed.is_empty());
    assert!(records_for(&out, "old-name.doc")[0].text.contains("renamed phrase"));
}

#[test]
fn file_support_legacy_binary_is_a_parse_error() {
    let ole = vec![0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1, 0, 0, 0, 0];
    let tmp = setup_documents(&[
        ("legacy.doc", ole.clone()),
        ("legacy.xls", ole),
        ("fine.txt", b"still loaded".to_vec()),
    ]);
    let out = ingest(tmp.path());

    assert_eq!(
        file_names(&out.failed.iter().map(|(p, _)| p.clone()).collect::<Vec<_>>()),
        vec!["legacy.doc", "legacy.xls"]
    );
    assert_eq!(file_names(&out.loaded), vec!["fine.txt"]);
}

#[test]
fn file_support_csv_rows() {
    let tmp = setup_documents(&[(
        "people.csv",
        b"name,role\nAda,engineer\nGrace,admiral\n".to_vec(),
    )]);
    let out = ingest(tmp.path());

    let rows = records_for(&out, "people.csv");
    assert_eq!(rows.len(), 2);
    assert!(rows[0].text.contains("name: Ada"));
    assert!(rows[1].text.contains("role: admiral"));
}

#[test]
fn file_support_skipped_on_failure() {
    let tmp = setup_documents(&[
        ("bad.pdf", b"not a valid pdf".to_vec()),
        ("bad.docx", b"not a zip".to_vec()),
        ("good.txt", b"This is good.".to_vec()),
    ]);
    let out = ingest(tmp.path());

    assert_eq!(out.failed.len(), 2);
    assert_eq!(file_names(&out.loaded), vec!["good.txt"]);
    assert_eq!(out.records.len(), 1);
}

#[test]
fn file_support_unsupported_extensions() {
    let tmp = setup_documents(&[
        ("readme.md", b"# Markdown is not on the list".to_vec()),
        ("photo.jpg", vec![0xFF, 0xD8, 0xFF]),
        ("notes.TXT", b"upper-case extension".to_vec()),
    ]);
    let out = ingest(tmp.path());

    assert_eq!(file_names(&out.skipped_unsupported), vec!["photo.jpg", "readme.md"]);
    assert_eq!(file_names(&out.loaded), vec!["notes.TXT"]);
}
