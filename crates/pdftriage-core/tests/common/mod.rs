#![allow(dead_code)]

use std::io;
use std::sync::{Arc, Mutex};

use pdftriage_core::{analyze, AnalysisOptions, AnalysisOutcome, AnalysisResult, ParserContext, RawDocument};

/// Writes `objects` (each a full `N 0 obj ... endobj`) followed by a classic
/// xref table and trailer.
pub fn build_pdf(objects: &[String], trailer_extra: &str) -> Vec<u8> {
    let mut pdf = Vec::new();
    pdf.extend_from_slice(b"%PDF-1.7\n");
    let ids: Vec<usize> = objects
        .iter()
        .map(|object| {
            object
                .split_whitespace()
                .next()
                .and_then(|token| token.parse::<usize>().ok())
                .expect("object number")
        })
        .collect();
    let size = ids.iter().max().copied().unwrap_or(0) + 1;
    let mut offsets = vec![0usize; size];
    for (object, id) in objects.iter().zip(&ids) {
        offsets[*id] = pdf.len();
        pdf.extend_from_slice(object.as_bytes());
    }
    let start_xref = pdf.len();
    pdf.extend_from_slice(format!("xref\n0 {size}\n").as_bytes());
    pdf.extend_from_slice(b"0000000000 65535 f \n");
    for offset in offsets.iter().skip(1) {
        if *offset == 0 {
            pdf.extend_from_slice(b"0000000000 00000 f \n");
        } else {
            pdf.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
        }
    }
    pdf.extend_from_slice(
        format!("trailer\n<< /Size {size} /Root 1 0 R {trailer_extra} >>\nstartxref\n{start_xref}\n%%EOF\n")
            .as_bytes(),
    );
    pdf
}

/// A catalog (object 1), a flat page tree (object 2) and one page object per
/// entry of `pages` (objects 3..), each page dict extended with its entry.
/// `extra` objects should be numbered from 100 up.
pub fn document(catalog_extra: &str, pages: &[&str], extra: &[String]) -> Vec<u8> {
    let kids: Vec<String> = (0..pages.len()).map(|i| format!("{} 0 R", i + 3)).collect();
    let mut objects = vec![
        format!("1 0 obj\n<< /Type /Catalog /Pages 2 0 R {catalog_extra} >>\nendobj\n"),
        format!("2 0 obj\n<< /Type /Pages /Count {} /Kids [{}] >>\nendobj\n", pages.len(), kids.join(" ")),
    ];
    for (i, page) in pages.iter().enumerate() {
        objects.push(format!(
            "{} 0 obj\n<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] {page} >>\nendobj\n",
            i + 3
        ));
    }
    objects.extend_from_slice(extra);
    build_pdf(&objects, "")
}

pub fn uri_link(url: &str) -> String {
    format!("<< /Type /Annot /Subtype /Link /Rect [0 0 10 10] /A << /S /URI /URI ({url}) >> >>")
}

pub fn action_link(action_type: &str) -> String {
    format!("<< /Type /Annot /Subtype /Link /Rect [0 0 10 10] /A << /S /{action_type} >> >>")
}

pub fn annots(items: &[String]) -> String {
    format!("/Annots [{}]", items.join(" "))
}

pub fn run(bytes: &[u8], options: &AnalysisOptions) -> AnalysisOutcome {
    analyze(&ParserContext::default(), RawDocument::new(bytes), options)
}

pub fn scored(bytes: &[u8]) -> AnalysisResult {
    match run(bytes, &AnalysisOptions::default()) {
        AnalysisOutcome::Scored(result) => result,
        other => panic!("expected a scored result, got {other:?}"),
    }
}

#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().expect("log buffer").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Runs `f` under a plain-text `fmt` subscriber and returns what it logged,
/// one formatted event per line.
pub fn capture_logs<T>(f: impl FnOnce() -> T) -> (T, Vec<String>) {
    let buffer = LogBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::WARN)
        .finish();
    let value = tracing::subscriber::with_default(subscriber, f);
    let bytes = buffer.0.lock().expect("log buffer").clone();
    let lines = String::from_utf8_lossy(&bytes).lines().map(str::to_string).collect();
    (value, lines)
}
