mod common;

use common::{action_link, annots, build_pdf, capture_logs, document, run, scored, uri_link};
use pdftriage_core::{
    analyze, ActionKind, AnalysisOptions, AnalysisOutcome, ParseLimits, ParserContext, RawDocument, RiskLevel,
    SuspicionReason,
};

#[test]
fn document_without_signals_is_safe() {
    let pdf = document("", &["", &annots(&[uri_link("https://example.com/invoice")])], &[]);
    let result = scored(&pdf);
    assert_eq!(result.score, 0);
    assert_eq!(result.risk_level, RiskLevel::Safe);
    assert_eq!(result.findings.links.len(), 1);
    assert!(!result.findings.links[0].suspicious);
    assert_eq!(result.findings.links[0].page_index, 2);
    assert!(!result.partial);
    assert_eq!(result.pages_scanned, 2);
}

#[test]
fn single_launch_action_is_critical() {
    let pdf = document("", &[&annots(&[action_link("Launch")])], &[]);
    let result = scored(&pdf);
    assert!(result.findings.has_launch_action);
    assert_eq!(result.score, 100);
    assert_eq!(result.risk_level, RiskLevel::Critical);
    assert!(result.logs.iter().any(|l| l == "page 1: launch action"));
}

#[test]
fn single_embedded_script_is_medium() {
    let scripts = "/Names << /JavaScript << /Names [(init) 100 0 R] >> >>";
    let extra = vec!["100 0 obj\n<< /S /JavaScript /JS (app.alert(1)) >>\nendobj\n".to_string()];
    let result = scored(&document(scripts, &[""], &extra));
    assert!(result.findings.has_script_action);
    assert_eq!(result.score, 50);
    assert_eq!(result.risk_level, RiskLevel::Medium);
    assert_eq!(result.logs[0], "document: 1 embedded script(s)");
}

#[test]
fn script_link_is_medium_and_logged_with_its_page() {
    let pdf = document("", &["", &annots(&[action_link("JavaScript")])], &[]);
    let result = scored(&pdf);
    assert_eq!(result.score, 50);
    assert!(result.logs.iter().any(|l| l == "page 2: script-triggering link"));
}

#[test]
fn open_action_is_scored_by_presence_and_kind_is_informational() {
    let pdf = document("/OpenAction 100 0 R", &[""], &["100 0 obj\n<< /S /JavaScript /JS (x) >>\nendobj\n".into()]);
    let result = scored(&pdf);
    assert!(result.findings.has_open_action);
    assert_eq!(result.findings.open_action_kind, Some(ActionKind::Script));
    assert_eq!(result.score, 20);
    assert_eq!(result.risk_level, RiskLevel::Low);

    let goto = document("/OpenAction [3 0 R /Fit]", &[""], &[]);
    let result = scored(&goto);
    assert_eq!(result.findings.open_action_kind, Some(ActionKind::InternalNavigation));
    assert_eq!(result.score, 20);
}

#[test]
fn embedded_files_are_listed_by_name() {
    let names = "/Names << /EmbeddedFiles << /Names [(k1) 100 0 R (k2) 101 0 R] >> >>";
    let extra = vec![
        "100 0 obj\n<< /Type /Filespec /F (invoice.pdf.exe) /UF (invoice.pdf.exe) >>\nendobj\n".to_string(),
        "101 0 obj\n<< /Type /Filespec /F (notes.txt) >>\nendobj\n".to_string(),
    ];
    let result = scored(&document(names, &[""], &extra));
    let listed: Vec<&str> = result.findings.embedded_file_names.iter().map(String::as_str).collect();
    assert_eq!(listed, vec!["invoice.pdf.exe", "notes.txt"]);
    assert_eq!(result.score, 30);
    assert!(result.logs.iter().any(|l| l == "embedded file: notes.txt"));
}

#[test]
fn suspicious_links_accumulate_and_raw_ip_adds_a_bonus() {
    let links = annots(&[
        uri_link("http://192.0.2.10/pay"),
        uri_link("http://example.com/update.exe"),
        uri_link("https://example.com/invoice"),
    ]);
    let result = scored(&document("", &[&links], &[]));
    let reasons: Vec<Option<SuspicionReason>> = result.findings.links.iter().map(|l| l.reason).collect();
    assert_eq!(
        reasons,
        vec![Some(SuspicionReason::RawIpHost), Some(SuspicionReason::ExecutableTarget), None]
    );
    assert_eq!(result.score, 80);
    assert_eq!(result.risk_level, RiskLevel::High);
}

#[test]
fn adding_a_signal_never_lowers_the_score() {
    let base = document("", &[&annots(&[uri_link("http://free.tk/")])], &[]);
    let more = document("/OpenAction 3 0 R", &[&annots(&[uri_link("http://free.tk/"), action_link("SubmitForm")])], &[]);
    let most = document(
        "/OpenAction 3 0 R",
        &[&annots(&[uri_link("http://free.tk/"), action_link("SubmitForm"), action_link("Launch")])],
        &[],
    );
    let scores: Vec<u8> = [base, more, most].iter().map(|pdf| scored(pdf).score).collect();
    assert!(scores.windows(2).all(|w| w[0] <= w[1]), "scores not monotonic: {scores:?}");
}

#[test]
fn identical_input_gives_identical_results() {
    let pdf = document(
        "/OpenAction 3 0 R",
        &[&annots(&[uri_link("http://192.0.2.10/a"), action_link("JavaScript")]), &annots(&[uri_link("http://b.zip/")])],
        &[],
    );
    assert_eq!(scored(&pdf), scored(&pdf));
}

#[test]
fn malformed_middle_page_is_skipped_without_failing() {
    let pdf = document(
        "",
        &[
            &annots(&[uri_link("http://192.0.2.10/one")]),
            "/Annots (not an array)",
            &annots(&[uri_link("http://example.com/three.exe")]),
        ],
        &[],
    );
    let result = scored(&pdf);
    let pages: Vec<usize> = result.findings.links.iter().map(|l| l.page_index).collect();
    assert_eq!(pages, vec![1, 3]);
    assert!(result.partial);
    assert_eq!(result.pages_scanned, 2);
    assert!(result.logs.iter().any(|l| l == "page 2: /Annots is not an array; page skipped"));
    let page_two = result.logs.iter().position(|l| l.starts_with("page 2")).expect("page 2 log");
    let page_three = result.logs.iter().position(|l| l.starts_with("page 3")).expect("page 3 log");
    assert!(page_two < page_three);
}

#[test]
fn dangling_annotation_reference_marks_only_its_page() {
    let pdf = document("", &["/Annots [99 0 R]", &annots(&[action_link("Launch")])], &[]);
    let result = scored(&pdf);
    assert!(result.findings.has_launch_action);
    assert_eq!(result.pages_scanned, 2);
    assert!(result.logs.iter().any(|l| l == "page 1: annotation 0 is not a dictionary; annotation skipped"));
}

#[test]
fn dangling_annotation_does_not_hide_its_neighbours() {
    let pdf = document("", &[&annots(&[action_link("Launch"), "99 0 R".into()])], &[]);
    let result = scored(&pdf);
    assert!(result.findings.has_launch_action);
    assert_eq!(result.score, 100);
    assert_eq!(result.risk_level, RiskLevel::Critical);
    assert!(result.partial);
    assert_eq!(
        &result.logs[..2],
        ["page 1: annotation 1 is not a dictionary; annotation skipped", "page 1: launch action"]
    );
    assert!(result.logs.iter().any(|l| l == "partial scan: page 1: 1 malformed annotation(s) skipped"));
}

#[test]
fn skipped_annotation_is_reported_once_as_high_severity() {
    let pdf = document("", &[&annots(&[action_link("Launch"), "99 0 R".into()])], &[]);
    let (result, lines) = capture_logs(|| scored(&pdf));
    assert_eq!(result.score, 100);
    let reported: Vec<&String> = lines.iter().filter(|l| l.contains("malformed_annotation")).collect();
    assert_eq!(reported.len(), 1, "{lines:?}");
    assert!(reported[0].contains("severity=High"));
    assert!(reported[0].contains("page=1"));
}

#[test]
fn encrypted_document_without_credential_is_not_scored() {
    let objects = vec![
        "1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n".to_string(),
        "2 0 obj\n<< /Type /Pages /Count 0 /Kids [] >>\nendobj\n".to_string(),
        format!(
            "3 0 obj\n<< /Filter /Standard /V 2 /R 3 /Length 128 /O <{o}> /U <{u}> /P -4 >>\nendobj\n",
            o = "11".repeat(32),
            u = "22".repeat(32)
        ),
    ];
    let pdf = build_pdf(&objects, "/Encrypt 3 0 R /ID [<0123456789abcdef> <0123456789abcdef>]");
    assert_eq!(run(&pdf, &AnalysisOptions::default()), AnalysisOutcome::Encrypted);

    let with_password = AnalysisOptions { password: Some(b"guess".to_vec()), ..AnalysisOptions::default() };
    assert_eq!(run(&pdf, &with_password), AnalysisOutcome::Encrypted);
}

#[test]
fn unsupported_encryption_with_credential_is_unsupported() {
    let objects = vec![
        "1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n".to_string(),
        "2 0 obj\n<< /Type /Pages /Count 0 /Kids [] >>\nendobj\n".to_string(),
        "3 0 obj\n<< /Filter /Standard /V 5 /R 6 /Length 256 /O <00> /U <00> /P -4 >>\nendobj\n".to_string(),
    ];
    let pdf = build_pdf(&objects, "/Encrypt 3 0 R");
    assert_eq!(run(&pdf, &AnalysisOptions::default()), AnalysisOutcome::Encrypted);
    let with_password = AnalysisOptions { password: Some(b"pw".to_vec()), ..AnalysisOptions::default() };
    assert!(matches!(run(&pdf, &with_password), AnalysisOutcome::Unsupported { .. }));
}

#[test]
fn non_pdf_input_is_corrupt() {
    assert!(matches!(run(b"GIF89a not a pdf", &AnalysisOptions::default()), AnalysisOutcome::Corrupt { .. }));
    assert!(matches!(run(b"", &AnalysisOptions::default()), AnalysisOutcome::Corrupt { .. }));
    assert!(matches!(run(b"%PDF-1.7\n%%EOF\n", &AnalysisOptions::default()), AnalysisOutcome::Corrupt { .. }));
}

#[test]
fn declared_length_mismatch_is_corrupt() {
    let pdf = document("", &[""], &[]);
    let raw = RawDocument::with_declared_len(&pdf, pdf.len() + 10);
    let outcome = analyze(&ParserContext::default(), raw, &AnalysisOptions::default());
    assert!(matches!(outcome, AnalysisOutcome::Corrupt { .. }));
}

#[test]
fn oversized_document_is_unsupported() {
    let pdf = document("", &[""], &[]);
    let ctx = ParserContext::new(ParseLimits { max_document_bytes: 16, ..ParseLimits::default() });
    let outcome = analyze(&ctx, RawDocument::new(&pdf), &AnalysisOptions::default());
    assert!(matches!(outcome, AnalysisOutcome::Unsupported { .. }));
}

#[test]
fn parallel_and_sequential_scans_agree() {
    let pages: Vec<String> = (0..40)
        .map(|i| match i % 4 {
            0 => annots(&[uri_link(&format!("http://192.0.2.{i}/x"))]),
            1 => annots(&[action_link("JavaScript")]),
            2 => "/Annots 7".to_string(),
            _ => annots(&[uri_link(&format!("https://example.com/{i}.msi"))]),
        })
        .collect();
    let page_refs: Vec<&str> = pages.iter().map(String::as_str).collect();
    let pdf = document("", &page_refs, &[]);
    let sequential = run(&pdf, &AnalysisOptions::default());
    let parallel = run(&pdf, &AnalysisOptions { parallel: true, ..AnalysisOptions::default() });
    assert_eq!(sequential, parallel);
}

#[test]
fn page_budget_yields_a_partial_result() {
    let pdf = document("", &["", "", &annots(&[action_link("Launch")])], &[]);
    let options = AnalysisOptions { max_pages: 2, ..AnalysisOptions::default() };
    let result = match run(&pdf, &options) {
        AnalysisOutcome::Scored(result) => result,
        other => panic!("unexpected outcome {other:?}"),
    };
    assert!(result.partial);
    assert_eq!(result.pages_scanned, 2);
    assert!(!result.findings.has_launch_action);
    assert!(result.logs.iter().any(|l| l.starts_with("partial scan: page budget of 2")));
}

#[test]
fn annotation_budget_truncates_and_stops() {
    let pdf = document(
        "",
        &[&annots(&[uri_link("http://a.tk/"), uri_link("http://b.tk/")]), &annots(&[action_link("Launch")])],
        &[],
    );
    let options = AnalysisOptions { max_annotations: 1, ..AnalysisOptions::default() };
    let AnalysisOutcome::Scored(result) = run(&pdf, &options) else {
        panic!("expected a score");
    };
    assert_eq!(result.findings.links.len(), 1);
    assert!(!result.findings.has_launch_action);
    assert!(result.partial);
}

#[test]
fn cancelled_run_reports_cancellation() {
    let pdf = document("", &[""], &[]);
    let options = AnalysisOptions::default();
    options.cancel.cancel();
    assert_eq!(run(&pdf, &options), AnalysisOutcome::Cancelled);
}

#[test]
fn exhausted_time_budget_stops_parsing() {
    let pdf = document("", &[&annots(&[action_link("Launch")])], &[]);
    let options = AnalysisOptions { time_budget_ms: Some(0), ..AnalysisOptions::default() };
    assert!(matches!(run(&pdf, &options), AnalysisOutcome::Unsupported { .. }));
}

#[test]
fn broken_xref_is_recovered_and_marked_partial() {
    let pdf = document("", &[&annots(&[action_link("Launch")])], &[]);
    let text = String::from_utf8(pdf).expect("ascii");
    let cut = text.rfind("startxref").expect("startxref");
    let damaged = format!("{}startxref\n999999\n%%EOF\n", &text[..cut]);
    let result = scored(damaged.as_bytes());
    assert!(result.findings.has_launch_action);
    assert!(result.partial);
}

#[test]
fn untyped_catalog_without_trailer_is_recovered() {
    let pdf = format!(
        "%PDF-1.7\n1 0 obj\n<< /Pages 2 0 R >>\nendobj\n\
         2 0 obj\n<< /Type /Pages /Count 1 /Kids [3 0 R] >>\nendobj\n\
         3 0 obj\n<< /Type /Page /Parent 2 0 R {} >>\nendobj\n%%EOF\n",
        annots(&[action_link("Launch")])
    );
    let result = scored(pdf.as_bytes());
    assert!(result.findings.has_launch_action);
    assert_eq!(result.risk_level, RiskLevel::Critical);
    assert!(result.partial);
    assert!(result
        .logs
        .iter()
        .any(|l| l == "partial scan: no usable trailer; document catalog recovered by scan"));
}

#[test]
fn result_serializes_for_presentation() {
    let pdf = document("", &[&annots(&[uri_link("http://192.0.2.10/pay")])], &[]);
    let outcome = run(&pdf, &AnalysisOptions::default());
    let json = outcome.to_json().expect("json");
    assert!(json.contains("\"outcome\": \"scored\""));
    assert!(json.contains("\"risk_level\": \"MEDIUM\""));
    assert!(json.contains("raw IP address host"));
}
