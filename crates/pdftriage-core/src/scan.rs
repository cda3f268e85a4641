use rayon::prelude::*;
use tracing::{debug, info_span, Level};

use crate::cancel::CancelToken;
use crate::document::{DocumentGraph, LoadNote, OpenAction, Page};
use crate::error::{Cancelled, PageError};
use crate::model::{Action, Annotation, ExtractedLink};
use crate::security_log::{SecurityDomain, SecurityEvent, Severity};
use crate::url_heuristics::classify;

#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    /// Scan pages on a rayon pool. Output is identical to the sequential path.
    pub parallel: bool,
    pub cancel: CancelToken,
}

/// What one page contributed. Log lines are already prefixed with the page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageFindings {
    pub page: usize,
    pub has_script_action: bool,
    pub has_launch_action: bool,
    pub has_submit_form_action: bool,
    pub links: Vec<ExtractedLink>,
    pub logs: Vec<String>,
}

/// Scanner output handed to the aggregator: catalog-level facts plus one
/// entry per loaded page, in page order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOutput {
    pub open_action: Option<OpenAction>,
    pub script_count: usize,
    pub pages: Vec<Result<PageFindings, PageError>>,
    pub embedded_files: Vec<String>,
    pub notes: Vec<LoadNote>,
}

/// Page-by-page findings in document order.
pub fn scan_pages(doc: &DocumentGraph) -> impl Iterator<Item = Result<PageFindings, PageError>> + '_ {
    doc.pages.iter().map(scan_page)
}

pub fn scan(doc: &DocumentGraph, options: &ScanOptions) -> Result<ScanOutput, Cancelled> {
    let scan_span = info_span!("scan", pages = doc.page_count(), parallel = options.parallel);
    let _scan_guard = scan_span.enter();

    let pages = if options.parallel {
        match rayon::ThreadPoolBuilder::new().build() {
            Ok(pool) => pool.install(|| {
                doc.pages
                    .par_iter()
                    .map(|page| {
                        options.cancel.check()?;
                        Ok(scan_page(page))
                    })
                    .collect::<Result<Vec<_>, Cancelled>>()
            })?,
            Err(err) => {
                let message = format!("Failed to build parallel page pool ({err}); falling back to sequential");
                SecurityEvent {
                    level: Level::WARN,
                    domain: SecurityDomain::Budget,
                    severity: Severity::Low,
                    kind: "scan_pool_fallback",
                    page: None,
                    message: &message,
                }
                .emit();
                scan_sequential(doc, &options.cancel)?
            }
        }
    } else {
        scan_sequential(doc, &options.cancel)?
    };

    debug!(
        pages = pages.len(),
        failed = pages.iter().filter(|p| p.is_err()).count(),
        "Scanned pages"
    );
    Ok(ScanOutput {
        open_action: doc.open_action,
        script_count: doc.script_count,
        pages,
        embedded_files: doc.embedded_files.clone(),
        notes: doc.notes.clone(),
    })
}

fn scan_sequential(doc: &DocumentGraph, cancel: &CancelToken) -> Result<Vec<Result<PageFindings, PageError>>, Cancelled> {
    let mut out = Vec::with_capacity(doc.pages.len());
    for (page, findings) in doc.pages.iter().zip(scan_pages(doc)) {
        cancel.check()?;
        if findings.is_err() {
            debug!(page = page.index, "Page skipped");
        }
        out.push(findings);
    }
    Ok(out)
}

fn scan_page(page: &Page) -> Result<PageFindings, PageError> {
    let annotations = page.annotations.as_ref().map_err(Clone::clone)?;
    let n = page.index;
    let mut findings = PageFindings { page: n, ..PageFindings::default() };
    for err in &page.skipped {
        findings.logs.push(format!("{err}; annotation skipped"));
    }
    for annotation in annotations {
        match annotation {
            Annotation::Link { action: Some(action) } => match action {
                Action::Uri(url) if url.is_empty() => {}
                Action::Uri(url) => {
                    let verdict = classify(url);
                    if let Some(reason) = verdict.reason {
                        findings.logs.push(format!("page {n}: suspicious link {url} ({reason})"));
                    }
                    findings.links.push(ExtractedLink {
                        url: url.clone(),
                        page_index: n,
                        suspicious: verdict.suspicious,
                        reason: verdict.reason,
                    });
                }
                Action::Script => {
                    findings.has_script_action = true;
                    findings.logs.push(format!("page {n}: script-triggering link"));
                }
                Action::Launch => {
                    findings.has_launch_action = true;
                    findings.logs.push(format!("page {n}: launch action"));
                }
                Action::SubmitForm => {
                    findings.has_submit_form_action = true;
                    findings.logs.push(format!("page {n}: submit-form link"));
                }
                Action::InternalNavigation | Action::Unknown(_) => {}
            },
            Annotation::Widget { action: Some(Action::SubmitForm) } => {
                findings.has_submit_form_action = true;
                findings.logs.push(format!("page {n}: form field submits data"));
            }
            Annotation::Link { action: None } | Annotation::Widget { .. } | Annotation::Other { .. } => {}
        }
    }
    Ok(findings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SuspicionReason;

    fn link(action: Action) -> Annotation {
        Annotation::Link { action: Some(action) }
    }

    fn doc(pages: Vec<Result<Vec<Annotation>, PageError>>) -> DocumentGraph {
        DocumentGraph {
            pages: pages
                .into_iter()
                .enumerate()
                .map(|(i, annotations)| Page { index: i + 1, annotations, skipped: Vec::new() })
                .collect(),
            open_action: None,
            script_count: 0,
            embedded_files: Vec::new(),
            notes: Vec::new(),
        }
    }

    #[test]
    fn links_and_actions_are_recorded_per_page() {
        let doc = doc(vec![Ok(vec![
            link(Action::Uri("http://192.0.2.10/pay".into())),
            link(Action::Uri(String::new())),
            link(Action::Script),
            Annotation::Widget { action: Some(Action::Launch) },
            Annotation::Widget { action: Some(Action::SubmitForm) },
        ])]);
        let page = scan_pages(&doc).next().expect("page").expect("ok");
        assert_eq!(page.links.len(), 1);
        assert_eq!(page.links[0].reason, Some(SuspicionReason::RawIpHost));
        assert!(page.has_script_action);
        assert!(!page.has_launch_action, "widgets only contribute submit-form");
        assert!(page.has_submit_form_action);
        assert_eq!(page.logs[0], "page 1: suspicious link http://192.0.2.10/pay (raw IP address host)");
        assert_eq!(page.logs[1], "page 1: script-triggering link");
    }

    #[test]
    fn malformed_page_does_not_stop_later_pages() {
        let doc = doc(vec![
            Ok(vec![link(Action::Launch)]),
            Err(PageError::MalformedAnnotationList { page: 2 }),
            Ok(vec![link(Action::Uri("https://example.com/invoice".into()))]),
        ]);
        let out = scan(&doc, &ScanOptions::default()).expect("not cancelled");
        assert!(out.pages[0].as_ref().expect("page 1").has_launch_action);
        assert!(out.pages[1].is_err());
        assert_eq!(out.pages[2].as_ref().expect("page 3").links.len(), 1);
    }

    #[test]
    fn skipped_annotations_are_logged_before_the_rest_of_the_page() {
        let mut doc = doc(vec![Ok(vec![link(Action::Launch)])]);
        doc.pages[0].skipped.push(PageError::MalformedAnnotation { page: 1, index: 1 });
        let page = scan_pages(&doc).next().expect("page").expect("ok");
        assert!(page.has_launch_action);
        assert_eq!(page.logs, vec!["page 1: annotation 1 is not a dictionary; annotation skipped", "page 1: launch action"]);
    }

    #[test]
    fn parallel_scan_preserves_page_order() {
        let pages = (0..64)
            .map(|i| Ok(vec![link(Action::Uri(format!("http://example.com/{i}.exe")))]))
            .collect();
        let doc = doc(pages);
        let sequential = scan(&doc, &ScanOptions::default()).expect("sequential");
        let parallel = scan(&doc, &ScanOptions { parallel: true, ..ScanOptions::default() }).expect("parallel");
        assert_eq!(sequential, parallel);
    }

    #[test]
    fn cancelled_scan_reports_cancellation() {
        let doc = doc(vec![Ok(vec![])]);
        let options = ScanOptions::default();
        options.cancel.cancel();
        assert_eq!(scan(&doc, &options), Err(Cancelled));
    }
}
