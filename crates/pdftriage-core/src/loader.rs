use std::time::Duration;

use pdftriage_pdf::{parse_pdf, EncryptionState, Interrupted, LockReason, ObjectGraph, ParseInterrupt, PdfAtom, PdfDict};
use tracing::{debug, info, Level};

use crate::actions::{annotation_from_dict, open_action_kind};
use crate::cancel::{CancelToken, TimeoutChecker};
use crate::context::ParserContext;
use crate::document::{DocumentGraph, LoadNote, OpenAction, Page};
use crate::error::{Cancelled, LoadError, PageError};
use crate::model::{Annotation, RawDocument};
use crate::names::{embedded_file_name, walk_name_tree};
use crate::page_tree::{walk_page_tree, PageSlot};
use crate::security_log::{SecurityDomain, SecurityEvent, Severity};

/// The `%PDF-` marker must start within this many leading bytes.
const HEADER_SEARCH_WINDOW: usize = 1024;

#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Credential for the standard security handler.
    pub password: Option<Vec<u8>>,
    pub max_pages: usize,
    pub max_annotations: usize,
    pub time_budget_ms: Option<u64>,
    pub cancel: CancelToken,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            password: None,
            max_pages: 5_000,
            max_annotations: 50_000,
            time_budget_ms: None,
            cancel: CancelToken::new(),
        }
    }
}

/// Builds the owned [`DocumentGraph`] for one document. Structural only:
/// actions are recorded, never followed or run.
pub fn load(ctx: &ParserContext, raw: RawDocument<'_>, options: &LoadOptions) -> Result<DocumentGraph, LoadError> {
    let load_span = tracing::info_span!("load", bytes_len = raw.bytes.len(), declared_len = raw.declared_len);
    let _load_guard = load_span.enter();
    options.cancel.check()?;
    let timer = TimeoutChecker::new(options.time_budget_ms.map(Duration::from_millis));
    validate_envelope(ctx, raw)?;

    let interrupt = ParseInterrupt { cancel: Some(options.cancel.flag()), deadline: timer.deadline() };
    let parse_options = ctx.parse_options(options.password.as_deref(), interrupt);
    let graph = parse_pdf(raw.bytes, &parse_options).map_err(|err| match err.downcast_ref::<Interrupted>() {
        Some(Interrupted::Cancelled) => LoadError::Cancelled(Cancelled),
        Some(Interrupted::DeadlineExceeded) => LoadError::unsupported("time budget exhausted before any object was parsed"),
        None => LoadError::corrupt(format!("{err:#}")),
    })?;
    check_encryption(&graph, options.password.is_some())?;

    let mut notes = Vec::new();
    if graph.xref_recovered {
        notes.push(LoadNote::XrefRecovered);
    }
    if graph.objects_truncated {
        notes.push(LoadNote::ObjectBudgetExceeded);
    }
    if graph.deadline_exceeded {
        SecurityEvent::warn(SecurityDomain::Budget, "time_budget_exceeded", "Time budget exhausted while parsing objects")
            .with_severity(Severity::Medium)
            .emit();
        notes.push(time_note(&timer));
    }
    let catalog = locate_catalog(&graph, &mut notes)?;

    let pages = load_pages(&graph, catalog, options, &timer, &mut notes)?;
    let open_action = catalog.get(b"/OpenAction").map(|obj| OpenAction { kind: open_action_kind(&graph, obj) });
    let (script_count, embedded_files) = load_name_trees(&graph, catalog, &mut notes);

    let document = DocumentGraph { pages, open_action, script_count, embedded_files, notes };
    info!(
        pages = document.page_count(),
        annotations = document.annotation_count(),
        scripts = document.script_count,
        embedded_files = document.embedded_files.len(),
        partial = document.is_partial(),
        "Loaded document graph"
    );
    Ok(document)
}

fn time_note(timer: &TimeoutChecker) -> LoadNote {
    let budget_ms = timer.budget().map_or(0, |budget| u64::try_from(budget.as_millis()).unwrap_or(u64::MAX));
    LoadNote::TimeBudgetExceeded { budget_ms }
}

fn validate_envelope(ctx: &ParserContext, raw: RawDocument<'_>) -> Result<(), LoadError> {
    if raw.declared_len != raw.bytes.len() {
        return Err(LoadError::corrupt(format!(
            "declared length {} does not match {} bytes received",
            raw.declared_len,
            raw.bytes.len()
        )));
    }
    let limit = ctx.limits().max_document_bytes;
    if raw.bytes.len() > limit {
        SecurityEvent::warn(SecurityDomain::Budget, "document_size_exceeded", "Document exceeds the size budget")
            .emit();
        return Err(LoadError::unsupported(format!("document of {} bytes exceeds the {limit} byte budget", raw.bytes.len())));
    }
    let window = &raw.bytes[..raw.bytes.len().min(HEADER_SEARCH_WINDOW)];
    if memchr::memmem::find(window, b"%PDF-").is_none() {
        return Err(LoadError::corrupt("missing %PDF- header"));
    }
    Ok(())
}

fn check_encryption(graph: &ObjectGraph<'_>, password_supplied: bool) -> Result<(), LoadError> {
    match &graph.encryption {
        EncryptionState::Clear => Ok(()),
        EncryptionState::Unlocked { revision, owner_authenticated } => {
            info!(revision, owner_authenticated, "Encrypted document unlocked");
            Ok(())
        }
        EncryptionState::Locked(reason) => {
            SecurityEvent {
                level: Level::INFO,
                domain: SecurityDomain::Encryption,
                severity: Severity::Info,
                kind: "document_locked",
                page: None,
                message: "Encrypted document could not be opened",
            }
            .emit();
            match reason {
                LockReason::CredentialRequired | LockReason::WrongCredential => Err(LoadError::Encrypted),
                LockReason::UnsupportedHandler(what) if password_supplied => {
                    Err(LoadError::unsupported(format!("unsupported encryption: {what}")))
                }
                LockReason::UnsupportedHandler(_) => Err(LoadError::Encrypted),
            }
        }
    }
}

/// `/Root` of the newest trailer. Failing that, the newest `/Type /Catalog`
/// found by the raw scan, then the newest dictionary whose `/Pages`
/// resolves to a page tree node.
fn locate_catalog<'g>(graph: &'g ObjectGraph<'g>, notes: &mut Vec<LoadNote>) -> Result<&'g PdfDict, LoadError> {
    if let Some(catalog) = graph.trailer_value(b"/Root").and_then(|root| graph.resolve_dict(root)) {
        return Ok(catalog);
    }
    let typed = graph.objects.iter().rev().find_map(|entry| match &entry.atom {
        PdfAtom::Dict(d) if d.has_name(b"/Type", b"/Catalog") => Some(d),
        _ => None,
    });
    let recovered = typed.or_else(|| {
        graph.objects.iter().rev().find_map(|entry| match &entry.atom {
            PdfAtom::Dict(d) if has_page_tree(graph, d) => Some(d),
            _ => None,
        })
    });
    match recovered {
        Some(catalog) => {
            SecurityEvent::warn(SecurityDomain::Xref, "catalog_recovered", "No trailer names a catalog; using scanned catalog")
                .with_severity(Severity::Medium)
                .emit();
            notes.push(LoadNote::CatalogRecovered);
            Ok(catalog)
        }
        None => Err(LoadError::unsupported("no document catalog")),
    }
}

fn has_page_tree(graph: &ObjectGraph<'_>, dict: &PdfDict) -> bool {
    dict.get(b"/Pages")
        .and_then(|pages| graph.resolve_dict(pages))
        .is_some_and(|node| node.contains_key(b"/Kids"))
}

fn load_pages(
    graph: &ObjectGraph<'_>,
    catalog: &PdfDict,
    options: &LoadOptions,
    timer: &TimeoutChecker,
    notes: &mut Vec<LoadNote>,
) -> Result<Vec<Page>, LoadError> {
    let Some(root) = catalog.get(b"/Pages") else {
        SecurityEvent::warn(SecurityDomain::PageTree, "page_tree_missing", "Catalog has no /Pages entry").emit();
        notes.push(LoadNote::PageTreeMissing);
        return Ok(Vec::new());
    };
    let walk = walk_page_tree(graph, root, options.max_pages);
    if walk.truncated {
        notes.push(LoadNote::PageTreeTruncated);
    }
    debug!(slots = walk.slots.len(), "Walked page tree");

    let mut pages = Vec::with_capacity(walk.slots.len());
    let mut annotations_loaded = 0usize;
    for (i, slot) in walk.slots.iter().enumerate() {
        options.cancel.check()?;
        if let Err(exceeded) = timer.check() {
            let note = time_note(timer);
            if !notes.contains(&note) {
                SecurityEvent::warn(SecurityDomain::Budget, "time_budget_exceeded", "Time budget exhausted while loading pages")
                    .with_severity(Severity::Medium)
                    .emit();
                notes.push(note);
            }
            debug!(elapsed_ms = exceeded.elapsed.as_millis() as u64, "Stopped loading pages");
            return Ok(pages);
        }
        let index = i + 1;
        let loaded = match slot {
            PageSlot::Page(dict) => page_annotations(graph, dict, index),
            PageSlot::Unresolvable(reference) => Err(PageError::Unresolvable { page: index, reference: *reference }),
        };
        let (mut annotations, skipped) = match loaded {
            Ok((list, skipped)) => (Ok(list), skipped),
            Err(err) => (Err(err), Vec::new()),
        };
        let mut budget_hit = false;
        if let Ok(list) = &mut annotations {
            let remaining = options.max_annotations.saturating_sub(annotations_loaded);
            if list.len() > remaining {
                list.truncate(remaining);
                budget_hit = true;
            }
            annotations_loaded += list.len();
        }
        if let Err(err) = &annotations {
            let message = format!("Page could not be loaded: {err}");
            SecurityEvent::warn(SecurityDomain::Annotations, "malformed_page", &message)
                .with_page(index)
                .with_severity(Severity::Medium)
                .emit();
        }
        if !skipped.is_empty() {
            let message = format!("{} annotation(s) could not be resolved and were skipped", skipped.len());
            SecurityEvent::warn(SecurityDomain::Annotations, "malformed_annotation", &message)
                .with_page(index)
                .with_severity(Severity::High)
                .emit();
            notes.push(LoadNote::AnnotationsSkipped { page: index, count: skipped.len() });
        }
        pages.push(Page { index, annotations, skipped });
        if budget_hit {
            SecurityEvent::warn(SecurityDomain::Budget, "annotation_budget_exceeded", "Annotation budget exhausted")
                .with_page(index)
                .with_severity(Severity::Medium)
                .emit();
            notes.push(LoadNote::AnnotationBudgetExceeded { limit: options.max_annotations });
            return Ok(pages);
        }
    }
    if walk.budget_exceeded {
        notes.push(LoadNote::PageBudgetExceeded { limit: options.max_pages });
    }
    Ok(pages)
}

/// Resolvable annotations of one page, plus one error per `/Annots` element
/// that is not a dictionary. Only an unusable `/Annots` value fails the page.
fn page_annotations(
    graph: &ObjectGraph<'_>,
    page: &PdfDict,
    index: usize,
) -> Result<(Vec<Annotation>, Vec<PageError>), PageError> {
    let Some(annots) = page.get(b"/Annots") else {
        return Ok((Vec::new(), Vec::new()));
    };
    let Some(PdfAtom::Array(items)) = graph.resolve(annots) else {
        return Err(PageError::MalformedAnnotationList { page: index });
    };
    let mut annotations = Vec::with_capacity(items.len());
    let mut skipped = Vec::new();
    for (i, item) in items.iter().enumerate() {
        match graph.resolve_dict(item) {
            Some(dict) => annotations.push(annotation_from_dict(graph, dict)),
            None => skipped.push(PageError::MalformedAnnotation { page: index, index: i }),
        }
    }
    Ok((annotations, skipped))
}

fn load_name_trees(graph: &ObjectGraph<'_>, catalog: &PdfDict, notes: &mut Vec<LoadNote>) -> (usize, Vec<String>) {
    let Some(names) = catalog.get(b"/Names").and_then(|n| graph.resolve_dict(n)) else {
        return (0, Vec::new());
    };
    let mut truncated = false;
    let script_count = match names.get(b"/JavaScript") {
        Some(tree) => {
            let walk = walk_name_tree(graph, tree);
            truncated |= walk.truncated;
            walk.entries.len()
        }
        None => 0,
    };
    let embedded_files = match names.get(b"/EmbeddedFiles") {
        Some(tree) => {
            let walk = walk_name_tree(graph, tree);
            truncated |= walk.truncated;
            walk.entries.iter().map(|(key, value)| embedded_file_name(graph, key, value)).collect()
        }
        None => Vec::new(),
    };
    if truncated {
        notes.push(LoadNote::NameTreeTruncated);
    }
    (script_count, embedded_files)
}
