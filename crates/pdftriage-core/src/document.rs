use std::fmt;

use crate::error::PageError;
use crate::model::{ActionKind, Annotation};

/// Read-only view of one loaded document. Owns everything it exposes; the
/// input buffer and the low-level object graph are gone by the time a
/// caller holds one of these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentGraph {
    pub pages: Vec<Page>,
    pub open_action: Option<OpenAction>,
    /// Entries in the catalog's `/Names /JavaScript` tree.
    pub script_count: usize,
    /// File names from the `/Names /EmbeddedFiles` tree, in tree order.
    pub embedded_files: Vec<String>,
    pub notes: Vec<LoadNote>,
}

impl DocumentGraph {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn annotation_count(&self) -> usize {
        self.pages.iter().filter_map(|p| p.annotations.as_ref().ok()).map(Vec::len).sum()
    }

    /// Loading stopped early or had to guess at the structure.
    pub fn is_partial(&self) -> bool {
        !self.notes.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// 1-based, in page-tree order.
    pub index: usize,
    pub annotations: Result<Vec<Annotation>, PageError>,
    /// `/Annots` elements that did not resolve to a dictionary. Their
    /// neighbours are still in `annotations`.
    pub skipped: Vec<PageError>,
}

/// Catalog `/OpenAction`. Its kind is a best-effort reading of the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenAction {
    pub kind: ActionKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadNote {
    XrefRecovered,
    CatalogRecovered,
    ObjectBudgetExceeded,
    PageTreeMissing,
    /// A cycle, an over-deep branch, or a malformed kid was skipped.
    PageTreeTruncated,
    PageBudgetExceeded { limit: usize },
    AnnotationBudgetExceeded { limit: usize },
    AnnotationsSkipped { page: usize, count: usize },
    TimeBudgetExceeded { budget_ms: u64 },
    NameTreeTruncated,
}

impl fmt::Display for LoadNote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadNote::XrefRecovered => f.write_str("cross-reference data was damaged; structure recovered by scan"),
            LoadNote::CatalogRecovered => f.write_str("no usable trailer; document catalog recovered by scan"),
            LoadNote::ObjectBudgetExceeded => f.write_str("object budget exhausted; some objects were not parsed"),
            LoadNote::PageTreeMissing => f.write_str("document catalog has no page tree"),
            LoadNote::PageTreeTruncated => f.write_str("page tree is malformed; some branches were skipped"),
            LoadNote::PageBudgetExceeded { limit } => {
                write!(f, "page budget of {limit} exhausted; remaining pages not scanned")
            }
            LoadNote::AnnotationBudgetExceeded { limit } => {
                write!(f, "annotation budget of {limit} exhausted; remaining annotations not scanned")
            }
            LoadNote::AnnotationsSkipped { page, count } => {
                write!(f, "page {page}: {count} malformed annotation(s) skipped")
            }
            LoadNote::TimeBudgetExceeded { budget_ms } => {
                write!(f, "time budget of {budget_ms} ms exhausted; remaining pages not scanned")
            }
            LoadNote::NameTreeTruncated => f.write_str("name tree is malformed or too large; some entries were skipped"),
        }
    }
}
