use std::collections::HashSet;

use pdftriage_pdf::{ObjRef, ObjectGraph, PdfAtom, PdfDict, PdfObj};
use tracing::warn;

/// Maximum recursion depth for page tree traversal to prevent stack overflow
const MAX_PAGE_TREE_DEPTH: usize = 128;

#[derive(Debug, Clone, Copy)]
pub(crate) enum PageSlot<'g> {
    Page(&'g PdfDict),
    /// A kid reference that leads nowhere usable. It still occupies a page
    /// number so later pages keep theirs.
    Unresolvable(ObjRef),
}

#[derive(Debug, Default)]
pub(crate) struct PageTreeWalk<'g> {
    pub slots: Vec<PageSlot<'g>>,
    pub truncated: bool,
    pub budget_exceeded: bool,
}

/// Flattens the page tree rooted at `pages` into document order, stopping
/// after `max_pages` slots.
pub(crate) fn walk_page_tree<'g>(graph: &'g ObjectGraph<'g>, pages: &'g PdfObj, max_pages: usize) -> PageTreeWalk<'g> {
    let mut walk = PageTreeWalk::default();
    let mut seen = HashSet::new();
    walk_node(graph, pages, max_pages, &mut walk, &mut seen, 0);
    walk
}

/// Returns false once the page budget is spent and the walk must stop.
fn walk_node<'g>(
    graph: &'g ObjectGraph<'g>,
    obj: &'g PdfObj,
    max_pages: usize,
    walk: &mut PageTreeWalk<'g>,
    seen: &mut HashSet<ObjRef>,
    depth: usize,
) -> bool {
    if depth > MAX_PAGE_TREE_DEPTH {
        warn!(
            security = true,
            domain = "pdf.page_tree",
            kind = "page_tree_depth_exceeded",
            depth = depth,
            "[NON-FATAL][finding:page_tree_depth_exceeded] Page tree depth exceeded maximum; skipping branch"
        );
        walk.truncated = true;
        return true;
    }

    let reference = obj.as_reference();
    if let Some(r) = reference {
        if !seen.insert(r) {
            warn!(
                security = true,
                domain = "pdf.page_tree",
                kind = "page_tree_cycle_detected",
                obj = r.obj,
                gen = r.gen,
                "[NON-FATAL][finding:page_tree_cycle_detected] Page tree cycle detected; skipping branch"
            );
            walk.truncated = true;
            return true;
        }
    }

    let Some(dict) = graph.resolve_dict(obj) else {
        return match reference {
            Some(r) => push_slot(walk, PageSlot::Unresolvable(r), max_pages),
            None => {
                warn!(
                    security = true,
                    domain = "pdf.page_tree",
                    kind = "page_tree_direct_non_dict",
                    atom = obj.atom.type_name(),
                    "[NON-FATAL] Page tree kid is neither a reference nor a dictionary; skipping"
                );
                walk.truncated = true;
                true
            }
        };
    };

    // A node with /Kids is intermediate whatever its /Type says.
    match dict.get(b"/Kids").and_then(|kids| graph.resolve(kids)) {
        Some(PdfAtom::Array(kids)) => {
            for kid in kids {
                if !walk_node(graph, kid, max_pages, walk, seen, depth + 1) {
                    return false;
                }
            }
            true
        }
        _ => push_slot(walk, PageSlot::Page(dict), max_pages),
    }
}

fn push_slot<'g>(walk: &mut PageTreeWalk<'g>, slot: PageSlot<'g>, max_pages: usize) -> bool {
    if walk.slots.len() >= max_pages {
        warn!(
            security = true,
            domain = "runtime.budget",
            kind = "page_budget_exceeded",
            max_pages,
            "Page budget exhausted; remaining pages are not loaded"
        );
        walk.budget_exceeded = true;
        return false;
    }
    walk.slots.push(slot);
    true
}
